//! Mozambique (pt-MZ) formatting helpers
//!
//! Currency is the metical: `1.234,56 MT`. Dates are day-first, month names in
//! Portuguese. Wall-clock times are shown in Central Africa Time (UTC+2, no DST).

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};

pub const CURRENCY_SYMBOL: &str = "MT";
pub const CURRENCY_CODE: &str = "MZN";

/// CAT offset in seconds
const MAPUTO_UTC_OFFSET_SECS: i32 = 2 * 3600;

const MONTHS_PT: [&str; 12] = [
    "janeiro",
    "fevereiro",
    "março",
    "abril",
    "maio",
    "junho",
    "julho",
    "agosto",
    "setembro",
    "outubro",
    "novembro",
    "dezembro",
];

/// `1234.5` -> `1.234,50 MT`
pub fn format_mzn(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!(
        "{}{},{:02} {}",
        sign,
        group_thousands(cents / 100),
        cents % 100,
        CURRENCY_SYMBOL
    )
}

/// Short form for cards and badges: `1,2 mil MT`, `3,4 M MT`
pub fn format_mzn_compact(amount: f64) -> String {
    let abs = amount.abs();
    let sign = if amount < 0.0 { "-" } else { "" };

    if abs < 1_000.0 {
        return format_mzn(amount);
    }

    // round before picking the unit: 999 950 reads 1 M
    let in_thousands = (abs / 100.0).round() / 10.0;
    let (rounded, suffix) = if in_thousands >= 1_000.0 {
        ((abs / 100_000.0).round() / 10.0, "M")
    } else {
        (in_thousands, "mil")
    };

    let number = if rounded.fract() == 0.0 {
        format!("{}", rounded as u64)
    } else {
        format!("{:.1}", rounded).replace('.', ",")
    };

    format!("{}{} {} {}", sign, number, suffix, CURRENCY_SYMBOL)
}

/// Parse a pt-MZ amount. Accepts `1.234,56 MT`, `1234,5`, `MZN 20`.
pub fn parse_mzn(text: &str) -> Option<f64> {
    let cleaned: String = text
        .replace(CURRENCY_CODE, "")
        .replace(CURRENCY_SYMBOL, "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    let normalized = cleaned.replace('.', "").replace(',', ".");
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `19/10/2026`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// `19 de outubro de 2026`
pub fn format_date_long(date: NaiveDate) -> String {
    format!("{} de {} de {}", date.day(), month_name(date), date.year())
}

/// Stay or event range, collapsing the shared month/year
pub fn format_date_range(start: NaiveDate, end: NaiveDate) -> String {
    if start.year() == end.year() && start.month() == end.month() {
        format!(
            "{} a {} de {} de {}",
            start.day(),
            end.day(),
            month_name(end),
            end.year()
        )
    } else if start.year() == end.year() {
        format!(
            "{} de {} a {} de {} de {}",
            start.day(),
            month_name(start),
            end.day(),
            month_name(end),
            end.year()
        )
    } else {
        format!("{} a {}", format_date_long(start), format_date_long(end))
    }
}

/// `19/10/2026 14:05` in Maputo time
pub fn format_datetime(at: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(MAPUTO_UTC_OFFSET_SECS) {
        Some(offset) => at.with_timezone(&offset).format("%d/%m/%Y %H:%M").to_string(),
        None => at.format("%d/%m/%Y %H:%M").to_string(),
    }
}

/// `1 noite` / `3 noites`
pub fn nights_label(nights: i64) -> String {
    if nights == 1 {
        "1 noite".to_string()
    } else {
        format!("{} noites", nights)
    }
}

/// Normalize a Mozambican phone number to `+258XXXXXXXXX`.
/// Mobile numbers start with 8, landlines with 2, nine digits after the
/// country code.
pub fn normalize_mz_phone(raw: &str) -> Option<String> {
    let digits: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    let local = digits
        .strip_prefix("+258")
        .or_else(|| digits.strip_prefix("00258"))
        .unwrap_or(&digits);

    let valid = local.len() == 9
        && local.chars().all(|c| c.is_ascii_digit())
        && matches!(local.chars().next(), Some('8') | Some('2'));

    valid.then(|| format!("+258{}", local))
}

fn month_name(date: NaiveDate) -> &'static str {
    MONTHS_PT[date.month0() as usize]
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_format_mzn() {
        assert_eq!(format_mzn(0.0), "0,00 MT");
        assert_eq!(format_mzn(7.5), "7,50 MT");
        assert_eq!(format_mzn(1234.56), "1.234,56 MT");
        assert_eq!(format_mzn(1_000_000.0), "1.000.000,00 MT");
        assert_eq!(format_mzn(-250.0), "-250,00 MT");
        assert_eq!(format_mzn(-0.001), "0,00 MT");
    }

    #[test]
    fn test_format_mzn_compact() {
        assert_eq!(format_mzn_compact(950.0), "950,00 MT");
        assert_eq!(format_mzn_compact(1_200.0), "1,2 mil MT");
        assert_eq!(format_mzn_compact(2_000.0), "2 mil MT");
        assert_eq!(format_mzn_compact(3_460_000.0), "3,5 M MT");
        assert_eq!(format_mzn_compact(999_950.0), "1 M MT");
        assert_eq!(format_mzn_compact(999_940.0), "999,9 mil MT");
        assert_eq!(format_mzn_compact(950_000.0), "950 mil MT");
    }

    #[test]
    fn test_parse_mzn() {
        assert_eq!(parse_mzn("1.234,56 MT"), Some(1234.56));
        assert_eq!(parse_mzn("MZN 20"), Some(20.0));
        assert_eq!(parse_mzn("-3,5"), Some(-3.5));
        assert_eq!(parse_mzn("MT"), None);
        assert_eq!(parse_mzn("abc"), None);
    }

    #[test]
    fn test_dates() {
        let d = date(2026, 10, 19);
        assert_eq!(format_date(d), "19/10/2026");
        assert_eq!(format_date_long(d), "19 de outubro de 2026");
        assert_eq!(format_date_long(date(2026, 3, 1)), "1 de março de 2026");
    }

    #[test]
    fn test_date_ranges() {
        assert_eq!(
            format_date_range(date(2026, 10, 19), date(2026, 10, 22)),
            "19 a 22 de outubro de 2026"
        );
        assert_eq!(
            format_date_range(date(2026, 10, 30), date(2026, 11, 2)),
            "30 de outubro a 2 de novembro de 2026"
        );
        assert_eq!(
            format_date_range(date(2026, 12, 30), date(2027, 1, 2)),
            "30 de dezembro de 2026 a 2 de janeiro de 2027"
        );
    }

    #[test]
    fn test_datetime_in_maputo_time() {
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 12, 5, 0).unwrap();
        assert_eq!(format_datetime(at), "19/10/2026 14:05");
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_mz_phone("84 123 4567").as_deref(), Some("+258841234567"));
        assert_eq!(normalize_mz_phone("+258 82-123-4567").as_deref(), Some("+258821234567"));
        assert_eq!(normalize_mz_phone("00258 21 123 4567").as_deref(), Some("+258211234567"));
        assert_eq!(normalize_mz_phone("12345"), None);
        assert_eq!(normalize_mz_phone("94 123 4567"), None);
    }

    #[test]
    fn test_nights_label() {
        assert_eq!(nights_label(1), "1 noite");
        assert_eq!(nights_label(4), "4 noites");
    }
}
