//! Centralized Error Handling Module
//!
//! Every failure in the API flows through [`AppError`], which carries a unique
//! error code. The code decides the HTTP status and is echoed in the JSON
//! envelope so the frontend can branch on it.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - AUTH_xxx: identity and permission errors
//! - BOOKING_xxx: reservation errors
//! - API_xxx: generic request errors
//! - DB_xxx: persistence errors
//! - CFG_xxx: configuration errors

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::fmt;
use tracing::{error, warn};

use crate::api::types::{ApiError, ApiResponse};

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Extra context for the client (validation details, ...)
    pub details: Option<String>,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: Some(Box::new(source)),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // API Errors
    // ============================================
    /// Invalid request format or field values
    ApiBadRequest,
    /// Request body failed validation rules
    ApiValidation,
    /// Resource not found
    ApiNotFound,
    /// Rate limit exceeded
    ApiRateLimited,
    /// Internal server error
    ApiInternalError,

    // ============================================
    // Auth Errors
    // ============================================
    /// Missing or invalid bearer token
    AuthUnauthorized,
    /// Token valid but no Link-A account exists yet
    AuthNotRegistered,
    /// Caller lacks the role or ownership required
    AuthForbidden,
    /// Account already registered
    AuthAlreadyRegistered,
    /// Identity provider could not be reached
    AuthProviderUnavailable,

    // ============================================
    // Booking Errors
    // ============================================
    /// Not enough rooms/seats/days free
    BookingUnavailable,
    /// Booking cannot move to the requested status
    BookingInvalidState,

    // ============================================
    // Review Errors
    // ============================================
    /// User already reviewed this hotel
    ReviewDuplicate,

    // ============================================
    // Persistence Errors
    // ============================================
    /// Query or connection failure
    DbError,
    /// Unique/foreign key constraint violated
    DbConstraint,
    /// Database stayed locked past the busy timeout
    DbBusy,

    // ============================================
    // Configuration Errors
    // ============================================
    /// Missing environment variable
    ConfigMissingEnv,
    /// Invalid configuration value
    ConfigInvalidValue,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiBadRequest => "API_BAD_REQUEST",
            Self::ApiValidation => "API_VALIDATION",
            Self::ApiNotFound => "API_NOT_FOUND",
            Self::ApiRateLimited => "API_RATE_LIMITED",
            Self::ApiInternalError => "API_INTERNAL_ERROR",

            Self::AuthUnauthorized => "AUTH_UNAUTHORIZED",
            Self::AuthNotRegistered => "AUTH_NOT_REGISTERED",
            Self::AuthForbidden => "AUTH_FORBIDDEN",
            Self::AuthAlreadyRegistered => "AUTH_ALREADY_REGISTERED",
            Self::AuthProviderUnavailable => "AUTH_PROVIDER_UNAVAILABLE",

            Self::BookingUnavailable => "BOOKING_UNAVAILABLE",
            Self::BookingInvalidState => "BOOKING_INVALID_STATE",

            Self::ReviewDuplicate => "REVIEW_DUPLICATE",

            Self::DbError => "DB_ERROR",
            Self::DbConstraint => "DB_CONSTRAINT",
            Self::DbBusy => "DB_BUSY",

            Self::ConfigMissingEnv => "CFG_MISSING_ENV",
            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",
        }
    }

    /// Get HTTP status code for API responses
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ApiBadRequest | Self::ApiValidation | Self::BookingInvalidState => 400,
            Self::AuthUnauthorized | Self::AuthNotRegistered => 401,
            Self::AuthForbidden => 403,
            Self::ApiNotFound => 404,
            Self::AuthAlreadyRegistered
            | Self::BookingUnavailable
            | Self::ReviewDuplicate
            | Self::DbConstraint => 409,
            Self::ApiRateLimited => 429,
            Self::AuthProviderUnavailable => 502,
            Self::DbBusy => 503,
            _ => 500,
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.http_status() >= 500
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiBadRequest, msg)
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(ErrorCode::ApiNotFound, format!("{} not found", what))
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthUnauthorized, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthForbidden, msg)
    }

    pub fn conflict(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self::new(code, msg)
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::BookingUnavailable, msg)
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::BookingInvalidState, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiInternalError, msg)
    }

    pub fn invalid_config(key: &str, value: &str) -> Self {
        Self::new(
            ErrorCode::ConfigInvalidValue,
            format!("Invalid value for {}: {:?}", key, value),
        )
    }

    pub fn missing_env(key: &str) -> Self {
        Self::new(
            ErrorCode::ConfigMissingEnv,
            format!("Missing environment variable: {}", key),
        )
    }
}

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::new(ErrorCode::ApiNotFound, "Record not found"),
            sqlx::Error::Database(ref db)
                if db.is_unique_violation() || db.is_foreign_key_violation() =>
            {
                let message = db.message().to_string();
                Self::with_source(ErrorCode::DbConstraint, message, err)
            }
            sqlx::Error::Database(ref db) if is_sqlite_busy(db.code().as_deref()) => {
                Self::with_source(ErrorCode::DbBusy, "Database is busy, try again", err)
            }
            other => Self::with_source(ErrorCode::DbError, "Database error", other),
        }
    }
}

/// SQLITE_BUSY and SQLITE_LOCKED, including their extended codes
fn is_sqlite_busy(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .map(|c| matches!(c & 0xff, 5 | 6))
        .unwrap_or(false)
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::with_source(ErrorCode::DbError, "Migration failed", err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = err
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let reasons: Vec<String> = errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                format!("{}: {}", field, reasons.join(", "))
            })
            .collect();
        fields.sort();

        Self::new(ErrorCode::ApiValidation, "Validation failed").with_details(fields.join("; "))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::with_source(
                ErrorCode::AuthProviderUnavailable,
                "Identity provider timeout",
                err,
            )
        } else {
            Self::with_source(
                ErrorCode::AuthProviderUnavailable,
                "Identity provider request failed",
                err,
            )
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::ApiBadRequest, "JSON parse error", err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(ErrorCode::ApiBadRequest, "Invalid JSON body").with_details(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(ErrorCode::ApiBadRequest, "Invalid query string").with_details(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(ErrorCode::ApiBadRequest, "Invalid path parameter").with_details(rejection.body_text())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorCode::ApiInternalError, "IO error", err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if self.code.is_server_error() {
            error!(code = self.code_str(), error = ?self.source, "{}", self.message);
        } else {
            warn!(code = self.code_str(), status = status.as_u16(), "{}", self.message);
        }

        // Never leak database internals to clients
        let message = match self.code {
            ErrorCode::DbError | ErrorCode::ApiInternalError => "Internal server error".to_string(),
            _ => self.message,
        };

        let body = ApiResponse::<()>::error(ApiError {
            code: self.code.as_str().to_string(),
            message,
            details: self.details,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = AppError::unavailable("No rooms left");
        assert_eq!(err.code, ErrorCode::BookingUnavailable);
        assert_eq!(err.code_str(), "BOOKING_UNAVAILABLE");
        assert_eq!(err.to_string(), "[BOOKING_UNAVAILABLE] No rooms left");
    }

    #[test]
    fn test_http_status() {
        assert_eq!(ErrorCode::ApiValidation.http_status(), 400);
        assert_eq!(ErrorCode::AuthUnauthorized.http_status(), 401);
        assert_eq!(ErrorCode::AuthForbidden.http_status(), 403);
        assert_eq!(ErrorCode::ApiNotFound.http_status(), 404);
        assert_eq!(ErrorCode::ReviewDuplicate.http_status(), 409);
        assert_eq!(ErrorCode::ApiRateLimited.http_status(), 429);
        assert_eq!(ErrorCode::DbError.http_status(), 500);
        assert_eq!(ErrorCode::AuthProviderUnavailable.http_status(), 502);
        assert_eq!(ErrorCode::DbBusy.http_status(), 503);
    }

    #[test]
    fn test_busy_codes() {
        assert!(is_sqlite_busy(Some("5")));
        assert!(is_sqlite_busy(Some("517")));
        assert!(is_sqlite_busy(Some("6")));
        assert!(!is_sqlite_busy(Some("2067")));
        assert!(!is_sqlite_busy(None));
    }

    #[test]
    fn test_row_not_found_maps_to_404() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_not_found_message() {
        let err = AppError::not_found("Hotel");
        assert_eq!(err.message, "Hotel not found");
    }
}
