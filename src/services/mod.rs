//! Marketplace services
//!
//! Each module owns the SQL for its tables and enforces the ownership and
//! role rules for its operations. Handlers stay thin.

pub mod availability;
pub mod bookings;
pub mod event_spaces;
pub mod hotels;
pub mod reviews;
pub mod rides;
pub mod users;

use validator::Validate;

use crate::models::AppResult;

/// Request bodies whose text is stored trimmed. Length rules run on the
/// trimmed values.
pub(crate) trait Normalize: Validate + Sized {
    fn trim_fields(&mut self);

    fn normalized(mut self) -> AppResult<Self> {
        self.trim_fields();
        self.validate()?;
        Ok(self)
    }
}

pub(crate) fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

pub(crate) fn trim_opt(value: &mut Option<String>) {
    if let Some(inner) = value.as_mut() {
        trim_in_place(inner);
    }
}
