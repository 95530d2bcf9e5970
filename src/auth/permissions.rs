//! Role gates
//!
//! Access is a set intersection: a route names the roles it accepts and the
//! caller passes when they hold at least one of them. `admin` passes every
//! gate.

use crate::models::{AppError, AppResult, Role, User};

pub fn has_any_role(user_roles: &[Role], required: &[Role]) -> bool {
    if user_roles.contains(&Role::Admin) {
        return true;
    }
    user_roles.iter().any(|r| required.contains(r))
}

pub fn require_any_role(user: &User, required: &[Role]) -> AppResult<()> {
    if has_any_role(&user.roles, required) {
        return Ok(());
    }

    let names: Vec<&str> = required.iter().map(|r| r.as_str()).collect();
    Err(AppError::forbidden(format!(
        "Requires one of roles: {}",
        names.join(", ")
    )))
}

pub fn require_admin(user: &User) -> AppResult<()> {
    require_any_role(user, &[Role::Admin])
}

/// The caller owns the resource or is an admin
pub fn require_owner_or_admin(user: &User, owner_id: &str) -> AppResult<()> {
    if user.id == owner_id || user.is_admin() {
        Ok(())
    } else {
        Err(AppError::forbidden("You do not have access to this resource"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(id: &str, roles: &[Role]) -> User {
        User {
            id: id.to_string(),
            firebase_uid: format!("uid-{}", id),
            email: format!("{}@linka.co.mz", id),
            full_name: "Test".to_string(),
            phone: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            roles: roles.to_vec(),
        }
    }

    #[test]
    fn test_intersection() {
        assert!(has_any_role(&[Role::Client, Role::Driver], &[Role::Driver]));
        assert!(!has_any_role(&[Role::Client], &[Role::Driver, Role::HotelManager]));
        assert!(!has_any_role(&[], &[Role::Client]));
    }

    #[test]
    fn test_admin_passes_everything() {
        assert!(has_any_role(&[Role::Admin], &[Role::EventManager]));
        assert!(require_admin(&user("a", &[Role::Admin])).is_ok());
    }

    #[test]
    fn test_forbidden_message_lists_roles() {
        let err = require_any_role(&user("c", &[Role::Client]), &[Role::HotelManager]).unwrap_err();
        assert_eq!(err.code_str(), "AUTH_FORBIDDEN");
        assert!(err.message.contains("hotel_manager"));
    }

    #[test]
    fn test_ownership() {
        let owner = user("o", &[Role::HotelManager]);
        let other = user("x", &[Role::HotelManager]);
        let admin = user("a", &[Role::Admin]);

        assert!(require_owner_or_admin(&owner, "o").is_ok());
        assert!(require_owner_or_admin(&other, "o").is_err());
        assert!(require_owner_or_admin(&admin, "o").is_ok());
    }
}
