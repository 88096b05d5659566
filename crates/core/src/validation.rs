//! Request field validation.

use crate::{Error, Result};

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 100;
pub const PASSWORD_MIN: usize = 6;
pub const TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 255;

fn check_length(field: &'static str, value: &str, min: usize, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(Error::validation(
            field,
            format!("must be between {min} and {max} characters"),
        ));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<()> {
    check_length("username", username.trim(), USERNAME_MIN, USERNAME_MAX)
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(Error::validation(
            "password",
            format!("must be at least {PASSWORD_MIN} characters"),
        ));
    }
    Ok(())
}

/// Structural email check: one `@`, non-empty local part, dotted domain.
pub fn validate_email(email: &str) -> Result<()> {
    let invalid = || Error::validation("email", "must be a valid email address");

    if email.len() > 255 || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

/// Manual and step titles.
pub fn validate_title(title: &str) -> Result<()> {
    check_length("title", title.trim(), TITLE_MIN, TITLE_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_bounds() {
        assert!(validate_username("ada").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("   ab   ").is_err());
        assert!(validate_username(&"x".repeat(100)).is_ok());
        assert!(validate_username(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_password_minimum() {
        assert!(validate_password("123456").is_ok());
        assert!(validate_password("12345").is_err());
    }

    #[test]
    fn test_email_shapes() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("first.last@sub.example.org").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ada@localhost").is_err());
        assert!(validate_email("ada@example..com").is_err());
        assert!(validate_email("a@b@example.com").is_err());
        assert!(validate_email("ada @example.com").is_err());
    }

    #[test]
    fn test_title_bounds() {
        assert!(validate_title("Fix").is_ok());
        assert!(validate_title("Go").is_err());
        assert!(validate_title(&"t".repeat(256)).is_err());
    }

    #[test]
    fn test_error_names_field() {
        let err = validate_title("x").unwrap_err();
        assert!(err.to_string().starts_with("invalid title:"));
    }
}
