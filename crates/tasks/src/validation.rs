use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, ServiceError};

pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

pub fn validate_email(email: &str) -> Result<&str> {
    let email = email.trim();
    if EMAIL_RE.is_match(email) {
        Ok(email)
    } else {
        Err(ServiceError::validation("Please enter a valid email address"))
    }
}

/// Checks a new password and its confirmation, in that order.
pub fn validate_new_password(password: &str, confirm: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN || confirm.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if password != confirm {
        return Err(ServiceError::validation("Passwords don't match"));
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<&str> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation("Task title is required."));
    }
    Ok(trimmed)
}

pub fn validate_username(username: &str) -> Result<&str> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation("Username is required."));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert_eq!(validate_email(" ada@example.com ").unwrap(), "ada@example.com");
        for bad in ["", "ada", "ada@", "ada@example", "a da@example.com"] {
            assert!(validate_email(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn password_rules_apply_in_order() {
        let short = validate_new_password("abc", "abc").unwrap_err();
        assert_eq!(short.to_string(), "Password must be at least 6 characters");
        let mismatch = validate_new_password("abcdef", "abcdeg").unwrap_err();
        assert_eq!(mismatch.to_string(), "Passwords don't match");
        assert!(validate_new_password("abcdef", "abcdef").is_ok());
    }

    #[test]
    fn blank_title_is_rejected() {
        assert_eq!(
            validate_title("   ").unwrap_err().to_string(),
            "Task title is required."
        );
        assert_eq!(validate_title("  Ship it ").unwrap(), "Ship it");
    }
}
