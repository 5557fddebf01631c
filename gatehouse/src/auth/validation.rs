//! Input validation for account fields.
//!
//! Each function checks one field and returns `AuthError::Validation` on the
//! first rule it finds broken.

use super::errors::{AuthError, AuthResult};

/// Minimum display name length (after trimming)
pub const MIN_NAME_LEN: usize = 2;

/// Password length bounds, inclusive
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 32;

/// Validate and trim a display name.
pub fn validate_name(name: &str) -> AuthResult<String> {
    let trimmed = name.trim();
    if trimmed.chars().count() < MIN_NAME_LEN {
        return Err(AuthError::Validation(format!(
            "Name must be at least {MIN_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Normalize an email address (trim + lowercase) and check its shape.
pub fn normalize_email(email: &str) -> AuthResult<String> {
    let normalized = email.trim().to_lowercase();
    let invalid = || AuthError::Validation("A valid email is required".to_string());

    if normalized.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = normalized.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    let labels_ok = domain.split('.').count() >= 2 && domain.split('.').all(|l| !l.is_empty());
    if !labels_ok {
        return Err(invalid());
    }

    Ok(normalized)
}

/// Validate password length.
pub fn validate_password(password: &str) -> AuthResult<()> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(AuthError::Validation(format!(
            "Password must be {MIN_PASSWORD_LEN}-{MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_name_is_trimmed() {
        assert_eq!(validate_name("  Alice ").unwrap(), "Alice");
        assert!(validate_name(" a ").is_err());
        assert!(validate_name("").is_err());
    }

    #[test]
    fn test_email_normalization() {
        assert_eq!(normalize_email(" Alice@X.com ").unwrap(), "alice@x.com");
        assert!(normalize_email("alice").is_err());
        assert!(normalize_email("@x.com").is_err());
        assert!(normalize_email("alice@x").is_err());
        assert!(normalize_email("alice@x..com").is_err());
        assert!(normalize_email("al ice@x.com").is_err());
        assert!(normalize_email("a@b@x.com").is_err());
    }

    #[test]
    fn test_password_bounds() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("exactly8").is_ok());
        assert!(validate_password(&"p".repeat(32)).is_ok());
        assert!(validate_password(&"p".repeat(33)).is_err());
    }

    proptest! {
        #[test]
        fn normalized_email_is_idempotent(
            local in "[A-Za-z0-9._%+-]{1,16}",
            domain in "[A-Za-z0-9-]{1,12}",
            tld in "[A-Za-z]{2,6}",
        ) {
            let raw = format!("  {local}@{domain}.{tld} ");
            let once = normalize_email(&raw).unwrap();
            prop_assert_eq!(normalize_email(&once).unwrap(), once.clone());
            prop_assert_eq!(once.clone(), once.to_lowercase());
        }
    }
}
