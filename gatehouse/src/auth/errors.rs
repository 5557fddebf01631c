//! Authentication error types.

use thiserror::Error;

use super::roles::ParseRoleError;

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Password hashing failed
    #[error("Password hashing failed")]
    HashingFailed,

    /// Signing a token failed
    #[error("Token encoding failed: {0}")]
    TokenEncoding(#[from] jsonwebtoken::errors::Error),

    /// A ledger record was issued with a key that does not match its kind
    #[error("Token kind {kind} cannot be keyed by {key}")]
    MismatchedTokenKey {
        kind: &'static str,
        key: &'static str,
    },

    /// Malformed input
    #[error("{0}")]
    Validation(String),

    /// Email already registered
    #[error("Email already registered")]
    EmailTaken,

    /// Unknown email, deactivated account or wrong password.
    /// All three share one message so callers cannot probe for accounts.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Login attempted before the address was verified
    #[error("Email not verified")]
    EmailNotVerified,

    /// Signed access or refresh token failed verification, or its ledger
    /// record is no longer usable
    #[error("Invalid or expired token")]
    InvalidToken,

    /// One-time verify/reset token is unknown, used, revoked or expired
    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    /// No bearer token on a protected request
    #[error("Missing token")]
    MissingToken,

    /// Bearer token is valid but its user is gone or soft-deleted
    #[error("User not found or deactivated")]
    AccountUnavailable,

    /// Caller's role is not permitted
    #[error("Forbidden")]
    Forbidden,

    /// User not found
    #[error("User not found")]
    UserNotFound,
}

impl AuthError {
    /// Whether this error is an internal failure rather than a client mistake.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AuthError::Database(_)
                | AuthError::HashingFailed
                | AuthError::TokenEncoding(_)
                | AuthError::MismatchedTokenKey { .. }
        )
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Database, hashing and signing errors are collapsed into a generic
    /// message so nothing about the storage layer or key material escapes.
    pub fn client_message(&self) -> String {
        if self.is_internal() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<ParseRoleError> for AuthError {
    fn from(err: ParseRoleError) -> Self {
        AuthError::Validation(err.to_string())
    }
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_errors_are_sanitized() {
        let err = AuthError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.client_message(), "Internal server error");

        let err = AuthError::MismatchedTokenKey {
            kind: "refresh",
            key: "hash",
        };
        assert_eq!(err.client_message(), "Internal server error");
    }

    #[test]
    fn test_enumeration_sensitive_messages_are_generic() {
        assert_eq!(
            AuthError::InvalidCredentials.client_message(),
            "Invalid credentials"
        );
        assert_eq!(
            AuthError::InvalidToken.client_message(),
            AuthError::InvalidOrExpiredToken.client_message()
        );
    }

    #[test]
    fn test_role_parse_error_becomes_validation() {
        let err: AuthError = ParseRoleError.into();
        assert!(matches!(err, AuthError::Validation(ref msg) if msg == "Invalid role"));
    }
}
