//! Content error types.

use thiserror::Error;

/// Content errors
#[derive(Debug, Error)]
pub enum ContentError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Missing or soft-deleted item
    #[error("Content not found")]
    NotFound,

    /// Caller's role or ownership does not allow the operation
    #[error("{0}")]
    Forbidden(&'static str),

    /// Malformed input
    #[error("{0}")]
    Validation(String),
}

impl ContentError {
    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            ContentError::Database(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for content operations
pub type ContentResult<T> = Result<T, ContentError>;
