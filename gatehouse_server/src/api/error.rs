//! Boundary translation from domain errors to HTTP responses.
//!
//! Every failed request gets a `{"message": "..."}` body. Internal failures
//! are logged here and surface only as a generic 500.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gatehouse::{AuthError, ContentError};
use serde_json::json;

/// An error response ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Same as the `From` conversion, except a bad refresh token is a client
    /// mistake rather than an authentication failure.
    pub fn from_logout(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken => Self::bad_request(err.client_message()),
            other => other.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = match &err {
            AuthError::Validation(_)
            | AuthError::EmailTaken
            | AuthError::InvalidCredentials
            | AuthError::InvalidOrExpiredToken => StatusCode::BAD_REQUEST,
            AuthError::EmailNotVerified
            | AuthError::InvalidToken
            | AuthError::MissingToken
            | AuthError::AccountUnavailable => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::Database(_)
            | AuthError::HashingFailed
            | AuthError::TokenEncoding(_)
            | AuthError::MismatchedTokenKey { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if err.is_internal() {
            tracing::error!(error = %err, "Internal auth error");
        }
        Self::new(status, err.client_message())
    }
}

impl From<ContentError> for ApiError {
    fn from(err: ContentError) -> Self {
        let status = match &err {
            ContentError::Validation(_) => StatusCode::BAD_REQUEST,
            ContentError::Forbidden(_) => StatusCode::FORBIDDEN,
            ContentError::NotFound => StatusCode::NOT_FOUND,
            ContentError::Database(e) => {
                tracing::error!(error = %e, "Internal content error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.client_message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

/// Result type for handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_status_mapping() {
        let cases = [
            (AuthError::Validation("bad".to_string()), StatusCode::BAD_REQUEST),
            (AuthError::EmailTaken, StatusCode::BAD_REQUEST),
            (AuthError::InvalidCredentials, StatusCode::BAD_REQUEST),
            (AuthError::InvalidOrExpiredToken, StatusCode::BAD_REQUEST),
            (AuthError::EmailNotVerified, StatusCode::UNAUTHORIZED),
            (AuthError::InvalidToken, StatusCode::UNAUTHORIZED),
            (AuthError::MissingToken, StatusCode::UNAUTHORIZED),
            (AuthError::AccountUnavailable, StatusCode::UNAUTHORIZED),
            (AuthError::Forbidden, StatusCode::FORBIDDEN),
            (AuthError::UserNotFound, StatusCode::NOT_FOUND),
            (AuthError::HashingFailed, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_internal_errors_are_generic() {
        let err = ApiError::from(AuthError::MismatchedTokenKey {
            kind: "refresh",
            key: "token hash",
        });
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Internal server error");
    }

    #[test]
    fn test_logout_invalid_token_is_bad_request() {
        let err = ApiError::from_logout(AuthError::InvalidToken);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Invalid or expired token");
    }

    #[test]
    fn test_content_status_mapping() {
        assert_eq!(
            ApiError::from(ContentError::NotFound).status,
            StatusCode::NOT_FOUND
        );
        let forbidden = ApiError::from(ContentError::Forbidden("Cannot update others' content"));
        assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
        assert_eq!(forbidden.message, "Cannot update others' content");
    }
}
