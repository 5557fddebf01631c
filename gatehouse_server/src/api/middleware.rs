//! Access guard and role gate middleware for protected endpoints.
//!
//! The access guard extracts the bearer token from the `Authorization`
//! header, resolves it to a [`Principal`] and injects that into request
//! extensions for downstream handlers. Role gates run after the guard.
//!
//! # Usage
//!
//! ```rust,no_run
//! use axum::{Router, routing::get, middleware};
//! # use gatehouse_server::api::middleware::{auth_middleware, require_admin};
//! # use gatehouse_server::api::AppState;
//! # async fn handler() {}
//! # let state: AppState = unimplemented!();
//!
//! let admin_routes: Router = Router::new()
//!     .route("/api/users", get(handler))
//!     .layer(middleware::from_fn(require_admin))
//!     .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
//!     .with_state(state);
//! # let _ = admin_routes;
//! ```
//!
//! # Extracting the caller
//!
//! ```rust,no_run
//! use axum::extract::Extension;
//! use gatehouse::Principal;
//!
//! async fn protected_handler(Extension(caller): Extension<Principal>) -> String {
//!     format!("Authenticated as {}", caller.email)
//! }
//! # let _ = protected_handler;
//! ```

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use gatehouse::{
    AuthError, Principal, Role,
    auth::{ADMINISTRATORS, CONTENT_AUTHORS, authorize},
};

use super::{AppState, error::ApiError};
use crate::logging::log_security_event;

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Access guard: validates the bearer token and injects the caller.
///
/// # Behavior
///
/// - **Success**: Injects [`Principal`] into request extensions and calls the next handler
/// - **Missing header**: `401 Missing token`
/// - **Invalid/expired token**: `401 Invalid or expired token`
/// - **User deleted or gone**: `401 User not found or deactivated`
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request)
        .map(str::to_owned)
        .ok_or(AuthError::MissingToken)?;

    let principal = match state.auth.authenticate(&token).await {
        Ok(principal) => principal,
        Err(AuthError::AccountUnavailable) => {
            log_security_event(
                "deactivated_access",
                None,
                "Valid access token presented for a missing or deactivated user",
            );
            return Err(AuthError::AccountUnavailable.into());
        }
        Err(e) => return Err(e.into()),
    };

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

async fn gate(permitted: &[Role], request: Request, next: Next) -> Result<Response, ApiError> {
    let role = request
        .extensions()
        .get::<Principal>()
        .map(|principal| principal.role)
        .ok_or(AuthError::MissingToken)?;

    authorize(role, permitted)?;
    Ok(next.run(request).await)
}

/// Role gate for user administration
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    gate(ADMINISTRATORS, request, next).await
}

/// Role gate for content mutation
pub async fn require_content_author(request: Request, next: Next) -> Result<Response, ApiError> {
    gate(CONTENT_AUTHORS, request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with(header: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&request_with(Some("Bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&request_with(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&request_with(Some("Bearer "))), None);
        assert_eq!(bearer_token(&request_with(None)), None);
    }
}
