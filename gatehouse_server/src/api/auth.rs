//! Authentication API handlers.
//!
//! Registration, email verification, login, logout, refresh token rotation
//! and password recovery. None of these routes require a bearer token.
//!
//! # Examples
//!
//! Register a new user:
//! ```bash
//! curl -X POST http://localhost:4000/api/auth/register \
//!   -H "Content-Type: application/json" \
//!   -d '{"name": "Alice", "email": "alice@example.com", "password": "SecurePass123"}'
//! ```
//!
//! Login:
//! ```bash
//! curl -X POST http://localhost:4000/api/auth/login \
//!   -H "Content-Type: application/json" \
//!   -d '{"email": "alice@example.com", "password": "SecurePass123"}'
//! ```

use axum::{Json, extract::State, http::StatusCode};
use gatehouse::{
    AuthError,
    auth::{LoginRequest, PasswordResetConfirm, RegisterRequest, SessionTokens},
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{
    AppState,
    error::{ApiError, ApiResult},
    extract::{JsonBody, QueryParams},
};
use crate::{
    logging::{log_security_event, redact_email},
    metrics,
};

const FORGOT_PASSWORD_REPLY: &str = "If that email exists you will receive a reset link";

/// Body of `/logout` and `/token`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenPayload {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordPayload {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailParams {
    pub token: String,
    pub email: String,
}

fn message(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}

/// Create an unverified account and mail a verification link.
///
/// # Response
///
/// `201 Created` with a message. No tokens are issued until the email is verified.
///
/// # Errors
///
/// - `400 Bad Request`: Malformed input or email already registered
pub async fn register(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    state.auth.register(request).await?;
    Ok((
        StatusCode::CREATED,
        message("Registered. Please check email to verify your account."),
    ))
}

/// Confirm an email address from a mailed link.
///
/// # Errors
///
/// - `400 Bad Request`: Missing parameters, or the token is invalid or expired
pub async fn verify_email(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<VerifyEmailParams>,
) -> ApiResult<Json<Value>> {
    state.auth.verify_email(&params.token, &params.email).await?;
    Ok(message("Email verified. You can now login."))
}

/// Authenticate with email and password.
///
/// # Response
///
/// ```json
/// { "accessToken": "eyJhbGciOiJIUzI1NiIs...", "refreshToken": "eyJhbGciOiJIUzI1NiIs..." }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Invalid credentials
/// - `401 Unauthorized`: Email not verified
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> ApiResult<Json<SessionTokens>> {
    let email = request.email.clone();
    match state.auth.login(request).await {
        Ok((_, tokens)) => {
            metrics::login_attempts_total(true);
            Ok(Json(tokens))
        }
        Err(e) => {
            metrics::login_attempts_total(false);
            if matches!(e, AuthError::InvalidCredentials) {
                log_security_event(
                    "failed_login",
                    None,
                    &format!("Invalid credentials for {}", redact_email(&email)),
                );
            }
            Err(e.into())
        }
    }
}

/// Revoke the session behind a refresh token. Idempotent.
///
/// # Errors
///
/// - `400 Bad Request`: The refresh token does not verify
pub async fn logout(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RefreshTokenPayload>,
) -> ApiResult<Json<Value>> {
    state
        .auth
        .logout(&payload.refresh_token)
        .await
        .map_err(ApiError::from_logout)?;
    Ok(message("Logged out"))
}

/// Rotate a refresh token into a new token pair.
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid, expired, revoked or already rotated token
pub async fn refresh_token(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RefreshTokenPayload>,
) -> ApiResult<Json<SessionTokens>> {
    match state.auth.refresh(&payload.refresh_token).await {
        Ok(tokens) => {
            metrics::token_refresh_total("rotated");
            Ok(Json(tokens))
        }
        Err(e) => {
            metrics::token_refresh_total("rejected");
            if matches!(e, AuthError::InvalidToken) {
                log_security_event(
                    "refresh_rejected",
                    None,
                    "Refresh token rejected (invalid, expired or reused)",
                );
            }
            Err(e.into())
        }
    }
}

/// Start a password reset. The reply never reveals whether the email exists.
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ForgotPasswordPayload>,
) -> ApiResult<Json<Value>> {
    state.auth.forgot_password(&payload.email).await?;
    Ok(message(FORGOT_PASSWORD_REPLY))
}

/// Set a new password with a mailed reset token. Signs out every session.
///
/// # Errors
///
/// - `400 Bad Request`: Invalid or expired token, or a malformed new password
pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<PasswordResetConfirm>,
) -> ApiResult<Json<Value>> {
    state.auth.reset_password(request).await?;
    metrics::password_resets_total();
    Ok(message("Password reset successful"))
}
