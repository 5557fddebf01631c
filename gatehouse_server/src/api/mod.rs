//! HTTP API for the auth server.
//!
//! # Architecture
//!
//! The API is built with:
//! - **Axum**: Async web framework
//! - **Tower**: Middleware for CORS, request IDs, the access guard and role gates
//! - **JWT**: Stateless access tokens and ledger-backed rotating refresh tokens
//!
//! # Modules
//!
//! - [`auth`]: Registration, verification, login, logout, rotation, password recovery
//! - [`profile`]: The caller's own profile
//! - [`users`]: User administration (Admin only)
//! - [`content`]: Content CRUD (mutation for Admin and Editor)
//! - [`middleware`]: Access guard and role gates
//!
//! # Endpoints Overview
//!
//! ```text
//! GET    /health                       - Health check (public)
//! POST   /api/auth/register            - Register (public)
//! GET    /api/auth/verify-email        - Verify email (public)
//! POST   /api/auth/login               - Login (public)
//! POST   /api/auth/logout              - Revoke a refresh token (public)
//! POST   /api/auth/token               - Rotate a refresh token (public)
//! POST   /api/auth/forgot-password     - Request a reset link (public)
//! POST   /api/auth/reset-password      - Reset password (public)
//! GET    /api/profile                  - Own profile (auth)
//! PUT    /api/profile                  - Update own profile (auth)
//! GET    /api/users                    - List users (Admin)
//! GET    /api/users/{id}               - Get user (Admin)
//! PUT    /api/users/{id}/role          - Change role (Admin)
//! DELETE /api/users/{id}               - Deactivate user (Admin)
//! GET    /api/content                  - List content (auth)
//! GET    /api/content/{id}             - Get content (auth)
//! POST   /api/content                  - Create content (Admin, Editor)
//! PUT    /api/content/{id}             - Update content (Admin, Editor)
//! DELETE /api/content/{id}             - Delete content (Admin, Editor)
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively. In production, configure appropriate
//! origins, methods, and headers.

pub mod auth;
pub mod content;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod profile;
pub mod request_id;
pub mod users;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Json},
    routing::{get, post, put},
};
use gatehouse::{AccountManager, AuthManager, ContentManager, db::StoreHealth};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request (cheap due to Arc wrappers).
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthManager>,
    pub accounts: Arc<AccountManager>,
    pub content: Arc<ContentManager>,
    pub health: Arc<dyn StoreHealth>,
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Example
///
/// ```rust,no_run
/// # use gatehouse_server::api::{create_router, AppState};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let state: AppState = unimplemented!();
/// let app = create_router(state);
/// let listener = tokio::net::TcpListener::bind("127.0.0.1:4000").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```
pub fn create_router(state: AppState) -> Router {
    let guard = from_fn_with_state(state.clone(), middleware::auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/verify-email", get(auth::verify_email))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/token", post(auth::refresh_token))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password));

    let profile_routes = Router::new()
        .route("/", get(profile::get_profile).put(profile::update_profile))
        .layer(guard.clone());

    // Layers run bottom-up: the guard resolves the caller before the gate checks it.
    let user_routes = Router::new()
        .route("/", get(users::list_users))
        .route(
            "/{id}",
            get(users::get_user).delete(users::deactivate_user),
        )
        .route("/{id}/role", put(users::update_role))
        .layer(from_fn(middleware::require_admin))
        .layer(guard.clone());

    let content_reads = Router::new()
        .route("/", get(content::list_content))
        .route("/{id}", get(content::get_content));
    let content_writes = Router::new()
        .route("/", post(content::create_content))
        .route(
            "/{id}",
            put(content::update_content).delete(content::delete_content),
        )
        .layer(from_fn(middleware::require_content_author));
    let content_routes = content_reads.merge(content_writes).layer(guard);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api/profile", profile_routes)
        .nest("/api/users", user_routes)
        .nest("/api/content", content_routes)
        .layer(from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when the store answers, `503 Service Unavailable` otherwise.
///
/// ```bash
/// curl http://localhost:4000/health
/// # {"status":"healthy","database":true,"version":"0.1.0","timestamp":"2026-10-19T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = match state.health.health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            false
        }
    };

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if db_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
