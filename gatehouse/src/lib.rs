//! # Gatehouse
//!
//! Account and session core for a small content service: registration with
//! email verification, password login, rotating refresh tokens, password
//! recovery, user administration and role-gated content.
//!
//! ## Architecture
//!
//! Services are written against repository traits so the same code runs on
//! PostgreSQL or on the in-memory store:
//!
//! - **AuthManager**: register, verify email, login, logout, refresh rotation,
//!   forgot/reset password, bearer token authentication
//! - **TokenLedger**: persisted lifecycle of refresh, verify and reset tokens
//! - **AccountManager**: own-profile updates and user administration
//! - **ContentManager**: content CRUD behind the role gate
//!
//! ## Core Modules
//!
//! - [`auth`]: tokens, hashing, roles, validation and the auth flows
//! - [`account`]: profile and user administration
//! - [`content`]: content items
//! - [`db`]: repository traits, PostgreSQL and in-memory implementations
//! - [`mail`]: outbound mail transports and templates

/// Authentication flows, tokens and roles.
pub mod auth;
pub use auth::{AuthConfig, AuthError, AuthManager, AuthResult, Principal, Role, User, UserId};

/// Profile and user administration.
pub mod account;
pub use account::AccountManager;

/// Role-gated content.
pub mod content;
pub use content::{ContentError, ContentManager, ContentResult};

/// Persistence.
pub mod db;

/// Outbound mail.
pub mod mail;
