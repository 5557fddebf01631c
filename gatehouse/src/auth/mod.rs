//! Authentication module: registration, email verification, sessions and
//! password recovery.
//!
//! This module implements:
//! - Argon2id password hashing with server-side pepper
//! - Stateless JWT access tokens
//! - Rotating refresh tokens tracked in a token ledger, with reuse detection
//! - Single-use verify and reset tokens, stored only as digests
//! - Closed role set with a role gate for authorization
//!
//! ## Example
//!
//! ```no_run
//! use gatehouse::auth::{AuthConfig, AuthManager, RegisterRequest};
//! use gatehouse::db::MemoryStore;
//! use gatehouse::mail::LogMailer;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let config = AuthConfig::new(
//!         "access-secret-with-at-least-32-characters",
//!         "refresh-secret-with-at-least-32-characters",
//!         "pepper-of-16-chars",
//!         "http://localhost:4000",
//!     );
//!     let auth = AuthManager::new(store.clone(), store, Arc::new(LogMailer), config)?;
//!
//!     let user = auth
//!         .register(RegisterRequest {
//!             name: "Alice".to_string(),
//!             email: "alice@example.com".to_string(),
//!             password: "SecurePass123".to_string(),
//!         })
//!         .await?;
//!     println!("Registered user: {}", user.email);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod errors;
pub mod ledger;
pub mod manager;
pub mod models;
pub mod password;
pub mod roles;
pub mod tokens;
pub mod validation;

pub use config::AuthConfig;
pub use errors::{AuthError, AuthResult};
pub use ledger::{NewTokenRecord, TokenKey, TokenKind, TokenLedger, TokenRecord};
pub use manager::AuthManager;
pub use models::{
    AccessTokenClaims, Credentials, LoginRequest, NewUser, PasswordResetConfirm, Principal,
    ProfileUpdate, RefreshTokenClaims, RegisterRequest, SessionTokens, User, UserId,
};
pub use password::CredentialHasher;
pub use roles::{ADMINISTRATORS, CONTENT_AUTHORS, ParseRoleError, Role, authorize, authorize_owned_mutation};
pub use tokens::TokenCodec;
