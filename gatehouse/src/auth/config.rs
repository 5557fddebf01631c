//! Runtime settings for the authentication service.

use chrono::Duration;

/// Default access token lifetime (15 minutes)
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;
/// Default refresh token lifetime (7 days)
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;
/// Default email verification link lifetime (24 hours)
pub const DEFAULT_VERIFY_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;
/// Default password reset link lifetime (1 hour)
pub const DEFAULT_RESET_TOKEN_TTL_SECS: i64 = 60 * 60;

/// Argon2 memory cost in KiB
pub const DEFAULT_HASH_MEMORY_KIB: u32 = 19 * 1024;
/// Argon2 iteration count
pub const DEFAULT_HASH_ITERATIONS: u32 = 2;

/// Authentication settings, built once at startup and handed to
/// [`AuthManager::new`](super::AuthManager::new).
///
/// The access and refresh signing secrets must differ.
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret for access tokens
    pub access_secret: String,
    /// HMAC secret for refresh tokens
    pub refresh_secret: String,
    /// Server-side pepper mixed into every password hash
    pub pepper: String,
    /// Public base URL used to build emailed links
    pub base_url: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub verify_token_ttl: Duration,
    pub reset_token_ttl: Duration,
    pub hash_memory_kib: u32,
    pub hash_iterations: u32,
}

impl AuthConfig {
    /// Create a configuration with default lifetimes and hashing cost.
    pub fn new(
        access_secret: impl Into<String>,
        refresh_secret: impl Into<String>,
        pepper: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            pepper: pepper.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token_ttl: Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl: Duration::seconds(DEFAULT_REFRESH_TOKEN_TTL_SECS),
            verify_token_ttl: Duration::seconds(DEFAULT_VERIFY_TOKEN_TTL_SECS),
            reset_token_ttl: Duration::seconds(DEFAULT_RESET_TOKEN_TTL_SECS),
            hash_memory_kib: DEFAULT_HASH_MEMORY_KIB,
            hash_iterations: DEFAULT_HASH_ITERATIONS,
        }
    }

    /// Override the Argon2 cost. Tests use a cheap setting.
    pub fn with_hash_cost(mut self, memory_kib: u32, iterations: u32) -> Self {
        self.hash_memory_kib = memory_kib;
        self.hash_iterations = iterations;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::new("a", "b", "p", "http://localhost:4000/");
        assert_eq!(config.base_url, "http://localhost:4000");
        assert_eq!(config.access_token_ttl, Duration::minutes(15));
        assert_eq!(config.refresh_token_ttl, Duration::days(7));
        assert_eq!(config.verify_token_ttl, Duration::hours(24));
        assert_eq!(config.reset_token_ttl, Duration::hours(1));
    }
}
