//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use chrono::Duration;
use gatehouse::{
    auth::AuthConfig,
    db::{DatabaseConfig, config::InvalidDatabaseSetting},
    mail::SmtpConfig,
};
use std::net::SocketAddr;

const DEFAULT_BASE_URL: &str = "http://localhost:4000";
const DEFAULT_SMTP_PORT: u16 = 587;

const MIN_SECRET_LEN: usize = 32;
const MIN_PEPPER_LEN: usize = 16;

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Token lifetimes
    pub ttl: TokenTtlConfig,
    /// Public base URL used in mailed links
    pub base_url: String,
    /// Outbound mail; `None` logs mail instead of sending it
    pub smtp: Option<SmtpConfig>,
    /// Prometheus exporter address; `None` disables the exporter
    pub metrics_bind: Option<SocketAddr>,
}

/// Security-related configuration
#[derive(Clone)]
pub struct SecurityConfig {
    /// Access token signing secret (required)
    pub jwt_access_secret: String,
    /// Refresh token signing secret (required)
    pub jwt_refresh_secret: String,
    /// Password hashing pepper (required)
    pub password_pepper: String,
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("jwt_access_secret", &"<redacted>")
            .field("jwt_refresh_secret", &"<redacted>")
            .field("password_pepper", &"<redacted>")
            .finish()
    }
}

/// Token lifetimes in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTtlConfig {
    pub access_secs: i64,
    pub refresh_secs: i64,
    pub verify_secs: i64,
    pub reset_secs: i64,
}

impl Default for TokenTtlConfig {
    fn default() -> Self {
        Self {
            access_secs: 15 * 60,
            refresh_secs: 7 * 24 * 60 * 60,
            verify_secs: 24 * 60 * 60,
            reset_secs: 60 * 60,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or any value is invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_env_or("SERVER_BIND", default_bind())?,
        };

        let mut database = DatabaseConfig::from_env()?;
        if let Some(url) = database_url_override {
            database.database_url = url;
        }

        let security = SecurityConfig {
            jwt_access_secret: required("JWT_ACCESS_SECRET", "Generate with: openssl rand -hex 32")?,
            jwt_refresh_secret: required(
                "JWT_REFRESH_SECRET",
                "Generate with: openssl rand -hex 32",
            )?,
            password_pepper: required("PASSWORD_PEPPER", "Generate with: openssl rand -hex 16")?,
        };

        let defaults = TokenTtlConfig::default();
        let ttl = TokenTtlConfig {
            access_secs: parse_env_or("ACCESS_TOKEN_TTL_SECS", defaults.access_secs)?,
            refresh_secs: parse_env_or("REFRESH_TOKEN_TTL_SECS", defaults.refresh_secs)?,
            verify_secs: parse_env_or("VERIFY_TOKEN_TTL_SECS", defaults.verify_secs)?,
            reset_secs: parse_env_or("RESET_TOKEN_TTL_SECS", defaults.reset_secs)?,
        };

        let base_url = std::env::var("BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let smtp = match (optional("SMTP_HOST"), optional("SMTP_USER")) {
            (Some(host), Some(username)) => Some(SmtpConfig {
                host,
                port: parse_env_or("SMTP_PORT", DEFAULT_SMTP_PORT)?,
                password: optional("SMTP_PASS").unwrap_or_default(),
                from: optional("EMAIL_FROM").unwrap_or_else(|| username.clone()),
                username,
            }),
            _ => None,
        };

        let metrics_bind = optional("METRICS_BIND")
            .map(|value| {
                value.parse().map_err(|_| ConfigError::Invalid {
                    var: "METRICS_BIND".to_string(),
                    reason: format!("Not a socket address: {value}"),
                })
            })
            .transpose()?;

        let config = Self {
            bind,
            database,
            security,
            ttl,
            base_url,
            smtp,
            metrics_bind,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns error for short or equal secrets, a short pepper, non-positive
    /// lifetimes, or a refresh lifetime not longer than the access lifetime
    pub fn validate(&self) -> Result<(), ConfigError> {
        let security = &self.security;
        for (var, value) in [
            ("JWT_ACCESS_SECRET", &security.jwt_access_secret),
            ("JWT_REFRESH_SECRET", &security.jwt_refresh_secret),
        ] {
            if value.len() < MIN_SECRET_LEN {
                return Err(ConfigError::Invalid {
                    var: var.to_string(),
                    reason: format!("Must be at least {MIN_SECRET_LEN} characters"),
                });
            }
        }

        if security.jwt_access_secret == security.jwt_refresh_secret {
            return Err(ConfigError::Invalid {
                var: "JWT_REFRESH_SECRET".to_string(),
                reason: "Must differ from JWT_ACCESS_SECRET".to_string(),
            });
        }

        if security.password_pepper.len() < MIN_PEPPER_LEN {
            return Err(ConfigError::Invalid {
                var: "PASSWORD_PEPPER".to_string(),
                reason: format!("Must be at least {MIN_PEPPER_LEN} characters"),
            });
        }

        for (var, secs) in [
            ("ACCESS_TOKEN_TTL_SECS", self.ttl.access_secs),
            ("REFRESH_TOKEN_TTL_SECS", self.ttl.refresh_secs),
            ("VERIFY_TOKEN_TTL_SECS", self.ttl.verify_secs),
            ("RESET_TOKEN_TTL_SECS", self.ttl.reset_secs),
        ] {
            if secs <= 0 {
                return Err(ConfigError::Invalid {
                    var: var.to_string(),
                    reason: "Must be positive".to_string(),
                });
            }
        }

        if self.ttl.refresh_secs <= self.ttl.access_secs {
            return Err(ConfigError::Invalid {
                var: "REFRESH_TOKEN_TTL_SECS".to_string(),
                reason: "Must be longer than ACCESS_TOKEN_TTL_SECS".to_string(),
            });
        }

        Ok(())
    }

    /// Library-level auth settings derived from this configuration
    pub fn auth_config(&self) -> AuthConfig {
        let mut config = AuthConfig::new(
            self.security.jwt_access_secret.clone(),
            self.security.jwt_refresh_secret.clone(),
            self.security.password_pepper.clone(),
            self.base_url.clone(),
        );
        config.access_token_ttl = Duration::seconds(self.ttl.access_secs);
        config.refresh_token_ttl = Duration::seconds(self.ttl.refresh_secs);
        config.verify_token_ttl = Duration::seconds(self.ttl.verify_secs);
        config.reset_token_ttl = Duration::seconds(self.ttl.reset_secs);
        config
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 4000))
}

fn optional(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn required(var: &str, hint: &str) -> Result<String, ConfigError> {
    optional(var).ok_or_else(|| ConfigError::MissingRequired {
        var: var.to_string(),
        hint: hint.to_string(),
    })
}

/// Parse environment variable or return default
fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match optional(var) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var: var.to_string(),
            reason: format!("Cannot parse {value:?}"),
        }),
        None => Ok(default),
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

impl From<InvalidDatabaseSetting> for ConfigError {
    fn from(err: InvalidDatabaseSetting) -> Self {
        ConfigError::Invalid {
            var: err.name.to_string(),
            reason: format!("Cannot parse {:?}", err.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ServerConfig {
        ServerConfig {
            bind: default_bind(),
            database: DatabaseConfig::development(),
            security: SecurityConfig {
                jwt_access_secret: "a".repeat(32),
                jwt_refresh_secret: "r".repeat(32),
                password_pepper: "p".repeat(16),
            },
            ttl: TokenTtlConfig::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            smtp: None,
            metrics_bind: None,
        }
    }

    #[test]
    fn test_default_bind() {
        assert_eq!(default_bind().to_string(), "127.0.0.1:4000");
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = valid_config();
        config.security.jwt_access_secret = "short".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { var, .. }) if var == "JWT_ACCESS_SECRET"
        ));
    }

    #[test]
    fn test_equal_secrets_rejected() {
        let mut config = valid_config();
        config.security.jwt_refresh_secret = config.security.jwt_access_secret.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_short_pepper_rejected() {
        let mut config = valid_config();
        config.security.password_pepper = "pepper".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ttl_rules() {
        let mut config = valid_config();
        config.ttl.reset_secs = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.ttl.refresh_secs = config.ttl.access_secs;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_auth_config_carries_ttls() {
        let mut config = valid_config();
        config.ttl.access_secs = 60;
        config.base_url = "https://example.com/".to_string();

        let auth = config.auth_config();
        assert_eq!(auth.access_token_ttl, Duration::seconds(60));
        assert_eq!(auth.reset_token_ttl, Duration::hours(1));
        assert_eq!(auth.base_url, "https://example.com");
    }

    #[test]
    fn test_security_config_debug_redacts() {
        let rendered = format!("{:?}", valid_config().security);
        assert!(!rendered.contains("aaaa"));
        assert!(rendered.contains("<redacted>"));
    }
}
