//! Structured logging configuration.
//!
//! The library logs through the `log` facade; the subscriber installed here
//! picks those records up alongside the server's own `tracing` events.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var.
///
/// # Example
///
/// ```no_run
/// use gatehouse_server::logging;
///
/// logging::init();
/// tracing::info!("Server starting");
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log security event with structured data
///
/// # Example
///
/// ```
/// use gatehouse_server::logging::log_security_event;
///
/// log_security_event("failed_login", None, "Invalid credentials for a***@example.com");
/// ```
pub fn log_security_event(event_type: &str, user_id: Option<&str>, message: &str) {
    tracing::warn!(
        event_type = event_type,
        user_id = user_id,
        "SECURITY: {}",
        message
    );
}

/// Mask an email address for logs: first character of the local part and
/// the domain survive, e.g. `a***@example.com`. Anything without an `@` is
/// masked entirely.
pub fn redact_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) if !local.is_empty() => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            format!("{first}***@{domain}")
        }
        _ => "***".to_string(),
    }
}

/// Log API request/response
pub fn log_api_request(method: &str, path: &str, status_code: u16, duration_ms: u64) {
    tracing::info!(
        http_method = method,
        http_path = path,
        http_status = status_code,
        duration_ms = duration_ms,
        "API request completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_security_event() {
        // Just ensure it doesn't panic
        log_security_event("test_event", Some("user-1"), "Test message");
        log_security_event("test_event", None, "Test message");
    }

    #[test]
    fn test_redact_email() {
        assert_eq!(redact_email("alice@example.com"), "a***@example.com");
        assert_eq!(redact_email(" Bob@x.com "), "B***@x.com");
        assert_eq!(redact_email("@x.com"), "***");
        assert_eq!(redact_email("not an email"), "***");
        assert!(!redact_email("alice@example.com").contains("alice"));
    }

    #[test]
    fn test_log_api_request() {
        log_api_request("GET", "/api/users", 200, 45);
        log_api_request("POST", "/api/auth/login", 401, 120);
    }
}
