//! Auth and content API server.
//!
//! Loads configuration, connects to PostgreSQL (or runs on the in-memory
//! store), picks a mail transport and serves the HTTP API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Error};
use gatehouse::{
    AccountManager, AuthManager, ContentManager,
    db::{Database, MemoryStore, StoreHealth},
    mail::{LogMailer, Mailer, SmtpMailer},
};
use gatehouse_server::{
    api::{self, AppState},
    config::ServerConfig,
    logging, metrics,
};
use pico_args::Arguments;
use tracing::info;

const HELP: &str = "\
Run the gatehouse auth and content API server

USAGE:
  gatehouse_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:4000]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  --memory                 Keep all state in memory instead of PostgreSQL
  -h, --help               Print help information

ENVIRONMENT:
  JWT_ACCESS_SECRET        Access token signing secret (required, 32+ chars)
  JWT_REFRESH_SECRET       Refresh token signing secret (required, 32+ chars)
  PASSWORD_PEPPER          Password hashing pepper (required, 16+ chars)
  BASE_URL                 Public URL used in mailed links
  SMTP_HOST, SMTP_USER     Enable SMTP delivery (otherwise mail is logged)
  METRICS_BIND             Prometheus exporter address
  (See .env.example for all configuration options)
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    memory: bool,
}

/// Repositories and health probe, backed by either store
struct Backend {
    auth: Arc<AuthManager>,
    accounts: Arc<AccountManager>,
    content: Arc<ContentManager>,
    health: Arc<dyn StoreHealth>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        memory: pargs.contains("--memory"),
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url)
        .context("Invalid configuration")?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(Error::msg)?;
        info!("Prometheus metrics exported on {}", addr);
    }

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => {
            info!("Sending mail through {}:{}", smtp.host, smtp.port);
            Arc::new(SmtpMailer::new(smtp).context("Invalid SMTP configuration")?)
        }
        None => {
            info!("SMTP not configured, outgoing mail will be logged");
            Arc::new(LogMailer)
        }
    };

    let backend = if args.memory {
        info!("Using in-memory store; all data is lost on exit");
        let store = Arc::new(MemoryStore::new());
        let auth = Arc::new(AuthManager::new(
            store.clone(),
            store.clone(),
            mailer,
            config.auth_config(),
        )?);
        Backend {
            accounts: Arc::new(AccountManager::new(store.clone(), auth.clone())),
            content: Arc::new(ContentManager::new(store.clone())),
            health: store,
            auth,
        }
    } else {
        info!("Connecting to database");
        let db = Database::new(&config.database)
            .await
            .context("Failed to connect to database")?;
        db.run_migrations()
            .await
            .context("Failed to run migrations")?;
        info!("Database connected and migrated");

        let users = Arc::new(db.user_repository());
        let auth = Arc::new(AuthManager::new(
            users.clone(),
            Arc::new(db.token_repository()),
            mailer,
            config.auth_config(),
        )?);
        Backend {
            accounts: Arc::new(AccountManager::new(users, auth.clone())),
            content: Arc::new(ContentManager::new(Arc::new(db.content_repository()))),
            health: Arc::new(db),
            auth,
        }
    };

    let app = api::create_router(AppState {
        auth: backend.auth,
        accounts: backend.accounts,
        content: backend.content,
        health: backend.health,
    });

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down server...");

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
