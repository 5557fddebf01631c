//! Database module providing PostgreSQL connection pooling and the
//! repository seams the services are written against.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub mod config;
pub mod memory;
pub mod repository;

pub use config::DatabaseConfig;
pub use memory::MemoryStore;
pub use repository::{
    ContentRepository, PgContentRepository, PgTokenRepository, PgUserRepository,
    TokenRepository, UserRepository,
};

/// Liveness probe for whatever backs the repositories
#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn health_check(&self) -> Result<(), sqlx::Error>;
}

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use gatehouse::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let config = DatabaseConfig::development();
    ///     let db = Database::new(&config).await?;
    ///     db.run_migrations().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply any pending schema migrations
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn user_repository(&self) -> PgUserRepository {
        PgUserRepository::new(self.pool.clone())
    }

    pub fn token_repository(&self) -> PgTokenRepository {
        PgTokenRepository::new(self.pool.clone())
    }

    pub fn content_repository(&self) -> PgContentRepository {
        PgContentRepository::new(self.pool.clone())
    }

    /// Close the database connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl StoreHealth for Database {
    async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL"]
    async fn test_database_connection() {
        let mut config = DatabaseConfig::development();
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }

        let db = Database::new(&config)
            .await
            .expect("Failed to connect to database");
        db.run_migrations().await.expect("Migrations failed");
        db.health_check().await.expect("Health check failed");
        db.close().await;
    }
}
