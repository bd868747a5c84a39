//! Database configuration and connection pool management.
//!
//! Provides PostgreSQL connectivity through an r2d2 pool and applies the
//! embedded schema migrations.

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::utils::errors::{AppError, DatabaseError};
use crate::utils::metrics;

// =============================================================================
// TYPE DEFINITIONS
// =============================================================================

/// Database connection pool type.
pub type DbPool = Pool<ConnectionManager<PgConnection>>;

/// Pooled database connection type.
pub type DbConnection = PooledConnection<ConnectionManager<PgConnection>>;

/// Schema migrations compiled into the binary.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

// =============================================================================
// CONFIGURATION
// =============================================================================

pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Pool settings, read from the environment with defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_pool_size: u32,
    pub min_idle: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl DatabaseConfig {
    /// Builds a config for `url` with the default pool settings.
    pub fn new(url: impl Into<String>) -> Self {
        DatabaseConfig {
            url: url.into(),
            max_pool_size: 25,
            min_idle: 2,
            connection_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }

    /// Reads the pool configuration from environment variables.
    ///
    /// - `DATABASE_URL`: The connection string (required).
    /// - `DB_MAX_POOL_SIZE`: Max connections (default: 25).
    /// - `DB_MIN_IDLE`: Min idle connections (default: 2).
    /// - `DB_CONNECTION_TIMEOUT_SECS`: Connection timeout (default: 10).
    /// - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 600).
    /// - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800).
    pub fn from_env() -> Result<Self, AppError> {
        let url = env::var(DATABASE_URL_ENV).map_err(|_| {
            error!("Missing {} environment variable", DATABASE_URL_ENV);
            AppError::configuration(format!("{} must be set", DATABASE_URL_ENV))
        })?;

        let defaults = DatabaseConfig::new(url);
        let config = DatabaseConfig {
            max_pool_size: get_env_var("DB_MAX_POOL_SIZE", defaults.max_pool_size),
            min_idle: get_env_var("DB_MIN_IDLE", defaults.min_idle),
            connection_timeout: Duration::from_secs(get_env_var(
                "DB_CONNECTION_TIMEOUT_SECS",
                defaults.connection_timeout.as_secs(),
            )),
            idle_timeout: Duration::from_secs(get_env_var(
                "DB_IDLE_TIMEOUT_SECS",
                defaults.idle_timeout.as_secs(),
            )),
            max_lifetime: Duration::from_secs(get_env_var(
                "DB_MAX_LIFETIME_SECS",
                defaults.max_lifetime.as_secs(),
            )),
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.max_pool_size == 0 {
            return Err(AppError::configuration("DB_MAX_POOL_SIZE must be at least 1"));
        }
        if self.min_idle > self.max_pool_size {
            return Err(AppError::configuration(format!(
                "DB_MIN_IDLE ({}) exceeds DB_MAX_POOL_SIZE ({})",
                self.min_idle, self.max_pool_size
            )));
        }
        Ok(())
    }
}

/// Helper to parse an environment variable with a default value.
fn get_env_var<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

// =============================================================================
// POOL INITIALIZATION
// =============================================================================

/// Builds the connection pool. Fails if no connection can be established
/// within the configured timeout.
pub fn init_pool(config: &DatabaseConfig) -> Result<DbPool, DatabaseError> {
    info!("Initializing PostgreSQL connection pool");

    let manager = ConnectionManager::<PgConnection>::new(config.url.clone());

    let pool = Pool::builder()
        .max_size(config.max_pool_size)
        .min_idle(Some(config.min_idle))
        .connection_timeout(config.connection_timeout)
        .idle_timeout(Some(config.idle_timeout))
        .max_lifetime(Some(config.max_lifetime))
        .test_on_check_out(true)
        .build(manager)
        .map_err(|e| {
            error!("Failed to create PostgreSQL connection pool: {}", e);
            metrics::db::pool_configuration_failed();
            DatabaseError::from(e)
        })?;

    info!(
        "PostgreSQL pool initialized (max={}, min_idle={}, timeout={}s)",
        config.max_pool_size,
        config.min_idle,
        config.connection_timeout.as_secs()
    );

    metrics::db::pool_configured(config.max_pool_size);

    Ok(pool)
}

// =============================================================================
// CONNECTION MANAGEMENT
// =============================================================================

/// Acquires a database connection from the pool.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, DatabaseError> {
    match pool.get() {
        Ok(conn) => {
            metrics::db::connection_acquired();
            Ok(conn)
        }
        Err(e) => {
            error!("Failed to acquire database connection: {}", e);
            metrics::db::connection_failed();
            Err(e.into())
        }
    }
}

// =============================================================================
// DATABASE MIGRATIONS
// =============================================================================

/// Runs pending migrations on one connection and returns the versions applied.
pub fn run_pending(conn: &mut PgConnection) -> Result<Vec<String>, DatabaseError> {
    match conn.run_pending_migrations(MIGRATIONS) {
        Ok(applied) => {
            if applied.is_empty() {
                info!("Database schema is up to date");
                metrics::db::migrations_up_to_date();
            } else {
                info!("Successfully applied {} migration(s)", applied.len());
                for migration in &applied {
                    info!("  - Applied migration: {}", migration);
                }
                metrics::db::migrations_applied(applied.len());
            }
            Ok(applied.iter().map(|v| v.to_string()).collect())
        }
        Err(e) => {
            error!("Failed to run database migrations: {}", e);
            metrics::db::migration_failed();
            Err(DatabaseError::migration(e))
        }
    }
}

/// Runs pending database migrations using a pooled connection.
pub fn run_migrations(pool: &DbPool) -> Result<Vec<String>, DatabaseError> {
    info!("Checking for pending database migrations");
    let mut conn = get_connection(pool)?;
    run_pending(&mut conn)
}

// =============================================================================
// HEALTH CHECKS
// =============================================================================

/// Executes `SELECT 1` on a blocking task to verify connectivity.
pub async fn check_database_health(pool: &DbPool) -> Result<(), DatabaseError> {
    let pool = pool.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let mut conn = get_connection(&pool)?;
        diesel::sql_query("SELECT 1").execute(&mut conn).map_err(|e| {
            warn!("Database health check failed: {}", e);
            DatabaseError::from(e)
        })?;
        Ok::<(), DatabaseError>(())
    })
    .await
    .map_err(|e| {
        error!("Failed to spawn health check task: {}", e);
        DatabaseError::health_check(e.to_string())
    })?;

    metrics::db::set_health(outcome.is_ok());
    outcome
}
