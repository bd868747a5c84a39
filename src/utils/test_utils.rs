//! Test utilities for the schema service.
//!
//! Database-backed tests share one migrated pool per test process. They are
//! marked `#[ignore]` and run with `cargo test -- --ignored` against
//! `TEST_DATABASE_URL` (or `DATABASE_URL`). A missing or unreachable
//! database fails those tests instead of skipping them.

#![cfg(test)]

use std::env;
use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use uuid::Uuid;

use crate::config::database::{init_pool, run_migrations, DatabaseConfig, DbConnection, DbPool};
use crate::db::users::{NewUser, User};

// =============================================================================
// TEST DATABASE MANAGEMENT
// =============================================================================

static TEST_POOL: Lazy<DbPool> = Lazy::new(build_test_pool);

fn build_test_pool() -> DbPool {
    dotenvy::from_filename(".env.test").ok();

    let url = resolve_database_url(
        env::var("TEST_DATABASE_URL").ok(),
        env::var("DATABASE_URL").ok(),
    );

    let config = DatabaseConfig {
        max_pool_size: 4,
        min_idle: 0,
        connection_timeout: Duration::from_secs(3),
        ..DatabaseConfig::new(url)
    };

    let pool = init_pool(&config)
        .unwrap_or_else(|e| panic!("test database pool unavailable: {}", e));
    run_migrations(&pool).unwrap_or_else(|e| panic!("test database migrations failed: {}", e));
    pool
}

/// Picks `TEST_DATABASE_URL` over `DATABASE_URL`, panicking when neither is set.
fn resolve_database_url(test_url: Option<String>, fallback: Option<String>) -> String {
    test_url
        .or(fallback)
        .expect("TEST_DATABASE_URL or DATABASE_URL must be set for database tests")
}

/// Returns the shared, migrated test pool.
pub fn make_pool() -> DbPool {
    (*TEST_POOL).clone()
}

/// Returns a connection from the shared test pool.
pub fn connection() -> DbConnection {
    make_pool().get().expect("connection from test pool")
}

// =============================================================================
// TEST DATA BUILDERS
// =============================================================================

/// A value unique to this call, for columns under a unique constraint.
pub fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

/// Inserts a user with a random email.
pub fn insert_user(conn: &mut DbConnection) -> User {
    let email = format!("{}@example.com", unique("user"));
    User::create(conn, NewUser::new("Test User", &email)).expect("insert test user")
}

pub fn in_one_day() -> DateTime<Utc> {
    Utc::now() + chrono::Duration::days(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_values_differ() {
        let a = unique("token");
        let b = unique("token");
        assert!(a.starts_with("token-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_test_database_url_is_preferred() {
        let url = resolve_database_url(
            Some("postgres://localhost/test".to_string()),
            Some("postgres://localhost/app".to_string()),
        );
        assert_eq!(url, "postgres://localhost/test");

        let url = resolve_database_url(None, Some("postgres://localhost/app".to_string()));
        assert_eq!(url, "postgres://localhost/app");
    }

    #[test]
    #[should_panic(expected = "TEST_DATABASE_URL or DATABASE_URL must be set")]
    fn test_missing_database_url_fails_loudly() {
        resolve_database_url(None, None);
    }
}
