//! Prometheus metrics for the schema service.
//!
//! Covers connection pool usage, migrations, health checks and the
//! per-table repository operations.

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge, CounterVec, Encoder, Gauge, TextEncoder};

// ===== Database Metrics =====
lazy_static! {
    pub static ref DB_OPERATIONS: CounterVec = register_counter_vec!(
        "db_operations_total",
        "Number of repository operations",
        &["operation", "result"] // operation: "user_create", "session_lookup", ...; result: "success" or an error label
    ).expect("Failed to register DB_OPERATIONS");

    pub static ref DB_POOL_OPERATIONS: CounterVec = register_counter_vec!(
        "db_pool_operations_total",
        "Connection pool operations",
        &["operation", "result"] // operation: "configure", "acquire"; result: "success", "failure"
    ).expect("Failed to register DB_POOL_OPERATIONS");

    pub static ref DB_MIGRATION_OPERATIONS: CounterVec = register_counter_vec!(
        "db_migration_operations_total",
        "Migration runs and applied migrations",
        &["result"] // result: "applied", "up_to_date", "failure"
    ).expect("Failed to register DB_MIGRATION_OPERATIONS");

    pub static ref DB_POOL_MAX_SIZE: Gauge = register_gauge!(
        "db_pool_max_size",
        "Configured maximum size of the connection pool"
    ).expect("Failed to register DB_POOL_MAX_SIZE");

    pub static ref DB_HEALTH: Gauge = register_gauge!(
        "db_health",
        "Database health status (1 = healthy, 0 = unhealthy)"
    ).expect("Failed to register DB_HEALTH");
}

/// Forces registration of every metric.
pub fn init() {
    let _ = &*DB_OPERATIONS;
    let _ = &*DB_POOL_OPERATIONS;
    let _ = &*DB_MIGRATION_OPERATIONS;
    let _ = &*DB_POOL_MAX_SIZE;
    let _ = &*DB_HEALTH;
}

/// Gathers the default registry in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Database helpers called from the repositories and the pool.
pub mod db {
    use super::*;

    pub fn query_success(operation: &str) {
        DB_OPERATIONS.with_label_values(&[operation, "success"]).inc();
    }

    pub fn query_failure(operation: &str, reason: &str) {
        DB_OPERATIONS.with_label_values(&[operation, reason]).inc();
    }

    pub fn connection_acquired() {
        DB_POOL_OPERATIONS.with_label_values(&["acquire", "success"]).inc();
    }

    pub fn connection_failed() {
        DB_POOL_OPERATIONS.with_label_values(&["acquire", "failure"]).inc();
    }

    pub fn pool_configured(max_size: u32) {
        DB_POOL_OPERATIONS.with_label_values(&["configure", "success"]).inc();
        DB_POOL_MAX_SIZE.set(f64::from(max_size));
    }

    pub fn pool_configuration_failed() {
        DB_POOL_OPERATIONS.with_label_values(&["configure", "failure"]).inc();
    }

    pub fn migrations_applied(count: usize) {
        DB_MIGRATION_OPERATIONS
            .with_label_values(&["applied"])
            .inc_by(count as f64);
    }

    pub fn migrations_up_to_date() {
        DB_MIGRATION_OPERATIONS.with_label_values(&["up_to_date"]).inc();
    }

    pub fn migration_failed() {
        DB_MIGRATION_OPERATIONS.with_label_values(&["failure"]).inc();
    }

    pub fn set_health(healthy: bool) {
        DB_HEALTH.set(if healthy { 1.0 } else { 0.0 });
    }
}
