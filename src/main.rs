//! Schema service entry point.
//!
//! Brings the database to the schema declared in this crate:
//!
//! 1. Load `.env`, then initialize metrics and structured logging
//! 2. Check required environment variables
//! 3. Validate the table catalog (malformed declarations are fatal)
//! 4. Build the connection pool and apply pending migrations
//! 5. Verify the database answers a health check
//!
//! Subcommands:
//!
//! - `migrate` (default): the full sequence above.
//! - `check`: validate the catalog only, no database access.
//! - `describe`: print the catalog as JSON.
//! - `metrics`: run `migrate`, then print the metrics it recorded in
//!   Prometheus text format.

use std::env;
use std::process::ExitCode;

use auth_schema::config::database::{
    check_database_health, init_pool, run_migrations, DatabaseConfig, DATABASE_URL_ENV,
};
use auth_schema::db::catalog;
use auth_schema::utils::errors::AppError;
use auth_schema::utils::log::{self, LogFormat};
use auth_schema::utils::metrics;
use auth_schema::{log_error, log_info};
use dotenvy::dotenv;
use tracing::{error, info};

/// Required environment variables that must be present for migrations to run
const REQUIRED_ENV_VARS: &[&str] = &[DATABASE_URL_ENV];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Migrate,
    Check,
    Describe,
    Metrics,
}

impl Command {
    fn parse(arg: Option<&str>) -> Result<Self, AppError> {
        match arg {
            None | Some("migrate") => Ok(Command::Migrate),
            Some("check") => Ok(Command::Check),
            Some("describe") => Ok(Command::Describe),
            Some("metrics") => Ok(Command::Metrics),
            Some(other) => Err(AppError::configuration(format!(
                "unknown command '{}' (expected migrate, check, describe or metrics)",
                other
            ))),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env may carry RUST_LOG and LOG_FORMAT, so load it before logging.
    dotenv().ok();

    metrics::init();

    let _log_guard = match log::init(LogFormat::from_env()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(
        service = log::SERVICE_NAME,
        version = env!("CARGO_PKG_VERSION"),
        "Startup: logging & metrics configured"
    );

    let arg = env::args().nth(1);
    let result = match Command::parse(arg.as_deref()) {
        Ok(command) => run(command).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Startup failed");
            log_error!("Startup", &e.to_string(), "failure");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<(), AppError> {
    match command {
        Command::Describe => {
            let text = serde_json::to_string_pretty(&catalog::to_json())
                .map_err(|e| AppError::configuration(e.to_string()))?;
            println!("{}", text);
            Ok(())
        }
        Command::Check => {
            validate_catalog()?;
            Ok(())
        }
        Command::Migrate => migrate().await,
        Command::Metrics => {
            let outcome = migrate().await;
            print!("{}", metrics_report());
            outcome
        }
    }
}

/// Prometheus text exposition of every metric recorded by this process.
fn metrics_report() -> String {
    metrics::gather_metrics()
}

fn validate_catalog() -> Result<(), AppError> {
    catalog::validate(&catalog::tables())?;
    info!(tables = catalog::tables().len(), "Startup: table catalog validated");
    Ok(())
}

async fn migrate() -> Result<(), AppError> {
    check_required_env_vars()?;
    validate_catalog()?;

    let config = DatabaseConfig::from_env()?;
    let pool = init_pool(&config)?;
    info!("Startup: database pool ready");

    let applied = run_migrations(&pool)?;
    log_info!(
        "Migrations",
        &format!("{} migration(s) applied", applied.len()),
        "success"
    );

    check_database_health(&pool).await?;
    info!("Startup: database healthy, schema up to date");
    Ok(())
}

/// Fails when any required environment variable is missing.
fn check_required_env_vars() -> Result<(), AppError> {
    let missing: Vec<&str> = REQUIRED_ENV_VARS
        .iter()
        .copied()
        .filter(|var| env::var(var).is_err())
        .collect();

    if missing.is_empty() {
        info!("Startup: required environment variables present");
        return Ok(());
    }

    for var in &missing {
        error!(variable = var, "Missing required environment variable");
    }
    Err(AppError::configuration(format!(
        "missing environment variables: {}",
        missing.join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse(None).unwrap(), Command::Migrate);
        assert_eq!(Command::parse(Some("migrate")).unwrap(), Command::Migrate);
        assert_eq!(Command::parse(Some("check")).unwrap(), Command::Check);
        assert_eq!(Command::parse(Some("describe")).unwrap(), Command::Describe);
        assert_eq!(Command::parse(Some("metrics")).unwrap(), Command::Metrics);
        assert!(matches!(
            Command::parse(Some("serve")),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_required_env_vars_are_consistent() {
        assert!(
            REQUIRED_ENV_VARS.contains(&"DATABASE_URL"),
            "DATABASE_URL should be in REQUIRED_ENV_VARS"
        );
    }

    #[tokio::test]
    async fn test_check_and_describe_need_no_database() {
        assert!(run(Command::Check).await.is_ok());
        assert!(run(Command::Describe).await.is_ok());
    }

    #[test]
    fn test_metrics_report_exposes_database_metrics() {
        metrics::init();
        metrics::db::pool_configured(3);
        let report = metrics_report();
        assert!(report.contains("db_pool_max_size"));
        assert!(report.contains("db_health"));
    }
}
