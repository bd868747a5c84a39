//! Error types for the schema service.
//!
//! Two families of failure exist:
//!
//! 1.  **Declaration errors (`SchemaError`):** a table definition in the
//!     catalog is malformed. These are detected once at startup and are
//!     fatal.
//!
//! 2.  **Database errors (`DatabaseError`):** pool, query and migration
//!     failures, with constraint violations reported by PostgreSQL lifted
//!     into their own variants so callers can react to them by name.
//!
//! `AppError` unifies both with configuration failures for the binary.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;
use tracing_error::SpanTrace;

// =============================================================================
// DATABASE ERRORS
// =============================================================================

/// Groups all errors related to database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection pool error")]
    ConnectionPool {
        #[source]
        source: r2d2::Error,
        span: SpanTrace,
    },
    #[error("Database query error")]
    Query {
        #[source]
        source: DieselError,
        span: SpanTrace,
    },
    #[error("Database migration error")]
    Migration {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        span: SpanTrace,
    },
    #[error("Record not found")]
    NotFound { span: SpanTrace },
    #[error("Unique constraint violated ({}): {message}", .constraint.as_deref().unwrap_or("unnamed"))]
    UniqueViolation {
        constraint: Option<String>,
        message: String,
        span: SpanTrace,
    },
    #[error("Foreign key constraint violated ({}): {message}", .constraint.as_deref().unwrap_or("unnamed"))]
    ForeignKeyViolation {
        constraint: Option<String>,
        message: String,
        span: SpanTrace,
    },
    #[error("Not-null constraint violated ({}): {message}", .column.as_deref().unwrap_or("unknown column"))]
    NotNullViolation {
        column: Option<String>,
        message: String,
        span: SpanTrace,
    },
    #[error("Database health check failed: {message}")]
    HealthCheck { message: String, span: SpanTrace },
}

impl DatabaseError {
    /// Wraps a migration harness error.
    pub fn migration(source: Box<dyn std::error::Error + Send + Sync>) -> Self {
        DatabaseError::Migration {
            source,
            span: SpanTrace::capture(),
        }
    }

    pub fn health_check(message: impl Into<String>) -> Self {
        DatabaseError::HealthCheck {
            message: message.into(),
            span: SpanTrace::capture(),
        }
    }

    /// Name of the violated constraint, when PostgreSQL reported one.
    pub fn constraint_name(&self) -> Option<&str> {
        match self {
            DatabaseError::UniqueViolation { constraint, .. }
            | DatabaseError::ForeignKeyViolation { constraint, .. } => constraint.as_deref(),
            _ => None,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DatabaseError::UniqueViolation { .. })
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(self, DatabaseError::ForeignKeyViolation { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound { .. })
    }

    /// Short label used for the `result` dimension of database metrics.
    pub fn metric_label(&self) -> &'static str {
        match self {
            DatabaseError::ConnectionPool { .. } => "pool_error",
            DatabaseError::Query { .. } => "query_error",
            DatabaseError::Migration { .. } => "migration_error",
            DatabaseError::NotFound { .. } => "not_found",
            DatabaseError::UniqueViolation { .. } => "unique_violation",
            DatabaseError::ForeignKeyViolation { .. } => "foreign_key_violation",
            DatabaseError::NotNullViolation { .. } => "not_null_violation",
            DatabaseError::HealthCheck { .. } => "health_check_failed",
        }
    }
}

// =============================================================================
// SCHEMA DECLARATION ERRORS
// =============================================================================

/// A malformed table declaration, found while validating the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("duplicate table name: {0}")]
    DuplicateTable(String),
    #[error("duplicate column name: {table}.{column}")]
    DuplicateColumn { table: String, column: String },
    #[error("table '{0}' must have a primary key")]
    MissingPrimaryKey(String),
    #[error("primary key column not found: {table}.{column}")]
    PrimaryKeyColumnNotFound { table: String, column: String },
    #[error("primary key column must be NOT NULL: {table}.{column}")]
    NullablePrimaryKey { table: String, column: String },
    #[error("index '{index}' on '{table}' has no columns")]
    EmptyIndex { table: String, index: String },
    #[error("index references non-existent column: {table}.{index} -> {column}")]
    IndexColumnNotFound {
        table: String,
        index: String,
        column: String,
    },
    #[error("foreign key '{constraint}' on '{table}' has no columns")]
    EmptyForeignKey { table: String, constraint: String },
    #[error("foreign key references non-existent column: {table}.{constraint} -> {column}")]
    ForeignKeyColumnNotFound {
        table: String,
        constraint: String,
        column: String,
    },
    #[error("foreign key references non-existent table: {table}.{constraint} -> {ref_table}")]
    ForeignKeyTableNotFound {
        table: String,
        constraint: String,
        ref_table: String,
    },
    #[error("foreign key references non-existent column: {table}.{constraint} -> {ref_table}.{ref_column}")]
    ForeignKeyRefColumnNotFound {
        table: String,
        constraint: String,
        ref_table: String,
        ref_column: String,
    },
    #[error("foreign key '{constraint}' on '{table}' has {local} local columns but {referenced} referenced columns")]
    ForeignKeyArity {
        table: String,
        constraint: String,
        local: usize,
        referenced: usize,
    },
    #[error("foreign key '{constraint}' on '{table}': column '{column}' type does not match '{ref_table}.{ref_column}'")]
    ForeignKeyTypeMismatch {
        table: String,
        constraint: String,
        column: String,
        ref_table: String,
        ref_column: String,
    },
    #[error("foreign key '{constraint}' on '{table}' must reference a primary key or unique index of '{ref_table}'")]
    ForeignKeyTargetNotUnique {
        table: String,
        constraint: String,
        ref_table: String,
    },
    #[error("duplicate index or constraint name: {0}")]
    DuplicateConstraintName(String),
}

// =============================================================================
// UNIFIED ERROR
// =============================================================================

/// The main error type returned by the binary's startup sequence.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl AppError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        AppError::Configuration(msg.into())
    }
}

// =============================================================================
// CONVERSIONS FROM LIBRARY ERRORS
// =============================================================================

impl From<r2d2::Error> for DatabaseError {
    fn from(err: r2d2::Error) -> Self {
        DatabaseError::ConnectionPool {
            source: err,
            span: SpanTrace::capture(),
        }
    }
}

impl From<DieselError> for DatabaseError {
    fn from(err: DieselError) -> Self {
        let span = SpanTrace::capture();
        match err {
            DieselError::NotFound => DatabaseError::NotFound { span },
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                DatabaseError::UniqueViolation {
                    constraint: info.constraint_name().map(str::to_owned),
                    message: info.message().to_owned(),
                    span,
                }
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                DatabaseError::ForeignKeyViolation {
                    constraint: info.constraint_name().map(str::to_owned),
                    message: info.message().to_owned(),
                    span,
                }
            }
            DieselError::DatabaseError(DatabaseErrorKind::NotNullViolation, info) => {
                DatabaseError::NotNullViolation {
                    column: info.column_name().map(str::to_owned),
                    message: info.message().to_owned(),
                    span,
                }
            }
            other => DatabaseError::Query { source: other, span },
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::DatabaseErrorInformation;

    struct FakeInfo {
        message: &'static str,
        constraint: Option<&'static str>,
        column: Option<&'static str>,
    }

    impl DatabaseErrorInformation for FakeInfo {
        fn message(&self) -> &str {
            self.message
        }
        fn details(&self) -> Option<&str> {
            None
        }
        fn hint(&self) -> Option<&str> {
            None
        }
        fn table_name(&self) -> Option<&str> {
            None
        }
        fn column_name(&self) -> Option<&str> {
            self.column
        }
        fn constraint_name(&self) -> Option<&str> {
            self.constraint
        }
        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    fn db_error(
        kind: DatabaseErrorKind,
        constraint: Option<&'static str>,
        column: Option<&'static str>,
    ) -> DieselError {
        DieselError::DatabaseError(
            kind,
            Box::new(FakeInfo {
                message: "violation",
                constraint,
                column,
            }),
        )
    }

    #[test]
    fn test_unique_violation_keeps_constraint_name() {
        let err: DatabaseError = db_error(
            DatabaseErrorKind::UniqueViolation,
            Some("session_sessionToken_unique"),
            None,
        )
        .into();

        assert!(err.is_unique_violation());
        assert_eq!(err.constraint_name(), Some("session_sessionToken_unique"));
        assert_eq!(err.metric_label(), "unique_violation");
        assert!(err.to_string().contains("session_sessionToken_unique"));
    }

    #[test]
    fn test_foreign_key_violation_is_classified() {
        let err: DatabaseError =
            db_error(DatabaseErrorKind::ForeignKeyViolation, Some("account_user_fk"), None).into();

        assert!(err.is_foreign_key_violation());
        assert_eq!(err.constraint_name(), Some("account_user_fk"));
    }

    #[test]
    fn test_not_null_violation_reports_column() {
        let err: DatabaseError =
            db_error(DatabaseErrorKind::NotNullViolation, None, Some("session_token")).into();

        match err {
            DatabaseError::NotNullViolation { column, .. } => {
                assert_eq!(column.as_deref(), Some("session_token"))
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_not_found_and_other_errors() {
        let not_found: DatabaseError = DieselError::NotFound.into();
        assert!(not_found.is_not_found());
        assert_eq!(not_found.constraint_name(), None);

        let other: DatabaseError = DieselError::RollbackTransaction.into();
        assert!(matches!(other, DatabaseError::Query { .. }));
        assert_eq!(other.metric_label(), "query_error");
    }

    #[test]
    fn test_unnamed_constraint_display() {
        let err: DatabaseError = db_error(DatabaseErrorKind::UniqueViolation, None, None).into();
        assert!(err.to_string().contains("unnamed"));
    }

    #[test]
    fn test_app_error_wraps_schema_error() {
        let err: AppError = SchemaError::MissingPrimaryKey("post".to_string()).into();
        assert_eq!(err.to_string(), "table 'post' must have a primary key");

        let cfg = AppError::configuration("DATABASE_URL must be set");
        assert!(cfg.to_string().starts_with("Configuration error"));
    }
}
