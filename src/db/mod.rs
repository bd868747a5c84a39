pub mod accounts;
pub mod catalog;
pub mod posts;
pub mod schema;
pub mod sessions;
pub mod users;

use diesel::QueryResult;
use tracing::error;

use crate::log_debug;
use crate::utils::errors::DatabaseError;
use crate::utils::metrics;

/// Converts a diesel result, recording the outcome under `operation`.
///
/// Missing rows are logged at debug level; every other failure at error.
pub(crate) fn record<T>(operation: &'static str, result: QueryResult<T>) -> Result<T, DatabaseError> {
    match result {
        Ok(value) => {
            metrics::db::query_success(operation);
            Ok(value)
        }
        Err(e) => {
            let err = DatabaseError::from(e);
            if err.is_not_found() {
                log_debug!(operation, "Database lookup found no row", "not_found");
            } else {
                error!(operation, error = %err, "Database operation failed");
            }
            metrics::db::query_failure(operation, err.metric_label());
            Err(err)
        }
    }
}
