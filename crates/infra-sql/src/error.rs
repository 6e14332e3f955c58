// sqlx::Error -> RepositoryError mapping
// (orphan rules: cannot implement From<sqlx::Error> for core types here)

use metarepo_core::RepositoryError;
use std::time::Duration;

/// Convert a sqlx error raised while borrowing from the pool
///
/// sqlx reports both a saturated pool and a connection that could not be
/// opened before the deadline as `PoolTimedOut`; `saturated` tells them apart.
pub(crate) fn map_acquire_error(
    err: sqlx::Error,
    timeout: Duration,
    saturated: bool,
) -> RepositoryError {
    let timeout_ms = timeout.as_millis() as u64;
    match err {
        sqlx::Error::PoolTimedOut if saturated => RepositoryError::PoolExhausted { timeout_ms },
        sqlx::Error::PoolTimedOut => RepositoryError::Database(format!(
            "unable to establish a connection within {}ms",
            timeout_ms
        )),
        sqlx::Error::PoolClosed => {
            RepositoryError::Database("Connection pool has been closed".to_string())
        }
        other => map_sqlx_error(other),
    }
}

/// Convert sqlx::Error to RepositoryError with structured information
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            Some(code) => RepositoryError::Database(format!(
                "Database error [{}]: {}",
                code,
                db_err.message()
            )),
            None => RepositoryError::Database(format!("Database error: {}", db_err.message())),
        },
        sqlx::Error::RowNotFound => RepositoryError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            RepositoryError::Database(format!("Column not found: {}", col))
        }
        _ => RepositoryError::Database(err.to_string()),
    }
}
