//! sqlx error mapping into the domain taxonomy.
//!
//! Serialization failures, deadlocks and connection-level errors are
//! retryable; constraint violations surface as conflicts; query
//! cancellation (statement timeout) becomes a search timeout. Raw database
//! text never reaches clients: the dispatcher serializes only the mapped
//! kind and message.

use vcon_domain::error::Error;

/// SQLSTATE classes this adapter distinguishes.
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const QUERY_CANCELED: &str = "57014";

/// Map one sqlx error into the domain taxonomy.
pub fn map_sqlx_error(operation: &str, error: sqlx::Error) -> Error {
    match &error {
        sqlx::Error::RowNotFound => Error::not_found(operation.to_owned()),
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some(UNIQUE_VIOLATION) => {
                Error::conflict(format!("{operation}: unique constraint violated"))
            }
            Some(FOREIGN_KEY_VIOLATION) => {
                Error::conflict(format!("{operation}: referenced row is missing"))
            }
            Some(CHECK_VIOLATION) => Error::validation(
                operation.to_owned(),
                "value rejected by a schema constraint",
            ),
            Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED) => Error::storage_with_source(
                format!("{operation}: transaction conflict"),
                true,
                error,
            ),
            Some(QUERY_CANCELED) => {
                Error::search_timeout(format!("{operation}: query exceeded its time budget"))
            }
            _ => Error::storage_with_source(format!("{operation}: statement failed"), false, error),
        },
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            Error::storage_with_source(format!("{operation}: connection failure"), true, error)
        }
        _ => Error::storage_with_source(format!("{operation} failed"), false, error),
    }
}
