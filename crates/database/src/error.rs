use crate::value::ColumnKind;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Invalid database connection settings: {0}")]
    ConnectionConfigError(String),

    #[error("Failed to connect to the database: {0}")]
    ConnectionError(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Timed out after {0:?} waiting for the database.")]
    Timeout(Duration),

    #[error("The database connection is not open.")]
    NotConnected,

    #[error("Column '{column}' has type {type_name}, which cannot be exported.")]
    UnsupportedType { column: String, type_name: String },

    #[error("Column '{column}' holds a value that is not a valid {expected}.")]
    TypeMismatch { column: String, expected: ColumnKind },

    #[error("Failed to build a dataframe from the result set: {0}")]
    Frame(#[from] polars::error::PolarsError),
}
