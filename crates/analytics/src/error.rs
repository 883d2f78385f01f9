use database::DbError;
use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Report query failed: {0}")]
    Database(#[from] DbError),

    #[error("Aggregation failed: {0}")]
    Frame(#[from] PolarsError),

    #[error("Report input is missing the column '{0}'")]
    MissingColumn(String),

    #[error("Column '{0}' holds an amount that is not a finite decimal")]
    InvalidAmount(String),

    #[error("Invoice month {0} is not a calendar month")]
    InvalidMonth(i64),
}
