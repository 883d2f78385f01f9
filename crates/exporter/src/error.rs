use database::DbError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to create output directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read from the database: {0}")]
    Database(#[from] DbError),

    #[error("Failed to write snapshot {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: polars::error::PolarsError,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Snapshot {} is already taken by table '{owner}'", .path.display())]
    PathCollision { path: PathBuf, owner: String },
}
