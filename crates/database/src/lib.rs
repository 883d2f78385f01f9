//! # Tabula Database Crate
//!
//! This crate is the only place that talks to the source database. It hides the
//! driver differences between SQL Server (TDS, via `tiberius`) and PostgreSQL
//! (via `sqlx`) behind a single handle and a driver-neutral result type.
//!
//! ## Architectural Principles
//!
//! - **Adapter:** all SQL text and every driver type lives here. Callers see
//!   `ResultSet`s and polars `DataFrame`s, never driver rows.
//! - **Explicit lifecycle:** a `DbHandle` is opened, used, and closed. Failures
//!   come back as `DbError` values; the handle releases its session on drop.
//! - **Read-only:** nothing in this crate writes to the source database.
//!
//! ## Public API
//!
//! - `DbHandle`: `open`, `run`, `close` over a single session.
//! - `connection_string`: the percent-encoded connection URL for a set of settings.
//! - `repository`: the fixed catalog and report queries.
//! - `ResultSet`, `Value`, `ColumnMeta`, `ColumnKind`: materialized query results.
//! - `DbError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod dialect;
pub mod error;
mod mssql;
mod postgres;
pub mod repository;
pub mod result_set;
pub mod value;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{DbHandle, connection_string, redacted_connection_string};
pub use dialect::Dialect;
pub use error::DbError;
pub use result_set::ResultSet;
pub use value::{ColumnKind, ColumnMeta, Value};
