//! # Tabula Reports
//!
//! Fixed aggregate reports over the Chinook sales schema.
//!
//! ## Architectural Principles
//!
//! - **Computation apart from rendering:** every report has a pure
//!   `from_frame` constructor that turns a query result into ranked rows, and a
//!   `Display` impl that renders them as a console table. Only `run` touches the
//!   database.
//! - **Deterministic ties:** groups keep first-encountered order and ranking is
//!   a stable descending sort, so equal measures are reported in the order the
//!   query produced them.
//!
//! ## Public API
//!
//! - `CountryReport`: customers per country, top N.
//! - `SalesReport`: top tracks, artists and genres plus the best sales month.
//! - `ReportError`: the specific error types that can be returned from this crate.

pub mod country;
pub mod error;
pub mod ranking;
pub mod sales;

pub use country::CountryReport;
pub use error::ReportError;
pub use ranking::RankedRow;
pub use sales::{BestMonth, SalesReport};
