use crate::error::ReportError;
use crate::ranking::{self, RankedRow};
use comfy_table::Table;
use comfy_table::presets::UTF8_FULL;
use database::{DbHandle, repository};
use polars::prelude::DataFrame;
use std::fmt;

const COUNTRY: &str = "Country";
const CUSTOMER_COUNT: &str = "CustomerCount";

/// The countries with the most customers.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryReport {
    pub limit: usize,
    pub rows: Vec<RankedRow<i64>>,
}

impl CountryReport {
    /// Runs the customers-per-country query and ranks the result.
    pub async fn run(db: &mut DbHandle, limit: usize) -> Result<Self, ReportError> {
        let frame = repository::customers_by_country(db).await?.into_dataframe()?;
        let report = Self::from_frame(&frame, limit)?;
        tracing::info!(countries = frame.height(), shown = report.rows.len(), "Country report ready.");
        Ok(report)
    }

    /// Ranks a `Country`/`CustomerCount` frame.
    pub fn from_frame(frame: &DataFrame, limit: usize) -> Result<Self, ReportError> {
        let rows = ranking::rank_i64(frame, COUNTRY, CUSTOMER_COUNT, limit)?;
        Ok(Self { limit, rows })
    }
}

impl fmt::Display for CountryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL).set_header(vec!["Country", "Customers"]);
        for row in &self.rows {
            table.add_row(vec![row.key.clone(), row.value.to_string()]);
        }

        writeln!(f, "Top {} countries by customer count", self.limit)?;
        write!(f, "{table}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use configuration::{DatabaseSettings, Driver};
    use database::DbError;
    use polars::prelude::*;
    use std::time::Duration;

    #[test]
    fn top_five_drops_the_smallest_country() {
        let frame = df!(
            "Country" => &["A", "B", "C", "D", "E", "F"],
            "CustomerCount" => &[10i64, 7, 7, 3, 2, 1],
        )
        .unwrap();

        let report = CountryReport::from_frame(&frame, 5).unwrap();

        assert_eq!(
            report.rows,
            vec![
                RankedRow::new("A", 10),
                RankedRow::new("B", 7),
                RankedRow::new("C", 7),
                RankedRow::new("D", 3),
                RankedRow::new("E", 2),
            ]
        );
    }

    #[test]
    fn unordered_input_is_ranked() {
        let frame = df!(
            "Country" => &["F", "C", "A", "E", "B", "D"],
            "CustomerCount" => &[1i32, 7, 10, 2, 7, 3],
        )
        .unwrap();

        let report = CountryReport::from_frame(&frame, 3).unwrap();
        let keys: Vec<_> = report.rows.iter().map(|r| r.key.as_str()).collect();

        assert_eq!(keys, ["A", "C", "B"]);
    }

    #[test]
    fn rendering_lists_every_row() {
        let frame = df!("Country" => &["USA", "Canada"], "CustomerCount" => &[13i64, 8]).unwrap();
        let rendered = CountryReport::from_frame(&frame, 5).unwrap().to_string();

        assert!(rendered.starts_with("Top 5 countries by customer count"));
        assert!(rendered.contains("USA"));
        assert!(rendered.contains("13"));
        assert!(rendered.contains("Canada"));
    }

    #[tokio::test]
    async fn closed_handle_yields_not_connected() {
        let mut db = DbHandle::new(DatabaseSettings {
            host: "127.0.0.1".to_string(),
            port: Some(1),
            user: "reporter".to_string(),
            password: String::new(),
            database: "Chinook".to_string(),
            driver: Driver::SqlServer,
            connect_timeout: Duration::from_secs(1),
            query_timeout: Duration::from_secs(1),
            trust_server_certificate: true,
        });

        let err = CountryReport::run(&mut db, 5).await.unwrap_err();

        assert!(matches!(err, ReportError::Database(DbError::NotConnected)));
    }
}
