//! # Tabula Exporter
//!
//! Snapshots every table of the source database into one Parquet file per
//! table. The export is best-effort: a table that cannot be read or written is
//! logged, recorded in the `ExportSummary`, and skipped, and the remaining tables
//! are still exported. Only a missing output directory or a failed table listing
//! abort the whole run.

use configuration::{Compression, ExportSettings};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{Instrument, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;
use tracing_indicatif::style::ProgressStyle;

pub mod error;
pub mod snapshot;
pub mod source;

pub use error::ExportError;
pub use snapshot::{snapshot_path, write_snapshot};
pub use source::TableSource;

/// One table that made it to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSnapshot {
    pub table: String,
    pub path: PathBuf,
    pub rows: usize,
    pub columns: usize,
}

/// One table that was skipped, and why.
#[derive(Debug)]
pub struct FailedTable {
    pub table: String,
    pub error: ExportError,
}

#[derive(Debug, Default)]
pub struct ExportSummary {
    pub written: Vec<TableSnapshot>,
    pub failed: Vec<FailedTable>,
}

impl ExportSummary {
    /// True when no table was skipped.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total_rows(&self) -> usize {
        self.written.iter().map(|s| s.rows).sum()
    }
}

/// Writes table snapshots into a single output directory.
#[derive(Debug, Clone)]
pub struct TableExporter {
    output_dir: PathBuf,
    compression: Compression,
    tables: Vec<String>,
}

impl TableExporter {
    pub fn new(settings: &ExportSettings) -> Self {
        Self {
            output_dir: settings.output_dir.clone(),
            compression: settings.compression,
            tables: settings.tables.clone(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Exports every selected table of `source`.
    pub async fn export<S>(&self, source: &mut S) -> Result<ExportSummary, ExportError>
    where
        S: TableSource + ?Sized,
    {
        std::fs::create_dir_all(&self.output_dir).map_err(|source| ExportError::CreateDir {
            path: self.output_dir.clone(),
            source,
        })?;

        let available = source.table_names().await?;
        let selected = self.select(available);
        tracing::info!(
            tables = selected.len(),
            output_dir = %self.output_dir.display(),
            "Exporting tables."
        );

        let span = tracing::info_span!("export");
        span.pb_set_style(&progress_style());
        span.pb_set_length(selected.len() as u64);
        let summary = self.export_selected(source, selected).instrument(span).await;

        tracing::info!(
            written = summary.written.len(),
            failed = summary.failed.len(),
            rows = summary.total_rows(),
            "Export finished."
        );
        Ok(summary)
    }

    /// Exports `tables` one by one inside the progress span.
    ///
    /// Two tables whose names map to the same snapshot file are never both
    /// written: the later one is recorded as failed.
    async fn export_selected<S>(&self, source: &mut S, tables: Vec<String>) -> ExportSummary
    where
        S: TableSource + ?Sized,
    {
        let span = Span::current();
        let mut claimed: HashMap<PathBuf, String> = HashMap::new();
        let mut summary = ExportSummary::default();

        for table in tables {
            span.pb_set_message(&table);
            let path = snapshot_path(&self.output_dir, &table);

            let result = match claimed.get(&path) {
                Some(owner) => Err(ExportError::PathCollision {
                    path: path.clone(),
                    owner: owner.clone(),
                }),
                None => {
                    claimed.insert(path.clone(), table.clone());
                    self.export_table(source, &table, path).await
                }
            };

            match result {
                Ok(snapshot) => {
                    tracing::info!(
                        table = %snapshot.table,
                        rows = snapshot.rows,
                        path = %snapshot.path.display(),
                        "Table exported."
                    );
                    summary.written.push(snapshot);
                }
                Err(error) => {
                    tracing::error!(%table, %error, "Table skipped.");
                    summary.failed.push(FailedTable { table, error });
                }
            }
            span.pb_inc(1);
        }
        summary
    }

    async fn export_table<S>(
        &self,
        source: &mut S,
        table: &str,
        path: PathBuf,
    ) -> Result<TableSnapshot, ExportError>
    where
        S: TableSource + ?Sized,
    {
        let mut frame = source.read_table(table).await?;
        write_snapshot(&mut frame, &path, self.compression)?;

        Ok(TableSnapshot {
            table: table.to_string(),
            path,
            rows: frame.height(),
            columns: frame.width(),
        })
    }

    /// Applies the configured table filter (case-insensitive), keeping source order.
    fn select(&self, available: Vec<String>) -> Vec<String> {
        if self.tables.is_empty() {
            return available;
        }

        for wanted in &self.tables {
            if !available.iter().any(|t| t.eq_ignore_ascii_case(wanted)) {
                tracing::warn!(table = %wanted, "Requested table does not exist in the source.");
            }
        }
        available
            .into_iter()
            .filter(|t| self.tables.iter().any(|w| w.eq_ignore_ascii_case(t)))
            .collect()
    }
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use database::DbError;
    use polars::prelude::*;
    use std::fs::File;

    /// Tables held in memory; a `None` frame fails to read.
    struct MemorySource {
        tables: Vec<(String, Option<DataFrame>)>,
    }

    #[async_trait]
    impl TableSource for MemorySource {
        async fn table_names(&mut self) -> Result<Vec<String>, DbError> {
            Ok(self.tables.iter().map(|(name, _)| name.clone()).collect())
        }

        async fn read_table(&mut self, table: &str) -> Result<DataFrame, DbError> {
            self.tables
                .iter()
                .find(|(name, _)| name == table)
                .and_then(|(_, frame)| frame.clone())
                .ok_or_else(|| DbError::QueryError(format!("Invalid object name '{table}'.")))
        }
    }

    struct UnreachableSource;

    #[async_trait]
    impl TableSource for UnreachableSource {
        async fn table_names(&mut self) -> Result<Vec<String>, DbError> {
            Err(DbError::NotConnected)
        }

        async fn read_table(&mut self, _table: &str) -> Result<DataFrame, DbError> {
            Err(DbError::NotConnected)
        }
    }

    fn chinook() -> MemorySource {
        MemorySource {
            tables: vec![
                (
                    "Customer".to_string(),
                    Some(
                        df!(
                            "CustomerId" => &[1i64, 2, 3],
                            "Country" => &["Brazil", "Germany", "Canada"],
                        )
                        .unwrap(),
                    ),
                ),
                (
                    "Genre".to_string(),
                    Some(df!("GenreId" => &[1i64, 2], "Name" => &["Rock", "Jazz"]).unwrap()),
                ),
                ("Playlist".to_string(), None),
            ],
        }
    }

    fn exporter(dir: &Path, tables: &[&str]) -> TableExporter {
        TableExporter::new(&ExportSettings {
            output_dir: dir.to_path_buf(),
            compression: Compression::Snappy,
            tables: tables.iter().map(|t| t.to_string()).collect(),
        })
    }

    fn read_back(path: &Path) -> DataFrame {
        ParquetReader::new(File::open(path).unwrap()).finish().unwrap()
    }

    #[tokio::test]
    async fn each_table_gets_one_matching_file() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("nested").join("parquet_tables");
        let mut source = chinook();

        let summary = exporter(&out, &[]).export(&mut source).await.unwrap();

        assert_eq!(summary.written.len(), 2);
        for snapshot in &summary.written {
            let (_, expected) = source.tables.iter().find(|(n, _)| n == &snapshot.table).unwrap();
            let expected = expected.as_ref().unwrap();
            let written = read_back(&snapshot.path);

            assert_eq!(snapshot.path, out.join(format!("{}.parquet", snapshot.table)));
            assert_eq!(written.height(), expected.height());
            assert_eq!(written.get_column_names(), expected.get_column_names());
            assert_eq!(snapshot.rows, expected.height());
            assert_eq!(snapshot.columns, expected.width());
        }
        assert_eq!(summary.total_rows(), 5);

        let mut files: Vec<_> = std::fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        files.sort();
        assert_eq!(files, vec!["Customer.parquet", "Genre.parquet"]);
    }

    #[tokio::test]
    async fn a_failing_table_is_skipped_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let mut source = chinook();

        let summary = exporter(tmp.path(), &[]).export(&mut source).await.unwrap();

        assert!(!summary.is_complete());
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].table, "Playlist");
        assert!(matches!(summary.failed[0].error, ExportError::Database(DbError::QueryError(_))));
        assert!(!tmp.path().join("Playlist.parquet").exists());
        assert!(tmp.path().join("Genre.parquet").exists());
    }

    #[tokio::test]
    async fn rerunning_produces_identical_files() {
        let tmp = tempfile::tempdir().unwrap();
        let exporter = exporter(tmp.path(), &["customer"]);

        exporter.export(&mut chinook()).await.unwrap();
        let first = std::fs::read(tmp.path().join("Customer.parquet")).unwrap();
        exporter.export(&mut chinook()).await.unwrap();
        let second = std::fs::read(tmp.path().join("Customer.parquet")).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn table_filter_is_case_insensitive() {
        let tmp = tempfile::tempdir().unwrap();

        let summary = exporter(tmp.path(), &["GENRE", "Missing"])
            .export(&mut chinook())
            .await
            .unwrap();

        assert!(summary.is_complete());
        assert_eq!(summary.written.len(), 1);
        assert_eq!(summary.written[0].table, "Genre");
    }

    #[tokio::test]
    async fn colliding_file_names_skip_the_later_table() {
        let tmp = tempfile::tempdir().unwrap();
        let mut source = MemorySource {
            tables: vec![
                ("a/b".to_string(), Some(df!("Id" => &[1i64]).unwrap())),
                ("a_b".to_string(), Some(df!("Id" => &[2i64, 3]).unwrap())),
            ],
        };

        let summary = exporter(tmp.path(), &[]).export(&mut source).await.unwrap();

        assert_eq!(summary.written.len(), 1);
        assert_eq!(summary.written[0].table, "a/b");
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].table, "a_b");
        assert!(matches!(
            &summary.failed[0].error,
            ExportError::PathCollision { owner, .. } if owner == "a/b"
        ));
        assert_eq!(read_back(&tmp.path().join("a_b.parquet")).height(), 1);
    }

    #[tokio::test]
    async fn listing_failure_aborts_the_export() {
        let tmp = tempfile::tempdir().unwrap();

        let err = exporter(tmp.path(), &[])
            .export(&mut UnreachableSource)
            .await
            .unwrap_err();

        assert!(matches!(err, ExportError::Database(DbError::NotConnected)));
    }

    #[tokio::test]
    async fn output_dir_that_is_a_file_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not_a_dir");
        std::fs::write(&blocker, b"").unwrap();

        let err = exporter(&blocker, &[]).export(&mut chinook()).await.unwrap_err();

        assert!(matches!(err, ExportError::CreateDir { .. }));
    }
}
