use crate::error::ExportError;
use configuration::Compression;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Location of the snapshot for `table` inside `dir`: `<dir>/<table>.parquet`.
///
/// Path separators and control characters in the table name become `_`.
pub fn snapshot_path(dir: &Path, table: &str) -> PathBuf {
    let stem: String = table
        .chars()
        .map(|c| if matches!(c, '/' | '\\') || c.is_control() { '_' } else { c })
        .collect();
    dir.join(format!("{stem}.parquet"))
}

/// Writes `frame` to `path` as Parquet, replacing any existing file.
///
/// The data goes to a `.partial` sibling first and is renamed into place once
/// synced, so an interrupted run never leaves a truncated snapshot behind.
pub fn write_snapshot(
    frame: &mut DataFrame,
    path: &Path,
    compression: Compression,
) -> Result<(), ExportError> {
    let partial = path.with_extension("parquet.partial");

    let result = write_file(frame, &partial, compression)
        .and_then(|()| fs::rename(&partial, path).map_err(|e| io_error(path, e)));

    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result
}

fn write_file(frame: &mut DataFrame, path: &Path, compression: Compression) -> Result<(), ExportError> {
    let mut file = File::create(path).map_err(|e| io_error(path, e))?;

    ParquetWriter::new(&mut file)
        .with_compression(parquet_compression(compression))
        .with_statistics(true)
        .finish(frame)
        .map_err(|source| ExportError::Write {
            path: path.to_path_buf(),
            source,
        })?;

    file.sync_all().map_err(|e| io_error(path, e))
}

fn parquet_compression(compression: Compression) -> ParquetCompression {
    match compression {
        Compression::Uncompressed => ParquetCompression::Uncompressed,
        Compression::Snappy => ParquetCompression::Snappy,
        Compression::Zstd => ParquetCompression::Zstd(None),
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ExportError {
    ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}
