use crate::error::DbError;
use crate::value::{ColumnKind, ColumnMeta, Value};
use polars::prelude::*;
use rust_decimal::Decimal;

/// A fully materialized query result: ordered columns and ordered rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Converts the rows into a polars `DataFrame`, one typed series per column.
    ///
    /// Column order is preserved and every series gets the dtype of its
    /// `ColumnKind`, so an empty result still produces a fully typed frame.
    pub fn into_dataframe(self) -> Result<DataFrame, DbError> {
        let mut series = Vec::with_capacity(self.columns.len());
        for (idx, meta) in self.columns.iter().enumerate() {
            let cells = self.rows.iter().map(|row| row.get(idx).unwrap_or(&Value::Null));
            series.push(build_series(meta, cells)?);
        }
        Ok(DataFrame::new(series)?)
    }
}

/// Builds one typed series from the cells of a column, rejecting cells that
/// do not fit the declared kind.
fn build_series<'a>(
    meta: &ColumnMeta,
    cells: impl Iterator<Item = &'a Value>,
) -> Result<Series, DbError> {
    let name = meta.name.as_str();
    let series = match meta.kind {
        ColumnKind::Bool => {
            let values = collect_cells(meta, cells, Value::as_bool)?;
            Series::new(name, values)
        }
        ColumnKind::Int => {
            let values = collect_cells(meta, cells, Value::as_i64)?;
            Series::new(name, values)
        }
        ColumnKind::Float => {
            let values = collect_cells(meta, cells, Value::as_f64)?;
            Series::new(name, values)
        }
        ColumnKind::Decimal => {
            let values = collect_cells(meta, cells, Value::as_decimal)?;
            decimal_series(name, values)
        }
        ColumnKind::Text => {
            let values = collect_cells(meta, cells, |v| v.as_str().map(str::to_owned))?;
            Series::new(name, values)
        }
        ColumnKind::Binary => {
            let values = collect_cells(meta, cells, |v| v.as_bytes().map(<[u8]>::to_vec))?;
            let mut chunked: BinaryChunked = values.into_iter().collect();
            chunked.rename(name);
            chunked.into_series()
        }
        ColumnKind::Date => {
            let values = collect_cells(meta, cells, |v| v.as_date().map(days_since_epoch))?;
            Int32Chunked::new(name, values.as_slice())
                .into_date()
                .into_series()
        }
        ColumnKind::DateTime => {
            let values = collect_cells(meta, cells, |v| {
                v.as_datetime().map(|dt| dt.and_utc().timestamp_micros())
            })?;
            Int64Chunked::new(name, values.as_slice())
                .into_datetime(TimeUnit::Microseconds, None)
                .into_series()
        }
    };
    Ok(series)
}

/// Exact numerics share the widest scale in the column and are stored as
/// `i128` mantissas, so sums over the frame stay exact.
fn decimal_series(name: &str, values: Vec<Option<Decimal>>) -> Series {
    let scale = values.iter().flatten().map(Decimal::scale).max().unwrap_or(0);
    let mantissas: Int128Chunked = values
        .into_iter()
        .map(|v| {
            v.map(|mut d| {
                d.rescale(scale);
                d.mantissa()
            })
        })
        .collect();
    mantissas
        .with_name(name)
        .into_decimal_unchecked(None, scale as usize)
        .into_series()
}

fn collect_cells<'a, T>(
    meta: &ColumnMeta,
    cells: impl Iterator<Item = &'a Value>,
    extract: impl Fn(&Value) -> Option<T>,
) -> Result<Vec<Option<T>>, DbError> {
    cells
        .map(|cell| {
            if cell.is_null() {
                return Ok(None);
            }
            extract(cell)
                .map(Some)
                .ok_or_else(|| DbError::TypeMismatch {
                    column: meta.name.clone(),
                    expected: meta.kind,
                })
        })
        .collect()
}

fn days_since_epoch(date: chrono::NaiveDate) -> i32 {
    let epoch = chrono::NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    (date - epoch).num_days() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn invoices() -> ResultSet {
        let columns = vec![
            ColumnMeta::new("InvoiceId", ColumnKind::Int, "INT4"),
            ColumnMeta::new("BillingCountry", ColumnKind::Text, "NVARCHAR"),
            ColumnMeta::new("Total", ColumnKind::Decimal, "NUMERIC"),
            ColumnMeta::new("InvoiceDate", ColumnKind::DateTime, "DATETIME"),
        ];
        let day = NaiveDate::from_ymd_opt(2009, 1, 1).unwrap();
        let rows = vec![
            vec![
                Value::Int(1),
                Value::Text("Germany".into()),
                Value::Decimal(Decimal::new(198, 2)),
                Value::DateTime(day.and_hms_opt(0, 0, 0).unwrap()),
            ],
            vec![Value::Int(2), Value::Null, Value::Decimal(Decimal::new(396, 2)), Value::Null],
        ];
        ResultSet::new(columns, rows)
    }

    #[test]
    fn dataframe_keeps_order_types_and_nulls() {
        let df = invoices().into_dataframe().unwrap();

        assert_eq!(df.shape(), (2, 4));
        assert_eq!(
            df.get_column_names(),
            vec!["InvoiceId", "BillingCountry", "Total", "InvoiceDate"]
        );
        assert_eq!(df.column("InvoiceId").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("BillingCountry").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("Total").unwrap().dtype(), &DataType::Decimal(None, Some(2)));
        assert_eq!(
            df.column("InvoiceDate").unwrap().dtype(),
            &DataType::Datetime(TimeUnit::Microseconds, None)
        );
        assert_eq!(df.column("BillingCountry").unwrap().null_count(), 1);
        assert_eq!(df.column("InvoiceDate").unwrap().null_count(), 1);

        let totals = df.column("Total").unwrap().decimal().unwrap();
        let mantissas: &Int128Chunked = totals;
        assert_eq!(totals.scale(), 2);
        assert_eq!(mantissas.into_iter().collect::<Vec<_>>(), vec![Some(198), Some(396)]);
    }

    #[test]
    fn empty_result_still_has_a_schema() {
        let mut rs = invoices();
        rs.rows.clear();
        let df = rs.into_dataframe().unwrap();

        assert_eq!(df.height(), 0);
        assert_eq!(df.width(), 4);
        assert_eq!(df.column("Total").unwrap().dtype(), &DataType::Decimal(None, Some(0)));
    }

    #[test]
    fn decimals_share_the_widest_scale() {
        let columns = vec![ColumnMeta::new("Amount", ColumnKind::Decimal, "NUMERIC")];
        let rows = vec![
            vec![Value::Decimal(Decimal::new(3, 1))],
            vec![Value::Decimal(Decimal::new(125, 3))],
            vec![Value::Null],
        ];
        let df = ResultSet::new(columns, rows).into_dataframe().unwrap();

        let amounts = df.column("Amount").unwrap().decimal().unwrap();
        let mantissas: &Int128Chunked = amounts;
        assert_eq!(amounts.scale(), 3);
        assert_eq!(
            mantissas.into_iter().collect::<Vec<_>>(),
            vec![Some(300), Some(125), None]
        );
    }

    #[test]
    fn datetimes_keep_microseconds() {
        let columns = vec![ColumnMeta::new("At", ColumnKind::DateTime, "DATETIME2")];
        let at = NaiveDate::from_ymd_opt(2009, 1, 1)
            .unwrap()
            .and_hms_micro_opt(12, 30, 0, 123_456)
            .unwrap();
        let df = ResultSet::new(columns, vec![vec![Value::DateTime(at)]])
            .into_dataframe()
            .unwrap();

        let stored = df.column("At").unwrap().datetime().unwrap().get(0);
        assert_eq!(stored, Some(at.and_utc().timestamp_micros()));
    }

    #[test]
    fn dates_and_binary_columns_convert() {
        let columns = vec![
            ColumnMeta::new("Day", ColumnKind::Date, "DATE"),
            ColumnMeta::new("Blob", ColumnKind::Binary, "BYTEA"),
            ColumnMeta::new("Flag", ColumnKind::Bool, "BOOL"),
        ];
        let rows = vec![vec![
            Value::Date(NaiveDate::from_ymd_opt(1970, 1, 11).unwrap()),
            Value::Bytes(vec![1, 2, 3]),
            Value::Bool(true),
        ]];
        let df = ResultSet::new(columns, rows).into_dataframe().unwrap();

        assert_eq!(df.column("Day").unwrap().dtype(), &DataType::Date);
        assert_eq!(df.column("Blob").unwrap().dtype(), &DataType::Binary);
        assert_eq!(df.column("Flag").unwrap().dtype(), &DataType::Boolean);
    }

    #[test]
    fn mismatched_cell_is_reported() {
        let columns = vec![ColumnMeta::new("Quantity", ColumnKind::Int, "INT")];
        let rows = vec![vec![Value::Text("three".into())]];
        let err = ResultSet::new(columns, rows).into_dataframe().unwrap_err();

        assert!(matches!(
            err,
            DbError::TypeMismatch { ref column, expected: ColumnKind::Int } if column == "Quantity"
        ));
    }
}
