//! PostgreSQL driver, built on `sqlx`.

use crate::error::DbError;
use crate::result_set::ResultSet;
use crate::value::{ColumnKind, ColumnMeta, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgColumn, PgConnectOptions, PgConnection, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::{Column, ConnectOptions, Connection, Executor, Row, Statement, TypeInfo};
use std::str::FromStr;

/// Type names decoded as text. Anything not listed here or mapped in
/// `column_kind` is rejected up front rather than exported as garbage.
const TEXT_TYPES: &[&str] = &[
    "TEXT", "VARCHAR", "BPCHAR", "CHAR", "NAME", "CITEXT", "UUID", "JSON", "JSONB", "TIME",
];

/// Opens a session from a `postgres://` connection URL.
pub(crate) async fn connect(url: &str) -> Result<PgConnection, DbError> {
    let options = PgConnectOptions::from_str(url)
        .map_err(|e| DbError::ConnectionConfigError(e.to_string()))?
        .application_name(env!("CARGO_PKG_NAME"));

    options
        .connect()
        .await
        .map_err(|e| DbError::ConnectionError(e.to_string()))
}

/// Runs `sql` inside its own transaction and materializes every row.
///
/// The statement is prepared first so the column list is known even when
/// the query returns no rows.
pub(crate) async fn run(
    conn: &mut PgConnection,
    sql: &str,
    params: &[Value],
) -> Result<ResultSet, DbError> {
    let mut tx = conn.begin().await.map_err(query_error)?;

    let statement = (&mut *tx).prepare(sql).await.map_err(query_error)?;
    let columns = statement
        .columns()
        .iter()
        .map(column_meta)
        .collect::<Result<Vec<_>, _>>()?;

    let query = params.iter().fold(sqlx::query(sql), bind);
    let rows = query.fetch_all(&mut *tx).await.map_err(query_error)?;

    // Dropping `tx` on an error path above rolls the transaction back.
    tx.commit().await.map_err(query_error)?;

    let rows = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .enumerate()
                .map(|(idx, meta)| decode(row, idx, meta))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ResultSet::new(columns, rows))
}

fn query_error(e: sqlx::Error) -> DbError {
    DbError::QueryError(e.to_string())
}

fn bind<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(v) => query.bind(*v),
        Value::Int(v) => query.bind(*v),
        Value::Float(v) => query.bind(*v),
        Value::Decimal(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.as_str()),
        Value::Bytes(v) => query.bind(v.as_slice()),
        Value::Date(v) => query.bind(*v),
        Value::DateTime(v) => query.bind(*v),
    }
}

fn column_meta(column: &PgColumn) -> Result<ColumnMeta, DbError> {
    let type_name = column.type_info().name();
    let kind = column_kind(type_name).ok_or_else(|| DbError::UnsupportedType {
        column: column.name().to_string(),
        type_name: type_name.to_string(),
    })?;
    Ok(ColumnMeta::new(column.name(), kind, type_name))
}

fn column_kind(type_name: &str) -> Option<ColumnKind> {
    let kind = match type_name {
        "BOOL" => ColumnKind::Bool,
        "INT2" | "INT4" | "INT8" => ColumnKind::Int,
        "FLOAT4" | "FLOAT8" => ColumnKind::Float,
        "NUMERIC" => ColumnKind::Decimal,
        "DATE" => ColumnKind::Date,
        "TIMESTAMP" | "TIMESTAMPTZ" => ColumnKind::DateTime,
        "BYTEA" => ColumnKind::Binary,
        other if TEXT_TYPES.contains(&other) => ColumnKind::Text,
        _ => return None,
    };
    Some(kind)
}

fn decode(row: &PgRow, idx: usize, meta: &ColumnMeta) -> Result<Value, DbError> {
    let decoded = match (meta.kind, meta.source_type.as_str()) {
        (ColumnKind::Bool, _) => row.try_get::<Option<bool>, _>(idx).map(|v| v.map(Value::Bool)),
        (ColumnKind::Int, "INT2") => row
            .try_get::<Option<i16>, _>(idx)
            .map(|v| v.map(|v| Value::Int(v.into()))),
        (ColumnKind::Int, "INT4") => row
            .try_get::<Option<i32>, _>(idx)
            .map(|v| v.map(|v| Value::Int(v.into()))),
        (ColumnKind::Int, _) => row.try_get::<Option<i64>, _>(idx).map(|v| v.map(Value::Int)),
        (ColumnKind::Float, "FLOAT4") => row
            .try_get::<Option<f32>, _>(idx)
            .map(|v| v.map(|v| Value::Float(v.into()))),
        (ColumnKind::Float, _) => row.try_get::<Option<f64>, _>(idx).map(|v| v.map(Value::Float)),
        (ColumnKind::Decimal, _) => row
            .try_get::<Option<Decimal>, _>(idx)
            .map(|v| v.map(Value::Decimal)),
        (ColumnKind::Date, _) => row
            .try_get::<Option<NaiveDate>, _>(idx)
            .map(|v| v.map(Value::Date)),
        (ColumnKind::DateTime, "TIMESTAMPTZ") => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)
            .map(|v| v.map(|dt| Value::DateTime(dt.naive_utc()))),
        (ColumnKind::DateTime, _) => row
            .try_get::<Option<NaiveDateTime>, _>(idx)
            .map(|v| v.map(Value::DateTime)),
        (ColumnKind::Binary, _) => row
            .try_get::<Option<Vec<u8>>, _>(idx)
            .map(|v| v.map(Value::Bytes)),
        (ColumnKind::Text, "UUID") => row
            .try_get::<Option<uuid::Uuid>, _>(idx)
            .map(|v| v.map(|u| Value::Text(u.to_string()))),
        (ColumnKind::Text, "JSON" | "JSONB") => row
            .try_get::<Option<serde_json::Value>, _>(idx)
            .map(|v| v.map(|json| Value::Text(json.to_string()))),
        (ColumnKind::Text, "TIME") => row
            .try_get::<Option<NaiveTime>, _>(idx)
            .map(|v| v.map(|t| Value::Text(t.to_string()))),
        (ColumnKind::Text, _) => row.try_get::<Option<String>, _>(idx).map(|v| v.map(Value::Text)),
    };

    match decoded {
        Ok(value) => Ok(value.unwrap_or(Value::Null)),
        Err(e) => {
            tracing::debug!(column = %meta.name, error = %e, "Could not decode a PostgreSQL value.");
            Err(DbError::TypeMismatch {
                column: meta.name.clone(),
                expected: meta.kind,
            })
        }
    }
}
