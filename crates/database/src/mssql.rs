//! SQL Server driver, speaking TDS through `tiberius`.

use crate::error::DbError;
use crate::result_set::ResultSet;
use crate::value::{ColumnKind, ColumnMeta, Value};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use configuration::DatabaseSettings;
use rust_decimal::Decimal;
use tiberius::xml::XmlData;
use tiberius::{AuthMethod, Client, Column, ColumnData, ColumnType, Config, FromSql, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

pub(crate) type TdsClient = Client<Compat<TcpStream>>;

const NULL_PARAM: Option<i32> = None;

/// Opens a TDS session for `settings`.
///
/// Azure SQL answers the first login with a routing token pointing at the
/// node that owns the database; that redirect is followed once.
pub(crate) async fn connect(settings: &DatabaseSettings) -> Result<TdsClient, DbError> {
    let mut config = Config::new();
    config.host(&settings.host);
    config.port(settings.port_or_default());
    config.database(&settings.database);
    config.application_name(env!("CARGO_PKG_NAME"));
    config.authentication(AuthMethod::sql_server(&settings.user, &settings.password));
    if settings.trust_server_certificate {
        config.trust_cert();
    }

    let tcp = open_socket(&config).await?;
    match Client::connect(config.clone(), tcp.compat_write()).await {
        Ok(client) => Ok(client),
        Err(tiberius::error::Error::Routing { host, port }) => {
            tracing::info!(%host, port, "SQL Server redirected the login.");
            config.host(&host);
            config.port(port);
            let tcp = open_socket(&config).await?;
            Client::connect(config, tcp.compat_write())
                .await
                .map_err(|e| DbError::ConnectionError(e.to_string()))
        }
        Err(e) => Err(DbError::ConnectionError(e.to_string())),
    }
}

async fn open_socket(config: &Config) -> Result<TcpStream, DbError> {
    let tcp = TcpStream::connect(config.get_addr())
        .await
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;
    tcp.set_nodelay(true)
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;
    Ok(tcp)
}

/// Runs `sql` inside its own transaction and materializes the first result set.
pub(crate) async fn run(
    client: &mut TdsClient,
    sql: &str,
    params: &[Value],
) -> Result<ResultSet, DbError> {
    batch(client, "BEGIN TRANSACTION").await?;
    match fetch(client, sql, params).await {
        Ok(result) => {
            batch(client, "COMMIT TRANSACTION").await?;
            Ok(result)
        }
        Err(e) => {
            if let Err(rollback_err) = batch(client, "IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION").await {
                tracing::warn!(error = %rollback_err, "Rollback after a failed query also failed.");
            }
            Err(e)
        }
    }
}

async fn batch(client: &mut TdsClient, sql: &str) -> Result<(), DbError> {
    client
        .simple_query(sql)
        .await
        .map_err(query_error)?
        .into_results()
        .await
        .map_err(query_error)?;
    Ok(())
}

async fn fetch(client: &mut TdsClient, sql: &str, params: &[Value]) -> Result<ResultSet, DbError> {
    let bound: Vec<&dyn ToSql> = params.iter().map(as_param).collect();
    let mut stream = client.query(sql, bound.as_slice()).await.map_err(query_error)?;

    let columns: Vec<ColumnMeta> = match stream.columns().await.map_err(query_error)? {
        Some(columns) => columns.iter().map(column_meta).collect(),
        None => Vec::new(),
    };

    let rows = stream.into_first_result().await.map_err(query_error)?;
    let rows = rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&columns)
                .map(|(data, meta)| decode(data, meta))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ResultSet::new(columns, rows))
}

fn query_error(e: tiberius::error::Error) -> DbError {
    DbError::QueryError(e.to_string())
}

fn as_param(value: &Value) -> &dyn ToSql {
    match value {
        Value::Null => &NULL_PARAM,
        Value::Bool(v) => v,
        Value::Int(v) => v,
        Value::Float(v) => v,
        Value::Decimal(v) => v,
        Value::Text(v) => v,
        Value::Bytes(v) => v,
        Value::Date(v) => v,
        Value::DateTime(v) => v,
    }
}

fn column_meta(column: &Column) -> ColumnMeta {
    let column_type = column.column_type();
    ColumnMeta::new(column.name(), column_kind(column_type), format!("{column_type:?}"))
}

fn column_kind(column_type: ColumnType) -> ColumnKind {
    match column_type {
        ColumnType::Bit | ColumnType::Bitn => ColumnKind::Bool,
        ColumnType::Int1
        | ColumnType::Int2
        | ColumnType::Int4
        | ColumnType::Int8
        | ColumnType::Intn => ColumnKind::Int,
        ColumnType::Float4
        | ColumnType::Float8
        | ColumnType::Floatn
        | ColumnType::Money
        | ColumnType::Money4 => ColumnKind::Float,
        ColumnType::Decimaln | ColumnType::Numericn => ColumnKind::Decimal,
        ColumnType::Datetime
        | ColumnType::Datetime4
        | ColumnType::Datetimen
        | ColumnType::Datetime2
        | ColumnType::DatetimeOffsetn => ColumnKind::DateTime,
        ColumnType::Daten => ColumnKind::Date,
        ColumnType::BigVarBin | ColumnType::BigBinary | ColumnType::Image => ColumnKind::Binary,
        _ => ColumnKind::Text,
    }
}

fn decode(data: ColumnData<'static>, meta: &ColumnMeta) -> Result<Value, DbError> {
    let value = match &data {
        ColumnData::U8(v) => v.map(|v| Value::Int(v.into())),
        ColumnData::I16(v) => v.map(|v| Value::Int(v.into())),
        ColumnData::I32(v) => v.map(|v| Value::Int(v.into())),
        ColumnData::I64(v) => v.map(Value::Int),
        ColumnData::F32(v) => v.map(|v| Value::Float(v.into())),
        ColumnData::F64(v) => v.map(Value::Float),
        ColumnData::Bit(v) => v.map(Value::Bool),
        ColumnData::String(v) => v.as_ref().map(|s| Value::Text(s.to_string())),
        ColumnData::Guid(v) => v.map(|g| Value::Text(g.to_string())),
        ColumnData::Binary(v) => v.as_ref().map(|b| Value::Bytes(b.to_vec())),
        ColumnData::Xml(v) => v.as_ref().map(|x| Value::Text(XmlData::clone(x).into_string())),
        ColumnData::Numeric(_) => Decimal::from_sql(&data)
            .map_err(|e| mismatch(meta, e))?
            .map(Value::Decimal),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(&data)
                .map_err(|e| mismatch(meta, e))?
                .map(Value::DateTime)
        }
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(&data)
            .map_err(|e| mismatch(meta, e))?
            .map(|dt| Value::DateTime(dt.naive_utc())),
        ColumnData::Date(_) => NaiveDate::from_sql(&data)
            .map_err(|e| mismatch(meta, e))?
            .map(Value::Date),
        ColumnData::Time(_) => NaiveTime::from_sql(&data)
            .map_err(|e| mismatch(meta, e))?
            .map(|t| Value::Text(t.to_string())),
    };
    Ok(value.unwrap_or(Value::Null))
}

fn mismatch(meta: &ColumnMeta, e: tiberius::error::Error) -> DbError {
    tracing::debug!(column = %meta.name, error = %e, "Could not convert a TDS value.");
    DbError::TypeMismatch {
        column: meta.name.clone(),
        expected: meta.kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    fn meta(kind: ColumnKind) -> ColumnMeta {
        ColumnMeta::new("c", kind, "test")
    }

    #[test]
    fn integer_widths_collapse_to_int() {
        assert_eq!(column_kind(ColumnType::Intn), ColumnKind::Int);
        assert_eq!(column_kind(ColumnType::Int1), ColumnKind::Int);
        assert_eq!(column_kind(ColumnType::Money), ColumnKind::Float);
        assert_eq!(column_kind(ColumnType::Numericn), ColumnKind::Decimal);
        assert_eq!(column_kind(ColumnType::NVarchar), ColumnKind::Text);
        assert_eq!(column_kind(ColumnType::Guid), ColumnKind::Text);
    }

    #[test]
    fn scalar_cells_decode() {
        let int = decode(ColumnData::I32(Some(42)), &meta(ColumnKind::Int)).unwrap();
        assert_eq!(int, Value::Int(42));

        let tiny = decode(ColumnData::U8(Some(7)), &meta(ColumnKind::Int)).unwrap();
        assert_eq!(tiny, Value::Int(7));

        let text = decode(
            ColumnData::String(Some(Cow::Borrowed("Rock"))),
            &meta(ColumnKind::Text),
        )
        .unwrap();
        assert_eq!(text, Value::Text("Rock".into()));

        let null = decode(ColumnData::F64(None), &meta(ColumnKind::Float)).unwrap();
        assert_eq!(null, Value::Null);
    }

    #[test]
    fn numeric_cells_become_decimals() {
        let numeric = tiberius::numeric::Numeric::new_with_scale(99, 2);
        let value = decode(ColumnData::Numeric(Some(numeric)), &meta(ColumnKind::Decimal)).unwrap();
        assert_eq!(value, Value::Decimal(Decimal::new(99, 2)));
    }
}
