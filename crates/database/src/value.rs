use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::fmt;

/// The logical type of a result column, independent of the driver it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Bool,
    Int,
    Float,
    /// Exact numerics (`DECIMAL`, `NUMERIC`). Kept exact in frames as a polars `Decimal`.
    Decimal,
    Text,
    Binary,
    Date,
    DateTime,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Bool => "bool",
            ColumnKind::Int => "int",
            ColumnKind::Float => "float",
            ColumnKind::Decimal => "decimal",
            ColumnKind::Text => "text",
            ColumnKind::Binary => "binary",
            ColumnKind::Date => "date",
            ColumnKind::DateTime => "datetime",
        };
        f.write_str(name)
    }
}

/// Name and type of one column of a `ResultSet`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub kind: ColumnKind,
    /// The type name reported by the driver, e.g. `NVARCHAR` or `INT4`.
    pub source_type: String,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, kind: ColumnKind, source_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            source_type: source_type.into(),
        }
    }
}

/// A single cell of a query result, also used as a bound query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Numeric view of the cell. Decimals outside the `f64` range yield `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::Decimal(v) => v.to_f64(),
            _ => None,
        }
    }

    /// Exact view of the cell. Floats are not converted.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(v) => Some(*v),
            Value::Int(v) => Some(Decimal::from(*v)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            Value::Text(v) => Some(v.as_bytes()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(v) => Some(*v),
            Value::DateTime(v) => Some(v.date()),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(v) => Some(*v),
            Value::Date(v) => v.and_hms_opt(0, 0, 0),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Date(v) => write!(f, "{v}"),
            Value::DateTime(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn numeric_views_widen() {
        assert_eq!(Value::Int(7).as_f64(), Some(7.0));
        assert_eq!(Value::Decimal(Decimal::from_str("1.99").unwrap()).as_f64(), Some(1.99));
        assert_eq!(Value::Bool(true).as_i64(), Some(1));
        assert_eq!(Value::Text("7".into()).as_i64(), None);
    }

    #[test]
    fn decimal_view_stays_exact() {
        let price = Decimal::from_str("0.99").unwrap();
        assert_eq!(Value::Decimal(price).as_decimal(), Some(price));
        assert_eq!(Value::Int(3).as_decimal(), Some(Decimal::from(3)));
        assert_eq!(Value::Float(0.99).as_decimal(), None);
    }

    #[test]
    fn dates_promote_to_midnight() {
        let date = NaiveDate::from_ymd_opt(2009, 1, 1).unwrap();
        let midnight = date.and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(Value::Date(date).as_datetime(), Some(midnight));
        assert_eq!(Value::DateTime(midnight).as_date(), Some(date));
    }
}
