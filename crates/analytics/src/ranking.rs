//! Group-by, sum and top-N helpers shared by the reports.

use crate::error::ReportError;
use polars::prelude::*;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

/// Label used for a group whose key is NULL.
pub const NULL_KEY: &str = "(none)";

/// One ranked group: the group key and its summed measure.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedRow<V> {
    pub key: String,
    pub value: V,
}

impl<V> RankedRow<V> {
    pub fn new(key: impl Into<String>, value: V) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Keeps the `n` rows with the largest value.
///
/// The sort is stable, so rows with equal values stay in input order.
pub fn top_n<V: PartialOrd>(mut rows: Vec<RankedRow<V>>, n: usize) -> Vec<RankedRow<V>> {
    rows.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));
    rows.truncate(n);
    rows
}

/// Sums `measure` per distinct combination of `keys`, with groups in
/// first-encountered order. The measure is cast to `dtype` before summing.
pub fn sum_by(
    frame: &DataFrame,
    keys: &[&str],
    measure: &str,
    dtype: DataType,
) -> Result<DataFrame, ReportError> {
    require(frame, keys.iter().copied().chain([measure]))?;

    let by: Vec<Expr> = keys.iter().map(|k| col(k)).collect();
    let grouped = frame
        .clone()
        .lazy()
        .group_by_stable(by)
        .agg([col(measure).cast(dtype).sum()])
        .collect()?;
    Ok(grouped)
}

/// Top `n` groups of `key` by the integer sum of `measure`.
pub fn rank_i64(
    frame: &DataFrame,
    key: &str,
    measure: &str,
    n: usize,
) -> Result<Vec<RankedRow<i64>>, ReportError> {
    let grouped = sum_by(frame, &[key], measure, DataType::Int64)?;
    let rows = text_column(&grouped, key)?
        .into_iter()
        .zip(i64_column(&grouped, measure)?)
        .map(|(key, value)| RankedRow::new(key, value.unwrap_or(0)))
        .collect();
    Ok(top_n(rows, n))
}

/// Top `n` groups of `key` by the exact decimal sum of `measure`.
pub fn rank_decimal(
    frame: &DataFrame,
    key: &str,
    measure: &str,
    n: usize,
) -> Result<Vec<RankedRow<Decimal>>, ReportError> {
    require(frame, [key, measure])?;

    let keys = text_column(frame, key)?;
    let amounts = decimal_column(frame, measure)?;
    let rows = sum_in_order(keys.into_iter().zip(amounts))
        .into_iter()
        .map(|(key, value)| RankedRow::new(key, value))
        .collect();
    Ok(top_n(rows, n))
}

/// Exact per-key sums, with keys in first-encountered order. NULL amounts count as zero.
pub(crate) fn sum_in_order<K: Eq + Hash + Clone>(
    pairs: impl IntoIterator<Item = (K, Option<Decimal>)>,
) -> Vec<(K, Decimal)> {
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut sums: Vec<(K, Decimal)> = Vec::new();
    for (key, amount) in pairs {
        let amount = amount.unwrap_or(Decimal::ZERO);
        match index.get(&key) {
            Some(&i) => sums[i].1 = sums[i].1.saturating_add(amount),
            None => {
                index.insert(key.clone(), sums.len());
                sums.push((key, amount));
            }
        }
    }
    sums
}

pub(crate) fn require<'a>(
    frame: &DataFrame,
    columns: impl IntoIterator<Item = &'a str>,
) -> Result<(), ReportError> {
    let present = frame.get_column_names();
    for name in columns {
        if !present.contains(&name) {
            return Err(ReportError::MissingColumn(name.to_string()));
        }
    }
    Ok(())
}

/// A column rendered as text, with NULL shown as `NULL_KEY`.
pub(crate) fn text_column(frame: &DataFrame, name: &str) -> Result<Vec<String>, ReportError> {
    let series = frame.column(name)?.cast(&DataType::String)?;
    let values = series
        .str()?
        .into_iter()
        .map(|v| v.map_or_else(|| NULL_KEY.to_string(), str::to_owned))
        .collect();
    Ok(values)
}

pub(crate) fn i64_column(frame: &DataFrame, name: &str) -> Result<Vec<Option<i64>>, ReportError> {
    let series = frame.column(name)?.cast(&DataType::Int64)?;
    Ok(series.i64()?.into_iter().collect())
}

/// A numeric column as exact decimals. `Decimal` columns are read from their
/// mantissas; float columns are converted value by value.
pub(crate) fn decimal_column(
    frame: &DataFrame,
    name: &str,
) -> Result<Vec<Option<Decimal>>, ReportError> {
    let series = frame.column(name)?;
    let invalid = || ReportError::InvalidAmount(name.to_string());

    if let DataType::Decimal(_, _) = series.dtype() {
        let decimals = series.decimal()?;
        let scale = decimals.scale() as u32;
        let mantissas: &Int128Chunked = decimals;
        return mantissas
            .into_iter()
            .map(|v| {
                v.map(|m| Decimal::try_from_i128_with_scale(m, scale).map_err(|_| invalid()))
                    .transpose()
            })
            .collect();
    }

    let floats = series.cast(&DataType::Float64)?;
    floats
        .f64()?
        .into_iter()
        .map(|v| v.map(|f| Decimal::from_f64(f).ok_or_else(invalid)).transpose())
        .collect()
}
