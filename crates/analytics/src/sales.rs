use crate::error::ReportError;
use crate::ranking::{self, RankedRow};
use chrono::Month;
use comfy_table::Table;
use comfy_table::presets::UTF8_FULL;
use database::{DbHandle, repository};
use polars::prelude::DataFrame;
use rust_decimal::Decimal;
use std::fmt;

const TRACK_NAME: &str = "TrackName";
const ARTIST_NAME: &str = "ArtistName";
const GENRE_NAME: &str = "GenreName";
const QUANTITY_SOLD: &str = "QuantitySold";
const SALES_AMOUNT: &str = "SalesAmount";
const INVOICE_YEAR: &str = "InvoiceYear";
const INVOICE_MONTH: &str = "InvoiceMonth";

/// The calendar month with the highest summed sales.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestMonth {
    pub year: i64,
    pub month: Month,
    pub amount: Decimal,
}

/// Four views over the per-track, per-month sales result.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesReport {
    pub limit: usize,
    pub top_tracks: Vec<RankedRow<i64>>,
    pub top_artists: Vec<RankedRow<Decimal>>,
    pub best_month: Option<BestMonth>,
    pub top_genres: Vec<RankedRow<Decimal>>,
}

impl SalesReport {
    /// Runs the sales join and derives every view from its single result.
    pub async fn run(db: &mut DbHandle, limit: usize) -> Result<Self, ReportError> {
        let frame = repository::sales_by_track_month(db).await?.into_dataframe()?;
        let report = Self::from_frame(&frame, limit)?;
        tracing::info!(rows = frame.height(), "Sales report ready.");
        Ok(report)
    }

    pub fn from_frame(frame: &DataFrame, limit: usize) -> Result<Self, ReportError> {
        Ok(Self {
            limit,
            top_tracks: ranking::rank_i64(frame, TRACK_NAME, QUANTITY_SOLD, limit)?,
            top_artists: ranking::rank_decimal(frame, ARTIST_NAME, SALES_AMOUNT, limit)?,
            best_month: best_month(frame)?,
            top_genres: ranking::rank_decimal(frame, GENRE_NAME, SALES_AMOUNT, limit)?,
        })
    }
}

/// First-encountered (year, month) with the largest summed amount.
///
/// Rows with a NULL year or month are ignored.
fn best_month(frame: &DataFrame) -> Result<Option<BestMonth>, ReportError> {
    ranking::require(frame, [INVOICE_YEAR, INVOICE_MONTH, SALES_AMOUNT])?;

    let years = ranking::i64_column(frame, INVOICE_YEAR)?;
    let months = ranking::i64_column(frame, INVOICE_MONTH)?;
    let amounts = ranking::decimal_column(frame, SALES_AMOUNT)?;

    let mut dated = Vec::with_capacity(amounts.len());
    for ((year, month), amount) in years.into_iter().zip(months).zip(amounts) {
        let (Some(year), Some(month)) = (year, month) else {
            tracing::debug!("Skipping sales without an invoice date.");
            continue;
        };
        dated.push(((year, month), amount));
    }

    let mut best: Option<((i64, i64), Decimal)> = None;
    for (period, amount) in ranking::sum_in_order(dated) {
        if best.is_none_or(|(_, top)| amount > top) {
            best = Some((period, amount));
        }
    }

    best.map(|((year, month), amount)| {
        Ok(BestMonth {
            year,
            month: calendar_month(month)?,
            amount,
        })
    })
    .transpose()
}

fn calendar_month(number: i64) -> Result<Month, ReportError> {
    u8::try_from(number)
        .ok()
        .and_then(|n| Month::try_from(n).ok())
        .ok_or(ReportError::InvalidMonth(number))
}

fn ranked_table<V: fmt::Display>(header: [&str; 2], rows: &[RankedRow<V>]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(header.to_vec());
    for row in rows {
        table.add_row(vec![row.key.clone(), row.value.to_string()]);
    }
    table
}

fn money(rows: &[RankedRow<Decimal>]) -> Vec<RankedRow<String>> {
    rows.iter()
        .map(|r| RankedRow::new(r.key.clone(), format!("{:.2}", r.value)))
        .collect()
}

impl fmt::Display for SalesReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Top {} tracks by quantity sold", self.limit)?;
        writeln!(f, "{}", ranked_table(["Track", "Quantity"], &self.top_tracks))?;

        writeln!(f, "Top {} artists by sales", self.limit)?;
        writeln!(f, "{}", ranked_table(["Artist", "Sales"], &money(&self.top_artists)))?;

        match &self.best_month {
            Some(best) => writeln!(
                f,
                "Month with most sales: {} {} ({:.2})",
                best.month.name(),
                best.year,
                best.amount
            )?,
            None => writeln!(f, "Month with most sales: no sales recorded")?,
        }

        writeln!(f, "Top {} genres by sales", self.limit)?;
        write!(f, "{}", ranked_table(["Genre", "Sales"], &money(&self.top_genres)))
    }
}
