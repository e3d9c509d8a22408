use anyhow::{ensure, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Normalized view of a historical price fetch, shared by every market data
/// backend. `time_series` is canonically chronological (oldest first); the
/// BTreeMap key order guarantees it regardless of upstream ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub latest_date: NaiveDate,
    pub latest_close: f64,
    pub prev_close: f64,
    pub percent_change: f64,
    pub time_series: BTreeMap<NaiveDate, f64>,
}

impl MarketSnapshot {
    /// Builds a snapshot from a chronological close series. Derived fields
    /// come from the two most recent entries; fewer than 2 points is invalid.
    pub fn from_closes(time_series: BTreeMap<NaiveDate, f64>) -> Result<Self> {
        ensure!(time_series.len() >= 2, "No data found for ticker.");

        let mut recent = time_series.iter().rev();
        let (latest_date, latest_close) = recent
            .next()
            .map(|(d, c)| (*d, *c))
            .context("time series is empty")?;
        let prev_close = recent
            .next()
            .map(|(_, c)| *c)
            .context("time series has a single point")?;
        ensure!(
            prev_close != 0.0,
            "previous close is zero; cannot compute percent change"
        );

        let percent_change = round2((latest_close - prev_close) / prev_close * 100.0);

        Ok(Self {
            latest_date,
            latest_close,
            prev_close,
            percent_change,
            time_series,
        })
    }
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
