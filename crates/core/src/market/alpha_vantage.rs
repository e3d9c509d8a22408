use crate::config::Settings;
use crate::domain::market::MarketSnapshot;
use crate::market::{MarketDataProvider, Period};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// The compact output covers roughly the last 100 sessions; keep a hard cap
/// matching the upstream contract so a full-output response never balloons
/// the snapshot.
const MAX_POINTS: usize = 180;

/// Alternate market data backend. The daily endpoint has a fixed compact
/// window, so the requested period is accepted but not honored.
#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AlphaVantageClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_alpha_vantage_api_key()?.to_string();
        let base_url = std::env::var("ALPHA_VANTAGE_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout_secs = std::env::var("ALPHA_VANTAGE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for AlphaVantageClient {
    fn provider_name(&self) -> &'static str {
        "alphavantage"
    }

    async fn fetch(&self, ticker: &str, _period: Period) -> Result<MarketSnapshot> {
        let url = format!("{}/query", self.base_url.trim_end_matches('/'));

        let res = self
            .http
            .get(url)
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", ticker),
                ("outputsize", "compact"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("market data request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read market data response")?;
        if !status.is_success() {
            anyhow::bail!("market data HTTP {status}: {text}");
        }

        let raw = serde_json::from_str::<Value>(&text)
            .context("Unexpected data format from API.")?;
        snapshot_from_daily(&raw)
    }
}

fn snapshot_from_daily(raw: &Value) -> Result<MarketSnapshot> {
    if let Some(msg) = raw.get("Error Message").and_then(Value::as_str) {
        anyhow::bail!("API Error: {msg}");
    }
    if let Some(msg) = raw.get("Note").and_then(Value::as_str) {
        anyhow::bail!("Rate limit hit: {msg}");
    }
    if let Some(msg) = raw.get("Information").and_then(Value::as_str) {
        anyhow::bail!("Restricted access: {msg}");
    }

    let ts = raw
        .get("Time Series (Daily)")
        .and_then(Value::as_object)
        .context("Unexpected data format from API.")?;

    // Keep the most recent sessions, then emit canonically (chronological).
    let mut dates: Vec<&String> = ts.keys().collect();
    dates.sort_unstable_by(|a, b| b.cmp(a));
    dates.truncate(MAX_POINTS);

    let mut series = BTreeMap::new();
    for date_str in dates {
        let close = ts
            .get(date_str)
            .and_then(|bar| bar.get("4. close"))
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<f64>().ok())
            .context("Unexpected data format from API.")?;
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .context("Unexpected data format from API.")?;
        series.insert(date, close);
    }

    MarketSnapshot::from_closes(series)
}
