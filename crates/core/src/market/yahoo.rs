use crate::domain::market::MarketSnapshot;
use crate::market::{MarketDataProvider, Period};
use anyhow::{Context, Result};
use chrono::DateTime;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default market data backend (yfinance analog): Yahoo's chart endpoint
/// honors the requested period and returns the series chronologically.
#[derive(Debug, Clone)]
pub struct YahooFinanceClient {
    http: reqwest::Client,
    base_url: String,
}

impl YahooFinanceClient {
    pub fn new() -> Result<Self> {
        let base_url =
            std::env::var("YAHOO_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout_secs = std::env::var("YAHOO_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build market data http client")?;

        Ok(Self { http, base_url })
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for YahooFinanceClient {
    fn provider_name(&self) -> &'static str {
        "yfinance"
    }

    async fn fetch(&self, ticker: &str, period: Period) -> Result<MarketSnapshot> {
        let url = format!(
            "{}/v8/finance/chart/{ticker}",
            self.base_url.trim_end_matches('/')
        );

        let res = self
            .http
            .get(url)
            .query(&[("range", period.as_str()), ("interval", "1d")])
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

        let body = serde_json::from_str::<ChartResponse>(&text)
            .context("Unexpected data format from API.")?;
        snapshot_from_chart(body)
    }
}

fn snapshot_from_chart(body: ChartResponse) -> Result<MarketSnapshot> {
    if let Some(err) = body.chart.error {
        anyhow::bail!("API Error: {} ({})", err.description, err.code);
    }

    let result = body
        .chart
        .result
        .unwrap_or_default()
        .into_iter()
        .next()
        .context("No data found for ticker.")?;
    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .context("No data found for ticker.")?;

    let mut series = BTreeMap::new();
    for (ts, close) in result.timestamp.iter().zip(quote.close.iter()) {
        // Null closes appear on half sessions; skip them.
        let Some(close) = close else { continue };
        let date = DateTime::from_timestamp(*ts, 0)
            .context("invalid timestamp in chart response")?
            .date_naive();
        series.insert(date, *close);
    }

    MarketSnapshot::from_closes(series)
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}
