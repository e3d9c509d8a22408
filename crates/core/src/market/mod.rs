pub mod alpha_vantage;
pub mod yahoo;

use crate::config::Settings;
use crate::domain::market::MarketSnapshot;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lookback window requested by the UI period selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
    #[serde(rename = "max")]
    Max,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::OneMonth => "1mo",
            Period::ThreeMonths => "3mo",
            Period::SixMonths => "6mo",
            Period::OneYear => "1y",
            Period::TwoYears => "2y",
            Period::FiveYears => "5y",
            Period::Max => "max",
        }
    }
}

impl Default for Period {
    fn default() -> Self {
        Period::OneMonth
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "1mo" => Ok(Period::OneMonth),
            "3mo" => Ok(Period::ThreeMonths),
            "6mo" => Ok(Period::SixMonths),
            "1y" => Ok(Period::OneYear),
            "2y" => Ok(Period::TwoYears),
            "5y" => Ok(Period::FiveYears),
            "max" => Ok(Period::Max),
            other => anyhow::bail!("unknown period: {other}"),
        }
    }
}

#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch(&self, ticker: &str, period: Period) -> Result<MarketSnapshot>;
}

/// Selects the backend once at startup from `DATA_PROVIDER`
/// (`yfinance` default, `alphavantage` alternate).
pub fn from_settings(settings: &Settings) -> Result<Box<dyn MarketDataProvider>> {
    match settings.data_provider.as_deref().map(str::trim) {
        Some("alphavantage") => Ok(Box::new(alpha_vantage::AlphaVantageClient::from_settings(
            settings,
        )?)),
        _ => Ok(Box::new(yahoo::YahooFinanceClient::new()?)),
    }
}
