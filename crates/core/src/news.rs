use crate::config::Settings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://newsdata.io";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_ARTICLES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default, rename = "pubDate")]
    pub pub_date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    results: Vec<NewsItem>,
}

#[derive(Debug, Clone)]
pub struct NewsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl NewsClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_news_api_key()?.to_string();
        let base_url =
            std::env::var("NEWSDATA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout_secs = std::env::var("NEWSDATA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build news http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// Returns up to 5 recent business articles for the ticker. Never fails:
    /// any transport or shape error degrades to a single synthetic item that
    /// carries the failure message as its description, so callers always get
    /// an iterable result.
    pub async fn fetch_latest(&self, ticker: &str) -> Vec<NewsItem> {
        match self.fetch_inner(ticker).await {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!(ticker, error = %err, "news fetch failed; returning placeholder");
                vec![fallback_item(&format!("{err:#}"))]
            }
        }
    }

    async fn fetch_inner(&self, ticker: &str) -> Result<Vec<NewsItem>> {
        let url = format!("{}/api/1/news", self.base_url.trim_end_matches('/'));

        let res = self
            .http
            .get(url)
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("q", ticker),
                ("language", "en"),
                ("category", "business"),
            ])
            .send()
            .await
            .context("news request failed")?;

        let status = res.status();
        let text = res.text().await.context("failed to read news response")?;
        if !status.is_success() {
            anyhow::bail!("news HTTP {status}: {text}");
        }

        let mut body = serde_json::from_str::<NewsResponse>(&text)
            .context("failed to parse news response")?;
        body.results.truncate(MAX_ARTICLES);
        Ok(body.results)
    }
}

pub fn fallback_item(message: &str) -> NewsItem {
    NewsItem {
        title: "News fetch failed".to_string(),
        link: None,
        pub_date: None,
        description: Some(message.to_string()),
    }
}
