use crate::config::Settings;
use crate::domain::idea::StockIdea;
use crate::domain::market::MarketSnapshot;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::{json, LlmClient, Provider};
use anyhow::Context;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

const TEMPERATURE: f32 = 0.7;

/// Every 5th point of the series goes into the analysis prompt to bound
/// token usage.
const DOWNSAMPLE_STEP: usize = 5;

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_openai_api_key()?.to_string();
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = settings
            .openai_model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let timeout_secs = std::env::var("OPENAI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
        })
    }

    async fn chat_completion(&self, system: &'static str, user: String) -> anyhow::Result<String> {
        let req = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system",
                    content: system.to_string(),
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            temperature: TEMPERATURE,
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );

        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(&req)
            .send()
            .await
            .context("OpenAI request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read OpenAI response body")?;
        if !status.is_success() {
            let raw_response_json = serde_json::from_str::<serde_json::Value>(&text).ok();
            return Err(LlmDiagnosticsError {
                provider: Provider::OpenAi,
                stage: "http",
                detail: format!("status={status}"),
                raw_output: Some(text),
                raw_response_json,
            }
            .into());
        }

        let parsed = serde_json::from_str::<ChatCompletionResponse>(&text)
            .with_context(|| format!("failed to parse OpenAI response JSON: {text}"))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .context("OpenAI response contained no choices")
    }

    fn analysis_prompt(ticker: &str, snapshot: &MarketSnapshot) -> String {
        let mut sampled = String::new();
        for (date, close) in downsample(&snapshot.time_series, DOWNSAMPLE_STEP) {
            sampled.push_str(&format!("{date}: {close}\n"));
        }

        format!(
            "You are a financial analyst AI. Given historical stock price data, \
generate a clear, concise analysis of the stock's recent performance.\n\n\
Stock: {ticker}\n\
Latest Close: {}\n\
Previous Close: {}\n\
Percent Change: {}%\n\n\
Historical Close Prices (sampled):\n{sampled}\n\
Instructions:\n\
1. Summarize the trend (upward, downward, volatile).\n\
2. Mention any notable price spikes or dips.\n\
3. Suggest whether sentiment is Positive, Neutral, or Negative.\n\
4. End with a Recommendation: Buy, Hold, or Sell.\n\
Format output clearly.",
            snapshot.latest_close, snapshot.prev_close, snapshot.percent_change
        )
    }

    fn ideas_prompt(theme: &str) -> String {
        format!(
            "As a financial research assistant, list 4 real publicly traded companies \
that fit the investment theme: \"{theme}\".\n\n\
For each, include:\n\
- Ticker\n\
- Company name\n\
- One-line reason why it's relevant to the theme\n\n\
Output in this format:\n\
[\n  {{ \"ticker\": \"AAPL\", \"name\": \"Apple Inc.\", \"reason\": \"...\" }},\n  ...\n]"
        )
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn generate_analysis(
        &self,
        ticker: &str,
        snapshot: &MarketSnapshot,
    ) -> anyhow::Result<String> {
        self.chat_completion(
            "You are a helpful AI financial analyst.",
            Self::analysis_prompt(ticker, snapshot),
        )
        .await
    }

    async fn stock_ideas(&self, theme: &str) -> anyhow::Result<Vec<StockIdea>> {
        let text = self
            .chat_completion("You are a stock-picking AI.", Self::ideas_prompt(theme))
            .await?;
        json::parse_ideas(&text)
    }
}

/// Keeps every `step`-th point in source (chronological) iteration order.
pub fn downsample(series: &BTreeMap<NaiveDate, f64>, step: usize) -> Vec<(NaiveDate, f64)> {
    let step = step.max(1);
    series
        .iter()
        .enumerate()
        .filter(|(i, _)| i % step == 0)
        .map(|(_, (d, c))| (*d, *c))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}
