pub mod error;
pub mod json;
pub mod openai;

use crate::domain::idea::StockIdea;
use crate::domain::market::MarketSnapshot;

#[derive(Debug, Clone)]
pub enum Provider {
    OpenAi,
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// Free-text narrative analysis of a price snapshot. Best-effort
    /// contract: the prompt asks for trend, spikes, sentiment and a
    /// recommendation, but no output schema is enforced.
    async fn generate_analysis(
        &self,
        ticker: &str,
        snapshot: &MarketSnapshot,
    ) -> anyhow::Result<String>;

    /// Four real tickers matching a free-text theme, parsed from
    /// JSON-shaped model output. Parse failures are errors; no retry.
    async fn stock_ideas(&self, theme: &str) -> anyhow::Result<Vec<StockIdea>>;
}
