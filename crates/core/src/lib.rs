pub mod domain;
pub mod llm;
pub mod market;
pub mod news;

pub mod config {
    use anyhow::Context;

    /// Process configuration. Loaded once at startup, immutable afterwards;
    /// clients receive a reference at construction time.
    #[derive(Debug, Clone)]
    pub struct Settings {
        pub openai_api_key: Option<String>,
        pub openai_model: Option<String>,
        pub alpha_vantage_api_key: Option<String>,
        pub news_api_key: Option<String>,
        pub data_provider: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
                openai_model: std::env::var("OPENAI_MODEL").ok(),
                alpha_vantage_api_key: std::env::var("ALPHA_VANTAGE_API_KEY").ok(),
                news_api_key: std::env::var("NEWS_API_KEY").ok(),
                data_provider: std::env::var("DATA_PROVIDER").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_openai_api_key(&self) -> anyhow::Result<&str> {
            self.openai_api_key
                .as_deref()
                .context("OPENAI_API_KEY is required")
        }

        pub fn require_alpha_vantage_api_key(&self) -> anyhow::Result<&str> {
            self.alpha_vantage_api_key
                .as_deref()
                .context("ALPHA_VANTAGE_API_KEY is required")
        }

        pub fn require_news_api_key(&self) -> anyhow::Result<&str> {
            self.news_api_key
                .as_deref()
                .context("NEWS_API_KEY is required")
        }
    }
}
