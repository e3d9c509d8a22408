use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use finsight_core::domain::analysis::AnalysisResult;
use finsight_core::domain::idea::StockIdea;
use finsight_core::domain::market::MarketSnapshot;
use finsight_core::llm::{openai::OpenAiClient, LlmClient};
use finsight_core::market::{MarketDataProvider, Period};
use finsight_core::news::{self, NewsClient, NewsItem};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = finsight_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let market: Arc<dyn MarketDataProvider> =
        Arc::from(finsight_core::market::from_settings(&settings)?);
    tracing::info!(provider = market.provider_name(), "market data backend selected");

    let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::from_settings(&settings)?);

    // News is optional: without a key the analyze endpoint still works and
    // news requests degrade to the synthetic placeholder item.
    let news = match NewsClient::from_settings(&settings) {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::warn!(error = %e, "NEWS_API_KEY missing; news requests will return a placeholder");
            None
        }
    };

    let state = AppState {
        market,
        llm,
        news,
        sessions: Arc::new(Mutex::new(HashMap::new())),
    };

    let app = app(state).layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/ideas", post(find_ideas))
        .route("/sessions/:session_id/ideas", get(session_ideas))
        .route("/analyze/:ticker", get(analyze))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    market: Arc<dyn MarketDataProvider>,
    llm: Arc<dyn LlmClient>,
    news: Option<NewsClient>,
    sessions: Arc<Mutex<HashMap<Uuid, Session>>>,
}

/// Per-browser-session state: the last theme search and its results.
/// A new search replaces the previous contents wholesale.
#[derive(Debug, Clone)]
struct Session {
    theme: String,
    ideas: Vec<StockIdea>,
    updated_at: Instant,
}

/// Upper bound on tracked sessions. Anonymous searches mint fresh ids, so
/// without a cap the map would grow for the life of the process.
const MAX_SESSIONS: usize = 1024;

fn store_session(sessions: &mut HashMap<Uuid, Session>, session_id: Uuid, session: Session) {
    if !sessions.contains_key(&session_id) && sessions.len() >= MAX_SESSIONS {
        let stalest = sessions
            .iter()
            .min_by_key(|(_, s)| s.updated_at)
            .map(|(id, _)| *id);
        if let Some(id) = stalest {
            sessions.remove(&id);
        }
    }
    sessions.insert(session_id, session);
}

/// Flat error contract: failures come back as `{"error": "..."}` and the UI
/// branches only on whether the field is present.
struct ApiError(anyhow::Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        sentry_anyhow::capture_anyhow(&self.0);
        tracing::warn!(error = %self.0, "request failed");
        Json(serde_json::json!({ "error": format!("{:#}", self.0) })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

#[derive(Debug, Deserialize)]
struct IdeasRequest {
    theme: String,
    #[serde(default)]
    session_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct IdeasResponse {
    session_id: Uuid,
    theme: String,
    ideas: Vec<StockIdea>,
}

async fn find_ideas(
    State(state): State<AppState>,
    payload: Result<Json<IdeasRequest>, JsonRejection>,
) -> Result<Json<IdeasResponse>, ApiError> {
    // Malformed bodies go through the same flat error shape as every other
    // failure instead of axum's plain-text rejection.
    let Json(req) = payload
        .map_err(|rejection| anyhow::anyhow!("invalid request body: {}", rejection.body_text()))?;

    let theme = req.theme.trim().to_string();
    if theme.is_empty() {
        return Err(anyhow::anyhow!("Please enter a sector or theme.").into());
    }

    let ideas = state.llm.stock_ideas(&theme).await?;

    let session_id = req.session_id.unwrap_or_else(Uuid::new_v4);
    store_session(
        &mut *state.sessions.lock().await,
        session_id,
        Session {
            theme: theme.clone(),
            ideas: ideas.clone(),
            updated_at: Instant::now(),
        },
    );

    Ok(Json(IdeasResponse {
        session_id,
        theme,
        ideas,
    }))
}

async fn session_ideas(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<IdeasResponse>, StatusCode> {
    let sessions = state.sessions.lock().await;
    let session = sessions.get(&session_id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(IdeasResponse {
        session_id,
        theme: session.theme.clone(),
        ideas: session.ideas.clone(),
    }))
}

#[derive(Debug, Deserialize)]
struct AnalyzeQuery {
    #[serde(default)]
    period: Option<Period>,
    #[serde(default)]
    news: Option<bool>,
}

#[derive(Debug, Serialize)]
struct AnalyzeResponse {
    ticker: String,
    period: Period,
    snapshot: MarketSnapshot,
    analysis: String,
    sentiment: String,
    sentiment_color: &'static str,
    recommendation: String,
    recommendation_color: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    news: Option<Vec<NewsItem>>,
}

async fn analyze(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(query): Query<AnalyzeQuery>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let ticker = ticker.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(
            anyhow::anyhow!("Please enter a valid stock ticker symbol (e.g., AAPL).").into(),
        );
    }
    let period = query.period.unwrap_or_default();

    let snapshot = state.market.fetch(&ticker, period).await?;
    let text = state.llm.generate_analysis(&ticker, &snapshot).await?;
    let analysis = AnalysisResult::from_text(text);

    let news_items = if query.news.unwrap_or(false) {
        Some(match &state.news {
            Some(client) => client.fetch_latest(&ticker).await,
            None => vec![news::fallback_item("NEWS_API_KEY is required")],
        })
    } else {
        None
    };

    Ok(Json(AnalyzeResponse {
        ticker,
        period,
        snapshot,
        analysis: analysis.text,
        sentiment: analysis.labels.sentiment,
        sentiment_color: analysis.labels.sentiment_color,
        recommendation: analysis.labels.recommendation,
        recommendation_color: analysis.labels.recommendation_color,
        news: news_items,
    }))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &finsight_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use tower::ServiceExt;

    struct StubMarket;

    #[async_trait::async_trait]
    impl MarketDataProvider for StubMarket {
        fn provider_name(&self) -> &'static str {
            "stub"
        }

        async fn fetch(&self, _ticker: &str, _period: Period) -> anyhow::Result<MarketSnapshot> {
            let mut series = BTreeMap::new();
            series.insert("2026-08-26".parse().unwrap(), 100.0);
            series.insert("2026-08-27".parse().unwrap(), 101.0);
            MarketSnapshot::from_closes(series)
        }
    }

    struct StubLlm;

    #[async_trait::async_trait]
    impl finsight_core::llm::LlmClient for StubLlm {
        fn provider(&self) -> finsight_core::llm::Provider {
            finsight_core::llm::Provider::OpenAi
        }

        async fn generate_analysis(
            &self,
            _ticker: &str,
            _snapshot: &MarketSnapshot,
        ) -> anyhow::Result<String> {
            Ok("Sentiment: Neutral. Recommendation: Hold.".to_string())
        }

        async fn stock_ideas(&self, _theme: &str) -> anyhow::Result<Vec<StockIdea>> {
            Ok(vec![StockIdea {
                ticker: "NVDA".to_string(),
                name: "NVIDIA Corporation".to_string(),
                reason: "GPUs".to_string(),
            }])
        }
    }

    fn test_state() -> AppState {
        AppState {
            market: Arc::new(StubMarket),
            llm: Arc::new(StubLlm),
            news: None,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn session(theme: &str, ideas: Vec<StockIdea>, updated_at: Instant) -> Session {
        Session {
            theme: theme.to_string(),
            ideas,
            updated_at,
        }
    }

    #[tokio::test]
    async fn malformed_ideas_body_uses_flat_error_shape() {
        let res = app(test_state())
            .oneshot(
                Request::post("/ideas")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let message = body.get("error").and_then(serde_json::Value::as_str).unwrap();
        assert!(message.contains("invalid request body"));
    }

    #[tokio::test]
    async fn well_formed_ideas_body_returns_ideas() {
        let res = app(test_state())
            .oneshot(
                Request::post("/ideas")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{\"theme\": \"AI\"}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body.get("error").is_none());
        assert_eq!(body["ideas"][0]["ticker"], "NVDA");
    }

    #[test]
    fn store_session_evicts_stalest_entry_at_capacity() {
        let mut sessions = HashMap::new();
        let now = Instant::now();
        let stale_id = Uuid::new_v4();
        sessions.insert(stale_id, session("old", vec![], now - Duration::from_secs(60)));
        while sessions.len() < MAX_SESSIONS {
            sessions.insert(Uuid::new_v4(), session("recent", vec![], now));
        }

        let new_id = Uuid::new_v4();
        store_session(&mut sessions, new_id, session("new", vec![], now));

        assert_eq!(sessions.len(), MAX_SESSIONS);
        assert!(!sessions.contains_key(&stale_id));
        assert!(sessions.contains_key(&new_id));
    }

    #[test]
    fn store_session_for_known_id_does_not_evict() {
        let mut sessions = HashMap::new();
        let now = Instant::now();
        let known_id = Uuid::new_v4();
        sessions.insert(known_id, session("first", vec![], now - Duration::from_secs(60)));
        while sessions.len() < MAX_SESSIONS {
            sessions.insert(Uuid::new_v4(), session("filler", vec![], now));
        }

        store_session(&mut sessions, known_id, session("second", vec![], now));

        assert_eq!(sessions.len(), MAX_SESSIONS);
        assert_eq!(sessions.get(&known_id).unwrap().theme, "second");
    }

    #[test]
    fn analyze_query_defaults_period_to_one_month() {
        let q: AnalyzeQuery = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(q.period.unwrap_or_default(), Period::OneMonth);
        assert!(q.news.is_none());
    }

    #[test]
    fn analyze_query_parses_ui_period_strings() {
        let q: AnalyzeQuery =
            serde_json::from_value(serde_json::json!({ "period": "6mo", "news": true })).unwrap();
        assert_eq!(q.period, Some(Period::SixMonths));
        assert_eq!(q.news, Some(true));
    }

    #[test]
    fn new_search_replaces_session_contents() {
        let mut sessions = HashMap::new();
        let id = Uuid::new_v4();

        store_session(
            &mut sessions,
            id,
            session(
                "AI",
                vec![StockIdea {
                    ticker: "NVDA".to_string(),
                    name: "NVIDIA Corporation".to_string(),
                    reason: "GPUs".to_string(),
                }],
                Instant::now(),
            ),
        );
        store_session(&mut sessions, id, session("biotech", vec![], Instant::now()));

        assert_eq!(sessions.len(), 1);
        let stored = sessions.get(&id).unwrap();
        assert_eq!(stored.theme, "biotech");
        assert!(stored.ideas.is_empty());
    }
}
