//! HTTP API
//!
//! - `POST /api/v1/query`  answer a question
//! - `GET  /health`        liveness and session count
//! - `GET  /cache/stats`   cache efficiency report
//! - `POST /cache/reset`   clear the cache registry
//! - `GET  /metrics`       Prometheus exposition

use crate::api_types::{ErrorResponse, HealthResponse, ResetResponse};
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use teller_core::cache::CacheEfficiencyReport;
use teller_core::error::{TellerError, TellerResult};
use teller_core::service::{QueryRequest, QueryResponse, QueryService};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

struct AppState {
    service: Arc<QueryService>,
    start_time: Instant,
}

/// Maps pipeline errors onto HTTP statuses
struct ApiError(TellerError);

impl From<TellerError> for ApiError {
    fn from(err: TellerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TellerError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            TellerError::TemplateNotFound { .. } => StatusCode::NOT_FOUND,
            TellerError::AllAgentsFailed { .. }
            | TellerError::InferenceCallFailed { .. }
            | TellerError::InferenceTimeout { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self.0, "request rejected");
        }
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

pub struct TellerHttpServer {
    service: Arc<QueryService>,
}

impl TellerHttpServer {
    pub fn new(service: Arc<QueryService>) -> Self {
        Self { service }
    }

    pub fn router(&self) -> Router {
        let state = Arc::new(AppState {
            service: Arc::clone(&self.service),
            start_time: Instant::now(),
        });
        Router::new()
            .route("/api/v1/query", post(query_handler))
            .route("/health", get(health_handler))
            .route("/cache/stats", get(cache_stats_handler))
            .route("/cache/reset", post(cache_reset_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
    }

    /// Serve on `host:port` until `shutdown` resolves
    pub async fn start<F>(&self, host: &str, port: u16, shutdown: F) -> TellerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| TellerError::io_with_path(e.to_string(), addr.clone()))?;
        info!(addr = %addr, "teller API listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| TellerError::io(format!("server error: {}", e)))
    }
}

async fn query_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let response = state.service.answer(&request).await?;
    Ok(Json(response))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.service.sessions().len(),
    })
}

async fn cache_stats_handler(State(state): State<Arc<AppState>>) -> Json<CacheEfficiencyReport> {
    Json(state.service.registry().report())
}

async fn cache_reset_handler(State(state): State<Arc<AppState>>) -> Json<ResetResponse> {
    state.service.reset_cache_stats();
    Json(ResetResponse {
        status: "reset".to_string(),
    })
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state.service.metrics().render();
    ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_types::CacheStats;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::io::Write;
    use teller_core::config::Settings;
    use teller_core::fanout::StaticRouter;
    use teller_core::llm::{Completion, InferenceBackend};
    use teller_core::telemetry::TracingTraceSink;
    use tempfile::NamedTempFile;

    /// Replies with scripted latencies, or fails every call
    struct FixedBackend {
        ttfts: Mutex<VecDeque<f64>>,
        fail: bool,
    }

    impl FixedBackend {
        fn replying(ttfts: &[f64]) -> Self {
            Self {
                ttfts: Mutex::new(ttfts.iter().copied().collect()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                ttfts: Mutex::new(VecDeque::new()),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl InferenceBackend for FixedBackend {
        async fn complete(&self, _prompt: &str) -> TellerResult<Completion> {
            if self.fail {
                return Err(TellerError::inference_status("upstream unavailable", 503));
            }
            let ttft = self.ttfts.lock().pop_front().unwrap_or(1.0);
            Ok(Completion::new("Outgoing wires close at 16:00.", ttft))
        }
    }

    struct TestServer {
        base: String,
        client: reqwest::Client,
        _manual: NamedTempFile,
    }

    async fn start_test_server(backend: FixedBackend) -> TestServer {
        let mut manual = NamedTempFile::new().unwrap();
        writeln!(manual, "Outgoing domestic wires close at 16:00 Eastern.").unwrap();

        let mut settings = Settings::default();
        settings.prompts.manual_path = manual.path().to_path_buf();
        settings.fanout.retry_backoff = std::time::Duration::from_millis(1);
        let service = QueryService::with_backend(
            &settings,
            Arc::new(backend),
            Arc::new(TracingTraceSink),
        )
        .unwrap()
        .with_router(Arc::new(StaticRouter::new(vec![
            "technical_specialist".to_string(),
        ])));

        let app = TellerHttpServer::new(Arc::new(service)).router();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestServer {
            base: format!("http://127.0.0.1:{}", addr.port()),
            client: reqwest::Client::new(),
            _manual: manual,
        }
    }

    impl TestServer {
        async fn query(&self, body: serde_json::Value) -> reqwest::Response {
            self.client
                .post(format!("{}/api/v1/query", self.base))
                .json(&body)
                .send()
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_query_returns_answer() {
        let server = start_test_server(FixedBackend::replying(&[2.0])).await;

        let response = server
            .query(serde_json::json!({"query": "When do wires close?", "session_id": "s-1"}))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["response"], "Outgoing wires close at 16:00.");
        assert_eq!(body["session_id"], "s-1");
        assert_eq!(body["agents_used"], serde_json::json!(["technical_specialist"]));
        assert_eq!(body["compliance_passed"], true);
        assert_eq!(body["degraded"], false);
        assert_eq!(body["diagnostics"][0]["cache_outcome"], "baseline");
    }

    #[tokio::test]
    async fn test_blank_query_is_bad_request() {
        let server = start_test_server(FixedBackend::replying(&[])).await;

        let response = server.query(serde_json::json!({"query": "   "})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = response.json().await.unwrap();
        assert!(body.error.contains("query"));
    }

    #[tokio::test]
    async fn test_total_failure_is_bad_gateway() {
        let server = start_test_server(FixedBackend::failing()).await;

        let response = server
            .query(serde_json::json!({"query": "When do wires close?"}))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body: ErrorResponse = response.json().await.unwrap();
        assert!(body.code.starts_with("TELLER_"));
    }

    #[tokio::test]
    async fn test_cache_stats_and_reset() {
        let server = start_test_server(FixedBackend::replying(&[2.5, 1.0])).await;
        for session in ["a", "b"] {
            let response = server
                .query(serde_json::json!({"query": "When do wires close?", "session_id": session}))
                .await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let stats: CacheStats = server
            .client
            .get(format!("{}/cache/stats", server.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.inferred_cache_hit_rate, Some(1.0));
        assert_eq!(stats.cold_cache_baseline_seconds, Some(2.5));
        assert!(stats.prefix_alignment_ok);
        assert_eq!(stats.grade, "A");

        let reset: ResetResponse = server
            .client
            .post(format!("{}/cache/reset", server.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(reset.status, "reset");

        let stats: CacheStats = server
            .client
            .get(format!("{}/cache/stats", server.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.grade, "N/A");
    }

    #[tokio::test]
    async fn test_health_counts_sessions() {
        let server = start_test_server(FixedBackend::replying(&[1.0])).await;
        server
            .query(serde_json::json!({"query": "When do wires close?", "session_id": "h-1"}))
            .await;

        let health: HealthResponse = server
            .client
            .get(format!("{}/health", server.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.active_sessions, 1);
    }

    #[tokio::test]
    async fn test_metrics_exposition() {
        let server = start_test_server(FixedBackend::replying(&[1.5])).await;
        server
            .query(serde_json::json!({"query": "When do wires close?"}))
            .await;

        let response = server
            .client
            .get(format!("{}/metrics", server.base))
            .send()
            .await
            .unwrap();
        assert_eq!(
            response.headers()[reqwest::header::CONTENT_TYPE],
            PROMETHEUS_CONTENT_TYPE
        );
        let text = response.text().await.unwrap();
        assert!(text.contains("# TYPE teller_ttft_seconds histogram"));
        assert!(text.contains("teller_cold_cache_baseline_seconds 1.5"));
    }
}
