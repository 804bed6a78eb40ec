use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::net::TcpListener;

use crate::collector::MetricsCollector;

/// Last known reachability of each chain adapter, refreshed by the service
/// that owns the adapters
#[derive(Debug)]
pub struct ChainHealth {
    started: Instant,
    chains: RwLock<BTreeMap<String, bool>>,
}

impl Default for ChainHealth {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            chains: RwLock::new(BTreeMap::new()),
        }
    }
}

impl ChainHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update<I>(&self, results: I)
    where
        I: IntoIterator<Item = (String, bool)>,
    {
        let mut chains = self.chains.write().unwrap();
        for (chain_id, healthy) in results {
            chains.insert(chain_id, healthy);
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, bool> {
        self.chains.read().unwrap().clone()
    }

    pub fn all_healthy(&self) -> bool {
        self.chains.read().unwrap().values().all(|h| *h)
    }
}

#[derive(Clone)]
struct ServerState {
    collector: Arc<MetricsCollector>,
    health: Arc<ChainHealth>,
}

/// Serves `/metrics` (Prometheus text format) and `/health`.
///
/// `/health` answers 503 while any chain adapter is reported unreachable.
pub struct MetricsServer {
    state: ServerState,
    addr: String,
}

impl MetricsServer {
    pub fn new(collector: Arc<MetricsCollector>, addr: String) -> Self {
        Self {
            state: ServerState {
                collector,
                health: Arc::new(ChainHealth::new()),
            },
            addr,
        }
    }

    pub fn with_health(mut self, health: Arc<ChainHealth>) -> Self {
        self.state.health = health;
        self
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .with_state(self.state.clone())
    }

    /// Bind and serve until the listener fails
    pub async fn serve(self) -> Result<(), MetricsServerError> {
        let app = self.router();

        let listener = TcpListener::bind(&self.addr)
            .await
            .map_err(|e| MetricsServerError::BindError(e.to_string()))?;

        tracing::info!(addr = %self.addr, "metrics server listening");

        axum::serve(listener, app)
            .await
            .map_err(|e| MetricsServerError::ServerError(e.to_string()))
    }
}

async fn metrics_handler(State(state): State<ServerState>) -> Response {
    match state.collector.export_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [("Content-Type", "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn health_handler(State(state): State<ServerState>) -> Response {
    let (status, label) = if state.health.all_healthy() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = json!({
        "status": label,
        "uptime_secs": state.health.started.elapsed().as_secs(),
        "chains": state.health.snapshot(),
    });
    (status, Json(body)).into_response()
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsServerError {
    #[error("failed to bind to address: {0}")]
    BindError(String),
    #[error("server error: {0}")]
    ServerError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ServerState {
        ServerState {
            collector: Arc::new(MetricsCollector::new()),
            health: Arc::new(ChainHealth::new()),
        }
    }

    #[tokio::test]
    async fn test_health_tracks_chains() {
        let state = state();
        let response = health_handler(State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);

        state.health.update([
            ("base-sepolia".to_string(), true),
            ("aptos-testnet".to_string(), false),
        ]);
        let response = health_handler(State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.health.update([("aptos-testnet".to_string(), true)]);
        assert!(state.health.all_healthy());
        assert_eq!(state.health.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn test_metrics_handler() {
        let state = state();
        state.collector.record_order_created();

        let response = metrics_handler(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bind_error_is_reported() {
        let collector = Arc::new(MetricsCollector::new());
        let server = MetricsServer::new(collector, "not-an-address".to_string());
        assert!(matches!(
            server.serve().await,
            Err(MetricsServerError::BindError(_))
        ));
    }
}
