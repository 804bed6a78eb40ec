//! HTTP order API
//!
//! Makers submit and cancel orders here; anyone can read order status and
//! history.
//!
//! - `POST /orders` submit a signed order with its secret
//! - `GET /orders?status=Announced&limit=50` list orders in one status
//! - `GET /orders/:id` order, transition history and active commitment
//! - `POST /orders/:id/cancel` maker cancellation before any commitment

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{info, warn};
use unite_settlement::{
    CommitmentLedger, OrderError, OrderStore, SettlementBackend, StateTransition, StoreError,
};
use unite_types::{Commitment, Order, OrderStatus, Secret, SignedOrder};

use crate::{unix_now, CoordinatorError, SettlementCoordinator};

const DEFAULT_LIST_LIMIT: usize = 100;

const ALL_STATUSES: [OrderStatus; 7] = [
    OrderStatus::Announced,
    OrderStatus::Committed,
    OrderStatus::EscrowsPending,
    OrderStatus::EscrowsReady,
    OrderStatus::Settled,
    OrderStatus::Cancelled,
    OrderStatus::Expired,
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOrderRequest {
    pub order: SignedOrder,
    pub secret: Secret,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    pub maker: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: Order,
    pub status: OrderStatus,
    pub history: Vec<StateTransition>,
    pub commitment: Option<Commitment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderList {
    pub orders: Vec<Order>,
    pub count: usize,
}

/// Error body returned by every handler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Maps coordinator errors onto HTTP status codes
pub struct ApiError(CoordinatorError);

impl From<CoordinatorError> for ApiError {
    fn from(e: CoordinatorError) -> Self {
        Self(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(e.into())
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            CoordinatorError::Order(OrderError::Invalid(_))
            | CoordinatorError::Order(OrderError::DeadlinePassed { .. }) => StatusCode::BAD_REQUEST,
            CoordinatorError::Order(OrderError::Store(StoreError::DuplicateId(_))) => {
                StatusCode::CONFLICT
            }
            CoordinatorError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            CoordinatorError::NotMaker { .. } => StatusCode::FORBIDDEN,
            CoordinatorError::CannotCancel { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(error = %self.0, "order api request failed");
        }
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Order API server over a settlement coordinator
pub struct OrderApi<S> {
    coordinator: SettlementCoordinator<S>,
}

impl<S> OrderApi<S>
where
    S: SettlementBackend + 'static,
{
    pub fn new(coordinator: SettlementCoordinator<S>) -> Self {
        Self { coordinator }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/orders", post(submit_order::<S>).get(list_orders::<S>))
            .route("/orders/:id", get(get_order::<S>))
            .route("/orders/:id/cancel", post(cancel_order::<S>))
            .with_state(self.coordinator.clone())
    }

    /// Serve until the listener fails
    pub async fn serve(self, addr: &str) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %addr, "order api listening");
        axum::serve(listener, self.router()).await
    }
}

async fn submit_order<S: SettlementBackend + 'static>(
    State(coordinator): State<SettlementCoordinator<S>>,
    Json(req): Json<SubmitOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = coordinator
        .submit_order(req.order, &req.secret, unix_now())
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn get_order<S: SettlementBackend + 'static>(
    State(coordinator): State<SettlementCoordinator<S>>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderDetails>, ApiError> {
    let store = coordinator.store();
    let order = store.get_order(&order_id).await?;
    let history = store.get_history(&order_id).await?;
    let commitment = store.active_commitment(&order_id).await?;

    Ok(Json(OrderDetails {
        status: order.status,
        order,
        history,
        commitment,
    }))
}

async fn list_orders<S: SettlementBackend + 'static>(
    State(coordinator): State<SettlementCoordinator<S>>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<OrderList>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(coordinator.settings().sweep_batch);
    let statuses = match query.status {
        Some(status) => vec![status],
        None => ALL_STATUSES.to_vec(),
    };

    let mut orders = Vec::new();
    for status in statuses {
        if orders.len() >= limit {
            break;
        }
        let remaining = limit - orders.len();
        orders.extend(coordinator.store().list_by_status(status, remaining).await?);
    }

    Ok(Json(OrderList {
        count: orders.len(),
        orders,
    }))
}

async fn cancel_order<S: SettlementBackend + 'static>(
    State(coordinator): State<SettlementCoordinator<S>>,
    Path(order_id): Path<String>,
    Json(req): Json<CancelOrderRequest>,
) -> Result<Json<Order>, ApiError> {
    let order = coordinator
        .cancel_order(&order_id, &req.maker, unix_now())
        .await?;
    Ok(Json(order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;
    use unite_chain::ChainAdapterRegistry;
    use unite_channel::InMemoryChannel;
    use unite_settlement::InMemoryStore;
    use unite_types::AuctionParams;

    use crate::CoordinatorSettings;

    fn coordinator() -> SettlementCoordinator<InMemoryStore> {
        SettlementCoordinator::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryChannel::new()),
            ChainAdapterRegistry::new(),
            CoordinatorSettings::default(),
        )
    }

    fn submit_body(secret: &Secret, nonce: u64, deadline: u64) -> String {
        let order = Order::builder()
            .maker("maker-1")
            .source("base-sepolia", "usdc", 1_000u128)
            .destination("aptos-testnet", "usdc")
            .auction(AuctionParams::new(110u128, 90u128, 300, 1_000))
            .secret_hash(secret.hash())
            .fill_deadline(deadline)
            .nonce(nonce)
            .build()
            .unwrap()
            .sign_with_key(&[7u8; 32])
            .unwrap();
        serde_json::to_string(&SubmitOrderRequest {
            order,
            secret: secret.clone(),
        })
        .unwrap()
    }

    fn post_json(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_submit_then_get_order() {
        let api = OrderApi::new(coordinator());
        let secret = Secret::generate();

        let response = api
            .router()
            .oneshot(post_json("/orders", submit_body(&secret, 1, 4_000_000_000)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let order: Order = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(order.status, OrderStatus::Announced);

        let response = api
            .router()
            .oneshot(get(&format!("/orders/{}", order.order_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let details: OrderDetails = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(details.status, OrderStatus::Announced);
        assert_eq!(details.order.order_id, order.order_id);
        assert!(details.history.is_empty());
        assert!(details.commitment.is_none());
    }

    #[tokio::test]
    async fn test_submit_rejects_wrong_secret_and_duplicates() {
        let api = OrderApi::new(coordinator());
        let secret = Secret::generate();
        let body = submit_body(&secret, 1, 4_000_000_000);

        let mut mismatched: serde_json::Value = serde_json::from_str(&body).unwrap();
        mismatched["secret"] = serde_json::to_value(Secret::generate()).unwrap();
        let response = api
            .router()
            .oneshot(post_json("/orders", mismatched.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = api
            .router()
            .oneshot(post_json("/orders", body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = api.router().oneshot(post_json("/orders", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let error: ErrorBody = serde_json::from_value(json_body(response).await).unwrap();
        assert!(error.error.contains("duplicate"));
    }

    #[tokio::test]
    async fn test_submit_past_deadline_is_bad_request() {
        let api = OrderApi::new(coordinator());
        let secret = Secret::generate();

        let response = api
            .router()
            .oneshot(post_json("/orders", submit_body(&secret, 1, 2_000)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let api = OrderApi::new(coordinator());

        let response = api.router().oneshot(get("/orders/missing")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_orders_by_status() {
        let api = OrderApi::new(coordinator());
        let secret = Secret::generate();
        for nonce in 1..=3 {
            let response = api
                .router()
                .oneshot(post_json("/orders", submit_body(&secret, nonce, 4_000_000_000)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = api
            .router()
            .oneshot(get("/orders?status=Announced"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let list: OrderList = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(list.count, 3);
        assert!(list.orders.iter().all(|o| o.status == OrderStatus::Announced));

        let response = api
            .router()
            .oneshot(get("/orders?status=Announced&limit=2"))
            .await
            .unwrap();
        let list: OrderList = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(list.count, 2);

        let response = api
            .router()
            .oneshot(get("/orders?status=Settled"))
            .await
            .unwrap();
        let list: OrderList = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(list.count, 0);

        let response = api
            .router()
            .oneshot(get("/orders?status=Bogus"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cancel_order_checks_maker() {
        let api = OrderApi::new(coordinator());
        let secret = Secret::generate();
        let response = api
            .router()
            .oneshot(post_json("/orders", submit_body(&secret, 1, 4_000_000_000)))
            .await
            .unwrap();
        let order: Order = serde_json::from_value(json_body(response).await).unwrap();
        let uri = format!("/orders/{}/cancel", order.order_id);

        let response = api
            .router()
            .oneshot(post_json(&uri, r#"{"maker":"someone-else"}"#.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = api
            .router()
            .oneshot(post_json(&uri, r#"{"maker":"maker-1"}"#.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cancelled: Order = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let response = api
            .router()
            .oneshot(get(&format!("/orders/{}", order.order_id)))
            .await
            .unwrap();
        let details: OrderDetails = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(details.status, OrderStatus::Cancelled);
        assert_eq!(details.history.len(), 1);
        assert_eq!(details.history[0].from_status, OrderStatus::Announced);
        assert_eq!(details.history[0].to_status, OrderStatus::Cancelled);

        let response = api
            .router()
            .oneshot(post_json(&uri, r#"{"maker":"maker-1"}"#.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
