//! Metrics and monitoring for Unite settlement services
//!
//! Prometheus counters for the order lifecycle, commitment decisions, secret
//! reveals and escrow confirmation latency, an HTTP endpoint serving them,
//! and the JSON tracing subscriber shared by every binary.
//!
//! # Example
//!
//! ```no_run
//! use unite_metrics::{MetricsCollector, MetricsServer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let collector = Arc::new(MetricsCollector::new());
//!     collector.record_order_created();
//!
//!     let server = MetricsServer::new(collector.clone(), "0.0.0.0:9090".to_string());
//!     server.serve().await.unwrap();
//! }
//! ```

pub mod collector;
pub mod http;
pub mod metrics;
pub mod tracing;

pub use collector::{CommitRejection, MetricsCollector, MetricsError};
pub use http::{ChainHealth, MetricsServer, MetricsServerError};
pub use tracing::{init_tracing, init_tracing_with_metrics, CorrelationId, OrderSpan, TracingError};
