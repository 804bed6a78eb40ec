use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::metrics::LOG_EVENTS;

const DEFAULT_FILTER: &str = "info,unite=debug";

/// JSON logs filtered by `RUST_LOG`, falling back to `info,unite=debug`
pub fn init_tracing() -> Result<(), TracingError> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(json_layer())
        .try_init()
        .map_err(|e| TracingError::InitError(e.to_string()))
}

/// Same as [`init_tracing`], also counting log events per level
pub fn init_tracing_with_metrics() -> Result<(), TracingError> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(json_layer())
        .with(MetricsLayer)
        .try_init()
        .map_err(|e| TracingError::InitError(e.to_string()))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn json_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_level(true)
        .json()
}

/// Counts events into `unite_log_events_total`
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = match *event.metadata().level() {
            Level::ERROR => "error",
            Level::WARN => "warn",
            Level::INFO => "info",
            Level::DEBUG => "debug",
            Level::TRACE => "trace",
        };
        LOG_EVENTS.with_label_values(&[level]).inc();
    }
}

/// Correlation ID tying together the log lines of one order's settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(uuid::Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Span context for one order's settlement flow
#[derive(Debug, Clone)]
pub struct OrderSpan {
    pub correlation_id: CorrelationId,
    pub order_id: String,
    pub resolver: String,
}

impl OrderSpan {
    pub fn new(order_id: impl Into<String>, resolver: impl Into<String>) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            order_id: order_id.into(),
            resolver: resolver.into(),
        }
    }

    /// Span to attach to the order's tasks with `Instrument::instrument`
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "settlement",
            correlation_id = %self.correlation_id,
            order_id = %self.order_id,
            resolver = %self.resolver,
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("tracing initialization error: {0}")]
    InitError(String),
}
