use std::time::Duration;

use prometheus::{Encoder, TextEncoder};
use unite_types::OrderStatus;

use crate::metrics::*;

/// Why a commitment was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitRejection {
    NotAnnounced,
    PriceTooLow,
    AlreadyCommitted,
    Other,
}

impl CommitRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitRejection::NotAnnounced => "not_announced",
            CommitRejection::PriceTooLow => "price_too_low",
            CommitRejection::AlreadyCommitted => "already_committed",
            CommitRejection::Other => "other",
        }
    }
}

/// Records settlement metrics into the process-wide prometheus registry
#[derive(Debug, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ORDER METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_order_created(&self) {
        ORDERS_CREATED.inc();
        ACTIVE_ORDERS.inc();
    }

    /// Record a transition into `status`
    pub fn record_order_status(&self, status: OrderStatus) {
        let label = match status {
            OrderStatus::Announced => "announced",
            OrderStatus::Committed => "committed",
            OrderStatus::EscrowsPending => "escrows_pending",
            OrderStatus::EscrowsReady => "escrows_ready",
            OrderStatus::Settled => "settled",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Expired => "expired",
        };
        ORDER_STATUS_COUNT.with_label_values(&[label]).inc();

        if status.is_terminal() {
            ACTIVE_ORDERS.dec();
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // COMMITMENT METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_commitment_accepted(&self) {
        COMMITMENTS_ACCEPTED.inc();
    }

    pub fn record_commitment_rejected(&self, reason: CommitRejection) {
        COMMITMENTS_REJECTED
            .with_label_values(&[reason.as_str()])
            .inc();
    }

    pub fn record_commitment_expired(&self) {
        COMMITMENTS_EXPIRED.inc();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SETTLEMENT METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_secret_revealed(&self) {
        SECRETS_REVEALED.inc();
    }

    pub fn record_escrow_confirmation(&self, src_chain: &str, dst_chain: &str, latency: Duration) {
        ESCROW_CONFIRMATION_LATENCY
            .with_label_values(&[src_chain, dst_chain])
            .observe(latency.as_secs_f64());
    }

    pub fn record_adapter_error(&self, chain_id: &str, kind: &str) {
        ADAPTER_ERRORS.with_label_values(&[chain_id, kind]).inc();
    }

    pub fn record_sweep(&self) {
        SWEEPS.inc();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXPORT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Export metrics in Prometheus text format
    pub fn export_metrics(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::EncodingError(e.to_string()))?;

        String::from_utf8(buffer).map_err(|e| MetricsError::EncodingError(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("encoding error: {0}")]
    EncodingError(String),
}
