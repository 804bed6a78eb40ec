use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};

lazy_static! {
    // ═══════════════════════════════════════════════════════════════════════════
    // ORDER METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Orders admitted by intake
    pub static ref ORDERS_CREATED: IntCounter = register_int_counter!(
        "unite_orders_created_total",
        "Total number of orders admitted"
    )
    .unwrap();

    /// Order transitions by target status
    pub static ref ORDER_STATUS_COUNT: IntCounterVec = register_int_counter_vec!(
        "unite_order_status_total",
        "Total order transitions by target status",
        &["status"]
    )
    .unwrap();

    /// Orders not yet in a terminal status
    pub static ref ACTIVE_ORDERS: IntGauge = register_int_gauge!(
        "unite_orders_active",
        "Current number of non-terminal orders"
    )
    .unwrap();

    // ═══════════════════════════════════════════════════════════════════════════
    // COMMITMENT METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub static ref COMMITMENTS_ACCEPTED: IntCounter = register_int_counter!(
        "unite_commitments_accepted_total",
        "Total number of accepted resolver commitments"
    )
    .unwrap();

    /// Rejected commitments by reason
    pub static ref COMMITMENTS_REJECTED: IntCounterVec = register_int_counter_vec!(
        "unite_commitments_rejected_total",
        "Total number of rejected resolver commitments",
        &["reason"]
    )
    .unwrap();

    /// Commitments whose grace period lapsed, reopening the auction
    pub static ref COMMITMENTS_EXPIRED: IntCounter = register_int_counter!(
        "unite_commitments_expired_total",
        "Total number of commitments expired for re-auction"
    )
    .unwrap();

    // ═══════════════════════════════════════════════════════════════════════════
    // SETTLEMENT METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub static ref SECRETS_REVEALED: IntCounter = register_int_counter!(
        "unite_secrets_revealed_total",
        "Total number of hashlock secrets disclosed"
    )
    .unwrap();

    /// Seconds from escrow instruction until both escrows were funded
    pub static ref ESCROW_CONFIRMATION_LATENCY: HistogramVec = register_histogram_vec!(
        "unite_escrow_confirmation_latency_secs",
        "Time from escrow instruction to both escrows funded",
        &["src_chain", "dst_chain"],
        vec![5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]
    )
    .unwrap();

    /// Chain adapter failures by chain and kind
    pub static ref ADAPTER_ERRORS: IntCounterVec = register_int_counter_vec!(
        "unite_adapter_errors_total",
        "Total chain adapter errors",
        &["chain_id", "kind"]
    )
    .unwrap();

    // ═══════════════════════════════════════════════════════════════════════════
    // SYSTEM METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub static ref SWEEPS: IntCounter = register_int_counter!(
        "unite_sweeps_total",
        "Total number of expiry and cancellation sweeps"
    )
    .unwrap();

    /// Log events by level, fed by the tracing layer
    pub static ref LOG_EVENTS: IntCounterVec = register_int_counter_vec!(
        "unite_log_events_total",
        "Total log events by level",
        &["level"]
    )
    .unwrap();
}
