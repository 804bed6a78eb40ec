use cosmwasm_std::Uint128;
use thiserror::Error;
use unite_channel::ChannelError;
use unite_types::{OrderStatus, ValidationError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("order not found: {0}")]
    NotFound(String),

    #[error("duplicate order ID: {0}")]
    DuplicateId(String),

    #[error("status conflict on {order_id}: expected {expected}, found {actual}")]
    Conflict {
        order_id: String,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    #[error("order {order_id} is terminal ({status})")]
    TerminalState { order_id: String, status: OrderStatus },

    #[error("invalid transition {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("secret for {order_id} cannot be revealed while {status}")]
    SecretLocked { order_id: String, status: OrderStatus },

    #[error("no secret stored for {0}")]
    SecretMissing(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("connection error: {0}")]
    ConnectionError(String),
}

/// Rejections from the commitment ledger
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("order {order_id} is not open for commitments ({status})")]
    OrderNotAnnounced { order_id: String, status: OrderStatus },

    #[error("committed price {offered} is below current auction price {required}")]
    PriceTooLow { offered: Uint128, required: Uint128 },

    #[error("order {order_id} already committed to {resolver}")]
    AlreadyCommitted { order_id: String, resolver: String },

    #[error("commitment belongs to {expected}, not {actual}")]
    ResolverMismatch { expected: String, actual: String },

    #[error("no active commitment for {0}")]
    NoActiveCommitment(String),

    #[error("order not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(StoreError),
}

impl CommitError {
    /// Expected races that the losing caller should silently back off from
    pub fn is_race(&self) -> bool {
        matches!(
            self,
            CommitError::AlreadyCommitted { .. }
                | CommitError::OrderNotAnnounced { .. }
                | CommitError::ResolverMismatch { .. }
                | CommitError::NoActiveCommitment(_)
        )
    }
}

impl From<StoreError> for CommitError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => CommitError::NotFound(id),
            other => CommitError::Store(other),
        }
    }
}

/// Failures admitting a new order
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("invalid order: {0}")]
    Invalid(#[from] ValidationError),

    #[error("order {order_id} is past its fill deadline {fill_deadline}")]
    DeadlinePassed { order_id: String, fill_deadline: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to announce order: {0}")]
    Channel(#[from] ChannelError),
}
