use thiserror::Error;
use unite_chain::AdapterError;
use unite_channel::ChannelError;
use unite_settlement::{CommitError, OrderError, StoreError};
use unite_types::{EscrowRole, OrderStatus};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("order {order_id} cannot be cancelled in status {status}")]
    CannotCancel { order_id: String, status: OrderStatus },

    #[error("{caller} is not the maker of order {order_id}")]
    NotMaker { order_id: String, caller: String },

    #[error("order {order_id} has no {role} escrow record")]
    MissingEscrow { order_id: String, role: EscrowRole },

    #[error("order rejected: {0}")]
    Order(#[from] OrderError),

    #[error("commitment rejected: {0}")]
    Commit(#[from] CommitError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("chain adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}

impl CoordinatorError {
    /// Races with another resolver or coordinator that the caller backs off from
    pub fn is_race(&self) -> bool {
        match self {
            CoordinatorError::Commit(e) => e.is_race(),
            CoordinatorError::Store(StoreError::Conflict { .. })
            | CoordinatorError::Store(StoreError::TerminalState { .. }) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
