use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use unite_retry::Retryable;
use unite_types::{EscrowParams, EscrowSnapshot, Secret};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("timelock not elapsed for {escrow}, available at {available_at}")]
    TimelockNotElapsed { escrow: String, available_at: u64 },

    #[error("escrow already withdrawn: {0}")]
    AlreadyWithdrawn(String),

    #[error("escrow already cancelled: {0}")]
    AlreadyCancelled(String),

    #[error("escrow not found: {0}")]
    EscrowNotFound(String),

    #[error("secret does not match hashlock of {0}")]
    InvalidSecret(String),

    #[error("unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("network error: {0}")]
    NetworkError(String),
}

impl AdapterError {
    /// Only transport failures are worth retrying; everything else reflects
    /// on-chain state that a retry cannot change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdapterError::NetworkError(_))
    }

    /// Stable label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            AdapterError::InsufficientFunds(_) => "insufficient_funds",
            AdapterError::TimelockNotElapsed { .. } => "timelock_not_elapsed",
            AdapterError::AlreadyWithdrawn(_) => "already_withdrawn",
            AdapterError::AlreadyCancelled(_) => "already_cancelled",
            AdapterError::EscrowNotFound(_) => "escrow_not_found",
            AdapterError::InvalidSecret(_) => "invalid_secret",
            AdapterError::UnsupportedChain(_) => "unsupported_chain",
            AdapterError::NetworkError(_) => "network",
        }
    }
}

impl Retryable for AdapterError {
    fn is_retryable(&self) -> bool {
        AdapterError::is_retryable(self)
    }
}

/// Submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    pub chain_id: String,
    pub tx_hash: String,
}

/// Per-chain HTLC escrow capability
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    fn chain_id(&self) -> &str;

    /// Deploy and fund an escrow, returning its address
    async fn create_escrow(&self, params: &EscrowParams) -> Result<String, AdapterError>;

    async fn get_escrow_state(&self, escrow_address: &str) -> Result<EscrowSnapshot, AdapterError>;

    async fn withdraw(&self, escrow_address: &str, secret: &Secret)
        -> Result<TxResult, AdapterError>;

    async fn cancel(&self, escrow_address: &str) -> Result<TxResult, AdapterError>;

    async fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_network_errors_retry() {
        assert!(AdapterError::NetworkError("timeout".into()).is_retryable());
        assert!(!AdapterError::InsufficientFunds("0".into()).is_retryable());
        assert!(!AdapterError::AlreadyWithdrawn("0x1".into()).is_retryable());
        assert!(!AdapterError::TimelockNotElapsed {
            escrow: "0x1".into(),
            available_at: 10
        }
        .is_retryable());
    }
}
