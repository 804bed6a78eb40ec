use thiserror::Error;
use unite_chain::AdapterError;
use unite_channel::ChannelError;
use unite_types::EscrowRole;

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("no quote for {src_asset} -> {dst_asset}")]
    UnsupportedPair { src_asset: String, dst_asset: String },

    #[error("quote overflows: {0}")]
    Overflow(String),

    #[error("quote source unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("quote failed: {0}")]
    Quote(#[from] QuoteError),

    #[error("failed to create {role} escrow for {order_id}: {source}")]
    EscrowCreation {
        order_id: String,
        role: EscrowRole,
        #[source]
        source: AdapterError,
    },

    #[error("escrows for {order_id} are due at {ready_by}, too late to deploy")]
    PastReadyBy { order_id: String, ready_by: u64 },

    #[error("chain adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}

pub type Result<T> = std::result::Result<T, ResolverError>;
