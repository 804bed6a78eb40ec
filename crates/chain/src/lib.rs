//! Chain adapters for the Unite settlement coordinator
//!
//! Each supported chain is reached through a [`ChainAdapter`] that can create
//! an HTLC escrow, read its state, withdraw with the secret and cancel after
//! the timelock. Adapters are looked up by chain id in a
//! [`ChainAdapterRegistry`].

pub mod adapter;
pub mod mock;
pub mod registry;

pub use adapter::{AdapterError, ChainAdapter, TxResult};
pub use mock::MockChainAdapter;
pub use registry::ChainAdapterRegistry;
