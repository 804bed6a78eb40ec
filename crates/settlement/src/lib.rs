//! Durable settlement state: orders and their transition history, resolver
//! commitments, escrow records and hashlock secrets.
//!
//! Every backend exposes the same three traits; mutations are conditional
//! writes against the stored status so concurrent coordinators and resolvers
//! never lose updates.

pub mod error;
pub mod intake;
pub mod ledger;
pub mod secrets;
pub mod sqlite_store;
pub mod store;

pub use error::*;
pub use intake::*;
pub use ledger::*;
pub use secrets::*;
pub use sqlite_store::*;
pub use store::*;

/// Everything the coordinator needs from a storage backend
pub trait SettlementBackend: OrderStore + CommitmentLedger + SecretVault {}

impl<T> SettlementBackend for T where T: OrderStore + CommitmentLedger + SecretVault {}
