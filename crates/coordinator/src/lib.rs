//! Unite settlement coordinator
//!
//! Drives each order through
//! `Announced -> Committed -> EscrowsPending -> EscrowsReady -> Settled`:
//! admits resolver commitments, instructs escrow deployment, confirms
//! funding on both chains, reveals the secret and withdraws the destination
//! leg. A periodic sweep handles fill deadlines, lapsed commitments and
//! escrow refunds. [`OrderApi`] serves order intake and status over HTTP.

mod api;
mod coordinator;
mod error;
mod service;
mod settings;
mod sweeper;

pub use api::{OrderApi, OrderDetails, OrderList, SubmitOrderRequest};
pub use coordinator::{PollOutcome, SettlementCoordinator};
pub use error::{CoordinatorError, Result};
pub use settings::CoordinatorSettings;
pub use sweeper::SweepReport;

/// Current unix time in seconds
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

#[cfg(test)]
mod tests;
