//! Unite resolver agent
//!
//! A resolver watches order announcements, bids at the current Dutch
//! auction price when its own quote leaves enough margin, deploys the source
//! and destination HTLC escrows when its commitment is accepted, and claims
//! the source leg once the coordinator reveals the secret.

mod agent;
mod error;
mod quoter;

pub use agent::{Decision, Deployment, ResolverAgent, ResolverSettings, SkipReason};
pub use error::{QuoteError, ResolverError, Result};
pub use quoter::{is_profitable, FixedRateQuoter, PriceQuoter};
