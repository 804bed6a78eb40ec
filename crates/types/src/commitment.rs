use cosmwasm_std::Uint128;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a resolver's commitment to fill an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommitmentStatus {
    /// Accepted, escrows not yet reported ready
    Pending,
    /// Resolver reported both escrows funded
    Confirmed,
    /// Grace period elapsed without ready escrows
    Expired,
    /// Order reached a terminal state while the commitment was active
    Superseded,
}

impl CommitmentStatus {
    /// Active commitments block any other resolver from committing
    pub fn is_active(&self) -> bool {
        matches!(self, CommitmentStatus::Pending | CommitmentStatus::Confirmed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommitmentStatus::Pending => "Pending",
            CommitmentStatus::Confirmed => "Confirmed",
            CommitmentStatus::Expired => "Expired",
            CommitmentStatus::Superseded => "Superseded",
        }
    }
}

impl fmt::Display for CommitmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommitmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(CommitmentStatus::Pending),
            "Confirmed" => Ok(CommitmentStatus::Confirmed),
            "Expired" => Ok(CommitmentStatus::Expired),
            "Superseded" => Ok(CommitmentStatus::Superseded),
            other => Err(format!("unknown commitment status: {other}")),
        }
    }
}

/// A resolver's accepted bid for an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub order_id: String,
    pub resolver: String,
    /// Destination amount the resolver agreed to deliver
    pub committed_price: Uint128,
    pub committed_at: u64,
    pub status: CommitmentStatus,
    pub updated_at: u64,
}

impl Commitment {
    pub fn new(
        order_id: impl Into<String>,
        resolver: impl Into<String>,
        committed_price: Uint128,
        committed_at: u64,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            resolver: resolver.into(),
            committed_price,
            committed_at,
            status: CommitmentStatus::Pending,
            updated_at: committed_at,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Whether the grace period measured from `committed_at` has run out
    pub fn grace_elapsed(&self, now: u64, grace_period_secs: u64) -> bool {
        now >= self.committed_at.saturating_add(grace_period_secs)
    }
}
