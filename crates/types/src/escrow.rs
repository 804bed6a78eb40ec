use cosmwasm_std::Uint128;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ValidationError;

/// Which leg of the swap an escrow secures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EscrowRole {
    /// Holds the maker's source amount, withdrawable by the resolver
    Source,
    /// Holds the resolver's destination amount, withdrawable by the maker
    Destination,
}

impl EscrowRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowRole::Source => "src",
            EscrowRole::Destination => "dst",
        }
    }
}

impl fmt::Display for EscrowRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EscrowRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "src" => Ok(EscrowRole::Source),
            "dst" => Ok(EscrowRole::Destination),
            other => Err(format!("unknown escrow role: {other}")),
        }
    }
}

/// On-chain state of an HTLC escrow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EscrowState {
    Created,
    Funded,
    Withdrawn,
    Cancelled,
}

impl EscrowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowState::Created => "Created",
            EscrowState::Funded => "Funded",
            EscrowState::Withdrawn => "Withdrawn",
            EscrowState::Cancelled => "Cancelled",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, EscrowState::Withdrawn | EscrowState::Cancelled)
    }
}

impl fmt::Display for EscrowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EscrowState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(EscrowState::Created),
            "Funded" => Ok(EscrowState::Funded),
            "Withdrawn" => Ok(EscrowState::Withdrawn),
            "Cancelled" => Ok(EscrowState::Cancelled),
            other => Err(format!("unknown escrow state: {other}")),
        }
    }
}

/// Escrow timelocks as offsets in seconds from escrow creation.
///
/// Each value marks where a phase ends:
/// exclusive withdrawal `[0, withdrawal)`, public withdrawal
/// `[withdrawal, public_withdrawal)`, cancellation by the depositor
/// `[public_withdrawal, cancellation)`, public cancellation afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timelocks {
    pub withdrawal_secs: u64,
    pub public_withdrawal_secs: u64,
    pub cancellation_secs: u64,
}

impl Default for Timelocks {
    fn default() -> Self {
        Self {
            withdrawal_secs: 600,
            public_withdrawal_secs: 1200,
            cancellation_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelockPhase {
    ExclusiveWithdrawal,
    PublicWithdrawal,
    Cancellation,
    PublicCancellation,
}

impl Timelocks {
    pub fn new(withdrawal_secs: u64, public_withdrawal_secs: u64, cancellation_secs: u64) -> Self {
        Self {
            withdrawal_secs,
            public_withdrawal_secs,
            cancellation_secs,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.withdrawal_secs == 0 {
            return Err(ValidationError::InvalidTimelocks(
                "exclusive withdrawal window must be non-zero".to_string(),
            ));
        }
        if self.withdrawal_secs >= self.public_withdrawal_secs
            || self.public_withdrawal_secs >= self.cancellation_secs
        {
            return Err(ValidationError::InvalidTimelocks(format!(
                "expected withdrawal < public withdrawal < cancellation, got {} / {} / {}",
                self.withdrawal_secs, self.public_withdrawal_secs, self.cancellation_secs
            )));
        }
        Ok(())
    }

    pub fn phase_at(&self, created_at: u64, now: u64) -> TimelockPhase {
        let elapsed = now.saturating_sub(created_at);
        if elapsed < self.withdrawal_secs {
            TimelockPhase::ExclusiveWithdrawal
        } else if elapsed < self.public_withdrawal_secs {
            TimelockPhase::PublicWithdrawal
        } else if elapsed < self.cancellation_secs {
            TimelockPhase::Cancellation
        } else {
            TimelockPhase::PublicCancellation
        }
    }

    /// Absolute time at which the depositor may cancel
    pub fn cancellation_starts_at(&self, created_at: u64) -> u64 {
        created_at.saturating_add(self.public_withdrawal_secs)
    }

    pub fn can_cancel(&self, created_at: u64, now: u64) -> bool {
        now >= self.cancellation_starts_at(created_at)
    }
}

/// Everything an adapter needs to deploy one escrow leg
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowParams {
    pub order_id: String,
    pub role: EscrowRole,
    pub chain_id: String,
    pub asset: String,
    pub amount: Uint128,
    pub secret_hash: String,
    pub timelocks: Timelocks,
    pub maker: String,
    pub resolver: String,
    /// Collateral posted by the resolver alongside the escrow
    pub safety_deposit: Uint128,
}

impl EscrowParams {
    /// Party that deposits into this escrow
    pub fn depositor(&self) -> &str {
        match self.role {
            EscrowRole::Source => &self.maker,
            EscrowRole::Destination => &self.resolver,
        }
    }

    /// Party that withdraws with the secret
    pub fn beneficiary(&self) -> &str {
        match self.role {
            EscrowRole::Source => &self.resolver,
            EscrowRole::Destination => &self.maker,
        }
    }
}

/// `amount * bps / 10_000`, floored
pub fn safety_deposit(amount: Uint128, bps: u16) -> Uint128 {
    amount.multiply_ratio(bps as u128, 10_000u128)
}

/// Snapshot returned by a chain adapter for one escrow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowSnapshot {
    pub state: EscrowState,
    pub funded_amount: Uint128,
}

/// Coordinator-side view of one deployed escrow.
///
/// Records are tied to the resolver that reported them. Once that resolver's
/// commitment is displaced its records are `superseded`: they never count
/// toward settlement and are only kept around to be refunded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRecord {
    pub order_id: String,
    /// Resolver that deployed the escrow
    pub resolver: String,
    pub role: EscrowRole,
    pub chain_id: String,
    pub escrow_address: String,
    /// Amount the escrow is expected to hold
    pub amount: Uint128,
    /// Amount observed on chain
    pub confirmed_amount: Uint128,
    pub timelocks: Timelocks,
    pub created_at: u64,
    pub state: EscrowState,
    #[serde(default)]
    pub superseded: bool,
}

impl EscrowRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_id: impl Into<String>,
        resolver: impl Into<String>,
        role: EscrowRole,
        chain_id: impl Into<String>,
        escrow_address: impl Into<String>,
        amount: Uint128,
        timelocks: Timelocks,
        created_at: u64,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            resolver: resolver.into(),
            role,
            chain_id: chain_id.into(),
            escrow_address: escrow_address.into(),
            amount,
            confirmed_amount: Uint128::zero(),
            timelocks,
            created_at,
            state: EscrowState::Created,
            superseded: false,
        }
    }

    /// Counts toward settlement of `resolver`'s commitment
    pub fn is_live_for(&self, resolver: &str) -> bool {
        !self.superseded && self.resolver == resolver
    }

    /// Superseded and still holding funds on chain
    pub fn awaits_refund(&self) -> bool {
        self.superseded && !self.state.is_closed()
    }

    /// Funded with at least the expected amount
    pub fn is_funded(&self) -> bool {
        self.state == EscrowState::Funded && self.confirmed_amount >= self.amount
    }

    pub fn apply_snapshot(&mut self, snapshot: EscrowSnapshot) {
        self.state = snapshot.state;
        self.confirmed_amount = snapshot.funded_amount;
    }
}

/// Live record `resolver` reported for `role`, if any
pub fn live_escrow<'a>(
    escrows: &'a [EscrowRecord],
    resolver: &str,
    role: EscrowRole,
) -> Option<&'a EscrowRecord> {
    escrows
        .iter()
        .find(|e| e.role == role && e.is_live_for(resolver))
}

/// Whether `resolver` has a funded source and destination escrow among `escrows`.
/// Records from displaced commitments are ignored.
pub fn both_legs_funded(escrows: &[EscrowRecord], resolver: &str) -> bool {
    [EscrowRole::Source, EscrowRole::Destination]
        .into_iter()
        .all(|role| live_escrow(escrows, resolver, role).is_some_and(EscrowRecord::is_funded))
}
