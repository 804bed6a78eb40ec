use std::fmt;
use std::str::FromStr;

use cosmwasm_std::{Binary, Uint128};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::{AuctionParams, PROTOCOL_VERSION};

/// Rejections raised while admitting an order into the system
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid auction bounds: {0}")]
    InvalidAuctionBounds(String),

    #[error("invalid chain pair: {0}")]
    InvalidChainPair(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("secret does not match secret hash")]
    SecretMismatch,

    #[error("invalid timelocks: {0}")]
    InvalidTimelocks(String),
}

/// Order lifecycle status. Transitions are driven by the settlement coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Announced,
    Committed,
    EscrowsPending,
    EscrowsReady,
    Settled,
    Cancelled,
    Expired,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Settled | OrderStatus::Cancelled | OrderStatus::Expired
        )
    }

    /// Statuses swept to `Expired` once the fill deadline passes
    pub fn is_expirable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Announced | OrderStatus::Committed | OrderStatus::EscrowsPending
        )
    }

    /// Edges of the settlement state machine
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, to) {
            (Announced, Committed) => true,
            (Committed, EscrowsPending) => true,
            (EscrowsPending, EscrowsReady) => true,
            (EscrowsReady, Settled) => true,
            // re-auction after a commitment lapses
            (Committed, Announced) | (EscrowsPending, Announced) => true,
            (from, Cancelled) | (from, Expired) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Announced => "Announced",
            OrderStatus::Committed => "Committed",
            OrderStatus::EscrowsPending => "EscrowsPending",
            OrderStatus::EscrowsReady => "EscrowsReady",
            OrderStatus::Settled => "Settled",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Expired => "Expired",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Announced" => Ok(OrderStatus::Announced),
            "Committed" => Ok(OrderStatus::Committed),
            "EscrowsPending" => Ok(OrderStatus::EscrowsPending),
            "EscrowsReady" => Ok(OrderStatus::EscrowsReady),
            "Settled" => Ok(OrderStatus::Settled),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            "Expired" => Ok(OrderStatus::Expired),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// The signed content of a swap intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTerms {
    /// Protocol version for compatibility
    pub version: String,

    /// Nonce for replay protection
    pub nonce: u64,

    /// Maker's address on the source chain
    pub maker: String,

    pub src_chain_id: String,
    pub dst_chain_id: String,
    pub src_asset: String,
    pub dst_asset: String,

    /// Fixed amount the maker deposits on the source chain
    pub src_amount: Uint128,

    /// Schedule for the minimum acceptable destination amount
    pub auction: AuctionParams,

    /// Hex-encoded sha256 of the maker's secret
    pub secret_hash: String,

    /// No commitment is accepted at or after this unix time
    pub fill_deadline: u64,
}

impl OrderTerms {
    /// Canonical hash the maker signs. Strings are length-prefixed so field
    /// boundaries cannot be shifted between adjacent fields.
    pub fn signing_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        update_str(&mut hasher, &self.version);
        hasher.update(self.nonce.to_le_bytes());
        update_str(&mut hasher, &self.maker);
        update_str(&mut hasher, &self.src_chain_id);
        update_str(&mut hasher, &self.dst_chain_id);
        update_str(&mut hasher, &self.src_asset);
        update_str(&mut hasher, &self.dst_asset);
        hasher.update(self.src_amount.u128().to_le_bytes());
        hasher.update(self.auction.start_price.u128().to_le_bytes());
        hasher.update(self.auction.end_price.u128().to_le_bytes());
        hasher.update(self.auction.duration_secs.to_le_bytes());
        hasher.update(self.auction.start_timestamp.to_le_bytes());
        update_str(&mut hasher, &self.secret_hash);
        hasher.update(self.fill_deadline.to_le_bytes());
        hasher.finalize().into()
    }

    /// Order id: hex of the signing hash (content + nonce)
    pub fn order_id(&self) -> String {
        hex::encode(self.signing_hash())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.src_chain_id.is_empty() || self.dst_chain_id.is_empty() {
            return Err(ValidationError::InvalidChainPair(
                "chain ids must not be empty".to_string(),
            ));
        }
        if self.src_chain_id == self.dst_chain_id {
            return Err(ValidationError::InvalidChainPair(format!(
                "source and destination are both {}",
                self.src_chain_id
            )));
        }
        if self.src_amount.is_zero() {
            return Err(ValidationError::InvalidAmount(
                "source amount must be positive".to_string(),
            ));
        }

        self.auction.validate()?;

        if self.fill_deadline <= self.auction.start_timestamp {
            return Err(ValidationError::InvalidAuctionBounds(format!(
                "fill deadline {} is not after auction start {}",
                self.fill_deadline, self.auction.start_timestamp
            )));
        }
        Ok(())
    }

    /// Attach signature material to produce a signed order
    pub fn into_signed(self, signature: Binary, public_key: Binary) -> SignedOrder {
        SignedOrder {
            terms: self,
            signature,
            public_key,
        }
    }
}

fn update_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

/// Order terms plus the maker's authorization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedOrder {
    pub terms: OrderTerms,

    /// secp256k1 signature over [`OrderTerms::signing_hash`]
    pub signature: Binary,

    /// Compressed secp256k1 public key of the maker
    pub public_key: Binary,
}

impl SignedOrder {
    pub fn order_id(&self) -> String {
        self.terms.order_id()
    }

    /// Admit the order with status `Announced`
    pub fn into_order(self, created_at: u64) -> Order {
        Order {
            order_id: self.terms.order_id(),
            terms: self.terms,
            signature: self.signature,
            public_key: self.public_key,
            status: OrderStatus::Announced,
            created_at,
            updated_at: created_at,
        }
    }
}

/// A swap intent admitted into the order store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub terms: OrderTerms,
    pub signature: Binary,
    pub public_key: Binary,
    pub status: OrderStatus,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Order {
    pub fn builder() -> OrderBuilder {
        OrderBuilder::default()
    }

    pub fn is_past_deadline(&self, now: u64) -> bool {
        now >= self.terms.fill_deadline
    }

    /// Minimum destination amount a resolver must commit to at `now`
    pub fn current_price(&self, now: u64) -> Uint128 {
        self.terms.auction.price_at(now)
    }
}

/// Builder for order terms
#[derive(Default)]
pub struct OrderBuilder {
    maker: Option<String>,
    src: Option<(String, String, Uint128)>,
    dst: Option<(String, String)>,
    auction: Option<AuctionParams>,
    secret_hash: Option<String>,
    fill_deadline: Option<u64>,
    nonce: u64,
}

impl OrderBuilder {
    pub fn maker(mut self, maker: impl Into<String>) -> Self {
        self.maker = Some(maker.into());
        self
    }

    pub fn source(
        mut self,
        chain_id: impl Into<String>,
        asset: impl Into<String>,
        amount: impl Into<Uint128>,
    ) -> Self {
        self.src = Some((chain_id.into(), asset.into(), amount.into()));
        self
    }

    pub fn destination(mut self, chain_id: impl Into<String>, asset: impl Into<String>) -> Self {
        self.dst = Some((chain_id.into(), asset.into()));
        self
    }

    pub fn auction(mut self, auction: AuctionParams) -> Self {
        self.auction = Some(auction);
        self
    }

    pub fn secret_hash(mut self, secret_hash: impl Into<String>) -> Self {
        self.secret_hash = Some(secret_hash.into());
        self
    }

    pub fn fill_deadline(mut self, fill_deadline: u64) -> Self {
        self.fill_deadline = Some(fill_deadline);
        self
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn build(self) -> Result<OrderTerms, OrderBuildError> {
        let maker = self.maker.ok_or(OrderBuildError::MissingMaker)?;
        let (src_chain_id, src_asset, src_amount) =
            self.src.ok_or(OrderBuildError::MissingSource)?;
        let (dst_chain_id, dst_asset) = self.dst.ok_or(OrderBuildError::MissingDestination)?;
        let auction = self.auction.ok_or(OrderBuildError::MissingAuction)?;
        let secret_hash = self.secret_hash.ok_or(OrderBuildError::MissingSecretHash)?;
        let fill_deadline = self
            .fill_deadline
            .unwrap_or_else(|| auction.end_timestamp());

        Ok(OrderTerms {
            version: PROTOCOL_VERSION.to_string(),
            nonce: self.nonce,
            maker,
            src_chain_id,
            dst_chain_id,
            src_asset,
            dst_asset,
            src_amount,
            auction,
            secret_hash,
            fill_deadline,
        })
    }
}

#[derive(Debug, Error)]
pub enum OrderBuildError {
    #[error("missing maker address")]
    MissingMaker,
    #[error("missing source leg")]
    MissingSource,
    #[error("missing destination leg")]
    MissingDestination,
    #[error("missing auction parameters")]
    MissingAuction,
    #[error("missing secret hash")]
    MissingSecretHash,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms() -> OrderTerms {
        Order::builder()
            .maker("0xmaker")
            .source("base-sepolia", "USDC", 1_000_000u128)
            .destination("aptos-testnet", "USDC")
            .auction(AuctionParams::new(1_000_000u128, 990_000u128, 300, 1_000))
            .secret_hash("ab".repeat(32))
            .fill_deadline(2_000)
            .nonce(7)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_defaults_deadline_to_auction_end() {
        let t = Order::builder()
            .maker("0xmaker")
            .source("a", "X", 10u128)
            .destination("b", "Y")
            .auction(AuctionParams::new(10u128, 5u128, 60, 100))
            .secret_hash("00")
            .build()
            .unwrap();
        assert_eq!(t.fill_deadline, 160);
    }

    #[test]
    fn test_builder_requires_fields() {
        let err = Order::builder().maker("m").build();
        assert!(matches!(err, Err(OrderBuildError::MissingSource)));
    }

    #[test]
    fn test_order_id_is_deterministic_and_nonce_sensitive() {
        let a = terms();
        let b = terms();
        assert_eq!(a.order_id(), b.order_id());

        let mut c = terms();
        c.nonce = 8;
        assert_ne!(a.order_id(), c.order_id());
    }

    #[test]
    fn test_signing_hash_field_boundaries() {
        let mut a = terms();
        a.src_asset = "USD".to_string();
        a.dst_asset = "CUSDC".to_string();
        let mut b = terms();
        b.src_asset = "USDC".to_string();
        b.dst_asset = "USDC".to_string();
        assert_ne!(a.signing_hash(), b.signing_hash());
    }

    #[test]
    fn test_validate_accepts_well_formed_terms() {
        assert!(terms().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_same_chain() {
        let mut t = terms();
        t.dst_chain_id = t.src_chain_id.clone();
        assert!(matches!(
            t.validate(),
            Err(ValidationError::InvalidChainPair(_))
        ));
    }

    #[test]
    fn test_validate_rejects_deadline_before_start() {
        let mut t = terms();
        t.fill_deadline = t.auction.start_timestamp;
        assert!(matches!(
            t.validate(),
            Err(ValidationError::InvalidAuctionBounds(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_amount() {
        let mut t = terms();
        t.src_amount = Uint128::zero();
        assert!(matches!(t.validate(), Err(ValidationError::InvalidAmount(_))));
    }

    #[test]
    fn test_status_edges() {
        use OrderStatus::*;
        assert!(Announced.can_transition_to(Committed));
        assert!(EscrowsPending.can_transition_to(Announced));
        assert!(EscrowsReady.can_transition_to(Settled));
        assert!(!Announced.can_transition_to(EscrowsReady));
        assert!(!EscrowsReady.can_transition_to(Announced));
        for terminal in [Settled, Cancelled, Expired] {
            for to in [Announced, Committed, Settled, Cancelled, Expired] {
                assert!(!terminal.can_transition_to(to));
            }
        }
    }

    #[test]
    fn test_status_string_roundtrip() {
        for s in [
            OrderStatus::Announced,
            OrderStatus::EscrowsPending,
            OrderStatus::Expired,
        ] {
            assert_eq!(s.as_str().parse::<OrderStatus>().unwrap(), s);
        }
        assert!("Bogus".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_into_order_starts_announced() {
        let order = terms()
            .into_signed(Binary::default(), Binary::default())
            .into_order(1_000);
        assert_eq!(order.status, OrderStatus::Announced);
        assert_eq!(order.order_id, order.terms.order_id());
        assert_eq!(order.current_price(1_150), Uint128::new(995_000));
    }
}
