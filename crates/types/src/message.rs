//! Payloads exchanged over the notification channel

use cosmwasm_std::Uint128;
use serde::{Deserialize, Serialize};

use crate::{AuctionParams, EscrowParams, Order, OrderStatus, Secret};

/// Published by the coordinator when an order opens (or re-opens) for bidding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAnnouncement {
    pub order_id: String,
    pub maker: String,
    pub src_chain_id: String,
    pub dst_chain_id: String,
    pub src_asset: String,
    pub dst_asset: String,
    pub src_amount: Uint128,
    pub auction: AuctionParams,
    pub secret_hash: String,
    pub fill_deadline: u64,
}

impl From<&Order> for OrderAnnouncement {
    fn from(order: &Order) -> Self {
        let terms = &order.terms;
        Self {
            order_id: order.order_id.clone(),
            maker: terms.maker.clone(),
            src_chain_id: terms.src_chain_id.clone(),
            dst_chain_id: terms.dst_chain_id.clone(),
            src_asset: terms.src_asset.clone(),
            dst_asset: terms.dst_asset.clone(),
            src_amount: terms.src_amount,
            auction: terms.auction,
            secret_hash: terms.secret_hash.clone(),
            fill_deadline: terms.fill_deadline,
        }
    }
}

/// Resolver bid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentMessage {
    pub order_id: String,
    pub resolver: String,
    pub committed_price: Uint128,
    pub timestamp: u64,
}

/// Tells the winning resolver which escrows to deploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowInstruction {
    pub order_id: String,
    pub resolver: String,
    pub src: EscrowParams,
    pub dst: EscrowParams,
    /// Escrows must be funded before this unix time or the commitment lapses
    pub ready_by: u64,
}

/// Resolver reports both escrows deployed and funded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessMessage {
    pub order_id: String,
    pub resolver: String,
    pub src_escrow: String,
    pub dst_escrow: String,
}

/// Secret disclosure once both legs are funded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretReveal {
    pub order_id: String,
    pub secret: Secret,
    pub src_escrow: String,
    pub dst_escrow: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub order_id: String,
    pub status: OrderStatus,
    pub timestamp: u64,
}
