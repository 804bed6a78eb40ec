use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use unite_types::{
    both_legs_funded, Commitment, CommitmentStatus, EscrowRecord, EscrowRole, Order,
    OrderStatus, Secret,
};

use crate::StoreError;

// ═══════════════════════════════════════════════════════════════════════════
// CORE TYPES
// ═══════════════════════════════════════════════════════════════════════════

/// One applied status change
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateTransition {
    pub from_status: OrderStatus,
    pub to_status: OrderStatus,
    pub timestamp: u64,
    pub details: Option<String>,
}

impl StateTransition {
    pub fn new(from_status: OrderStatus, to_status: OrderStatus, timestamp: u64) -> Self {
        Self {
            from_status,
            to_status,
            timestamp,
            details: None,
        }
    }

    pub fn with_details(mut self, details: Option<String>) -> Self {
        self.details = details;
        self
    }
}

/// Decide why a compare-and-set on `order_id` did not apply
pub(crate) fn transition_rejection(
    order_id: &str,
    expected: OrderStatus,
    actual: OrderStatus,
) -> StoreError {
    if actual.is_terminal() {
        StoreError::TerminalState {
            order_id: order_id.to_string(),
            status: actual,
        }
    } else {
        StoreError::Conflict {
            order_id: order_id.to_string(),
            expected,
            actual,
        }
    }
}

/// Status an active commitment takes when its order moves to `to`, if any
pub(crate) fn displaced_commitment_status(to: OrderStatus) -> Option<CommitmentStatus> {
    match to {
        OrderStatus::Announced => Some(CommitmentStatus::Expired),
        OrderStatus::Cancelled | OrderStatus::Expired => Some(CommitmentStatus::Superseded),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// STORE TRAIT
// ═══════════════════════════════════════════════════════════════════════════

/// Durable order records. Every status change goes through [`transition`],
/// a compare-and-set against the stored status.
///
/// [`transition`]: OrderStore::transition
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;

    async fn get_order(&self, order_id: &str) -> Result<Order, StoreError>;

    /// Move `order_id` from `from` to `to`.
    ///
    /// Fails with `Conflict` when the stored status is not `from`, with
    /// `TerminalState` once the order is settled, cancelled or expired, and
    /// with `InvalidTransition` for edges the state machine does not have.
    /// Moving back to `Announced` expires the active commitment; moving to
    /// `Cancelled` or `Expired` supersedes it. Either way the escrow records
    /// reported under that commitment are marked superseded.
    async fn transition(
        &self,
        order_id: &str,
        from: OrderStatus,
        to: OrderStatus,
        now: u64,
        details: Option<String>,
    ) -> Result<Order, StoreError>;

    /// Expire every open order whose fill deadline is at or before `now`.
    /// Returns the ids that were expired.
    async fn expire_stale_orders(&self, now: u64) -> Result<Vec<String>, StoreError>;

    async fn list_by_status(
        &self,
        status: OrderStatus,
        limit: usize,
    ) -> Result<Vec<Order>, StoreError>;

    async fn get_history(&self, order_id: &str) -> Result<Vec<StateTransition>, StoreError>;

    /// Insert or replace the escrow record for
    /// `(order_id, chain_id, escrow_address)`. A superseded record stays
    /// superseded.
    async fn upsert_escrow(&self, record: &EscrowRecord) -> Result<(), StoreError>;

    /// Every escrow record of the order, source legs first
    async fn get_escrows(&self, order_id: &str) -> Result<Vec<EscrowRecord>, StoreError>;

    /// Superseded escrows that are not yet withdrawn or cancelled, across all
    /// orders, oldest first
    async fn superseded_escrows(&self, limit: usize) -> Result<Vec<EscrowRecord>, StoreError>;
}

/// Source legs first, then by creation time
pub(crate) fn sort_escrows(escrows: &mut [EscrowRecord]) {
    escrows.sort_by(|a, b| {
        (a.role != EscrowRole::Source)
            .cmp(&(b.role != EscrowRole::Source))
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

// ═══════════════════════════════════════════════════════════════════════════
// IN-MEMORY STORE
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub(crate) struct OrderSlot {
    pub(crate) order: Order,
    pub(crate) history: Vec<StateTransition>,
    pub(crate) commitments: Vec<Commitment>,
    pub(crate) escrows: Vec<EscrowRecord>,
    pub(crate) secret: Option<Secret>,
    pub(crate) revealed_at: Option<u64>,
}

impl OrderSlot {
    pub(crate) fn active_commitment_mut(&mut self) -> Option<&mut Commitment> {
        self.commitments.iter_mut().find(|c| c.is_active())
    }

    pub(crate) fn active_commitment(&self) -> Option<&Commitment> {
        self.commitments.iter().find(|c| c.is_active())
    }

    /// Both legs reported by the active commitment's resolver are funded
    pub(crate) fn active_escrows_funded(&self) -> bool {
        self.active_commitment()
            .is_some_and(|c| both_legs_funded(&self.escrows, &c.resolver))
    }

    /// Apply a status change already validated by the caller
    pub(crate) fn apply(&mut self, to: OrderStatus, now: u64, details: Option<String>) {
        let from = self.order.status;
        if let Some(status) = displaced_commitment_status(to) {
            if let Some(active) = self.active_commitment_mut() {
                active.status = status;
                active.updated_at = now;
            }
            for record in self.escrows.iter_mut() {
                record.superseded = true;
            }
        }
        self.order.status = to;
        self.order.updated_at = now;
        self.history
            .push(StateTransition::new(from, to, now).with_details(details));
    }
}

/// Process-local backend for tests and single-node runs.
///
/// Each order lives in its own mutex-guarded slot, so conditional updates on
/// different orders never wait on one another.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    slots: RwLock<HashMap<String, Arc<Mutex<OrderSlot>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().unwrap().is_empty()
    }

    pub(crate) fn slot(&self, order_id: &str) -> Result<Arc<Mutex<OrderSlot>>, StoreError> {
        self.slots
            .read()
            .unwrap()
            .get(order_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(order_id.to_string()))
    }

    fn all_slots(&self) -> Vec<Arc<Mutex<OrderSlot>>> {
        self.slots.read().unwrap().values().cloned().collect()
    }
}

pub(crate) fn lock(slot: &Mutex<OrderSlot>) -> MutexGuard<'_, OrderSlot> {
    slot.lock().unwrap()
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut slots = self.slots.write().unwrap();
        if slots.contains_key(&order.order_id) {
            return Err(StoreError::DuplicateId(order.order_id.clone()));
        }
        slots.insert(
            order.order_id.clone(),
            Arc::new(Mutex::new(OrderSlot {
                order: order.clone(),
                history: Vec::new(),
                commitments: Vec::new(),
                escrows: Vec::new(),
                secret: None,
                revealed_at: None,
            })),
        );
        Ok(())
    }

    async fn get_order(&self, order_id: &str) -> Result<Order, StoreError> {
        let slot = self.slot(order_id)?;
        let order = lock(&slot).order.clone();
        Ok(order)
    }

    async fn transition(
        &self,
        order_id: &str,
        from: OrderStatus,
        to: OrderStatus,
        now: u64,
        details: Option<String>,
    ) -> Result<Order, StoreError> {
        let slot = self.slot(order_id)?;
        let mut slot = lock(&slot);

        let actual = slot.order.status;
        if actual != from {
            return Err(transition_rejection(order_id, from, actual));
        }
        if !from.can_transition_to(to) {
            return Err(StoreError::InvalidTransition { from, to });
        }

        slot.apply(to, now, details);
        Ok(slot.order.clone())
    }

    async fn expire_stale_orders(&self, now: u64) -> Result<Vec<String>, StoreError> {
        let mut expired = Vec::new();
        for slot in self.all_slots() {
            let mut slot = lock(&slot);
            if slot.order.status.is_expirable() && slot.order.is_past_deadline(now) {
                slot.apply(
                    OrderStatus::Expired,
                    now,
                    Some("fill deadline passed".to_string()),
                );
                expired.push(slot.order.order_id.clone());
            }
        }
        expired.sort();
        Ok(expired)
    }

    async fn list_by_status(
        &self,
        status: OrderStatus,
        limit: usize,
    ) -> Result<Vec<Order>, StoreError> {
        let mut results: Vec<Order> = self
            .all_slots()
            .iter()
            .map(|slot| lock(slot).order.clone())
            .filter(|order| order.status == status)
            .collect();

        results.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.order_id.cmp(&b.order_id))
        });
        results.truncate(limit);
        Ok(results)
    }

    async fn get_history(&self, order_id: &str) -> Result<Vec<StateTransition>, StoreError> {
        let slot = self.slot(order_id)?;
        let history = lock(&slot).history.clone();
        Ok(history)
    }

    async fn upsert_escrow(&self, record: &EscrowRecord) -> Result<(), StoreError> {
        let slot = self.slot(&record.order_id)?;
        let mut slot = lock(&slot);
        match slot.escrows.iter_mut().find(|e| {
            e.chain_id == record.chain_id && e.escrow_address == record.escrow_address
        }) {
            Some(existing) => {
                let superseded = existing.superseded || record.superseded;
                *existing = record.clone();
                existing.superseded = superseded;
            }
            None => slot.escrows.push(record.clone()),
        }
        Ok(())
    }

    async fn get_escrows(&self, order_id: &str) -> Result<Vec<EscrowRecord>, StoreError> {
        let slot = self.slot(order_id)?;
        let mut escrows = lock(&slot).escrows.clone();
        sort_escrows(&mut escrows);
        Ok(escrows)
    }

    async fn superseded_escrows(&self, limit: usize) -> Result<Vec<EscrowRecord>, StoreError> {
        let mut escrows: Vec<EscrowRecord> = self
            .all_slots()
            .iter()
            .flat_map(|slot| {
                lock(slot)
                    .escrows
                    .iter()
                    .filter(|e| e.awaits_refund())
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();

        escrows.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.escrow_address.cmp(&b.escrow_address))
        });
        escrows.truncate(limit);
        Ok(escrows)
    }
}
