use serde_json::json;
use tracing::{debug, info, warn};
use unite_chain::AdapterError;
use unite_settlement::{SettlementBackend, StoreError};
use unite_types::{EscrowRecord, EscrowState, Order, OrderStatus};

use crate::{PollOutcome, Result, SettlementCoordinator};

/// What one sweep changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Orders moved to `Expired` past their fill deadline
    pub expired_orders: Vec<String>,
    /// Orders whose commitment lapsed and went back to auction
    pub expired_commitments: Vec<String>,
    /// Orders the sweep carried through to `Settled`
    pub settled_orders: Vec<String>,
    /// Orders cancelled after their escrows were refunded
    pub cancelled_orders: Vec<String>,
    /// Escrow addresses cancelled on chain, superseded ones included
    pub refunded_escrows: Vec<String>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired_orders.is_empty()
            && self.expired_commitments.is_empty()
            && self.settled_orders.is_empty()
            && self.cancelled_orders.is_empty()
            && self.refunded_escrows.is_empty()
    }

    pub fn summary(&self) -> serde_json::Value {
        json!({
            "expired_orders": self.expired_orders.len(),
            "expired_commitments": self.expired_commitments.len(),
            "settled_orders": self.settled_orders.len(),
            "cancelled_orders": self.cancelled_orders.len(),
            "refunded_escrows": self.refunded_escrows.len(),
        })
    }
}

impl<S> SettlementCoordinator<S>
where
    S: SettlementBackend + 'static,
{
    /// One pass of timeout handling, in order:
    /// 1. expire orders past their fill deadline
    /// 2. poll escrows of pending orders and finish settlement for orders
    ///    stuck in `EscrowsReady`
    /// 3. expire lapsed commitments and re-announce their orders
    /// 4. cancel superseded escrows once their cancellation timelock passed
    /// 5. cancel pending orders whose live escrows passed their cancellation
    ///    timelock without a reveal
    ///
    /// Failures on one order are logged and do not stop the sweep.
    pub async fn sweep(&self, now: u64) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        let batch = self.settings.sweep_batch;
        self.metrics.record_sweep();

        for order_id in self.store.expire_stale_orders(now).await? {
            info!(order_id = %order_id, "order expired past fill deadline");
            self.status_changed(&order_id, OrderStatus::Expired, now)
                .await;
            report.expired_orders.push(order_id);
        }

        for status in [OrderStatus::EscrowsPending, OrderStatus::EscrowsReady] {
            for order in self.store.list_by_status(status, batch).await? {
                match self.poll_escrows(&order.order_id, now).await {
                    Ok(PollOutcome::Settled) => report.settled_orders.push(order.order_id),
                    Ok(_) => {}
                    Err(e) => {
                        warn!(order_id = %order.order_id, error = %e, "settlement retry failed")
                    }
                }
            }
        }

        for status in [OrderStatus::Committed, OrderStatus::EscrowsPending] {
            for order in self.store.list_by_status(status, batch).await? {
                match self.expire_commitment(&order.order_id, now).await {
                    Ok(Some(_)) => report.expired_commitments.push(order.order_id),
                    Ok(None) => {}
                    Err(e) => {
                        warn!(order_id = %order.order_id, error = %e, "commitment expiry failed")
                    }
                }
            }
        }

        for mut record in self.store.superseded_escrows(batch).await? {
            if !record.timelocks.can_cancel(record.created_at, now) {
                continue;
            }
            match self.cancel_escrow(&mut record).await {
                Ok(true) => report.refunded_escrows.push(record.escrow_address),
                Ok(false) => {}
                Err(e) => {
                    warn!(order_id = %record.order_id, error = %e, "escrow refund failed")
                }
            }
        }

        for order in self
            .store
            .list_by_status(OrderStatus::EscrowsPending, batch)
            .await?
        {
            match self.refund_pending_order(&order, now).await {
                Ok((refunded, cancelled)) => {
                    report.refunded_escrows.extend(refunded);
                    if cancelled {
                        report.cancelled_orders.push(order.order_id);
                    }
                }
                Err(e) => warn!(order_id = %order.order_id, error = %e, "escrow refund failed"),
            }
        }

        if !report.is_empty() {
            info!(summary = %report.summary(), "sweep completed");
        }
        Ok(report)
    }

    /// Cancel one escrow on chain and store its closed state. Returns whether
    /// this call refunded it; an escrow already closed on chain is recorded
    /// as such without counting.
    async fn cancel_escrow(&self, record: &mut EscrowRecord) -> Result<bool> {
        let adapter = self.adapters.get(&record.chain_id)?;
        let (state, refunded) = match adapter.cancel(&record.escrow_address).await {
            Ok(tx) => {
                info!(
                    order_id = %record.order_id,
                    resolver = %record.resolver,
                    role = %record.role,
                    tx_hash = %tx.tx_hash,
                    "escrow cancelled after timelock"
                );
                (EscrowState::Cancelled, true)
            }
            Err(AdapterError::AlreadyCancelled(_)) => (EscrowState::Cancelled, false),
            Err(AdapterError::AlreadyWithdrawn(_)) => (EscrowState::Withdrawn, false),
            Err(e) => {
                self.metrics.record_adapter_error(&record.chain_id, e.kind());
                debug!(
                    order_id = %record.order_id,
                    escrow = %record.escrow_address,
                    error = %e,
                    "escrow not cancellable yet"
                );
                return Ok(false);
            }
        };
        record.state = state;
        self.store.upsert_escrow(record).await?;
        Ok(refunded)
    }

    /// Cancel the live escrows of an order still in `EscrowsPending` once all
    /// of them reached their cancellation timelock and the secret was never
    /// revealed, then cancel the order. Returns the refunded addresses and
    /// whether the order was cancelled.
    async fn refund_pending_order(&self, order: &Order, now: u64) -> Result<(Vec<String>, bool)> {
        let order_id = order.order_id.as_str();
        let resolver = match self.store.active_commitment(order_id).await? {
            Some(commitment) => commitment.resolver,
            None => return Ok((Vec::new(), false)),
        };
        let mut escrows: Vec<EscrowRecord> = self
            .store
            .get_escrows(order_id)
            .await?
            .into_iter()
            .filter(|r| r.is_live_for(&resolver) && !r.state.is_closed())
            .collect();
        if escrows.is_empty() {
            return Ok((Vec::new(), false));
        }
        if self.store.revealed_at(order_id).await?.is_some() {
            return Ok((Vec::new(), false));
        }
        if !escrows
            .iter()
            .all(|r| r.timelocks.can_cancel(r.created_at, now))
        {
            return Ok((Vec::new(), false));
        }

        let mut refunded = Vec::new();
        for record in escrows.iter_mut() {
            if self.cancel_escrow(record).await? {
                refunded.push(record.escrow_address.clone());
            }
        }
        if !escrows.iter().all(|r| r.state.is_closed()) {
            return Ok((refunded, false));
        }

        match self
            .store
            .transition(
                order_id,
                OrderStatus::EscrowsPending,
                OrderStatus::Cancelled,
                now,
                Some("escrows cancelled after timelock without reveal".to_string()),
            )
            .await
        {
            Ok(_) => {
                info!(order_id = %order_id, "order cancelled, escrows refunded");
                self.status_changed(order_id, OrderStatus::Cancelled, now)
                    .await;
                Ok((refunded, true))
            }
            Err(StoreError::Conflict { .. } | StoreError::TerminalState { .. }) => {
                Ok((refunded, false))
            }
            Err(e) => Err(e.into()),
        }
    }
}
