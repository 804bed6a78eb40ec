use std::sync::Arc;
use std::time::Duration;

use cosmwasm_std::Uint128;
use tracing::{debug, error, info, warn};
use unite_chain::{AdapterError, ChainAdapterRegistry};
use unite_channel::{NotificationChannel, NotificationChannelExt, Topic};
use unite_metrics::{CommitRejection, MetricsCollector};
use unite_retry::retry_with_backoff;
use unite_settlement::{CommitError, OrderIntake, SettlementBackend, StoreError};
use unite_types::{
    both_legs_funded, live_escrow, Commitment, CommitmentMessage, EscrowInstruction,
    EscrowParams, EscrowRecord, EscrowRole, EscrowState, Order, OrderAnnouncement, OrderStatus,
    ReadinessMessage, Secret, SecretReveal, SignedOrder, StatusUpdate,
};

use crate::{CoordinatorError, CoordinatorSettings, Result};

/// Outcome of one escrow confirmation poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// At least one leg is missing or not yet fully funded
    Waiting,
    /// Both legs funded, secret revealed and the destination leg withdrawn
    Settled,
    /// The order is no longer awaiting escrows
    Inactive(OrderStatus),
}

/// Drives orders through the settlement state machine.
///
/// The coordinator owns no order state itself: every decision is a
/// conditional write against the backend, so several handlers (and several
/// coordinator instances) may work on different orders concurrently. Time is
/// passed in explicitly; the service loop supplies the wall clock.
pub struct SettlementCoordinator<S> {
    pub(crate) store: Arc<S>,
    pub(crate) channel: Arc<dyn NotificationChannel>,
    pub(crate) adapters: ChainAdapterRegistry,
    pub(crate) settings: CoordinatorSettings,
    pub(crate) metrics: Arc<MetricsCollector>,
}

impl<S> Clone for SettlementCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            channel: self.channel.clone(),
            adapters: self.adapters.clone(),
            settings: self.settings.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<S> SettlementCoordinator<S>
where
    S: SettlementBackend + 'static,
{
    pub fn new(
        store: Arc<S>,
        channel: Arc<dyn NotificationChannel>,
        adapters: ChainAdapterRegistry,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            store,
            channel,
            adapters,
            settings,
            metrics: Arc::new(MetricsCollector::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ORDER INTAKE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Admit a maker-signed order together with its secret and announce it
    pub async fn submit_order(
        &self,
        signed: SignedOrder,
        secret: &Secret,
        now: u64,
    ) -> Result<Order> {
        let order = OrderIntake::new(self.store.clone(), self.channel.clone())
            .create_order(signed, secret, now)
            .await?;
        self.metrics.record_order_created();
        Ok(order)
    }

    /// Maker cancellation, only possible while no resolver has committed
    pub async fn cancel_order(&self, order_id: &str, maker: &str, now: u64) -> Result<Order> {
        let order = self.store.get_order(order_id).await?;
        if order.terms.maker != maker {
            return Err(CoordinatorError::NotMaker {
                order_id: order_id.to_string(),
                caller: maker.to_string(),
            });
        }
        if order.status != OrderStatus::Announced {
            return Err(CoordinatorError::CannotCancel {
                order_id: order_id.to_string(),
                status: order.status,
            });
        }

        let order = match self
            .store
            .transition(
                order_id,
                OrderStatus::Announced,
                OrderStatus::Cancelled,
                now,
                Some(format!("cancelled by maker {maker}")),
            )
            .await
        {
            Ok(order) => order,
            Err(
                StoreError::Conflict { actual: status, .. }
                | StoreError::TerminalState { status, .. },
            ) => {
                return Err(CoordinatorError::CannotCancel {
                    order_id: order_id.to_string(),
                    status,
                })
            }
            Err(e) => return Err(e.into()),
        };

        info!(order_id = %order_id, maker = %maker, "order cancelled by maker");
        self.status_changed(order_id, OrderStatus::Cancelled, now).await;
        Ok(order)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // RESOLVER MESSAGES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Admit a resolver's bid and instruct it to deploy escrows.
    ///
    /// The price is checked against the auction at `now` (the coordinator's
    /// clock), not the timestamp the resolver put in the message.
    pub async fn handle_commitment(
        &self,
        msg: &CommitmentMessage,
        now: u64,
    ) -> Result<EscrowInstruction> {
        let commitment = match self
            .store
            .try_commit(&msg.order_id, &msg.resolver, msg.committed_price, now)
            .await
        {
            Ok(commitment) => commitment,
            Err(e) => {
                self.metrics.record_commitment_rejected(rejection_reason(&e));
                if e.is_race() {
                    debug!(
                        order_id = %msg.order_id,
                        resolver = %msg.resolver,
                        reason = %e,
                        "commitment rejected"
                    );
                } else {
                    warn!(
                        order_id = %msg.order_id,
                        resolver = %msg.resolver,
                        error = %e,
                        "commitment failed"
                    );
                }
                return Err(e.into());
            }
        };
        self.metrics.record_commitment_accepted();
        self.status_changed(&msg.order_id, OrderStatus::Committed, now)
            .await;

        let order = self
            .store
            .transition(
                &msg.order_id,
                OrderStatus::Committed,
                OrderStatus::EscrowsPending,
                now,
                Some(format!("escrows requested from {}", msg.resolver)),
            )
            .await?;
        self.status_changed(&msg.order_id, OrderStatus::EscrowsPending, now)
            .await;

        let instruction = self.escrow_instruction(&order, &commitment);
        self.channel
            .publish_message(Topic::EscrowInstructions, &instruction)
            .await?;

        info!(
            order_id = %msg.order_id,
            resolver = %msg.resolver,
            price = %commitment.committed_price,
            ready_by = instruction.ready_by,
            "escrow instruction sent"
        );
        Ok(instruction)
    }

    /// Escrow parameters for both legs of `order` as committed.
    ///
    /// The destination leg carries the committed price. Safety deposits are
    /// left for the resolver to fill in.
    pub fn escrow_instruction(&self, order: &Order, commitment: &Commitment) -> EscrowInstruction {
        let terms = &order.terms;
        let leg = |role: EscrowRole, chain_id: &str, asset: &str, amount: Uint128| EscrowParams {
            order_id: order.order_id.clone(),
            role,
            chain_id: chain_id.to_string(),
            asset: asset.to_string(),
            amount,
            secret_hash: terms.secret_hash.clone(),
            timelocks: self.settings.timelocks,
            maker: terms.maker.clone(),
            resolver: commitment.resolver.clone(),
            safety_deposit: Uint128::zero(),
        };

        EscrowInstruction {
            order_id: order.order_id.clone(),
            resolver: commitment.resolver.clone(),
            src: leg(
                EscrowRole::Source,
                &terms.src_chain_id,
                &terms.src_asset,
                terms.src_amount,
            ),
            dst: leg(
                EscrowRole::Destination,
                &terms.dst_chain_id,
                &terms.dst_asset,
                commitment.committed_price,
            ),
            ready_by: commitment
                .committed_at
                .saturating_add(self.settings.grace_period_secs),
        }
    }

    /// Record the escrows a resolver reports as deployed.
    ///
    /// Funding is not trusted from the message; [`poll_escrows`] confirms it
    /// against the chains. A redelivered report for the same addresses keeps
    /// the state already observed. A new address for a leg supersedes the one
    /// the resolver reported before.
    ///
    /// [`poll_escrows`]: Self::poll_escrows
    pub async fn handle_readiness(&self, msg: &ReadinessMessage, now: u64) -> Result<()> {
        let commitment = self
            .store
            .mark_ready(&msg.order_id, &msg.resolver, now)
            .await?;

        let order = self.store.get_order(&msg.order_id).await?;
        if order.status != OrderStatus::EscrowsPending {
            debug!(
                order_id = %msg.order_id,
                status = %order.status,
                "readiness for order not awaiting escrows, ignoring"
            );
            return Ok(());
        }

        let terms = &order.terms;
        let existing = self.store.get_escrows(&msg.order_id).await?;
        let legs = [
            (
                EscrowRole::Source,
                terms.src_chain_id.as_str(),
                msg.src_escrow.as_str(),
                terms.src_amount,
            ),
            (
                EscrowRole::Destination,
                terms.dst_chain_id.as_str(),
                msg.dst_escrow.as_str(),
                commitment.committed_price,
            ),
        ];

        for (role, chain_id, address, amount) in legs {
            let previous = live_escrow(&existing, &msg.resolver, role);
            if previous.is_some_and(|r| r.chain_id == chain_id && r.escrow_address == address) {
                continue;
            }
            if let Some(previous) = previous {
                warn!(
                    order_id = %msg.order_id,
                    role = %role,
                    previous = %previous.escrow_address,
                    escrow = %address,
                    "resolver reported a new escrow for the leg"
                );
                let mut replaced = previous.clone();
                replaced.superseded = true;
                self.store.upsert_escrow(&replaced).await?;
            }
            let record = EscrowRecord::new(
                msg.order_id.as_str(),
                msg.resolver.as_str(),
                role,
                chain_id,
                address,
                amount,
                self.settings.timelocks,
                now,
            );
            self.store.upsert_escrow(&record).await?;
        }

        info!(
            order_id = %msg.order_id,
            resolver = %msg.resolver,
            src_escrow = %msg.src_escrow,
            dst_escrow = %msg.dst_escrow,
            "resolver reported escrows"
        );
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ESCROW CONFIRMATION AND SETTLEMENT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Read both escrows from their chains and settle once both are funded.
    ///
    /// Only the escrows reported under the active commitment count; records
    /// left by a resolver whose commitment lapsed are never polled here. The
    /// secret is only ever revealed from here (or from a sweep retrying an
    /// order already in `EscrowsReady`), after both records were observed
    /// funded with at least the expected amount.
    pub async fn poll_escrows(&self, order_id: &str, now: u64) -> Result<PollOutcome> {
        let order = self.store.get_order(order_id).await?;
        match order.status {
            OrderStatus::EscrowsPending => {}
            OrderStatus::EscrowsReady => {
                self.reveal_and_settle(order_id, now).await?;
                return Ok(PollOutcome::Settled);
            }
            other => return Ok(PollOutcome::Inactive(other)),
        }

        let commitment = match self.store.active_commitment(order_id).await? {
            Some(commitment) => commitment,
            None => return Ok(PollOutcome::Waiting),
        };
        let mut escrows: Vec<EscrowRecord> = self
            .store
            .get_escrows(order_id)
            .await?
            .into_iter()
            .filter(|r| r.is_live_for(&commitment.resolver))
            .collect();
        let reported = [EscrowRole::Source, EscrowRole::Destination]
            .into_iter()
            .all(|role| escrows.iter().any(|r| r.role == role));
        if !reported {
            return Ok(PollOutcome::Waiting);
        }

        for record in escrows.iter_mut() {
            let adapter = self.adapters.get(&record.chain_id)?;
            match adapter.get_escrow_state(&record.escrow_address).await {
                Ok(snapshot) => {
                    if snapshot.state != record.state
                        || snapshot.funded_amount != record.confirmed_amount
                    {
                        record.apply_snapshot(snapshot);
                        self.store.upsert_escrow(record).await?;
                        debug!(
                            order_id = %order_id,
                            role = %record.role,
                            state = %record.state,
                            funded = %record.confirmed_amount,
                            "escrow state changed"
                        );
                    }
                }
                Err(e) if e.is_retryable() || matches!(e, AdapterError::EscrowNotFound(_)) => {
                    self.metrics.record_adapter_error(&record.chain_id, e.kind());
                    debug!(
                        order_id = %order_id,
                        chain_id = %record.chain_id,
                        error = %e,
                        "escrow not observable yet"
                    );
                    return Ok(PollOutcome::Waiting);
                }
                Err(e) => {
                    self.metrics.record_adapter_error(&record.chain_id, e.kind());
                    warn!(
                        order_id = %order_id,
                        chain_id = %record.chain_id,
                        error = %e,
                        "failed to read escrow state"
                    );
                    return Err(e.into());
                }
            }
        }

        if !both_legs_funded(&escrows, &commitment.resolver) {
            return Ok(PollOutcome::Waiting);
        }

        match self
            .store
            .transition(
                order_id,
                OrderStatus::EscrowsPending,
                OrderStatus::EscrowsReady,
                now,
                Some("both escrows funded".to_string()),
            )
            .await
        {
            Ok(_) => {}
            Err(
                StoreError::Conflict { actual: status, .. }
                | StoreError::TerminalState { status, .. },
            ) => {
                debug!(order_id = %order_id, status = %status, "order moved while polling");
                return Ok(PollOutcome::Inactive(status));
            }
            Err(e) => return Err(e.into()),
        }

        self.metrics.record_escrow_confirmation(
            &order.terms.src_chain_id,
            &order.terms.dst_chain_id,
            Duration::from_secs(now.saturating_sub(commitment.committed_at)),
        );
        info!(order_id = %order_id, resolver = %commitment.resolver, "both escrows funded");
        self.status_changed(order_id, OrderStatus::EscrowsReady, now)
            .await;

        self.reveal_and_settle(order_id, now).await?;
        Ok(PollOutcome::Settled)
    }

    /// Reveal the secret, withdraw the destination leg for the maker and mark
    /// the order settled. Safe to repeat.
    pub async fn reveal_and_settle(&self, order_id: &str, now: u64) -> Result<()> {
        let first_reveal = self.store.revealed_at(order_id).await?.is_none();
        let secret = self.store.reveal(order_id, now).await?;
        if first_reveal {
            self.metrics.record_secret_revealed();
        }

        // a settled order keeps its commitment active
        let resolver = self
            .store
            .active_commitment(order_id)
            .await?
            .map(|c| c.resolver)
            .unwrap_or_default();
        let escrows = self.store.get_escrows(order_id).await?;
        let src = find_escrow(order_id, &escrows, &resolver, EscrowRole::Source)?;
        let dst = find_escrow(order_id, &escrows, &resolver, EscrowRole::Destination)?;

        let reveal = SecretReveal {
            order_id: order_id.to_string(),
            secret: secret.clone(),
            src_escrow: src.escrow_address.clone(),
            dst_escrow: dst.escrow_address.clone(),
        };
        if let Err(e) = self.channel.publish_message(Topic::Secrets, &reveal).await {
            // the source leg stays publicly withdrawable with the secret
            warn!(order_id = %order_id, error = %e, "failed to publish secret");
        }

        if dst.state != EscrowState::Withdrawn {
            self.withdraw_destination(order_id, dst, &secret).await?;
        }

        match self
            .store
            .transition(
                order_id,
                OrderStatus::EscrowsReady,
                OrderStatus::Settled,
                now,
                Some(format!("destination withdrawn from {}", dst.escrow_address)),
            )
            .await
        {
            Ok(_) => {
                info!(order_id = %order_id, "order settled");
                self.status_changed(order_id, OrderStatus::Settled, now)
                    .await;
            }
            Err(StoreError::TerminalState {
                status: OrderStatus::Settled,
                ..
            }) => {
                debug!(order_id = %order_id, "order already settled");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn withdraw_destination(
        &self,
        order_id: &str,
        dst: &EscrowRecord,
        secret: &Secret,
    ) -> Result<()> {
        let adapter = self.adapters.get(&dst.chain_id)?;
        let result = retry_with_backoff(&self.settings.withdraw_retry, "withdraw_destination", |_| {
            adapter.withdraw(&dst.escrow_address, secret)
        })
        .await;

        match result {
            Ok(tx) => {
                info!(
                    order_id = %order_id,
                    chain_id = %tx.chain_id,
                    tx_hash = %tx.tx_hash,
                    "destination escrow withdrawn"
                );
            }
            Err(e) => match e.into_inner() {
                AdapterError::AlreadyWithdrawn(_) => {
                    debug!(order_id = %order_id, "destination escrow already withdrawn");
                }
                other => {
                    self.metrics.record_adapter_error(&dst.chain_id, other.kind());
                    error!(
                        order_id = %order_id,
                        escrow = %dst.escrow_address,
                        error = %other,
                        "destination withdrawal failed"
                    );
                    return Err(other.into());
                }
            },
        }

        let mut record = dst.clone();
        record.state = EscrowState::Withdrawn;
        self.store.upsert_escrow(&record).await?;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // RE-AUCTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Expire a lapsed commitment and re-announce the order to all resolvers.
    /// The auction clock is not restarted.
    pub async fn expire_commitment(&self, order_id: &str, now: u64) -> Result<Option<Commitment>> {
        let expired = self
            .store
            .expire_commitment(order_id, now, self.settings.grace_period_secs)
            .await?;

        if let Some(commitment) = &expired {
            self.metrics.record_commitment_expired();
            warn!(
                order_id = %order_id,
                resolver = %commitment.resolver,
                committed_at = commitment.committed_at,
                "commitment lapsed, re-auctioning order"
            );
            self.status_changed(order_id, OrderStatus::Announced, now)
                .await;

            let order = self.store.get_order(order_id).await?;
            self.channel
                .publish_message(Topic::OrdersAnnounced, &OrderAnnouncement::from(&order))
                .await?;
        }
        Ok(expired)
    }

    /// Record metrics and publish a status event for a transition this
    /// coordinator applied. Publishing failures are logged only.
    pub(crate) async fn status_changed(&self, order_id: &str, status: OrderStatus, now: u64) {
        self.metrics.record_order_status(status);
        let update = StatusUpdate {
            order_id: order_id.to_string(),
            status,
            timestamp: now,
        };
        if let Err(e) = self.channel.publish_message(Topic::Status, &update).await {
            warn!(order_id = %order_id, status = %status, error = %e, "failed to publish status");
        }
    }
}

fn find_escrow<'a>(
    order_id: &str,
    escrows: &'a [EscrowRecord],
    resolver: &str,
    role: EscrowRole,
) -> Result<&'a EscrowRecord> {
    live_escrow(escrows, resolver, role).ok_or_else(|| CoordinatorError::MissingEscrow {
        order_id: order_id.to_string(),
        role,
    })
}

fn rejection_reason(err: &CommitError) -> CommitRejection {
    match err {
        CommitError::OrderNotAnnounced { .. } => CommitRejection::NotAnnounced,
        CommitError::PriceTooLow { .. } => CommitRejection::PriceTooLow,
        CommitError::AlreadyCommitted { .. } => CommitRejection::AlreadyCommitted,
        _ => CommitRejection::Other,
    }
}
