use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cosmwasm_std::Uint128;
use tokio::sync::watch;
use tracing::{debug, error, info, warn, Instrument};
use unite_chain::{AdapterError, ChainAdapterRegistry, TxResult};
use unite_channel::{Envelope, NotificationChannel, NotificationChannelExt, Topic};
use unite_config::ResolverConfig;
use unite_metrics::OrderSpan;
use unite_retry::{retry_with_backoff, RetryPolicy};
use unite_types::{
    current_price, safety_deposit, CommitmentMessage, EscrowInstruction, EscrowParams,
    OrderAnnouncement, OrderStatus, ReadinessMessage, SecretReveal, StatusUpdate,
};

use crate::{is_profitable, PriceQuoter, ResolverError, Result};

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Address the resolver commits and receives source funds under
    pub address: String,

    /// Chains the resolver can deploy escrows on; both legs must be listed
    pub supported_chains: HashSet<String>,

    /// Margin required between the auction price and the resolver's quote
    pub min_profit_bps: u64,

    /// Collateral posted alongside each escrow
    pub safety_deposit_bps: u16,

    /// Backoff for escrow creation, cut off at the instruction's `ready_by`
    pub escrow_retry: RetryPolicy,
}

impl ResolverSettings {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            supported_chains: HashSet::new(),
            min_profit_bps: 10,
            safety_deposit_bps: 500,
            escrow_retry: RetryPolicy::new(Duration::from_millis(500), Duration::from_secs(30), 8),
        }
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        Self {
            address: config.address.clone(),
            supported_chains: config.supported_chains.iter().cloned().collect(),
            min_profit_bps: config.min_profit_bps,
            safety_deposit_bps: config.safety_deposit_bps,
            escrow_retry: RetryPolicy::new(
                Duration::from_millis(config.retry_initial_delay_ms),
                Duration::from_millis(config.retry_max_delay_ms),
                8,
            ),
        }
    }

    pub fn with_chain(mut self, chain_id: impl Into<String>) -> Self {
        self.supported_chains.insert(chain_id.into());
        self
    }

    pub fn with_min_profit_bps(mut self, bps: u64) -> Self {
        self.min_profit_bps = bps;
        self
    }

    pub fn with_escrow_retry(mut self, policy: RetryPolicy) -> Self {
        self.escrow_retry = policy;
        self
    }
}

/// Why an announcement was passed over
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UnsupportedChain(String),
    PastDeadline,
    Unprofitable { price: Uint128, max_dst_amount: Uint128 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Commit at this destination amount
    Commit(Uint128),
    Skip(SkipReason),
}

/// Escrows this resolver deployed for one order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub src_chain_id: String,
    pub src_escrow: String,
    pub dst_chain_id: String,
    pub dst_escrow: String,
}

/// Liquidity provider side of the protocol.
///
/// Bids on announced orders it can profitably fill, deploys both escrows
/// when it wins, and claims the source leg once the secret is revealed.
pub struct ResolverAgent {
    settings: ResolverSettings,
    channel: Arc<dyn NotificationChannel>,
    adapters: ChainAdapterRegistry,
    quoter: Arc<dyn PriceQuoter>,
    /// Orders between announcement and readiness (or abandonment)
    in_flight: Mutex<HashSet<String>>,
    /// Deployed orders awaiting the secret; dropped once claimed or once the
    /// order leaves this resolver's hands
    deployments: Mutex<HashMap<String, Deployment>>,
}

impl ResolverAgent {
    pub fn new(
        settings: ResolverSettings,
        channel: Arc<dyn NotificationChannel>,
        adapters: ChainAdapterRegistry,
        quoter: Arc<dyn PriceQuoter>,
    ) -> Self {
        Self {
            settings,
            channel,
            adapters,
            quoter,
            in_flight: Mutex::new(HashSet::new()),
            deployments: Mutex::new(HashMap::new()),
        }
    }

    pub fn address(&self) -> &str {
        &self.settings.address
    }

    pub fn deployment(&self, order_id: &str) -> Option<Deployment> {
        self.deployments.lock().unwrap().get(order_id).cloned()
    }

    pub fn is_in_flight(&self, order_id: &str) -> bool {
        self.in_flight.lock().unwrap().contains(order_id)
    }

    pub fn deployment_count(&self) -> usize {
        self.deployments.lock().unwrap().len()
    }

    fn forget(&self, order_id: &str) -> Option<Deployment> {
        self.deployments.lock().unwrap().remove(order_id)
    }

    fn release(&self, order_id: &str) {
        self.in_flight.lock().unwrap().remove(order_id);
    }

    fn supports(&self, chain_id: &str) -> bool {
        self.settings.supported_chains.contains(chain_id) && self.adapters.supports(chain_id)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BIDDING
    // ═══════════════════════════════════════════════════════════════════════════

    pub async fn evaluate(&self, order: &OrderAnnouncement, now: u64) -> Result<Decision> {
        for chain_id in [&order.src_chain_id, &order.dst_chain_id] {
            if !self.supports(chain_id) {
                return Ok(Decision::Skip(SkipReason::UnsupportedChain(
                    chain_id.clone(),
                )));
            }
        }
        if now >= order.fill_deadline {
            return Ok(Decision::Skip(SkipReason::PastDeadline));
        }

        let price = current_price(&order.auction, now);
        let max_dst_amount = self.quoter.max_dst_amount(order).await?;
        if !is_profitable(price, max_dst_amount, self.settings.min_profit_bps) {
            return Ok(Decision::Skip(SkipReason::Unprofitable {
                price,
                max_dst_amount,
            }));
        }
        Ok(Decision::Commit(price))
    }

    /// Bid on `order` at the current auction price if it is worth filling.
    /// Returns the published commitment, or `None` when skipped or already
    /// being handled.
    pub async fn on_announcement(
        &self,
        order: &OrderAnnouncement,
        now: u64,
    ) -> Result<Option<CommitmentMessage>> {
        if !self.in_flight.lock().unwrap().insert(order.order_id.clone()) {
            debug!(order_id = %order.order_id, "announcement already being handled");
            return Ok(None);
        }

        let price = match self.evaluate(order, now).await {
            Ok(Decision::Commit(price)) => price,
            Ok(Decision::Skip(reason)) => {
                debug!(order_id = %order.order_id, reason = ?reason, "skipping order");
                self.release(&order.order_id);
                return Ok(None);
            }
            Err(e) => {
                self.release(&order.order_id);
                return Err(e);
            }
        };

        let commitment = CommitmentMessage {
            order_id: order.order_id.clone(),
            resolver: self.settings.address.clone(),
            committed_price: price,
            timestamp: now,
        };
        if let Err(e) = self
            .channel
            .publish_message(Topic::Commitments, &commitment)
            .await
        {
            self.release(&order.order_id);
            return Err(e.into());
        }

        info!(
            order_id = %order.order_id,
            resolver = %self.settings.address,
            price = %price,
            "commitment submitted"
        );
        Ok(Some(commitment))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ESCROW DEPLOYMENT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Deploy both escrows for an instruction addressed to this resolver and
    /// report readiness. Instructions for other resolvers mean the bid was
    /// lost, along with any earlier deployment for the order. Any failure
    /// abandons the commitment; the coordinator re-auctions the order once
    /// the grace period runs out.
    pub async fn on_instruction(
        &self,
        instruction: &EscrowInstruction,
        now: u64,
    ) -> Result<Option<ReadinessMessage>> {
        let order_id = instruction.order_id.as_str();
        if instruction.resolver != self.settings.address {
            self.release(order_id);
            if let Some(lost) = self.forget(order_id) {
                info!(
                    order_id = %order_id,
                    winner = %instruction.resolver,
                    src_escrow = %lost.src_escrow,
                    "order re-auctioned to another resolver, escrows left for refund"
                );
            }
            return Ok(None);
        }

        if let Some(deployment) = self.deployment(order_id) {
            let readiness = self.readiness(order_id, &deployment);
            self.channel
                .publish_message(Topic::Readiness, &readiness)
                .await?;
            return Ok(Some(readiness));
        }

        let result = self.deploy(instruction, now).await;
        self.release(order_id);
        let deployment = result?;

        self.deployments
            .lock()
            .unwrap()
            .insert(order_id.to_string(), deployment.clone());

        let readiness = self.readiness(order_id, &deployment);
        self.channel
            .publish_message(Topic::Readiness, &readiness)
            .await?;

        info!(
            order_id = %order_id,
            src_escrow = %deployment.src_escrow,
            dst_escrow = %deployment.dst_escrow,
            "escrows deployed"
        );
        Ok(Some(readiness))
    }

    async fn deploy(&self, instruction: &EscrowInstruction, now: u64) -> Result<Deployment> {
        if now >= instruction.ready_by {
            warn!(order_id = %instruction.order_id, "instruction arrived after ready_by");
            return Err(ResolverError::PastReadyBy {
                order_id: instruction.order_id.clone(),
                ready_by: instruction.ready_by,
            });
        }
        let policy = self
            .settings
            .escrow_retry
            .clone()
            .with_deadline(Duration::from_secs(instruction.ready_by - now));

        let src_escrow = self.create_escrow(&instruction.src, &policy).await?;
        let dst_escrow = match self.create_escrow(&instruction.dst, &policy).await {
            Ok(address) => address,
            Err(e) => {
                warn!(
                    order_id = %instruction.order_id,
                    src_escrow = %src_escrow,
                    "destination escrow failed, source escrow left for cancellation"
                );
                return Err(e);
            }
        };

        Ok(Deployment {
            src_chain_id: instruction.src.chain_id.clone(),
            src_escrow,
            dst_chain_id: instruction.dst.chain_id.clone(),
            dst_escrow,
        })
    }

    async fn create_escrow(&self, params: &EscrowParams, policy: &RetryPolicy) -> Result<String> {
        let mut params = params.clone();
        params.safety_deposit = safety_deposit(params.amount, self.settings.safety_deposit_bps);

        let adapter = self.adapters.get(&params.chain_id)?;
        let operation = format!("create_{}_escrow", params.role);
        retry_with_backoff(policy, &operation, |_| adapter.create_escrow(&params))
            .await
            .map_err(|e| {
                let source = e.into_inner();
                error!(
                    order_id = %params.order_id,
                    chain_id = %params.chain_id,
                    role = %params.role,
                    error = %source,
                    "abandoning commitment"
                );
                ResolverError::EscrowCreation {
                    order_id: params.order_id.clone(),
                    role: params.role,
                    source,
                }
            })
    }

    fn readiness(&self, order_id: &str, deployment: &Deployment) -> ReadinessMessage {
        ReadinessMessage {
            order_id: order_id.to_string(),
            resolver: self.settings.address.clone(),
            src_escrow: deployment.src_escrow.clone(),
            dst_escrow: deployment.dst_escrow.clone(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CLAIM
    // ═══════════════════════════════════════════════════════════════════════════

    /// Withdraw the source leg with a revealed secret. Reveals for orders
    /// this resolver did not deploy are ignored.
    pub async fn on_secret(&self, reveal: &SecretReveal) -> Result<Option<TxResult>> {
        let deployment = match self.deployment(&reveal.order_id) {
            Some(d) if d.src_escrow == reveal.src_escrow => d,
            _ => return Ok(None),
        };

        let adapter = self.adapters.get(&deployment.src_chain_id)?;
        let result = retry_with_backoff(&self.settings.escrow_retry, "withdraw_src_escrow", |_| {
            adapter.withdraw(&deployment.src_escrow, &reveal.secret)
        })
        .await;

        let tx = match result {
            Ok(tx) => Some(tx),
            Err(e) => match e.into_inner() {
                AdapterError::AlreadyWithdrawn(_) => None,
                other => {
                    error!(
                        order_id = %reveal.order_id,
                        escrow = %deployment.src_escrow,
                        error = %other,
                        "source withdrawal failed"
                    );
                    return Err(other.into());
                }
            },
        };

        self.forget(&reveal.order_id);
        info!(order_id = %reveal.order_id, escrow = %deployment.src_escrow, "source escrow claimed");
        Ok(tx)
    }

    /// Drop everything held for an order that was re-auctioned, cancelled or
    /// expired. Settled orders are dropped by [`on_secret`] once the source
    /// leg is claimed. Returns whether a deployment was discarded.
    ///
    /// [`on_secret`]: Self::on_secret
    pub fn on_status(&self, update: &StatusUpdate) -> bool {
        if !matches!(
            update.status,
            OrderStatus::Announced | OrderStatus::Cancelled | OrderStatus::Expired
        ) {
            return false;
        }

        self.release(&update.order_id);
        match self.forget(&update.order_id) {
            Some(deployment) => {
                debug!(
                    order_id = %update.order_id,
                    status = %update.status,
                    src_escrow = %deployment.src_escrow,
                    "deployment discarded"
                );
                true
            }
            None => false,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SERVICE LOOP
    // ═══════════════════════════════════════════════════════════════════════════

    /// Consume announcements, instructions, secret reveals and status events
    /// until `shutdown` is set. Deployment and withdrawal run on their own
    /// tasks.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut announcements = self.channel.subscribe(Topic::OrdersAnnounced).await?;
        let mut instructions = self.channel.subscribe(Topic::EscrowInstructions).await?;
        let mut secrets = self.channel.subscribe(Topic::Secrets).await?;
        let mut statuses = self.channel.subscribe(Topic::Status).await?;

        info!(resolver = %self.settings.address, "resolver agent started");

        loop {
            tokio::select! {
                Some(envelope) = announcements.recv() => {
                    if let Some(order) = decode::<OrderAnnouncement>(&envelope) {
                        if let Err(e) = self.on_announcement(&order, current_timestamp()).await {
                            warn!(order_id = %order.order_id, error = %e, "failed to bid");
                        }
                    }
                }
                Some(envelope) = instructions.recv() => {
                    if let Some(instruction) = decode::<EscrowInstruction>(&envelope) {
                        self.spawn_deployment(instruction);
                    }
                }
                Some(envelope) = secrets.recv() => {
                    if let Some(reveal) = decode::<SecretReveal>(&envelope) {
                        self.spawn_claim(reveal);
                    }
                }
                Some(envelope) = statuses.recv() => {
                    if let Some(update) = decode::<StatusUpdate>(&envelope) {
                        self.on_status(&update);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(resolver = %self.settings.address, "resolver agent stopped");
        Ok(())
    }

    fn spawn_deployment(self: &Arc<Self>, instruction: EscrowInstruction) {
        let agent = self.clone();
        let span = OrderSpan::new(instruction.order_id.as_str(), instruction.resolver.as_str()).span();
        tokio::spawn(
            async move {
                if let Err(e) = agent.on_instruction(&instruction, current_timestamp()).await {
                    warn!(error = %e, "escrow deployment failed");
                }
            }
            .instrument(span),
        );
    }

    fn spawn_claim(self: &Arc<Self>, reveal: SecretReveal) {
        let agent = self.clone();
        let span = OrderSpan::new(reveal.order_id.as_str(), agent.address()).span();
        tokio::spawn(
            async move {
                if let Err(e) = agent.on_secret(&reveal).await {
                    warn!(error = %e, "source claim failed");
                }
            }
            .instrument(span),
        );
    }
}

fn decode<T: serde::de::DeserializeOwned>(envelope: &Envelope) -> Option<T> {
    match envelope.decode() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(topic = %envelope.topic, message_id = %envelope.id, error = %e, "malformed message");
            None
        }
    }
}

fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
