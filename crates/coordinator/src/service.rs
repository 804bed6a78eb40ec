use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn, Instrument};
use unite_channel::{Envelope, Topic};
use unite_metrics::OrderSpan;
use unite_settlement::SettlementBackend;
use unite_types::{CommitmentMessage, ReadinessMessage};

use crate::{unix_now, PollOutcome, Result, SettlementCoordinator};

/// Consecutive poll failures after which a watcher hands the order to the sweeper
const MAX_POLL_FAILURES: u32 = 5;

impl<S> SettlementCoordinator<S>
where
    S: SettlementBackend + 'static,
{
    /// Serve commitment and readiness messages and run periodic sweeps until
    /// `shutdown` is set to `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut commitments = self.channel.subscribe(Topic::Commitments).await?;
        let mut readiness = self.channel.subscribe(Topic::Readiness).await?;

        let mut sweep = tokio::time::interval(self.settings.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            grace_period_secs = self.settings.grace_period_secs,
            chains = ?self.adapters.chain_ids(),
            "settlement coordinator started"
        );

        loop {
            tokio::select! {
                Some(envelope) = commitments.recv() => self.on_commitment(envelope).await,
                Some(envelope) = readiness.recv() => self.on_readiness(envelope).await,
                _ = sweep.tick() => {
                    if let Err(e) = self.sweep(unix_now()).await {
                        error!(error = %e, "sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("settlement coordinator stopped");
        Ok(())
    }

    async fn on_commitment(&self, envelope: Envelope) {
        let msg: CommitmentMessage = match envelope.decode() {
            Ok(msg) => msg,
            Err(e) => {
                warn!(message_id = %envelope.id, error = %e, "malformed commitment message");
                return;
            }
        };
        if let Err(e) = self.handle_commitment(&msg, unix_now()).await {
            if !e.is_race() {
                warn!(order_id = %msg.order_id, error = %e, "commitment not processed");
            }
        }
    }

    async fn on_readiness(&self, envelope: Envelope) {
        let msg: ReadinessMessage = match envelope.decode() {
            Ok(msg) => msg,
            Err(e) => {
                warn!(message_id = %envelope.id, error = %e, "malformed readiness message");
                return;
            }
        };
        match self.handle_readiness(&msg, unix_now()).await {
            Ok(()) => {
                self.spawn_escrow_watcher(msg.order_id, msg.resolver);
            }
            Err(e) if e.is_race() => {
                debug!(order_id = %msg.order_id, reason = %e, "stale readiness report");
            }
            Err(e) => {
                warn!(order_id = %msg.order_id, error = %e, "readiness not processed");
            }
        }
    }

    /// Poll the order's escrows on a separate task until it settles or leaves
    /// `EscrowsPending`, so a slow chain never holds up other orders.
    pub fn spawn_escrow_watcher(&self, order_id: String, resolver: String) -> JoinHandle<()> {
        let coordinator = self.clone();
        let span = OrderSpan::new(order_id.as_str(), resolver).span();
        tokio::spawn(async move { coordinator.watch_escrows(&order_id).await }.instrument(span))
    }

    async fn watch_escrows(&self, order_id: &str) {
        let mut failures = 0;
        loop {
            match self.poll_escrows(order_id, unix_now()).await {
                Ok(PollOutcome::Waiting) => failures = 0,
                Ok(PollOutcome::Settled) => return,
                Ok(PollOutcome::Inactive(status)) => {
                    debug!(status = %status, "order no longer awaiting escrows");
                    return;
                }
                Err(e) => {
                    failures += 1;
                    warn!(error = %e, failures, "escrow poll failed");
                    if failures >= MAX_POLL_FAILURES {
                        warn!("giving up on escrow watch, sweeper will take over");
                        return;
                    }
                }
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }
}
