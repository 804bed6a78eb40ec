use std::sync::Arc;
use std::time::Duration;

use cosmwasm_std::Uint128;
use unite_chain::{AdapterError, ChainAdapter, ChainAdapterRegistry, MockChainAdapter};
use unite_channel::{InMemoryChannel, Topic};
use unite_retry::RetryPolicy;
use unite_settlement::{CommitError, CommitmentLedger, InMemoryStore, OrderStore, SecretVault};
use unite_types::{
    AuctionParams, CommitmentMessage, CommitmentStatus, EscrowInstruction, EscrowState, Order,
    OrderStatus, ReadinessMessage, Secret, SecretReveal, StatusUpdate,
};

use crate::{CoordinatorError, CoordinatorSettings, PollOutcome, SettlementCoordinator};

const MAKER_KEY: [u8; 32] = [7u8; 32];
const SRC_CHAIN: &str = "base-sepolia";
const DST_CHAIN: &str = "aptos-testnet";

struct Harness {
    coordinator: SettlementCoordinator<InMemoryStore>,
    store: Arc<InMemoryStore>,
    channel: Arc<InMemoryChannel>,
    src: Arc<MockChainAdapter>,
    dst: Arc<MockChainAdapter>,
    secret: Secret,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let channel = Arc::new(InMemoryChannel::recording());
    let src = Arc::new(MockChainAdapter::new(SRC_CHAIN).manual_funding());
    let dst = Arc::new(MockChainAdapter::new(DST_CHAIN).manual_funding());
    src.set_time(1_000);
    dst.set_time(1_000);

    let adapters = ChainAdapterRegistry::new()
        .with_adapter(src.clone())
        .with_adapter(dst.clone());
    let settings = CoordinatorSettings::default().with_withdraw_retry(RetryPolicy::new(
        Duration::from_millis(1),
        Duration::from_millis(5),
        4,
    ));

    Harness {
        coordinator: SettlementCoordinator::new(store.clone(), channel.clone(), adapters, settings),
        store,
        channel,
        src,
        dst,
        secret: Secret::generate(),
    }
}

impl Harness {
    /// Order for 1000 src units, auction 110 -> 90 over 300s from t=1000,
    /// fill deadline 5000
    async fn announce(&self, nonce: u64) -> Order {
        let signed = Order::builder()
            .maker("maker-1")
            .source(SRC_CHAIN, "usdc", 1_000u128)
            .destination(DST_CHAIN, "usdc")
            .auction(AuctionParams::new(110u128, 90u128, 300, 1_000))
            .secret_hash(self.secret.hash())
            .fill_deadline(5_000)
            .nonce(nonce)
            .build()
            .unwrap()
            .sign_with_key(&MAKER_KEY)
            .unwrap();

        self.coordinator
            .submit_order(signed, &self.secret, 1_000)
            .await
            .unwrap()
    }

    async fn commit(&self, order: &Order, resolver: &str, price: u128, now: u64) -> EscrowInstruction {
        self.coordinator
            .handle_commitment(&bid(order, resolver, price, now), now)
            .await
            .unwrap()
    }

    /// Deploy both escrows as the resolver would, without funding them
    async fn deploy(&self, instruction: &EscrowInstruction) -> ReadinessMessage {
        let src_escrow = self.src.create_escrow(&instruction.src).await.unwrap();
        let dst_escrow = self.dst.create_escrow(&instruction.dst).await.unwrap();
        ReadinessMessage {
            order_id: instruction.order_id.clone(),
            resolver: instruction.resolver.clone(),
            src_escrow,
            dst_escrow,
        }
    }

    async fn status(&self, order: &Order) -> OrderStatus {
        self.store.get_order(&order.order_id).await.unwrap().status
    }
}

fn bid(order: &Order, resolver: &str, price: u128, now: u64) -> CommitmentMessage {
    CommitmentMessage {
        order_id: order.order_id.clone(),
        resolver: resolver.to_string(),
        committed_price: Uint128::new(price),
        timestamp: now,
    }
}

#[tokio::test]
async fn test_commitment_sends_escrow_instruction() {
    let h = harness();
    let order = h.announce(1).await;

    let instruction = h.commit(&order, "resolver-1", 110, 1_000).await;

    assert_eq!(h.status(&order).await, OrderStatus::EscrowsPending);
    assert_eq!(instruction.resolver, "resolver-1");
    assert_eq!(instruction.src.chain_id, SRC_CHAIN);
    assert_eq!(instruction.src.amount, Uint128::new(1_000));
    assert_eq!(instruction.dst.chain_id, DST_CHAIN);
    assert_eq!(instruction.dst.amount, Uint128::new(110));
    assert_eq!(instruction.src.secret_hash, h.secret.hash());
    assert_eq!(instruction.ready_by, 1_300);

    let sent = h.channel.published(Topic::EscrowInstructions);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].decode::<EscrowInstruction>().unwrap(), instruction);

    let statuses: Vec<OrderStatus> = h
        .channel
        .published(Topic::Status)
        .iter()
        .map(|e| e.decode::<StatusUpdate>().unwrap().status)
        .collect();
    assert_eq!(
        statuses,
        vec![OrderStatus::Committed, OrderStatus::EscrowsPending]
    );
}

#[tokio::test]
async fn test_second_commitment_loses_race() {
    let h = harness();
    let order = h.announce(1).await;
    h.commit(&order, "resolver-1", 110, 1_000).await;

    let err = h
        .coordinator
        .handle_commitment(&bid(&order, "resolver-2", 110, 1_000), 1_000)
        .await
        .unwrap_err();

    assert!(err.is_race());
    assert!(matches!(
        err,
        CoordinatorError::Commit(CommitError::OrderNotAnnounced { .. })
            | CoordinatorError::Commit(CommitError::AlreadyCommitted { .. })
    ));
    assert_eq!(h.channel.published(Topic::EscrowInstructions).len(), 1);
}

#[tokio::test]
async fn test_price_checked_at_coordinator_clock() {
    let h = harness();
    let order = h.announce(1).await;

    // resolver claims t=1150 (price 100) but the coordinator sees t=1000 (price 110)
    let err = h
        .coordinator
        .handle_commitment(&bid(&order, "resolver-1", 100, 1_150), 1_000)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CoordinatorError::Commit(CommitError::PriceTooLow { .. })
    ));
    assert!(!err.is_race());
    assert_eq!(h.status(&order).await, OrderStatus::Announced);
}

#[tokio::test]
async fn test_full_settlement() {
    let h = harness();
    let order = h.announce(1).await;
    let instruction = h.commit(&order, "resolver-1", 105, 1_075).await;
    let ready = h.deploy(&instruction).await;
    h.src.fund(&ready.src_escrow).unwrap();
    h.dst.fund(&ready.dst_escrow).unwrap();

    h.coordinator.handle_readiness(&ready, 1_100).await.unwrap();
    let outcome = h
        .coordinator
        .poll_escrows(&order.order_id, 1_110)
        .await
        .unwrap();

    assert_eq!(outcome, PollOutcome::Settled);
    assert_eq!(h.status(&order).await, OrderStatus::Settled);

    let withdrawals = h.dst.withdrawals();
    assert_eq!(withdrawals.len(), 1);
    assert_eq!(withdrawals[0].0, ready.dst_escrow);
    assert_eq!(withdrawals[0].1.to_hex(), h.secret.to_hex());

    let reveals = h.channel.published(Topic::Secrets);
    assert_eq!(reveals.len(), 1);
    let reveal: SecretReveal = reveals[0].decode().unwrap();
    assert_eq!(reveal.secret.to_hex(), h.secret.to_hex());
    assert_eq!(reveal.src_escrow, ready.src_escrow);

    assert_eq!(
        h.store.revealed_at(&order.order_id).await.unwrap(),
        Some(1_110)
    );
    let commitment = h.store.active_commitment(&order.order_id).await.unwrap();
    assert_eq!(commitment.unwrap().status, CommitmentStatus::Confirmed);

    let history = h.store.get_history(&order.order_id).await.unwrap();
    let path: Vec<OrderStatus> = history.iter().map(|t| t.to_status).collect();
    assert_eq!(
        path,
        vec![
            OrderStatus::Committed,
            OrderStatus::EscrowsPending,
            OrderStatus::EscrowsReady,
            OrderStatus::Settled,
        ]
    );
}

#[tokio::test]
async fn test_partial_funding_never_reveals() {
    let h = harness();
    let order = h.announce(1).await;
    let instruction = h.commit(&order, "resolver-1", 110, 1_000).await;
    let ready = h.deploy(&instruction).await;
    h.coordinator.handle_readiness(&ready, 1_010).await.unwrap();

    h.src.fund(&ready.src_escrow).unwrap();
    let outcome = h
        .coordinator
        .poll_escrows(&order.order_id, 1_020)
        .await
        .unwrap();
    assert_eq!(outcome, PollOutcome::Waiting);

    // funded, but one unit short
    h.dst
        .fund_partial(&ready.dst_escrow, Uint128::new(109))
        .unwrap();
    let outcome = h
        .coordinator
        .poll_escrows(&order.order_id, 1_030)
        .await
        .unwrap();
    assert_eq!(outcome, PollOutcome::Waiting);

    assert_eq!(h.status(&order).await, OrderStatus::EscrowsPending);
    assert_eq!(h.store.revealed_at(&order.order_id).await.unwrap(), None);
    assert!(h.channel.published(Topic::Secrets).is_empty());
    assert!(h.dst.withdrawals().is_empty());
}

#[tokio::test]
async fn test_redelivered_readiness_is_idempotent() {
    let h = harness();
    let order = h.announce(1).await;
    let instruction = h.commit(&order, "resolver-1", 110, 1_000).await;
    let ready = h.deploy(&instruction).await;
    h.src.fund(&ready.src_escrow).unwrap();

    h.coordinator.handle_readiness(&ready, 1_010).await.unwrap();
    h.coordinator
        .poll_escrows(&order.order_id, 1_020)
        .await
        .unwrap();
    h.coordinator.handle_readiness(&ready, 1_030).await.unwrap();

    let escrows = h.store.get_escrows(&order.order_id).await.unwrap();
    assert_eq!(escrows.len(), 2);
    let src = escrows
        .iter()
        .find(|r| r.escrow_address == ready.src_escrow)
        .unwrap();
    assert_eq!(src.state, EscrowState::Funded);
    assert_eq!(src.created_at, 1_010);
}

#[tokio::test]
async fn test_readiness_from_other_resolver_is_rejected() {
    let h = harness();
    let order = h.announce(1).await;
    let instruction = h.commit(&order, "resolver-1", 110, 1_000).await;
    let mut ready = h.deploy(&instruction).await;
    ready.resolver = "resolver-2".to_string();

    let err = h
        .coordinator
        .handle_readiness(&ready, 1_010)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::Commit(CommitError::ResolverMismatch { .. })
    ));
    assert!(err.is_race());
    assert!(h
        .store
        .get_escrows(&order.order_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_lapsed_commitment_is_reauctioned() {
    let h = harness();
    let order = h.announce(1).await;
    let instruction = h.commit(&order, "resolver-1", 110, 1_000).await;

    // only the source leg ever appears
    let src_escrow = h.src.create_escrow(&instruction.src).await.unwrap();
    h.src.fund(&src_escrow).unwrap();

    let report = h.coordinator.sweep(1_299).await.unwrap();
    assert!(report.expired_commitments.is_empty());
    assert_eq!(h.status(&order).await, OrderStatus::EscrowsPending);

    let report = h.coordinator.sweep(1_300).await.unwrap();
    assert_eq!(report.expired_commitments, vec![order.order_id.clone()]);
    assert_eq!(h.status(&order).await, OrderStatus::Announced);

    let commitments = h.store.commitments_for(&order.order_id).await.unwrap();
    assert_eq!(commitments[0].status, CommitmentStatus::Expired);
    assert_eq!(h.channel.published(Topic::OrdersAnnounced).len(), 2);

    // another resolver can now fill at the decayed price
    let instruction = h.commit(&order, "resolver-2", 90, 1_310).await;
    assert_eq!(instruction.resolver, "resolver-2");
    assert_eq!(instruction.ready_by, 1_610);
}

#[tokio::test]
async fn test_maker_cancellation() {
    let h = harness();
    let order = h.announce(1).await;

    let err = h
        .coordinator
        .cancel_order(&order.order_id, "someone-else", 1_010)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::NotMaker { .. }));

    let cancelled = h
        .coordinator
        .cancel_order(&order.order_id, "maker-1", 1_010)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let committed = h.announce(2).await;
    h.commit(&committed, "resolver-1", 110, 1_000).await;
    let err = h
        .coordinator
        .cancel_order(&committed.order_id, "maker-1", 1_010)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::CannotCancel {
            status: OrderStatus::EscrowsPending,
            ..
        }
    ));
}

#[tokio::test]
async fn test_sweep_expires_orders_past_deadline() {
    let h = harness();
    let order = h.announce(1).await;

    let report = h.coordinator.sweep(5_000).await.unwrap();
    assert_eq!(report.expired_orders, vec![order.order_id.clone()]);
    assert_eq!(h.status(&order).await, OrderStatus::Expired);

    let err = h
        .coordinator
        .handle_commitment(&bid(&order, "resolver-1", 110, 5_001), 5_001)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::Commit(CommitError::OrderNotAnnounced { .. })
    ));
}

#[tokio::test]
async fn test_destination_withdrawal_retries_network_errors() {
    let h = harness();
    let order = h.announce(1).await;
    let instruction = h.commit(&order, "resolver-1", 110, 1_000).await;
    let ready = h.deploy(&instruction).await;
    h.src.fund(&ready.src_escrow).unwrap();
    h.dst.fund(&ready.dst_escrow).unwrap();
    h.dst
        .fail_next_withdraws(2, AdapterError::NetworkError("timeout".to_string()));

    h.coordinator.handle_readiness(&ready, 1_010).await.unwrap();
    let outcome = h
        .coordinator
        .poll_escrows(&order.order_id, 1_020)
        .await
        .unwrap();

    assert_eq!(outcome, PollOutcome::Settled);
    assert_eq!(h.dst.withdrawals().len(), 1);
}

#[tokio::test]
async fn test_failed_settlement_is_finished_by_sweep() {
    let h = harness();
    let order = h.announce(1).await;
    let instruction = h.commit(&order, "resolver-1", 110, 1_000).await;
    let ready = h.deploy(&instruction).await;
    h.src.fund(&ready.src_escrow).unwrap();
    h.dst.fund(&ready.dst_escrow).unwrap();
    h.dst.fail_next_withdraws(
        1,
        AdapterError::InsufficientFunds("gas".to_string()),
    );

    h.coordinator.handle_readiness(&ready, 1_010).await.unwrap();
    let err = h
        .coordinator
        .poll_escrows(&order.order_id, 1_020)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::Adapter(AdapterError::InsufficientFunds(_))
    ));
    assert_eq!(h.status(&order).await, OrderStatus::EscrowsReady);

    let report = h.coordinator.sweep(1_030).await.unwrap();
    assert_eq!(report.settled_orders, vec![order.order_id.clone()]);
    assert_eq!(h.status(&order).await, OrderStatus::Settled);
    assert_eq!(
        h.store.revealed_at(&order.order_id).await.unwrap(),
        Some(1_020)
    );
}

#[tokio::test]
async fn test_unrevealed_escrows_are_refunded_after_timelock() {
    let h = harness();
    let order = h.announce(1).await;
    let instruction = h.commit(&order, "resolver-1", 110, 1_000).await;
    let ready = h.deploy(&instruction).await;
    h.src.fund(&ready.src_escrow).unwrap();
    h.coordinator.handle_readiness(&ready, 1_000).await.unwrap();

    h.coordinator.sweep(1_300).await.unwrap();
    assert_eq!(h.status(&order).await, OrderStatus::Announced);

    h.src.set_time(2_199);
    h.dst.set_time(2_199);
    let report = h.coordinator.sweep(2_199).await.unwrap();
    assert!(report.refunded_escrows.is_empty());

    h.src.set_time(2_200);
    h.dst.set_time(2_200);
    let report = h.coordinator.sweep(2_200).await.unwrap();
    assert_eq!(report.refunded_escrows.len(), 2);
    assert_eq!(h.src.cancellations(), vec![ready.src_escrow.clone()]);
    assert_eq!(h.dst.cancellations(), vec![ready.dst_escrow.clone()]);

    let escrows = h.store.get_escrows(&order.order_id).await.unwrap();
    assert!(escrows.iter().all(|r| r.state == EscrowState::Cancelled));

    // nothing left to refund
    let report = h.coordinator.sweep(2_300).await.unwrap();
    assert!(report.refunded_escrows.is_empty());
}

#[tokio::test]
async fn test_lapsed_resolver_escrows_never_settle_reauctioned_order() {
    let h = harness();
    let order = h.announce(1).await;
    let first = h.commit(&order, "resolver-1", 110, 1_000).await;
    let stale = h.deploy(&first).await;
    h.src.fund(&stale.src_escrow).unwrap();
    h.coordinator.handle_readiness(&stale, 1_010).await.unwrap();

    assert!(h
        .coordinator
        .expire_commitment(&order.order_id, 1_300)
        .await
        .unwrap()
        .is_some());
    let instruction = h.commit(&order, "resolver-2", 90, 1_310).await;

    // the lapsed resolver completes its pair after losing the order
    h.dst.fund(&stale.dst_escrow).unwrap();
    let outcome = h
        .coordinator
        .poll_escrows(&order.order_id, 1_320)
        .await
        .unwrap();

    assert_eq!(outcome, PollOutcome::Waiting);
    assert_eq!(h.status(&order).await, OrderStatus::EscrowsPending);
    assert_eq!(h.store.revealed_at(&order.order_id).await.unwrap(), None);
    assert!(h.channel.published(Topic::Secrets).is_empty());
    assert!(h.dst.withdrawals().is_empty());

    // the winning resolver's own escrows settle the order
    let ready = h.deploy(&instruction).await;
    h.src.fund(&ready.src_escrow).unwrap();
    h.dst.fund(&ready.dst_escrow).unwrap();
    h.coordinator.handle_readiness(&ready, 1_330).await.unwrap();
    let outcome = h
        .coordinator
        .poll_escrows(&order.order_id, 1_340)
        .await
        .unwrap();

    assert_eq!(outcome, PollOutcome::Settled);
    assert_eq!(h.dst.withdrawals().len(), 1);
    assert_eq!(h.dst.withdrawals()[0].0, ready.dst_escrow);
    let reveal: SecretReveal = h.channel.published(Topic::Secrets)[0].decode().unwrap();
    assert_eq!(reveal.src_escrow, ready.src_escrow);

    // the stale pair is refunded once its timelock passes, settled order or not
    h.src.set_time(2_210);
    h.dst.set_time(2_210);
    let report = h.coordinator.sweep(2_210).await.unwrap();
    assert_eq!(report.refunded_escrows.len(), 2);
    assert_eq!(h.src.cancellations(), vec![stale.src_escrow.clone()]);
    assert_eq!(h.dst.cancellations(), vec![stale.dst_escrow.clone()]);
    assert_eq!(h.status(&order).await, OrderStatus::Settled);
}

#[tokio::test]
async fn test_new_escrow_report_supersedes_previous_leg() {
    let h = harness();
    let order = h.announce(1).await;
    let instruction = h.commit(&order, "resolver-1", 110, 1_000).await;
    let first = h.deploy(&instruction).await;
    h.coordinator.handle_readiness(&first, 1_010).await.unwrap();

    let second = h.deploy(&instruction).await;
    h.coordinator.handle_readiness(&second, 1_020).await.unwrap();

    let escrows = h.store.get_escrows(&order.order_id).await.unwrap();
    assert_eq!(escrows.len(), 4);
    for record in &escrows {
        let replaced = record.escrow_address == first.src_escrow
            || record.escrow_address == first.dst_escrow;
        assert_eq!(record.superseded, replaced);
        assert_eq!(record.resolver, "resolver-1");
    }

    // funding the replaced pair does not settle
    h.src.fund(&first.src_escrow).unwrap();
    h.dst.fund(&first.dst_escrow).unwrap();
    assert_eq!(
        h.coordinator
            .poll_escrows(&order.order_id, 1_030)
            .await
            .unwrap(),
        PollOutcome::Waiting
    );

    h.src.fund(&second.src_escrow).unwrap();
    h.dst.fund(&second.dst_escrow).unwrap();
    assert_eq!(
        h.coordinator
            .poll_escrows(&order.order_id, 1_040)
            .await
            .unwrap(),
        PollOutcome::Settled
    );
    assert_eq!(h.dst.withdrawals()[0].0, second.dst_escrow);
}

#[tokio::test]
async fn test_funding_inside_grace_period_settles_on_first_sweep() {
    let h = harness();
    let order = h.announce(1).await;
    let instruction = h.commit(&order, "resolver-1", 110, 1_000).await;
    let ready = h.deploy(&instruction).await;
    h.coordinator.handle_readiness(&ready, 1_010).await.unwrap();

    // both legs land just before the deadline; nothing has polled them yet
    h.src.fund(&ready.src_escrow).unwrap();
    h.dst.fund(&ready.dst_escrow).unwrap();

    let report = h.coordinator.sweep(1_300).await.unwrap();

    assert_eq!(report.settled_orders, vec![order.order_id.clone()]);
    assert!(report.expired_commitments.is_empty());
    assert_eq!(h.status(&order).await, OrderStatus::Settled);
    assert_eq!(
        h.store.commitments_for(&order.order_id).await.unwrap()[0].status,
        CommitmentStatus::Confirmed
    );
    assert_eq!(h.channel.published(Topic::OrdersAnnounced).len(), 1);
}
