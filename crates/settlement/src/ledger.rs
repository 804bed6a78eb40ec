use async_trait::async_trait;
use cosmwasm_std::Uint128;
use tracing::{debug, info};
use unite_types::{Commitment, CommitmentStatus, Order, OrderStatus};

use crate::store::{lock, InMemoryStore};
use crate::{CommitError, StoreError};

/// Resolver commitments, at most one active per order.
///
/// `try_commit` is the single point of mutual exclusion between competing
/// resolvers: the commitment insert and the `Announced -> Committed` move
/// happen as one conditional write keyed by order id.
#[async_trait]
pub trait CommitmentLedger: Send + Sync {
    /// Accept `resolver`'s bid if the order is open and `committed_price`
    /// meets the auction price at `now`.
    async fn try_commit(
        &self,
        order_id: &str,
        resolver: &str,
        committed_price: Uint128,
        now: u64,
    ) -> Result<Commitment, CommitError>;

    /// Confirm the active commitment. Repeating the call is a no-op.
    async fn mark_ready(
        &self,
        order_id: &str,
        resolver: &str,
        now: u64,
    ) -> Result<Commitment, CommitError>;

    /// Expire the active commitment once `grace_period_secs` have passed
    /// without both of its resolver's escrows funded, returning the order to
    /// `Announced` and superseding the escrows reported so far.
    /// Returns the expired commitment, or `None` when nothing lapsed.
    async fn expire_commitment(
        &self,
        order_id: &str,
        now: u64,
        grace_period_secs: u64,
    ) -> Result<Option<Commitment>, CommitError>;

    async fn active_commitment(&self, order_id: &str) -> Result<Option<Commitment>, StoreError>;

    /// All commitments ever made for the order, oldest first
    async fn commitments_for(&self, order_id: &str) -> Result<Vec<Commitment>, StoreError>;
}

/// Admission rules shared by every backend, checked in rejection order
pub(crate) fn check_commit(
    order: &Order,
    active: Option<&Commitment>,
    committed_price: Uint128,
    now: u64,
) -> Result<(), CommitError> {
    if let Some(active) = active {
        return Err(CommitError::AlreadyCommitted {
            order_id: order.order_id.clone(),
            resolver: active.resolver.clone(),
        });
    }
    if order.status != OrderStatus::Announced || order.is_past_deadline(now) {
        return Err(CommitError::OrderNotAnnounced {
            order_id: order.order_id.clone(),
            status: order.status,
        });
    }
    check_price(order, committed_price, now)
}

pub(crate) fn check_price(order: &Order, offered: Uint128, now: u64) -> Result<(), CommitError> {
    let required = order.current_price(now);
    if offered < required {
        return Err(CommitError::PriceTooLow { offered, required });
    }
    Ok(())
}

/// Whether an order in `status` may have its commitment expired, given whether
/// the committed resolver funded both legs
pub(crate) fn may_expire(status: OrderStatus, both_funded: bool) -> bool {
    matches!(status, OrderStatus::Committed | OrderStatus::EscrowsPending) && !both_funded
}

#[async_trait]
impl CommitmentLedger for InMemoryStore {
    async fn try_commit(
        &self,
        order_id: &str,
        resolver: &str,
        committed_price: Uint128,
        now: u64,
    ) -> Result<Commitment, CommitError> {
        let slot = self.slot(order_id)?;
        let mut slot = lock(&slot);

        check_commit(&slot.order, slot.active_commitment(), committed_price, now)?;

        let commitment = Commitment::new(order_id, resolver, committed_price, now);
        slot.commitments.push(commitment.clone());
        slot.apply(
            OrderStatus::Committed,
            now,
            Some(format!("committed by {resolver} at {committed_price}")),
        );

        info!(
            order_id = %order_id,
            resolver = %resolver,
            price = %committed_price,
            "commitment accepted"
        );
        Ok(commitment)
    }

    async fn mark_ready(
        &self,
        order_id: &str,
        resolver: &str,
        now: u64,
    ) -> Result<Commitment, CommitError> {
        let slot = self.slot(order_id)?;
        let mut slot = lock(&slot);

        let active = slot
            .active_commitment_mut()
            .ok_or_else(|| CommitError::NoActiveCommitment(order_id.to_string()))?;

        if active.resolver != resolver {
            return Err(CommitError::ResolverMismatch {
                expected: active.resolver.clone(),
                actual: resolver.to_string(),
            });
        }

        if active.status != CommitmentStatus::Confirmed {
            active.status = CommitmentStatus::Confirmed;
            active.updated_at = now;
        }
        Ok(active.clone())
    }

    async fn expire_commitment(
        &self,
        order_id: &str,
        now: u64,
        grace_period_secs: u64,
    ) -> Result<Option<Commitment>, CommitError> {
        let slot = self.slot(order_id)?;
        let mut slot = lock(&slot);

        let lapsed = match slot.active_commitment() {
            Some(active) => active.grace_elapsed(now, grace_period_secs),
            None => return Ok(None),
        };
        if !lapsed || !may_expire(slot.order.status, slot.active_escrows_funded()) {
            return Ok(None);
        }

        let resolver = slot
            .active_commitment()
            .map(|c| c.resolver.clone())
            .unwrap_or_default();
        slot.apply(
            OrderStatus::Announced,
            now,
            Some(format!("commitment by {resolver} lapsed, re-auctioning")),
        );

        let expired = slot
            .commitments
            .iter()
            .rev()
            .find(|c| c.status == CommitmentStatus::Expired)
            .cloned();

        debug!(order_id = %order_id, resolver = %resolver, "commitment expired");
        Ok(expired)
    }

    async fn active_commitment(&self, order_id: &str) -> Result<Option<Commitment>, StoreError> {
        let slot = self.slot(order_id)?;
        let active = lock(&slot).active_commitment().cloned();
        Ok(active)
    }

    async fn commitments_for(&self, order_id: &str) -> Result<Vec<Commitment>, StoreError> {
        let slot = self.slot(order_id)?;
        let commitments = lock(&slot).commitments.clone();
        Ok(commitments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{funded_escrow, test_order};
    use crate::OrderStore;
    use std::sync::Arc;
    use unite_types::EscrowRole;

    async fn store_with_order() -> (InMemoryStore, Order) {
        let store = InMemoryStore::new();
        let order = test_order(1);
        store.insert_order(&order).await.unwrap();
        (store, order)
    }

    #[tokio::test]
    async fn test_commit_moves_order_to_committed() {
        let (store, order) = store_with_order().await;

        let commitment = store
            .try_commit(&order.order_id, "resolver-1", Uint128::new(100), 1_150)
            .await
            .unwrap();
        assert_eq!(commitment.status, CommitmentStatus::Pending);
        assert_eq!(
            store.get_order(&order.order_id).await.unwrap().status,
            OrderStatus::Committed
        );
        assert_eq!(
            store.active_commitment(&order.order_id).await.unwrap(),
            Some(commitment)
        );
    }

    #[tokio::test]
    async fn test_second_commit_is_already_committed() {
        let (store, order) = store_with_order().await;
        store
            .try_commit(&order.order_id, "resolver-1", Uint128::new(110), 1_000)
            .await
            .unwrap();

        let err = store
            .try_commit(&order.order_id, "resolver-2", Uint128::new(110), 1_000)
            .await
            .unwrap_err();
        assert!(
            matches!(err, CommitError::AlreadyCommitted { ref resolver, .. } if resolver == "resolver-1")
        );
        assert!(err.is_race());
    }

    #[tokio::test]
    async fn test_price_below_auction_is_rejected() {
        let (store, order) = store_with_order().await;

        let err = store
            .try_commit(&order.order_id, "resolver-1", Uint128::new(99), 1_150)
            .await
            .unwrap_err();
        match err {
            CommitError::PriceTooLow { offered, required } => {
                assert_eq!(offered, Uint128::new(99));
                assert_eq!(required, Uint128::new(100));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            store.get_order(&order.order_id).await.unwrap().status,
            OrderStatus::Announced
        );
    }

    #[tokio::test]
    async fn test_commit_after_deadline_is_not_announced() {
        let (store, order) = store_with_order().await;
        let err = store
            .try_commit(
                &order.order_id,
                "resolver-1",
                Uint128::new(110),
                order.terms.fill_deadline,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CommitError::OrderNotAnnounced { .. }));
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.try_commit("nope", "r", Uint128::new(1), 0).await,
            Err(CommitError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mark_ready_checks_resolver() {
        let (store, order) = store_with_order().await;
        store
            .try_commit(&order.order_id, "resolver-1", Uint128::new(110), 1_000)
            .await
            .unwrap();

        assert!(matches!(
            store.mark_ready(&order.order_id, "resolver-2", 1_010).await,
            Err(CommitError::ResolverMismatch { .. })
        ));

        let confirmed = store
            .mark_ready(&order.order_id, "resolver-1", 1_010)
            .await
            .unwrap();
        assert_eq!(confirmed.status, CommitmentStatus::Confirmed);

        let again = store
            .mark_ready(&order.order_id, "resolver-1", 1_020)
            .await
            .unwrap();
        assert_eq!(again.updated_at, 1_010);
    }

    #[tokio::test]
    async fn test_expire_commitment_reopens_auction() {
        let (store, order) = store_with_order().await;
        store
            .try_commit(&order.order_id, "resolver-1", Uint128::new(110), 1_000)
            .await
            .unwrap();

        assert!(store
            .expire_commitment(&order.order_id, 1_299, 300)
            .await
            .unwrap()
            .is_none());

        let expired = store
            .expire_commitment(&order.order_id, 1_300, 300)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(expired.status, CommitmentStatus::Expired);
        assert_eq!(
            store.get_order(&order.order_id).await.unwrap().status,
            OrderStatus::Announced
        );

        // another resolver can now win the order
        store
            .try_commit(&order.order_id, "resolver-2", Uint128::new(110), 1_301)
            .await
            .unwrap();
        assert_eq!(store.commitments_for(&order.order_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_expire_skips_when_both_escrows_funded() {
        let (store, order) = store_with_order().await;
        store
            .try_commit(&order.order_id, "resolver-1", Uint128::new(110), 1_000)
            .await
            .unwrap();
        store
            .upsert_escrow(&funded_escrow(&order.order_id, "resolver-1", EscrowRole::Source))
            .await
            .unwrap();
        store
            .upsert_escrow(&funded_escrow(
                &order.order_id,
                "resolver-1",
                EscrowRole::Destination,
            ))
            .await
            .unwrap();

        assert!(store
            .expire_commitment(&order.order_id, 5_000, 300)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .active_commitment(&order.order_id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_lapsed_resolver_escrows_do_not_hold_next_commitment() {
        let (store, order) = store_with_order().await;
        store
            .try_commit(&order.order_id, "resolver-1", Uint128::new(110), 1_000)
            .await
            .unwrap();
        store
            .upsert_escrow(&funded_escrow(&order.order_id, "resolver-1", EscrowRole::Source))
            .await
            .unwrap();
        store
            .expire_commitment(&order.order_id, 1_300, 300)
            .await
            .unwrap()
            .unwrap();

        store
            .try_commit(&order.order_id, "resolver-2", Uint128::new(110), 1_310)
            .await
            .unwrap();
        // the lapsed resolver's destination leg lands after it lost the order
        store
            .upsert_escrow(&funded_escrow(
                &order.order_id,
                "resolver-1",
                EscrowRole::Destination,
            ))
            .await
            .unwrap();

        let expired = store
            .expire_commitment(&order.order_id, 1_610, 300)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(expired.resolver, "resolver-2");
        assert_eq!(store.superseded_escrows(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_terminal_transition_supersedes_commitment() {
        let (store, order) = store_with_order().await;
        store
            .try_commit(&order.order_id, "resolver-1", Uint128::new(110), 1_000)
            .await
            .unwrap();
        store
            .transition(
                &order.order_id,
                OrderStatus::Committed,
                OrderStatus::Expired,
                2_000,
                None,
            )
            .await
            .unwrap();

        let all = store.commitments_for(&order.order_id).await.unwrap();
        assert_eq!(all[0].status, CommitmentStatus::Superseded);
        assert!(store
            .active_commitment(&order.order_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_concurrent_commits_admit_exactly_one() {
        let store = Arc::new(InMemoryStore::new());
        let order = test_order(1);
        store.insert_order(&order).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            let order_id = order.order_id.clone();
            handles.push(tokio::spawn(async move {
                store
                    .try_commit(&order_id, &format!("resolver-{i}"), Uint128::new(110), 1_000)
                    .await
            }));
        }

        let results = futures::future::join_all(handles).await;
        let wins = results
            .iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count();
        assert_eq!(wins, 1);
        assert!(results.iter().all(|r| match r {
            Ok(Err(e)) => matches!(e, CommitError::AlreadyCommitted { .. }),
            Ok(Ok(_)) => true,
            Err(_) => false,
        }));
    }
}
