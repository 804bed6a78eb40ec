use async_trait::async_trait;
use tracing::info;
use unite_types::{OrderStatus, Secret};

use crate::store::{lock, InMemoryStore};
use crate::StoreError;

/// Custody of each order's hashlock preimage.
///
/// The secret can only be read out through [`reveal`](SecretVault::reveal),
/// and only once the order has reached `EscrowsReady`.
#[async_trait]
pub trait SecretVault: Send + Sync {
    async fn store_secret(&self, order_id: &str, secret: &Secret) -> Result<(), StoreError>;

    /// Return the secret, recording the first reveal time. Calling again
    /// returns the same secret and keeps the original timestamp.
    async fn reveal(&self, order_id: &str, now: u64) -> Result<Secret, StoreError>;

    async fn revealed_at(&self, order_id: &str) -> Result<Option<u64>, StoreError>;
}

pub(crate) fn check_revealable(order_id: &str, status: OrderStatus) -> Result<(), StoreError> {
    match status {
        OrderStatus::EscrowsReady | OrderStatus::Settled => Ok(()),
        status => Err(StoreError::SecretLocked {
            order_id: order_id.to_string(),
            status,
        }),
    }
}

#[async_trait]
impl SecretVault for InMemoryStore {
    async fn store_secret(&self, order_id: &str, secret: &Secret) -> Result<(), StoreError> {
        let slot = self.slot(order_id)?;
        lock(&slot).secret = Some(secret.clone());
        Ok(())
    }

    async fn reveal(&self, order_id: &str, now: u64) -> Result<Secret, StoreError> {
        let slot = self.slot(order_id)?;
        let mut slot = lock(&slot);

        check_revealable(order_id, slot.order.status)?;
        let secret = slot
            .secret
            .clone()
            .ok_or_else(|| StoreError::SecretMissing(order_id.to_string()))?;

        if slot.revealed_at.is_none() {
            slot.revealed_at = Some(now);
            info!(order_id = %order_id, "secret revealed");
        }
        Ok(secret)
    }

    async fn revealed_at(&self, order_id: &str) -> Result<Option<u64>, StoreError> {
        let slot = self.slot(order_id)?;
        let revealed_at = lock(&slot).revealed_at;
        Ok(revealed_at)
    }
}
