use std::sync::Arc;
use tracing::{info, warn};
use unite_channel::{NotificationChannel, NotificationChannelExt, Topic};
use unite_types::{verify_secret, Order, OrderAnnouncement, Secret, SignedOrder, ValidationError};

use crate::{OrderError, OrderStore, SecretVault};

/// Admits maker-signed orders: verifies them, persists order and secret,
/// then announces the order to resolvers.
pub struct OrderIntake<S> {
    store: Arc<S>,
    channel: Arc<dyn NotificationChannel>,
}

impl<S> OrderIntake<S>
where
    S: OrderStore + SecretVault,
{
    pub fn new(store: Arc<S>, channel: Arc<dyn NotificationChannel>) -> Self {
        Self { store, channel }
    }

    /// Validate and store `signed`, returning the `Announced` order.
    ///
    /// Nothing is written if the signature, terms or secret are invalid.
    pub async fn create_order(
        &self,
        signed: SignedOrder,
        secret: &Secret,
        now: u64,
    ) -> Result<Order, OrderError> {
        signed.verify().map_err(ValidationError::from)?;
        signed.terms.validate()?;

        if now >= signed.terms.fill_deadline {
            return Err(OrderError::DeadlinePassed {
                order_id: signed.order_id(),
                fill_deadline: signed.terms.fill_deadline,
            });
        }
        if !verify_secret(secret, &signed.terms.secret_hash) {
            return Err(ValidationError::SecretMismatch.into());
        }

        let order = signed.into_order(now);
        self.store.insert_order(&order).await?;
        self.store.store_secret(&order.order_id, secret).await?;

        info!(
            order_id = %order.order_id,
            maker = %order.terms.maker,
            src_chain = %order.terms.src_chain_id,
            dst_chain = %order.terms.dst_chain_id,
            "order announced"
        );

        if let Err(e) = self
            .channel
            .publish_message(Topic::OrdersAnnounced, &OrderAnnouncement::from(&order))
            .await
        {
            warn!(order_id = %order.order_id, error = %e, "failed to publish announcement");
            return Err(e.into());
        }

        Ok(order)
    }
}
