use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::promocodes::PromocodeService;
use crate::{
    errors::{PaymentError, ServiceError},
    events::{Event, EventSender, RemovalReason},
    models::{AttemptOutcome, Order, OrderStatus, PaymentAttempt},
    repositories::{OrderPatch, OrderStore, UserStore},
};

/// Confirms manually submitted UPI references and cleans up orders whose
/// payment never arrived.
#[derive(Clone)]
pub struct PaymentVerifier {
    orders: Arc<dyn OrderStore>,
    users: Arc<dyn UserStore>,
    promocodes: PromocodeService,
    events: EventSender,
    abandon_grace: Duration,
}

impl PaymentVerifier {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        users: Arc<dyn UserStore>,
        promocodes: PromocodeService,
        events: EventSender,
        abandon_grace: Duration,
    ) -> Self {
        Self {
            orders,
            users,
            promocodes,
            events,
            abandon_grace,
        }
    }

    async fn load(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        match self.orders.get(order_id).await {
            Err(ServiceError::NotFound(_)) => Err(PaymentError::OrderNotFound(order_id).into()),
            other => other,
        }
    }

    /// Marks the order paid when `claimed_reference` matches the active reference.
    ///
    /// An order whose payment window has lapsed is deleted and reported as
    /// expired; any later call sees `OrderNotFound`.
    #[instrument(skip(self, claimed_reference))]
    pub async fn verify(&self, order_id: Uuid, claimed_reference: &str) -> Result<Order, ServiceError> {
        let order = self.load(order_id).await?;

        if order.payment_verified {
            return Err(PaymentError::AlreadyVerified(order_id).into());
        }
        if !order.is_awaiting_payment() {
            return Err(ServiceError::InvalidState(format!(
                "Order {} is not awaiting payment verification (status: {})",
                order_id, order.status
            )));
        }

        let now = Utc::now();
        if order.payment_window_lapsed(now) {
            self.remove(&order, RemovalReason::PaymentExpired).await?;
            return Err(PaymentError::Expired(order_id).into());
        }

        let claimed = claimed_reference.trim();
        if order.reference_id.as_deref() != Some(claimed) {
            warn!(%order_id, "payment reference mismatch");
            return Err(PaymentError::ReferenceMismatch.into());
        }

        let patch = OrderPatch {
            status: Some(OrderStatus::OrderReceived),
            payment: Some(true),
            payment_verified: Some(true),
            push_attempt: Some(PaymentAttempt {
                reference_id: claimed.to_string(),
                attempted_at: now,
                outcome: AttemptOutcome::Success,
            }),
            ..Default::default()
        };
        let updated = self
            .orders
            .update_fields(order_id, Some(order.version), patch)
            .await?;
        info!(%order_id, user_id = %updated.user_id, "payment verified");

        if let Some(promo) = &updated.promocode {
            if let Err(e) = self.promocodes.record_usage(&updated.user_id, promo.id).await {
                error!(%order_id, promocode_id = %promo.id, error = %e, "failed to record promocode usage");
            }
        }

        let recipient = self.recipient(&updated.user_id).await;
        self.events
            .send_or_log(Event::PaymentVerified {
                order_id,
                reference_id: claimed.to_string(),
            })
            .await;
        self.events
            .send_or_log(Event::StatusChanged {
                order_id,
                user_id: updated.user_id.clone(),
                old_status: order.status,
                new_status: updated.status,
                recipient: recipient.clone(),
                timestamp: now,
            })
            .await;
        self.events
            .send_or_log(Event::InvoiceRequested {
                order_id,
                user_id: updated.user_id.clone(),
                recipient,
            })
            .await;

        Ok(updated)
    }

    /// Side-effect free comparison of `reference` with the order's active reference.
    pub async fn check_reference(&self, order_id: Uuid, reference: &str) -> Result<bool, ServiceError> {
        let order = self.load(order_id).await?;
        Ok(order.reference_id.as_deref() == Some(reference.trim()))
    }

    /// Deletes an order whose UPI payment failed before verification.
    #[instrument(skip(self))]
    pub async fn abandon(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let order = self.load(order_id).await?;
        if order.payment_verified || !order.is_awaiting_payment() {
            return Err(ServiceError::InvalidState(format!(
                "Order {} can no longer be abandoned (status: {})",
                order_id, order.status
            )));
        }
        self.remove(&order, RemovalReason::PaymentFailed).await
    }

    /// Deletes awaiting orders whose payment window closed more than the grace
    /// period before `now`. Returns how many were removed.
    pub async fn purge_abandoned(&self, now: DateTime<Utc>) -> Result<usize, ServiceError> {
        let cutoff = now - self.abandon_grace;
        let mut purged = 0;
        for order in self.orders.list_awaiting_payment().await? {
            if !order.payment_window_lapsed(cutoff) {
                continue;
            }
            match self.remove(&order, RemovalReason::PaymentExpired).await {
                Ok(()) => purged += 1,
                // Someone verified, regenerated or removed it since the listing.
                Err(ServiceError::ConcurrentModification(_)) | Err(ServiceError::NotFound(_)) => {
                    debug!(order_id = %order.id, "skipping order changed during sweep")
                }
                Err(e) => return Err(e),
            }
        }
        Ok(purged)
    }

    /// Runs [`purge_abandoned`](Self::purge_abandoned) every `every` until the runtime stops.
    pub fn spawn_expiry_sweep(self, every: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            info!(interval_secs = every.as_secs(), "payment expiry sweep started");
            loop {
                ticker.tick().await;
                match self.purge_abandoned(Utc::now()).await {
                    Ok(0) => {}
                    Ok(n) => info!(purged = n, "purged lapsed unpaid orders"),
                    Err(e) => error!(error = %e, "payment expiry sweep failed"),
                }
            }
        })
    }

    async fn remove(&self, order: &Order, reason: RemovalReason) -> Result<(), ServiceError> {
        self.orders.delete(order.id, Some(order.version)).await?;
        warn!(order_id = %order.id, %reason, "unpaid order deleted");
        self.events
            .send_or_log(Event::OrderRemoved {
                order_id: order.id,
                reason,
            })
            .await;
        Ok(())
    }

    async fn recipient(&self, user_id: &str) -> Option<String> {
        match self.users.get(user_id).await {
            Ok(profile) => profile.and_then(|p| p.email),
            Err(e) => {
                warn!(user_id, error = %e, "could not load user profile");
                None
            }
        }
    }
}
