use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    models::{Order, OrderStatus},
    repositories::{OrderPatch, OrderStore, UserStore},
};

/// Who is asking for a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Customer(String),
    Admin(String),
}

impl Actor {
    pub fn id(&self) -> &str {
        match self {
            Actor::Customer(id) | Actor::Admin(id) => id,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Actor::Admin(_))
    }

    /// Admins see everything, customers only their own orders.
    pub fn can_access(&self, order: &Order) -> bool {
        match self {
            Actor::Admin(_) => true,
            Actor::Customer(id) => *id == order.user_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub order_id: Uuid,
    pub status: OrderStatus,
    /// Lets an admin move an order out of payment verification without a
    /// verified UPI reference (e.g. cash handed over at the counter).
    #[serde(default)]
    pub override_payment: bool,
}

/// Checks a move along the kitchen workflow.
pub fn check_transition(
    from: OrderStatus,
    to: OrderStatus,
    override_payment: bool,
) -> Result<(), ServiceError> {
    if from.is_terminal() {
        return Err(ServiceError::InvalidState(format!(
            "Order is already {}",
            from
        )));
    }
    if from == to {
        return Err(ServiceError::InvalidState(format!(
            "Order is already in status '{}'",
            to
        )));
    }
    if to == OrderStatus::Cancelled {
        if from.is_cancellable() {
            return Ok(());
        }
        return Err(ServiceError::InvalidState(format!(
            "Order can no longer be cancelled once it is '{}'",
            from
        )));
    }
    if from == OrderStatus::AwaitingPaymentVerification && !override_payment {
        return Err(ServiceError::InvalidState(
            "Payment has not been verified for this order".into(),
        ));
    }
    match (from.rank(), to.rank()) {
        (Some(current), Some(next)) if next > current => Ok(()),
        _ => Err(ServiceError::InvalidState(format!(
            "Cannot move order back from '{}' to '{}'",
            from, to
        ))),
    }
}

#[derive(Clone)]
pub struct StatusTransitionHandler {
    orders: Arc<dyn OrderStore>,
    users: Arc<dyn UserStore>,
    events: EventSender,
}

impl StatusTransitionHandler {
    pub fn new(orders: Arc<dyn OrderStore>, users: Arc<dyn UserStore>, events: EventSender) -> Self {
        Self {
            orders,
            users,
            events,
        }
    }

    /// Applies `request` on behalf of `actor` and notifies the order owner.
    #[instrument(skip(self, request), fields(order_id = %request.order_id, new_status = %request.status))]
    pub async fn transition(
        &self,
        actor: &Actor,
        request: TransitionRequest,
    ) -> Result<Order, ServiceError> {
        let order = self.orders.get(request.order_id).await?;

        if let Actor::Customer(user_id) = actor {
            if !actor.can_access(&order) {
                return Err(ServiceError::Forbidden(format!(
                    "Order {} does not belong to user {}",
                    order.id, user_id
                )));
            }
            if request.status != OrderStatus::Cancelled {
                return Err(ServiceError::Forbidden(
                    "Customers may only cancel their orders".into(),
                ));
            }
        }

        let old_status = order.status;
        let overriding = request.override_payment && actor.is_admin();
        check_transition(old_status, request.status, overriding)?;

        let mut patch = OrderPatch::status(request.status);
        if old_status == OrderStatus::AwaitingPaymentVerification
            && request.status != OrderStatus::Cancelled
        {
            patch.payment = Some(true);
            patch.payment_verified = Some(true);
        }

        let updated = self
            .orders
            .update_fields(order.id, Some(order.version), patch)
            .await?;

        info!(
            "Order {} status updated from '{}' to '{}' by {}",
            order.id,
            old_status,
            updated.status,
            actor.id()
        );

        let recipient = match self.users.get(&updated.user_id).await {
            Ok(profile) => profile.and_then(|p| p.email),
            Err(e) => {
                error!("Failed to load user {} for notification: {}", updated.user_id, e);
                None
            }
        };

        self.events
            .send_or_log(Event::StatusChanged {
                order_id: updated.id,
                user_id: updated.user_id.clone(),
                old_status,
                new_status: updated.status,
                recipient: recipient.clone(),
                timestamp: Utc::now(),
            })
            .await;

        if updated.status == OrderStatus::Collected {
            self.events
                .send_or_log(Event::InvoiceRequested {
                    order_id: updated.id,
                    user_id: updated.user_id.clone(),
                    recipient,
                })
                .await;
        }

        Ok(updated)
    }
}
