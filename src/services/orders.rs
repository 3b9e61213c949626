use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{
    order_status::{Actor, StatusTransitionHandler, TransitionRequest},
    payment_reference::{IssuedReference, PaymentReferenceIssuer},
    payments::PaymentVerifier,
    pricing::PricingCalculator,
    promocodes::PromocodeService,
};
use crate::{
    config::AppConfig,
    errors::{PaymentError, ServiceError},
    events::{Event, EventSender},
    models::{AppliedPromocode, LineItem, Order, OrderType, PaymentMethod},
    repositories::{OrderStore, UserStore},
};

/// Cart submitted by a customer.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrder {
    #[validate(length(min = 1, max = 50))]
    pub items: Vec<LineItem>,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub promocode: Option<String>,
    #[serde(default)]
    pub order_type: OrderType,
    #[serde(default)]
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(default = "default_payment_method")]
    pub payment_method: PaymentMethod,
}

fn default_payment_method() -> PaymentMethod {
    PaymentMethod::Online
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    /// Present for UPI orders.
    pub payment: Option<IssuedReference>,
}

/// Customer and admin facing order operations.
#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    pricing: PricingCalculator,
    promocodes: PromocodeService,
    issuer: PaymentReferenceIssuer,
    verifier: PaymentVerifier,
    transitions: StatusTransitionHandler,
    events: EventSender,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        users: Arc<dyn UserStore>,
        promocodes: PromocodeService,
        events: EventSender,
        config: &AppConfig,
    ) -> Self {
        let verifier = PaymentVerifier::new(
            orders.clone(),
            users.clone(),
            promocodes.clone(),
            events.clone(),
            config.payment.abandon_grace(),
        );
        Self {
            pricing: PricingCalculator::from_config(&config.pricing),
            issuer: PaymentReferenceIssuer::new(orders.clone(), &config.payment),
            transitions: StatusTransitionHandler::new(orders.clone(), users, events.clone()),
            verifier,
            promocodes,
            orders,
            events,
        }
    }

    pub fn verifier(&self) -> &PaymentVerifier {
        &self.verifier
    }

    pub fn payee_vpa(&self) -> &str {
        self.issuer.payee_vpa()
    }

    /// Places a UPI order (`online` or `partial`) and issues its payment reference.
    pub async fn place_online(
        &self,
        user_id: &str,
        request: PlaceOrder,
    ) -> Result<PlacedOrder, ServiceError> {
        if !request.payment_method.requires_upi() {
            return Err(ServiceError::ValidationError(
                "Cash orders must be placed through the COD endpoint".into(),
            ));
        }
        let method = request.payment_method;
        self.place(user_id, request, method).await
    }

    /// Places a cash-on-delivery order; it goes straight to the kitchen.
    pub async fn place_cod(
        &self,
        user_id: &str,
        request: PlaceOrder,
    ) -> Result<PlacedOrder, ServiceError> {
        self.place(user_id, request, PaymentMethod::Cod).await
    }

    #[instrument(skip(self, request))]
    async fn place(
        &self,
        user_id: &str,
        request: PlaceOrder,
        method: PaymentMethod,
    ) -> Result<PlacedOrder, ServiceError> {
        request.validate()?;
        PricingCalculator::validate_items(&request.items)?;

        let now = Utc::now();
        let scheduled_time = match (request.order_type, request.scheduled_time) {
            (OrderType::Scheduled, Some(at)) if at > now => Some(at),
            (OrderType::Scheduled, _) => {
                return Err(ServiceError::ValidationError(
                    "Scheduled orders need a pickup time in the future".into(),
                ))
            }
            (_, Some(_)) => {
                return Err(ServiceError::ValidationError(
                    "Only scheduled orders may carry a pickup time".into(),
                ))
            }
            (_, None) => None,
        };

        let subtotal = PricingCalculator::subtotal(&request.items)?;
        let code = request
            .promocode
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty());
        let (discount, applied) = match code {
            Some(code) => {
                let eval = self.promocodes.evaluate(code, subtotal, Some(user_id)).await?;
                let applied = AppliedPromocode {
                    id: eval.promocode.id,
                    code: eval.promocode.code,
                    percentage: eval.percentage,
                };
                (eval.discount, Some(applied))
            }
            None => (Decimal::ZERO, None),
        };

        let quote = self
            .pricing
            .quote(&request.items, discount, request.order_type, method)?;

        let order_id = Uuid::new_v4();
        let issued = if method.requires_upi() {
            Some(self.issuer.issue(order_id, quote.paid_amount)?)
        } else {
            None
        };

        let order = Order {
            id: order_id,
            user_id: user_id.to_string(),
            items: request.items,
            subtotal: quote.subtotal,
            discount_amount: quote.discount,
            promocode: applied,
            service_fee: quote.service_fee,
            rush_charges: quote.rush_surcharge,
            order_type: request.order_type,
            scheduled_time,
            priority: request.order_type.priority(),
            amount: quote.total,
            payment_method: method,
            paid_amount: quote.paid_amount,
            remaining_amount: quote.remaining_amount,
            reference_id: issued.as_ref().map(|i| i.reference_id.clone()),
            // Cash orders are settled at the counter and skip verification.
            payment: !method.requires_upi(),
            payment_verified: false,
            payment_expiry: issued.as_ref().map(|i| i.expires_at),
            status: method.initial_status(),
            created_at: now,
            payment_attempts: issued.iter().map(|i| i.pending_attempt(now)).collect(),
            version: 0,
        };
        self.orders.create(order.clone()).await?;

        if method == PaymentMethod::Cod {
            if let Some(promo) = &order.promocode {
                if let Err(e) = self.promocodes.record_usage(user_id, promo.id).await {
                    error!(order_id = %order.id, error = %e, "failed to record promocode usage");
                }
            }
        }

        info!(order_id = %order.id, amount = %order.amount, status = %order.status, "order placed");
        self.events
            .send_or_log(Event::OrderPlaced {
                order_id: order.id,
                user_id: order.user_id.clone(),
                amount: order.amount,
            })
            .await;

        Ok(PlacedOrder {
            order,
            payment: issued,
        })
    }

    async fn authorize(&self, actor: &Actor, order_id: Uuid) -> Result<Order, ServiceError> {
        let order = self.orders.get(order_id).await?;
        if !actor.can_access(&order) {
            return Err(ServiceError::Forbidden(format!(
                "Order {} does not belong to user {}",
                order_id,
                actor.id()
            )));
        }
        Ok(order)
    }

    async fn authorize_payment(&self, actor: &Actor, order_id: Uuid) -> Result<(), ServiceError> {
        match self.authorize(actor, order_id).await {
            Err(ServiceError::NotFound(_)) => Err(PaymentError::OrderNotFound(order_id).into()),
            other => other.map(|_| ()),
        }
    }

    pub async fn verify_payment(
        &self,
        actor: &Actor,
        order_id: Uuid,
        reference_id: &str,
    ) -> Result<Order, ServiceError> {
        self.authorize_payment(actor, order_id).await?;
        self.verifier.verify(order_id, reference_id).await
    }

    pub async fn check_reference(
        &self,
        actor: &Actor,
        order_id: Uuid,
        reference_id: &str,
    ) -> Result<bool, ServiceError> {
        self.authorize_payment(actor, order_id).await?;
        self.verifier.check_reference(order_id, reference_id).await
    }

    pub async fn regenerate_payment(
        &self,
        actor: &Actor,
        order_id: Uuid,
    ) -> Result<IssuedReference, ServiceError> {
        self.authorize(actor, order_id).await?;
        self.issuer.regenerate(order_id).await
    }

    pub async fn payment_failed(&self, actor: &Actor, order_id: Uuid) -> Result<(), ServiceError> {
        self.authorize_payment(actor, order_id).await?;
        self.verifier.abandon(order_id).await
    }

    pub async fn update_status(
        &self,
        actor: &Actor,
        request: TransitionRequest,
    ) -> Result<Order, ServiceError> {
        self.transitions.transition(actor, request).await
    }

    /// Kitchen view: rush orders first, then oldest first.
    pub async fn list_all(&self) -> Result<Vec<Order>, ServiceError> {
        self.orders.list_all().await
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Order>, ServiceError> {
        self.orders.list_by_user(user_id).await
    }
}
