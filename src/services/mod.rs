// Pure calculators
pub mod payment_reference;
pub mod pricing;

// Store-backed services
pub mod order_status;
pub mod orders;
pub mod payments;
pub mod promocodes;

pub use order_status::{Actor, StatusTransitionHandler, TransitionRequest};
pub use orders::{OrderService, PlaceOrder, PlacedOrder};
pub use payment_reference::{IssuedReference, PaymentReferenceIssuer};
pub use payments::PaymentVerifier;
pub use pricing::{PriceBreakdown, PricingCalculator};
pub use promocodes::{NewPromocode, PromocodeEvaluation, PromocodeService};

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use crate::models::{LineItem, Order, OrderStatus, OrderType, PaymentMethod};

    /// A ₹105 regular order awaiting UPI verification with reference `ABCDEF123456`.
    pub fn awaiting_order(user_id: &str) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            items: vec![LineItem {
                name: "Veg Thali".into(),
                unit_price: dec!(100),
                quantity: 1,
            }],
            subtotal: dec!(100.00),
            discount_amount: dec!(0.00),
            promocode: None,
            service_fee: dec!(5.00),
            rush_charges: dec!(0.00),
            order_type: OrderType::Regular,
            scheduled_time: None,
            priority: 0,
            amount: dec!(105.00),
            payment_method: PaymentMethod::Online,
            paid_amount: dec!(105.00),
            remaining_amount: dec!(0.00),
            reference_id: Some("ABCDEF123456".into()),
            payment: false,
            payment_verified: false,
            payment_expiry: Some(now + Duration::minutes(5)),
            status: OrderStatus::AwaitingPaymentVerification,
            created_at: now,
            payment_attempts: vec![],
            version: 0,
        }
    }

    pub fn order_in(user_id: &str, status: OrderStatus) -> Order {
        let mut order = awaiting_order(user_id);
        order.status = status;
        if status != OrderStatus::AwaitingPaymentVerification {
            order.payment = true;
            order.payment_verified = true;
        }
        order
    }
}
