use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Kitchen workflow states, in serving order.
///
/// `FoodReady` and `Completed` are accepted as aliases of `ReadyForPickup` and
/// `Collected` because older clients send them.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum OrderStatus {
    #[serde(rename = "Awaiting Payment Verification")]
    #[strum(
        to_string = "Awaiting Payment Verification",
        serialize = "AwaitingPaymentVerification",
        serialize = "pending"
    )]
    AwaitingPaymentVerification,
    #[serde(rename = "Order Received")]
    #[strum(to_string = "Order Received", serialize = "OrderReceived")]
    OrderReceived,
    #[serde(rename = "Order Confirmed")]
    #[strum(to_string = "Order Confirmed", serialize = "OrderConfirmed")]
    OrderConfirmed,
    #[serde(rename = "In Kitchen Queue")]
    #[strum(to_string = "In Kitchen Queue", serialize = "InKitchenQueue")]
    InKitchenQueue,
    #[serde(rename = "Preparing Food")]
    #[strum(to_string = "Preparing Food", serialize = "PreparingFood")]
    PreparingFood,
    #[serde(rename = "Ready for Pickup", alias = "Food Ready")]
    #[strum(
        to_string = "Ready for Pickup",
        serialize = "ReadyForPickup",
        serialize = "Food Ready",
        serialize = "FoodReady"
    )]
    ReadyForPickup,
    #[serde(rename = "Waiting for Collection")]
    #[strum(to_string = "Waiting for Collection", serialize = "WaitingForCollection")]
    WaitingForCollection,
    #[serde(rename = "Collected", alias = "Completed")]
    #[strum(to_string = "Collected", serialize = "Completed")]
    Collected,
    #[serde(rename = "Cancelled")]
    #[strum(to_string = "Cancelled", serialize = "Canceled")]
    Cancelled,
}

impl OrderStatus {
    /// Position along the forward workflow. `Cancelled` sits outside it.
    pub fn rank(self) -> Option<u8> {
        match self {
            Self::AwaitingPaymentVerification => Some(0),
            Self::OrderReceived => Some(1),
            Self::OrderConfirmed => Some(2),
            Self::InKitchenQueue => Some(3),
            Self::PreparingFood => Some(4),
            Self::ReadyForPickup => Some(5),
            Self::WaitingForCollection => Some(6),
            Self::Collected => Some(7),
            Self::Cancelled => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Collected)
    }

    /// Cancellation closes once the kitchen starts cooking.
    pub fn is_cancellable(self) -> bool {
        matches!(
            self,
            Self::AwaitingPaymentVerification
                | Self::OrderReceived
                | Self::OrderConfirmed
                | Self::InKitchenQueue
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    #[default]
    Regular,
    Rush,
    Scheduled,
}

impl OrderType {
    /// Serving priority: rush orders jump the queue.
    pub fn priority(self) -> u8 {
        match self {
            Self::Rush => 1,
            Self::Regular | Self::Scheduled => 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Cash at the counter
    Cod,
    /// Full amount over UPI
    Online,
    /// Upfront fraction over UPI, remainder at pickup
    Partial,
}

impl PaymentMethod {
    pub fn initial_status(self) -> OrderStatus {
        match self {
            Self::Cod => OrderStatus::OrderReceived,
            Self::Online | Self::Partial => OrderStatus::AwaitingPaymentVerification,
        }
    }

    pub fn requires_upi(self) -> bool {
        !matches!(self, Self::Cod)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub name: String,
    #[serde(alias = "price")]
    pub unit_price: Decimal,
    pub quantity: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Pending,
    Success,
    Failed,
    Expired,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAttempt {
    pub reference_id: String,
    pub attempted_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppliedPromocode {
    pub id: Uuid,
    pub code: String,
    pub percentage: u32,
}

/// One customer purchase as persisted in the order store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: String,
    pub items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub promocode: Option<AppliedPromocode>,
    pub service_fee: Decimal,
    pub rush_charges: Decimal,
    pub order_type: OrderType,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub priority: u8,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub paid_amount: Decimal,
    pub remaining_amount: Decimal,
    pub reference_id: Option<String>,
    pub payment: bool,
    pub payment_verified: bool,
    pub payment_expiry: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub payment_attempts: Vec<PaymentAttempt>,
    /// Bumped on every write; used for compare-and-swap updates.
    pub version: u64,
}

impl Order {
    /// Amount the customer has to send over UPI right now.
    pub fn upfront_amount(&self) -> Decimal {
        self.paid_amount
    }

    pub fn is_awaiting_payment(&self) -> bool {
        self.status == OrderStatus::AwaitingPaymentVerification && !self.payment
    }

    pub fn payment_window_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.payment_expiry.map_or(false, |expiry| now > expiry)
    }
}
