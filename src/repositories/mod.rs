//! Document-store seams.
//!
//! The ordering core only talks to these traits. The in-memory implementations
//! back the service binary and the tests; a database-backed store slots in by
//! implementing the same traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    models::{Order, OrderStatus, PaymentAttempt, Promocode, UserProfile},
};

pub mod order_repository;
pub mod promocode_repository;
pub mod user_repository;

pub use order_repository::InMemoryOrderStore;
pub use promocode_repository::InMemoryPromocodeStore;
pub use user_repository::InMemoryUserStore;

/// Field-wise merge applied by [`OrderStore::update_fields`]; `None` leaves a
/// field untouched.
#[derive(Debug, Default, Clone)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub payment: Option<bool>,
    pub payment_verified: Option<bool>,
    pub reference_id: Option<String>,
    pub payment_expiry: Option<DateTime<Utc>>,
    pub push_attempt: Option<PaymentAttempt>,
}

impl OrderPatch {
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn apply(self, order: &mut Order) {
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(payment) = self.payment {
            order.payment = payment;
        }
        if let Some(verified) = self.payment_verified {
            order.payment_verified = verified;
        }
        if let Some(reference_id) = self.reference_id {
            order.reference_id = Some(reference_id);
        }
        if let Some(expiry) = self.payment_expiry {
            order.payment_expiry = Some(expiry);
        }
        if let Some(attempt) = self.push_attempt {
            order.payment_attempts.push(attempt);
        }
    }
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create(&self, order: Order) -> Result<Uuid, ServiceError>;

    /// Fails with `NotFound` when the order does not exist.
    async fn get(&self, id: Uuid) -> Result<Order, ServiceError>;

    /// Merges `patch` into the stored order and bumps its version. With
    /// `expected_version` set, the write only happens if the stored version
    /// still matches, otherwise `ConcurrentModification`.
    async fn update_fields(
        &self,
        id: Uuid,
        expected_version: Option<u64>,
        patch: OrderPatch,
    ) -> Result<Order, ServiceError>;

    /// Removes the order, honouring `expected_version` like `update_fields`.
    async fn delete(&self, id: Uuid, expected_version: Option<u64>) -> Result<(), ServiceError>;

    /// Orders owned by `user_id`, oldest first.
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Order>, ServiceError>;

    /// Every order, rush priority first, then oldest first.
    async fn list_all(&self) -> Result<Vec<Order>, ServiceError>;

    /// Non-cancelled orders owned by `user_id`.
    async fn count_active_by_user(&self, user_id: &str) -> Result<usize, ServiceError>;

    /// Orders still waiting for a UPI payment to be verified.
    async fn list_awaiting_payment(&self) -> Result<Vec<Order>, ServiceError>;
}

#[async_trait]
pub trait PromocodeStore: Send + Sync {
    /// Fails with `Conflict` if the (normalized) code is taken.
    async fn insert(&self, promocode: Promocode) -> Result<Promocode, ServiceError>;

    /// Case-insensitive exact lookup.
    async fn find_by_code(&self, code: &str) -> Result<Option<Promocode>, ServiceError>;

    async fn get(&self, id: Uuid) -> Result<Option<Promocode>, ServiceError>;

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Promocode, ServiceError>;

    /// Newest first.
    async fn list(&self) -> Result<Vec<Promocode>, ServiceError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<UserProfile>, ServiceError>;

    async fn upsert(&self, profile: UserProfile) -> Result<(), ServiceError>;

    /// Refreshes name and email from the latest token without touching the
    /// used-promocode set. Creates the profile if needed.
    async fn update_contact(
        &self,
        user_id: &str,
        name: Option<String>,
        email: Option<String>,
    ) -> Result<(), ServiceError>;

    /// Set-inserts the promocode into the user's used list, creating the
    /// profile if needed. Returns `false` when it was already recorded.
    async fn add_used_promocode(
        &self,
        user_id: &str,
        promocode_id: Uuid,
    ) -> Result<bool, ServiceError>;
}
