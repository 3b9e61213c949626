use std::cmp::{Ordering, Reverse};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use super::{OrderPatch, OrderStore};
use crate::{
    errors::ServiceError,
    models::{Order, OrderStatus},
};

/// Serving order used by the kitchen list: rush first, then first come first served.
pub fn serving_order(a: &Order, b: &Order) -> Ordering {
    (Reverse(a.priority), a.created_at, a.id).cmp(&(Reverse(b.priority), b.created_at, b.id))
}

/// Order store backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: DashMap<Uuid, Order>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found(id: Uuid) -> ServiceError {
        ServiceError::NotFound(format!("Order {} not found", id))
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: Order) -> Result<Uuid, ServiceError> {
        let id = order.id;
        if self.orders.contains_key(&id) {
            return Err(ServiceError::Conflict(format!("Order {} already exists", id)));
        }
        self.orders.insert(id, order);
        debug!(order_id = %id, "order stored");
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Order, ServiceError> {
        self.orders
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Self::not_found(id))
    }

    async fn update_fields(
        &self,
        id: Uuid,
        expected_version: Option<u64>,
        patch: OrderPatch,
    ) -> Result<Order, ServiceError> {
        let mut entry = self.orders.get_mut(&id).ok_or_else(|| Self::not_found(id))?;
        if let Some(expected) = expected_version {
            if entry.version != expected {
                return Err(ServiceError::ConcurrentModification(id));
            }
        }
        patch.apply(entry.value_mut());
        entry.version += 1;
        Ok(entry.value().clone())
    }

    async fn delete(&self, id: Uuid, expected_version: Option<u64>) -> Result<(), ServiceError> {
        let removed = self.orders.remove_if(&id, |_, order| {
            expected_version.map_or(true, |expected| order.version == expected)
        });
        match removed {
            Some(_) => Ok(()),
            None if self.orders.contains_key(&id) => Err(ServiceError::ConcurrentModification(id)),
            None => Err(Self::not_found(id)),
        }
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Order>, ServiceError> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        orders.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(orders)
    }

    async fn list_all(&self) -> Result<Vec<Order>, ServiceError> {
        let mut orders: Vec<Order> = self.orders.iter().map(|e| e.value().clone()).collect();
        orders.sort_by(serving_order);
        Ok(orders)
    }

    async fn count_active_by_user(&self, user_id: &str) -> Result<usize, ServiceError> {
        Ok(self
            .orders
            .iter()
            .filter(|e| e.user_id == user_id && e.status != OrderStatus::Cancelled)
            .count())
    }

    async fn list_awaiting_payment(&self) -> Result<Vec<Order>, ServiceError> {
        Ok(self
            .orders
            .iter()
            .filter(|e| e.is_awaiting_payment())
            .map(|e| e.value().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderType, PaymentMethod};
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn order(user: &str, order_type: OrderType, minutes_ago: i64) -> Order {
        Order {
            id: Uuid::new_v4(),
            user_id: user.into(),
            items: vec![],
            subtotal: dec!(100),
            discount_amount: dec!(0),
            promocode: None,
            service_fee: dec!(5),
            rush_charges: dec!(0),
            order_type,
            scheduled_time: None,
            priority: order_type.priority(),
            amount: dec!(105),
            payment_method: PaymentMethod::Cod,
            paid_amount: dec!(105),
            remaining_amount: dec!(0),
            reference_id: None,
            payment: true,
            payment_verified: false,
            payment_expiry: None,
            status: OrderStatus::OrderReceived,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            payment_attempts: vec![],
            version: 0,
        }
    }

    #[tokio::test]
    async fn list_all_puts_rush_first_then_oldest() {
        let store = InMemoryOrderStore::new();
        let old_regular = order("u1", OrderType::Regular, 30);
        let new_regular = order("u2", OrderType::Regular, 5);
        let new_rush = order("u3", OrderType::Rush, 1);
        let old_rush = order("u4", OrderType::Rush, 20);
        for o in [&new_regular, &new_rush, &old_regular, &old_rush] {
            store.create(o.clone()).await.unwrap();
        }

        let ids: Vec<Uuid> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(
            ids,
            vec![old_rush.id, new_rush.id, old_regular.id, new_regular.id]
        );
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = InMemoryOrderStore::new();
        let o = order("u1", OrderType::Regular, 0);
        let id = store.create(o).await.unwrap();

        let updated = store
            .update_fields(id, Some(0), OrderPatch::status(OrderStatus::OrderConfirmed))
            .await
            .unwrap();
        assert_eq!(updated.version, 1);

        let err = store
            .update_fields(id, Some(0), OrderPatch::status(OrderStatus::InKitchenQueue))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ConcurrentModification(got) if got == id);
        assert_eq!(store.get(id).await.unwrap().status, OrderStatus::OrderConfirmed);
    }

    #[tokio::test]
    async fn delete_checks_version_and_existence() {
        let store = InMemoryOrderStore::new();
        let id = store.create(order("u1", OrderType::Regular, 0)).await.unwrap();

        assert_matches!(
            store.delete(id, Some(7)).await,
            Err(ServiceError::ConcurrentModification(_))
        );
        store.delete(id, Some(0)).await.unwrap();
        assert_matches!(store.get(id).await, Err(ServiceError::NotFound(_)));
        assert_matches!(store.delete(id, None).await, Err(ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn counts_ignore_cancelled_orders() {
        let store = InMemoryOrderStore::new();
        let mut cancelled = order("u1", OrderType::Regular, 10);
        cancelled.status = OrderStatus::Cancelled;
        store.create(cancelled).await.unwrap();
        assert_eq!(store.count_active_by_user("u1").await.unwrap(), 0);

        store.create(order("u1", OrderType::Regular, 1)).await.unwrap();
        assert_eq!(store.count_active_by_user("u1").await.unwrap(), 1);
        assert_eq!(store.list_by_user("u1").await.unwrap().len(), 2);
    }
}
