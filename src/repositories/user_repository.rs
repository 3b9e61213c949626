use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::UserStore;
use crate::{errors::ServiceError, models::UserProfile};

#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: DashMap<String, UserProfile>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get(&self, user_id: &str) -> Result<Option<UserProfile>, ServiceError> {
        Ok(self.users.get(user_id).map(|u| u.value().clone()))
    }

    async fn upsert(&self, profile: UserProfile) -> Result<(), ServiceError> {
        self.users.insert(profile.id.clone(), profile);
        Ok(())
    }

    async fn update_contact(
        &self,
        user_id: &str,
        name: Option<String>,
        email: Option<String>,
    ) -> Result<(), ServiceError> {
        let mut profile = self
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile::new(user_id));
        if name.is_some() {
            profile.name = name;
        }
        if email.is_some() {
            profile.email = email;
        }
        Ok(())
    }

    async fn add_used_promocode(
        &self,
        user_id: &str,
        promocode_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let mut profile = self
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile::new(user_id));
        Ok(profile.used_promocodes.insert(promocode_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_usage_is_idempotent() {
        let store = InMemoryUserStore::new();
        let promo = Uuid::new_v4();

        assert!(store.add_used_promocode("u1", promo).await.unwrap());
        assert!(!store.add_used_promocode("u1", promo).await.unwrap());

        let profile = store.get("u1").await.unwrap().unwrap();
        assert_eq!(profile.used_promocodes.len(), 1);
        assert!(profile.has_used(promo));
    }

    #[tokio::test]
    async fn contact_update_keeps_usage_history() {
        let store = InMemoryUserStore::new();
        let promo = Uuid::new_v4();
        store.add_used_promocode("u1", promo).await.unwrap();

        store
            .update_contact("u1", None, Some("u1@campus.edu".into()))
            .await
            .unwrap();
        store.update_contact("u1", Some("Meera".into()), None).await.unwrap();

        let profile = store.get("u1").await.unwrap().unwrap();
        assert_eq!(profile.email.as_deref(), Some("u1@campus.edu"));
        assert_eq!(profile.name.as_deref(), Some("Meera"));
        assert!(profile.has_used(promo));
    }
}
