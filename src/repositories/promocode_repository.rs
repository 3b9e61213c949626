use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use uuid::Uuid;

use super::PromocodeStore;
use crate::{
    errors::ServiceError,
    models::{promocode::normalize_code, Promocode},
};

/// Promocodes keyed by id with a unique index on the normalized code.
#[derive(Debug, Default)]
pub struct InMemoryPromocodeStore {
    promocodes: DashMap<Uuid, Promocode>,
    codes: DashMap<String, Uuid>,
}

impl InMemoryPromocodeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PromocodeStore for InMemoryPromocodeStore {
    async fn insert(&self, mut promocode: Promocode) -> Result<Promocode, ServiceError> {
        promocode.code = normalize_code(&promocode.code);
        match self.codes.entry(promocode.code.clone()) {
            Entry::Occupied(_) => Err(ServiceError::Conflict(format!(
                "Promocode {} already exists",
                promocode.code
            ))),
            Entry::Vacant(slot) => {
                slot.insert(promocode.id);
                self.promocodes.insert(promocode.id, promocode.clone());
                Ok(promocode)
            }
        }
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Promocode>, ServiceError> {
        let id = match self.codes.get(&normalize_code(code)) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.promocodes.get(&id).map(|p| p.value().clone()))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Promocode>, ServiceError> {
        Ok(self.promocodes.get(&id).map(|p| p.value().clone()))
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Promocode, ServiceError> {
        let mut entry = self
            .promocodes
            .get_mut(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("Promocode {} not found", id)))?;
        entry.is_active = active;
        Ok(entry.value().clone())
    }

    async fn list(&self) -> Result<Vec<Promocode>, ServiceError> {
        let mut all: Vec<Promocode> = self.promocodes.iter().map(|p| p.value().clone()).collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}
