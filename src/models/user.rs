use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The slice of a user account the ordering core needs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    /// Promocodes already redeemed; set semantics.
    pub used_promocodes: BTreeSet<Uuid>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn has_used(&self, promocode_id: Uuid) -> bool {
        self.used_promocodes.contains(&promocode_id)
    }
}
