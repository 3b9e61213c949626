use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::{amount_too_large, ensure_within_limit, round_money},
    errors::{PromocodeError, ServiceError},
    models::{promocode::normalize_code, Promocode},
    repositories::{OrderStore, PromocodeStore, UserStore},
};

/// Outcome of a successful promocode check.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PromocodeEvaluation {
    pub discount: Decimal,
    pub percentage: u32,
    pub promocode: Promocode,
}

/// Administrator input for a new promocode.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewPromocode {
    pub code: String,
    pub discount_percentage: u32,
    #[serde(default)]
    pub min_order_value: Decimal,
    pub expiry_date: DateTime<Utc>,
    #[serde(default)]
    pub is_welcome_code: bool,
}

#[derive(Clone)]
pub struct PromocodeService {
    promocodes: Arc<dyn PromocodeStore>,
    users: Arc<dyn UserStore>,
    orders: Arc<dyn OrderStore>,
}

impl PromocodeService {
    pub fn new(
        promocodes: Arc<dyn PromocodeStore>,
        users: Arc<dyn UserStore>,
        orders: Arc<dyn OrderStore>,
    ) -> Self {
        Self {
            promocodes,
            users,
            orders,
        }
    }

    /// Checks `code` against `subtotal` and, when given, the user's history.
    /// Nothing is written; usage is recorded separately.
    #[instrument(skip(self))]
    pub async fn evaluate(
        &self,
        code: &str,
        subtotal: Decimal,
        user_id: Option<&str>,
    ) -> Result<PromocodeEvaluation, ServiceError> {
        if subtotal.is_sign_negative() && !subtotal.is_zero() {
            return Err(ServiceError::ValidationError(
                "Order amount cannot be negative".into(),
            ));
        }
        ensure_within_limit(subtotal, "Order amount")?;

        let promocode = self
            .promocodes
            .find_by_code(code)
            .await?
            .filter(|p| p.is_usable_at(Utc::now()))
            .ok_or(PromocodeError::NotFound)?;

        if subtotal < promocode.min_order_value {
            return Err(PromocodeError::BelowMinimum {
                minimum: promocode.min_order_value,
            }
            .into());
        }

        if let Some(user_id) = user_id {
            let already_used = self
                .users
                .get(user_id)
                .await?
                .map_or(false, |profile| profile.has_used(promocode.id));
            if already_used {
                return Err(PromocodeError::AlreadyUsed.into());
            }

            if promocode.is_welcome_code && self.orders.count_active_by_user(user_id).await? > 0 {
                return Err(PromocodeError::WelcomeIneligible.into());
            }
        }

        let discount = subtotal
            .checked_mul(Decimal::from(promocode.discount_percentage))
            .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
            .map(round_money)
            .ok_or_else(amount_too_large)?;
        debug!(%discount, "promocode accepted");

        Ok(PromocodeEvaluation {
            discount,
            percentage: promocode.discount_percentage,
            promocode,
        })
    }

    /// Marks the promocode as used by `user_id`. Repeating the call is a no-op.
    #[instrument(skip(self))]
    pub async fn record_usage(&self, user_id: &str, promocode_id: Uuid) -> Result<(), ServiceError> {
        if self.promocodes.get(promocode_id).await?.is_none() {
            return Err(ServiceError::NotFound(format!(
                "Promocode {} not found",
                promocode_id
            )));
        }
        if self.users.add_used_promocode(user_id, promocode_id).await? {
            info!(user_id, %promocode_id, "promocode usage recorded");
        }
        Ok(())
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create(&self, input: NewPromocode) -> Result<Promocode, ServiceError> {
        let code = normalize_code(&input.code);
        if code.len() < 3 || code.len() > 32 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ServiceError::ValidationError(
                "Code must be 3-32 letters or digits".into(),
            ));
        }
        if !(1..=100).contains(&input.discount_percentage) {
            return Err(ServiceError::ValidationError(
                "Discount percentage must be between 1 and 100".into(),
            ));
        }
        if input.min_order_value.is_sign_negative() && !input.min_order_value.is_zero() {
            return Err(ServiceError::ValidationError(
                "Minimum order value cannot be negative".into(),
            ));
        }
        let now = Utc::now();
        if input.expiry_date <= now {
            return Err(ServiceError::ValidationError(
                "Expiry date must be in the future".into(),
            ));
        }

        let created = self
            .promocodes
            .insert(Promocode {
                id: Uuid::new_v4(),
                code,
                discount_percentage: input.discount_percentage,
                min_order_value: round_money(input.min_order_value),
                is_welcome_code: input.is_welcome_code,
                is_active: true,
                expiry_date: input.expiry_date,
                created_at: now,
            })
            .await?;
        info!(promocode_id = %created.id, code = %created.code, "promocode created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<Promocode, ServiceError> {
        let updated = self.promocodes.set_active(id, active).await?;
        info!(promocode_id = %id, active, "promocode toggled");
        Ok(updated)
    }

    /// Every promocode, newest first.
    pub async fn list_all(&self) -> Result<Vec<Promocode>, ServiceError> {
        self.promocodes.list().await
    }

    /// Promocodes a customer could apply right now.
    pub async fn list_active(&self) -> Result<Vec<Promocode>, ServiceError> {
        let now = Utc::now();
        Ok(self
            .promocodes
            .list()
            .await?
            .into_iter()
            .filter(|p| p.is_usable_at(now))
            .collect())
    }
}
