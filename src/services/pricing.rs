use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    common::{amount_too_large, ensure_within_limit, round_money, MAX_QUANTITY},
    config::PricingConfig,
    errors::ServiceError,
    models::{LineItem, OrderType, PaymentMethod},
};

/// Every amount derived for an order at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub subtotal: Decimal,
    /// Discount actually applied, never above `subtotal`.
    pub discount: Decimal,
    pub discounted_subtotal: Decimal,
    pub service_fee: Decimal,
    pub rush_surcharge: Decimal,
    pub total: Decimal,
    pub paid_amount: Decimal,
    pub remaining_amount: Decimal,
}

/// Pure order pricing. Discounts apply before the service fee.
#[derive(Debug, Clone)]
pub struct PricingCalculator {
    service_fee: Decimal,
    rush_surcharge: Decimal,
    partial_fraction: Decimal,
}

impl PricingCalculator {
    pub fn new(service_fee: Decimal, rush_surcharge: Decimal, partial_fraction: Decimal) -> Self {
        Self {
            service_fee,
            rush_surcharge,
            partial_fraction,
        }
    }

    pub fn from_config(config: &PricingConfig) -> Self {
        Self::new(
            config.service_fee,
            config.rush_surcharge,
            config.partial_fraction,
        )
    }

    /// Sum of unit price times quantity, rounded to paise.
    pub fn subtotal(items: &[LineItem]) -> Result<Decimal, ServiceError> {
        let sum = items
            .iter()
            .try_fold(Decimal::ZERO, |acc, item| {
                item.unit_price
                    .checked_mul(Decimal::from(item.quantity))
                    .and_then(|line| acc.checked_add(line))
            })
            .ok_or_else(amount_too_large)?;
        ensure_within_limit(sum, "Order subtotal")?;
        Ok(round_money(sum))
    }

    pub fn validate_items(items: &[LineItem]) -> Result<(), ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Order must contain at least one item".into(),
            ));
        }
        for (idx, item) in items.iter().enumerate() {
            if item.name.trim().is_empty() {
                return Err(ServiceError::ValidationError(format!(
                    "Item {} has an empty name",
                    idx
                )));
            }
            if item.quantity == 0 {
                return Err(ServiceError::ValidationError(format!(
                    "Quantity for '{}' must be at least 1",
                    item.name
                )));
            }
            if item.quantity > MAX_QUANTITY {
                return Err(ServiceError::ValidationError(format!(
                    "Quantity for '{}' cannot exceed {}",
                    item.name, MAX_QUANTITY
                )));
            }
            if item.unit_price.is_sign_negative() && !item.unit_price.is_zero() {
                return Err(ServiceError::ValidationError(format!(
                    "Price for '{}' cannot be negative",
                    item.name
                )));
            }
            ensure_within_limit(item.unit_price, "Unit price")?;
        }
        Ok(())
    }

    pub fn quote(
        &self,
        items: &[LineItem],
        discount: Decimal,
        order_type: OrderType,
        method: PaymentMethod,
    ) -> Result<PriceBreakdown, ServiceError> {
        Self::validate_items(items)?;
        if discount.is_sign_negative() && !discount.is_zero() {
            return Err(ServiceError::ValidationError(
                "Discount cannot be negative".into(),
            ));
        }

        let subtotal = Self::subtotal(items)?;
        let discount = round_money(discount.min(subtotal));
        let discounted_subtotal = round_money((subtotal - discount).max(Decimal::ZERO));
        let service_fee = round_money(self.service_fee);
        let rush_surcharge = match order_type {
            OrderType::Rush => round_money(self.rush_surcharge),
            OrderType::Regular | OrderType::Scheduled => round_money(Decimal::ZERO),
        };
        let total = round_money(discounted_subtotal + service_fee + rush_surcharge);

        let (paid_amount, remaining_amount) = match method {
            PaymentMethod::Partial => {
                let paid = round_money(total * self.partial_fraction);
                (paid, round_money(total - paid))
            }
            PaymentMethod::Cod | PaymentMethod::Online => (total, round_money(Decimal::ZERO)),
        };

        Ok(PriceBreakdown {
            subtotal,
            discount,
            discounted_subtotal,
            service_fee,
            rush_surcharge,
            total,
            paid_amount,
            remaining_amount,
        })
    }
}

impl Default for PricingCalculator {
    fn default() -> Self {
        Self::from_config(&PricingConfig::default())
    }
}
