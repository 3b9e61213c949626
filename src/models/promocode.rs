use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A named percentage discount rule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Promocode {
    pub id: Uuid,
    /// Stored upper-case; lookups are case-insensitive.
    pub code: String,
    pub discount_percentage: u32,
    pub min_order_value: Decimal,
    pub is_welcome_code: bool,
    pub is_active: bool,
    pub expiry_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Promocode {
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expiry_date > now
    }
}

/// Canonical form of a code as typed by a customer.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn promo(active: bool, expires_in: Duration) -> Promocode {
        let now = Utc::now();
        Promocode {
            id: Uuid::new_v4(),
            code: "SAVE10".into(),
            discount_percentage: 10,
            min_order_value: dec!(0),
            is_welcome_code: false,
            is_active: active,
            expiry_date: now + expires_in,
            created_at: now,
        }
    }

    #[test]
    fn usable_only_when_active_and_unexpired() {
        let now = Utc::now();
        assert!(promo(true, Duration::days(1)).is_usable_at(now));
        assert!(!promo(false, Duration::days(1)).is_usable_at(now));
        assert!(!promo(true, Duration::days(-1)).is_usable_at(now));
    }

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_code("  save10 "), "SAVE10");
    }
}
