//! Money helpers shared by pricing, promocodes and payment payloads

use rust_decimal::{Decimal, RoundingStrategy};

use crate::errors::ServiceError;

/// Largest amount (in rupees) accepted for a unit price, cart or order total.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(10_000_000, 0, 0, false, 0);

/// Largest quantity accepted for a single line item.
pub const MAX_QUANTITY: u32 = 1_000;

/// Rounds to whole paise (2 decimal places, half away from zero) and pins the
/// scale at 2 so amounts always serialize as `"165.00"`.
pub fn round_money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Two-decimal string form used in UPI payloads.
pub fn format_money(amount: Decimal) -> String {
    round_money(amount).to_string()
}

/// Rejects amounts above [`MAX_AMOUNT`].
pub fn ensure_within_limit(amount: Decimal, what: &str) -> Result<(), ServiceError> {
    if amount > MAX_AMOUNT {
        return Err(ServiceError::ValidationError(format!(
            "{} cannot exceed {}",
            what, MAX_AMOUNT
        )));
    }
    Ok(())
}

pub(crate) fn amount_too_large() -> ServiceError {
    ServiceError::ValidationError("amount too large".into())
}
