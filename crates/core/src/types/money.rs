//! Money helpers.
//!
//! Amounts are `Decimal` rupees with two decimal places everywhere in the
//! application. The payment gateway wants integer paise, so conversion happens
//! once at that boundary.

use rust_decimal::{Decimal, RoundingStrategy};

/// ISO 4217 code for every amount in the marketplace.
pub const CURRENCY_CODE: &str = "INR";

/// Round to two decimal places, halves away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert rupees to paise.
///
/// Returns `None` for negative amounts or values that do not fit in an `i64`.
#[must_use]
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    if amount.is_sign_negative() {
        return None;
    }
    let paise = round_money(amount) * Decimal::ONE_HUNDRED;
    i64::try_from(paise.trunc()).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_round_money_half_up() {
        assert_eq!(
            round_money(Decimal::from_str("10.005").unwrap()),
            Decimal::from_str("10.01").unwrap()
        );
        assert_eq!(
            round_money(Decimal::from_str("10.004").unwrap()),
            Decimal::from_str("10.00").unwrap()
        );
    }

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(Decimal::from_str("499.99").unwrap()), Some(49_999));
        assert_eq!(to_minor_units(Decimal::ZERO), Some(0));
        assert_eq!(to_minor_units(Decimal::from_str("-1").unwrap()), None);
    }
}
