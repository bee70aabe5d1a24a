//! Cart totals and coupon discounts.
//!
//! `total = max(0, Σ(unit_price × quantity) − discount)`, where the discount
//! is either a flat amount or a (optionally capped) percentage of the
//! subtotal, and never more than the subtotal itself.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::{CouponKind, round_money};

/// Why a coupon cannot be applied.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CouponError {
    #[error("coupon is not active")]
    Inactive,
    #[error("coupon is not valid yet")]
    NotStarted,
    #[error("coupon has expired")]
    Expired,
    #[error("coupon usage limit reached")]
    UsageLimitReached,
    #[error("order subtotal must be at least {minimum}")]
    BelowMinimum { minimum: Decimal },
}

/// One cart line for pricing purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmount {
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl LineAmount {
    #[must_use]
    pub fn new(unit_price: Decimal, quantity: u32) -> Self {
        Self {
            unit_price,
            quantity,
        }
    }

    /// `unit_price × quantity`, rounded to paise.
    #[must_use]
    pub fn total(&self) -> Decimal {
        round_money(self.unit_price * Decimal::from(self.quantity))
    }
}

/// The parts of a coupon that affect its discount and eligibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponRule {
    pub kind: CouponKind,
    pub value: Decimal,
    pub min_order_amount: Decimal,
    pub max_discount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl CouponRule {
    /// Check everything except the amount: active flag, validity window and usage.
    ///
    /// # Errors
    ///
    /// Returns the first [`CouponError`] that applies.
    pub fn check_available(&self, now: DateTime<Utc>) -> Result<(), CouponError> {
        if !self.is_active {
            return Err(CouponError::Inactive);
        }
        if self.starts_at.is_some_and(|starts| now < starts) {
            return Err(CouponError::NotStarted);
        }
        if self.expires_at.is_some_and(|expires| now >= expires) {
            return Err(CouponError::Expired);
        }
        if self
            .usage_limit
            .is_some_and(|limit| self.used_count >= limit)
        {
            return Err(CouponError::UsageLimitReached);
        }
        Ok(())
    }

    /// Check availability and the minimum order amount together.
    ///
    /// # Errors
    ///
    /// Returns the first [`CouponError`] that applies.
    pub fn check_redeemable(&self, now: DateTime<Utc>, subtotal: Decimal) -> Result<(), CouponError> {
        self.check_available(now)?;
        if subtotal < self.min_order_amount {
            return Err(CouponError::BelowMinimum {
                minimum: self.min_order_amount,
            });
        }
        Ok(())
    }

    /// Discount this coupon gives on `subtotal`, never more than the subtotal.
    #[must_use]
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        let raw = match self.kind {
            CouponKind::Flat => self.value,
            CouponKind::Percentage => {
                let pct = subtotal * self.value / Decimal::ONE_HUNDRED;
                self.max_discount.map_or(pct, |cap| pct.min(cap))
            }
        };
        round_money(raw.max(Decimal::ZERO).min(subtotal.max(Decimal::ZERO)))
    }
}

/// Computed cart money figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub item_count: u32,
}

impl CartTotals {
    /// Price a set of lines without a coupon.
    #[must_use]
    pub fn from_lines(lines: &[LineAmount]) -> Self {
        let subtotal = lines.iter().map(LineAmount::total).sum::<Decimal>();
        let item_count = lines.iter().map(|l| l.quantity).sum();
        Self {
            subtotal,
            discount: Decimal::ZERO,
            total: subtotal.max(Decimal::ZERO),
            item_count,
        }
    }

    /// Price a set of lines with a coupon that has already been validated.
    #[must_use]
    pub fn with_coupon(lines: &[LineAmount], coupon: &CouponRule) -> Self {
        let base = Self::from_lines(lines);
        let discount = coupon.discount_for(base.subtotal);
        Self {
            discount,
            total: (base.subtotal - discount).max(Decimal::ZERO),
            ..base
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use chrono::Duration;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn coupon(kind: CouponKind, value: &str) -> CouponRule {
        CouponRule {
            kind,
            value: dec(value),
            min_order_amount: Decimal::ZERO,
            max_discount: None,
            usage_limit: None,
            used_count: 0,
            starts_at: None,
            expires_at: None,
            is_active: true,
        }
    }

    fn lines() -> Vec<LineAmount> {
        vec![
            LineAmount::new(dec("249.50"), 2),
            LineAmount::new(dec("99.00"), 1),
        ]
    }

    #[test]
    fn test_subtotal_is_sum_of_lines() {
        let totals = CartTotals::from_lines(&lines());
        assert_eq!(totals.subtotal, dec("598.00"));
        assert_eq!(totals.total, dec("598.00"));
        assert_eq!(totals.item_count, 3);
    }

    #[test]
    fn test_empty_cart() {
        let totals = CartTotals::from_lines(&[]);
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.item_count, 0);
    }

    #[test]
    fn test_flat_coupon() {
        let totals = CartTotals::with_coupon(&lines(), &coupon(CouponKind::Flat, "100"));
        assert_eq!(totals.discount, dec("100"));
        assert_eq!(totals.total, dec("498.00"));
    }

    #[test]
    fn test_flat_coupon_larger_than_subtotal_clamps_to_zero() {
        let totals = CartTotals::with_coupon(
            &[LineAmount::new(dec("50"), 1)],
            &coupon(CouponKind::Flat, "200"),
        );
        assert_eq!(totals.discount, dec("50"));
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn test_percentage_coupon_with_cap() {
        let mut rule = coupon(CouponKind::Percentage, "10");
        assert_eq!(CartTotals::with_coupon(&lines(), &rule).discount, dec("59.80"));

        rule.max_discount = Some(dec("50"));
        let totals = CartTotals::with_coupon(&lines(), &rule);
        assert_eq!(totals.discount, dec("50"));
        assert_eq!(totals.total, dec("548.00"));
    }

    #[test]
    fn test_redeemable_checks() {
        let now = Utc::now();
        let mut rule = coupon(CouponKind::Flat, "10");
        assert!(rule.check_redeemable(now, dec("1")).is_ok());

        rule.min_order_amount = dec("500");
        assert_eq!(
            rule.check_redeemable(now, dec("499.99")),
            Err(CouponError::BelowMinimum {
                minimum: dec("500")
            })
        );

        rule.min_order_amount = Decimal::ZERO;
        rule.expires_at = Some(now - Duration::minutes(1));
        assert_eq!(rule.check_redeemable(now, dec("1")), Err(CouponError::Expired));

        rule.expires_at = None;
        rule.starts_at = Some(now + Duration::days(1));
        assert_eq!(rule.check_available(now), Err(CouponError::NotStarted));

        rule.starts_at = None;
        rule.usage_limit = Some(3);
        rule.used_count = 3;
        assert_eq!(rule.check_available(now), Err(CouponError::UsageLimitReached));

        rule.is_active = false;
        assert_eq!(rule.check_available(now), Err(CouponError::Inactive));
    }
}
