//! Cart operations and pricing.
//!
//! The cart stores product ids and quantities only. Prices, stock and the
//! coupon discount are recomputed from live data every time the cart is
//! viewed, so a customer always sees what checkout will charge.

use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;

use haat_core::{CartTotals, CouponError, LineAmount, ProductId, ProductStatus, UserId};

use crate::db::RepositoryError;
use crate::db::carts::{Cart, CartRepository};
use crate::db::coupons::CouponRepository;
use crate::db::products::ProductRepository;
use crate::models::{CartLine, CartView, Coupon};

/// Most units of one product a cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 99;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantity outside `1..=MAX_LINE_QUANTITY`.
    #[error("quantity must be between 1 and {MAX_LINE_QUANTITY}")]
    InvalidQuantity,

    /// Product missing or not for sale.
    #[error("product is not available")]
    ProductUnavailable,

    /// Not enough units in stock.
    #[error("only {available} left in stock")]
    InsufficientStock { available: i32 },

    /// Product is not in the cart.
    #[error("product is not in the cart")]
    NotInCart,

    /// Unknown coupon code.
    #[error("coupon code not found")]
    CouponNotFound,

    /// Coupon exists but cannot be applied.
    #[error(transparent)]
    Coupon(#[from] CouponError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Totals for `lines` with an optional coupon.
///
/// Returns the totals and, when the coupon no longer applies, the reason it
/// was ignored.
#[must_use]
pub fn price_lines(lines: &[CartLine], coupon: Option<&Coupon>) -> (CartTotals, Option<CouponError>) {
    let amounts: Vec<LineAmount> = lines.iter().map(CartLine::amount).collect();
    let base = CartTotals::from_lines(&amounts);
    let Some(coupon) = coupon else {
        return (base, None);
    };
    let rule = coupon.rule();
    match rule.check_redeemable(Utc::now(), base.subtotal) {
        Ok(()) => (CartTotals::with_coupon(&amounts, &rule), None),
        Err(e) => (base, Some(e)),
    }
}

/// Cart service.
pub struct CartService<'a> {
    carts: CartRepository<'a>,
    products: ProductRepository<'a>,
    coupons: CouponRepository<'a>,
}

impl<'a> CartService<'a> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            carts: CartRepository::new(pool),
            products: ProductRepository::new(pool),
            coupons: CouponRepository::new(pool),
        }
    }

    /// The user's priced cart. Users without a cart get an empty one.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a query fails.
    pub async fn view(&self, user_id: UserId) -> Result<CartView, CartError> {
        let Some(cart) = self.carts.get(user_id).await? else {
            return Ok(CartView {
                items: Vec::new(),
                coupon_code: None,
                coupon_error: None,
                totals: CartTotals::from_lines(&[]),
            });
        };
        self.render(&cart).await
    }

    /// Add units of a product, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductUnavailable` for inactive products and
    /// `CartError::InsufficientStock` when the merged quantity exceeds stock.
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartView, CartError> {
        if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
            return Err(CartError::InvalidQuantity);
        }
        let cart = self.carts.get_or_create(user_id).await?;
        let existing = self.carts.quantity_of(cart.id, product_id).await?;
        let merged = existing.saturating_add(quantity);
        if merged > MAX_LINE_QUANTITY {
            return Err(CartError::InvalidQuantity);
        }
        self.check_stock(product_id, merged).await?;
        self.carts.upsert_item(cart.id, product_id, merged).await?;
        self.render(&cart).await
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotInCart` if the product is not in the cart.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartView, CartError> {
        if quantity == 0 {
            return self.remove_item(user_id, product_id).await;
        }
        if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
            return Err(CartError::InvalidQuantity);
        }
        let cart = self.carts.get(user_id).await?.ok_or(CartError::NotInCart)?;
        if self.carts.quantity_of(cart.id, product_id).await? == 0 {
            return Err(CartError::NotInCart);
        }
        self.check_stock(product_id, quantity).await?;
        self.carts.upsert_item(cart.id, product_id, quantity).await?;
        self.render(&cart).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotInCart` if the product is not in the cart.
    pub async fn remove_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<CartView, CartError> {
        let cart = self.carts.get(user_id).await?.ok_or(CartError::NotInCart)?;
        if !self.carts.remove_item(cart.id, product_id).await? {
            return Err(CartError::NotInCart);
        }
        self.render(&cart).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<CartView, CartError> {
        if let Some(cart) = self.carts.get(user_id).await? {
            self.carts.clear(cart.id).await?;
        }
        self.view(user_id).await
    }

    /// Apply a coupon code after checking it against the current subtotal.
    ///
    /// # Errors
    ///
    /// Returns `CartError::CouponNotFound` or `CartError::Coupon` when the
    /// code cannot be used.
    pub async fn apply_coupon(&self, user_id: UserId, code: &str) -> Result<CartView, CartError> {
        let coupon = self
            .coupons
            .get_by_code(code)
            .await?
            .ok_or(CartError::CouponNotFound)?;
        let cart = self.carts.get_or_create(user_id).await?;
        let lines = self.carts.lines(cart.id).await?;
        let (_, coupon_error) = price_lines(&lines, Some(&coupon));
        if let Some(e) = coupon_error {
            return Err(CartError::Coupon(e));
        }
        self.carts.set_coupon(cart.id, Some(&coupon.code)).await?;
        self.view(user_id).await
    }

    /// Detach the coupon.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a query fails.
    pub async fn remove_coupon(&self, user_id: UserId) -> Result<CartView, CartError> {
        if let Some(cart) = self.carts.get(user_id).await? {
            self.carts.set_coupon(cart.id, None).await?;
        }
        self.view(user_id).await
    }

    async fn check_stock(&self, product_id: ProductId, quantity: i32) -> Result<(), CartError> {
        let product = self
            .products
            .get(product_id)
            .await?
            .filter(|p| p.status == ProductStatus::Active)
            .ok_or(CartError::ProductUnavailable)?;
        if quantity > product.stock {
            return Err(CartError::InsufficientStock {
                available: product.stock,
            });
        }
        Ok(())
    }

    async fn render(&self, cart: &Cart) -> Result<CartView, CartError> {
        let lines = self.carts.lines(cart.id).await?;
        let coupon_code = self.carts.get(cart.user_id).await?.and_then(|c| c.coupon_code);
        let coupon = match coupon_code.as_deref() {
            Some(code) => self.coupons.get_by_code(code).await?,
            None => None,
        };
        let (totals, coupon_error) = match (&coupon_code, &coupon) {
            (Some(_), None) => (
                price_lines(&lines, None).0,
                Some("coupon is no longer available".to_owned()),
            ),
            _ => {
                let (totals, err) = price_lines(&lines, coupon.as_ref());
                (totals, err.map(|e| e.to_string()))
            }
        };
        Ok(CartView {
            items: lines,
            coupon_code,
            coupon_error,
            totals,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use haat_core::{CouponId, CouponKind, Slug};

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn line(price: &str, quantity: i32) -> CartLine {
        CartLine {
            product_id: ProductId::new(1),
            vendor_id: None,
            name: "Handloom Towel".to_owned(),
            slug: Slug::parse("handloom-towel").unwrap(),
            unit_price: dec(price),
            quantity,
            stock: 10,
            status: ProductStatus::Active,
            image_url: None,
        }
    }

    fn coupon(min_order: &str) -> Coupon {
        Coupon {
            id: CouponId::new(1),
            code: "WELCOME50".to_owned(),
            description: None,
            kind: CouponKind::Flat,
            value: dec("50"),
            min_order_amount: dec(min_order),
            max_discount: None,
            usage_limit: None,
            used_count: 0,
            starts_at: None,
            expires_at: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_price_without_coupon() {
        let (totals, err) = price_lines(&[line("120.00", 2), line("60.50", 1)], None);
        assert_eq!(totals.subtotal, dec("300.50"));
        assert_eq!(totals.total, dec("300.50"));
        assert!(err.is_none());
    }

    #[test]
    fn test_price_with_applicable_coupon() {
        let (totals, err) = price_lines(&[line("120.00", 2)], Some(&coupon("200")));
        assert_eq!(totals.discount, dec("50"));
        assert_eq!(totals.total, dec("190.00"));
        assert!(err.is_none());
    }

    #[test]
    fn test_coupon_below_minimum_is_ignored_with_reason() {
        let (totals, err) = price_lines(&[line("120.00", 1)], Some(&coupon("500")));
        assert_eq!(totals.discount, Decimal::ZERO);
        assert_eq!(totals.total, dec("120.00"));
        assert!(matches!(err, Some(CouponError::BelowMinimum { .. })));
    }

    #[test]
    fn test_expired_coupon_is_ignored() {
        let mut expired = coupon("0");
        expired.expires_at = Some(Utc::now() - Duration::hours(1));
        let (totals, err) = price_lines(&[line("120.00", 1)], Some(&expired));
        assert_eq!(totals.discount, Decimal::ZERO);
        assert_eq!(err, Some(CouponError::Expired));
    }
}
