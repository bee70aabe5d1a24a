//! Shopping cart models.

use rust_decimal::Decimal;
use serde::Serialize;

use haat_core::{CartTotals, LineAmount, ProductId, ProductStatus, Slug, VendorId};

/// A cart line joined with the current product data.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CartLine {
    pub product_id: ProductId,
    pub vendor_id: Option<VendorId>,
    pub name: String,
    pub slug: Slug,
    pub unit_price: Decimal,
    pub quantity: i32,
    /// Units currently in stock, so the client can warn before checkout.
    pub stock: i32,
    pub status: ProductStatus,
    pub image_url: Option<String>,
}

impl CartLine {
    /// Pricing view of the line. Non-positive quantities price as zero.
    #[must_use]
    pub fn amount(&self) -> LineAmount {
        LineAmount::new(self.unit_price, u32::try_from(self.quantity).unwrap_or(0))
    }

    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.amount().total()
    }
}

/// Cart response body.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub coupon_code: Option<String>,
    /// Set when the stored coupon no longer applies (expired, minimum not met).
    pub coupon_error: Option<String>,
    pub totals: CartTotals,
}
