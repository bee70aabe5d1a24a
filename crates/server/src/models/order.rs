//! Orders and order items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use haat_core::{
    FranchiseId, FulfillmentStatus, OrderId, OrderItemId, OrderStatus, PaymentMethod,
    PaymentStatus, Phone, ProductId, UserId, VendorId,
};

/// Delivery address captured at checkout, stored as JSONB on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: Phone,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    /// Six digit Indian PIN code.
    pub pincode: String,
}

impl ShippingAddress {
    /// Check required fields and the PIN code format.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("full_name", &self.full_name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("state", &self.state),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{field} is required"));
            }
            if value.len() > 200 {
                return Err(format!("{field} is too long"));
            }
        }
        let pin_ok = self.pincode.len() == 6
            && self.pincode.chars().all(|c| c.is_ascii_digit())
            && !self.pincode.starts_with('0');
        if !pin_ok {
            return Err("pincode must be a 6 digit PIN code".to_string());
        }
        Ok(())
    }
}

/// An order header.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub franchise_id: Option<FranchiseId>,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub coupon_code: Option<String>,
    pub shipping_address: Json<ShippingAddress>,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line of an order with a snapshot of the product at purchase time.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub vendor_id: Option<VendorId>,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
    pub fulfillment_status: FulfillmentStatus,
}

/// Order with its items.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        serde_json::from_value(serde_json::json!({
            "full_name": "Anita Rao",
            "phone": "98450 12345",
            "line1": "12, 4th Cross, Indiranagar",
            "city": "Bengaluru",
            "state": "Karnataka",
            "pincode": "560038"
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_address() {
        let addr = address();
        assert_eq!(addr.phone.as_str(), "+919845012345");
        assert!(addr.line2.is_none());
        assert!(addr.validate().is_ok());
    }

    #[test]
    fn test_address_requires_fields() {
        let mut addr = address();
        addr.city = "  ".to_string();
        assert_eq!(addr.validate().unwrap_err(), "city is required");
    }

    #[test]
    fn test_address_rejects_bad_pincode() {
        for pin in ["56003", "5600381", "056003", "56OO38"] {
            let mut addr = address();
            addr.pincode = pin.to_string();
            assert!(addr.validate().is_err(), "{pin}");
        }
    }
}
