//! Marketplace vendors.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use haat_core::{Slug, UserId, VendorId, VendorStatus};

/// A seller account, owned by one user with the vendor role.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Vendor {
    pub id: VendorId,
    pub user_id: UserId,
    pub business_name: String,
    pub slug: Slug,
    pub gst_number: Option<String>,
    pub status: VendorStatus,
    /// Marketplace commission in percent of item revenue.
    pub commission_rate: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validate a 15 character GSTIN (state code, PAN, entity, `Z`, checksum).
///
/// Only the shape is checked; the checksum is verified by the tax portal.
#[must_use]
pub fn is_valid_gstin(gstin: &str) -> bool {
    let bytes = gstin.as_bytes();
    if bytes.len() != 15 {
        return false;
    }
    let shape = |range: std::ops::Range<usize>, pred: fn(&u8) -> bool| {
        bytes.get(range).is_some_and(|s| s.iter().all(pred))
    };
    shape(0..2, u8::is_ascii_digit)
        && shape(2..7, u8::is_ascii_uppercase)
        && shape(7..11, u8::is_ascii_digit)
        && shape(11..12, u8::is_ascii_uppercase)
        && shape(12..13, u8::is_ascii_alphanumeric)
        && bytes.get(13) == Some(&b'Z')
        && shape(14..15, u8::is_ascii_alphanumeric)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gstin_shape() {
        assert!(is_valid_gstin("29ABCDE1234F1Z5"));
        assert!(!is_valid_gstin("29abcde1234f1z5"));
        assert!(!is_valid_gstin("29ABCDE1234F1Y5"));
        assert!(!is_valid_gstin("29ABCDE1234F1Z"));
    }
}
