//! Role and status enums, and the transitions allowed between statuses.
//!
//! Every enum is stored as a `PostgreSQL` enum type in the `haat` schema
//! (with the `postgres` feature) and serialized as `snake_case` strings.

use serde::{Deserialize, Serialize};

/// Rejected status change.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot move {entity} from {from} to {to}")]
pub struct TransitionError {
    /// What kind of record was being updated.
    pub entity: &'static str,
    /// Current status.
    pub from: &'static str,
    /// Requested status.
    pub to: &'static str,
}

/// Generates `as_str`, `Display` and `FromStr` from one list of variants.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Returns the wire/database representation.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", stringify!($name), ": {}"), s)),
                }
            }
        }
    };
}

/// Role of an account. Customers log in by OTP, everyone else by password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "haat.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Customer,
    /// Full access to the admin dashboard.
    Admin,
    /// Marketplace seller.
    Vendor,
    /// Franchise operator fulfilling orders in a territory.
    Franchise,
    /// Blog author.
    Author,
}

str_enum!(UserRole {
    Customer => "customer",
    Admin => "admin",
    Vendor => "vendor",
    Franchise => "franchise",
    Author => "author",
});

impl UserRole {
    /// Staff roles sign in with email and password.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        !matches!(self, Self::Customer)
    }
}

/// What an OTP code may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "haat.otp_purpose", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    Login,
}

str_enum!(OtpPurpose { Login => "login" });

/// Vendor onboarding status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "haat.vendor_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum VendorStatus {
    #[default]
    Pending,
    Approved,
    Suspended,
}

str_enum!(VendorStatus {
    Pending => "pending",
    Approved => "approved",
    Suspended => "suspended",
});

/// Catalog visibility of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "haat.product_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

str_enum!(ProductStatus {
    Draft => "draft",
    Active => "active",
    Archived => "archived",
});

/// How a coupon's `value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "haat.coupon_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum CouponKind {
    /// Fixed rupee amount off the subtotal.
    Flat,
    /// Percentage of the subtotal, optionally capped.
    Percentage,
}

str_enum!(CouponKind {
    Flat => "flat",
    Percentage => "percentage",
});

/// Order lifecycle.
///
/// ```text
/// pending_payment -> placed -> processing -> shipped -> delivered
///        |             |           |
///        +-------------+-----------+----> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "haat.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Waiting for the online payment to be confirmed.
    #[default]
    PendingPayment,
    Placed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

str_enum!(OrderStatus {
    PendingPayment => "pending_payment",
    Placed => "placed",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Whether the order may still be cancelled.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::PendingPayment | Self::Placed | Self::Processing)
    }

    /// Validate a status change.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when `next` is not reachable from `self`.
    pub const fn transition_to(self, next: Self) -> Result<Self, TransitionError> {
        let allowed = match next {
            Self::Cancelled => self.is_cancellable(),
            Self::Placed => matches!(self, Self::PendingPayment),
            Self::Processing => matches!(self, Self::Placed),
            Self::Shipped => matches!(self, Self::Processing),
            Self::Delivered => matches!(self, Self::Shipped),
            Self::PendingPayment => false,
        };
        if allowed {
            Ok(next)
        } else {
            Err(TransitionError {
                entity: "order",
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "haat.payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Online payment through Razorpay checkout.
    Razorpay,
    /// Cash on delivery.
    Cod,
}

str_enum!(PaymentMethod {
    Razorpay => "razorpay",
    Cod => "cod",
});

/// Payment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "haat.payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

str_enum!(PaymentStatus {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Refunded => "refunded",
});

/// Per-item fulfillment, updated by the vendor that sells the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "haat.fulfillment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    #[default]
    Pending,
    Shipped,
    Delivered,
    Cancelled,
}

str_enum!(FulfillmentStatus {
    Pending => "pending",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl FulfillmentStatus {
    /// Validate a status change.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when `next` is not reachable from `self`.
    pub const fn transition_to(self, next: Self) -> Result<Self, TransitionError> {
        let allowed = matches!(
            (self, next),
            (Self::Pending, Self::Shipped | Self::Cancelled) | (Self::Shipped, Self::Delivered)
        );
        if allowed {
            Ok(next)
        } else {
            Err(TransitionError {
                entity: "order item",
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

/// Whether a franchise currently takes orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "haat.franchise_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum FranchiseStatus {
    #[default]
    Active,
    Inactive,
}

str_enum!(FranchiseStatus {
    Active => "active",
    Inactive => "inactive",
});

/// Review status shared by franchise and career applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "haat.application_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    #[default]
    New,
    Reviewing,
    Approved,
    Rejected,
}

str_enum!(ApplicationStatus {
    New => "new",
    Reviewing => "reviewing",
    Approved => "approved",
    Rejected => "rejected",
});

impl ApplicationStatus {
    /// Approved and rejected applications are closed.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

/// Editorial status of a blog post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "haat.blog_post_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum BlogPostStatus {
    #[default]
    Draft,
    PendingReview,
    Published,
    Rejected,
}

str_enum!(BlogPostStatus {
    Draft => "draft",
    PendingReview => "pending_review",
    Published => "published",
    Rejected => "rejected",
});

impl BlogPostStatus {
    /// Authors may only edit posts that are not in review or live.
    #[must_use]
    pub const fn is_editable(self) -> bool {
        matches!(self, Self::Draft | Self::Rejected)
    }

    /// Validate a status change.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when `next` is not reachable from `self`.
    pub const fn transition_to(self, next: Self) -> Result<Self, TransitionError> {
        let allowed = match next {
            Self::PendingReview => self.is_editable(),
            Self::Published | Self::Rejected => matches!(self, Self::PendingReview),
            Self::Draft => matches!(self, Self::Published),
        };
        if allowed {
            Ok(next)
        } else {
            Err(TransitionError {
                entity: "blog post",
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_happy_path() {
        let mut status = OrderStatus::PendingPayment;
        for next in [
            OrderStatus::Placed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            status = status.transition_to(next).unwrap();
        }
        assert_eq!(status, OrderStatus::Delivered);
    }

    #[test]
    fn test_order_cannot_skip_or_go_back() {
        assert!(OrderStatus::Placed.transition_to(OrderStatus::Shipped).is_err());
        assert!(OrderStatus::Shipped.transition_to(OrderStatus::Placed).is_err());
        assert!(
            OrderStatus::Placed
                .transition_to(OrderStatus::PendingPayment)
                .is_err()
        );
    }

    #[test]
    fn test_order_cancellation_window() {
        assert!(OrderStatus::PendingPayment.transition_to(OrderStatus::Cancelled).is_ok());
        assert!(OrderStatus::Processing.transition_to(OrderStatus::Cancelled).is_ok());
        let err = OrderStatus::Shipped
            .transition_to(OrderStatus::Cancelled)
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot move order from shipped to cancelled");
        assert!(OrderStatus::Cancelled.transition_to(OrderStatus::Cancelled).is_err());
    }

    #[test]
    fn test_fulfillment_transitions() {
        assert!(
            FulfillmentStatus::Pending
                .transition_to(FulfillmentStatus::Shipped)
                .is_ok()
        );
        assert!(
            FulfillmentStatus::Pending
                .transition_to(FulfillmentStatus::Delivered)
                .is_err()
        );
        assert!(
            FulfillmentStatus::Delivered
                .transition_to(FulfillmentStatus::Cancelled)
                .is_err()
        );
    }

    #[test]
    fn test_blog_review_cycle() {
        let submitted = BlogPostStatus::Draft
            .transition_to(BlogPostStatus::PendingReview)
            .unwrap();
        let rejected = submitted.transition_to(BlogPostStatus::Rejected).unwrap();
        let resubmitted = rejected
            .transition_to(BlogPostStatus::PendingReview)
            .unwrap();
        assert_eq!(
            resubmitted.transition_to(BlogPostStatus::Published),
            Ok(BlogPostStatus::Published)
        );
        assert!(
            BlogPostStatus::Draft
                .transition_to(BlogPostStatus::Published)
                .is_err()
        );
    }

    #[test]
    fn test_str_round_trip_through_from_str() {
        for role in UserRole::ALL {
            assert_eq!(role.as_str().parse::<UserRole>().unwrap(), *role);
        }
        assert!("superuser".parse::<UserRole>().is_err());
        assert_eq!(
            serde_json::to_string(&OrderStatus::PendingPayment).unwrap(),
            "\"pending_payment\""
        );
    }

    #[test]
    fn test_staff_roles() {
        assert!(!UserRole::Customer.is_staff());
        assert!(UserRole::Vendor.is_staff());
    }
}
