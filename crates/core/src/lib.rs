//! Haat Core - Shared domain types.
//!
//! This crate provides the types used across all Haat components:
//! - `server` - Storefront, portal and admin JSON API
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Cart arithmetic and order state transitions live
//! here so they can be tested without any infrastructure.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, phone numbers, slugs, money and statuses
//! - [`pagination`] - Offset pagination for list endpoints
//! - [`pricing`] - Cart totals and coupon discounts

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod pagination;
pub mod pricing;
pub mod types;

pub use pagination::{Page, PageRequest};
pub use pricing::{CartTotals, CouponError, CouponRule, LineAmount};
pub use types::*;
