//! Business logic services.
//!
//! Services combine repositories with external providers and hold the rules
//! handlers should not care about. They borrow the pool and clients from
//! [`crate::state::AppState`] for the duration of one request.
//!
//! # Services
//!
//! - `auth` - Staff password login and account creation
//! - `otp` - Customer phone login codes
//! - `sms` - SMS provider client
//! - `payments` - Razorpay client and signature checks
//! - `cart` - Cart pricing and quantity rules
//! - `checkout` - Order placement and payment confirmation
//! - `orders` - Status changes, cancellation and vendor fulfilment
//! - `blog` - Post authoring, markdown rendering and moderation
//! - `catalog` - Cached category list
//! - `uploads` - Image upload validation and storage

pub mod auth;
pub mod blog;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod otp;
pub mod payments;
pub mod sms;
pub mod uploads;
