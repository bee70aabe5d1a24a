//! Core types for Haat.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod phone;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{CURRENCY_CODE, round_money, to_minor_units};
pub use phone::{Phone, PhoneError};
pub use slug::{Slug, SlugError};
pub use status::*;
