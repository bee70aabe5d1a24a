//! Domain models for the marketplace.
//!
//! Models double as `sqlx` row types (`FromRow`) and JSON response bodies
//! (`Serialize`). Request bodies live next to the handlers that accept them.

pub mod blog;
pub mod cart;
pub mod catalog;
pub mod coupon;
pub mod franchise;
pub mod notification;
pub mod order;
pub mod services;
pub mod session;
pub mod user;
pub mod vendor;

pub use blog::{Author, BlogPost, BlogPostSummary};
pub use cart::{CartLine, CartView};
pub use catalog::{Category, Product};
pub use coupon::Coupon;
pub use franchise::{Franchise, FranchiseApplication};
pub use notification::Notification;
pub use order::{Order, OrderDetail, OrderItem, ShippingAddress};
pub use services::{Career, CareerApplication};
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
pub use vendor::Vendor;
