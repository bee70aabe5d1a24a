//! Haat marketplace server library.
//!
//! The JSON API for the storefront, the admin dashboard and the vendor,
//! franchise and author portals. The binary in `main.rs` only adds Sentry,
//! tracing and the listener; everything else is here so the router can be
//! exercised from tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use routes::app;
