//! Orderdesk Core - Shared order types and the pricing engine.
//!
//! This crate provides the types used across all Orderdesk components:
//! - `storefront` - Order service and JSON API
//! - `cli` - Command-line tools for migrations and fulfillment updates
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Pricing lives here so that every component derives
//! money the same way.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, statuses, products, carts and orders
//! - [`pricing`] - Deterministic price snapshots for order creation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod pricing;
pub mod types;

pub use pricing::{PricedCart, PricingEngine};
pub use types::*;
