//! Business logic services for the storefront.
//!
//! - `orders` - Checkout, order history, cancellation and fulfillment
//!   status progression.

pub mod orders;
