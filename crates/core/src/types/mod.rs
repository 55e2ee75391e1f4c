//! Core types for Orderdesk.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod id;
pub mod order;
pub mod price;
pub mod product;
pub mod status;

pub use address::PostalAddress;
pub use id::*;
pub use order::{NewOrder, Order, OrderLineSnapshot, OrderNumber, PaymentMethod, PaymentMethodError};
pub use price::CurrencyCode;
pub use product::{CartLine, Product, Variant};
pub use status::*;
