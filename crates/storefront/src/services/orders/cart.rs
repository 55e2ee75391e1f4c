//! Checkout request payloads.
//!
//! These arrive from the client. Quantities are signed so that a negative
//! value is reported as a bad request instead of failing deserialization, and
//! client-computed subtotal/total are kept only as hints.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use orderdesk_core::{PaymentMethod, PostalAddress, ProductId, Variant};

/// Longest accepted idempotency key, in characters.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 64;

/// One cart line as submitted by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemInput {
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl CartItemInput {
    #[must_use]
    pub fn variant(&self) -> Variant {
        Variant {
            size: self.size.clone(),
            color: self.color.clone(),
        }
    }
}

/// The client's cart with collaborator-supplied shipping and tax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartInput {
    pub items: Vec<CartItemInput>,
    pub shipping: Decimal,
    pub tax: Decimal,
    /// Client-computed subtotal. Display hint only.
    #[serde(default)]
    pub subtotal: Option<Decimal>,
    /// Client-computed total. Display hint only.
    #[serde(default)]
    pub total: Option<Decimal>,
}

/// Everything needed to place an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub cart: CartInput,
    pub shipping_address: PostalAddress,
    pub billing_address: PostalAddress,
    pub payment_method: PaymentMethod,
    /// Client-chosen key that makes retries of the same checkout safe.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}
