//! Catalog products and cart lines.
//!
//! Products are owned by the catalog; this crate only reads them. A cart line
//! pairs a product with a quantity and the shopper's selected variant.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// A catalog product as seen at pricing time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Catalog ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Unit price before discount (non-negative).
    pub price: Decimal,
    /// Optional discount percentage in `[0, 100]`.
    pub discount_percent: Option<Decimal>,
    /// Image URLs, primary image first.
    pub images: Vec<String>,
}

impl Product {
    /// Primary image URL, if the product has any images.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Whether the discount (if any) lies within `[0, 100]`.
    #[must_use]
    pub fn has_valid_discount(&self) -> bool {
        self.discount_percent
            .is_none_or(|d| d >= Decimal::ZERO && d <= Decimal::ONE_HUNDRED)
    }
}

/// Selected size/color variant for a cart line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variant {
    /// Selected size (e.g., "M").
    pub size: Option<String>,
    /// Selected color (e.g., "Forest Green").
    pub color: Option<String>,
}

/// A product in the cart with its quantity.
///
/// `quantity` is validated by the order service before a line reaches
/// the pricing engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
    pub variant: Variant,
}
