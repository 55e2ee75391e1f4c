//! Deterministic price snapshots.
//!
//! # Rounding rule
//!
//! Every amount that gets persisted is rounded to the currency's minimum unit
//! with round-half-to-even (banker's rounding,
//! [`RoundingStrategy::MidpointNearestEven`]). Effective unit prices are rounded
//! once, when the line is snapshotted. Because line totals are then exact
//! multiples of the minimum unit, the subtotal and total need no further
//! adjustment and the order invariants hold exactly:
//!
//! ```text
//! subtotal == Σ unit_price × quantity
//! total    == subtotal + shipping + tax
//! ```
//!
//! Inputs are assumed validated (positive quantity, discount in `[0, 100]`,
//! non-negative price). The engine raises no errors; sums that would leave the
//! range of [`Decimal`] come back as `None`.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::types::{CartLine, CurrencyCode, OrderLineSnapshot, Product};

/// Largest amount a money column can hold: 9,999,999,999.99 (`NUMERIC(12, 2)`).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// Lines and subtotal for a whole cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedCart {
    pub lines: Vec<OrderLineSnapshot>,
    pub subtotal: Decimal,
}

/// Pure pricing for one currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PricingEngine {
    currency: CurrencyCode,
}

impl PricingEngine {
    #[must_use]
    pub const fn new(currency: CurrencyCode) -> Self {
        Self { currency }
    }

    #[must_use]
    pub const fn currency(&self) -> CurrencyCode {
        self.currency
    }

    /// Round to the currency's minimum unit, half to even.
    #[must_use]
    pub fn round(&self, amount: Decimal) -> Decimal {
        let mut rounded = amount.round_dp_with_strategy(
            self.currency.minor_units(),
            RoundingStrategy::MidpointNearestEven,
        );
        // Keep a fixed scale so "90" and "90.00" serialize identically.
        rounded.rescale(self.currency.minor_units());
        rounded
    }

    /// `price × (1 − d/100)` when a discount is present, otherwise `price`.
    #[must_use]
    pub fn effective_price(&self, product: &Product) -> Decimal {
        // The factor is at most one, so the product cannot overflow.
        let raw = match product.discount_percent {
            Some(discount) => {
                product.price * ((Decimal::ONE_HUNDRED - discount) / Decimal::ONE_HUNDRED)
            }
            None => product.price,
        };
        self.round(raw.max(Decimal::ZERO))
    }

    /// Freeze a cart line into an order line.
    #[must_use]
    pub fn snapshot_line(&self, line: &CartLine) -> OrderLineSnapshot {
        OrderLineSnapshot {
            product_id: line.product.id,
            product_name: line.product.name.clone(),
            unit_price: self.effective_price(&line.product),
            quantity: line.quantity,
            variant: line.variant.clone(),
            image: line.product.primary_image().map(str::to_owned),
        }
    }

    /// Sum of line totals, rounded half to even. `None` on overflow.
    #[must_use]
    pub fn subtotal(&self, lines: &[OrderLineSnapshot]) -> Option<Decimal> {
        lines
            .iter()
            .try_fold(Decimal::ZERO, |acc, line| acc.checked_add(line.line_total()?))
            .map(|sum| self.round(sum))
    }

    /// `subtotal + shipping + tax`, rounded half to even. `None` on overflow.
    #[must_use]
    pub fn total(&self, subtotal: Decimal, shipping: Decimal, tax: Decimal) -> Option<Decimal> {
        subtotal
            .checked_add(shipping)?
            .checked_add(tax)
            .map(|sum| self.round(sum))
    }

    /// Snapshot every line and compute the subtotal. `None` on overflow.
    #[must_use]
    pub fn price_cart(&self, lines: &[CartLine]) -> Option<PricedCart> {
        let lines: Vec<OrderLineSnapshot> = lines.iter().map(|l| self.snapshot_line(l)).collect();
        let subtotal = self.subtotal(&lines)?;
        Some(PricedCart { lines, subtotal })
    }
}
