//! Persisted order records.
//!
//! An [`Order`] is write-once except for `status` and `updated_at`. Line items
//! are [`OrderLineSnapshot`]s: frozen copies of catalog data taken when the
//! order was created, so later catalog edits never change order history.

use core::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::address::PostalAddress;
use super::id::{OrderId, ProductId, UserId};
use super::price::CurrencyCode;
use super::product::Variant;
use super::status::OrderStatus;

/// Denormalized copy of a cart line at order-creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineSnapshot {
    pub product_id: ProductId,
    pub product_name: String,
    /// Post-discount unit price, rounded to the currency's minimum unit.
    pub unit_price: Decimal,
    pub quantity: u32,
    pub variant: Variant,
    pub image: Option<String>,
}

impl OrderLineSnapshot {
    /// `unit_price * quantity`, or `None` if it overflows.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Errors that can occur when parsing a [`PaymentMethod`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown payment method: {0}")]
pub struct PaymentMethodError(pub String);

/// Payment method tag selected at checkout.
///
/// This is a label only; capturing payment happens elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    Paypal,
    ApplePay,
    GooglePay,
    CashOnDelivery,
}

impl PaymentMethod {
    /// Wire name stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreditCard => "credit_card",
            Self::Paypal => "paypal",
            Self::ApplePay => "apple_pay",
            Self::GooglePay => "google_pay",
            Self::CashOnDelivery => "cash_on_delivery",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = PaymentMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit_card" => Ok(Self::CreditCard),
            "paypal" => Ok(Self::Paypal),
            "apple_pay" => Ok(Self::ApplePay),
            "google_pay" => Ok(Self::GooglePay),
            "cash_on_delivery" => Ok(Self::CashOnDelivery),
            _ => Err(PaymentMethodError(s.to_owned())),
        }
    }
}

/// Human-readable order number (e.g., `OD-20261019-7KQ3ZP`).
///
/// Generated by the order service; unique across all orders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Prefix shared by all order numbers.
    pub const PREFIX: &'static str = "OD";

    /// Build an order number from its date and random suffix.
    #[must_use]
    pub fn new(created_at: DateTime<Utc>, suffix: &str) -> Self {
        Self(format!(
            "{}-{}-{suffix}",
            Self::PREFIX,
            created_at.format("%Y%m%d")
        ))
    }

    /// Wrap a stored order number.
    #[must_use]
    pub const fn from_stored(value: String) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An order ready to be inserted; the store assigns `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub order_number: OrderNumber,
    pub currency: CurrencyCode,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub shipping_address: PostalAddress,
    pub billing_address: PostalAddress,
    pub payment_method: PaymentMethod,
    pub lines: Vec<OrderLineSnapshot>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    /// Attach the store-assigned ID. New orders always start `pending`.
    #[must_use]
    pub fn into_order(self, id: OrderId) -> Order {
        Order {
            id,
            user_id: self.user_id,
            order_number: self.order_number,
            status: OrderStatus::Pending,
            currency: self.currency,
            subtotal: self.subtotal,
            shipping: self.shipping,
            tax: self.tax,
            total: self.total,
            shipping_address: self.shipping_address,
            billing_address: self.billing_address,
            payment_method: self.payment_method,
            lines: self.lines,
            idempotency_key: self.idempotency_key,
            created_at: self.created_at,
            updated_at: None,
        }
    }
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Owning user. Never changes after creation.
    pub user_id: UserId,
    pub order_number: OrderNumber,
    pub status: OrderStatus,
    pub currency: CurrencyCode,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    /// Always `subtotal + shipping + tax`.
    pub total: Decimal,
    pub shipping_address: PostalAddress,
    pub billing_address: PostalAddress,
    pub payment_method: PaymentMethod,
    pub lines: Vec<OrderLineSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set on the first status transition.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Whether the stored money fields reconcile with the line snapshots.
    #[must_use]
    pub fn totals_reconcile(&self) -> bool {
        let lines = self
            .lines
            .iter()
            .try_fold(Decimal::ZERO, |acc, line| acc.checked_add(line.line_total()?));
        let total = self
            .subtotal
            .checked_add(self.shipping)
            .and_then(|sum| sum.checked_add(self.tax));
        lines == Some(self.subtotal) && total == Some(self.total)
    }

    /// Whether `user_id` owns this order.
    #[must_use]
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}
