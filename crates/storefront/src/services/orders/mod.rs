//! Order service.
//!
//! Turns a cart into a priced, persisted order and governs the order's
//! lifecycle. Every operation takes the caller's [`Identity`] explicitly and
//! scopes all reads and writes to it.
//!
//! Status changes are compare-and-set against the status that was read, so a
//! concurrent fulfillment update cannot slip past the guard.

mod cart;
mod error;
pub mod ports;

pub use cart::{CartInput, CartItemInput, CreateOrderRequest, MAX_IDEMPOTENCY_KEY_LEN};
pub use error::OrderError;
pub use ports::{AuthGateway, Catalog, GatewayError, Identity, OrderStore};

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use rust_decimal::Decimal;
use tracing::instrument;

use orderdesk_core::pricing::MAX_AMOUNT;
use orderdesk_core::{
    CartLine, NewOrder, Order, OrderId, OrderNumber, OrderStatus, PostalAddress, PricingEngine,
};

use crate::config::OrderPolicy;
use crate::db::RepositoryError;

/// Attempts at finding an unused order number before giving up.
const MAX_ORDER_NUMBER_ATTEMPTS: usize = 3;

/// Characters used in order number suffixes (no 0/O or 1/I).
const ORDER_NUMBER_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ORDER_NUMBER_SUFFIX_LEN: usize = 6;

/// Order creation, retrieval, listing and cancellation.
///
/// Cheap to clone; collaborators are shared behind `Arc`.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    catalog: Arc<dyn Catalog>,
    pricing: PricingEngine,
    policy: OrderPolicy,
}

impl OrderService {
    /// Create a new order service.
    #[must_use]
    pub fn new(store: Arc<dyn OrderStore>, catalog: Arc<dyn Catalog>, policy: OrderPolicy) -> Self {
        Self {
            store,
            catalog,
            pricing: PricingEngine::new(policy.currency),
            policy,
        }
    }

    #[must_use]
    pub const fn policy(&self) -> &OrderPolicy {
        &self.policy
    }

    /// Ask the identity provider who is calling.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Transient` if the provider fails or times out.
    pub async fn resolve_identity(
        &self,
        gateway: &dyn AuthGateway,
    ) -> Result<Option<Identity>, OrderError> {
        self.call("current_identity", gateway.current_identity())
            .await
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Price the cart and persist a new `pending` order.
    ///
    /// The subtotal and total are always computed here; client figures are
    /// compared and logged, never stored. With an idempotency key, repeating
    /// the call returns the order created by the first call.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Unauthorized` without an identity.
    /// Returns `OrderError::InvalidRequest` for an empty cart, bad quantities,
    /// unknown products, negative or oversized amounts, or missing address
    /// fields.
    /// Returns `OrderError::Transient` if a collaborator times out.
    #[instrument(
        skip(self, request, identity),
        fields(user_id = ?identity.map(|i| i.user_id), items = request.cart.items.len())
    )]
    pub async fn create(
        &self,
        request: CreateOrderRequest,
        identity: Option<&Identity>,
    ) -> Result<Order, OrderError> {
        let identity = require_identity(identity)?;
        self.validate(&request)?;

        if let Some(key) = request.idempotency_key.as_deref()
            && let Some(existing) = self
                .call(
                    "find_by_idempotency_key",
                    self.store.find_by_idempotency_key(identity.user_id, key),
                )
                .await?
        {
            tracing::info!(order_id = %existing.id, "returning order for repeated idempotency key");
            return Ok(existing);
        }

        let cart_lines = self.load_cart_lines(&request).await?;
        let shipping = request.cart.shipping;
        let tax = request.cart.tax;
        let (priced, total) = self
            .pricing
            .price_cart(&cart_lines)
            .and_then(|priced| {
                let total = self.pricing.total(priced.subtotal, shipping, tax)?;
                Some((priced, total))
            })
            .filter(|(_, total)| *total <= MAX_AMOUNT)
            .ok_or_else(|| OrderError::invalid(format!("order total exceeds {MAX_AMOUNT}")))?;

        check_client_hints(&request, priced.subtotal, total);
        self.check_expected_ranges(priced.subtotal, shipping, tax);

        let created_at = Utc::now();
        let draft = NewOrder {
            user_id: identity.user_id,
            order_number: generate_order_number(created_at),
            currency: self.pricing.currency(),
            subtotal: priced.subtotal,
            shipping: self.pricing.round(shipping),
            tax: self.pricing.round(tax),
            total,
            shipping_address: request.shipping_address,
            billing_address: request.billing_address,
            payment_method: request.payment_method,
            lines: priced.lines,
            idempotency_key: request.idempotency_key,
            created_at,
        };

        let order = self.insert_with_fresh_number(draft).await?;
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            "order created"
        );
        Ok(order)
    }

    fn validate(&self, request: &CreateOrderRequest) -> Result<(), OrderError> {
        let cart = &request.cart;
        if cart.items.is_empty() {
            return Err(OrderError::invalid("cart is empty"));
        }

        for item in &cart.items {
            if item.quantity <= 0 {
                return Err(OrderError::invalid(format!(
                    "quantity for product {} must be positive",
                    item.product_id
                )));
            }
            if item.quantity > i64::from(self.policy.max_line_quantity) {
                return Err(OrderError::invalid(format!(
                    "quantity for product {} exceeds {}",
                    item.product_id, self.policy.max_line_quantity
                )));
            }
        }

        self.validate_amount("shipping", cart.shipping)?;
        self.validate_amount("tax", cart.tax)?;
        validate_address("shipping_address", &request.shipping_address)?;
        validate_address("billing_address", &request.billing_address)?;

        if let Some(key) = request.idempotency_key.as_deref()
            && (key.trim().is_empty() || key.chars().count() > MAX_IDEMPOTENCY_KEY_LEN)
        {
            return Err(OrderError::invalid(format!(
                "idempotency_key must be 1-{MAX_IDEMPOTENCY_KEY_LEN} characters"
            )));
        }

        Ok(())
    }

    fn validate_amount(&self, field: &str, amount: Decimal) -> Result<(), OrderError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(OrderError::invalid(format!("{field} cannot be negative")));
        }
        if amount > MAX_AMOUNT {
            return Err(OrderError::invalid(format!("{field} exceeds {MAX_AMOUNT}")));
        }
        if self.pricing.round(amount) != amount {
            return Err(OrderError::invalid(format!(
                "{field} has more than {} decimal places",
                self.pricing.currency().minor_units()
            )));
        }
        Ok(())
    }

    /// Resolve every cart item against the catalog.
    async fn load_cart_lines(&self, request: &CreateOrderRequest) -> Result<Vec<CartLine>, OrderError> {
        let mut lines = Vec::with_capacity(request.cart.items.len());
        for item in &request.cart.items {
            let product = self
                .call("get_product", self.catalog.get_product(item.product_id))
                .await?
                .ok_or_else(|| OrderError::invalid(format!("unknown product {}", item.product_id)))?;

            if product.price.is_sign_negative() && !product.price.is_zero() {
                tracing::error!(product_id = %product.id, price = %product.price, "catalog returned negative price");
                return Err(OrderError::invalid(format!(
                    "product {} has an invalid price",
                    product.id
                )));
            }
            if !product.has_valid_discount() {
                tracing::error!(product_id = %product.id, discount = ?product.discount_percent, "catalog returned discount outside 0-100");
                return Err(OrderError::invalid(format!(
                    "product {} has an invalid discount",
                    product.id
                )));
            }

            let quantity = u32::try_from(item.quantity)
                .map_err(|_| OrderError::invalid("quantity out of range"))?;
            lines.push(CartLine {
                variant: item.variant(),
                product,
                quantity,
            });
        }
        Ok(lines)
    }

    fn check_expected_ranges(&self, subtotal: Decimal, shipping: Decimal, tax: Decimal) {
        if shipping > self.policy.max_expected_shipping {
            tracing::warn!(
                shipping = %shipping,
                max_expected = %self.policy.max_expected_shipping,
                "shipping above expected range"
            );
        }
        if let Some(max_tax) = subtotal.checked_mul(self.policy.max_expected_tax_rate)
            && let Some(max_tax) = max_tax.checked_div(Decimal::ONE_HUNDRED)
            && tax > max_tax
        {
            tracing::warn!(tax = %tax, max_expected = %max_tax, "tax above expected range");
        }
    }

    async fn insert_with_fresh_number(&self, mut draft: NewOrder) -> Result<Order, OrderError> {
        for attempt in 1..=MAX_ORDER_NUMBER_ATTEMPTS {
            match self.with_timeout("insert", self.store.insert(draft.clone())).await? {
                Ok(order) => return Ok(order),
                Err(RepositoryError::DuplicateOrderNumber) => {
                    tracing::debug!(attempt, order_number = %draft.order_number, "order number collision");
                    draft.order_number = generate_order_number(draft.created_at);
                }
                Err(RepositoryError::DuplicateIdempotencyKey) => {
                    // Lost a race with an identical request; hand back the winner.
                    let key = draft.idempotency_key.as_deref().unwrap_or_default();
                    return self
                        .call(
                            "find_by_idempotency_key",
                            self.store.find_by_idempotency_key(draft.user_id, key),
                        )
                        .await?
                        .ok_or_else(|| {
                            OrderError::Internal("idempotent order vanished after conflict".to_owned())
                        });
                }
                Err(other) => return Err(other.into()),
            }
        }

        tracing::error!(attempts = MAX_ORDER_NUMBER_ATTEMPTS, "could not allocate a unique order number");
        Err(OrderError::Internal("could not allocate order number".to_owned()))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Fetch one of the caller's orders.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Unauthorized` without an identity.
    /// Returns `OrderError::NotFound` if the order does not exist or belongs to
    /// someone else; the two cases are indistinguishable.
    #[instrument(skip(self, identity), fields(user_id = ?identity.map(|i| i.user_id)))]
    pub async fn get_by_id(
        &self,
        order_id: OrderId,
        identity: Option<&Identity>,
    ) -> Result<Order, OrderError> {
        let identity = require_identity(identity)?;
        self.load_owned(order_id, identity).await
    }

    /// The caller's orders, newest first. Empty when there are none.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Unauthorized` without an identity.
    #[instrument(skip(self, identity), fields(user_id = ?identity.map(|i| i.user_id)))]
    pub async fn list_for_user(&self, identity: Option<&Identity>) -> Result<Vec<Order>, OrderError> {
        let identity = require_identity(identity)?;
        self.call(
            "find_by_user_newest_first",
            self.store.find_by_user_newest_first(identity.user_id),
        )
        .await
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Cancel one of the caller's orders.
    ///
    /// Allowed from `pending` or `processing`. The write only lands if the
    /// status is unchanged since it was read; of two concurrent cancels,
    /// exactly one succeeds.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Unauthorized` / `OrderError::NotFound` as for
    /// [`Self::get_by_id`].
    /// Returns `OrderError::InvalidStateTransition` carrying the current status
    /// when the order can no longer be cancelled.
    #[instrument(skip(self, identity), fields(user_id = ?identity.map(|i| i.user_id)))]
    pub async fn cancel(
        &self,
        order_id: OrderId,
        identity: Option<&Identity>,
    ) -> Result<Order, OrderError> {
        let identity = require_identity(identity)?;
        let order = self.load_owned(order_id, identity).await?;

        if !order.status.is_cancellable() {
            return Err(OrderError::InvalidStateTransition {
                current: order.status,
            });
        }

        let order = self.compare_and_set(order, OrderStatus::Cancelled).await?;
        tracing::info!(order_id = %order.id, "order cancelled");
        Ok(order)
    }

    /// Move an order one step along `pending → processing → shipped → delivered`.
    ///
    /// Entry point for the fulfillment process, which is trusted and not
    /// scoped to a customer. Cancellation goes through [`Self::cancel`].
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order does not exist.
    /// Returns `OrderError::InvalidRequest` if `to` is `cancelled`.
    /// Returns `OrderError::InvalidStateTransition` if `to` is not the next
    /// step from the current status.
    #[instrument(skip(self))]
    pub async fn advance_status(&self, order_id: OrderId, to: OrderStatus) -> Result<Order, OrderError> {
        if to == OrderStatus::Cancelled {
            return Err(OrderError::invalid("use cancel to cancel an order"));
        }

        let order = self
            .call("find_by_id", self.store.find_by_id(order_id))
            .await?
            .ok_or(OrderError::NotFound)?;

        if !order.status.can_transition_to(to) {
            return Err(OrderError::InvalidStateTransition {
                current: order.status,
            });
        }

        let order = self.compare_and_set(order, to).await?;
        tracing::info!(order_id = %order.id, status = %order.status, "order status advanced");
        Ok(order)
    }

    /// Write `to` if the stored status still matches `order.status`.
    async fn compare_and_set(&self, mut order: Order, to: OrderStatus) -> Result<Order, OrderError> {
        let at = Utc::now();
        let written = self
            .call(
                "update_status",
                self.store.update_status(order.id, order.status, to, at),
            )
            .await?;

        if written {
            order.status = to;
            order.updated_at = Some(at);
            return Ok(order);
        }

        // Lost the race: report what the order turned into.
        let current = self
            .call("find_by_id", self.store.find_by_id(order.id))
            .await?
            .map_or(order.status, |o| o.status);
        tracing::info!(order_id = %order.id, expected = %order.status, current = %current, "status changed concurrently");
        Err(OrderError::InvalidStateTransition { current })
    }

    async fn load_owned(&self, order_id: OrderId, identity: &Identity) -> Result<Order, OrderError> {
        let order = self
            .call("find_by_id", self.store.find_by_id(order_id))
            .await?;

        match order {
            Some(order) if order.is_owned_by(identity.user_id) => Ok(order),
            Some(_) => {
                tracing::debug!(%order_id, "order requested by non-owner");
                Err(OrderError::NotFound)
            }
            None => Err(OrderError::NotFound),
        }
    }

    // =========================================================================
    // Collaborator calls
    // =========================================================================

    /// Bound a collaborator call by the configured timeout.
    async fn with_timeout<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = T> + Send,
    ) -> Result<T, OrderError> {
        tokio::time::timeout(self.policy.store_timeout, fut)
            .await
            .map_err(|_| {
                tracing::warn!(op, timeout_ms = ?self.policy.store_timeout.as_millis(), "collaborator call timed out");
                OrderError::Transient(format!("{op} timed out"))
            })
    }

    async fn call<T, E>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, E>> + Send,
    ) -> Result<T, OrderError>
    where
        OrderError: From<E>,
    {
        self.with_timeout(op, fut).await?.map_err(OrderError::from)
    }
}

fn require_identity(identity: Option<&Identity>) -> Result<&Identity, OrderError> {
    identity.ok_or(OrderError::Unauthorized)
}

fn validate_address(field: &str, address: &PostalAddress) -> Result<(), OrderError> {
    let missing = address.missing_fields();
    if missing.is_empty() {
        return Ok(());
    }
    Err(OrderError::invalid(format!(
        "{field} is missing {}",
        missing.join(", ")
    )))
}

fn check_client_hints(request: &CreateOrderRequest, subtotal: Decimal, total: Decimal) {
    if let Some(client) = request.cart.subtotal
        && client != subtotal
    {
        tracing::warn!(client_subtotal = %client, subtotal = %subtotal, "client subtotal differs from server price");
    }
    if let Some(client) = request.cart.total
        && client != total
    {
        tracing::warn!(client_total = %client, total = %total, "client total differs from server price");
    }
}

fn generate_order_number(created_at: DateTime<Utc>) -> OrderNumber {
    let mut rng = rand::rng();
    let suffix: String = (0..ORDER_NUMBER_SUFFIX_LEN)
        .filter_map(|_| ORDER_NUMBER_ALPHABET.choose(&mut rng))
        .map(|&b| char::from(b))
        .collect();
    OrderNumber::new(created_at, &suffix)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests;
