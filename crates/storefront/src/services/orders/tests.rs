use std::time::Duration;

use async_trait::async_trait;
use orderdesk_core::{PaymentMethod, Product, ProductId, UserId};

use super::*;
use crate::db::{InMemoryCatalog, InMemoryOrderStore};

// =============================================================================
// Fixtures
// =============================================================================

struct Harness {
    service: OrderService,
    store: Arc<InMemoryOrderStore>,
    catalog: Arc<InMemoryCatalog>,
}

fn harness() -> Harness {
    harness_with_policy(OrderPolicy::default())
}

fn harness_with_policy(policy: OrderPolicy) -> Harness {
    let store = Arc::new(InMemoryOrderStore::new());
    let catalog = Arc::new(InMemoryCatalog::with_products([
        product(1, "Linen Shirt", Decimal::new(10000, 2), Some(Decimal::from(10))),
        product(2, "Canvas Tote", Decimal::new(1999, 2), None),
    ]));
    let service = OrderService::new(store.clone(), catalog.clone(), policy);
    Harness {
        service,
        store,
        catalog,
    }
}

fn product(id: i64, name: &str, price: Decimal, discount: Option<Decimal>) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_owned(),
        price,
        discount_percent: discount,
        images: vec![format!("https://cdn.example.com/{id}.jpg")],
    }
}

fn address() -> PostalAddress {
    PostalAddress {
        first_name: "Ada".to_owned(),
        last_name: "Lovelace".to_owned(),
        address1: "1 Main St".to_owned(),
        address2: None,
        city: "Springfield".to_owned(),
        province: "IL".to_owned(),
        zip: "62701".to_owned(),
        country: "US".to_owned(),
        phone: None,
    }
}

fn item(product_id: i64, quantity: i64) -> CartItemInput {
    CartItemInput {
        product_id: ProductId::new(product_id),
        quantity,
        size: Some("M".to_owned()),
        color: None,
    }
}

fn request(items: Vec<CartItemInput>) -> CreateOrderRequest {
    CreateOrderRequest {
        cart: CartInput {
            items,
            shipping: Decimal::new(500, 2),
            tax: Decimal::new(840, 2),
            subtotal: None,
            total: None,
        },
        shipping_address: address(),
        billing_address: address(),
        payment_method: PaymentMethod::CreditCard,
        idempotency_key: None,
    }
}

fn alice() -> Identity {
    Identity::new(UserId::new(1))
}

fn bob() -> Identity {
    Identity::new(UserId::new(2))
}

// =============================================================================
// Create
// =============================================================================

#[tokio::test]
async fn test_create_prices_discounted_line() {
    let h = harness();
    let order = h
        .service
        .create(request(vec![item(1, 2)]), Some(&alice()))
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.user_id, alice().user_id);
    assert_eq!(order.lines.len(), 1);
    assert_eq!(order.lines[0].unit_price, Decimal::new(9000, 2));
    assert_eq!(order.lines[0].quantity, 2);
    assert_eq!(order.lines[0].product_name, "Linen Shirt");
    assert_eq!(order.subtotal, Decimal::new(18000, 2));
    assert_eq!(order.shipping, Decimal::new(500, 2));
    assert_eq!(order.tax, Decimal::new(840, 2));
    assert_eq!(order.total, Decimal::new(19340, 2));
    assert!(order.totals_reconcile());
    assert!(order.updated_at.is_none());
    assert!(order.order_number.as_str().starts_with("OD-"));
}

#[tokio::test]
async fn test_create_ignores_client_totals() {
    let h = harness();
    let mut req = request(vec![item(1, 2)]);
    req.cart.subtotal = Some(Decimal::new(1, 2));
    req.cart.total = Some(Decimal::new(1, 2));

    let order = h.service.create(req, Some(&alice())).await.unwrap();
    assert_eq!(order.subtotal, Decimal::new(18000, 2));
    assert_eq!(order.total, Decimal::new(19340, 2));
}

#[tokio::test]
async fn test_create_keeps_variant_and_image() {
    let h = harness();
    let order = h
        .service
        .create(request(vec![item(2, 1)]), Some(&alice()))
        .await
        .unwrap();

    let line = &order.lines[0];
    assert_eq!(line.variant.size.as_deref(), Some("M"));
    assert_eq!(line.image.as_deref(), Some("https://cdn.example.com/2.jpg"));
}

#[tokio::test]
async fn test_create_requires_identity() {
    let h = harness();
    let err = h
        .service
        .create(request(vec![item(1, 1)]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Unauthorized));
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn test_create_empty_cart_writes_nothing() {
    let h = harness();
    let err = h
        .service
        .create(request(Vec::new()), Some(&alice()))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidRequest(_)));
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn test_create_rejects_bad_quantities() {
    let h = harness();
    for quantity in [0, -3, 1000] {
        let err = h
            .service
            .create(request(vec![item(1, quantity)]), Some(&alice()))
            .await
            .unwrap_err();
        assert!(
            matches!(err, OrderError::InvalidRequest(_)),
            "quantity {quantity} should be rejected"
        );
    }
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn test_create_rejects_unknown_product() {
    let h = harness();
    let err = h
        .service
        .create(request(vec![item(1, 1), item(42, 1)]), Some(&alice()))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidRequest(msg) if msg.contains("42")));
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn test_create_rejects_negative_or_fractional_amounts() {
    let h = harness();

    let mut req = request(vec![item(1, 1)]);
    req.cart.shipping = Decimal::new(-100, 2);
    let err = h.service.create(req, Some(&alice())).await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidRequest(_)));

    let mut req = request(vec![item(1, 1)]);
    req.cart.tax = Decimal::new(1005, 3);
    let err = h.service.create(req, Some(&alice())).await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_create_rejects_amounts_above_column_range() {
    let h = harness();

    let mut req = request(vec![item(1, 1)]);
    req.cart.shipping = Decimal::MAX;
    req.cart.tax = Decimal::ONE;
    let err = h.service.create(req, Some(&alice())).await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidRequest(msg) if msg.contains("shipping")));

    let mut req = request(vec![item(1, 1)]);
    req.cart.tax = MAX_AMOUNT + Decimal::new(1, 2);
    let err = h.service.create(req, Some(&alice())).await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidRequest(msg) if msg.contains("tax")));

    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn test_create_rejects_total_above_column_range() {
    let h = harness();
    h.catalog
        .upsert(product(3, "Vault", MAX_AMOUNT, None))
        .await;

    // Each amount fits, their sum does not.
    let err = h
        .service
        .create(request(vec![item(3, 1)]), Some(&alice()))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidRequest(msg) if msg.contains("total")));

    h.catalog
        .upsert(product(4, "Overflow", Decimal::MAX, None))
        .await;
    let err = h
        .service
        .create(request(vec![item(4, 2)]), Some(&alice()))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidRequest(_)));

    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn test_create_rejects_incomplete_address() {
    let h = harness();
    let mut req = request(vec![item(1, 1)]);
    req.billing_address.zip = "  ".to_owned();

    let err = h.service.create(req, Some(&alice())).await.unwrap_err();
    assert!(
        matches!(err, OrderError::InvalidRequest(msg) if msg.contains("billing_address") && msg.contains("zip"))
    );
}

#[tokio::test]
async fn test_create_rejects_invalid_catalog_discount() {
    let h = harness();
    h.catalog
        .upsert(product(3, "Broken", Decimal::TEN, Some(Decimal::from(150))))
        .await;

    let err = h
        .service
        .create(request(vec![item(3, 1)]), Some(&alice()))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_create_accepts_out_of_range_tax_and_shipping() {
    let h = harness();
    let mut req = request(vec![item(2, 1)]);
    req.cart.shipping = Decimal::new(25000, 2);
    req.cart.tax = Decimal::new(5000, 2);

    let order = h.service.create(req, Some(&alice())).await.unwrap();
    assert_eq!(order.total, Decimal::new(1999 + 25000 + 5000, 2));
}

#[tokio::test]
async fn test_idempotency_key_returns_first_order() {
    let h = harness();
    let mut req = request(vec![item(1, 1)]);
    req.idempotency_key = Some("checkout-123".to_owned());

    let first = h.service.create(req.clone(), Some(&alice())).await.unwrap();
    let second = h.service.create(req.clone(), Some(&alice())).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(h.store.len().await, 1);

    // Same key from another user is a different order.
    let other = h.service.create(req, Some(&bob())).await.unwrap();
    assert_ne!(other.id, first.id);
    assert_eq!(h.store.len().await, 2);
}

#[tokio::test]
async fn test_idempotency_key_length_checked() {
    let h = harness();
    let mut req = request(vec![item(1, 1)]);
    req.idempotency_key = Some("k".repeat(MAX_IDEMPOTENCY_KEY_LEN + 1));

    let err = h.service.create(req, Some(&alice())).await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_idempotency_key_length_counts_characters() {
    let h = harness();

    // 64 characters, 128 bytes.
    let mut req = request(vec![item(1, 1)]);
    req.idempotency_key = Some("é".repeat(MAX_IDEMPOTENCY_KEY_LEN));
    h.service.create(req, Some(&alice())).await.unwrap();

    let mut req = request(vec![item(1, 1)]);
    req.idempotency_key = Some("é".repeat(MAX_IDEMPOTENCY_KEY_LEN + 1));
    let err = h.service.create(req, Some(&alice())).await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_snapshot_survives_catalog_change() {
    let h = harness();
    let order = h
        .service
        .create(request(vec![item(1, 2)]), Some(&alice()))
        .await
        .unwrap();

    h.catalog
        .upsert(product(1, "Linen Shirt v2", Decimal::from(250), None))
        .await;
    h.catalog.remove(ProductId::new(2)).await;

    let reloaded = h.service.get_by_id(order.id, Some(&alice())).await.unwrap();
    assert_eq!(reloaded.lines, order.lines);
    assert_eq!(reloaded.lines[0].unit_price, Decimal::new(9000, 2));
    assert_eq!(reloaded.lines[0].product_name, "Linen Shirt");
    assert_eq!(reloaded.total, Decimal::new(19340, 2));
}

// =============================================================================
// Queries
// =============================================================================

#[tokio::test]
async fn test_get_by_id_hides_other_users_orders() {
    let h = harness();
    let order = h
        .service
        .create(request(vec![item(1, 1)]), Some(&alice()))
        .await
        .unwrap();

    let err = h
        .service
        .get_by_id(order.id, Some(&bob()))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::NotFound));

    let missing = h
        .service
        .get_by_id(OrderId::new(9999), Some(&bob()))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), missing.to_string());
}

#[tokio::test]
async fn test_get_by_id_requires_identity() {
    let h = harness();
    let err = h.service.get_by_id(OrderId::new(1), None).await.unwrap_err();
    assert!(matches!(err, OrderError::Unauthorized));
}

#[tokio::test]
async fn test_list_newest_first_and_scoped() {
    let h = harness();
    let first = h
        .service
        .create(request(vec![item(1, 1)]), Some(&alice()))
        .await
        .unwrap();
    h.service
        .create(request(vec![item(2, 1)]), Some(&bob()))
        .await
        .unwrap();
    let second = h
        .service
        .create(request(vec![item(2, 3)]), Some(&alice()))
        .await
        .unwrap();

    let ids: Vec<OrderId> = h
        .service
        .list_for_user(Some(&alice()))
        .await
        .unwrap()
        .iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(ids, vec![second.id, first.id]);
}

#[tokio::test]
async fn test_list_empty_for_new_user() {
    let h = harness();
    let orders = h.service.list_for_user(Some(&bob())).await.unwrap();
    assert!(orders.is_empty());
}

// =============================================================================
// Cancel
// =============================================================================

#[tokio::test]
async fn test_cancel_pending_order() {
    let h = harness();
    let order = h
        .service
        .create(request(vec![item(1, 1)]), Some(&alice()))
        .await
        .unwrap();

    let cancelled = h.service.cancel(order.id, Some(&alice())).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(cancelled.updated_at.is_some());

    let stored = h.service.get_by_id(order.id, Some(&alice())).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Cancelled);
    assert_eq!(stored.updated_at, cancelled.updated_at);
    assert_eq!(stored.total, order.total);
}

#[tokio::test]
async fn test_cancel_processing_order() {
    let h = harness();
    let order = h
        .service
        .create(request(vec![item(1, 1)]), Some(&alice()))
        .await
        .unwrap();
    h.store
        .force_status(order.id, OrderStatus::Processing)
        .await
        .unwrap();

    let cancelled = h.service.cancel(order.id, Some(&alice())).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn test_cancel_twice_reports_cancelled() {
    let h = harness();
    let order = h
        .service
        .create(request(vec![item(1, 1)]), Some(&alice()))
        .await
        .unwrap();

    h.service.cancel(order.id, Some(&alice())).await.unwrap();
    let err = h
        .service
        .cancel(order.id, Some(&alice()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::InvalidStateTransition {
            current: OrderStatus::Cancelled
        }
    ));
    assert!(err.to_string().contains("cancelled"));
}

#[tokio::test]
async fn test_cancel_refused_after_shipping() {
    let h = harness();
    for status in [OrderStatus::Shipped, OrderStatus::Delivered] {
        let order = h
            .service
            .create(request(vec![item(1, 1)]), Some(&alice()))
            .await
            .unwrap();
        h.store.force_status(order.id, status).await.unwrap();

        let err = h
            .service
            .cancel(order.id, Some(&alice()))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidStateTransition { current } if current == status));

        let stored = h.service.get_by_id(order.id, Some(&alice())).await.unwrap();
        assert_eq!(stored.status, status);
    }
}

#[tokio::test]
async fn test_cancel_other_users_order_not_found() {
    let h = harness();
    let order = h
        .service
        .create(request(vec![item(1, 1)]), Some(&alice()))
        .await
        .unwrap();

    let err = h.service.cancel(order.id, Some(&bob())).await.unwrap_err();
    assert!(matches!(err, OrderError::NotFound));

    let stored = h.service.get_by_id(order.id, Some(&alice())).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_concurrent_cancels_one_wins() {
    let h = harness();
    let order = h
        .service
        .create(request(vec![item(1, 1)]), Some(&alice()))
        .await
        .unwrap();
    let id = order.id;

    let a = {
        let service = h.service.clone();
        tokio::spawn(async move { service.cancel(id, Some(&alice())).await })
    };
    let b = {
        let service = h.service.clone();
        tokio::spawn(async move { service.cancel(id, Some(&alice())).await })
    };
    let results = [a.await.unwrap(), b.await.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let err = results.into_iter().find_map(Result::err).unwrap();
    assert!(matches!(
        err,
        OrderError::InvalidStateTransition {
            current: OrderStatus::Cancelled
        }
    ));
}

/// Store that ships the order between the service's read and its write.
struct ShipsDuringCancel {
    inner: InMemoryOrderStore,
}

#[async_trait]
impl OrderStore for ShipsDuringCancel {
    async fn insert(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        self.inner.insert(order).await
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_user_newest_first(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Order>, RepositoryError> {
        self.inner.find_by_user_newest_first(user_id).await
    }

    async fn find_by_idempotency_key(
        &self,
        user_id: UserId,
        key: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        self.inner.find_by_idempotency_key(user_id, key).await
    }

    async fn update_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        new: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        self.inner.force_status(id, OrderStatus::Shipped).await?;
        self.inner.update_status(id, expected, new, at).await
    }
}

#[tokio::test]
async fn test_cancel_loses_race_with_fulfillment() {
    let store = Arc::new(ShipsDuringCancel {
        inner: InMemoryOrderStore::new(),
    });
    let catalog = Arc::new(InMemoryCatalog::with_products([product(
        1,
        "Linen Shirt",
        Decimal::ONE_HUNDRED,
        None,
    )]));
    let service = OrderService::new(store.clone(), catalog, OrderPolicy::default());

    let order = service
        .create(request(vec![item(1, 1)]), Some(&alice()))
        .await
        .unwrap();
    let err = service.cancel(order.id, Some(&alice())).await.unwrap_err();
    assert!(matches!(
        err,
        OrderError::InvalidStateTransition {
            current: OrderStatus::Shipped
        }
    ));

    let stored = store.inner.find_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Shipped);
}

// =============================================================================
// Fulfillment progression
// =============================================================================

#[tokio::test]
async fn test_advance_status_walks_forward() {
    let h = harness();
    let order = h
        .service
        .create(request(vec![item(1, 1)]), Some(&alice()))
        .await
        .unwrap();

    for status in [
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        let updated = h.service.advance_status(order.id, status).await.unwrap();
        assert_eq!(updated.status, status);
    }
}

#[tokio::test]
async fn test_advance_status_rejects_skips_and_cancel() {
    let h = harness();
    let order = h
        .service
        .create(request(vec![item(1, 1)]), Some(&alice()))
        .await
        .unwrap();

    let err = h
        .service
        .advance_status(order.id, OrderStatus::Shipped)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::InvalidStateTransition {
            current: OrderStatus::Pending
        }
    ));

    let err = h
        .service
        .advance_status(order.id, OrderStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidRequest(_)));

    h.service.cancel(order.id, Some(&alice())).await.unwrap();
    let err = h
        .service
        .advance_status(order.id, OrderStatus::Processing)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::InvalidStateTransition {
            current: OrderStatus::Cancelled
        }
    ));
}

#[tokio::test]
async fn test_advance_status_unknown_order() {
    let h = harness();
    let err = h
        .service
        .advance_status(OrderId::new(77), OrderStatus::Processing)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::NotFound));
}

// =============================================================================
// Collaborator failures
// =============================================================================

#[tokio::test]
async fn test_store_outage_is_transient() {
    let h = harness();
    h.store.set_unavailable(true);

    let err = h
        .service
        .create(request(vec![item(1, 1)]), Some(&alice()))
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    let err = h.service.list_for_user(Some(&alice())).await.unwrap_err();
    assert!(matches!(err, OrderError::Transient(_)));
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let h = harness_with_policy(OrderPolicy {
        store_timeout: Duration::from_millis(20),
        ..OrderPolicy::default()
    });
    h.store.set_latency(Some(Duration::from_millis(500))).await;

    let err = h
        .service
        .create(request(vec![item(1, 1)]), Some(&alice()))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Transient(msg) if msg.contains("timed out")));

    h.store.set_latency(None).await;
    assert!(h.store.is_empty().await);
}

struct FailingGateway;

#[async_trait]
impl AuthGateway for FailingGateway {
    async fn current_identity(&self) -> Result<Option<Identity>, GatewayError> {
        Err(GatewayError::Unavailable("session store down".to_owned()))
    }
}

struct StalledGateway;

#[async_trait]
impl AuthGateway for StalledGateway {
    async fn current_identity(&self) -> Result<Option<Identity>, GatewayError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(Some(alice()))
    }
}

#[tokio::test]
async fn test_identity_provider_failures_are_transient() {
    let h = harness_with_policy(OrderPolicy {
        store_timeout: Duration::from_millis(20),
        ..OrderPolicy::default()
    });

    let err = h
        .service
        .resolve_identity(&FailingGateway)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Transient(_)));

    let err = h
        .service
        .resolve_identity(&StalledGateway)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Transient(_)));
}

#[test]
fn test_order_number_shape() {
    let number = generate_order_number(Utc::now());
    let parts: Vec<&str> = number.as_str().split('-').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "OD");
    assert_eq!(parts[1].len(), 8);
    assert_eq!(parts[2].len(), ORDER_NUMBER_SUFFIX_LEN);
    assert!(parts[2].bytes().all(|b| ORDER_NUMBER_ALPHABET.contains(&b)));
}
