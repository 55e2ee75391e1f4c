//! Process-local order store and catalog.
//!
//! Same contract as the `PostgreSQL` adapters: atomic inserts, per-user
//! uniqueness of idempotency keys, global uniqueness of order numbers, and a
//! compare-and-set status update under a single lock. Failure and latency
//! injection let tests exercise timeout and outage handling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use orderdesk_core::{NewOrder, Order, OrderId, OrderStatus, Product, ProductId, UserId};

use super::RepositoryError;
use crate::services::orders::{Catalog, OrderStore};

#[derive(Default)]
struct OrderTable {
    next_id: i64,
    /// Insertion order; doubles as the tie-breaker for equal `created_at`.
    rows: Vec<Order>,
}

/// In-memory [`OrderStore`].
#[derive(Default)]
pub struct InMemoryOrderStore {
    table: Mutex<OrderTable>,
    unavailable: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl InMemoryOrderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `RepositoryError::Unavailable` while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().await = latency;
    }

    /// Overwrite an order's status without any guard, as an external
    /// process with direct database access would.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such order exists.
    pub async fn force_status(&self, id: OrderId, status: OrderStatus) -> Result<(), RepositoryError> {
        let mut table = self.table.lock().await;
        let row = table
            .rows
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(RepositoryError::NotFound)?;
        row.status = status;
        row.updated_at = Some(Utc::now());
        Ok(())
    }

    /// Number of stored orders.
    pub async fn len(&self) -> usize {
        self.table.lock().await.rows.len()
    }

    /// Whether no orders are stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn before_call(&self) -> Result<(), RepositoryError> {
        let latency = *self.latency.lock().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "in-memory store disabled".to_owned(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        self.before_call().await?;
        let mut table = self.table.lock().await;

        if table.rows.iter().any(|o| o.order_number == order.order_number) {
            return Err(RepositoryError::DuplicateOrderNumber);
        }
        if let Some(key) = order.idempotency_key.as_deref()
            && table
                .rows
                .iter()
                .any(|o| o.user_id == order.user_id && o.idempotency_key.as_deref() == Some(key))
        {
            return Err(RepositoryError::DuplicateIdempotencyKey);
        }

        table.next_id += 1;
        let order = order.into_order(OrderId::new(table.next_id));
        table.rows.push(order.clone());
        Ok(order)
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        self.before_call().await?;
        let table = self.table.lock().await;
        Ok(table.rows.iter().find(|o| o.id == id).cloned())
    }

    async fn find_by_user_newest_first(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Order>, RepositoryError> {
        self.before_call().await?;
        let table = self.table.lock().await;
        let mut orders: Vec<Order> = table
            .rows
            .iter()
            .rev()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        // Stable sort keeps reverse insertion order among equal timestamps.
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn find_by_idempotency_key(
        &self,
        user_id: UserId,
        key: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        self.before_call().await?;
        let table = self.table.lock().await;
        Ok(table
            .rows
            .iter()
            .find(|o| o.user_id == user_id && o.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn update_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        new: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        self.before_call().await?;
        let mut table = self.table.lock().await;
        match table.rows.iter_mut().find(|o| o.id == id) {
            Some(row) if row.status == expected => {
                row.status = new;
                row.updated_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// In-memory [`Catalog`].
#[derive(Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<ProductId, Product>>,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog holding `products`.
    #[must_use]
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        Self {
            products: RwLock::new(products.into_iter().map(|p| (p.id, p)).collect()),
        }
    }

    /// Insert or replace a product.
    pub async fn upsert(&self, product: Product) {
        self.products.write().await.insert(product.id, product);
    }

    /// Remove a product; returns it if it existed.
    pub async fn remove(&self, id: ProductId) -> Option<Product> {
        self.products.write().await.remove(&id)
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.products.read().await.get(&id).cloned())
    }
}
