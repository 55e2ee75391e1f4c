//! Collaborator contracts consumed by the order service.
//!
//! The service never touches sessions, SQL or the catalog directly. It talks
//! to these traits, which have `PostgreSQL`, session and in-memory
//! implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use orderdesk_core::{NewOrder, Order, OrderId, OrderStatus, Product, ProductId, UserId};

use crate::db::RepositoryError;

/// An authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity {
    pub user_id: UserId,
}

impl Identity {
    #[must_use]
    pub const fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}

/// Failure talking to the identity provider.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Provider could not be reached or its state could not be read.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Resolves the caller's identity.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// `None` when the caller is not authenticated.
    async fn current_identity(&self) -> Result<Option<Identity>, GatewayError>;
}

/// Persistent order storage.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert an order and all its lines atomically. New orders are `pending`.
    async fn insert(&self, order: NewOrder) -> Result<Order, RepositoryError>;

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Orders for `user_id`, newest `created_at` first, ties newest insert first.
    async fn find_by_user_newest_first(&self, user_id: UserId)
    -> Result<Vec<Order>, RepositoryError>;

    async fn find_by_idempotency_key(
        &self,
        user_id: UserId,
        key: &str,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Compare-and-set on `status`.
    ///
    /// Writes `new` and stamps `updated_at` only if the stored status still
    /// equals `expected`. Returns whether the write happened.
    async fn update_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        new: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
}

/// Read-only product catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;
}
