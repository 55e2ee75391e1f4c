//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::OrderPolicy;
use crate::db::{PgCatalog, PgOrderStore};
use crate::services::orders::OrderService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the order service and, when running against `PostgreSQL`, the pool.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    orders: OrderService,
    pool: Option<PgPool>,
}

impl AppState {
    /// Create application state backed by `PostgreSQL`.
    #[must_use]
    pub fn new(pool: PgPool, policy: OrderPolicy) -> Self {
        let orders = OrderService::new(
            Arc::new(PgOrderStore::new(pool.clone())),
            Arc::new(PgCatalog::new(pool.clone())),
            policy,
        );

        Self {
            inner: Arc::new(AppStateInner {
                orders,
                pool: Some(pool),
            }),
        }
    }

    /// Create application state around an existing service, with no database.
    #[must_use]
    pub fn from_service(orders: OrderService) -> Self {
        Self {
            inner: Arc::new(AppStateInner { orders, pool: None }),
        }
    }

    /// Get a reference to the order service.
    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }

    /// Get a reference to the database connection pool, if any.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }
}
