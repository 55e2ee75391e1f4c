//! Database operations for storefront `PostgreSQL`.
//!
//! # Database: `od_storefront`
//!
//! ## Tables
//!
//! - `storefront.customer_order` - Order headers (money, addresses, status)
//! - `storefront.customer_order_line` - Frozen line snapshots
//! - `storefront.product` - Catalog read model used at pricing time
//! - `tower_sessions.session` - Tower-sessions storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p orderdesk-cli -- migrate
//! ```
//!
//! The [`memory`] module provides process-local stores with the same
//! semantics, used by tests and local development.

pub mod memory;
pub mod orders;
pub mod products;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use memory::{InMemoryCatalog, InMemoryOrderStore};
pub use orders::PgOrderStore;
pub use products::PgCatalog;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Another order already uses this order number.
    #[error("duplicate order number")]
    DuplicateOrderNumber,

    /// The user already has an order with this idempotency key.
    #[error("duplicate idempotency key")]
    DuplicateIdempotencyKey,

    /// Other constraint violation.
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Backend temporarily unreachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    /// Whether the failure is expected to clear up on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(err) => matches!(
                err,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            Self::Unavailable(_) => true,
            _ => false,
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
