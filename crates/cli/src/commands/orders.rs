//! Order management commands.
//!
//! This is the fulfillment side of the order lifecycle: it moves orders
//! forward one step at a time. Customers cancel through the API.
//!
//! # Usage
//!
//! ```bash
//! od-cli orders set-status 42 processing
//! od-cli orders set-status 42 shipped
//! ```

use std::sync::Arc;

use orderdesk_core::{OrderId, OrderStatus};
use orderdesk_storefront::config::OrderPolicy;
use orderdesk_storefront::db::{self, PgCatalog, PgOrderStore};
use orderdesk_storefront::services::orders::OrderService;

use super::{CommandError, database_url};

/// Advance an order to `status`.
///
/// # Errors
///
/// Returns `CommandError::Order` if the order does not exist or `status` is
/// not the next step from its current status.
pub async fn set_status(order_id: OrderId, status: OrderStatus) -> Result<(), CommandError> {
    let database_url = database_url()?;
    let policy = OrderPolicy::from_env()?;
    let pool = db::create_pool(&database_url).await?;

    let service = OrderService::new(
        Arc::new(PgOrderStore::new(pool.clone())),
        Arc::new(PgCatalog::new(pool)),
        policy,
    );

    let order = service.advance_status(order_id, status).await?;
    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        status = %order.status,
        "Order updated"
    );
    Ok(())
}
