//! Order repository backed by `storefront.customer_order`.
//!
//! Queries are built at runtime with `query_as` so the crate compiles without a
//! live database. Headers and lines are written in one transaction; status
//! changes are a single conditional `UPDATE`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use orderdesk_core::{
    CurrencyCode, NewOrder, Order, OrderId, OrderLineSnapshot, OrderNumber, OrderStatus,
    PaymentMethod, PostalAddress, ProductId, UserId, Variant,
};

use super::RepositoryError;
use crate::services::orders::OrderStore;

const ORDER_NUMBER_CONSTRAINT: &str = "customer_order_order_number_key";
const IDEMPOTENCY_CONSTRAINT: &str = "customer_order_idempotency_key";

macro_rules! order_columns {
    () => {
        "id, user_id, order_number, status, currency, subtotal, shipping, tax, total, \
         shipping_address, billing_address, payment_method, idempotency_key, \
         created_at, updated_at"
    };
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    order_number: String,
    status: OrderStatus,
    currency: String,
    subtotal: Decimal,
    shipping: Decimal,
    tax: Decimal,
    total: Decimal,
    shipping_address: Json<PostalAddress>,
    billing_address: Json<PostalAddress>,
    payment_method: String,
    idempotency_key: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLineSnapshot>) -> Result<Order, RepositoryError> {
        let currency = self.currency.parse::<CurrencyCode>().map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", self.id))
        })?;
        let payment_method = self.payment_method.parse::<PaymentMethod>().map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", self.id))
        })?;

        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            order_number: OrderNumber::from_stored(self.order_number),
            status: self.status,
            currency,
            subtotal: self.subtotal,
            shipping: self.shipping,
            tax: self.tax,
            total: self.total,
            shipping_address: self.shipping_address.0,
            billing_address: self.billing_address.0,
            payment_method,
            lines,
            idempotency_key: self.idempotency_key,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LineRow {
    order_id: OrderId,
    product_id: ProductId,
    product_name: String,
    unit_price: Decimal,
    quantity: i32,
    size: Option<String>,
    color: Option<String>,
    image: Option<String>,
}

impl TryFrom<LineRow> for OrderLineSnapshot {
    type Error = RepositoryError;

    fn try_from(row: LineRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "order {} has line quantity {}",
                row.order_id, row.quantity
            ))
        })?;

        Ok(Self {
            product_id: row.product_id,
            product_name: row.product_name,
            unit_price: row.unit_price,
            quantity,
            variant: Variant {
                size: row.size,
                color: row.color,
            },
            image: row.image,
        })
    }
}

/// `PostgreSQL` implementation of [`OrderStore`].
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Create a new order store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load lines for `orders` and assemble the domain values, preserving
    /// the row order.
    async fn attach_lines(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = rows.iter().map(|r| r.id.as_i64()).collect();
        let line_rows: Vec<LineRow> = sqlx::query_as(
            r"
            SELECT order_id, product_id, product_name, unit_price, quantity, size, color, image
            FROM storefront.customer_order_line
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            ",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_order: HashMap<OrderId, Vec<OrderLineSnapshot>> = HashMap::new();
        for row in line_rows {
            let order_id = row.order_id;
            by_order
                .entry(order_id)
                .or_default()
                .push(OrderLineSnapshot::try_from(row)?);
        }

        rows.into_iter()
            .map(|row| {
                let lines = by_order.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect()
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row: OrderRow = sqlx::query_as(concat!(
            r"
            INSERT INTO storefront.customer_order (
                user_id, order_number, status, currency, subtotal, shipping, tax, total,
                shipping_address, billing_address, payment_method, idempotency_key, created_at
            )
            VALUES ($1, $2, 'pending', $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING ",
            order_columns!()
        ))
        .bind(order.user_id)
        .bind(order.order_number.as_str())
        .bind(order.currency.code())
        .bind(order.subtotal)
        .bind(order.shipping)
        .bind(order.tax)
        .bind(order.total)
        .bind(Json(&order.shipping_address))
        .bind(Json(&order.billing_address))
        .bind(order.payment_method.as_str())
        .bind(order.idempotency_key.as_deref())
        .bind(order.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_insert_error)?;

        for (position, line) in order.lines.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| RepositoryError::Conflict("too many order lines".to_owned()))?;
            let quantity = i32::try_from(line.quantity)
                .map_err(|_| RepositoryError::Conflict("line quantity out of range".to_owned()))?;

            sqlx::query(
                r"
                INSERT INTO storefront.customer_order_line (
                    order_id, position, product_id, product_name, unit_price, quantity,
                    size, color, image
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ",
            )
            .bind(row.id)
            .bind(position)
            .bind(line.product_id)
            .bind(&line.product_name)
            .bind(line.unit_price)
            .bind(quantity)
            .bind(line.variant.size.as_deref())
            .bind(line.variant.color.as_deref())
            .bind(line.image.as_deref())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        row.into_order(order.lines)
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(concat!(
            "SELECT ",
            order_columns!(),
            " FROM storefront.customer_order WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(self.attach_lines(row.into_iter().collect()).await?.pop())
    }

    async fn find_by_user_newest_first(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(concat!(
            "SELECT ",
            order_columns!(),
            " FROM storefront.customer_order WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        self.attach_lines(rows).await
    }

    async fn find_by_idempotency_key(
        &self,
        user_id: UserId,
        key: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(concat!(
            "SELECT ",
            order_columns!(),
            " FROM storefront.customer_order WHERE user_id = $1 AND idempotency_key = $2"
        ))
        .bind(user_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(self.attach_lines(row.into_iter().collect()).await?.pop())
    }

    async fn update_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        new: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.customer_order
            SET status = $3, updated_at = $4
            WHERE id = $1 AND status = $2
            ",
        )
        .bind(id)
        .bind(expected)
        .bind(new)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// Translate unique violations on the order header into their domain meaning.
fn map_insert_error(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return match db_err.constraint() {
            Some(ORDER_NUMBER_CONSTRAINT) => RepositoryError::DuplicateOrderNumber,
            Some(IDEMPOTENCY_CONSTRAINT) => RepositoryError::DuplicateIdempotencyKey,
            other => RepositoryError::Conflict(format!(
                "unique violation on {}",
                other.unwrap_or("unknown constraint")
            )),
        };
    }
    RepositoryError::Database(e)
}
