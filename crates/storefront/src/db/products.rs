//! Catalog read model in `storefront.product`.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use orderdesk_core::{Product, ProductId};

use super::RepositoryError;
use crate::services::orders::Catalog;

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    price: Decimal,
    discount_percent: Option<Decimal>,
    images: Vec<String>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            price: row.price,
            discount_percent: row.discount_percent,
            images: row.images,
        }
    }
}

/// `PostgreSQL` implementation of [`Catalog`].
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(
            r"
            SELECT id, name, price, discount_percent, images
            FROM storefront.product
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }
}
