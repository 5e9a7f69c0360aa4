use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use mercabot_core::{DiscountPolicy, Product, ProductKey};

use super::{ProductRepository, RepositoryError};
use crate::DbPool;

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const PRODUCT_COLUMNS: &str =
    "key_name, name, price, stock, keywords, active, discount_policy";

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn list_sellable(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM products
             WHERE active = 1 AND stock > 0
             ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(product_from_row).collect()
    }

    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(product_from_row).collect()
    }

    async fn find(&self, key: &ProductKey) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE key_name = ?"
        ))
        .bind(&key.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(product_from_row).transpose()
    }

    async fn upsert(&self, product: Product) -> Result<(), RepositoryError> {
        let keywords = serde_json::to_string(&product.keywords)
            .map_err(|err| RepositoryError::Decode(format!("keywords encode: {err}")))?;
        let discount = product
            .discount
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|err| RepositoryError::Decode(format!("discount policy encode: {err}")))?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO products (key_name, name, price, stock, keywords, active, discount_policy, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(key_name) DO UPDATE SET
                name = excluded.name,
                price = excluded.price,
                stock = excluded.stock,
                keywords = excluded.keywords,
                active = excluded.active,
                discount_policy = excluded.discount_policy,
                updated_at = excluded.updated_at",
        )
        .bind(&product.key.0)
        .bind(&product.name)
        .bind(product.unit_price.to_string())
        .bind(product.stock)
        .bind(keywords)
        .bind(i64::from(product.active))
        .bind(discount)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn deactivate(&self, key: &ProductKey) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE products SET active = 0, updated_at = ? WHERE key_name = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(&key.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn product_from_row(row: SqliteRow) -> Result<Product, RepositoryError> {
    let price_raw = row.try_get::<String, _>("price")?;
    let unit_price = Decimal::from_str(&price_raw)
        .map_err(|err| RepositoryError::Decode(format!("price `{price_raw}`: {err}")))?;

    let keywords_raw = row.try_get::<String, _>("keywords")?;
    let keywords: Vec<String> = serde_json::from_str(&keywords_raw)
        .map_err(|err| RepositoryError::Decode(format!("keywords decode: {err}")))?;

    let discount = row
        .try_get::<Option<String>, _>("discount_policy")?
        .map(|raw| {
            serde_json::from_str::<DiscountPolicy>(&raw)
                .map_err(|err| RepositoryError::Decode(format!("discount policy decode: {err}")))
        })
        .transpose()?;

    Ok(Product {
        key: ProductKey(row.try_get("key_name")?),
        name: row.try_get("name")?,
        unit_price,
        stock: row.try_get("stock")?,
        keywords,
        active: row.try_get::<i64, _>("active")? != 0,
        discount,
    })
}
