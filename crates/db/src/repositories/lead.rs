use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use mercabot_core::{Lead, ProductKey, UserId};

use super::{LeadRepository, RepositoryError};
use crate::DbPool;

pub struct SqlLeadRepository {
    pool: DbPool,
}

impl SqlLeadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl LeadRepository for SqlLeadRepository {
    async fn upsert(&self, lead: Lead) -> Result<(), RepositoryError> {
        let products: Vec<&str> =
            lead.interested_products.iter().map(|key| key.0.as_str()).collect();
        let products = serde_json::to_string(&products)
            .map_err(|err| RepositoryError::Decode(format!("interest set encode: {err}")))?;

        sqlx::query(
            "INSERT INTO leads (user_id, phone_number, products_interested, captured_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(user_id, phone_number) DO UPDATE SET
                products_interested = excluded.products_interested,
                captured_at = excluded.captured_at",
        )
        .bind(&lead.user_id.0)
        .bind(&lead.phone)
        .bind(products)
        .bind(lead.captured_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<Lead>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT user_id, phone_number, products_interested, captured_at
             FROM leads
             ORDER BY captured_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(lead_from_row).collect()
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM leads").fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("n")?;
        u64::try_from(count)
            .map_err(|_| RepositoryError::Decode(format!("lead count {count} is negative")))
    }
}

fn lead_from_row(row: SqliteRow) -> Result<Lead, RepositoryError> {
    let products_raw = row.try_get::<String, _>("products_interested")?;
    let interested_products: BTreeSet<ProductKey> =
        serde_json::from_str::<Vec<String>>(&products_raw)
            .map_err(|err| RepositoryError::Decode(format!("interest set decode: {err}")))?
            .into_iter()
            .map(ProductKey)
            .collect();

    let captured_raw = row.try_get::<String, _>("captured_at")?;
    let captured_at = DateTime::parse_from_rfc3339(&captured_raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| RepositoryError::Decode(format!("captured_at `{captured_raw}`: {err}")))?;

    Ok(Lead {
        user_id: UserId(row.try_get("user_id")?),
        phone: row.try_get("phone_number")?,
        interested_products,
        captured_at,
    })
}
