use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use mercabot_core::{Direction, Message, UserId};

use super::{ConversationRepository, ConversationStats, RepositoryError};
use crate::DbPool;

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn append(&self, message: Message) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO conversations (user_id, direction, body, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&message.user_id.0)
        .bind(message.direction.as_str())
        .bind(&message.text)
        .bind(message.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_recent(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT user_id, direction, body, created_at
             FROM conversations
             WHERE user_id = ?
             ORDER BY id DESC
             LIMIT ?",
        )
        .bind(&user_id.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(message_from_row).collect()
    }

    async fn count_outbound(&self, user_id: &UserId) -> Result<u32, RepositoryError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM conversations WHERE user_id = ? AND direction = 'outbound'",
        )
        .bind(&user_id.0)
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row.try_get("n")?;
        u32::try_from(count)
            .map_err(|_| RepositoryError::Decode(format!("outbound count {count} out of range")))
    }

    async fn stats(&self) -> Result<ConversationStats, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) AS total,
                SUM(CASE WHEN direction = 'inbound' THEN 1 ELSE 0 END) AS inbound,
                SUM(CASE WHEN direction = 'outbound' THEN 1 ELSE 0 END) AS outbound,
                COUNT(DISTINCT user_id) AS users
             FROM conversations",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(ConversationStats {
            total_messages: count_column(&row, "total")?,
            inbound: count_column(&row, "inbound")?,
            outbound: count_column(&row, "outbound")?,
            unique_users: count_column(&row, "users")?,
        })
    }
}

fn count_column(row: &SqliteRow, column: &str) -> Result<u64, RepositoryError> {
    // SUM over an empty table yields NULL
    let value: Option<i64> = row.try_get(column)?;
    let value = value.unwrap_or(0);
    u64::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("column `{column}` value {value} is negative")))
}

fn message_from_row(row: SqliteRow) -> Result<Message, RepositoryError> {
    let direction_raw = row.try_get::<String, _>("direction")?;
    let direction = direction_raw
        .parse::<Direction>()
        .map_err(|_| RepositoryError::Decode(format!("unknown direction `{direction_raw}`")))?;

    Ok(Message {
        user_id: UserId(row.try_get("user_id")?),
        text: row.try_get("body")?,
        direction,
        timestamp: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn parse_timestamp(column: &str, raw: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| RepositoryError::Decode(format!("column `{column}`: {err}")))
}
