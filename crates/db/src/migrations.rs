use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use mercabot_core::config::DatabaseConfig;

    use super::run_pending;
    use crate::connect;

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &["conversations", "products", "leads"];

    #[tokio::test]
    async fn migrations_create_every_managed_table() {
        let pool = connect(&DatabaseConfig::ephemeral("sqlite::memory:?cache=shared"))
            .await
            .expect("in-memory pool");
        run_pending(&pool).await.expect("migrations apply cleanly");

        for table in MANAGED_SCHEMA_OBJECTS {
            let row =
                sqlx::query("SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = ?")
                    .bind(table)
                    .fetch_one(&pool)
                    .await
                    .expect("schema query");
            let count: i64 = row.try_get("n").expect("count column");
            assert_eq!(count, 1, "expected table `{table}` to exist");
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect(&DatabaseConfig::ephemeral("sqlite::memory:?cache=shared"))
            .await
            .expect("in-memory pool");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");
    }
}
