use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use mercabot_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

const SESSION_PRAGMAS: [&str; 3] =
    ["PRAGMA foreign_keys = ON", "PRAGMA journal_mode = WAL", "PRAGMA busy_timeout = 5000"];

/// Opens the SQLite pool described by `config`. Every pooled connection gets
/// the session pragmas the repositories rely on (referential integrity, WAL
/// for concurrent webhook/admin access, a busy timeout instead of immediate
/// SQLITE_BUSY failures).
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(config.timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                for pragma in SESSION_PRAGMAS {
                    sqlx::query(pragma).execute(&mut *conn).await?;
                }
                Ok(())
            })
        })
        .connect(&config.url)
        .await
}
