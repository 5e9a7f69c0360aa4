use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

use mercabot_db::DbPool;

/// Delivery-path availability derived from configuration at startup. A
/// disabled channel degrades the report without failing readiness; the
/// engine still answers turns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelStatuses {
    pub messenger_enabled: bool,
    pub alert_providers: u32,
}

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    channels: ChannelStatuses,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub messenger: HealthCheck,
    pub notifier: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, channels: ChannelStatuses) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, channels })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    db_pool: DbPool,
    channels: ChannelStatuses,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(event_name = "system.health.start", bind_address = %address, "health endpoint started");

    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router(db_pool, channels)).await {
            error!(
                event_name = "system.health.error",
                error = %err,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let messenger = if state.channels.messenger_enabled {
        HealthCheck { status: "ready", detail: "messenger channel configured".to_string() }
    } else {
        HealthCheck {
            status: "disabled",
            detail: "messenger access token missing; replies are not delivered".to_string(),
        }
    };
    let notifier = if state.channels.alert_providers > 0 {
        HealthCheck {
            status: "ready",
            detail: format!(
                "{} alert provider(s) plus durable log",
                state.channels.alert_providers
            ),
        }
    } else {
        HealthCheck {
            status: "degraded",
            detail: "no alert providers configured; leads land in the durable log only"
                .to_string(),
        }
    };

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "mercabot-server runtime initialized".to_string(),
        },
        database,
        messenger,
        notifier,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(err) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {err}") }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};

    use mercabot_core::config::DatabaseConfig;
    use mercabot_db::connect;

    use super::{health, ChannelStatuses, HealthState};

    const NO_CHANNELS: ChannelStatuses =
        ChannelStatuses { messenger_enabled: false, alert_providers: 0 };

    #[tokio::test]
    async fn healthy_database_reports_ready_even_with_channels_disabled() {
        let pool = connect(&DatabaseConfig::ephemeral("sqlite::memory:?cache=shared"))
            .await
            .expect("pool should connect");

        let (status, Json(payload)) =
            health(State(HealthState { db_pool: pool.clone(), channels: NO_CHANNELS })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.messenger.status, "disabled");
        assert_eq!(payload.notifier.status, "degraded");

        pool.close().await;
    }

    #[tokio::test]
    async fn closed_database_reports_service_unavailable() {
        let pool = connect(&DatabaseConfig::ephemeral("sqlite::memory:?cache=shared"))
            .await
            .expect("pool should connect");
        pool.close().await;

        let channels = ChannelStatuses { messenger_enabled: true, alert_providers: 2 };
        let (status, Json(payload)) = health(State(HealthState { db_pool: pool, channels })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.database.status, "degraded");
        assert_eq!(payload.messenger.status, "ready");
    }
}
