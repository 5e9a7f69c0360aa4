use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use mercabot_agent::{PacingPolicy, PolicyEngine};
use mercabot_channel::{
    AlertChannel, CallbackTextChannel, ChannelError, DisabledMessenger, DurableLogChannel,
    GraphApiMessenger, MessagingChannel, NotifierChain, WhatsAppFormChannel,
};
use mercabot_core::config::{AppConfig, ConfigError, LoadOptions};
use mercabot_db::repositories::{
    RepositoryError, SqlConversationRepository, SqlLeadRepository, SqlProductRepository,
};
use mercabot_db::{connect, migrations, seed, CatalogCache, DbPool};

use crate::dispatch::{TurnPipeline, UserDispatcher};
use crate::health::ChannelStatuses;
use crate::leads::LeadCaptureService;
use crate::rate_limit::RateLimiter;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub dispatcher: Arc<UserDispatcher>,
    pub admin_state: crate::admin::AdminState,
    pub channels: ChannelStatuses,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("catalog seeding failed: {0}")]
    Seed(#[source] RepositoryError),
    #[error("outbound channel setup failed: {0}")]
    Channel(#[source] ChannelError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let conversations = Arc::new(SqlConversationRepository::new(db_pool.clone()));
    let products = Arc::new(SqlProductRepository::new(db_pool.clone()));
    let leads = Arc::new(SqlLeadRepository::new(db_pool.clone()));

    seed::seed_if_empty(products.as_ref()).await.map_err(BootstrapError::Seed)?;

    let catalog_cache = Arc::new(CatalogCache::new(
        products.clone(),
        Duration::from_secs(config.engine.catalog_ttl_secs),
    ));

    let messenger = build_messenger(&config)?;
    let alert_providers = build_alert_providers(&config)?;
    let channels = ChannelStatuses {
        messenger_enabled: messenger.is_enabled(),
        alert_providers: alert_providers.len() as u32,
    };

    let notifier = Arc::new(NotifierChain::new(
        alert_providers,
        DurableLogChannel::new(config.notify.leads_log_path.clone()),
    ));
    let lead_service = Arc::new(LeadCaptureService::new(leads.clone(), notifier));

    let pipeline = Arc::new(TurnPipeline::new(
        conversations.clone(),
        catalog_cache.clone(),
        PolicyEngine::default(),
        PacingPolicy::new(
            config.engine.pacing_threshold,
            Duration::from_secs(config.engine.pacing_delay_secs),
        ),
        config.engine.history_window,
        lead_service,
        messenger,
    ));
    let dispatcher = Arc::new(UserDispatcher::new(
        pipeline,
        RateLimiter::per_minute(config.engine.rate_limit_per_minute),
    ));

    let admin_state = crate::admin::AdminState {
        products,
        leads,
        conversations,
        catalog_cache,
    };

    Ok(Application { config, db_pool, dispatcher, admin_state, channels })
}

fn build_messenger(config: &AppConfig) -> Result<Arc<dyn MessagingChannel>, BootstrapError> {
    match &config.messenger.access_token {
        Some(token) if config.messenger.enabled() => {
            let channel = GraphApiMessenger::new(
                config.messenger.api_base.clone(),
                token.clone(),
                Duration::from_secs(config.messenger.timeout_secs),
            )
            .map_err(BootstrapError::Channel)?;
            Ok(Arc::new(channel))
        }
        _ => {
            info!("messenger access token missing; reply delivery disabled");
            Ok(Arc::new(DisabledMessenger))
        }
    }
}

fn build_alert_providers(
    config: &AppConfig,
) -> Result<Vec<Box<dyn AlertChannel>>, BootstrapError> {
    let mut providers: Vec<Box<dyn AlertChannel>> = Vec::new();
    let timeout = Duration::from_secs(config.notify.timeout_secs);

    let Some(owner_phone) = &config.notify.owner_phone else {
        info!("owner phone not configured; lead alerts fall back to the durable log");
        return Ok(providers);
    };

    if let (Some(instance), Some(token)) =
        (&config.notify.ultramsg_instance, &config.notify.ultramsg_token)
    {
        providers.push(Box::new(
            WhatsAppFormChannel::new(instance.clone(), token.clone(), owner_phone.clone(), timeout)
                .map_err(BootstrapError::Channel)?,
        ));
    }
    if let Some(api_key) = &config.notify.callmebot_api_key {
        providers.push(Box::new(
            CallbackTextChannel::new(api_key.clone(), owner_phone.clone(), timeout)
                .map_err(BootstrapError::Channel)?,
        ));
    }

    Ok(providers)
}
