use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub messenger: MessengerConfig,
    pub notify: NotifyConfig,
    pub engine: EngineConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

impl DatabaseConfig {
    /// Single-connection settings for a throwaway database, used by tests.
    pub fn ephemeral(url: impl Into<String>) -> Self {
        Self { url: url.into(), max_connections: 1, timeout_secs: 5 }
    }
}

/// Outbound Messenger credentials. An absent access token does not fail
/// validation: the channel is disabled at startup and the health endpoint
/// reports it (startup must survive missing credentials).
#[derive(Clone, Debug)]
pub struct MessengerConfig {
    pub access_token: Option<SecretString>,
    pub verify_token: String,
    pub api_base: String,
    pub timeout_secs: u64,
}

impl MessengerConfig {
    pub fn enabled(&self) -> bool {
        self.access_token
            .as_ref()
            .map(|token| !token.expose_secret().trim().is_empty())
            .unwrap_or(false)
    }
}

#[derive(Clone, Debug)]
pub struct NotifyConfig {
    pub owner_phone: Option<String>,
    pub ultramsg_instance: Option<String>,
    pub ultramsg_token: Option<SecretString>,
    pub callmebot_api_key: Option<SecretString>,
    pub leads_log_path: PathBuf,
    pub timeout_secs: u64,
}

impl NotifyConfig {
    pub fn ultramsg_enabled(&self) -> bool {
        self.owner_phone.is_some()
            && self.ultramsg_instance.is_some()
            && self.ultramsg_token.is_some()
    }

    pub fn callmebot_enabled(&self) -> bool {
        self.owner_phone.is_some() && self.callmebot_api_key.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub history_window: u32,
    pub pacing_threshold: u32,
    pub pacing_delay_secs: u64,
    pub rate_limit_per_minute: u32,
    pub catalog_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub messenger_access_token: Option<String>,
    pub messenger_verify_token: Option<String>,
    pub rate_limit_per_minute: Option<u32>,
    pub history_window: Option<u32>,
    pub leads_log_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://mercabot.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            messenger: MessengerConfig {
                access_token: None,
                verify_token: "mercabot-verify".to_string(),
                api_base: "https://graph.facebook.com/v18.0".to_string(),
                timeout_secs: 10,
            },
            notify: NotifyConfig {
                owner_phone: None,
                ultramsg_instance: None,
                ultramsg_token: None,
                callmebot_api_key: None,
                leads_log_path: PathBuf::from("leads_urgentes.log"),
                timeout_secs: 10,
            },
            engine: EngineConfig {
                history_window: 5,
                pacing_threshold: 2,
                pacing_delay_secs: 4,
                rate_limit_per_minute: 10,
                catalog_ttl_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 5000,
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("mercabot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(messenger) = patch.messenger {
            if let Some(access_token) = messenger.access_token {
                self.messenger.access_token = Some(secret_value(access_token));
            }
            if let Some(verify_token) = messenger.verify_token {
                self.messenger.verify_token = verify_token;
            }
            if let Some(api_base) = messenger.api_base {
                self.messenger.api_base = api_base;
            }
            if let Some(timeout_secs) = messenger.timeout_secs {
                self.messenger.timeout_secs = timeout_secs;
            }
        }

        if let Some(notify) = patch.notify {
            if let Some(owner_phone) = notify.owner_phone {
                self.notify.owner_phone = Some(owner_phone);
            }
            if let Some(instance) = notify.ultramsg_instance {
                self.notify.ultramsg_instance = Some(instance);
            }
            if let Some(token) = notify.ultramsg_token {
                self.notify.ultramsg_token = Some(secret_value(token));
            }
            if let Some(api_key) = notify.callmebot_api_key {
                self.notify.callmebot_api_key = Some(secret_value(api_key));
            }
            if let Some(path) = notify.leads_log_path {
                self.notify.leads_log_path = path;
            }
            if let Some(timeout_secs) = notify.timeout_secs {
                self.notify.timeout_secs = timeout_secs;
            }
        }

        if let Some(engine) = patch.engine {
            if let Some(history_window) = engine.history_window {
                self.engine.history_window = history_window;
            }
            if let Some(pacing_threshold) = engine.pacing_threshold {
                self.engine.pacing_threshold = pacing_threshold;
            }
            if let Some(pacing_delay_secs) = engine.pacing_delay_secs {
                self.engine.pacing_delay_secs = pacing_delay_secs;
            }
            if let Some(rate_limit_per_minute) = engine.rate_limit_per_minute {
                self.engine.rate_limit_per_minute = rate_limit_per_minute;
            }
            if let Some(catalog_ttl_secs) = engine.catalog_ttl_secs {
                self.engine.catalog_ttl_secs = catalog_ttl_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("MERCABOT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("MERCABOT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("MERCABOT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("MERCABOT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("MERCABOT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("MERCABOT_PAGE_ACCESS_TOKEN") {
            self.messenger.access_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("MERCABOT_VERIFY_TOKEN") {
            self.messenger.verify_token = value;
        }
        if let Some(value) = read_env("MERCABOT_MESSENGER_API_BASE") {
            self.messenger.api_base = value;
        }

        if let Some(value) = read_env("MERCABOT_OWNER_PHONE") {
            self.notify.owner_phone = Some(value);
        }
        if let Some(value) = read_env("MERCABOT_ULTRAMSG_INSTANCE") {
            self.notify.ultramsg_instance = Some(value);
        }
        if let Some(value) = read_env("MERCABOT_ULTRAMSG_TOKEN") {
            self.notify.ultramsg_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("MERCABOT_CALLMEBOT_API_KEY") {
            self.notify.callmebot_api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("MERCABOT_LEADS_LOG_PATH") {
            self.notify.leads_log_path = PathBuf::from(value);
        }

        if let Some(value) = read_env("MERCABOT_HISTORY_WINDOW") {
            self.engine.history_window = parse_u32("MERCABOT_HISTORY_WINDOW", &value)?;
        }
        if let Some(value) = read_env("MERCABOT_PACING_THRESHOLD") {
            self.engine.pacing_threshold = parse_u32("MERCABOT_PACING_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("MERCABOT_PACING_DELAY_SECS") {
            self.engine.pacing_delay_secs = parse_u64("MERCABOT_PACING_DELAY_SECS", &value)?;
        }
        if let Some(value) = read_env("MERCABOT_RATE_LIMIT_PER_MINUTE") {
            self.engine.rate_limit_per_minute =
                parse_u32("MERCABOT_RATE_LIMIT_PER_MINUTE", &value)?;
        }
        if let Some(value) = read_env("MERCABOT_CATALOG_TTL_SECS") {
            self.engine.catalog_ttl_secs = parse_u64("MERCABOT_CATALOG_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("MERCABOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("MERCABOT_SERVER_PORT") {
            self.server.port = parse_u16("MERCABOT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("MERCABOT_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("MERCABOT_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        let log_level =
            read_env("MERCABOT_LOGGING_LEVEL").or_else(|| read_env("MERCABOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("MERCABOT_LOGGING_FORMAT").or_else(|| read_env("MERCABOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(access_token) = overrides.messenger_access_token {
            self.messenger.access_token = Some(secret_value(access_token));
        }
        if let Some(verify_token) = overrides.messenger_verify_token {
            self.messenger.verify_token = verify_token;
        }
        if let Some(rate_limit) = overrides.rate_limit_per_minute {
            self.engine.rate_limit_per_minute = rate_limit;
        }
        if let Some(history_window) = overrides.history_window {
            self.engine.history_window = history_window;
        }
        if let Some(leads_log_path) = overrides.leads_log_path {
            self.notify.leads_log_path = leads_log_path;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_messenger(&self.messenger)?;
        validate_engine(&self.engine)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("mercabot.toml"), PathBuf::from("config/mercabot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_messenger(messenger: &MessengerConfig) -> Result<(), ConfigError> {
    if messenger.verify_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "messenger.verify_token must not be empty (the webhook handshake needs it)"
                .to_string(),
        ));
    }

    if !messenger.api_base.starts_with("http://") && !messenger.api_base.starts_with("https://") {
        return Err(ConfigError::Validation(
            "messenger.api_base must start with http:// or https://".to_string(),
        ));
    }

    if messenger.timeout_secs == 0 || messenger.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "messenger.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_engine(engine: &EngineConfig) -> Result<(), ConfigError> {
    if engine.history_window == 0 || engine.history_window > 50 {
        return Err(ConfigError::Validation(
            "engine.history_window must be in range 1..=50".to_string(),
        ));
    }

    if engine.rate_limit_per_minute == 0 {
        return Err(ConfigError::Validation(
            "engine.rate_limit_per_minute must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.port == server.health_check_port {
        return Err(ConfigError::Validation(
            "server.port and server.health_check_port must differ".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    messenger: Option<MessengerPatch>,
    notify: Option<NotifyPatch>,
    engine: Option<EnginePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MessengerPatch {
    access_token: Option<String>,
    verify_token: Option<String>,
    api_base: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct NotifyPatch {
    owner_phone: Option<String>,
    ultramsg_instance: Option<String>,
    ultramsg_token: Option<String>,
    callmebot_api_key: Option<String>,
    leads_log_path: Option<PathBuf>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EnginePatch {
    history_window: Option<u32>,
    pacing_threshold: Option<u32>,
    pacing_delay_secs: Option<u64>,
    rate_limit_per_minute: Option<u32>,
    catalog_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_without_any_credentials() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(!config.messenger.enabled(), "messenger should be disabled without a token")?;
        ensure(!config.notify.ultramsg_enabled(), "ultramsg should be disabled by default")?;
        ensure(!config.notify.callmebot_enabled(), "callmebot should be disabled by default")?;
        ensure(config.engine.rate_limit_per_minute == 10, "default rate cap is 10/minute")?;
        ensure(config.engine.pacing_threshold == 2, "default pacing threshold is 2")?;
        Ok(())
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_PAGE_TOKEN", "page-token-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("mercabot.toml");
            fs::write(
                &path,
                r#"
[messenger]
access_token = "${TEST_PAGE_TOKEN}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            let token = config
                .messenger
                .access_token
                .as_ref()
                .ok_or_else(|| "access token should be present".to_string())?;
            ensure(
                token.expose_secret() == "page-token-from-env",
                "access token should be loaded from environment",
            )?;
            ensure(config.messenger.enabled(), "messenger should be enabled with a token")?;
            Ok(())
        })();

        clear_vars(&["TEST_PAGE_TOKEN"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("MERCABOT_DATABASE_URL", "sqlite://from-env.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("mercabot.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "programmatic override should win over env and file",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            Ok(())
        })();

        clear_vars(&["MERCABOT_DATABASE_URL"]);
        result
    }

    #[test]
    fn invalid_rate_limit_fails_validation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let error = match AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                rate_limit_per_minute: Some(0),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected validation failure".to_string()),
            Err(error) => error,
        };

        let mentions_field = matches!(
            error,
            ConfigError::Validation(ref message) if message.contains("rate_limit_per_minute")
        );
        ensure(mentions_field, "validation failure should mention the rate limit field")
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("MERCABOT_PAGE_ACCESS_TOKEN", "page-secret-value");
        env::set_var("MERCABOT_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("page-secret-value"),
                "debug output should not contain the page token",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty log format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["MERCABOT_PAGE_ACCESS_TOKEN", "MERCABOT_LOG_FORMAT"]);
        result
    }
}
