//! Layered runtime configuration.
//!
//! Sources, later ones winning:
//!
//! 1. built-in defaults
//! 2. `ledsense.{toml,yaml}` in the working directory, or the file given
//!    with `--config`
//! 3. `LEDSENSE__<SECTION>__<KEY>` environment variables
//! 4. the conventional `PORT` and `DATABASE_URL` variables
//!
//! `database.url` and `auth.secret` have no default and must come from one
//! of the sources. Environment values stay strings until a typed field
//! asks for a number or a boolean, so a secret such as `0123` is used
//! exactly as written.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use ledsense_api::auth::DEFAULT_TOKEN_TTL_HOURS;
use ledsense_api::server::{DEFAULT_PORT, ServerConfig};
use ledsense_db::PoolLimits;
use serde::Deserialize;

/// Base name of the optional configuration file.
const DEFAULT_CONFIG_NAME: &str = "ledsense";

/// Prefix for environment overrides.
const ENV_PREFIX: &str = "LEDSENSE";

/// Errors that can occur when loading settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// A source could not be read or the result could not be deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A value was present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// HTTP listener.
    pub server: ServerSettings,
    /// `PostgreSQL` connection pool.
    pub database: DatabaseSettings,
    /// Token signing and endpoint protection.
    pub auth: AuthSettings,
    /// Log filter and output format.
    pub logging: LoggingSettings,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
}

impl ServerSettings {
    /// Convert into the API crate's server configuration.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
        }
    }
}

/// Database settings.
#[derive(Clone, Deserialize)]
pub struct DatabaseSettings {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Pool size bound.
    pub max_connections: u32,
    /// Connection acquire timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds.
    pub idle_timeout_secs: u64,
    /// Apply bundled migrations at startup.
    pub run_migrations: bool,
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .field("run_migrations", &self.run_migrations)
            .finish()
    }
}

impl DatabaseSettings {
    /// Pool bounds for [`ledsense_db::PostgresPool::connect`].
    pub const fn pool_limits(&self) -> PoolLimits {
        PoolLimits {
            max_connections: self.max_connections,
            acquire_timeout: Duration::from_secs(self.connect_timeout_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
        }
    }
}

/// Authentication settings.
#[derive(Clone, Deserialize)]
pub struct AuthSettings {
    /// HS256 signing secret.
    pub secret: String,
    /// Token lifetime in hours.
    pub token_ttl_hours: i64,
    /// Require a bearer token on the state and history endpoints.
    pub protect_endpoints: bool,
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("secret", &"<redacted>")
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("protect_endpoints", &self.protect_endpoints)
            .finish()
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Settings {
    /// Load settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if a source is unreadable, a required key
    /// is missing, or a value is invalid.
    pub fn load(config_file: Option<&Path>) -> Result<Self, SettingsError> {
        Self::from_env_map(config_file, std::env::vars().collect())
    }

    /// Load settings using `env` in place of the process environment.
    ///
    /// # Errors
    ///
    /// See [`Settings::load`].
    pub fn from_env_map(
        config_file: Option<&Path>,
        env: HashMap<String, String>,
    ) -> Result<Self, SettingsError> {
        let file = config_file.map_or_else(
            || File::with_name(DEFAULT_CONFIG_NAME).required(false),
            |path| File::from(path).required(true),
        );
        let port = env.get("PORT").cloned();
        let database_url = env.get("DATABASE_URL").cloned();

        let settings: Self = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", i64::from(DEFAULT_PORT))?
            .set_default("database.max_connections", 5_i64)?
            .set_default("database.connect_timeout_secs", 5_i64)?
            .set_default("database.idle_timeout_secs", 300_i64)?
            .set_default("database.run_migrations", true)?
            .set_default("auth.token_ttl_hours", DEFAULT_TOKEN_TTL_HOURS)?
            .set_default("auth.protect_endpoints", false)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .source(Some(env)),
            )
            .set_override_option("server.port", port)?
            .set_override_option("database.url", database_url)?
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.auth.secret.is_empty() {
            return Err(SettingsError::Invalid(String::from(
                "auth.secret must not be empty",
            )));
        }
        if self.database.url.is_empty() {
            return Err(SettingsError::Invalid(String::from(
                "database.url must not be empty",
            )));
        }
        if self.auth.token_ttl_hours <= 0 {
            return Err(SettingsError::Invalid(format!(
                "auth.token_ttl_hours must be positive, got {}",
                self.auth.token_ttl_hours
            )));
        }
        Ok(())
    }
}
