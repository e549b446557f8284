//! Settings for opening a [`Database`](crate::Database).
//!
//! [`QuarryConfig::load`] reads the `[database]` section of
//! `config/quarry.toml` (optional) and then environment variables such as
//! `QUARRY__DATABASE__URL` or `QUARRY__DATABASE__TABLE_PREFIX`.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const CONFIG_FILE: &str = "config/quarry.toml";
const ENV_PREFIX: &str = "QUARRY";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct QuarryConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_pool_timeout_seconds")]
    pub pool_timeout_seconds: u64,
    /// Prepended to every derived table name.
    #[serde(default)]
    pub table_prefix: String,
    /// Render `LIMIT` in SQL instead of truncating fetched rows.
    #[serde(default = "default_true")]
    pub use_sql_limit: bool,
    /// Log every statement with its parameters and timing at `info`.
    #[serde(default = "default_true")]
    pub enable_sql_statistic: bool,
    /// `mysql`, `sqlite` or `postgres`; inferred from `url` when unset.
    #[serde(default)]
    pub dialect: Option<String>,
    /// Credentials merged into server URLs; ignored by SQLite.
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_url() -> String {
    "sqlite::memory:".to_string()
}

fn default_max_connections() -> usize {
    10
}

fn default_pool_timeout_seconds() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for QuarryConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            max_connections: default_max_connections(),
            pool_timeout_seconds: default_pool_timeout_seconds(),
            table_prefix: String::new(),
            use_sql_limit: true,
            enable_sql_statistic: true,
            dialect: None,
            user: None,
            password: None,
        }
    }
}

impl QuarryConfig {
    /// Load from `config/quarry.toml` and the environment.
    ///
    /// A file that exists but cannot be read or parsed is skipped with a
    /// warning and only the environment is used.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(CONFIG_FILE)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let settings = match Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(env_source())
            .build()
        {
            Ok(settings) => settings,
            Err(err) => {
                if path.exists() {
                    log::warn!(
                        "failed to load {}, falling back to environment: {err}",
                        path.display()
                    );
                }
                Config::builder()
                    .add_source(env_source())
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "configuration could not be loaded from file ({err}) or environment ({env_err})"
                        ))
                    })?
            }
        };

        // An absent section means all defaults.
        match settings.get::<QuarryConfig>("database") {
            Ok(config) => Ok(config),
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(err) => Err(ConfigError::Message(format!(
                "invalid [database] configuration: {err}"
            ))),
        }
    }

    pub fn pool_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_timeout_seconds)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}
