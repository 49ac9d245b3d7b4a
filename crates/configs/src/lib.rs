//! tutorlink/crates/configs
//!
//! Layered runtime settings: optional `config/default.*` and `config/local.*`
//! files, then `TUTORLINK_*` environment variables on top. Secrets are held
//! in [`secrecy`] wrappers so they never leak through `Debug` or logs.

use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Tracing filter directive, e.g. `info` or `services=debug,info`.
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Logical project/namespace the document store scopes collections to.
    pub project_id: String,
    /// Credential for a hosted document store; unused by the in-memory one.
    pub api_key: Option<SecretString>,
    /// Starts the store in offline mode, for outage rehearsal.
    pub offline: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            project_id: "tutorlink-local".to_string(),
            api_key: None,
            offline: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log: LogSettings,
    pub store: StoreSettings,
}

impl Settings {
    /// Loads settings from files and environment.
    ///
    /// Nested keys use double underscores: `TUTORLINK_STORE__PROJECT_ID`.
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env file is fine; variables may come from the shell.
        dotenvy::dotenv().ok();
        let cfg = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("TUTORLINK").separator("__"))
            .build()?;
        let settings: Settings = cfg.try_deserialize()?;
        debug!(project_id = %settings.store.project_id, "settings loaded");
        Ok(settings)
    }
}
