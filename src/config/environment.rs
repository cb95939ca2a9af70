use super::{ConfigError, Configuration, SetOptions};
use serde_json::{Value, json};
use std::env;
use url::Url;

pub const INIT_KEY: &str = "init";
pub const INSTANCE_ID_KEY: &str = "instanceId";
pub const APP_NAME_KEY: &str = "appName";
pub const APP_RUNTIME_KEY: &str = "appRuntime";
pub const SERVICE_PROVIDER_URL_KEY: &str = "serviceProviderUrl";

pub const DEFAULT_SERVICE_PROVIDER_URL: &str = "http://127.0.0.1:8500/v1";

/// Process environment read once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub app_name: Option<String>,
    pub app_runtime: Option<String>,
    pub service_provider_url: Url,
}

impl Environment {
    /// Reads `APP_NAME`, `APP_RUNTIME` and `SERVICE_PROVIDER_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_values(
            env::var("APP_NAME").ok(),
            env::var("APP_RUNTIME").ok(),
            env::var("SERVICE_PROVIDER_URL").ok(),
        )
    }

    /// Builds an environment from explicit values instead of process variables.
    pub fn from_values(
        app_name: Option<String>,
        app_runtime: Option<String>,
        service_provider_url: Option<String>,
    ) -> Result<Self, ConfigError> {
        let raw_url = service_provider_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SERVICE_PROVIDER_URL.to_string());
        let service_provider_url = Url::parse(&raw_url).map_err(|e| {
            ConfigError::Misconfigured(format!("invalid SERVICE_PROVIDER_URL '{raw_url}': {e}"))
        })?;

        Ok(Self {
            app_name,
            app_runtime,
            service_provider_url,
        })
    }

    /// Seeds persistent configuration on a cold start.
    ///
    /// Returns `false` when the store was already initialized. Otherwise the
    /// store is wiped (a fresh deployment starts from nothing) and the
    /// environment is written together with the `init` flag and a new
    /// instance id.
    pub fn seed(&self, config: &Configuration) -> Result<bool, ConfigError> {
        if config.get(INIT_KEY)? == Some(Value::Bool(true)) {
            return Ok(false);
        }

        config.clear()?;

        let instance_id = uuid::Uuid::new_v4().to_string();
        config.set_multiple(
            [
                (INIT_KEY.to_string(), json!(true)),
                (INSTANCE_ID_KEY.to_string(), json!(instance_id)),
                (APP_NAME_KEY.to_string(), json!(self.app_name)),
                (APP_RUNTIME_KEY.to_string(), json!(self.app_runtime)),
                (
                    SERVICE_PROVIDER_URL_KEY.to_string(),
                    json!(self.service_provider_url.as_str()),
                ),
            ],
            SetOptions::persistent(),
        )?;

        tracing::info!(
            instance_id = %instance_id,
            app_name = ?self.app_name,
            "Seeded configuration from environment"
        );
        Ok(true)
    }
}
