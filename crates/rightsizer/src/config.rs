//! Operator configuration
//!
//! Sources, later ones overriding earlier:
//! 1. built-in defaults
//! 2. optional file named by `RIGHTSIZER_CONFIG_FILE` (TOML, YAML or JSON)
//! 3. `RIGHTSIZER_*` environment variables, `__` between nested keys
//!    (e.g. `RIGHTSIZER_POLICY__COOLDOWN_SECS=600`)

use anyhow::{Context, Result};
use rightsizer_lib::{ConfigError, ExecutorConfig, NamespaceFilter, Policy};
use serde::Deserialize;
use std::time::Duration;

pub const ENV_PREFIX: &str = "RIGHTSIZER";
pub const CONFIG_FILE_ENV: &str = "RIGHTSIZER_CONFIG_FILE";

/// Operator configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OperatorConfig {
    /// Name used for self-protection and in log events
    #[serde(default = "default_operator_name")]
    pub operator_name: String,

    /// Port for health and metrics endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Seconds between reconciliation cycles
    #[serde(default = "default_resize_interval")]
    pub resize_interval_secs: u64,

    #[serde(default)]
    pub policy: Policy,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub namespaces: NamespaceFilter,
}

fn default_operator_name() -> String {
    "right-sizer".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_resize_interval() -> u64 {
    30
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            operator_name: default_operator_name(),
            api_port: default_api_port(),
            resize_interval_secs: default_resize_interval(),
            policy: Policy::default(),
            executor: ExecutorConfig::default(),
            namespaces: NamespaceFilter::default(),
        }
    }
}

impl OperatorConfig {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).ok().filter(|f| !f.is_empty());
        Self::load_with(file.as_deref(), ENV_PREFIX)
    }

    /// Load from an optional file plus environment variables under `env_prefix`
    pub fn load_with(file: Option<&str>, env_prefix: &str) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        let config: OperatorConfig = builder
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("namespaces.include")
                    .with_list_parse_key("namespaces.exclude")
                    .with_list_parse_key("namespaces.system"),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine and executor must never see
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.policy.validate()?;
        self.executor.validate()?;
        if self.resize_interval_secs == 0 {
            return Err(ConfigError::ZeroSize("resize_interval_secs"));
        }
        Ok(())
    }

    pub fn resize_interval(&self) -> Duration {
        Duration::from_secs(self.resize_interval_secs)
    }
}
