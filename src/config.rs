//! Binary configuration: engine settings plus logging

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing_subscriber::EnvFilter;
use trajhook_core::EngineConfig;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty, compact)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LoggingConfig {
    /// Resolve the active filter: CLI flag, then `RUST_LOG`, then this config
    pub fn filter(&self, cli_level: Option<&str>) -> EnvFilter {
        Self::resolve_filter(cli_level, std::env::var("RUST_LOG").ok().as_deref(), &self.level)
    }

    fn resolve_filter(cli_level: Option<&str>, env: Option<&str>, file_level: &str) -> EnvFilter {
        let directive = cli_level
            .or(env.filter(|value| !value.is_empty()))
            .unwrap_or(file_level);
        EnvFilter::new(directive)
    }

    /// Install the global subscriber
    pub fn init(&self, cli_level: Option<&str>, cli_format: Option<LogFormat>) -> anyhow::Result<()> {
        let filter = self.filter(cli_level);
        let result = match cli_format.unwrap_or(self.format) {
            LogFormat::Pretty => tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .try_init(),
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .try_init(),
            LogFormat::Compact => tracing_subscriber::fmt()
                .compact()
                .with_env_filter(filter)
                .try_init(),
        };
        result.map_err(|e| anyhow::anyhow!("failed to initialise logging: {}", e))
    }
}

/// Contents of `trajhook.toml`
///
/// ```toml
/// [logging]
/// level = "debug"
/// format = "compact"
///
/// [inbox]
/// gate_timeout = "5s"
///
/// [hooks]
/// default_priority = 0
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    #[serde(flatten)]
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("invalid trajhook configuration")
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }
}
