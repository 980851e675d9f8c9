use std::time::Duration;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

use crate::search::SERPER_URL;

const ENV_PREFIX: &str = "OPTIMIZER";

/// Settings read from `OPTIMIZER_*` environment variables, with defaults.
/// CLI flags override these before they reach the pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default)]
    pub search_api_key: String,
    pub openai_base_url: String,
    pub model: String,
    pub temperature: f32,
    pub completion_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub fetch_delay_ms: u64,
    pub fetch_jitter_ms: u64,
    pub search_results: usize,
    pub search_endpoint: String,
    pub user_agent: String,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_builder(Config::builder().add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true)))
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        builder
            .set_default("openai_base_url", "https://api.openai.com/v1")?
            .set_default("model", "gpt-4o-mini")?
            .set_default("temperature", 0.5_f64)?
            .set_default("completion_timeout_secs", 120_i64)?
            .set_default("fetch_timeout_secs", 20_i64)?
            .set_default("fetch_delay_ms", 1500_i64)?
            .set_default("fetch_jitter_ms", 1000_i64)?
            .set_default("search_results", 5_i64)?
            .set_default("search_endpoint", SERPER_URL)?
            .set_default(
                "user_agent",
                concat!("content_optimizer/", env!("CARGO_PKG_VERSION")),
            )?
            .build()?
            .try_deserialize()
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_secs)
    }

    pub fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_delay_ms)
    }

    pub fn fetch_jitter(&self) -> Duration {
        Duration::from_millis(self.fetch_jitter_ms)
    }
}
