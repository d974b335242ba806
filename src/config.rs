//! Process-wide configuration.
//!
//! Per-assessment options travel with each request (see
//! `types::RawAssessmentConfig`); this only covers the defaults and paths
//! the process needs at startup, loaded via the `config` crate layered
//! over `SQLBENCH_`-prefixed environment variables.

use serde::Deserialize;

use crate::error::CoreError;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_gold_tasks_path")]
    pub gold_tasks_path: String,
    #[serde(default = "default_dialect")]
    pub default_dialect: String,
    #[serde(default = "default_scorer_preset")]
    pub default_scorer_preset: String,
    #[serde(default = "default_log_level")]
    pub bind_log_level: String,
}

fn default_gold_tasks_path() -> String {
    "fixtures/gold_tasks.json".to_string()
}

fn default_dialect() -> String {
    "sqlite".to_string()
}

fn default_scorer_preset() -> String {
    "default".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    pub fn load() -> Result<Self, CoreError> {
        config::Config::builder()
            .set_default("gold_tasks_path", default_gold_tasks_path())
            .map_err(config_err)?
            .set_default("default_dialect", default_dialect())
            .map_err(config_err)?
            .set_default("default_scorer_preset", default_scorer_preset())
            .map_err(config_err)?
            .set_default("bind_log_level", default_log_level())
            .map_err(config_err)?
            .add_source(config::Environment::with_prefix("SQLBENCH"))
            .build()
            .map_err(config_err)?
            .try_deserialize()
            .map_err(config_err)
    }
}

fn config_err(e: config::ConfigError) -> CoreError {
    CoreError::Configuration(e.to_string())
}
