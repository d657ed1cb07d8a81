use std::env;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::validation::validate_language_code;

/// Runtime configuration for the extraction engine (spec.md §6). Every field
/// maps to exactly one environment variable; there is no file-based layering
/// or hot reload here, unlike the teacher's `ConfigManager` — this service
/// has no config directory to watch, only process environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(skip_serializing)]
    pub llm_api_key: SecretString,
    #[serde(default = "Settings::default_llm_model_id")]
    pub llm_model_id: String,
    #[serde(default = "Settings::default_llm_timeout_seconds")]
    pub llm_timeout_seconds: u64,
    #[serde(default = "Settings::default_llm_temperature")]
    pub llm_temperature: f32,
    #[serde(default = "Settings::default_llm_max_tokens")]
    pub llm_max_tokens: u32,

    pub directory_url: String,
    #[serde(skip_serializing)]
    pub directory_key: SecretString,

    #[serde(default = "Settings::default_working_language")]
    pub working_language: String,

    #[serde(default = "Settings::default_async_threshold")]
    pub async_processing_threshold_chars: usize,
    #[serde(default = "Settings::default_job_retention_minutes")]
    pub job_retention_minutes: u64,
    #[serde(default = "Settings::default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "Settings::default_max_wait_seconds")]
    pub max_wait_seconds: u64,

    #[serde(default = "Settings::default_log_level")]
    pub log_level: String,
    #[serde(default = "Settings::default_prompts_dir")]
    pub prompts_dir: String,

    #[serde(default = "Settings::default_server_host")]
    pub server_host: String,
    #[serde(default = "Settings::default_server_port")]
    pub server_port: u16,
}

impl Settings {
    fn default_llm_model_id() -> String {
        "gpt-4o-mini".to_string()
    }

    fn default_llm_timeout_seconds() -> u64 {
        30
    }

    fn default_llm_temperature() -> f32 {
        0.2
    }

    fn default_llm_max_tokens() -> u32 {
        4096
    }

    fn default_working_language() -> String {
        "en".to_string()
    }

    fn default_async_threshold() -> usize {
        10_000
    }

    fn default_job_retention_minutes() -> u64 {
        60
    }

    fn default_max_retries() -> u32 {
        3
    }

    fn default_max_wait_seconds() -> u64 {
        60
    }

    fn default_log_level() -> String {
        "info".to_string()
    }

    fn default_prompts_dir() -> String {
        "prompts".to_string()
    }

    fn default_server_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_server_port() -> u16 {
        8080
    }

    /// Loads settings from the process environment, the way the teacher's
    /// `ConfigManager` layers `config::Environment` over file defaults — here
    /// there are no files, only the keys spec.md §6 names.
    pub fn from_env() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .set_default("llm_model_id", Self::default_llm_model_id())?
            .set_default("llm_timeout_seconds", Self::default_llm_timeout_seconds())?
            .set_default("llm_temperature", Self::default_llm_temperature() as f64)?
            .set_default("llm_max_tokens", Self::default_llm_max_tokens())?
            .set_default("working_language", Self::default_working_language())?
            .set_default(
                "async_processing_threshold_chars",
                Self::default_async_threshold() as i64,
            )?
            .set_default(
                "job_retention_minutes",
                Self::default_job_retention_minutes(),
            )?
            .set_default("max_retries", Self::default_max_retries())?
            .set_default("max_wait_seconds", Self::default_max_wait_seconds())?
            .set_default("log_level", Self::default_log_level())?
            .set_default("prompts_dir", Self::default_prompts_dir())?
            .set_default("server_host", Self::default_server_host())?
            .set_default("server_port", Self::default_server_port() as i64)?
            .add_source(
                config::Environment::default()
                    .try_parsing(true)
                    .source(Some(Self::env_map())),
            )
            .build()?;

        let loaded: Self = settings.try_deserialize()?;
        loaded.validate()?;
        info!(model = %loaded.llm_model_id, directory_url = %loaded.directory_url, "settings loaded");
        Ok(loaded)
    }

    /// Maps the exact spec.md §6 env var names (upper snake case) onto the
    /// lower snake case field names `config::Environment` expects.
    fn env_map() -> std::collections::HashMap<String, String> {
        let keys = [
            ("LLM_API_KEY", "llm_api_key"),
            ("LLM_MODEL_ID", "llm_model_id"),
            ("LLM_TIMEOUT_SECONDS", "llm_timeout_seconds"),
            ("LLM_TEMPERATURE", "llm_temperature"),
            ("LLM_MAX_TOKENS", "llm_max_tokens"),
            ("DIRECTORY_URL", "directory_url"),
            ("DIRECTORY_KEY", "directory_key"),
            ("WORKING_LANGUAGE", "working_language"),
            (
                "ASYNC_PROCESSING_THRESHOLD_CHARS",
                "async_processing_threshold_chars",
            ),
            ("JOB_RETENTION_MINUTES", "job_retention_minutes"),
            ("MAX_RETRIES", "max_retries"),
            ("MAX_WAIT_SECONDS", "max_wait_seconds"),
            ("LOG_LEVEL", "log_level"),
            ("PROMPTS_DIR", "prompts_dir"),
            ("SERVER_HOST", "server_host"),
            ("SERVER_PORT", "server_port"),
        ];
        keys.iter()
            .filter_map(|(env_key, field)| env::var(env_key).ok().map(|v| (field.to_string(), v)))
            .collect()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.directory_url.trim().is_empty(),
            "DIRECTORY_URL cannot be empty"
        );
        anyhow::ensure!(self.max_retries > 0, "MAX_RETRIES must be > 0");
        anyhow::ensure!(
            self.max_wait_seconds > 0,
            "MAX_WAIT_SECONDS must be > 0"
        );
        anyhow::ensure!(
            self.llm_timeout_seconds > 0,
            "LLM_TIMEOUT_SECONDS must be > 0"
        );
        anyhow::ensure!(
            (0.0..=2.0).contains(&self.llm_temperature),
            "LLM_TEMPERATURE must be within 0.0..=2.0"
        );
        validate_language_code(&self.working_language)
            .map_err(|e| anyhow::anyhow!("WORKING_LANGUAGE invalid: {e}"))?;
        Ok(())
    }
}
