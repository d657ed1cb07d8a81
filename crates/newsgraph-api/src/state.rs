use std::sync::Arc;
use std::time::Duration;

use newsgraph_core::config::Settings;
use newsgraph_core::traits::{DirectoryClient, LlmClient};
use newsgraph_directory::HttpDirectoryClient;
use newsgraph_jobs::JobTracker;
use newsgraph_llm::HttpLlmClient;
use newsgraph_pipeline::PipelineTuning;
use secrecy::SecretString;

/// API version string echoed in every response (spec.md §6).
pub const API_VERSION: &str = "v1";

/// Shared, clone-cheap application state threaded through every handler,
/// the way the teacher's `AppState` carries its graph/parser/index `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub llm: Arc<dyn LlmClient>,
    pub directory: Arc<dyn DirectoryClient>,
    pub jobs: Arc<JobTracker>,
    pub tuning: PipelineTuning,
}

impl AppState {
    /// Builds real HTTP-backed clients from `Settings` and starts the job
    /// tracker's background sweeper, mirroring the teacher's `AppState::new`
    /// async constructor that wires up its own concrete backends.
    pub fn from_settings(settings: &Settings, llm_api_key: SecretString) -> anyhow::Result<Self> {
        let llm = HttpLlmClient::new(
            "https://api.openai.com/v1",
            llm_api_key,
            settings.llm_model_id.clone(),
            settings.llm_timeout_seconds,
            settings.max_retries,
            settings.max_wait_seconds,
        )?;
        let directory = HttpDirectoryClient::new(
            settings.directory_url.clone(),
            settings.directory_key.clone(),
            settings.max_retries,
            settings.max_wait_seconds,
        );
        let jobs = Arc::new(JobTracker::new(
            Duration::from_secs(settings.job_retention_minutes * 60),
            10_000,
        ));
        jobs.spawn_sweeper();

        Ok(Self {
            llm: Arc::new(llm),
            directory: Arc::new(directory),
            jobs,
            tuning: PipelineTuning {
                llm_max_tokens: settings.llm_max_tokens,
                llm_temperature: settings.llm_temperature,
                async_processing_threshold_chars: settings.async_processing_threshold_chars,
                working_language: settings.working_language.clone(),
            },
        })
    }
}
