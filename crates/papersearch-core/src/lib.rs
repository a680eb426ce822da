use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub mod api;
pub mod cache;
pub mod config_file;
pub mod identity;
pub mod queue;
pub mod services;
pub mod session;
pub mod storage;
pub mod stream;
pub mod task;
pub mod types;

// Re-export for convenience
pub use api::{ApiError, HttpPaperApi, PaperApi};
pub use identity::PaperId;
pub use queue::{AutoSummarizeQueue, Deferral, QueueEvent, QueueOptions, StepOutcome};
pub use services::{SearchParams, SortOrder, Trigger};
pub use session::{Session, SessionOptions};
pub use task::{PriorityTask, TaskKind};
pub use types::{
    AnalysisResult, AvailableModel, ModelConfig, ModelFunction, Paper, QuickSummary,
    SummaryData,
};

use config_file::ConfigFile;
use services::{DEFAULT_RESULT_LIMIT, normalize_limit};
use storage::ModelConfigStore;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to serialize config: {0}")]
    Toml(#[from] toml::ser::Error),
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    /// `None` waits indefinitely.
    pub api_timeout: Option<Duration>,
    pub default_limit: u32,
    pub sort: SortOrder,
    pub queue: QueueOptions,
    /// Where the model config mirror lives; `None` disables it.
    pub model_config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: api::DEFAULT_BASE_URL.to_string(),
            api_timeout: None,
            default_limit: DEFAULT_RESULT_LIMIT,
            sort: SortOrder::default(),
            queue: QueueOptions::default(),
            model_config_path: storage::default_path(),
        }
    }
}

impl Config {
    /// Defaults overlaid with whatever `file` sets.
    pub fn from_file(file: &ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(api) = &file.api {
            if let Some(url) = &api.base_url {
                config.api_base_url = url.trim_end_matches('/').to_string();
            }
            if let Some(secs) = api.timeout_secs {
                config.api_timeout = (secs > 0).then(|| Duration::from_secs(secs));
            }
        }
        if let Some(search) = &file.search {
            if let Some(limit) = search.default_limit {
                config.default_limit = normalize_limit(limit);
            }
            if let Some(sort) = &search.sort {
                match sort.parse() {
                    Ok(sort) => config.sort = sort,
                    Err(e) => tracing::warn!(error = %e, "ignoring [search] sort"),
                }
            }
        }
        if let Some(queue) = &file.queue {
            if let Some(enabled) = queue.enabled {
                config.queue.enabled = enabled;
            }
            if let Some(ms) = queue.debounce_ms {
                config.queue.debounce = Duration::from_millis(ms);
            }
            if let Some(ms) = queue.interval_ms {
                config.queue.interval = Duration::from_millis(ms.max(1));
            }
        }
        if let Some(path) = file
            .storage
            .as_ref()
            .and_then(|s| s.model_config_path.as_ref())
        {
            config.model_config_path = (!path.is_empty()).then(|| PathBuf::from(path));
        }

        config
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            queue: self.queue.clone(),
            model_store: match &self.model_config_path {
                Some(path) => ModelConfigStore::at(path),
                None => ModelConfigStore::disabled(),
            },
            sort: self.sort,
        }
    }
}
