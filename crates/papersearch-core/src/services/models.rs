use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::api::{ApiError, PaperApi};
use crate::storage::ModelConfigStore;
use crate::types::{AvailableModel, ModelConfig, ModelFunction};

#[derive(Debug, Default)]
struct State {
    config: Option<ModelConfig>,
    available: Vec<AvailableModel>,
}

/// Per-function model selection, backed by `/models` and `/models/config`.
pub struct ModelSettingsService {
    api: Arc<dyn PaperApi>,
    store: ModelConfigStore,
    state: Mutex<State>,
    loading_models: AtomicBool,
}

impl ModelSettingsService {
    pub fn new(api: Arc<dyn PaperApi>, store: ModelConfigStore) -> Self {
        Self {
            api,
            store,
            state: Mutex::new(State::default()),
            loading_models: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fetch the current config. Falls back to the local mirror when the
    /// backend can't be reached; `None` if neither has one.
    pub async fn load_config(&self) -> Option<ModelConfig> {
        let config = match self.api.model_config().await {
            Ok(config) => {
                if let Err(e) = self.store.save(&config) {
                    tracing::warn!(error = %e, "failed to mirror model config");
                }
                Some(config)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load model config, using local copy");
                self.store.load()
            }
        };
        if config.is_some() {
            self.state().config = config.clone();
        }
        config
    }

    pub async fn load_available_models(&self) -> Result<Vec<AvailableModel>, ApiError> {
        self.loading_models.store(true, Ordering::SeqCst);
        let result = self.api.list_models().await;
        self.loading_models.store(false, Ordering::SeqCst);

        let models = result.inspect_err(|e| {
            tracing::warn!(error = %e, "failed to list models");
        })?;
        tracing::debug!(count = models.len(), "available models loaded");
        self.state().available = models.clone();
        Ok(models)
    }

    /// Select `model` for `function`, then reload the config.
    ///
    /// On failure the error carries the backend's `detail`, if any.
    pub async fn update(
        &self,
        function: ModelFunction,
        model: &str,
    ) -> Result<Option<ModelConfig>, ApiError> {
        self.api
            .update_model_config(function, model)
            .await
            .inspect_err(|e| {
                tracing::warn!(function = function.wire_name(), model, error = %e, "model update failed");
            })?;
        tracing::info!(function = function.wire_name(), model, "model updated");
        Ok(self.load_config().await)
    }

    pub fn config(&self) -> Option<ModelConfig> {
        self.state().config.clone()
    }

    pub fn available_models(&self) -> Vec<AvailableModel> {
        self.state().available.clone()
    }

    pub fn is_loading_models(&self) -> bool {
        self.loading_models.load(Ordering::SeqCst)
    }
}
