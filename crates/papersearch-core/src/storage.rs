//! Local mirror of the backend's model configuration.
//!
//! The last config fetched from `/models/config` is written to a JSON file so
//! the settings view has something to show when the backend is unreachable.

use std::path::{Path, PathBuf};

use crate::CoreError;
use crate::types::ModelConfig;

/// `<cache_dir>/papersearch/model_config.json`.
pub fn default_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("papersearch").join("model_config.json"))
}

#[derive(Debug, Clone)]
pub struct ModelConfigStore {
    path: Option<PathBuf>,
}

impl Default for ModelConfigStore {
    fn default() -> Self {
        Self {
            path: default_path(),
        }
    }
}

impl ModelConfigStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A store that never reads or writes anything.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The mirrored config, if one was saved and still parses.
    pub fn load(&self) -> Option<ModelConfig> {
        let path = self.path.as_ref()?;
        let content = std::fs::read(path).ok()?;
        match serde_json::from_slice(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "discarding corrupt model config mirror");
                None
            }
        }
    }

    pub fn save(&self, config: &ModelConfig) -> Result<(), CoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(config)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ModelConfig {
        ModelConfig {
            analysis_model: "qwen2.5:7b".into(),
            translation_model: "gemma2:9b".into(),
            quick_summary_model: "llama3.2:3b".into(),
            detailed_summary_model: "qwen2.5:14b".into(),
        }
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelConfigStore::at(dir.path().join("sub").join("model_config.json"));
        assert!(store.load().is_none());
        store.save(&config()).unwrap();
        assert_eq!(store.load(), Some(config()));
    }

    #[test]
    fn corrupt_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_config.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(ModelConfigStore::at(path).load().is_none());
    }

    #[test]
    fn disabled_store_is_inert() {
        let store = ModelConfigStore::disabled();
        store.save(&config()).unwrap();
        assert!(store.load().is_none());
        assert!(store.path().is_none());
    }
}
