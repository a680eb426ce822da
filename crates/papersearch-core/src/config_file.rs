use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub api: Option<ApiConfig>,
    pub search: Option<SearchConfig>,
    pub queue: Option<QueueConfig>,
    pub storage: Option<StorageConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    pub default_limit: Option<u32>,
    /// `relevance`, `date` or `citations`.
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueConfig {
    pub enabled: Option<bool>,
    pub debounce_ms: Option<u64>,
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    pub model_config_path: Option<String>,
}

/// Platform config directory path: `<config_dir>/papersearch/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("papersearch").join("config.toml"))
}

/// Load config by cascading CWD `.papersearch.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".papersearch.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

/// First `Some` of `f(overlay)` and `f(base)`.
fn pick<S, T>(overlay: &Option<S>, base: &Option<S>, f: impl Fn(&S) -> Option<T>) -> Option<T> {
    overlay.as_ref().and_then(&f).or_else(|| base.as_ref().and_then(&f))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        api: Some(ApiConfig {
            base_url: pick(&overlay.api, &base.api, |a| a.base_url.clone()),
            timeout_secs: pick(&overlay.api, &base.api, |a| a.timeout_secs),
        }),
        search: Some(SearchConfig {
            default_limit: pick(&overlay.search, &base.search, |s| s.default_limit),
            sort: pick(&overlay.search, &base.search, |s| s.sort.clone()),
        }),
        queue: Some(QueueConfig {
            enabled: pick(&overlay.queue, &base.queue, |q| q.enabled),
            debounce_ms: pick(&overlay.queue, &base.queue, |q| q.debounce_ms),
            interval_ms: pick(&overlay.queue, &base.queue, |q| q.interval_ms),
        }),
        storage: Some(StorageConfig {
            model_config_path: pick(&overlay.storage, &base.storage, |s| {
                s.model_config_path.clone()
            }),
        }),
    }
}

pub fn save_to_path(config: &ConfigFile, path: &Path) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
