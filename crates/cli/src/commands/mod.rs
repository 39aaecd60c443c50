pub mod agents;
pub mod chat;
pub mod config_cmd;
pub mod evidence;
pub mod model;

use std::path::{Path, PathBuf};

use anyhow::Context;
use courier_config::AppConfig;

/// Configuration plus the directory relative paths resolve against.
pub struct Loaded {
    pub config: AppConfig,
    pub config_dir: PathBuf,
}

/// Load `path` with process environment overrides.
pub fn load(path: &Path) -> anyhow::Result<Loaded> {
    let config = AppConfig::load_with(path, |key| std::env::var(key).ok())
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    let config_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_dir);
    tracing::debug!(path = %path.display(), model = %config.gateway.default_model, "Loaded configuration");
    Ok(Loaded { config, config_dir })
}

pub fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
