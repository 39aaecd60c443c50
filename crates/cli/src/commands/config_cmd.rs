//! `courier config`: Configuration management commands.

use std::path::Path;

use anyhow::Context;
use courier_config::AppConfig;

use super::Loaded;

const REDACTED: &str = "***";

pub fn show(loaded: Loaded) -> anyhow::Result<()> {
    let mut config = loaded.config;
    if config.gateway.api_key.is_some() {
        config.gateway.api_key = Some(REDACTED.into());
    }
    if config.retrieval.access_token.is_some() {
        config.retrieval.access_token = Some(REDACTED.into());
    }
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub fn path(config_path: &Path) {
    println!("{}", config_path.display());
}

pub fn init(config_path: &Path) -> anyhow::Result<()> {
    if config_path.exists() {
        println!("  Config already exists at {}", config_path.display());
        return Ok(());
    }
    if let Some(dir) = config_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    std::fs::write(config_path, AppConfig::default_toml())
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!("  Wrote default config to {}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_writes_loadable_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        init(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.gateway.default_model, "openai/gpt-5.2-2025-12-11");

        std::fs::write(&path, "# edited\n").unwrap();
        init(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# edited\n");
        assert!(!written.is_empty());
    }
}
