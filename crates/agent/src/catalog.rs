//! Agent role catalogs.
//!
//! A directory catalog reads role specs from an "active" agents directory.
//! When a sibling `<name>_compiled/` directory holds JSON specs, those are
//! preferred: they list first and load first.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use courier_core::{AgentCatalog, Error, Result};
use tracing::{debug, warn};

/// Compiled-directory files that are not agent specs.
const IGNORED_COMPILED: &[&str] = &["manifest.json", "README.json"];

/// Well-known container mount points, checked after walking up from the
/// working directory.
const CONTAINER_DEFAULTS: &[&str] = &["/repo/agents/ready", "/repo/agents/legacy_agents"];

/// Role specs on disk.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    active: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(active: impl Into<PathBuf>) -> Self {
        Self {
            active: active.into(),
        }
    }

    /// Locate the active directory.
    ///
    /// A configured directory wins if it exists. Otherwise the nearest
    /// `agents/ready` or `agents/legacy_agents` walking up from `start`.
    pub fn discover(configured: Option<&Path>, start: &Path) -> Option<Self> {
        if let Some(dir) = configured {
            if dir.is_dir() {
                return Some(Self::new(dir));
            }
            warn!(dir = %dir.display(), "Configured agents directory does not exist");
        }

        for dir in start.ancestors() {
            for candidate in [dir.join("agents/ready"), dir.join("agents/legacy_agents")] {
                if candidate.is_dir() {
                    debug!(dir = %candidate.display(), "Discovered agents directory");
                    return Some(Self::new(candidate));
                }
            }
        }

        CONTAINER_DEFAULTS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_dir())
            .map(Self::new)
    }

    pub fn active_dir(&self) -> &Path {
        &self.active
    }

    /// `<parent>/<active-name>_compiled`
    pub fn compiled_dir(&self) -> Option<PathBuf> {
        let name = self.active.file_name()?.to_string_lossy();
        let parent = self.active.parent()?;
        Some(parent.join(format!("{name}_compiled")))
    }

    async fn stems(dir: &Path, extension: &str, ignored: &[&str]) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::Internal(format!(
                    "cannot read agents directory {}: {e}",
                    dir.display()
                )));
            }
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::Internal(e.to_string()))?
        {
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().to_string();
            if ignored.contains(&file_name.as_str()) || !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(extension) {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                names.push(stem.to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn read_lossy(path: &Path) -> Result<Option<String>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Internal(format!(
                "cannot read agent spec {}: {e}",
                path.display()
            ))),
        }
    }
}

#[async_trait]
impl AgentCatalog for DirectoryCatalog {
    async fn list(&self) -> Result<Vec<String>> {
        if let Some(compiled) = self.compiled_dir() {
            let names = Self::stems(&compiled, "json", IGNORED_COMPILED).await?;
            if !names.is_empty() {
                return Ok(names);
            }
        }
        Self::stems(&self.active, "md", &[]).await
    }

    async fn load(&self, name: &str) -> Result<Option<String>> {
        if let Some(compiled) = self.compiled_dir() {
            if let Some(text) = Self::read_lossy(&compiled.join(format!("{name}.json"))).await? {
                return Ok(Some(text));
            }
        }
        Self::read_lossy(&self.active.join(format!("{name}.md"))).await
    }
}

/// In-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    specs: BTreeMap<String, String>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.specs.insert(name.into(), text.into());
        self
    }
}

#[async_trait]
impl AgentCatalog for StaticCatalog {
    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.specs.keys().cloned().collect())
    }

    async fn load(&self, name: &str) -> Result<Option<String>> {
        Ok(self.specs.get(name).cloned())
    }
}
