//! Model allowlists: which versioned model ids each gateway provider accepts.
//!
//! The gateway's virtual keys only admit specific, versioned model ids per
//! provider. Checking locally turns a rejected call into a readable
//! validation message before any network traffic.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use courier_config::AllowlistConfig;

/// Result of checking a model id against the allowlist.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelCheckResult {
    /// Model is listed for its provider
    Allowed,
    /// Provider has no (or an empty) allowlist; anything goes
    Unrestricted { provider: String },
    /// Model id is malformed or not listed
    Denied { model: String, reason: String },
}

/// Provider (lowercase) → set of admitted model ids.
///
/// Loaded once at startup and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct ModelAllowlist {
    providers: HashMap<String, HashSet<String>>,
}

impl ModelAllowlist {
    /// An allowlist that restricts nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add ids for a provider, merging with any already present.
    pub fn with_provider<I, S>(mut self, provider: &str, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extend_provider(provider, ids);
        self
    }

    fn extend_provider<I, S>(&mut self, provider: &str, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = self
            .providers
            .entry(provider.trim().to_lowercase())
            .or_default();
        set.extend(
            ids.into_iter()
                .map(|id| id.into().trim().to_string())
                .filter(|id| !id.is_empty()),
        );
    }

    /// Build from the `[allowlists.<provider>]` config tables.
    ///
    /// Relative file paths resolve against `base_dir`. A file that cannot be
    /// read or parsed contributes nothing and is logged.
    pub fn from_config(tables: &HashMap<String, AllowlistConfig>, base_dir: &Path) -> Self {
        let mut allowlist = Self::new();
        for (provider, table) in tables {
            allowlist.extend_provider(provider, table.models.iter().cloned());
            for file in &table.files {
                let path = if file.is_absolute() {
                    file.clone()
                } else {
                    base_dir.join(file)
                };
                allowlist.extend_provider(provider, load_id_file(&path));
            }
            tracing::debug!(
                provider = %provider,
                models = allowlist.models_for(provider).map_or(0, |s| s.len()),
                "Loaded model allowlist"
            );
        }
        allowlist
    }

    /// Admitted ids for a provider, if a list exists.
    pub fn models_for(&self, provider: &str) -> Option<&HashSet<String>> {
        self.providers.get(&provider.trim().to_lowercase())
    }

    /// Check a provider-prefixed model id.
    ///
    /// Rules:
    /// - Blank → denied
    /// - No `provider/` prefix → denied
    /// - Provider without a non-empty list → unrestricted
    /// - Otherwise the id (bare or prefixed) must be listed
    pub fn check(&self, model: &str) -> ModelCheckResult {
        let raw = model.trim();
        if raw.is_empty() {
            return ModelCheckResult::Denied {
                model: String::new(),
                reason: "model is required".into(),
            };
        }

        let Some((provider, model_id)) = raw.split_once('/') else {
            return ModelCheckResult::Denied {
                model: raw.into(),
                reason: "model must be provider-prefixed (e.g., openai/gpt-5.2-2025-12-11)".into(),
            };
        };

        let allowed = match self.models_for(provider) {
            Some(set) if !set.is_empty() => set,
            _ => {
                return ModelCheckResult::Unrestricted {
                    provider: provider.trim().to_lowercase(),
                };
            }
        };

        if allowed.contains(model_id.trim()) || allowed.contains(raw) {
            ModelCheckResult::Allowed
        } else {
            ModelCheckResult::Denied {
                model: raw.into(),
                reason: format!(
                    "Model '{raw}' is not in the allowlist for provider '{provider}' ({} ids configured). \
                     Use a versioned, VK-allowed model id.",
                    allowed.len()
                ),
            }
        }
    }
}

/// Read a JSON array of model ids. Non-string entries are stringified.
fn load_id_file(path: &Path) -> Vec<String> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Allowlist file unreadable");
            return Vec::new();
        }
    };

    match serde_json::from_str::<serde_json::Value>(&content) {
        Ok(serde_json::Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        Ok(_) => {
            tracing::warn!(path = %path.display(), "Allowlist file is not a JSON array");
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Allowlist file is not valid JSON");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn openai() -> ModelAllowlist {
        ModelAllowlist::new().with_provider(
            "OpenAI",
            ["gpt-5-mini-2025-08-07", "gpt-5.2-2025-12-11"],
        )
    }

    #[test]
    fn listed_model_is_allowed() {
        assert_eq!(
            openai().check("openai/gpt-5-mini-2025-08-07"),
            ModelCheckResult::Allowed
        );
    }

    #[test]
    fn provider_match_is_case_insensitive() {
        assert_eq!(
            openai().check("OPENAI/gpt-5.2-2025-12-11"),
            ModelCheckResult::Allowed
        );
    }

    #[test]
    fn unlisted_model_is_denied_with_its_name() {
        let result = openai().check("openai/gpt-5-mini");
        match result {
            ModelCheckResult::Denied { model, reason } => {
                assert_eq!(model, "openai/gpt-5-mini");
                assert!(reason.contains("openai/gpt-5-mini"));
                assert!(reason.contains("'openai'"));
            }
            other => panic!("expected denial, got {other:?}"),
        }
    }

    #[test]
    fn unknown_or_empty_provider_is_unrestricted() {
        let list = openai().with_provider("vertex", Vec::<String>::new());
        assert_eq!(
            list.check("anthropic/claude-x"),
            ModelCheckResult::Unrestricted {
                provider: "anthropic".into()
            }
        );
        assert!(matches!(
            list.check("vertex/gemini-2.5-pro"),
            ModelCheckResult::Unrestricted { .. }
        ));
    }

    #[test]
    fn malformed_ids_are_denied() {
        assert!(matches!(
            openai().check("   "),
            ModelCheckResult::Denied { .. }
        ));
        assert!(matches!(
            openai().check("gpt-5-mini"),
            ModelCheckResult::Denied { reason, .. } if reason.contains("provider-prefixed")
        ));
    }

    #[test]
    fn from_config_merges_inline_ids_and_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("global.json"), r#"["gemini-2.5-pro", " "]"#).unwrap();
        std::fs::write(dir.path().join("us.json"), r#"["gemini-2.5-flash"]"#).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();

        let mut tables = HashMap::new();
        tables.insert(
            "vertex".to_string(),
            AllowlistConfig {
                models: vec!["gemini-2.0".into()],
                files: vec![
                    PathBuf::from("global.json"),
                    PathBuf::from("us.json"),
                    PathBuf::from("broken.json"),
                    PathBuf::from("missing.json"),
                ],
            },
        );

        let list = ModelAllowlist::from_config(&tables, dir.path());
        let vertex = list.models_for("vertex").unwrap();
        assert_eq!(vertex.len(), 3);
        assert_eq!(list.check("vertex/gemini-2.5-flash"), ModelCheckResult::Allowed);
        assert!(matches!(
            list.check("vertex/gemini-1.0"),
            ModelCheckResult::Denied { .. }
        ));
    }
}
