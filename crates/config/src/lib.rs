//! Configuration loading, validation, and management for Courier.
//!
//! Loads configuration from `~/.courier/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! Environment lookups go through a caller-supplied function, so overrides
//! can be exercised without touching the process environment.

use courier_core::{EvidenceLimits, EvidencePacket, SourceDescriptor, SourceKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.courier/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Completion gateway (Bifrost) settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Transient-failure retry settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Vertex AI Search settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Evidence packet limits
    #[serde(default)]
    pub evidence: EvidenceConfig,

    /// Agent role catalog settings
    #[serde(default)]
    pub agents: AgentsConfig,

    /// Per-provider model allowlists, keyed by lowercase provider prefix
    #[serde(default)]
    pub allowlists: HashMap<String, AllowlistConfig>,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

// ── Gateway ───────────────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Virtual key sent on every completion request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_credential_header")]
    pub credential_header: String,

    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_gateway_timeout")]
    pub request_timeout_secs: u64,

    /// Output-token cap applied to `/agent` turns (0 disables the cap)
    #[serde(default = "default_agent_max_output_tokens")]
    pub agent_max_output_tokens: u32,

    /// Upper clamp for caller-supplied output-token limits
    #[serde(default = "default_max_output_tokens_ceiling")]
    pub max_output_tokens_ceiling: u32,

    /// Temperature used by the direct chat path
    #[serde(default = "default_chat_temperature")]
    pub chat_temperature: f32,
}

fn default_base_url() -> String {
    "http://bifrost:8080".into()
}
fn default_credential_header() -> String {
    "x-bf-vk".into()
}
fn default_model() -> String {
    "openai/gpt-5.2-2025-12-11".into()
}
fn default_gateway_timeout() -> u64 {
    60
}
fn default_agent_max_output_tokens() -> u32 {
    2048
}
fn default_max_output_tokens_ceiling() -> u32 {
    4000
}
fn default_chat_temperature() -> f32 {
    0.2
}

impl GatewayConfig {
    /// Full chat-completions URL.
    pub fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Non-blank gateway credential, if any.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            credential_header: default_credential_header(),
            default_model: default_model(),
            request_timeout_secs: default_gateway_timeout(),
            agent_max_output_tokens: default_agent_max_output_tokens(),
            max_output_tokens_ceiling: default_max_output_tokens_ceiling(),
            chat_temperature: default_chat_temperature(),
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("credential_header", &self.credential_header)
            .field("default_model", &self.default_model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("agent_max_output_tokens", &self.agent_max_output_tokens)
            .field("max_output_tokens_ceiling", &self.max_output_tokens_ceiling)
            .field("chat_temperature", &self.chat_temperature)
            .finish()
    }
}

// ── Retry ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Further attempts allowed after a 502/503/504
    #[serde(default = "default_max_transient_retries")]
    pub max_transient_retries: u32,

    /// First backoff delay; doubles per retry
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_transient_retries() -> u32 {
    2
}
fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_transient_retries: default_max_transient_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

// ── Retrieval ─────────────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_retrieval_endpoint")]
    pub endpoint: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(default = "default_location")]
    pub location: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default = "default_serving_config")]
    pub serving_config: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drafts_datastore_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisional_datastore_id: Option<String>,

    /// Pre-issued bearer token; bypasses `token_command` when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(default = "default_token_command")]
    pub token_command: String,

    #[serde(default = "default_token_refresh_secs")]
    pub token_refresh_secs: u64,

    /// Upper bound on one run of `token_command`
    #[serde(default = "default_token_timeout")]
    pub token_timeout_secs: u64,

    #[serde(default = "default_retrieval_timeout")]
    pub request_timeout_secs: u64,
}

fn default_retrieval_endpoint() -> String {
    "https://discoveryengine.googleapis.com/v1".into()
}
fn default_location() -> String {
    "global".into()
}
fn default_collection() -> String {
    "default_collection".into()
}
fn default_serving_config() -> String {
    "default_search".into()
}
fn default_token_command() -> String {
    "gcloud auth application-default print-access-token".into()
}
fn default_token_refresh_secs() -> u64 {
    1800
}
fn default_token_timeout() -> u64 {
    30
}
fn default_retrieval_timeout() -> u64 {
    30
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl RetrievalConfig {
    /// Datastore id configured for a source, if any.
    pub fn datastore_for(&self, kind: SourceKind) -> Option<&str> {
        match kind {
            SourceKind::Drafts => non_blank(&self.drafts_datastore_id),
            SourceKind::Provisional => non_blank(&self.provisional_datastore_id),
        }
    }

    pub fn project(&self) -> Option<&str> {
        non_blank(&self.project_id)
    }

    pub fn explicit_token(&self) -> Option<&str> {
        non_blank(&self.access_token)
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            endpoint: default_retrieval_endpoint(),
            project_id: None,
            location: default_location(),
            collection: default_collection(),
            serving_config: default_serving_config(),
            drafts_datastore_id: None,
            provisional_datastore_id: None,
            access_token: None,
            token_command: default_token_command(),
            token_refresh_secs: default_token_refresh_secs(),
            token_timeout_secs: default_token_timeout(),
            request_timeout_secs: default_retrieval_timeout(),
        }
    }
}

impl std::fmt::Debug for RetrievalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalConfig")
            .field("endpoint", &self.endpoint)
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("collection", &self.collection)
            .field("serving_config", &self.serving_config)
            .field("drafts_datastore_id", &self.drafts_datastore_id)
            .field("provisional_datastore_id", &self.provisional_datastore_id)
            .field("access_token", &redact(&self.access_token))
            .field("token_command", &self.token_command)
            .field("token_refresh_secs", &self.token_refresh_secs)
            .field("token_timeout_secs", &self.token_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

// ── Evidence ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_max_snippet_chars")]
    pub max_snippet_chars: usize,

    #[serde(default = "default_max_packet_chars")]
    pub max_packet_chars: usize,

    /// Source that receives the leftover when the budget does not split evenly
    #[serde(default = "default_remainder_source")]
    pub remainder_source: SourceKind,

    /// Limits for the `+` command variants
    #[serde(default)]
    pub expanded: ExpandedEvidenceConfig,
}

fn default_max_results() -> usize {
    EvidenceLimits::standard().max_results
}
fn default_max_snippet_chars() -> usize {
    EvidenceLimits::standard().max_snippet_chars
}
fn default_max_packet_chars() -> usize {
    EvidenceLimits::standard().max_packet_chars
}
fn default_remainder_source() -> SourceKind {
    SourceKind::Drafts
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandedEvidenceConfig {
    #[serde(default = "default_expanded_max_results")]
    pub max_results: usize,

    #[serde(default = "default_expanded_max_snippet_chars")]
    pub max_snippet_chars: usize,

    #[serde(default = "default_expanded_max_packet_chars")]
    pub max_packet_chars: usize,
}

fn default_expanded_max_results() -> usize {
    EvidenceLimits::expanded().max_results
}
fn default_expanded_max_snippet_chars() -> usize {
    EvidenceLimits::expanded().max_snippet_chars
}
fn default_expanded_max_packet_chars() -> usize {
    EvidenceLimits::expanded().max_packet_chars
}

impl Default for ExpandedEvidenceConfig {
    fn default() -> Self {
        Self {
            max_results: default_expanded_max_results(),
            max_snippet_chars: default_expanded_max_snippet_chars(),
            max_packet_chars: default_expanded_max_packet_chars(),
        }
    }
}

impl EvidenceConfig {
    pub fn limits(&self, expanded: bool) -> EvidenceLimits {
        if expanded {
            EvidenceLimits {
                max_results: self.expanded.max_results,
                max_snippet_chars: self.expanded.max_snippet_chars,
                max_packet_chars: self.expanded.max_packet_chars,
            }
        } else {
            EvidenceLimits {
                max_results: self.max_results,
                max_snippet_chars: self.max_snippet_chars,
                max_packet_chars: self.max_packet_chars,
            }
        }
    }
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            max_snippet_chars: default_max_snippet_chars(),
            max_packet_chars: default_max_packet_chars(),
            expanded: ExpandedEvidenceConfig::default(),
            remainder_source: default_remainder_source(),
        }
    }
}

// ── Agents ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Active agents directory; discovered from the working directory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    #[serde(default = "default_system_prompt_max_chars")]
    pub system_prompt_max_chars: usize,
}

fn default_system_prompt_max_chars() -> usize {
    12000
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            system_prompt_max_chars: default_system_prompt_max_chars(),
        }
    }
}

// ── Allowlists ────────────────────────────────────────────────────────────

/// One provider's allowlist: inline ids plus JSON files of ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllowlistConfig {
    #[serde(default)]
    pub models: Vec<String>,

    /// Each file holds a JSON array of model ids
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

// ── Loading ───────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from the default path (~/.courier/config.toml)
    /// and apply process environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with(&config_path, |key| std::env::var(key).ok())
    }

    /// Load from `path`, then apply overrides read through `lookup`.
    pub fn load_with<F>(path: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::load_from(path)?;
        config.apply_env(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides.
    ///
    /// Where two variables name the same setting, the first one listed wins.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| lookup(k))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };

        if let Some(key) = get(&["BIFROST_API_KEY", "BIFROST_VK"]) {
            self.gateway.api_key = Some(key);
        }
        if let Some(url) = get(&["BIFROST_URL"]) {
            self.gateway.base_url = url;
        }
        if let Some(model) = get(&["BIFROST_MODEL"]) {
            self.gateway.default_model = model;
        }
        if let Some(n) = parse_override(
            get(&["COURIER_AGENT_MAX_COMPLETION_TOKENS"]),
            "COURIER_AGENT_MAX_COMPLETION_TOKENS",
        ) {
            self.gateway.agent_max_output_tokens = n;
        }

        if let Some(dir) = get(&["COURIER_AGENTS_DIR"]) {
            self.agents.dir = Some(PathBuf::from(dir));
        }
        if let Some(n) = parse_override(
            get(&["COURIER_AGENT_SYSTEM_PROMPT_MAX_CHARS"]),
            "COURIER_AGENT_SYSTEM_PROMPT_MAX_CHARS",
        ) {
            self.agents.system_prompt_max_chars = n;
        }

        if let Some(project) = get(&["COURIER_VERTEX_PROJECT_ID", "GOOGLE_CLOUD_PROJECT"]) {
            self.retrieval.project_id = Some(project);
        }
        if let Some(location) = get(&["COURIER_VERTEX_LOCATION", "GOOGLE_CLOUD_LOCATION"]) {
            self.retrieval.location = location;
        }
        if let Some(collection) = get(&["COURIER_VERTEX_COLLECTION"]) {
            self.retrieval.collection = collection;
        }
        if let Some(serving) = get(&["COURIER_VERTEX_SERVING_CONFIG"]) {
            self.retrieval.serving_config = serving;
        }
        if let Some(ds) = get(&["COURIER_VERTEX_DRAFTS_DATASTORE_ID"]) {
            self.retrieval.drafts_datastore_id = Some(ds);
        }
        if let Some(ds) = get(&["COURIER_VERTEX_PROVISIONAL_DATASTORE_ID"]) {
            self.retrieval.provisional_datastore_id = Some(ds);
        }
        if let Some(token) = get(&["COURIER_VERTEX_ACCESS_TOKEN", "VERTEX_ACCESS_TOKEN"]) {
            self.retrieval.access_token = Some(token);
        }

        if let Some(n) =
            parse_override(get(&["COURIER_EVIDENCE_MAX_RESULTS"]), "COURIER_EVIDENCE_MAX_RESULTS")
        {
            self.evidence.max_results = n;
        }
        if let Some(n) = parse_override(
            get(&["COURIER_EVIDENCE_MAX_SNIPPET_CHARS"]),
            "COURIER_EVIDENCE_MAX_SNIPPET_CHARS",
        ) {
            self.evidence.max_snippet_chars = n;
        }
        if let Some(n) = parse_override(
            get(&["COURIER_EVIDENCE_MAX_PACKET_CHARS"]),
            "COURIER_EVIDENCE_MAX_PACKET_CHARS",
        ) {
            self.evidence.max_packet_chars = n;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".courier")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let base = self.gateway.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::ValidationError(
                "gateway.base_url must be an http(s) URL".into(),
            ));
        }

        if self.gateway.credential_header.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "gateway.credential_header must not be empty".into(),
            ));
        }

        if self.gateway.max_output_tokens_ceiling == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.max_output_tokens_ceiling must be > 0".into(),
            ));
        }

        if !(0.0..=2.0).contains(&self.gateway.chat_temperature) {
            return Err(ConfigError::ValidationError(
                "gateway.chat_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.gateway.request_timeout_secs == 0
            || self.retrieval.request_timeout_secs == 0
            || self.retrieval.token_timeout_secs == 0
        {
            return Err(ConfigError::ValidationError(
                "request timeouts must be > 0".into(),
            ));
        }

        if self.retrieval.token_refresh_secs == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.token_refresh_secs must be > 0".into(),
            ));
        }

        for (section, limits) in [
            ("evidence", self.evidence.limits(false)),
            ("evidence.expanded", self.evidence.limits(true)),
        ] {
            if limits.max_results == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{section}.max_results must be >= 1"
                )));
            }
            let floor = self.empty_packet_chars();
            if limits.max_packet_chars != 0 && limits.max_packet_chars < floor {
                return Err(ConfigError::ValidationError(format!(
                    "{section}.max_packet_chars must be 0 or at least {floor} (an empty packet)"
                )));
            }
        }

        Ok(())
    }

    /// Size of the smallest packet the builder can produce: empty query, no
    /// results, every configured source marked failed.
    fn empty_packet_chars(&self) -> usize {
        let sources = SourceKind::ALL
            .into_iter()
            .filter_map(|kind| {
                self.retrieval.datastore_for(kind).map(|id| SourceDescriptor {
                    source_kind: kind,
                    datastore_id: id.to_string(),
                    failed: true,
                })
            })
            .collect();
        EvidencePacket::new("", sources).serialized_chars()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn parse_override<T: std::str::FromStr>(raw: Option<String>, key: &str) -> Option<T> {
    let raw = raw?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable numeric override");
            None
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gateway.base_url, "http://bifrost:8080");
        assert_eq!(config.gateway.credential_header, "x-bf-vk");
        assert_eq!(config.gateway.default_model, "openai/gpt-5.2-2025-12-11");
        assert_eq!(config.retry.max_transient_retries, 2);
        assert_eq!(config.evidence.remainder_source, SourceKind::Drafts);
        assert_eq!(config.agents.system_prompt_max_chars, 12000);
    }

    #[test]
    fn evidence_limits_match_command_variants() {
        let config = AppConfig::default();
        assert_eq!(config.evidence.limits(false), EvidenceLimits::standard());
        assert_eq!(config.evidence.limits(true), EvidenceLimits::expanded());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.gateway.base_url, config.gateway.base_url);
        assert_eq!(parsed.evidence.expanded.max_results, 12);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [gateway]
            base_url = "https://gw.internal"

            [evidence]
            max_results = 7
            remainder_source = "provisional"

            [allowlists.vertex]
            files = ["us.json", "eu.json"]
            "#,
        )
        .unwrap();
        assert_eq!(parsed.gateway.base_url, "https://gw.internal");
        assert_eq!(parsed.gateway.credential_header, "x-bf-vk");
        assert_eq!(parsed.evidence.max_results, 7);
        assert_eq!(parsed.evidence.max_packet_chars, 8000);
        assert_eq!(parsed.evidence.remainder_source, SourceKind::Provisional);
        assert_eq!(parsed.allowlists["vertex"].files.len(), 2);
    }

    #[test]
    fn invalid_base_url_rejected() {
        let mut config = AppConfig::default();
        config.gateway.base_url = "bifrost:8080".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.gateway.request_timeout_secs, 60);
    }

    #[test]
    fn unparseable_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[gateway\nbase_url = 1").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn env_overrides_apply_with_precedence() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[
            ("BIFROST_VK", "vk-secondary"),
            ("BIFROST_API_KEY", "vk-primary"),
            ("BIFROST_URL", "https://gw.example"),
            ("GOOGLE_CLOUD_PROJECT", "fallback-project"),
            ("COURIER_VERTEX_PROJECT_ID", "main-project"),
            ("VERTEX_ACCESS_TOKEN", "tok"),
            ("COURIER_VERTEX_DRAFTS_DATASTORE_ID", "drafts-ds"),
            ("COURIER_EVIDENCE_MAX_RESULTS", "9"),
        ]));
        assert_eq!(config.gateway.credential(), Some("vk-primary"));
        assert_eq!(
            config.gateway.chat_completions_url(),
            "https://gw.example/v1/chat/completions"
        );
        assert_eq!(config.retrieval.project(), Some("main-project"));
        assert_eq!(config.retrieval.explicit_token(), Some("tok"));
        assert_eq!(config.retrieval.datastore_for(SourceKind::Drafts), Some("drafts-ds"));
        assert_eq!(config.retrieval.datastore_for(SourceKind::Provisional), None);
        assert_eq!(config.evidence.max_results, 9);
    }

    #[test]
    fn unparseable_numeric_override_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[
            ("COURIER_EVIDENCE_MAX_PACKET_CHARS", "lots"),
            ("COURIER_AGENT_MAX_COMPLETION_TOKENS", "0"),
        ]));
        assert_eq!(config.evidence.max_packet_chars, 8000);
        assert_eq!(config.gateway.agent_max_output_tokens, 0);
    }

    #[test]
    fn blank_env_values_do_not_override() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[("BIFROST_URL", "  "), ("BIFROST_API_KEY", "")]));
        assert_eq!(config.gateway.base_url, "http://bifrost:8080");
        assert!(config.gateway.credential().is_none());
    }

    #[test]
    fn load_with_applies_lookup_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retry]\nbase_delay_ms = 10\n").unwrap();

        let config = AppConfig::load_with(&path, env(&[("BIFROST_MODEL", "gpt-5-mini")])).unwrap();
        assert_eq!(config.retry.base_delay_ms, 10);
        assert_eq!(config.gateway.default_model, "gpt-5-mini");

        let bad = AppConfig::load_with(&path, env(&[("BIFROST_URL", "ftp://nope")]));
        assert!(matches!(bad, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn secrets_are_redacted_in_debug() {
        let mut config = AppConfig::default();
        config.gateway.api_key = Some("vk-very-secret".into());
        config.retrieval.access_token = Some("ya29.secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("vk-very-secret"));
        assert!(!debug.contains("ya29.secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn zero_result_budget_is_rejected_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        let err = AppConfig::load_with(&path, env(&[("COURIER_EVIDENCE_MAX_RESULTS", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("evidence.max_results"));

        let mut config = AppConfig::default();
        config.evidence.expanded.max_results = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("evidence.expanded.max_results"));
    }

    #[test]
    fn packet_cap_must_hold_an_empty_packet() {
        let mut config = AppConfig::default();
        config.retrieval.drafts_datastore_id = Some("drafts-datastore".into());
        config.retrieval.provisional_datastore_id = Some("provisional-datastore".into());
        let floor = config.empty_packet_chars();
        assert!(floor > 0);

        config.evidence.max_packet_chars = floor;
        assert!(config.validate().is_ok());

        config.evidence.max_packet_chars = floor - 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains(&format!("at least {floor}")));

        config.evidence.max_packet_chars = 0;
        config.evidence.expanded.max_packet_chars = 20;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("evidence.expanded.max_packet_chars"));
    }

    #[test]
    fn token_timeout_must_be_positive() {
        let mut config = AppConfig::default();
        assert_eq!(config.retrieval.token_timeout_secs, 30);
        config.retrieval.token_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("bifrost:8080"));
        assert!(toml_str.contains("default_search"));
    }
}
