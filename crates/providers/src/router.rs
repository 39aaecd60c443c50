//! Model router: turns a caller's model choice into a gateway-acceptable id.
//!
//! Handles override/default selection, alias rewriting to versioned ids,
//! output-token field selection, and allowlist enforcement.

use std::sync::Arc;

use courier_core::{Error, Result};
use courier_security::{ModelAllowlist, ModelCheckResult};
use tracing::debug;

/// Short aliases and their pinned, versioned ids.
const ALIASES: &[(&str, &str)] = &[
    ("gpt-5.2", "openai/gpt-5.2-2025-12-11"),
    ("openai/gpt-5.2", "openai/gpt-5.2-2025-12-11"),
    ("gpt-5-mini", "openai/gpt-5-mini-2025-08-07"),
    ("openai/gpt-5-mini", "openai/gpt-5-mini-2025-08-07"),
    ("gpt-5-nano", "openai/gpt-5-nano-2025-08-07"),
    ("openai/gpt-5-nano", "openai/gpt-5-nano-2025-08-07"),
];

/// Model families that take `max_completion_tokens` instead of `max_tokens`.
const COMPLETION_TOKEN_FAMILIES: &[&str] = &[
    "openai/gpt-5",
    "openai/o1",
    "openai/o3",
    "openai/o4",
    "gpt-5",
    "o1",
    "o3",
    "o4",
];

pub const MAX_TOKENS: &str = "max_tokens";
pub const MAX_COMPLETION_TOKENS: &str = "max_completion_tokens";

/// Routes a model choice to a concrete, allowed model id.
#[derive(Debug, Clone, Default)]
pub struct ModelRouter {
    allowlist: Arc<ModelAllowlist>,
}

impl ModelRouter {
    pub fn new(allowlist: Arc<ModelAllowlist>) -> Self {
        Self { allowlist }
    }

    /// Trim and rewrite known aliases; anything else passes through.
    pub fn resolve(raw: &str) -> String {
        let trimmed = raw.trim();
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == trimmed)
            .map(|(_, versioned)| (*versioned).to_string())
            .unwrap_or_else(|| trimmed.to_string())
    }

    /// First non-blank of the override and the default.
    pub fn select(override_model: Option<&str>, default_model: &str) -> Option<String> {
        override_model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .or_else(|| Some(default_model.trim()).filter(|m| !m.is_empty()))
            .map(String::from)
    }

    /// Which request field carries the output-token cap for this model.
    pub fn output_token_field(model: &str) -> &'static str {
        let lower = model.trim().to_lowercase();
        if COMPLETION_TOKEN_FAMILIES
            .iter()
            .any(|prefix| lower.starts_with(prefix))
        {
            MAX_COMPLETION_TOKENS
        } else {
            MAX_TOKENS
        }
    }

    /// Reject ids the gateway would refuse.
    pub fn enforce_allowlist(&self, model: &str) -> Result<()> {
        match self.allowlist.check(model) {
            ModelCheckResult::Allowed | ModelCheckResult::Unrestricted { .. } => Ok(()),
            ModelCheckResult::Denied { reason, .. } => Err(Error::Validation(reason)),
        }
    }

    /// Select, resolve, and enforce in one step.
    pub fn route(&self, override_model: Option<&str>, default_model: &str) -> Result<String> {
        let selected = Self::select(override_model, default_model)
            .ok_or_else(|| Error::Validation("model is required".into()))?;
        let resolved = Self::resolve(&selected);
        if resolved != selected {
            debug!(requested = %selected, resolved = %resolved, "Rewrote model alias");
        }
        self.enforce_allowlist(&resolved)?;
        Ok(resolved)
    }

    /// Raw allowlist verdict, for inspection tooling.
    pub fn check(&self, model: &str) -> ModelCheckResult {
        self.allowlist.check(model)
    }
}
