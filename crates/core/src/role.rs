//! Named agent roles and the catalog they are loaded from.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A resolved role: the spec text as stored, plus the extracted system prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Canonical name as listed by the catalog
    pub name: String,
    pub raw_text: String,
    pub system_prompt: String,
}

/// Source of role specs.
#[async_trait]
pub trait AgentCatalog: Send + Sync {
    /// Canonical names, sorted.
    async fn list(&self) -> Result<Vec<String>>;

    /// Raw spec text for an exact canonical name, if present.
    async fn load(&self, name: &str) -> Result<Option<String>>;
}
