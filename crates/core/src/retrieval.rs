//! Retrieval domain types and the search backend seam.
//!
//! An [`EvidencePacket`] is the bounded, JSON-serializable bundle of search
//! hits that gets injected into a conversation ahead of the user's question.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, RetrievalError};

/// Name recorded in every packet's `source` field.
pub const PACKET_SOURCE: &str = "vertex_ai_search";

/// A named retrieval corpus. Declaration order is source priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Drafts,
    Provisional,
}

impl SourceKind {
    /// All kinds, in priority order.
    pub const ALL: [SourceKind; 2] = [SourceKind::Drafts, SourceKind::Provisional];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Drafts => "drafts",
            SourceKind::Provisional => "provisional",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "drafts" => Ok(SourceKind::Drafts),
            "provisional" => Ok(SourceKind::Provisional),
            other => Err(Error::Validation(format!(
                "unknown source '{other}'; sources must be a comma-separated list of: drafts, provisional"
            ))),
        }
    }

    /// Parse a comma-separated list such as `"provisional, drafts"`.
    ///
    /// Blank entries are skipped, duplicates collapse, and the result comes
    /// back in priority order.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>> {
        let mut kinds = raw
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(SourceKind::parse)
            .collect::<Result<Vec<_>>>()?;

        if kinds.is_empty() {
            return Err(Error::Validation(
                "sources must include at least one of: drafts, provisional".into(),
            ));
        }
        kinds.sort();
        kinds.dedup();
        Ok(kinds)
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw hit as returned by a search backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: Option<String>,
    pub title: Option<String>,
    pub uri: Option<String>,
    pub snippet: Option<String>,
}

/// A normalized hit, tagged with the corpus it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub doc_id: Option<String>,
    pub title: Option<String>,
    pub uri: Option<String>,
    pub snippet: Option<String>,
    pub source_kind: SourceKind,
    pub source_id: String,
}

impl RetrievalResult {
    /// Identity used for de-duplication across sources.
    pub fn dedupe_key(&self) -> (String, String) {
        (
            self.uri.clone().unwrap_or_default(),
            self.doc_id.clone().unwrap_or_default(),
        )
    }
}

/// Which datastore a source resolved to, and whether querying it failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub source_kind: SourceKind,
    pub datastore_id: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
}

/// The bounded bundle handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidencePacket {
    pub query: String,
    pub source: String,
    pub sources: Vec<SourceDescriptor>,
    pub results: Vec<RetrievalResult>,
}

impl EvidencePacket {
    pub fn new(query: impl Into<String>, sources: Vec<SourceDescriptor>) -> Self {
        Self {
            query: query.into(),
            source: PACKET_SOURCE.to_string(),
            sources,
            results: Vec::new(),
        }
    }

    /// Compact JSON rendering, the form embedded in the evidence message.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Serialized size in characters.
    pub fn serialized_chars(&self) -> usize {
        self.to_json().chars().count()
    }
}

/// Size limits for one evidence packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceLimits {
    /// Total result budget across all sources
    pub max_results: usize,
    /// Per-snippet cap, in characters, before the ellipsis
    pub max_snippet_chars: usize,
    /// Cap on the serialized packet, in characters
    pub max_packet_chars: usize,
}

impl EvidenceLimits {
    /// Limits for plain retrieval commands.
    pub const fn standard() -> Self {
        Self {
            max_results: 5,
            max_snippet_chars: 900,
            max_packet_chars: 8000,
        }
    }

    /// Limits for the `+` variants.
    pub const fn expanded() -> Self {
        Self {
            max_results: 12,
            max_snippet_chars: 1600,
            max_packet_chars: 24000,
        }
    }
}

impl Default for EvidenceLimits {
    fn default() -> Self {
        Self::standard()
    }
}

/// A searchable datastore backend.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Query one datastore for up to `page_size` hits.
    async fn search(
        &self,
        datastore_id: &str,
        query: &str,
        page_size: usize,
    ) -> std::result::Result<Vec<SearchHit>, RetrievalError>;
}
