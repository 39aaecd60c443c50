//! `courier evidence`: query the datastores directly.

use std::sync::Arc;

use anyhow::anyhow;
use courier_core::{EvidenceLimits, SourceKind};
use courier_retrieval::vertex::MAX_PAGE_SIZE;
use courier_retrieval::{AccessTokenCache, EvidencePacketBuilder, VertexSearch};

use super::Loaded;

pub async fn run(
    loaded: Loaded,
    query: &str,
    sources: &str,
    k: usize,
    expanded: bool,
) -> anyhow::Result<()> {
    let query = query.trim();
    if query.is_empty() {
        return Err(anyhow!("query is required"));
    }
    let kinds = SourceKind::parse_list(sources).map_err(|e| anyhow!(e.user_message()))?;

    let config = &loaded.config;
    let tokens = Arc::new(AccessTokenCache::from_config(&config.retrieval));
    let search = VertexSearch::from_config(&config.retrieval, tokens)
        .map_err(|e| anyhow!(courier_core::Error::config(e.to_string()).user_message()))?;
    let builder = EvidencePacketBuilder::from_config(config, Arc::new(search));

    let limits = EvidenceLimits {
        max_results: k.clamp(1, MAX_PAGE_SIZE),
        ..config.evidence.limits(expanded)
    };
    let packet = builder
        .build(query, &kinds, limits)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    println!("{}", serde_json::to_string_pretty(&packet)?);
    Ok(())
}
