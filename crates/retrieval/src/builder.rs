//! Evidence packet builder.
//!
//! Queries each requested source for its share of the result budget, merges
//! the hits round-robin in source-priority order, de-duplicates, and then
//! shrinks the packet until its JSON fits the character cap.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use courier_config::AppConfig;
use courier_core::{
    Error, EvidenceLimits, EvidencePacket, Result, RetrievalResult, SearchBackend, SearchHit,
    SourceDescriptor, SourceKind,
};
use tracing::{debug, info, warn};

use crate::clean::{clean_snippet, truncate_chars};
use crate::vertex::MAX_PAGE_SIZE;

/// Builds bounded evidence packets from one search backend.
pub struct EvidencePacketBuilder {
    backend: Arc<dyn SearchBackend>,
    datastores: BTreeMap<SourceKind, String>,
    remainder_source: SourceKind,
}

impl EvidencePacketBuilder {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            backend,
            datastores: BTreeMap::new(),
            remainder_source: SourceKind::Drafts,
        }
    }

    /// Map a source to a datastore id. Blank ids leave the source unconfigured.
    pub fn with_datastore(mut self, kind: SourceKind, datastore_id: impl Into<String>) -> Self {
        let id = datastore_id.into().trim().to_string();
        if id.is_empty() {
            self.datastores.remove(&kind);
        } else {
            self.datastores.insert(kind, id);
        }
        self
    }

    /// Which source absorbs the leftover when the budget splits unevenly.
    pub fn with_remainder_source(mut self, kind: SourceKind) -> Self {
        self.remainder_source = kind;
        self
    }

    pub fn from_config(config: &AppConfig, backend: Arc<dyn SearchBackend>) -> Self {
        let mut builder = Self::new(backend).with_remainder_source(config.evidence.remainder_source);
        for kind in SourceKind::ALL {
            if let Some(id) = config.retrieval.datastore_for(kind) {
                builder = builder.with_datastore(kind, id);
            }
        }
        builder
    }

    /// Build a packet for `query` from `requested` sources within `limits`.
    pub async fn build(
        &self,
        query: &str,
        requested: &[SourceKind],
        limits: EvidenceLimits,
    ) -> Result<EvidencePacket> {
        if requested.is_empty() {
            return Err(Error::Validation(
                "sources must include at least one of: drafts, provisional".into(),
            ));
        }
        if limits.max_results == 0 {
            return Err(Error::Validation("max_results must be at least 1".into()));
        }

        let mut kinds = requested.to_vec();
        kinds.sort();
        kinds.dedup();

        let sources: Vec<(SourceKind, String)> = kinds
            .into_iter()
            .filter_map(|kind| self.datastores.get(&kind).map(|id| (kind, id.clone())))
            .collect();

        if sources.is_empty() {
            return Err(Error::config(
                "Requested sources are not configured. Set Vertex datastore ids for the requested \
                 sources (COURIER_VERTEX_DRAFTS_DATASTORE_ID / COURIER_VERTEX_PROVISIONAL_DATASTORE_ID).",
            ));
        }

        let shares = self.split_budget(
            limits.max_results,
            &sources.iter().map(|(k, _)| *k).collect::<Vec<_>>(),
        );

        let mut descriptors = Vec::with_capacity(sources.len());
        let mut per_source: Vec<VecDeque<RetrievalResult>> = Vec::with_capacity(sources.len());

        for ((kind, datastore_id), share) in sources.into_iter().zip(shares) {
            let mut descriptor = SourceDescriptor {
                source_kind: kind,
                datastore_id: datastore_id.clone(),
                failed: false,
            };

            if share == 0 {
                debug!(source = %kind, "Source share is zero, not querying");
                descriptors.push(descriptor);
                per_source.push(VecDeque::new());
                continue;
            }

            let page_size = share.clamp(1, MAX_PAGE_SIZE);
            let results = match self.backend.search(&datastore_id, query, page_size).await {
                Ok(hits) => hits
                    .into_iter()
                    .take(share)
                    .map(|hit| normalize(hit, kind, &datastore_id, limits.max_snippet_chars))
                    .collect(),
                Err(e) => {
                    warn!(source = %kind, datastore = %datastore_id, error = %e, "Retrieval source failed");
                    descriptor.failed = true;
                    VecDeque::new()
                }
            };

            descriptors.push(descriptor);
            per_source.push(results);
        }

        let mut packet = EvidencePacket::new(query, descriptors);
        packet.results = dedupe(interleave(per_source), limits.max_results);
        fit_to_cap(&mut packet, limits);

        info!(
            results = packet.results.len(),
            chars = packet.serialized_chars(),
            "Built evidence packet"
        );
        Ok(packet)
    }

    /// Per-source result shares, aligned with `kinds`.
    fn split_budget(&self, budget: usize, kinds: &[SourceKind]) -> Vec<usize> {
        let n = kinds.len();
        if n <= 1 {
            return vec![budget; n];
        }
        let base = budget / n;
        let remainder = budget % n;
        let receiver = kinds
            .iter()
            .position(|k| *k == self.remainder_source)
            .unwrap_or(0);

        (0..n)
            .map(|i| if i == receiver { base + remainder } else { base })
            .collect()
    }
}

fn normalize(
    hit: SearchHit,
    kind: SourceKind,
    datastore_id: &str,
    max_snippet_chars: usize,
) -> RetrievalResult {
    let snippet = hit
        .snippet
        .map(|s| truncate_chars(&clean_snippet(&s), max_snippet_chars))
        .filter(|s| !s.is_empty());

    RetrievalResult {
        doc_id: trimmed(hit.doc_id),
        title: trimmed(hit.title),
        uri: trimmed(hit.uri),
        snippet,
        source_kind: kind,
        source_id: datastore_id.to_string(),
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Round-robin across sources, in the order given.
fn interleave(mut lists: Vec<VecDeque<RetrievalResult>>) -> Vec<RetrievalResult> {
    let total = lists.iter().map(VecDeque::len).sum();
    let mut merged = Vec::with_capacity(total);
    while merged.len() < total {
        for list in lists.iter_mut() {
            if let Some(item) = list.pop_front() {
                merged.push(item);
            }
        }
    }
    merged
}

/// First occurrence of each `(uri, doc_id)` wins; stop at `limit`.
fn dedupe(results: Vec<RetrievalResult>, limit: usize) -> Vec<RetrievalResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|r| seen.insert(r.dedupe_key()))
        .take(limit)
        .collect()
}

/// Shrink `packet` until its JSON is within `max_packet_chars`.
///
/// Order: clear snippets, halve the result list, drop trailing results,
/// shorten the query. A cap of 0 disables the check.
fn fit_to_cap(packet: &mut EvidencePacket, limits: EvidenceLimits) {
    let cap = limits.max_packet_chars;
    if cap == 0 || packet.serialized_chars() <= cap {
        return;
    }

    for result in packet.results.iter_mut() {
        result.snippet = None;
    }
    if packet.serialized_chars() <= cap {
        debug!("Cleared snippets to fit packet cap");
        return;
    }

    packet.results.truncate((limits.max_results / 2).max(1));
    while packet.serialized_chars() > cap && packet.results.pop().is_some() {}
    if packet.serialized_chars() <= cap {
        debug!(results = packet.results.len(), "Dropped results to fit packet cap");
        return;
    }

    while packet.serialized_chars() > cap && !packet.query.is_empty() {
        let overflow = packet.serialized_chars() - cap;
        let keep = packet.query.chars().count().saturating_sub(overflow.max(1));
        packet.query = packet.query.chars().take(keep).collect();
    }

    if packet.serialized_chars() > cap {
        warn!(
            cap,
            chars = packet.serialized_chars(),
            "Packet cap is smaller than an empty packet"
        );
    } else {
        warn!(cap, "Shortened query to fit packet cap");
    }
}
