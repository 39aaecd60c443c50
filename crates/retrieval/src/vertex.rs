//! Vertex AI Search (Discovery Engine) backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_config::RetrievalConfig;
use courier_core::{RetrievalError, SearchBackend, SearchHit};
use tracing::{debug, warn};

use crate::token::AccessTokenCache;

/// Largest page the search API is asked for.
pub const MAX_PAGE_SIZE: usize = 20;

/// Searches Discovery Engine datastores over REST.
pub struct VertexSearch {
    client: reqwest::Client,
    endpoint: String,
    project: String,
    location: String,
    collection: String,
    serving_config: String,
    tokens: Arc<AccessTokenCache>,
}

impl VertexSearch {
    /// Build from configuration. A project id is required.
    pub fn from_config(
        config: &RetrievalConfig,
        tokens: Arc<AccessTokenCache>,
    ) -> Result<Self, RetrievalError> {
        let project = config.project().ok_or_else(|| {
            RetrievalError::NotConfigured(
                "Missing Vertex project id (COURIER_VERTEX_PROJECT_ID or GOOGLE_CLOUD_PROJECT)."
                    .into(),
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            project: project.to_string(),
            location: non_empty_or(&config.location, "global"),
            collection: non_empty_or(&config.collection, "default_collection"),
            serving_config: non_empty_or(&config.serving_config, "default_search"),
            tokens,
        })
    }

    /// The `:search` URL for one datastore.
    pub fn search_url(&self, datastore_id: &str) -> String {
        format!(
            "{}/projects/{}/locations/{}/collections/{}/dataStores/{}/servingConfigs/{}:search",
            self.endpoint,
            self.project,
            self.location,
            self.collection,
            datastore_id,
            self.serving_config
        )
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

#[async_trait]
impl SearchBackend for VertexSearch {
    async fn search(
        &self,
        datastore_id: &str,
        query: &str,
        page_size: usize,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        let url = self.search_url(datastore_id);
        let body = serde_json::json!({
            "query": query,
            "pageSize": page_size.clamp(1, MAX_PAGE_SIZE),
            "contentSearchSpec": { "snippetSpec": { "returnSnippet": true } },
        });
        let token = self.tokens.token().await?;

        debug!(datastore = %datastore_id, page_size, "Querying Vertex AI Search");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RetrievalError::Timeout(e.to_string())
                } else {
                    RetrievalError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| RetrievalError::Network(e.to_string()))?;

        if !(200..300).contains(&status) {
            warn!(status, datastore = %datastore_id, "Vertex AI Search returned error");
            return Err(RetrievalError::ApiError {
                status_code: status,
                message: text,
            });
        }

        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| RetrievalError::Malformed(e.to_string()))?;
        Ok(parse_hits(&value))
    }
}

/// Extract hits from a `:search` response.
///
/// Entries without a `document.derivedStructData` object are skipped; blank
/// strings become `None`.
pub fn parse_hits(response: &serde_json::Value) -> Vec<SearchHit> {
    let Some(results) = response.get("results").and_then(|r| r.as_array()) else {
        return Vec::new();
    };

    results
        .iter()
        .filter_map(|item| {
            let doc = item.get("document")?.as_object()?;
            let data = doc.get("derivedStructData")?.as_object()?;

            let doc_id = text_field(doc.get("id")).or_else(|| text_field(item.get("id")));
            let snippet = data
                .get("snippets")
                .and_then(|s| s.as_array())
                .and_then(|s| s.first())
                .and_then(|first| text_field(first.get("snippet")));

            Some(SearchHit {
                doc_id,
                title: text_field(data.get("title")),
                uri: text_field(data.get("link")),
                snippet,
            })
        })
        .collect()
}

fn text_field(value: Option<&serde_json::Value>) -> Option<String> {
    let text = match value? {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Null => return None,
        other => other.to_string(),
    };
    Some(text).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenSource;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct NoSource;

    #[async_trait]
    impl TokenSource for NoSource {
        async fn fetch(&self) -> Result<String, RetrievalError> {
            Err(RetrievalError::Credential("no source in tests".into()))
        }
    }

    fn config(endpoint: &str) -> RetrievalConfig {
        RetrievalConfig {
            endpoint: endpoint.to_string(),
            project_id: Some("proj-1".into()),
            ..RetrievalConfig::default()
        }
    }

    fn tokens() -> Arc<AccessTokenCache> {
        Arc::new(AccessTokenCache::new(Arc::new(NoSource), 1800).with_explicit("ya29.test"))
    }

    #[test]
    fn missing_project_is_not_configured() {
        let err = VertexSearch::from_config(&RetrievalConfig::default(), tokens())
            .err()
            .unwrap();
        assert!(matches!(err, RetrievalError::NotConfigured(msg) if msg.contains("GOOGLE_CLOUD_PROJECT")));
    }

    #[test]
    fn search_url_layout() {
        let search = VertexSearch::from_config(&config("https://de.example/v1/"), tokens()).unwrap();
        assert_eq!(
            search.search_url("ds-drafts"),
            "https://de.example/v1/projects/proj-1/locations/global/collections/default_collection/dataStores/ds-drafts/servingConfigs/default_search:search"
        );
    }

    #[test]
    fn parses_documents_with_fallbacks() {
        let response = json!({
            "results": [
                {
                    "id": "outer-1",
                    "document": {
                        "id": "doc-1",
                        "derivedStructData": {
                            "link": "gs://bucket/a.pdf",
                            "title": " Widget clamp ",
                            "snippets": [{"snippet": "a <b>clamp</b>"}, {"snippet": "second"}]
                        }
                    }
                },
                {
                    "id": "outer-2",
                    "document": {"derivedStructData": {"title": "", "snippets": []}}
                },
                {"id": "outer-3", "document": {"id": "no-data"}},
                "garbage"
            ]
        });

        let hits = parse_hits(&response);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].doc_id.as_deref(), Some("doc-1"));
        assert_eq!(hits[0].title.as_deref(), Some("Widget clamp"));
        assert_eq!(hits[0].uri.as_deref(), Some("gs://bucket/a.pdf"));
        assert_eq!(hits[0].snippet.as_deref(), Some("a <b>clamp</b>"));
        assert_eq!(hits[1].doc_id.as_deref(), Some("outer-2"));
        assert_eq!(hits[1].title, None);
        assert_eq!(hits[1].snippet, None);
    }

    #[test]
    fn missing_results_is_empty() {
        assert!(parse_hits(&json!({"totalSize": 0})).is_empty());
    }

    #[tokio::test]
    async fn search_posts_expected_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/v1/projects/proj-1/locations/global/collections/default_collection/dataStores/ds-1/servingConfigs/default_search:search",
            ))
            .and(header("authorization", "Bearer ya29.test"))
            .and(body_partial_json(json!({
                "query": "widget clamp",
                "pageSize": 20,
                "contentSearchSpec": {"snippetSpec": {"returnSnippet": true}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"document": {"id": "d1", "derivedStructData": {"title": "T"}}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let search =
            VertexSearch::from_config(&config(&format!("{}/v1", server.uri())), tokens()).unwrap();
        let hits = search.search("ds-1", "widget clamp", 50).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id.as_deref(), Some("d1"));
    }

    #[tokio::test]
    async fn http_error_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
            .mount(&server)
            .await;

        let search = VertexSearch::from_config(&config(&server.uri()), tokens()).unwrap();
        let err = search.search("ds-1", "q", 5).await.unwrap_err();
        match err {
            RetrievalError::ApiError {
                status_code,
                message,
            } => {
                assert_eq!(status_code, 403);
                assert_eq!(message, "permission denied");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn token_failure_surfaces_before_any_request() {
        let search = VertexSearch::from_config(
            &config("http://127.0.0.1:1"),
            Arc::new(AccessTokenCache::new(Arc::new(NoSource), 1800)),
        )
        .unwrap();
        assert!(matches!(
            search.search("ds", "q", 5).await,
            Err(RetrievalError::Credential(_))
        ));
    }
}
