//! reqwest-backed gateway transport.

use std::time::Duration;

use async_trait::async_trait;
use courier_core::{ChatTransport, ProviderError, TransportReply};
use tracing::trace;

/// Posts JSON to a fixed chat-completions URL with a credential header.
pub struct ReqwestTransport {
    endpoint: String,
    credential_header: String,
    credential: String,
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(
        endpoint: impl Into<String>,
        credential_header: impl Into<String>,
        credential: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            endpoint: endpoint.into(),
            credential_header: credential_header.into(),
            credential: credential.into(),
            client,
        }
    }
}

#[async_trait]
impl ChatTransport for ReqwestTransport {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(
        &self,
        body: &serde_json::Value,
    ) -> std::result::Result<TransportReply, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(self.credential_header.as_str(), self.credential.as_str())
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        trace!(status, bytes = body.len(), "Gateway replied");

        Ok(TransportReply { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_body_with_credential_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("x-bf-vk", "vk-test"))
            .and(body_partial_json(serde_json::json!({"model": "openai/gpt-5-mini-2025-08-07"})))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
            .expect(1)
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(
            format!("{}/v1/chat/completions", server.uri()),
            "x-bf-vk",
            "vk-test",
            Duration::from_secs(5),
        );
        let reply = transport
            .post(&serde_json::json!({"model": "openai/gpt-5-mini-2025-08-07", "messages": []}))
            .await
            .unwrap();

        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, r#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn error_statuses_are_replies_not_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream busy"))
            .mount(&server)
            .await;

        let transport =
            ReqwestTransport::new(server.uri(), "x-bf-vk", "k", Duration::from_secs(5));
        let reply = transport.post(&serde_json::json!({})).await.unwrap();
        assert_eq!(reply.status, 503);
        assert_eq!(reply.body, "upstream busy");
    }

    #[tokio::test]
    async fn connection_failure_is_a_network_error() {
        let transport = ReqwestTransport::new(
            "http://127.0.0.1:1/v1/chat/completions",
            "x-bf-vk",
            "k",
            Duration::from_secs(2),
        );
        let err = transport.post(&serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::Network(_) | ProviderError::Timeout(_)));
    }
}
