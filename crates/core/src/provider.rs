//! Chat transport trait: the abstraction over the completion gateway wire.
//!
//! A transport knows how to deliver one JSON request body to the gateway and
//! hand back the raw status and body. Retry policy, payload shaping, and
//! response interpretation all live above it, so they can be exercised
//! against a scripted transport without sockets.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;

/// One chat-completion request in OpenAI wire terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Versioned, provider-prefixed model id (e.g. "openai/gpt-5-mini-2025-08-07")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Output-token cap, sent under `output_token_field` when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,

    /// Either `max_tokens` or `max_completion_tokens`, depending on model family
    pub output_token_field: String,

    /// Sampling temperature; omitted from the wire when `None`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Render the gateway JSON body.
    ///
    /// Messages are reduced to `{role, content}`; ids never leave the process.
    pub fn to_body(&self) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = self
            .messages
            .iter()
            .map(|m| serde_json::json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });

        if let Some(n) = self.max_output_tokens {
            body[self.output_token_field.as_str()] = serde_json::json!(n);
        }
        if let Some(t) = self.temperature {
            // Round off f32 widening noise (0.20000000298023224)
            let t = (f64::from(t) * 1e6).round() / 1e6;
            body["temperature"] = serde_json::json!(t);
        }
        body
    }
}

/// Raw HTTP outcome: status code and undecoded body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReply {
    pub status: u16,
    pub body: String,
}

impl TransportReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The gateway wire.
///
/// `Err` is reserved for failures with no HTTP status at all (connection
/// refused, DNS, timeout). Any status, including 5xx, comes back as `Ok`.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Full URL requests are posted to, for diagnostics.
    fn endpoint(&self) -> &str;

    /// POST one JSON body.
    async fn post(&self, body: &serde_json::Value)
    -> std::result::Result<TransportReply, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "openai/gpt-5-mini-2025-08-07".into(),
            messages: vec![Message::system("rules"), Message::user("hi")],
            max_output_tokens: None,
            output_token_field: "max_completion_tokens".into(),
            temperature: None,
        }
    }

    #[test]
    fn body_omits_unset_optionals() {
        let body = request().to_body();
        assert_eq!(body["model"], "openai/gpt-5-mini-2025-08-07");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert!(body.get("temperature").is_none());
        assert!(body.get("max_completion_tokens").is_none());
        assert!(body["messages"][0].get("id").is_none());
    }

    #[test]
    fn body_uses_the_configured_token_field() {
        let mut req = request();
        req.max_output_tokens = Some(2048);
        req.temperature = Some(0.2);
        let body = req.to_body();
        assert_eq!(body["max_completion_tokens"], 2048);
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body["temperature"], 0.2);
        assert!(!body.to_string().contains("0.2000"));
    }

    #[test]
    fn reply_success_range() {
        assert!(TransportReply { status: 200, body: String::new() }.is_success());
        assert!(!TransportReply { status: 503, body: String::new() }.is_success());
    }
}
