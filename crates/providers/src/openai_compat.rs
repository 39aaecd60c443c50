//! OpenAI-compatible chat completion client for the Bifrost gateway.
//!
//! Supports:
//! - Model-family-aware output-token caps (`max_tokens` vs `max_completion_tokens`)
//! - One retry without `temperature` when a model only accepts the default
//! - Exponential-backoff retries on 502/503/504
//! - Readable failure text for every outcome, so callers can always answer

use std::sync::Arc;
use std::time::Duration;

use courier_config::AppConfig;
use courier_core::{ChatTransport, CompletionRequest, Error, Message, ProviderError};
use tracing::{debug, info, warn};

use crate::retry::{RetryPolicy, RetryState};
use crate::router::ModelRouter;
use crate::transport::ReqwestTransport;

/// A successful completion.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Assistant text, or the pretty-printed response when no text is present
    pub text: String,
    /// Parsed response body; `None` when the body was not JSON
    pub raw: Option<serde_json::Value>,
    /// Requests sent, including retries
    pub attempts: u32,
}

impl Completion {
    fn from_body(body: String, attempts: u32) -> Self {
        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(value) => {
                let text = match value
                    .pointer("/choices/0/message/content")
                    .and_then(|c| c.as_str())
                {
                    Some(content) => content.to_string(),
                    None => serde_json::to_string_pretty(&value).unwrap_or(body),
                };
                Self {
                    text,
                    raw: Some(value),
                    attempts,
                }
            }
            Err(_) => Self {
                text: body,
                raw: None,
                attempts,
            },
        }
    }
}

/// Why a completion could not be produced.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompletionFailure {
    /// No gateway credential; nothing was sent.
    #[error("{}", missing_credential_message(.header))]
    MissingCredential { header: String },

    /// The gateway answered badly, or could not be reached.
    #[error("{}", upstream_message(.endpoint, .model, .status, .detail))]
    Upstream {
        endpoint: String,
        model: String,
        status: Option<u16>,
        detail: String,
        attempts: u32,
    },
}

fn missing_credential_message(header: &str) -> String {
    format!(
        "Courier is up, but the gateway is not configured.\n\n\
         Set env `BIFROST_API_KEY` (preferred) or `BIFROST_VK` for the `{header}` header, then retry.\n\
         If running outside Docker, also set `BIFROST_URL` (e.g. http://localhost:8080)."
    )
}

fn upstream_message(endpoint: &str, model: &str, status: &Option<u16>, detail: &str) -> String {
    let headline = match status {
        Some(code) => format!("Gateway call failed: HTTP {code}."),
        None => "Gateway call failed.".to_string(),
    };
    format!("{headline}\n\nURL: {endpoint}\nModel: {model}\n\nDetails:\n{detail}")
}

impl CompletionFailure {
    /// Text suitable for an assistant-visible message in the conversation.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

impl From<CompletionFailure> for Error {
    fn from(failure: CompletionFailure) -> Self {
        match &failure {
            CompletionFailure::MissingCredential { .. } => Error::config(failure.to_string()),
            CompletionFailure::Upstream {
                status: Some(code),
                ..
            } => Error::Provider(ProviderError::ApiError {
                status_code: *code,
                message: failure.to_string(),
            }),
            CompletionFailure::Upstream { status: None, .. } => {
                Error::Provider(ProviderError::Network(failure.to_string()))
            }
        }
    }
}

/// Calls the gateway's chat-completions endpoint with retry.
pub struct ChatCompletionClient {
    transport: Arc<dyn ChatTransport>,
    credential_header: String,
    has_credential: bool,
    policy: RetryPolicy,
    max_output_tokens_ceiling: u32,
}

impl ChatCompletionClient {
    /// Create a client over an existing transport.
    ///
    /// `has_credential` false makes every call fail fast with
    /// [`CompletionFailure::MissingCredential`].
    pub fn new(transport: Arc<dyn ChatTransport>, has_credential: bool) -> Self {
        Self {
            transport,
            credential_header: "x-bf-vk".into(),
            has_credential,
            policy: RetryPolicy::default(),
            max_output_tokens_ceiling: 4000,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_output_ceiling(mut self, ceiling: u32) -> Self {
        self.max_output_tokens_ceiling = ceiling.max(1);
        self
    }

    pub fn with_credential_header(mut self, header: impl Into<String>) -> Self {
        self.credential_header = header.into();
        self
    }

    /// Build a reqwest-backed client from configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        let gateway = &config.gateway;
        let credential = gateway.credential().unwrap_or_default();
        let transport = ReqwestTransport::new(
            gateway.chat_completions_url(),
            &gateway.credential_header,
            credential,
            Duration::from_secs(gateway.request_timeout_secs),
        );
        Self::new(Arc::new(transport), gateway.credential().is_some())
            .with_credential_header(&gateway.credential_header)
            .with_policy(RetryPolicy::from(&config.retry))
            .with_output_ceiling(gateway.max_output_tokens_ceiling)
    }

    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    /// Send one conversation and return the assistant text.
    ///
    /// `model` must already be resolved and allowlisted.
    pub async fn complete(
        &self,
        model: &str,
        messages: &[Message],
        max_output_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<Completion, CompletionFailure> {
        if !self.has_credential {
            return Err(CompletionFailure::MissingCredential {
                header: self.credential_header.clone(),
            });
        }

        let mut request = CompletionRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            max_output_tokens: max_output_tokens.map(|n| n.clamp(1, self.max_output_tokens_ceiling)),
            output_token_field: ModelRouter::output_token_field(model).to_string(),
            temperature,
        };
        let mut state = RetryState::default();

        loop {
            state.attempts += 1;
            debug!(
                model = %request.model,
                attempt = state.attempts,
                messages = request.messages.len(),
                temperature = ?request.temperature,
                "Sending completion request"
            );

            let reply = match self.transport.post(&request.to_body()).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(model = %request.model, error = %e, "Gateway unreachable");
                    return Err(self.upstream(&request.model, None, e.to_string(), state.attempts));
                }
            };

            if reply.is_success() {
                return Ok(Completion::from_body(reply.body, state.attempts));
            }

            if request.temperature.is_some()
                && !state.temperature_dropped
                && RetryPolicy::is_temperature_rejection(reply.status, &reply.body)
            {
                info!(model = %request.model, "Model rejected temperature; retrying without it");
                state.temperature_dropped = true;
                request.temperature = None;
                continue;
            }

            if RetryPolicy::is_transient(reply.status)
                && state.transient_retries < self.policy.max_transient_retries
            {
                let delay = self.policy.delay_for(state.transient_retries);
                state.transient_retries += 1;
                warn!(
                    status = reply.status,
                    retry = state.transient_retries,
                    max = self.policy.max_transient_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Transient gateway failure, backing off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            warn!(status = reply.status, attempts = state.attempts, "Gateway returned error");
            return Err(self.upstream(
                &request.model,
                Some(reply.status),
                reply.body,
                state.attempts,
            ));
        }
    }

    fn upstream(
        &self,
        model: &str,
        status: Option<u16>,
        detail: String,
        attempts: u32,
    ) -> CompletionFailure {
        CompletionFailure::Upstream {
            endpoint: self.transport.endpoint().to_string(),
            model: model.to_string(),
            status,
            detail,
            attempts,
        }
    }
}
