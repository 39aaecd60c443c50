//! The request pipeline: preprocess, route, complete, append.
//!
//! [`Pipeline::run`] always returns a conversation. Failures at any stage
//! become an assistant message explaining what went wrong, so a caller can
//! render the result without special-casing errors.

use std::path::Path;
use std::sync::Arc;

use courier_config::AppConfig;
use courier_core::{Conversation, Error, Message};
use courier_providers::{ChatCompletionClient, ModelRouter};
use courier_retrieval::{AccessTokenCache, EvidencePacketBuilder, VertexSearch};
use courier_security::ModelAllowlist;
use tracing::{info, warn};

use crate::catalog::{DirectoryCatalog, StaticCatalog};
use crate::preprocess::{EvidenceSource, MessagePreprocessor};
use crate::roles::AgentRoleResolver;

pub struct Pipeline {
    preprocessor: MessagePreprocessor,
    router: ModelRouter,
    client: ChatCompletionClient,
    default_model: String,
    agent_max_output_tokens: u32,
}

impl Pipeline {
    pub fn new(
        preprocessor: MessagePreprocessor,
        router: ModelRouter,
        client: ChatCompletionClient,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            preprocessor,
            router,
            client,
            default_model: default_model.into(),
            agent_max_output_tokens: 2048,
        }
    }

    /// Output-token cap for `/agent` turns; 0 sends no cap.
    pub fn with_agent_max_output_tokens(mut self, max: u32) -> Self {
        self.agent_max_output_tokens = max;
        self
    }

    /// Wire every stage from configuration.
    ///
    /// Relative allowlist files resolve against `config_dir`; the agents
    /// directory is discovered from `cwd` unless configured.
    pub fn from_config(config: &AppConfig, config_dir: &Path, cwd: &Path) -> Self {
        let allowlist = ModelAllowlist::from_config(&config.allowlists, config_dir);
        let router = ModelRouter::new(Arc::new(allowlist));
        let client = ChatCompletionClient::from_config(config);

        let tokens = Arc::new(AccessTokenCache::from_config(&config.retrieval));
        let evidence = match VertexSearch::from_config(&config.retrieval, tokens) {
            Ok(search) => EvidenceSource::Ready(Arc::new(EvidencePacketBuilder::from_config(
                config,
                Arc::new(search),
            ))),
            Err(e) => {
                info!(reason = %e, "Retrieval unavailable");
                EvidenceSource::Unavailable(e.to_string())
            }
        };

        let catalog: Arc<dyn courier_core::AgentCatalog> =
            match DirectoryCatalog::discover(config.agents.dir.as_deref(), cwd) {
                Some(catalog) => {
                    info!(dir = %catalog.active_dir().display(), "Using agents directory");
                    Arc::new(catalog)
                }
                None => {
                    info!("No agents directory found");
                    Arc::new(StaticCatalog::new())
                }
            };
        let roles = AgentRoleResolver::new(catalog, config.agents.system_prompt_max_chars);

        let preprocessor = MessagePreprocessor::new(evidence, config.evidence.clone(), roles);

        Self::new(preprocessor, router, client, &config.gateway.default_model)
            .with_agent_max_output_tokens(config.gateway.agent_max_output_tokens)
    }

    /// Answer the last message of `conversation`.
    pub async fn run(&self, conversation: Conversation, model_override: Option<&str>) -> Conversation {
        if conversation.is_empty() {
            let err = Error::Validation("conversation must contain at least one message".into());
            return conversation.with_appended(Message::assistant(err.user_message()));
        }

        let pre = match self.preprocessor.process(&conversation).await {
            Ok(pre) => pre,
            Err(e) => {
                warn!(error = %e, "Preprocessing failed");
                return conversation.with_appended(Message::assistant(e.user_message()));
            }
        };

        let model = match self.router.route(model_override, &self.default_model) {
            Ok(model) => model,
            Err(e) => {
                warn!(error = %e, "Model rejected");
                return pre
                    .conversation
                    .with_appended(Message::assistant(e.user_message()));
            }
        };

        let max_output_tokens =
            (pre.agent_mode && self.agent_max_output_tokens > 0).then_some(self.agent_max_output_tokens);

        info!(
            model = %model,
            messages = pre.conversation.len(),
            agent_mode = pre.agent_mode,
            "Running completion"
        );

        let text = match self
            .client
            .complete(&model, &pre.conversation.messages, max_output_tokens, None)
            .await
        {
            Ok(completion) => completion.text,
            Err(failure) => {
                warn!(error = %failure, "Completion failed");
                failure.user_message()
            }
        };

        pre.conversation.with_appended(Message::assistant(text))
    }
}
