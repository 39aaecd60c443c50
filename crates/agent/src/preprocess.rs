//! Rewrites a conversation before it goes to the model.
//!
//! Only the last message is examined, and only when it comes from the user.
//! Retrieval commands inject an evidence packet; `/agent` commands inject a
//! role, a catalog listing, or a usage hint. Everything else passes through
//! unchanged.

use std::sync::Arc;

use courier_config::EvidenceConfig;
use courier_core::{Conversation, Error, EvidencePacket, Message, Result, Role, SourceKind};
use tracing::{debug, info};

use crate::command::{self, Command};
use crate::roles::{self, AgentRoleResolver};

/// Where evidence packets come from.
pub enum EvidenceSource {
    Ready(Arc<courier_retrieval::EvidencePacketBuilder>),
    /// Retrieval cannot run; the reason is shown to the user on use.
    Unavailable(String),
}

/// A rewritten conversation.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub conversation: Conversation,
    /// True when the last message was an `/agent` command.
    pub agent_mode: bool,
}

impl Preprocessed {
    fn unchanged(conversation: &Conversation) -> Self {
        Self {
            conversation: conversation.clone(),
            agent_mode: false,
        }
    }
}

pub struct MessagePreprocessor {
    evidence: EvidenceSource,
    limits: EvidenceConfig,
    roles: AgentRoleResolver,
}

impl MessagePreprocessor {
    pub fn new(evidence: EvidenceSource, limits: EvidenceConfig, roles: AgentRoleResolver) -> Self {
        Self {
            evidence,
            limits,
            roles,
        }
    }

    pub async fn process(&self, conversation: &Conversation) -> Result<Preprocessed> {
        let Some(last) = conversation.last() else {
            return Ok(Preprocessed::unchanged(conversation));
        };
        if last.role != Role::User {
            return Ok(Preprocessed::unchanged(conversation));
        }

        let command = command::parse(&last.content);
        let agent_mode = command.is_agent();

        let conversation = match command {
            Command::NoOp => return Ok(Preprocessed::unchanged(conversation)),

            Command::Retrieval {
                sources,
                expanded,
                query,
            } => {
                let packet = self.evidence_packet(&query, &sources, expanded).await?;
                info!(
                    results = packet.results.len(),
                    chars = packet.serialized_chars(),
                    expanded,
                    "Injecting evidence packet"
                );
                conversation.with_injected_before_last(
                    Message::system(evidence_message(&packet)),
                    last.with_content(query),
                )
            }

            Command::RoleList => {
                let names = self.roles.list().await?;
                debug!(count = names.len(), "Listing agents");
                conversation.with_injected_before_last(
                    Message::system(roles::list_message(&names)),
                    last.with_content(roles::LIST_TASK),
                )
            }

            Command::RoleUsageError => conversation.with_injected_before_last(
                Message::system(roles::USAGE_MESSAGE),
                last.clone(),
            ),

            Command::RoleInvoke { name, task } => match self.roles.resolve(&name).await? {
                Some(spec) => conversation.with_injected_before_last(
                    Message::system(roles::role_message(&spec)),
                    last.with_content(task),
                ),
                None => conversation.with_injected_before_last(
                    Message::system(roles::unknown_agent_message(&name)),
                    last.clone(),
                ),
            },
        };

        Ok(Preprocessed {
            conversation,
            agent_mode,
        })
    }

    async fn evidence_packet(
        &self,
        query: &str,
        sources: &[SourceKind],
        expanded: bool,
    ) -> Result<EvidencePacket> {
        match &self.evidence {
            EvidenceSource::Ready(builder) => {
                builder
                    .build(query, sources, self.limits.limits(expanded))
                    .await
            }
            EvidenceSource::Unavailable(reason) => Err(Error::config(reason.clone())),
        }
    }
}

/// System message carrying an evidence packet.
pub fn evidence_message(packet: &EvidencePacket) -> String {
    format!(
        "You are in PATENT MODE.\n\
         Use the following evidence packet for precise citations and claim drafting.\n\
         Do not invent citations; cite only what is in this packet.\n\n\
         EVIDENCE_PACKET_JSON:\n{}",
        packet.to_json()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::test_helpers::{ScriptedSearch, hit};
    use courier_retrieval::EvidencePacketBuilder;

    fn preprocessor(search: Arc<ScriptedSearch>, catalog: StaticCatalog) -> MessagePreprocessor {
        let builder = EvidencePacketBuilder::new(search)
            .with_datastore(SourceKind::Drafts, "ds-drafts")
            .with_datastore(SourceKind::Provisional, "ds-prov");
        MessagePreprocessor::new(
            EvidenceSource::Ready(Arc::new(builder)),
            EvidenceConfig::default(),
            AgentRoleResolver::new(Arc::new(catalog), 12_000),
        )
    }

    fn user_turn(text: &str) -> Conversation {
        Conversation::from_messages(vec![
            Message::user("earlier question"),
            Message::assistant("earlier answer"),
            Message::user(text),
        ])
    }

    #[tokio::test]
    async fn plain_message_is_untouched() {
        let search = Arc::new(ScriptedSearch::default());
        let pre = preprocessor(search.clone(), StaticCatalog::new());
        let conversation = user_turn("what is a clamp?");

        let out = pre.process(&conversation).await.unwrap();
        assert_eq!(out.conversation, conversation);
        assert!(!out.agent_mode);
        assert!(search.calls().is_empty());
    }

    #[tokio::test]
    async fn commands_from_assistant_are_ignored() {
        let search = Arc::new(ScriptedSearch::default());
        let pre = preprocessor(search.clone(), StaticCatalog::new());
        let conversation = Conversation::from_messages(vec![Message::assistant("/patent-rag x")]);

        let out = pre.process(&conversation).await.unwrap();
        assert_eq!(out.conversation, conversation);
        assert!(search.calls().is_empty());
    }

    #[tokio::test]
    async fn retrieval_injects_packet_and_rewrites_query() {
        let search = Arc::new(
            ScriptedSearch::default().with_hits("ds-drafts", vec![hit("d1", "a <b>clamp</b>")]),
        );
        let pre = preprocessor(search.clone(), StaticCatalog::new());
        let conversation = user_turn("/patent-rag widget clamp");
        let last_id = conversation.last().unwrap().id.clone();

        let out = pre.process(&conversation).await.unwrap();
        let messages = &out.conversation.messages;
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].role, Role::System);
        assert!(messages[2].content.starts_with("You are in PATENT MODE.\n"));
        assert!(messages[2].content.contains("EVIDENCE_PACKET_JSON:\n{"));
        assert!(messages[2].content.contains("\"doc_id\":\"d1\""));
        assert_eq!(messages[3].content, "widget clamp");
        assert_eq!(messages[3].id, last_id);
        assert!(!out.agent_mode);

        // Drafts only: provisional is never queried.
        assert_eq!(search.calls(), vec![("ds-drafts".to_string(), 5)]);
    }

    #[tokio::test]
    async fn expanded_retrieval_uses_larger_budget() {
        let search = Arc::new(ScriptedSearch::default());
        let pre = preprocessor(search.clone(), StaticCatalog::new());

        pre.process(&user_turn("/patent-provisional+ widget"))
            .await
            .unwrap();
        assert_eq!(search.calls(), vec![("ds-prov".to_string(), 12)]);
    }

    #[tokio::test]
    async fn unavailable_retrieval_is_a_config_error() {
        let pre = MessagePreprocessor::new(
            EvidenceSource::Unavailable("Missing Vertex project id.".into()),
            EvidenceConfig::default(),
            AgentRoleResolver::new(Arc::new(StaticCatalog::new()), 0),
        );
        let err = pre.process(&user_turn("/patent x")).await.unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.user_message().contains("Missing Vertex project id."));
    }

    #[tokio::test]
    async fn agent_list_injects_catalog() {
        let pre = preprocessor(
            Arc::new(ScriptedSearch::default()),
            StaticCatalog::new().with_agent("B", "b").with_agent("A", "a"),
        );
        let out = pre.process(&user_turn("/agent list")).await.unwrap();
        let messages = &out.conversation.messages;
        assert_eq!(messages[2].content, "Available agents:\n- A\n- B");
        assert_eq!(messages[3].content, "List the available agents you were provided.");
        assert!(out.agent_mode);
    }

    #[tokio::test]
    async fn agent_invoke_injects_role_and_task() {
        let pre = preprocessor(
            Arc::new(ScriptedSearch::default()),
            StaticCatalog::new().with_agent("Reviewer", "## System Prompt\n```\nReview.\n```\n"),
        );
        let out = pre
            .process(&user_turn("/agent reviewer check claim 1"))
            .await
            .unwrap();
        let messages = &out.conversation.messages;
        assert!(messages[2].content.starts_with("You are now running as agent `Reviewer`."));
        assert!(messages[2].content.ends_with("SYSTEM_PROMPT:\nReview."));
        assert_eq!(messages[3].content, "check claim 1");
        assert!(out.agent_mode);
    }

    #[tokio::test]
    async fn unknown_agent_keeps_original_message() {
        let pre = preprocessor(Arc::new(ScriptedSearch::default()), StaticCatalog::new());
        let out = pre.process(&user_turn("/agent Ghost do it")).await.unwrap();
        let messages = &out.conversation.messages;
        assert_eq!(messages[2].content, "Unknown agent: 'Ghost'. Try `/agent list`.");
        assert_eq!(messages[3].content, "/agent Ghost do it");
        assert!(out.agent_mode);
    }

    #[tokio::test]
    async fn agent_usage_hint() {
        let pre = preprocessor(Arc::new(ScriptedSearch::default()), StaticCatalog::new());
        let out = pre.process(&user_turn("/agent Reviewer")).await.unwrap();
        let messages = &out.conversation.messages;
        assert_eq!(
            messages[2].content,
            "Usage: `/agent list` or `/agent <AgentName> <task...>`"
        );
        assert_eq!(messages[3].content, "/agent Reviewer");
    }
}
