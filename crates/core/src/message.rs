//! Message and Conversation domain types.
//!
//! These are the value objects that flow through the whole pipeline:
//! caller sends a conversation → preprocessor rewrites it → gateway answers →
//! the answer is appended.
//!
//! Wire input is loosely shaped (string content, a list of blocks, or a single
//! object; `role` or `type`, with `human`/`ai` aliases). Everything is reduced
//! to a plain-text [`Message`] at the deserialization boundary.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The model's reply
    Assistant,
    /// Injected instructions (evidence, roles, failures)
    System,
}

impl Role {
    /// Wire name used by the OpenAI-compatible chat API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    /// Normalize a wire `role` / `type` pair.
    ///
    /// `role` wins when present. Unknown or missing values fall back to `User`.
    pub fn from_wire(role: Option<&str>, kind: Option<&str>) -> Self {
        let pick = |value: &str| match value.trim().to_ascii_lowercase().as_str() {
            "user" | "human" => Some(Role::User),
            "assistant" | "ai" => Some(Role::Assistant),
            "system" | "developer" => Some(Role::System),
            _ => None,
        };

        match role.filter(|r| !r.trim().is_empty()) {
            Some(r) => pick(r).unwrap_or(Role::User),
            None => kind.and_then(pick).unwrap_or(Role::User),
        }
    }
}

/// A single message in a conversation. Content is always plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireMessage")]
pub struct Message {
    /// Opaque message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Same id and role, new content.
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            id: self.id.clone(),
            role: self.role,
            content: content.into(),
        }
    }
}

/// The loosely-typed shape messages arrive in.
#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    content: serde_json::Value,
}

impl From<WireMessage> for Message {
    fn from(wire: WireMessage) -> Self {
        Self {
            id: wire
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            role: Role::from_wire(wire.role.as_deref(), wire.kind.as_deref()),
            content: TextContent::from(wire.content).flatten(),
        }
    }
}

/// Message content as it may appear on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum TextContent {
    /// A bare string.
    Plain(String),
    /// A list of blocks (a single object is one block).
    Blocks(Vec<ContentBlock>),
}

/// One structured content block. Non-text blocks carry neither field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentBlock {
    pub text: Option<String>,
    pub content: Option<Box<TextContent>>,
}

impl ContentBlock {
    fn from_object(map: &serde_json::Map<String, serde_json::Value>) -> Self {
        if let Some(text) = map.get("text") {
            return Self {
                text: Some(scalar_to_string(text)),
                content: None,
            };
        }
        Self {
            text: None,
            content: map
                .get("content")
                .map(|nested| Box::new(TextContent::from(nested.clone()))),
        }
    }

    fn flatten(&self) -> String {
        match (&self.text, &self.content) {
            (Some(text), _) => text.clone(),
            (None, Some(nested)) => nested.flatten(),
            (None, None) => String::new(),
        }
    }
}

impl TextContent {
    /// Reduce to plain text: text parts in order, joined by newlines,
    /// non-text and empty parts dropped.
    pub fn flatten(&self) -> String {
        match self {
            TextContent::Plain(text) => text.clone(),
            TextContent::Blocks(blocks) => blocks
                .iter()
                .map(ContentBlock::flatten)
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<serde_json::Value> for TextContent {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => TextContent::Plain(s),
            serde_json::Value::Array(items) => TextContent::Blocks(
                items
                    .iter()
                    .filter_map(|item| item.as_object().map(ContentBlock::from_object))
                    .collect(),
            ),
            serde_json::Value::Object(map) => {
                TextContent::Blocks(vec![ContentBlock::from_object(&map)])
            }
            serde_json::Value::Null => TextContent::Plain(String::new()),
            other => TextContent::Plain(other.to_string()),
        }
    }
}

fn scalar_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// An ordered sequence of messages; the last one is the turn under consideration.
///
/// Transformations return new values: nothing here mutates a conversation
/// that another caller may still hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Add a message to the conversation.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// A copy of this conversation with `message` appended.
    pub fn with_appended(&self, message: Message) -> Self {
        let mut messages = self.messages.clone();
        messages.push(message);
        Self { messages }
    }

    /// `[...all but last, injected, last]` where `last` is the replacement
    /// for the final message. An empty conversation yields `[injected, last]`.
    pub fn with_injected_before_last(&self, injected: Message, last: Message) -> Self {
        let keep = self.messages.len().saturating_sub(1);
        let mut messages = Vec::with_capacity(keep + 2);
        messages.extend_from_slice(&self.messages[..keep]);
        messages.push(injected);
        messages.push(last);
        Self { messages }
    }
}
