//! Slash-command detection for the last user message.
//!
//! Commands are recognized by their leading token, case-insensitively. The
//! token must be followed by whitespace or end the message, so
//! `/patent-ragged` is not `/patent-rag`.

use courier_core::SourceKind;

/// What the last user message asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Not a command; the conversation passes through untouched.
    NoOp,
    /// Search the given sources and inject an evidence packet.
    Retrieval {
        sources: Vec<SourceKind>,
        expanded: bool,
        query: String,
    },
    /// `/agent list`
    RoleList,
    /// `/agent <Name> <task...>`
    RoleInvoke { name: String, task: String },
    /// `/agent` with too few arguments.
    RoleUsageError,
}

impl Command {
    /// Whether this came from the `/agent` family.
    pub fn is_agent(&self) -> bool {
        matches!(
            self,
            Command::RoleList | Command::RoleInvoke { .. } | Command::RoleUsageError
        )
    }
}

/// Retrieval prefixes, longest first.
const RETRIEVAL_PREFIXES: &[(&str, SourceKind, bool)] = &[
    ("/patent-provisional+", SourceKind::Provisional, true),
    ("/patent-provisional", SourceKind::Provisional, false),
    ("/patent-rag+", SourceKind::Drafts, true),
    ("/patent-rag", SourceKind::Drafts, false),
    ("/patent", SourceKind::Drafts, false),
];

const AGENT_PREFIX: &str = "/agent";

/// Classify a message's text.
pub fn parse(text: &str) -> Command {
    let raw = text.trim();
    let (head, rest) = split_token(raw);
    let head = head.to_lowercase();

    if let Some((_, source, expanded)) = RETRIEVAL_PREFIXES
        .iter()
        .find(|(prefix, _, _)| *prefix == head)
    {
        let query = rest.trim();
        if query.is_empty() {
            return Command::NoOp;
        }
        return Command::Retrieval {
            sources: vec![*source],
            expanded: *expanded,
            query: query.to_string(),
        };
    }

    if head == AGENT_PREFIX {
        let (name, task) = split_token(rest.trim());
        let task = task.trim();
        return match (name.is_empty(), task.is_empty()) {
            (true, _) => Command::RoleUsageError,
            (false, true) if name.eq_ignore_ascii_case("list") => Command::RoleList,
            (false, true) => Command::RoleUsageError,
            (false, false) => Command::RoleInvoke {
                name: name.to_string(),
                task: task.to_string(),
            },
        };
    }

    Command::NoOp
}

/// Split off the first whitespace-delimited token.
fn split_token(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(idx) => (&text[..idx], &text[idx..]),
        None => (text, ""),
    }
}
