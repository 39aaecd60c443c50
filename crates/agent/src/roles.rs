//! Agent role resolution and the messages that announce a role.

use std::sync::{Arc, LazyLock};

use courier_core::{AgentCatalog, AgentSpec, Result};
use regex_lite::Regex;
use tracing::{debug, info};

static PROMPT_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^##[ \t]+System[ \t]+Prompt[ \t]*$").expect("valid regex"));

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[^\n]*\n(.*?)\n```").expect("valid regex"));

const TRUNCATION_MARKER: &str = "\n\n...(truncated)...\n";

/// Shown for `/agent` with too few arguments.
pub const USAGE_MESSAGE: &str = "Usage: `/agent list` or `/agent <AgentName> <task...>`";

/// Replaces the task text after `/agent list`.
pub const LIST_TASK: &str = "List the available agents you were provided.";

/// Standing instruction injected with every role.
pub const GOVERNANCE_DIRECTIVE: &str = "Repo decision discipline (ADRs):\n\
- If you recommend changing repo behavior/stack\n  \
(routing layer, models, telemetry posture,\n  \
doc governance,\n  \
continuity strategy, agent contracts), you MUST request an ADR.\n\
- ADRs live under `02_knowledge/adr/`.\n\
- For now: include a short ADR stub in an existing JSON field\n  \
(e.g. `questions_for_principal`, `open_gaps`,\n  \
`notes`) with: title, context, decision, consequences, follow-ups.\n";

/// Resolves role names against a catalog.
pub struct AgentRoleResolver {
    catalog: Arc<dyn AgentCatalog>,
    system_prompt_max_chars: usize,
}

impl AgentRoleResolver {
    pub fn new(catalog: Arc<dyn AgentCatalog>, system_prompt_max_chars: usize) -> Self {
        Self {
            catalog,
            system_prompt_max_chars,
        }
    }

    /// Canonical role names, sorted.
    pub async fn list(&self) -> Result<Vec<String>> {
        self.catalog.list().await
    }

    /// Look up a role by name, ignoring case.
    pub async fn resolve(&self, name: &str) -> Result<Option<AgentSpec>> {
        let wanted = name.trim().to_lowercase();
        let names = self.catalog.list().await?;
        let Some(canonical) = names.into_iter().find(|n| n.to_lowercase() == wanted) else {
            debug!(agent = %name, "Agent not in catalog");
            return Ok(None);
        };

        let Some(raw_text) = self.catalog.load(&canonical).await? else {
            return Ok(None);
        };
        let system_prompt = extract_system_prompt(&raw_text, self.system_prompt_max_chars);
        info!(agent = %canonical, prompt_chars = system_prompt.chars().count(), "Resolved agent role");

        Ok(Some(AgentSpec {
            name: canonical,
            raw_text,
            system_prompt,
        }))
    }
}

/// Pull the system prompt out of a role spec.
///
/// In order: a JSON object's string `system_prompt`; the first fenced block
/// after a `## System Prompt` heading; otherwise the whole text, truncated
/// to `max_chars` (0 disables truncation).
pub fn extract_system_prompt(raw: &str, max_chars: usize) -> String {
    let text = raw.replace("\r\n", "\n").replace('\r', "\n");

    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(&text) {
        if let Some(serde_json::Value::String(prompt)) = map.get("system_prompt") {
            return prompt.trim().to_string();
        }
    }

    if let Some(heading) = PROMPT_HEADING.find(&text) {
        if let Some(caps) = FENCED_BLOCK.captures(&text[heading.end()..]) {
            if let Some(body) = caps.get(1) {
                return body.as_str().trim().to_string();
            }
        }
    }

    if max_chars > 0 && text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        return format!("{}{TRUNCATION_MARKER}", head.trim_end());
    }
    text.trim().to_string()
}

/// System message that switches the assistant into a role.
pub fn role_message(spec: &AgentSpec) -> String {
    format!(
        "You are now running as agent `{}`.\n\n{GOVERNANCE_DIRECTIVE}\nSYSTEM_PROMPT:\n{}",
        spec.name, spec.system_prompt
    )
}

/// System message listing the catalog.
pub fn list_message(names: &[String]) -> String {
    if names.is_empty() {
        return "Available agents:\n- (none found)".to_string();
    }
    let lines: Vec<String> = names.iter().map(|n| format!("- {n}")).collect();
    format!("Available agents:\n{}", lines.join("\n"))
}

pub fn unknown_agent_message(name: &str) -> String {
    format!("Unknown agent: '{name}'. Try `/agent list`.")
}
