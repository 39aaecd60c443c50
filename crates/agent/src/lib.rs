//! The Courier request pipeline.
//!
//! A conversation flows through three stages:
//!
//! 1. **Preprocess** the last user message: slash commands inject an
//!    evidence packet (`/patent…`) or an agent role (`/agent …`)
//! 2. **Route** the requested model to a versioned, allowlisted id
//! 3. **Complete** through the gateway and append the assistant reply
//!
//! Every stage reports failure as assistant text, so [`Pipeline::run`]
//! always hands back a conversation.

pub mod catalog;
pub mod command;
pub mod pipeline;
pub mod preprocess;
pub mod roles;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use catalog::{DirectoryCatalog, StaticCatalog};
pub use command::Command;
pub use pipeline::Pipeline;
pub use preprocess::{EvidenceSource, MessagePreprocessor, Preprocessed};
pub use roles::AgentRoleResolver;
