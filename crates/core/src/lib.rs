//! # Courier Core
//!
//! Domain types, traits, and error definitions for the Courier conversational
//! pipeline. This crate has **no I/O of its own**: it defines the model that
//! the provider, retrieval, and agent crates implement against.
//!
//! ## Seams
//!
//! Every external collaborator is a trait here:
//! - [`ChatTransport`]: how a completion request body reaches the gateway
//! - [`SearchBackend`]: how a retrieval datastore is queried
//! - [`AgentCatalog`]: where named role specs come from
//!
//! Implementations live in their respective crates, so tests can swap in
//! scripted doubles without touching the network or the filesystem.

pub mod error;
pub mod message;
pub mod provider;
pub mod retrieval;
pub mod role;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, RetrievalError};
pub use message::{ContentBlock, Conversation, Message, Role, TextContent};
pub use provider::{ChatTransport, CompletionRequest, TransportReply};
pub use retrieval::{
    EvidenceLimits, EvidencePacket, RetrievalResult, SearchBackend, SearchHit, SourceDescriptor,
    SourceKind,
};
pub use role::{AgentCatalog, AgentSpec};
