//! Retrieval for Courier: Vertex AI Search access and evidence packets.
//!
//! - [`VertexSearch`] implements `courier_core::SearchBackend` over the
//!   Discovery Engine REST API
//! - [`AccessTokenCache`] supplies its bearer tokens
//! - [`EvidencePacketBuilder`] turns hits from one or more datastores into a
//!   bounded, de-duplicated packet

pub mod builder;
pub mod clean;
pub mod token;
pub mod vertex;

pub use builder::EvidencePacketBuilder;
pub use token::{AccessTokenCache, CommandTokenSource, TokenSource};
pub use vertex::VertexSearch;
