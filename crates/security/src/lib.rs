//! Security policy for Courier.
//!
//! Provides:
//! - **Model allowlists**: per-provider sets of versioned model ids the
//!   gateway's virtual keys admit, checked before any completion call

pub mod allowlist;

pub use allowlist::{ModelAllowlist, ModelCheckResult};
