//! Completion gateway plumbing for Courier.
//!
//! The client speaks the OpenAI chat-completions wire format to a Bifrost
//! gateway through a `courier_core::ChatTransport`. The router picks and
//! validates the model id before any call is made.

pub mod openai_compat;
pub mod retry;
pub mod router;
pub mod transport;

pub use openai_compat::{ChatCompletionClient, Completion, CompletionFailure};
pub use retry::{RetryPolicy, RetryState};
pub use router::ModelRouter;
pub use transport::ReqwestTransport;
