//! HTTP client for the assistant completion backend.
//!
//! Pure reqwest surface over the threads/messages/runs API. No
//! host-framework or orchestration logic lives here.

mod client;
mod error;
mod traits;
mod types;

pub use client::AssistantsClient;
pub use error::{AssistantError, Result};
pub use traits::AssistantBackend;
pub use types::{RATE_LIMIT_ERROR_CODE, Run, RunError, RunStatus};
