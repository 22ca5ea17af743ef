//! Language model backend and prompt assembly.

pub mod backend;
pub mod prompt;

pub use backend::{LlmConfig, OpenAiBackend};
pub use prompt::{build_request, SYSTEM_PROMPT};
