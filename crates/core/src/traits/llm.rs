//! Language model boundary.

use async_trait::async_trait;

use crate::error::LlmError;
use crate::llm_types::{GenerateRequest, GenerateResponse, ToolDefinition};

/// Language model adapter.
///
/// One call is one reasoning step: the response carries either final text or
/// a batch of tool calls to resolve before the next step.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate_with_tools(
        &self,
        request: GenerateRequest,
        tools: &[ToolDefinition],
    ) -> Result<GenerateResponse, LlmError>;

    /// Check if the backend is reachable
    async fn is_available(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str;
}
