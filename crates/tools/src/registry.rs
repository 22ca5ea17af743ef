//! Tool registry and execution.
//!
//! [`ToolRegistry::execute_call`] never returns `Err`: every failure mode
//! (unknown tool, bad arguments, handler error, timeout) is folded into a
//! [`ToolCallResult`] so the reasoning loop can feed it back to the model
//! as an observation instead of aborting the turn.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use leasing_agent_core::{Tool, ToolCallRequest, ToolCallResult, ToolDefinition, ToolErrorKind};
use tracing::{debug, warn};

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_boxed(Arc::new(tool));
    }

    pub fn register_boxed(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "replacing registered tool");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Definitions to advertise to the model.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Execute one tool call requested by the model.
    pub async fn execute_call(&self, request: &ToolCallRequest) -> ToolCallResult {
        let tool = match self.get(&request.name) {
            Some(tool) => tool,
            None => {
                warn!(tool = %request.name, "model requested unknown tool");
                return ToolCallResult::failure(
                    &request.call_id,
                    ToolErrorKind::UnknownTool,
                    format!("no tool named '{}'", request.name),
                );
            }
        };

        if let Err(e) = tool.validate(&request.arguments) {
            warn!(tool = %request.name, error = %e, "tool arguments failed validation");
            return ToolCallResult::failure(
                &request.call_id,
                ToolErrorKind::InvalidArguments,
                e.to_string(),
            );
        }

        let timeout = Duration::from_secs(tool.timeout_secs());
        match tokio::time::timeout(timeout, tool.execute(request.arguments.clone())).await {
            Ok(Ok(payload)) => {
                debug!(tool = %request.name, "tool call succeeded");
                ToolCallResult::success(&request.call_id, payload)
            }
            Ok(Err(e)) => {
                warn!(tool = %request.name, error = %e, "tool call failed");
                ToolCallResult::failure(&request.call_id, e.kind(), e.to_string())
            }
            Err(_) => {
                warn!(tool = %request.name, timeout_secs = timeout.as_secs(), "tool call timed out");
                ToolCallResult::failure(
                    &request.call_id,
                    ToolErrorKind::HandlerFailure,
                    format!(
                        "tool '{}' timed out after {}s",
                        request.name,
                        timeout.as_secs()
                    ),
                )
            }
        }
    }
}
