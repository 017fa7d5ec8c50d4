//! Tools module - Tool Dispatch for LLM function calling
//!
//! - `Tool` trait: the interface every dispatchable capability implements
//! - `ToolContext`: execution context (session id, loop pass)
//! - `ToolRegistry`: name → executor map the agent loop dispatches through
//!
//! Concrete I/O tools (shell, files, memory) live with the host; the crate
//! only ships [`EchoTool`] for wiring checks and tests.

mod registry;
mod types;

pub use registry::ToolRegistry;
pub use types::{Tool, ToolContext};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// A simple echo tool for testing purposes.
///
/// # Example
///
/// ```rust
/// use arborclaw::tools::{EchoTool, Tool, ToolContext};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let result = EchoTool.execute(json!({"message": "Hello"}), &ToolContext::new()).await;
/// assert_eq!(result.unwrap(), "Hello");
/// # });
/// ```
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes back the provided message"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The message to echo"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<String> {
        let message = args
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("(no message)");
        Ok(message.to_string())
    }
}
