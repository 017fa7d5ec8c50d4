//! Tool registry for ArborClaw
//!
//! The `ToolRegistry` is the Tool Dispatch port: it maps a tool name to a
//! registered executor and runs it with the raw JSON arguments the model
//! produced. It is built once, then shared read-only behind an `Arc`.

use std::collections::BTreeMap;
use std::time::Instant;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::{ClawError, Result};
use crate::providers::ToolDefinition;

use super::{Tool, ToolContext};

/// A registry that holds and dispatches tools.
///
/// # Example
///
/// ```rust
/// use arborclaw::tools::{EchoTool, ToolContext, ToolRegistry};
///
/// # tokio_test::block_on(async {
/// let mut registry = ToolRegistry::new();
/// registry.register(Box::new(EchoTool));
///
/// let result = registry
///     .execute("echo", r#"{"message": "hello"}"#, &ToolContext::new())
///     .await;
/// assert_eq!(result.unwrap(), "hello");
/// # });
/// ```
#[derive(Default)]
pub struct ToolRegistry {
    // Ordered so tool definitions reach the model in a stable order
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        info!(tool = %name, "Registering tool");
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "Replaced previously registered tool");
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Dispatch `name` with `arguments_json`.
    ///
    /// Blank arguments are treated as an empty object, since models often
    /// send `""` for parameterless tools.
    ///
    /// # Errors
    ///
    /// `ClawError::Tool` when the tool is unknown or the arguments are not
    /// valid JSON; otherwise whatever the tool itself returns.
    pub async fn execute(
        &self,
        name: &str,
        arguments_json: &str,
        ctx: &ToolContext,
    ) -> Result<String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ClawError::Tool(format!("Tool not found: {}", name)))?;

        let args = parse_arguments(arguments_json)
            .map_err(|e| ClawError::Tool(format!("Invalid arguments for {}: {}", name, e)))?;

        let start = Instant::now();
        match tool.execute(args, ctx).await {
            Ok(output) => {
                info!(
                    tool = name,
                    session = ctx.session_id.as_deref().unwrap_or("-"),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool executed successfully"
                );
                Ok(output)
            }
            Err(e) => {
                error!(
                    tool = name,
                    session = ctx.session_id.as_deref().unwrap_or("-"),
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool execution failed"
                );
                Err(e)
            }
        }
    }

    /// Definitions of every registered tool, for the provider request.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition::new(t.name(), t.description(), t.parameters()))
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
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
}

fn parse_arguments(raw: &str) -> std::result::Result<Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(raw)
}
