//! Tool types for ArborClaw
//!
//! This module defines the `Tool` trait that every dispatchable capability
//! implements, and the `ToolContext` handed to each execution.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Execution context passed to every tool call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolContext {
    /// Session the invocation belongs to
    pub session_id: Option<String>,
    /// Loop pass (1-based) that issued the invocation
    pub iteration: u32,
}

impl ToolContext {
    /// Create a new empty tool context.
    ///
    /// # Example
    /// ```
    /// use arborclaw::tools::ToolContext;
    ///
    /// let ctx = ToolContext::new().with_session("abc").with_iteration(2);
    /// assert_eq!(ctx.session_id.as_deref(), Some("abc"));
    /// assert_eq!(ctx.iteration, 2);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    pub fn with_iteration(mut self, iteration: u32) -> Self {
        self.iteration = iteration;
        self
    }
}

/// A capability the model can invoke by name.
///
/// Implementations must be safe to share across sessions: the registry is
/// read concurrently once the agent is built.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name used for dispatch.
    fn name(&self) -> &str;

    /// Human-readable description sent to the model.
    fn description(&self) -> &str;

    /// JSON Schema for the arguments object.
    fn parameters(&self) -> Value;

    /// Run the tool. An `Err` is folded into the conversation as a failed
    /// tool result; it never aborts the turn.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String>;
}
