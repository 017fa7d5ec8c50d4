//! Context builder for agent conversations
//!
//! Turns the root→current path of a session's tree into the ordered turns a
//! provider receives:
//!
//! 1. one synthesized system turn (the configured prompt) at position 0;
//! 2. every node on the path, mapped by kind: `User` → user,
//!    `Assistant`/`Summary` → assistant, `ToolCall`/`ToolResult` → tool;
//!    `System` nodes (the root among them) never appear after position 0;
//! 3. a cap of `max_context_messages` turns in total. With summarization
//!    on, the turns that fall outside the window collapse into one summary
//!    turn placed right after the system turn; with it off they are dropped.
//!    The window never opens on a tool result. When moving past results
//!    would leave it empty, it widens back to their request instead, so the
//!    newest exchange may push the total slightly over the cap.
//!
//! The context is rebuilt from the tree on every call, never patched.

use tracing::{debug, warn};

use crate::config::{AgentConfig, ContextConfig, DEFAULT_SYSTEM_PROMPT};
use crate::error::Result;
use crate::providers::{ChatOptions, ProviderRouter, Role, RouteRequest, Turn};
use crate::session::Session;
use crate::tree::{MessageNode, NodeKind};

use super::compaction::{extractive_summary, summary_request, summary_turn};

/// The path split around the context window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextWindow {
    /// Oldest turns that no longer fit, in order
    pub collapsed: Vec<Turn>,
    /// Turns sent verbatim, in order
    pub retained: Vec<Turn>,
}

/// Builds provider context from a session.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    system_prompt: String,
    max_context_messages: usize,
    summarize: bool,
    summarize_with_provider: bool,
    summary_max_chars: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextBuilder {
    /// Builder with the default prompt and window.
    ///
    /// # Example
    /// ```
    /// use arborclaw::agent::ContextBuilder;
    ///
    /// let builder = ContextBuilder::new().with_max_context_messages(10);
    /// assert_eq!(builder.max_context_messages(), 10);
    /// ```
    pub fn new() -> Self {
        let defaults = ContextConfig::default();
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_context_messages: defaults.max_context_messages,
            summarize: defaults.summarize,
            summarize_with_provider: defaults.summarize_with_provider,
            summary_max_chars: defaults.summary_max_chars,
        }
    }

    pub fn from_config(agent: &AgentConfig, context: &ContextConfig) -> Self {
        Self {
            system_prompt: agent.system_prompt.clone(),
            max_context_messages: context.max_context_messages,
            summarize: context.summarize,
            summarize_with_provider: context.summarize_with_provider,
            summary_max_chars: context.summary_max_chars,
        }
    }

    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    /// Total turn cap, system turn included. Values below 3 are raised to 3
    /// so a window always has room for system, summary and one turn.
    pub fn with_max_context_messages(mut self, max: usize) -> Self {
        self.max_context_messages = max.max(3);
        self
    }

    pub fn with_summarization(mut self, enabled: bool) -> Self {
        self.summarize = enabled;
        self
    }

    pub fn with_provider_summaries(mut self, enabled: bool) -> Self {
        self.summarize_with_provider = enabled;
        self
    }

    pub fn with_summary_max_chars(mut self, max_chars: usize) -> Self {
        self.summary_max_chars = max_chars;
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn max_context_messages(&self) -> usize {
        self.max_context_messages
    }

    pub fn summarizes(&self) -> bool {
        self.summarize
    }

    /// Split the session's path into collapsed and retained turns.
    ///
    /// # Errors
    ///
    /// `InvalidState` if `current` is not reachable from the root.
    pub fn plan(&self, session: &Session) -> Result<ContextWindow> {
        let path = session.path_to_current()?;
        let mut turns = Vec::with_capacity(path.len());
        for id in path {
            if let Some(turn) = node_turn(session.tree().get(id)?) {
                turns.push(turn);
            }
        }

        let budget = if self.summarize {
            self.max_context_messages.saturating_sub(2)
        } else {
            self.max_context_messages.saturating_sub(1)
        };
        let available = self.max_context_messages.saturating_sub(1);
        if turns.len() <= available {
            return Ok(ContextWindow {
                collapsed: Vec::new(),
                retained: turns,
            });
        }

        let first = turns.len() - budget;
        // A tool result cannot open the window without its request
        let mut split = first;
        while split < turns.len() && is_tool_result(&turns[split]) {
            split += 1;
        }
        if split == turns.len() {
            // Skipping forward left nothing; widen back to the request so the
            // newest exchange stays verbatim, at the cost of exceeding the cap.
            split = first;
            while split > 0 && is_tool_result(&turns[split]) {
                split -= 1;
            }
        }

        let retained = turns.split_off(split);
        debug!(
            session = %session.id,
            collapsed = turns.len(),
            retained = retained.len(),
            "Context window exceeded"
        );
        Ok(ContextWindow {
            collapsed: turns,
            retained,
        })
    }

    /// Assemble the final turns from a window and the summary text (if any).
    pub fn assemble(&self, window: ContextWindow, summary: Option<&str>) -> Vec<Turn> {
        let mut turns = Vec::with_capacity(window.retained.len() + 2);
        turns.push(Turn::system(&self.system_prompt));
        if self.summarize && !window.collapsed.is_empty() {
            if let Some(text) = summary {
                turns.push(summary_turn(text));
            }
        }
        turns.extend(window.retained);
        turns
    }

    /// Build context with a locally extracted summary.
    ///
    /// # Errors
    ///
    /// `InvalidState` if `current` is not reachable from the root.
    pub fn build(&self, session: &Session) -> Result<Vec<Turn>> {
        let window = self.plan(session)?;
        let summary = self.local_summary(&window);
        Ok(self.assemble(window, summary.as_deref()))
    }

    /// Build context, asking the router for the summary when provider
    /// summaries are enabled. A failed summary call falls back to the local
    /// summary rather than failing the turn.
    ///
    /// # Errors
    ///
    /// `InvalidState` if `current` is not reachable from the root.
    pub async fn build_with_router(
        &self,
        session: &Session,
        router: &ProviderRouter,
        route: &RouteRequest<'_>,
    ) -> Result<Vec<Turn>> {
        let window = self.plan(session)?;
        if !(self.summarize && self.summarize_with_provider) || window.collapsed.is_empty() {
            let summary = self.local_summary(&window);
            return Ok(self.assemble(window, summary.as_deref()));
        }

        let request = summary_request(&window.collapsed, self.summary_max_chars);
        let summary = match router
            .chat(request, Vec::new(), route, ChatOptions::new())
            .await
        {
            Ok(reply) if !reply.content.trim().is_empty() => reply.content,
            Ok(_) => {
                warn!(session = %session.id, "Provider returned an empty summary, using local summary");
                extractive_summary(&window.collapsed, self.summary_max_chars)
            }
            Err(e) => {
                warn!(session = %session.id, error = %e, "Provider summary failed, using local summary");
                extractive_summary(&window.collapsed, self.summary_max_chars)
            }
        };
        Ok(self.assemble(window, Some(&summary)))
    }

    fn local_summary(&self, window: &ContextWindow) -> Option<String> {
        (self.summarize && !window.collapsed.is_empty())
            .then(|| extractive_summary(&window.collapsed, self.summary_max_chars))
    }
}

fn is_tool_result(turn: &Turn) -> bool {
    turn.role == Role::Tool && !turn.is_tool_request()
}

/// Provider turn for a node, or `None` for system nodes.
fn node_turn(node: &MessageNode) -> Option<Turn> {
    let data = node.data();
    let turn = match node.kind() {
        NodeKind::System => return None,
        NodeKind::User => Turn::user(&data.content),
        NodeKind::Assistant | NodeKind::Summary => Turn::assistant(&data.content),
        NodeKind::ToolCall => match (&data.tool_name, &data.tool_call_id) {
            (Some(name), Some(call_id)) => Turn::tool_call(
                &data.content,
                name,
                call_id,
                data.tool_arguments.as_deref().unwrap_or("{}"),
            ),
            _ => Turn::tool(&data.content, data.tool_name.as_deref(), None),
        },
        NodeKind::ToolResult => Turn::tool(
            &data.content,
            data.tool_name.as_deref(),
            data.tool_call_id.as_deref(),
        ),
    };
    Some(turn)
}
