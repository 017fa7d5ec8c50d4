//! Agent loop implementation
//!
//! One processed message runs the state machine
//!
//! ```text
//! Sending → AwaitingReply → (ExecutingTools → Sending)* → Done | Failed
//! ```
//!
//! Every pass appends to the tree before the next one starts: either a
//! ToolCall/ToolResult pair per requested tool, or the final Assistant node.
//! Context is rebuilt from the tree at the start of each pass. Provider
//! failures that survive the router's retry and failover end the turn; tool
//! failures are folded into the conversation as ToolResult content.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{AgentConfig, DEFAULT_MODEL};
use crate::error::{ClawError, Result};
use crate::providers::{ChatOptions, LLMResponse, LLMToolCall, ProviderRouter, RouteRequest};
use crate::session::Session;
use crate::tools::{ToolContext, ToolRegistry};
use crate::tree::NodeData;

use super::context::ContextBuilder;

/// States of one processed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Sending,
    AwaitingReply,
    ExecutingTools,
    Done,
    Failed,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Sending => "sending",
            LoopState::AwaitingReply => "awaiting_reply",
            LoopState::ExecutingTools => "executing_tools",
            LoopState::Done => "done",
            LoopState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Per-agent loop settings; sessions may override model and temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    /// Hard cap on Sending passes per processed message
    pub max_iterations: u32,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

impl LoopSettings {
    pub fn from_config(agent: &AgentConfig) -> Self {
        Self {
            max_iterations: agent.max_iterations.max(1),
            model: if agent.model.trim().is_empty() {
                DEFAULT_MODEL.to_string()
            } else {
                agent.model.clone()
            },
            temperature: agent.temperature,
            max_tokens: agent.max_tokens,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

/// Drives the tool-calling loop for one session at a time.
///
/// Holds the shared, read-only collaborators; the mutable state is the
/// `&mut Session` handed to [`run`](AgentLoop::run), so two passes can never
/// mutate one tree concurrently.
pub struct AgentLoop {
    router: Arc<ProviderRouter>,
    tools: Arc<ToolRegistry>,
    context: ContextBuilder,
    settings: LoopSettings,
}

impl AgentLoop {
    pub fn new(
        router: Arc<ProviderRouter>,
        tools: Arc<ToolRegistry>,
        context: ContextBuilder,
        settings: LoopSettings,
    ) -> Self {
        Self {
            router,
            tools,
            context,
            settings,
        }
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn context_builder(&self) -> &ContextBuilder {
        &self.context
    }

    pub fn router(&self) -> &ProviderRouter {
        &self.router
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Append `user_text` under `current` and run the loop to completion.
    ///
    /// Returns only the final assistant text.
    ///
    /// # Errors
    ///
    /// - `Cancelled` if `cancel` fires before or during a Sending pass,
    ///   context summarization included
    /// - `IterationLimit` once `max_iterations` passes ran without a final reply
    /// - the router's error when a provider call fails for good
    /// - `InvalidState` if the tree no longer reaches `current`
    pub async fn run(
        &self,
        session: &mut Session,
        user_text: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let overrides = session.overrides.clone();
        let model = overrides
            .model
            .clone()
            .unwrap_or_else(|| self.settings.model.clone());
        let temperature = overrides.temperature.unwrap_or(self.settings.temperature);
        let route = RouteRequest::model(&model).with_provider(overrides.provider.as_deref());
        let options = ChatOptions::new()
            .with_max_tokens(self.settings.max_tokens)
            .with_temperature(temperature);
        let tool_definitions = self.tools.definitions();
        let max_iterations = self.settings.max_iterations;

        session.append(NodeData::user(user_text))?;
        info!(session = %session.id, model = %model, "Processing message");

        for iteration in 1..=max_iterations {
            if cancel.is_cancelled() {
                return Err(self.fail(session, iteration, cancelled()));
            }
            debug!(session = %session.id, iteration, max_iterations, state = %LoopState::Sending, "Loop pass");

            let build = self.context.build_with_router(session, &self.router, &route);
            let built = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(cancelled()),
                turns = build => turns,
            };
            let turns = match built {
                Ok(turns) => turns,
                Err(e) => return Err(self.fail(session, iteration, e)),
            };

            debug!(session = %session.id, iteration, turns = turns.len(), state = %LoopState::AwaitingReply, "Waiting for provider");
            let call = self
                .router
                .chat(turns, tool_definitions.clone(), &route, options.clone());
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(cancelled()),
                reply = call => reply,
            };
            let reply = match outcome {
                Ok(reply) => reply,
                Err(e) => return Err(self.fail(session, iteration, e)),
            };

            if reply.has_tool_calls() {
                debug!(
                    session = %session.id,
                    iteration,
                    tools = reply.tool_calls.len(),
                    state = %LoopState::ExecutingTools,
                    "Executing requested tools"
                );
                self.execute_tools(session, &reply, &model, iteration).await?;
                continue;
            }

            let (input_tokens, output_tokens) = usage_of(&reply);
            session.append(
                NodeData::assistant(&reply.content)
                    .with_model(&model)
                    .with_tokens(input_tokens, output_tokens),
            )?;
            info!(session = %session.id, iteration, state = %LoopState::Done, "Message processed");
            return Ok(reply.content);
        }

        Err(self.fail(
            session,
            max_iterations,
            ClawError::IterationLimit { max_iterations },
        ))
    }

    /// Append a ToolCall/ToolResult pair for each requested tool.
    ///
    /// The first ToolCall node carries the reply text and token usage.
    async fn execute_tools(
        &self,
        session: &mut Session,
        reply: &LLMResponse,
        model: &str,
        iteration: u32,
    ) -> Result<()> {
        let (input_tokens, output_tokens) = usage_of(reply);
        for (i, call) in reply.tool_calls.iter().enumerate() {
            let mut data = NodeData::tool_call(
                if i == 0 { reply.content.as_str() } else { "" },
                &call.id,
                &call.name,
                &call.arguments,
            )
            .with_model(model);
            if i == 0 {
                data = data.with_tokens(input_tokens, output_tokens);
            }
            session.append(data)?;

            let ctx = ToolContext::new()
                .with_session(&session.id)
                .with_iteration(iteration);
            let result = self.dispatch(call, &ctx).await;
            session.append(NodeData::tool_result(&call.id, &call.name, &result))?;
        }
        Ok(())
    }

    /// Run one tool; a failure becomes the result text.
    async fn dispatch(&self, call: &LLMToolCall, ctx: &ToolContext) -> String {
        match self.tools.execute(&call.name, &call.arguments, ctx).await {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = %call.name, id = %call.id, error = %e, "Tool failed, reporting to model");
                format!("Error: tool '{}' failed: {}", call.name, e)
            }
        }
    }

    fn fail(&self, session: &Session, iteration: u32, err: ClawError) -> ClawError {
        error!(
            session = %session.id,
            iteration,
            state = %LoopState::Failed,
            error = %err,
            "Message processing failed"
        );
        err
    }
}

fn cancelled() -> ClawError {
    ClawError::Cancelled("turn cancelled before the provider replied".into())
}

fn usage_of(reply: &LLMResponse) -> (u32, u32) {
    reply
        .usage
        .map(|u| (u.prompt_tokens, u.completion_tokens))
        .unwrap_or((0, 0))
}
