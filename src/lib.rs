//! ArborClaw - Agent orchestration core with branching conversation trees
//!
//! A conversation is a tree of turns. Each [`Session`] owns one tree and a
//! position in it; the [`Agent`] appends a user turn at that position, builds
//! a bounded context from the root-to-current path, and runs the
//! tool-calling loop against a [`ProviderRouter`] until the model replies
//! without requesting tools.

pub mod agent;
pub mod config;
pub mod error;
pub mod providers;
pub mod session;
pub mod tools;
pub mod tree;
pub mod utils;

pub use agent::{Agent, AgentLoop, ContextBuilder, Navigation};
pub use config::Config;
pub use error::{ClawError, ProviderError, Result};
pub use providers::{
    ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ProviderRouter, RetryPolicy,
    ToolDefinition, Turn, Usage,
};
pub use session::{Session, SessionInfo, SiblingDirection};
pub use tools::{Tool, ToolContext, ToolRegistry};
pub use tree::{MessageTree, NodeData, NodeId, NodeKind};
