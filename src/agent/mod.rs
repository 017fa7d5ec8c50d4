//! Agent module - Session table and the per-message tool-calling loop
//!
//! The [`Agent`] is what a host (CLI, daemon) talks to. It owns:
//!
//! - the session table, in creation order, plus one active-session reference
//! - the [`ToolRegistry`] and [`ProviderRouter`], shared read-only by every session
//! - the [`AgentLoop`] that turns one user message into one assistant reply
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌────────────────┐
//! │    Host     │────>│    Agent    │────>│ ProviderRouter │
//! │ (CLI/daemon)│     │ (sessions)  │     │ retry/failover │
//! └─────────────┘     └─────────────┘     └────────────────┘
//!                            │                     │
//!                            ▼                     ▼
//!                     ┌─────────────┐     ┌────────────────┐
//!                     │  AgentLoop  │────>│  ToolRegistry  │
//!                     │  + Context  │     │                │
//!                     └─────────────┘     └────────────────┘
//! ```
//!
//! Each session sits behind its own mutex, so one tree is only ever mutated by
//! one loop pass at a time while distinct sessions run concurrently. The
//! table keeps the active id and a listing snapshot per session outside that
//! mutex.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use arborclaw::agent::Agent;
//! use arborclaw::providers::{OpenAIProvider, ProviderRouter};
//! use arborclaw::tools::{EchoTool, ToolRegistry};
//!
//! # async fn run() -> arborclaw::Result<()> {
//! let mut router = ProviderRouter::new();
//! router.register("openai", Arc::new(OpenAIProvider::new()));
//! router.set_shared_key("openai", "sk-...");
//!
//! let mut tools = ToolRegistry::new();
//! tools.register(Box::new(EchoTool));
//!
//! let agent = Agent::new(router, tools);
//! let session = agent.create_session("scratch").await;
//! let reply = agent.process_message(&session, "Hello!").await?;
//! println!("{}", reply);
//! # Ok(())
//! # }
//! ```

pub mod compaction;
mod context;
mod r#loop;

pub use context::{ContextBuilder, ContextWindow};
pub use r#loop::{AgentLoop, LoopSettings, LoopState};

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{ClawError, Result};
use crate::providers::ProviderRouter;
use crate::session::{Session, SessionInfo, SiblingDirection, DEFAULT_HISTORY_CAPACITY};
use crate::tools::ToolRegistry;
use crate::tree::NodeId;

/// A navigation request against one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Jump to any node of the session's tree
    To(NodeId),
    Back,
    Forward,
    Parent,
    /// The n-th child of `current`, in creation order
    Child(usize),
    Sibling(SiblingDirection),
    /// Create an alternate version of the given node and move onto it
    Branch(NodeId),
}

struct SessionSlot {
    id: String,
    session: Arc<Mutex<Session>>,
    /// Listing snapshot, refreshed whenever the agent releases the session
    info: SessionInfo,
}

/// Registered sessions and the active id.
///
/// Table operations never wait on a session's mutex, so listing, closing and
/// switching stay responsive while a session is mid-turn.
#[derive(Default)]
struct SessionTable {
    slots: Vec<SessionSlot>,
    active: Option<String>,
}

impl SessionTable {
    fn find(&self, id: &str) -> Option<Arc<Mutex<Session>>> {
        self.slots
            .iter()
            .find(|slot| slot.id == id)
            .map(|slot| Arc::clone(&slot.session))
    }

    fn is_active(&self, id: &str) -> bool {
        self.active.as_deref() == Some(id)
    }
}

/// Session table plus the loop that serves them.
pub struct Agent {
    sessions: RwLock<SessionTable>,
    runner: AgentLoop,
    history_capacity: usize,
}

impl Agent {
    /// Create an agent with default loop settings and context limits.
    pub fn new(router: ProviderRouter, tools: ToolRegistry) -> Self {
        Self::with_parts(
            Arc::new(router),
            Arc::new(tools),
            ContextBuilder::new(),
            LoopSettings::default(),
        )
    }

    /// Create an agent from explicit parts.
    pub fn with_parts(
        router: Arc<ProviderRouter>,
        tools: Arc<ToolRegistry>,
        context: ContextBuilder,
        settings: LoopSettings,
    ) -> Self {
        Self {
            sessions: RwLock::new(SessionTable::default()),
            runner: AgentLoop::new(router, tools, context, settings),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }

    /// Build an agent from configuration: routing, retry, context and loop
    /// settings all come from `config`.
    ///
    /// # Errors
    ///
    /// `ClawError::Config` if the configuration fails validation.
    pub fn from_config(config: &Config, tools: ToolRegistry) -> Result<Self> {
        config.validate()?;
        let router = ProviderRouter::from_config(config);
        let context = ContextBuilder::from_config(&config.agent, &config.context);
        let settings = LoopSettings::from_config(&config.agent);
        Ok(Self::with_parts(Arc::new(router), Arc::new(tools), context, settings)
            .with_history_capacity(config.session.history_capacity))
    }

    /// Navigation-history capacity for sessions created afterwards.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity.max(1);
        self
    }

    pub fn runner(&self) -> &AgentLoop {
        &self.runner
    }

    /// Create and register a session; it becomes active if none was.
    pub async fn create_session(&self, name: &str) -> String {
        let mut session = Session::with_history_capacity(name, self.history_capacity);
        let id = session.id.clone();

        let mut table = self.sessions.write().await;
        if table.active.is_none() {
            session.set_active(true);
            table.active = Some(id.clone());
        }
        table.slots.push(SessionSlot {
            id: id.clone(),
            info: session.info(),
            session: Arc::new(Mutex::new(session)),
        });
        info!(session = %id, name = name, "Created session");
        id
    }

    /// Snapshots of every registered session, in creation order.
    ///
    /// A session that is mid-turn shows its state as of its last completed
    /// operation.
    pub async fn list_sessions(&self) -> Vec<SessionInfo> {
        let table = self.sessions.read().await;
        table
            .slots
            .iter()
            .map(|slot| SessionInfo {
                active: table.is_active(&slot.id),
                ..slot.info.clone()
            })
            .collect()
    }

    /// Unregister a session.
    ///
    /// Unknown ids are ignored. If the closed session was active, the first
    /// remaining session is promoted, or none is active. The tree is dropped
    /// once an in-flight turn on it, if any, finishes.
    pub async fn close_session(&self, id: &str) {
        let mut table = self.sessions.write().await;
        let Some(pos) = table.slots.iter().position(|s| s.id == id) else {
            debug!(session = %id, "Close of unknown session ignored");
            return;
        };
        table.slots.remove(pos);
        if table.is_active(id) {
            table.active = table.slots.first().map(|s| s.id.clone());
        }
        match table.active.as_deref() {
            Some(next) => info!(session = %id, active = %next, "Closed session"),
            None => info!(session = %id, "Closed session, none active"),
        }
    }

    /// Make `id` the active session.
    ///
    /// # Errors
    ///
    /// `NotFound` if `id` is not registered.
    pub async fn set_active(&self, id: &str) -> Result<()> {
        let mut table = self.sessions.write().await;
        if !table.slots.iter().any(|s| s.id == id) {
            return Err(session_not_found(id));
        }
        table.active = Some(id.to_string());
        debug!(session = %id, "Activated session");
        Ok(())
    }

    pub async fn active_session_id(&self) -> Option<String> {
        self.sessions.read().await.active.clone()
    }

    /// # Errors
    ///
    /// `NotFound` if `id` is not registered.
    pub async fn rename_session(&self, id: &str, name: &str) -> Result<()> {
        self.with_session(id, |session| session.rename(name)).await
    }

    /// Lock a registered session, syncing its active flag from the table.
    async fn lock_session(&self, id: &str) -> Result<OwnedMutexGuard<Session>> {
        let handle = self
            .sessions
            .read()
            .await
            .find(id)
            .ok_or_else(|| session_not_found(id))?;
        let mut session = handle.lock_owned().await;
        let active = self.sessions.read().await.is_active(id);
        session.set_active(active);
        Ok(session)
    }

    /// Refresh the table's snapshot of `session`; a no-op once it was closed.
    async fn publish(&self, session: &Session) {
        let mut table = self.sessions.write().await;
        if let Some(slot) = table.slots.iter_mut().find(|s| s.id == session.id) {
            slot.info = session.info();
        }
    }

    /// Run `f` with exclusive access to a session.
    pub async fn with_session<R>(&self, id: &str, f: impl FnOnce(&mut Session) -> R) -> Result<R> {
        let mut session = self.lock_session(id).await?;
        let out = f(&mut session);
        self.publish(&session).await;
        Ok(out)
    }

    /// Append `text` as a user turn of session `id` and return the final
    /// assistant reply.
    pub async fn process_message(&self, id: &str, text: &str) -> Result<String> {
        self.process_message_with_cancel(id, text, &CancellationToken::new())
            .await
    }

    /// Like [`process_message`](Agent::process_message), abandoning the turn
    /// with `ClawError::Cancelled` once `cancel` fires.
    pub async fn process_message_with_cancel(
        &self,
        id: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let mut session = self.lock_session(id).await?;
        let outcome = self.runner.run(&mut session, text, cancel).await;
        self.publish(&session).await;
        outcome
    }

    /// Move a session's `current` node; returns the new position.
    pub async fn navigate(&self, id: &str, navigation: Navigation) -> Result<NodeId> {
        self.with_session(id, |session| match navigation {
            Navigation::To(node) => session.navigate_to(node),
            Navigation::Back => session.navigate_back(),
            Navigation::Forward => session.navigate_forward(),
            Navigation::Parent => session.navigate_to_parent(),
            Navigation::Child(index) => session.navigate_to_child(index),
            Navigation::Sibling(direction) => session.navigate_to_sibling(direction),
            Navigation::Branch(from) => session.create_branch(from),
        })
        .await?
    }
}

fn session_not_found(id: &str) -> ClawError {
    ClawError::NotFound(format!("session {}", id))
}
