//! Session module - One conversation tree plus a position in it
//!
//! A [`Session`] owns a [`MessageTree`], the `current` node the next turn
//! will be appended under, and a bounded [`NavigationHistory`]. Sessions are
//! registered in an [`Agent`](crate::agent::Agent)'s session table.
//!
//! # Example
//!
//! ```
//! use arborclaw::session::Session;
//! use arborclaw::tree::NodeData;
//!
//! let mut session = Session::new("scratch");
//! let question = session.append(NodeData::user("What is 2 + 2?")).unwrap();
//! let first = session.append(NodeData::assistant("4")).unwrap();
//!
//! // Go back to the question and branch a different answer from there.
//! session.navigate_to(question).unwrap();
//! session.append(NodeData::assistant("Four.")).unwrap();
//!
//! assert_eq!(session.tree().children(question).unwrap().len(), 2);
//! session.navigate_back().unwrap();
//! assert_eq!(session.current(), first);
//! ```

pub mod history;

pub use history::{NavigationHistory, DEFAULT_HISTORY_CAPACITY};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClawError, Result};
use crate::tree::{MessageNode, MessageTree, NodeData, NodeId};

/// Per-session settings that take precedence over the agent defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionOverrides {
    /// Provider name to route to, bypassing model-prefix rules
    pub provider: Option<String>,
    /// Model to request instead of the configured default
    pub model: Option<String>,
    /// Sampling temperature instead of the configured default
    pub temperature: Option<f32>,
}

/// Direction for sibling navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiblingDirection {
    Previous,
    Next,
}

/// Snapshot of a session for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub name: String,
    pub total_messages: u64,
    pub total_tokens: u64,
    pub node_count: usize,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A conversation: one tree, the current position, and navigation history.
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Human-readable name
    pub name: String,
    tree: MessageTree,
    current: NodeId,
    history: NavigationHistory,
    /// Turns appended so far, root excluded
    pub total_messages: u64,
    /// Input plus output tokens recorded on appended turns
    pub total_tokens: u64,
    /// Provider/model/temperature overrides
    pub overrides: SessionOverrides,
    active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a session with an empty tree and the default history capacity.
    pub fn new(name: &str) -> Self {
        Self::with_history_capacity(name, DEFAULT_HISTORY_CAPACITY)
    }

    /// Create a session with an empty tree and a specific history capacity.
    ///
    /// The tree's root is an empty System node; it anchors the tree and is
    /// never sent to a provider.
    pub fn with_history_capacity(name: &str, capacity: usize) -> Self {
        let tree = MessageTree::new(NodeData::system(""));
        let root = tree.root();
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            tree,
            current: root,
            history: NavigationHistory::new(capacity),
            total_messages: 0,
            total_tokens: 0,
            overrides: SessionOverrides::default(),
            active: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn tree(&self) -> &MessageTree {
        &self.tree
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    pub fn current(&self) -> NodeId {
        self.current
    }

    pub fn current_node(&self) -> Result<&MessageNode> {
        self.tree.get(self.current)
    }

    pub fn history(&self) -> &NavigationHistory {
        &self.history
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn rename(&mut self, name: &str) {
        self.name = name.to_string();
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Append a completed turn under `current` and move `current` onto it.
    ///
    /// Appending is not navigation and leaves the history untouched.
    pub fn append(&mut self, data: NodeData) -> Result<NodeId> {
        let tokens = u64::from(data.input_tokens) + u64::from(data.output_tokens);
        let id = self.tree.append(self.current, data)?;
        self.tree.complete(id)?;
        self.current = id;
        self.total_messages += 1;
        self.total_tokens += tokens;
        self.touch();
        debug!(session = %self.id, node = %id, "Appended turn");
        Ok(id)
    }

    /// Root-to-current path, re-checking reachability.
    ///
    /// # Errors
    ///
    /// `InvalidState` if `current` is not reachable from the root.
    pub fn path_to_current(&self) -> Result<Vec<NodeId>> {
        self.tree.path(self.current).map_err(|e| {
            ClawError::InvalidState(format!(
                "current node {} is not reachable from the root: {}",
                self.current, e
            ))
        })
    }

    /// Move `current` to `target`, recording the departed node.
    ///
    /// # Errors
    ///
    /// `NotFound` if `target` is absent or detached from the root.
    pub fn navigate_to(&mut self, target: NodeId) -> Result<NodeId> {
        self.tree.path(target)?;
        if target != self.current {
            self.history.record(self.current);
            self.current = target;
            self.touch();
        }
        Ok(self.current)
    }

    /// Return to the node left by the most recent navigation.
    ///
    /// # Errors
    ///
    /// `InvalidState` when there is nothing to go back to.
    pub fn navigate_back(&mut self) -> Result<NodeId> {
        let previous = self
            .history
            .pop_back()
            .ok_or_else(|| ClawError::InvalidState("navigation history is empty".into()))?;
        self.history.push_forward(self.current);
        self.current = previous;
        self.touch();
        Ok(previous)
    }

    /// Redo a navigation undone by [`navigate_back`](Self::navigate_back).
    ///
    /// # Errors
    ///
    /// `InvalidState` when there is nothing to go forward to.
    pub fn navigate_forward(&mut self) -> Result<NodeId> {
        let next = self
            .history
            .pop_forward()
            .ok_or_else(|| ClawError::InvalidState("no forward history".into()))?;
        self.history.push_back(self.current);
        self.current = next;
        self.touch();
        Ok(next)
    }

    /// # Errors
    ///
    /// `InvalidState` if `current` is the root.
    pub fn navigate_to_parent(&mut self) -> Result<NodeId> {
        let parent = self
            .tree
            .parent(self.current)?
            .ok_or_else(|| ClawError::InvalidState("already at the root".into()))?;
        self.navigate_to(parent)
    }

    /// # Errors
    ///
    /// `NotFound` if `current` has no child at `index`.
    pub fn navigate_to_child(&mut self, index: usize) -> Result<NodeId> {
        let child = self
            .tree
            .children(self.current)?
            .get(index)
            .copied()
            .ok_or_else(|| {
                ClawError::NotFound(format!("node {} has no child {}", self.current, index))
            })?;
        self.navigate_to(child)
    }

    /// Switch to an adjacent branch at the current depth.
    ///
    /// # Errors
    ///
    /// `InvalidState` if there is no sibling in that direction.
    pub fn navigate_to_sibling(&mut self, direction: SiblingDirection) -> Result<NodeId> {
        let sibling = match direction {
            SiblingDirection::Previous => self.tree.prev_sibling(self.current)?,
            SiblingDirection::Next => self.tree.next_sibling(self.current)?,
        }
        .ok_or_else(|| ClawError::InvalidState(format!("no {:?} sibling", direction)))?;
        self.navigate_to(sibling)
    }

    /// Create an alternate version of `from` as a new sibling under the same
    /// parent, copying its data (tool call details included, token usage
    /// excluded), and navigate to it.
    ///
    /// The original node and everything below it stay untouched; the next
    /// appended turn continues the new branch.
    ///
    /// # Errors
    ///
    /// `InvalidState` when `from` is the root, `NotFound` when it is absent
    /// or detached.
    pub fn create_branch(&mut self, from: NodeId) -> Result<NodeId> {
        self.tree.path(from)?;
        let parent = self
            .tree
            .parent(from)?
            .ok_or_else(|| ClawError::InvalidState("cannot branch from the root".into()))?;
        let mut data = self.tree.get(from)?.data().clone();
        data.input_tokens = 0;
        data.output_tokens = 0;
        let branch = self.tree.append(parent, data)?;
        self.tree.complete(branch)?;
        self.total_messages += 1;
        debug!(session = %self.id, from = %from, branch = %branch, "Created branch");
        self.navigate_to(branch)
    }

    /// Listing snapshot.
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            total_messages: self.total_messages,
            total_tokens: self.total_tokens,
            node_count: self.tree.len(),
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeKind;

    #[test]
    fn test_new_session_sits_at_root() {
        let session = Session::new("test");
        assert_eq!(session.current(), session.root());
        assert_eq!(session.total_messages, 0);
        assert_eq!(session.path_to_current().unwrap(), vec![session.root()]);
        assert!(!session.is_active());
    }

    #[test]
    fn test_append_moves_current_and_counts() {
        let mut session = Session::new("test");
        let user = session.append(NodeData::user("hi")).unwrap();
        let reply = session
            .append(NodeData::assistant("hello").with_tokens(10, 5))
            .unwrap();
        assert_eq!(session.current(), reply);
        assert_eq!(session.total_messages, 2);
        assert_eq!(session.total_tokens, 15);
        assert_eq!(
            session.path_to_current().unwrap(),
            vec![session.root(), user, reply]
        );
        assert_eq!(session.history().back_len(), 0);
    }

    #[test]
    fn test_path_length_matches_depth() {
        let mut session = Session::new("test");
        for i in 0..5 {
            session.append(NodeData::user(&i.to_string())).unwrap();
        }
        let depth = session.tree().depth(session.current()).unwrap();
        assert_eq!(session.path_to_current().unwrap().len(), depth + 1);
    }

    #[test]
    fn test_navigate_back_restores_prior_current() {
        let mut session = Session::new("test");
        let a = session.append(NodeData::user("a")).unwrap();
        let b = session.append(NodeData::assistant("b")).unwrap();
        session.navigate_to(a).unwrap();
        assert_eq!(session.current(), a);
        assert_eq!(session.navigate_back().unwrap(), b);
        assert_eq!(session.current(), b);
        assert_eq!(session.navigate_forward().unwrap(), a);
        assert_eq!(session.current(), a);
    }

    #[test]
    fn test_navigate_back_on_empty_history_fails() {
        let mut session = Session::new("test");
        assert!(matches!(
            session.navigate_back(),
            Err(ClawError::InvalidState(_))
        ));
        assert!(matches!(
            session.navigate_forward(),
            Err(ClawError::InvalidState(_))
        ));
        assert_eq!(session.current(), session.root());
    }

    #[test]
    fn test_navigate_to_parent_at_root_fails() {
        let mut session = Session::new("test");
        assert!(matches!(
            session.navigate_to_parent(),
            Err(ClawError::InvalidState(_))
        ));
        let a = session.append(NodeData::user("a")).unwrap();
        session.append(NodeData::assistant("b")).unwrap();
        assert_eq!(session.navigate_to_parent().unwrap(), a);
    }

    #[test]
    fn test_navigate_to_detached_node_fails() {
        let mut session = Session::new("test");
        assert!(matches!(
            session.navigate_to(NodeId(42)),
            Err(ClawError::NotFound(_))
        ));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut session = Session::with_history_capacity("test", 2);
        let a = session.append(NodeData::user("a")).unwrap();
        let b = session.append(NodeData::assistant("b")).unwrap();
        let c = session.append(NodeData::user("c")).unwrap();
        session.navigate_to(a).unwrap();
        session.navigate_to(b).unwrap();
        session.navigate_to(c).unwrap();
        assert_eq!(session.history().back_len(), 2);
        assert_eq!(session.navigate_back().unwrap(), b);
        assert_eq!(session.navigate_back().unwrap(), a);
        assert!(session.navigate_back().is_err());
    }

    #[test]
    fn test_create_branch_adds_sibling_copy() {
        let mut session = Session::new("test");
        let question = session.append(NodeData::user("question")).unwrap();
        let answer = session.append(NodeData::assistant("first answer")).unwrap();

        let branch = session.create_branch(answer).unwrap();
        assert_eq!(session.current(), branch);
        assert_eq!(session.tree().parent(branch).unwrap(), Some(question));
        assert_eq!(session.tree().children(question).unwrap(), &[answer, branch]);
        let node = session.tree().get(branch).unwrap();
        assert_eq!(node.kind(), NodeKind::Assistant);
        assert_eq!(node.content(), "first answer");
        // The original is untouched.
        assert_eq!(session.tree().get(answer).unwrap().content(), "first answer");
        assert_eq!(session.navigate_back().unwrap(), answer);
    }

    #[test]
    fn test_create_branch_of_tool_call_keeps_call_details() {
        let mut session = Session::new("test");
        session.append(NodeData::user("read it")).unwrap();
        let call = session
            .append(
                NodeData::tool_call("checking", "call_7", "file_read", r#"{"path":"a"}"#)
                    .with_tokens(30, 4),
            )
            .unwrap();

        let branch = session.create_branch(call).unwrap();
        let data = session.tree().get(branch).unwrap().data().clone();
        assert_eq!(data.kind, NodeKind::ToolCall);
        assert_eq!(data.content, "checking");
        assert_eq!(data.tool_name.as_deref(), Some("file_read"));
        assert_eq!(data.tool_call_id.as_deref(), Some("call_7"));
        assert_eq!(data.tool_arguments.as_deref(), Some(r#"{"path":"a"}"#));
        assert_eq!((data.input_tokens, data.output_tokens), (0, 0));
        assert_eq!(session.total_tokens, 34);
    }

    #[test]
    fn test_create_branch_from_root_fails() {
        let mut session = Session::new("test");
        let root = session.root();
        assert!(matches!(
            session.create_branch(root),
            Err(ClawError::InvalidState(_))
        ));
    }

    #[test]
    fn test_sibling_and_child_navigation() {
        let mut session = Session::new("test");
        let q = session.append(NodeData::user("q")).unwrap();
        let first = session.append(NodeData::assistant("1")).unwrap();
        let second = session.create_branch(first).unwrap();

        assert_eq!(
            session.navigate_to_sibling(SiblingDirection::Previous).unwrap(),
            first
        );
        assert_eq!(
            session.navigate_to_sibling(SiblingDirection::Next).unwrap(),
            second
        );
        assert!(session
            .navigate_to_sibling(SiblingDirection::Next)
            .is_err());

        session.navigate_to(q).unwrap();
        assert_eq!(session.navigate_to_child(1).unwrap(), second);
        assert!(matches!(
            session.navigate_to_child(5),
            Err(ClawError::NotFound(_))
        ));
    }

    #[test]
    fn test_info_snapshot() {
        let mut session = Session::new("notes");
        session.append(NodeData::user("hi")).unwrap();
        let info = session.info();
        assert_eq!(info.name, "notes");
        assert_eq!(info.total_messages, 1);
        assert_eq!(info.node_count, 2);
        assert!(!info.active);
    }
}
