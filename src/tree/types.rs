//! Node types for the conversation tree
//!
//! A [`MessageNode`] lives inside a [`MessageTree`](super::MessageTree) arena
//! and is addressed by a [`NodeId`]. The payload a caller controls is
//! [`NodeData`]; the structural fields (parent, children, position among
//! siblings) are maintained by the tree only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Handle to a node inside one tree's arena.
///
/// Handles are only meaningful for the tree that issued them; the tree
/// bounds-checks every handle it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in its arena.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What kind of turn a node records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    User,
    Assistant,
    ToolCall,
    ToolResult,
    System,
    Summary,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::ToolCall => write!(f, "tool_call"),
            Self::ToolResult => write!(f, "tool_result"),
            Self::System => write!(f, "system"),
            Self::Summary => write!(f, "summary"),
        }
    }
}

/// Caller-controlled payload of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    /// Turn kind
    pub kind: NodeKind,
    /// Text content of the turn
    pub content: String,
    /// Tool name for ToolCall/ToolResult nodes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// JSON-encoded tool arguments for ToolCall nodes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_arguments: Option<String>,
    /// Tool result text for ToolResult nodes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<String>,
    /// Backend-issued id pairing a ToolCall with its ToolResult
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Model that produced this turn
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Prompt tokens billed for the call that produced this turn
    pub input_tokens: u32,
    /// Completion tokens billed for the call that produced this turn
    pub output_tokens: u32,
}

impl NodeData {
    /// Create a payload with only kind and content set.
    pub fn new(kind: NodeKind, content: &str) -> Self {
        Self {
            kind,
            content: content.to_string(),
            tool_name: None,
            tool_arguments: None,
            tool_result: None,
            tool_call_id: None,
            model: None,
            input_tokens: 0,
            output_tokens: 0,
        }
    }

    pub fn user(content: &str) -> Self {
        Self::new(NodeKind::User, content)
    }

    pub fn assistant(content: &str) -> Self {
        Self::new(NodeKind::Assistant, content)
    }

    pub fn system(content: &str) -> Self {
        Self::new(NodeKind::System, content)
    }

    /// A ToolCall payload recording the requested tool and its raw arguments.
    pub fn tool_call(content: &str, call_id: &str, name: &str, arguments: &str) -> Self {
        Self {
            tool_name: Some(name.to_string()),
            tool_arguments: Some(arguments.to_string()),
            tool_call_id: Some(call_id.to_string()),
            ..Self::new(NodeKind::ToolCall, content)
        }
    }

    /// A ToolResult payload. The result text doubles as the node content.
    pub fn tool_result(call_id: &str, name: &str, result: &str) -> Self {
        Self {
            tool_name: Some(name.to_string()),
            tool_result: Some(result.to_string()),
            tool_call_id: Some(call_id.to_string()),
            ..Self::new(NodeKind::ToolResult, result)
        }
    }

    /// Record the model that produced this turn.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    /// Record token usage of the call that produced this turn.
    pub fn with_tokens(mut self, input_tokens: u32, output_tokens: u32) -> Self {
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self
    }
}

/// A node in a [`MessageTree`](super::MessageTree).
#[derive(Debug, Clone)]
pub struct MessageNode {
    pub(crate) id: NodeId,
    pub(crate) data: NodeData,
    pub(crate) complete: bool,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Position in the parent's child list. Valid because child lists are
    /// append-only.
    pub(crate) sibling_index: usize,
}

impl MessageNode {
    pub(crate) fn new(id: NodeId, data: NodeData) -> Self {
        Self {
            id,
            data,
            complete: false,
            created_at: Utc::now(),
            parent: None,
            children: Vec::new(),
            sibling_index: 0,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.data.kind
    }

    pub fn content(&self) -> &str {
        &self.data.content
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    /// Whether the node's content is final.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in branch-creation order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}
