//! Tree module - Branching conversation storage
//!
//! A conversation is stored as a tree rather than a flat log: every turn is a
//! node, and editing or retrying a turn creates a sibling branch instead of
//! overwriting history. Nodes live in an arena owned by [`MessageTree`] and
//! are addressed by [`NodeId`] handles, so path walks and teardown are
//! bounds-checked and cannot dangle.
//!
//! # Example
//!
//! ```
//! use arborclaw::tree::{MessageTree, NodeData, NodeKind};
//!
//! let mut tree = MessageTree::new(NodeData::system(""));
//! let root = tree.root();
//! let hello = tree.create(NodeData::user("hello"));
//! tree.add_child(root, hello).unwrap();
//!
//! assert_eq!(tree.path(hello).unwrap(), vec![root, hello]);
//! assert_eq!(tree.get(hello).unwrap().kind(), NodeKind::User);
//! ```

pub mod types;

pub use types::{MessageNode, NodeData, NodeId, NodeKind};

use crate::error::{ClawError, Result};

/// Arena-backed conversation tree with exactly one root.
///
/// Ownership is expressed through the arena: the tree owns every node, and a
/// node's position in the tree is its `parent` handle plus its slot in the
/// parent's append-only child list. Nodes are never removed individually;
/// dropping the tree releases all of them together.
#[derive(Debug, Clone)]
pub struct MessageTree {
    nodes: Vec<MessageNode>,
    root: NodeId,
}

impl MessageTree {
    /// Create a tree whose root carries `root` as payload.
    ///
    /// The root is marked complete immediately.
    pub fn new(root: NodeData) -> Self {
        let id = NodeId(0);
        let mut node = MessageNode::new(id, root);
        node.complete = true;
        Self {
            nodes: vec![node],
            root: id,
        }
    }

    /// Handle of the root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Total number of nodes in the arena, detached ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A tree always holds its root, so it is never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether `id` was issued by this tree.
    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    /// Look up a node.
    pub fn get(&self, id: NodeId) -> Result<&MessageNode> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| ClawError::NotFound(format!("node {} is not in this tree", id)))
    }

    /// Create a detached node. It becomes part of the conversation once
    /// attached with [`add_child`](Self::add_child).
    pub fn create(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(MessageNode::new(id, data));
        id
    }

    /// Shorthand for [`create`](Self::create) with only kind and content.
    pub fn create_node(&mut self, kind: NodeKind, content: &str) -> NodeId {
        self.create(NodeData::new(kind, content))
    }

    /// Append `child` to `parent`'s child list.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if either handle is absent, the child is the root,
    /// already has a parent, or attaching it would close a cycle.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if !self.contains(parent) {
            return Err(ClawError::InvalidArgument(format!(
                "parent {} is not in this tree",
                parent
            )));
        }
        if !self.contains(child) {
            return Err(ClawError::InvalidArgument(format!(
                "child {} is not in this tree",
                child
            )));
        }
        if child == self.root {
            return Err(ClawError::InvalidArgument(
                "the root cannot become a child".into(),
            ));
        }
        if self.nodes[child.0].parent.is_some() {
            return Err(ClawError::InvalidArgument(format!(
                "node {} already has a parent",
                child
            )));
        }
        if self.ancestors(parent).any(|id| id == child) {
            return Err(ClawError::InvalidArgument(format!(
                "attaching {} under {} would create a cycle",
                child, parent
            )));
        }

        let sibling_index = self.nodes[parent.0].children.len();
        self.nodes[parent.0].children.push(child);
        let node = &mut self.nodes[child.0];
        node.parent = Some(parent);
        node.sibling_index = sibling_index;
        Ok(())
    }

    /// Create a node and attach it under `parent` in one step.
    pub fn append(&mut self, parent: NodeId, data: NodeData) -> Result<NodeId> {
        if !self.contains(parent) {
            return Err(ClawError::InvalidArgument(format!(
                "parent {} is not in this tree",
                parent
            )));
        }
        let id = self.create(data);
        self.add_child(parent, id)?;
        Ok(id)
    }

    /// Mutable access to a node's payload while it is still in progress.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown handle, `InvalidState` once the node is complete.
    pub fn data_mut(&mut self, id: NodeId) -> Result<&mut NodeData> {
        let node = self
            .nodes
            .get_mut(id.0)
            .ok_or_else(|| ClawError::NotFound(format!("node {} is not in this tree", id)))?;
        if node.complete {
            return Err(ClawError::InvalidState(format!(
                "node {} is complete and can no longer change",
                id
            )));
        }
        Ok(&mut node.data)
    }

    /// Mark a node's content final.
    pub fn complete(&mut self, id: NodeId) -> Result<()> {
        let node = self
            .nodes
            .get_mut(id.0)
            .ok_or_else(|| ClawError::NotFound(format!("node {} is not in this tree", id)))?;
        node.complete = true;
        Ok(())
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.get(id)?.parent)
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(self.get(id)?.children())
    }

    /// The sibling created just before `id`, derived from the parent's child list.
    pub fn prev_sibling(&self, id: NodeId) -> Result<Option<NodeId>> {
        let node = self.get(id)?;
        let Some(parent) = node.parent else {
            return Ok(None);
        };
        if node.sibling_index == 0 {
            return Ok(None);
        }
        Ok(self.nodes[parent.0]
            .children
            .get(node.sibling_index - 1)
            .copied())
    }

    /// The sibling created just after `id`, derived from the parent's child list.
    pub fn next_sibling(&self, id: NodeId) -> Result<Option<NodeId>> {
        let node = self.get(id)?;
        let Some(parent) = node.parent else {
            return Ok(None);
        };
        Ok(self.nodes[parent.0]
            .children
            .get(node.sibling_index + 1)
            .copied())
    }

    /// Iterate from `id` up to the top of its chain, `id` excluded.
    fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes.get(id.0).and_then(|n| n.parent), move |p| {
            self.nodes.get(p.0).and_then(|n| n.parent)
        })
        .take(self.nodes.len())
    }

    /// Ordered path from the root to `target`, both included.
    ///
    /// # Errors
    ///
    /// `NotFound` if `target` is absent or not a descendant of the root.
    pub fn path(&self, target: NodeId) -> Result<Vec<NodeId>> {
        self.path_from(self.root, target)
    }

    /// Ordered path from `from` to `target`, derived by walking `target`'s
    /// parent links. O(depth).
    ///
    /// # Errors
    ///
    /// `NotFound` if `target` is not `from` or one of its descendants,
    /// `InvalidState` if the parent chain is longer than the arena (a cycle).
    pub fn path_from(&self, from: NodeId, target: NodeId) -> Result<Vec<NodeId>> {
        self.get(from)?;
        self.get(target)?;

        let mut path = vec![target];
        let mut cursor = target;
        while cursor != from {
            match self.nodes[cursor.0].parent {
                Some(parent) => {
                    path.push(parent);
                    cursor = parent;
                }
                None => {
                    return Err(ClawError::NotFound(format!(
                        "node {} is not a descendant of {}",
                        target, from
                    )));
                }
            }
            if path.len() > self.nodes.len() {
                return Err(ClawError::InvalidState(format!(
                    "parent chain of {} does not terminate",
                    target
                )));
            }
        }
        path.reverse();
        Ok(path)
    }

    /// Number of edges between the root and `id`.
    pub fn depth(&self, id: NodeId) -> Result<usize> {
        Ok(self.path(id)?.len() - 1)
    }

    /// Whether `id` is reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.path(id).is_ok()
    }

    /// All nodes reachable from the root, children before their parent.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            for child in self.nodes[id.0].children.iter().rev() {
                stack.push((*child, false));
            }
        }
        order
    }

    /// Reachable nodes without children, in post-order.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.post_order()
            .into_iter()
            .filter(|id| self.nodes[id.0].is_leaf())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample_tree() -> (MessageTree, Vec<NodeId>) {
        // root
        // ├── a
        // │   ├── b
        // │   └── c
        // │       └── d
        // └── e
        let mut tree = MessageTree::new(NodeData::system(""));
        let root = tree.root();
        let a = tree.append(root, NodeData::user("a")).unwrap();
        let b = tree.append(a, NodeData::assistant("b")).unwrap();
        let c = tree.append(a, NodeData::assistant("c")).unwrap();
        let d = tree.append(c, NodeData::user("d")).unwrap();
        let e = tree.append(root, NodeData::user("e")).unwrap();
        (tree, vec![root, a, b, c, d, e])
    }

    #[test]
    fn test_new_tree_has_only_root() {
        let tree = MessageTree::new(NodeData::system("root"));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.path(tree.root()).unwrap(), vec![tree.root()]);
        assert!(tree.get(tree.root()).unwrap().is_complete());
    }

    #[test]
    fn test_create_is_detached() {
        let mut tree = MessageTree::new(NodeData::system(""));
        let id = tree.create_node(NodeKind::User, "hi");
        assert!(tree.get(id).unwrap().parent().is_none());
        assert!(!tree.is_attached(id));
        assert!(matches!(tree.path(id), Err(ClawError::NotFound(_))));
    }

    #[test]
    fn test_add_child_rejects_absent_parent() {
        let mut tree = MessageTree::new(NodeData::system(""));
        let child = tree.create_node(NodeKind::User, "hi");
        let result = tree.add_child(NodeId(99), child);
        assert!(matches!(result, Err(ClawError::InvalidArgument(_))));
    }

    #[test]
    fn test_add_child_rejects_reparenting_and_root() {
        let (mut tree, ids) = sample_tree();
        assert!(matches!(
            tree.add_child(ids[5], ids[2]),
            Err(ClawError::InvalidArgument(_))
        ));
        assert!(matches!(
            tree.add_child(ids[1], ids[0]),
            Err(ClawError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_add_child_rejects_cycle_between_detached_nodes() {
        let mut tree = MessageTree::new(NodeData::system(""));
        let a = tree.create_node(NodeKind::User, "a");
        let b = tree.create_node(NodeKind::Assistant, "b");
        tree.add_child(a, b).unwrap();
        assert!(matches!(
            tree.add_child(b, a),
            Err(ClawError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_children_keep_creation_order_and_siblings_agree() {
        let (tree, ids) = sample_tree();
        let (root, a, b, c, _d, e) = (ids[0], ids[1], ids[2], ids[3], ids[4], ids[5]);

        assert_eq!(tree.children(root).unwrap(), &[a, e]);
        assert_eq!(tree.children(a).unwrap(), &[b, c]);

        assert_eq!(tree.prev_sibling(b).unwrap(), None);
        assert_eq!(tree.next_sibling(b).unwrap(), Some(c));
        assert_eq!(tree.prev_sibling(c).unwrap(), Some(b));
        assert_eq!(tree.next_sibling(c).unwrap(), None);
        assert_eq!(tree.next_sibling(root).unwrap(), None);

        for id in tree.post_order() {
            let children = tree.children(id).unwrap();
            for (i, child) in children.iter().enumerate() {
                let prev = if i == 0 { None } else { Some(children[i - 1]) };
                assert_eq!(tree.prev_sibling(*child).unwrap(), prev);
                assert_eq!(tree.next_sibling(*child).unwrap(), children.get(i + 1).copied());
            }
        }
    }

    #[test]
    fn test_path_and_depth() {
        let (tree, ids) = sample_tree();
        let (root, a, c, d) = (ids[0], ids[1], ids[3], ids[4]);
        assert_eq!(tree.path(d).unwrap(), vec![root, a, c, d]);
        assert_eq!(tree.depth(d).unwrap(), 3);
        assert_eq!(tree.path(root).unwrap(), vec![root]);
        assert_eq!(tree.depth(root).unwrap(), 0);
    }

    #[test]
    fn test_path_from_requires_descendant() {
        let (tree, ids) = sample_tree();
        let (a, c, d, e) = (ids[1], ids[3], ids[4], ids[5]);
        assert_eq!(tree.path_from(a, d).unwrap(), vec![a, c, d]);
        assert!(matches!(tree.path_from(e, d), Err(ClawError::NotFound(_))));
    }

    #[test]
    fn test_every_non_root_node_has_exactly_one_parent() {
        let (tree, _) = sample_tree();
        let order = tree.post_order();
        assert_eq!(order.len(), tree.len());

        // Rebuild the parent index from a traversal and compare.
        let mut rebuilt: HashMap<NodeId, NodeId> = HashMap::new();
        for id in &order {
            for child in tree.children(*id).unwrap() {
                assert!(rebuilt.insert(*child, *id).is_none());
            }
        }
        for id in &order {
            assert_eq!(tree.parent(*id).unwrap(), rebuilt.get(id).copied());
        }
        assert!(!rebuilt.contains_key(&tree.root()));
    }

    #[test]
    fn test_post_order_visits_children_first() {
        let (tree, ids) = sample_tree();
        let order = tree.post_order();
        let pos = |id: NodeId| order.iter().position(|x| *x == id).unwrap();
        for id in &ids[1..] {
            let parent = tree.parent(*id).unwrap().unwrap();
            assert!(pos(*id) < pos(parent));
        }
        assert_eq!(*order.last().unwrap(), tree.root());
    }

    #[test]
    fn test_leaves() {
        let (tree, ids) = sample_tree();
        assert_eq!(tree.leaves(), vec![ids[2], ids[4], ids[5]]);
    }

    #[test]
    fn test_completed_node_rejects_mutation() {
        let mut tree = MessageTree::new(NodeData::system(""));
        let id = tree.append(tree.root(), NodeData::assistant("")).unwrap();
        tree.data_mut(id).unwrap().content.push_str("partial");
        tree.complete(id).unwrap();
        assert_eq!(tree.get(id).unwrap().content(), "partial");
        assert!(matches!(tree.data_mut(id), Err(ClawError::InvalidState(_))));
    }

    #[test]
    fn test_completed_node_still_accepts_children() {
        let mut tree = MessageTree::new(NodeData::system(""));
        let id = tree.append(tree.root(), NodeData::user("q")).unwrap();
        tree.complete(id).unwrap();
        assert!(tree.append(id, NodeData::assistant("a")).is_ok());
    }
}
