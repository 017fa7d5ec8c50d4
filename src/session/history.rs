//! Bounded navigation history for a session.
//!
//! Explicit navigation records the node the user left on a back stack with
//! ring semantics: once the stack holds `capacity` entries, pushing drops the
//! oldest one, so per-session memory stays bounded no matter how long the
//! conversation runs. Going back moves the departed node onto a forward stack,
//! and any fresh navigation clears it, as in a browser.

use std::collections::VecDeque;

use crate::tree::NodeId;

/// Default number of back entries kept per session.
pub const DEFAULT_HISTORY_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct NavigationHistory {
    back: VecDeque<NodeId>,
    forward: Vec<NodeId>,
    capacity: usize,
}

impl NavigationHistory {
    /// Create an empty history. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            back: VecDeque::with_capacity(capacity),
            forward: Vec::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries available to [`pop_back`](Self::pop_back).
    pub fn back_len(&self) -> usize {
        self.back.len()
    }

    /// Number of entries available to [`pop_forward`](Self::pop_forward).
    pub fn forward_len(&self) -> usize {
        self.forward.len()
    }

    /// Record a fresh navigation away from `from`. Clears the forward stack.
    pub fn record(&mut self, from: NodeId) {
        self.push_back(from);
        self.forward.clear();
    }

    /// Push onto the back stack, dropping the oldest entry when full.
    pub(crate) fn push_back(&mut self, id: NodeId) {
        if self.back.len() == self.capacity {
            self.back.pop_front();
        }
        self.back.push_back(id);
    }

    pub(crate) fn pop_back(&mut self) -> Option<NodeId> {
        self.back.pop_back()
    }

    pub(crate) fn push_forward(&mut self, id: NodeId) {
        if self.forward.len() == self.capacity {
            self.forward.remove(0);
        }
        self.forward.push(id);
    }

    pub(crate) fn pop_forward(&mut self) -> Option<NodeId> {
        self.forward.pop()
    }
}

impl Default for NavigationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
