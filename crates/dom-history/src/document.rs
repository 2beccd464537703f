#![forbid(unsafe_code)]

//! External document boundary.
//!
//! The engine never owns the tree it edits. Commands hold a [`NodeId`] plus a
//! shared [`DocumentHandle`] and go through the [`TreeDocument`] trait for
//! every mutation, so the same command can be stored in history, replayed
//! later, or dispatched on another thread without borrowing the tree.
//!
//! The document, for its part, reports every change it undergoes — whatever
//! the origin — as a [`Mutation`] notification. The recorder decides per
//! notification whether it is a genuinely external edit (capture it) or the
//! echo of a command the history is currently replaying (ignore it).

use std::fmt;
use std::sync::Arc;

use crate::command::CommandResult;

/// Opaque handle to a node in the external tree.
///
/// Commands store IDs, never references: the tree outlives no borrow, and
/// handles stay valid across undo/redo even while the node is detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Create a node ID from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How an attribute changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeChange {
    /// The attribute did not exist before.
    Added,
    /// The attribute was removed.
    Removed,
    /// The attribute existed and its value changed.
    Modified,
}

/// A primitive mutation notification emitted by the document.
///
/// Each variant carries enough before/after state to invert the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// A node was inserted under `parent`, before `next_sibling`
    /// (appended when `None`).
    NodeInserted {
        parent: NodeId,
        next_sibling: Option<NodeId>,
        node: NodeId,
    },
    /// A node was removed from `old_parent`; it used to sit before
    /// `old_next_sibling`.
    NodeRemoved {
        old_parent: NodeId,
        old_next_sibling: Option<NodeId>,
        node: NodeId,
        /// The notification's related node (the old parent, when known).
        related: Option<NodeId>,
    },
    /// An attribute was added, removed or modified on `element`.
    AttributeChanged {
        element: NodeId,
        name: String,
        namespace: Option<String>,
        change: AttributeChange,
        prev_value: Option<String>,
        new_value: Option<String>,
    },
    /// The text content of `node` changed.
    TextChanged {
        node: NodeId,
        prev_value: String,
        new_value: String,
    },
}

/// Primitive tree-mutation operations and queries the engine invokes.
///
/// Methods take `&self`: implementations use interior mutability so that
/// commands holding a shared [`DocumentHandle`] can execute, undo and redo
/// without exclusive access to the host.
pub trait TreeDocument: Send + Sync {
    /// Insert `node` under `parent`, before `next_sibling`; append when
    /// `next_sibling` is `None`. An already-attached node is moved.
    fn insert_before(
        &self,
        parent: NodeId,
        node: NodeId,
        next_sibling: Option<NodeId>,
    ) -> CommandResult;

    /// Remove `node` from `parent`.
    fn remove_node(&self, parent: NodeId, node: NodeId) -> CommandResult;

    /// Set an attribute on `element`.
    fn set_attribute(
        &self,
        element: NodeId,
        namespace: Option<&str>,
        name: &str,
        value: &str,
    ) -> CommandResult;

    /// Remove an attribute from `element`. Removing a missing attribute is
    /// a no-op.
    fn remove_attribute(&self, element: NodeId, namespace: Option<&str>, name: &str)
    -> CommandResult;

    /// Set the text content of `node`.
    fn set_text(&self, node: NodeId, value: &str) -> CommandResult;

    /// Whether the document still knows this node (attached or detached).
    /// Stale handles make commands invalid, see
    /// [`UndoableCommand::should_execute`](crate::command::UndoableCommand::should_execute).
    fn contains(&self, node: NodeId) -> bool;

    /// Current parent of `node`, if attached.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Current next sibling of `node`, if any.
    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;

    /// Current text content of `node`, if it carries any.
    fn text(&self, node: NodeId) -> Option<String>;

    /// Short human-readable label used in command display names,
    /// e.g. `rect "r1"` for an element with an id attribute.
    fn node_label(&self, node: NodeId) -> String {
        format!("node {node}")
    }
}

/// Shared handle to the external document.
pub type DocumentHandle = Arc<dyn TreeDocument>;
