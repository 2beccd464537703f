#![forbid(unsafe_code)]

//! Undoable command infrastructure.
//!
//! A [`UndoableCommand`] is an atomic, invertible unit of document change.
//! Commands capture all before/after state they need at construction time
//! and go through a shared [`DocumentHandle`] when they run, so they can sit
//! in history indefinitely without borrowing the tree.
//!
//! Two families of commands exist:
//!
//! - **Capture commands** (`NodeInsertedCommand`, `NodeRemovedCommand`,
//!   `Attribute*Command`, `TextChangedCommand`): built from a mutation that
//!   *already happened* outside the engine. Their `execute()` is a no-op —
//!   the mutation is on the document already — while `undo()`/`redo()`
//!   perform the real inverse/replay.
//! - **Execute-now commands** (`AppendChildCommand`,
//!   `InsertNodeBeforeCommand`, `RemoveChildCommand`, `SetTextCommand`):
//!   built *before* the mutation; `execute()` performs it.
//!
//! # Invariants
//!
//! - `redo()` reproduces the exact post-state `execute()` produced;
//!   `undo()` reproduces the exact pre-state.
//! - Safety holds only for the sequence execute → undo → redo → undo → …;
//!   arbitrary reordering is not guaranteed.
//! - A command whose `should_execute()` is false is dropped, never run.

use std::fmt;

use crate::document::{DocumentHandle, NodeId};

/// Result of running a command.
pub type CommandResult = Result<(), CommandError>;

/// Errors surfaced by document mutations during execute/undo/redo.
///
/// These propagate to the caller; the history's bookkeeping is left in a
/// best-effort state and the caller must treat the operation as failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The document no longer knows this node.
    NodeNotFound(NodeId),
    /// `node` is not currently a child of `parent`.
    NotAChild { parent: NodeId, node: NodeId },
    /// The operation would detach a subtree into itself.
    WouldCycle { ancestor: NodeId, node: NodeId },
    /// The command or document is in a state the operation does not allow.
    InvalidState(String),
    /// Generic error with message.
    Other(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeNotFound(id) => write!(f, "node {id} not found"),
            Self::NotAChild { parent, node } => {
                write!(f, "node {node} is not a child of {parent}")
            }
            Self::WouldCycle { ancestor, node } => {
                write!(f, "inserting {ancestor} under {node} would create a cycle")
            }
            Self::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CommandError {}

/// An atomic, invertible unit of document change.
pub trait UndoableCommand: Send + Sync {
    /// Display name, e.g. `Node inserted: (rect "r1")`.
    fn name(&self) -> &str;

    /// Perform the forward mutation. No-op for capture commands, whose
    /// mutation already happened when they were built.
    fn execute(&mut self) -> CommandResult;

    /// Restore the exact prior state.
    fn undo(&mut self) -> CommandResult;

    /// Re-apply the forward change. For capture commands this performs the
    /// real mutation even though `execute()` did not.
    fn redo(&mut self) -> CommandResult;

    /// Precondition check. Returns false when required node references are
    /// stale or missing; such a command is silently dropped, not pushed to
    /// history.
    fn should_execute(&self) -> bool {
        true
    }

    /// Concrete type name for debug output.
    fn debug_name(&self) -> &'static str {
        "UndoableCommand"
    }
}

impl fmt::Debug for dyn UndoableCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.debug_name())
            .field("name", &self.name())
            .finish()
    }
}

/// An ordered, named aggregate of commands, undone/redone as one
/// transaction.
///
/// `undo()` applies children's undo in reverse insertion order;
/// `execute()`/`redo()` apply them in forward order. A compound with zero
/// children is never pushed onto the history.
pub struct CompoundCommand {
    name: String,
    children: Vec<Box<dyn UndoableCommand>>,
}

impl CompoundCommand {
    /// Create an empty compound with the given display name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Append a child command. Commands whose `should_execute()` is false
    /// are dropped.
    pub fn add_command(&mut self, command: Box<dyn UndoableCommand>) {
        if !command.should_execute() {
            tracing::debug!(command = command.name(), "dropping invalid child command");
            return;
        }
        self.children.push(command);
    }

    /// Number of children.
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.children.len()
    }

    /// Whether the compound has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl fmt::Debug for CompoundCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompoundCommand")
            .field("name", &self.name)
            .field("command_count", &self.children.len())
            .finish()
    }
}

impl UndoableCommand for CompoundCommand {
    fn name(&self) -> &str {
        &self.name
    }

    // Children run to completion or first error; there is no partial
    // rollback, the error propagates to the caller.
    fn execute(&mut self) -> CommandResult {
        for child in &mut self.children {
            child.execute()?;
        }
        Ok(())
    }

    fn undo(&mut self) -> CommandResult {
        for child in self.children.iter_mut().rev() {
            child.undo()?;
        }
        Ok(())
    }

    fn redo(&mut self) -> CommandResult {
        for child in &mut self.children {
            child.redo()?;
        }
        Ok(())
    }

    fn should_execute(&self) -> bool {
        !self.children.is_empty()
    }

    fn debug_name(&self) -> &'static str {
        "CompoundCommand"
    }
}

// ============================================================================
// Capture commands (execute is a no-op; the mutation already happened)
// ============================================================================

/// Inverts/replays an observed node insertion.
pub struct NodeInsertedCommand {
    name: String,
    doc: DocumentHandle,
    parent: NodeId,
    next_sibling: Option<NodeId>,
    node: NodeId,
}

impl NodeInsertedCommand {
    pub fn new(
        name: impl Into<String>,
        doc: DocumentHandle,
        parent: NodeId,
        next_sibling: Option<NodeId>,
        node: NodeId,
    ) -> Self {
        Self {
            name: name.into(),
            doc,
            parent,
            next_sibling,
            node,
        }
    }
}

impl UndoableCommand for NodeInsertedCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self) -> CommandResult {
        Ok(())
    }

    fn undo(&mut self) -> CommandResult {
        self.doc.remove_node(self.parent, self.node)
    }

    fn redo(&mut self) -> CommandResult {
        self.doc
            .insert_before(self.parent, self.node, self.next_sibling)
    }

    fn should_execute(&self) -> bool {
        self.doc.contains(self.parent) && self.doc.contains(self.node)
    }

    fn debug_name(&self) -> &'static str {
        "NodeInsertedCommand"
    }
}

/// Inverts/replays an observed node removal.
pub struct NodeRemovedCommand {
    name: String,
    doc: DocumentHandle,
    old_parent: NodeId,
    old_next_sibling: Option<NodeId>,
    node: NodeId,
}

impl NodeRemovedCommand {
    pub fn new(
        name: impl Into<String>,
        doc: DocumentHandle,
        old_parent: NodeId,
        old_next_sibling: Option<NodeId>,
        node: NodeId,
    ) -> Self {
        Self {
            name: name.into(),
            doc,
            old_parent,
            old_next_sibling,
            node,
        }
    }
}

impl UndoableCommand for NodeRemovedCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self) -> CommandResult {
        Ok(())
    }

    fn undo(&mut self) -> CommandResult {
        self.doc
            .insert_before(self.old_parent, self.node, self.old_next_sibling)
    }

    fn redo(&mut self) -> CommandResult {
        self.doc.remove_node(self.old_parent, self.node)
    }

    fn should_execute(&self) -> bool {
        self.doc.contains(self.old_parent) && self.doc.contains(self.node)
    }

    fn debug_name(&self) -> &'static str {
        "NodeRemovedCommand"
    }
}

/// Inverts/replays an observed attribute addition.
pub struct AttributeAddedCommand {
    name: String,
    doc: DocumentHandle,
    element: NodeId,
    attribute: String,
    namespace: Option<String>,
    new_value: String,
}

impl AttributeAddedCommand {
    pub fn new(
        name: impl Into<String>,
        doc: DocumentHandle,
        element: NodeId,
        attribute: impl Into<String>,
        namespace: Option<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            doc,
            element,
            attribute: attribute.into(),
            namespace,
            new_value: new_value.into(),
        }
    }
}

impl UndoableCommand for AttributeAddedCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self) -> CommandResult {
        Ok(())
    }

    fn undo(&mut self) -> CommandResult {
        self.doc
            .remove_attribute(self.element, self.namespace.as_deref(), &self.attribute)
    }

    fn redo(&mut self) -> CommandResult {
        self.doc.set_attribute(
            self.element,
            self.namespace.as_deref(),
            &self.attribute,
            &self.new_value,
        )
    }

    fn should_execute(&self) -> bool {
        self.doc.contains(self.element) && !self.attribute.is_empty()
    }

    fn debug_name(&self) -> &'static str {
        "AttributeAddedCommand"
    }
}

/// Inverts/replays an observed attribute removal.
pub struct AttributeRemovedCommand {
    name: String,
    doc: DocumentHandle,
    element: NodeId,
    attribute: String,
    namespace: Option<String>,
    prev_value: String,
}

impl AttributeRemovedCommand {
    pub fn new(
        name: impl Into<String>,
        doc: DocumentHandle,
        element: NodeId,
        attribute: impl Into<String>,
        namespace: Option<String>,
        prev_value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            doc,
            element,
            attribute: attribute.into(),
            namespace,
            prev_value: prev_value.into(),
        }
    }
}

impl UndoableCommand for AttributeRemovedCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self) -> CommandResult {
        Ok(())
    }

    fn undo(&mut self) -> CommandResult {
        self.doc.set_attribute(
            self.element,
            self.namespace.as_deref(),
            &self.attribute,
            &self.prev_value,
        )
    }

    fn redo(&mut self) -> CommandResult {
        self.doc
            .remove_attribute(self.element, self.namespace.as_deref(), &self.attribute)
    }

    fn should_execute(&self) -> bool {
        self.doc.contains(self.element) && !self.attribute.is_empty()
    }

    fn debug_name(&self) -> &'static str {
        "AttributeRemovedCommand"
    }
}

/// Inverts/replays an observed attribute value change.
pub struct AttributeModifiedCommand {
    name: String,
    doc: DocumentHandle,
    element: NodeId,
    attribute: String,
    namespace: Option<String>,
    prev_value: String,
    new_value: String,
}

impl AttributeModifiedCommand {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        doc: DocumentHandle,
        element: NodeId,
        attribute: impl Into<String>,
        namespace: Option<String>,
        prev_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            doc,
            element,
            attribute: attribute.into(),
            namespace,
            prev_value: prev_value.into(),
            new_value: new_value.into(),
        }
    }
}

impl UndoableCommand for AttributeModifiedCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self) -> CommandResult {
        Ok(())
    }

    fn undo(&mut self) -> CommandResult {
        self.doc.set_attribute(
            self.element,
            self.namespace.as_deref(),
            &self.attribute,
            &self.prev_value,
        )
    }

    fn redo(&mut self) -> CommandResult {
        self.doc.set_attribute(
            self.element,
            self.namespace.as_deref(),
            &self.attribute,
            &self.new_value,
        )
    }

    fn should_execute(&self) -> bool {
        self.doc.contains(self.element) && !self.attribute.is_empty()
    }

    fn debug_name(&self) -> &'static str {
        "AttributeModifiedCommand"
    }
}

/// Inverts/replays an observed text-content change.
pub struct TextChangedCommand {
    name: String,
    doc: DocumentHandle,
    node: NodeId,
    prev_value: String,
    new_value: String,
}

impl TextChangedCommand {
    pub fn new(
        name: impl Into<String>,
        doc: DocumentHandle,
        node: NodeId,
        prev_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            doc,
            node,
            prev_value: prev_value.into(),
            new_value: new_value.into(),
        }
    }
}

impl UndoableCommand for TextChangedCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self) -> CommandResult {
        Ok(())
    }

    fn undo(&mut self) -> CommandResult {
        self.doc.set_text(self.node, &self.prev_value)
    }

    fn redo(&mut self) -> CommandResult {
        self.doc.set_text(self.node, &self.new_value)
    }

    fn should_execute(&self) -> bool {
        self.doc.contains(self.node)
    }

    fn debug_name(&self) -> &'static str {
        "TextChangedCommand"
    }
}

// ============================================================================
// Execute-now commands (execute performs the real mutation)
// ============================================================================

/// Appends a node as the last child of a parent. Captures the node's prior
/// position at construction so undo can restore a move.
pub struct AppendChildCommand {
    name: String,
    doc: DocumentHandle,
    old_parent: Option<NodeId>,
    old_next_sibling: Option<NodeId>,
    parent: NodeId,
    child: NodeId,
}

impl AppendChildCommand {
    pub fn new(name: impl Into<String>, doc: DocumentHandle, parent: NodeId, child: NodeId) -> Self {
        let old_parent = doc.parent(child);
        let old_next_sibling = doc.next_sibling(child);
        Self {
            name: name.into(),
            doc,
            old_parent,
            old_next_sibling,
            parent,
            child,
        }
    }
}

impl UndoableCommand for AppendChildCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self) -> CommandResult {
        self.doc.insert_before(self.parent, self.child, None)
    }

    fn undo(&mut self) -> CommandResult {
        match self.old_parent {
            Some(old_parent) => {
                self.doc
                    .insert_before(old_parent, self.child, self.old_next_sibling)
            }
            None => self.doc.remove_node(self.parent, self.child),
        }
    }

    fn redo(&mut self) -> CommandResult {
        self.execute()
    }

    fn should_execute(&self) -> bool {
        self.doc.contains(self.parent) && self.doc.contains(self.child)
    }

    fn debug_name(&self) -> &'static str {
        "AppendChildCommand"
    }
}

/// Inserts a node before a sibling (or appends when the sibling is `None`).
/// Captures the node's prior position at construction so undo can restore a
/// move.
pub struct InsertNodeBeforeCommand {
    name: String,
    doc: DocumentHandle,
    old_parent: Option<NodeId>,
    old_next_sibling: Option<NodeId>,
    new_next_sibling: Option<NodeId>,
    parent: NodeId,
    child: NodeId,
}

impl InsertNodeBeforeCommand {
    pub fn new(
        name: impl Into<String>,
        doc: DocumentHandle,
        parent: NodeId,
        sibling: Option<NodeId>,
        child: NodeId,
    ) -> Self {
        let old_parent = doc.parent(child);
        let old_next_sibling = doc.next_sibling(child);
        Self {
            name: name.into(),
            doc,
            old_parent,
            old_next_sibling,
            new_next_sibling: sibling,
            parent,
            child,
        }
    }
}

impl UndoableCommand for InsertNodeBeforeCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self) -> CommandResult {
        self.doc
            .insert_before(self.parent, self.child, self.new_next_sibling)
    }

    fn undo(&mut self) -> CommandResult {
        match self.old_parent {
            Some(old_parent) => {
                self.doc
                    .insert_before(old_parent, self.child, self.old_next_sibling)
            }
            None => self.doc.remove_node(self.parent, self.child),
        }
    }

    fn redo(&mut self) -> CommandResult {
        self.execute()
    }

    fn should_execute(&self) -> bool {
        self.doc.contains(self.parent) && self.doc.contains(self.child)
    }

    fn debug_name(&self) -> &'static str {
        "InsertNodeBeforeCommand"
    }
}

/// Removes a child from its parent. The child's position is captured when
/// the removal first runs, so undo re-inserts at the exact prior spot.
pub struct RemoveChildCommand {
    name: String,
    doc: DocumentHandle,
    parent: NodeId,
    child: NodeId,
    restore_sibling: Option<NodeId>,
}

impl RemoveChildCommand {
    pub fn new(name: impl Into<String>, doc: DocumentHandle, parent: NodeId, child: NodeId) -> Self {
        Self {
            name: name.into(),
            doc,
            parent,
            child,
            restore_sibling: None,
        }
    }
}

impl UndoableCommand for RemoveChildCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self) -> CommandResult {
        self.restore_sibling = self.doc.next_sibling(self.child);
        self.doc.remove_node(self.parent, self.child)
    }

    fn undo(&mut self) -> CommandResult {
        self.doc
            .insert_before(self.parent, self.child, self.restore_sibling)
    }

    fn redo(&mut self) -> CommandResult {
        self.doc.remove_node(self.parent, self.child)
    }

    fn should_execute(&self) -> bool {
        self.doc.contains(self.parent) && self.doc.contains(self.child)
    }

    fn debug_name(&self) -> &'static str {
        "RemoveChildCommand"
    }
}

/// Sets a node's text content. The prior value is captured at construction.
pub struct SetTextCommand {
    name: String,
    doc: DocumentHandle,
    node: NodeId,
    old_value: String,
    new_value: String,
}

impl SetTextCommand {
    pub fn new(
        name: impl Into<String>,
        doc: DocumentHandle,
        node: NodeId,
        new_value: impl Into<String>,
    ) -> Self {
        let old_value = doc.text(node).unwrap_or_default();
        Self {
            name: name.into(),
            doc,
            node,
            old_value,
            new_value: new_value.into(),
        }
    }
}

impl UndoableCommand for SetTextCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self) -> CommandResult {
        self.doc.set_text(self.node, &self.new_value)
    }

    fn undo(&mut self) -> CommandResult {
        self.doc.set_text(self.node, &self.old_value)
    }

    fn redo(&mut self) -> CommandResult {
        self.execute()
    }

    fn should_execute(&self) -> bool {
        self.doc.contains(self.node)
    }

    fn debug_name(&self) -> &'static str {
        "SetTextCommand"
    }
}

// ============================================================================
// Tests
// ============================================================================
