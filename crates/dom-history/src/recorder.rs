#![forbid(unsafe_code)]

//! Capture of external document mutations into the history.
//!
//! The recorder sits between a document and a [`History`]. Hosts forward
//! every [`Mutation`] notification the document emits to
//! [`record`](ChangeRecorder::record); the recorder turns each into the
//! matching capture command and groups it into the current compound
//! transaction. Notifications that arrive while the history is replaying a
//! command are its own echo and are dropped.
//!
//! Compound grouping follows the transaction boundaries the host declares
//! with [`begin_compound`](ChangeRecorder::begin_compound) /
//! [`end_compound`](ChangeRecorder::end_compound). Mutations recorded with
//! no transaction open fall into a lazily created catch-all compound named
//! [`OUTER_EDIT`], flushed by [`commit_pending`](ChangeRecorder::commit_pending).

use crate::command::{
    AppendChildCommand, AttributeAddedCommand, AttributeModifiedCommand, AttributeRemovedCommand,
    CommandResult, CompoundCommand, InsertNodeBeforeCommand, NodeInsertedCommand,
    NodeRemovedCommand, RemoveChildCommand, SetTextCommand, TextChangedCommand, UndoableCommand,
};
use crate::controller::HistoryState;
use crate::document::{AttributeChange, DocumentHandle, Mutation, NodeId};
use crate::events::HistoryEvent;
use crate::history::History;

/// Name of the catch-all compound for mutations recorded outside any
/// explicit transaction.
pub const OUTER_EDIT: &str = "Document changed outside editor";

/// Compound name for a drag-and-drop style node move.
pub const NODE_MOVED: &str = "Node moved";

/// Compound name for a multi-node removal.
pub const NODES_REMOVED: &str = "Nodes removed";

const NODE_INSERTED_PREFIX: &str = "Node inserted: ";
const NODE_REMOVED_PREFIX: &str = "Node removed: ";
const ATTRIBUTE_ADDED_PREFIX: &str = "Attribute added: ";
const ATTRIBUTE_REMOVED_PREFIX: &str = "Attribute removed: ";
const ATTRIBUTE_MODIFIED_PREFIX: &str = "Attribute modified: ";
const NODE_VALUE_CHANGED_PREFIX: &str = "Node value changed: ";

/// Phase-gated bridge from document mutation notifications to the history.
pub struct ChangeRecorder {
    history: History,
    document: DocumentHandle,
    current_compound: Option<CompoundCommand>,
}

impl ChangeRecorder {
    /// Create a recorder over the given document with a default history.
    #[must_use]
    pub fn new(document: DocumentHandle) -> Self {
        Self::with_history(document, History::default())
    }

    /// Create a recorder over the given document and history.
    #[must_use]
    pub fn with_history(document: DocumentHandle, history: History) -> Self {
        Self {
            history,
            document,
            current_compound: None,
        }
    }

    /// The underlying history.
    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Mutable access to the underlying history (undo, redo, listeners,
    /// controller installation).
    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    /// The document this recorder captures for.
    #[must_use]
    pub fn document(&self) -> &DocumentHandle {
        &self.document
    }

    // ------------------------------------------------------------------
    // Capture
    // ------------------------------------------------------------------

    /// Record an external mutation notification.
    ///
    /// Captured only while the history is `Idle`; a notification arriving
    /// during execute/undo/redo is the echo of a replayed command and is
    /// dropped. Captured mutations join the current compound transaction
    /// (lazily opened as [`OUTER_EDIT`] when none is active).
    pub fn record(&mut self, mutation: &Mutation) {
        let state = self.history.state();
        if state != HistoryState::Idle {
            tracing::trace!(?state, ?mutation, "ignoring replay echo");
            return;
        }
        let command = self.command_for_mutation(mutation);
        self.add_to_current_compound(command);
    }

    /// Open an explicit compound transaction. Any pending catch-all
    /// compound is flushed first.
    pub fn begin_compound(&mut self, name: impl Into<String>) -> CommandResult {
        self.commit_pending()?;
        let name = name.into();
        tracing::debug!(compound = %name, "compound edit started");
        self.history.emit(HistoryEvent::CompoundEditStarted { name: name.clone() });
        self.current_compound = Some(CompoundCommand::new(name));
        Ok(())
    }

    /// Close the current compound transaction, pushing it to the history.
    /// A transaction that captured nothing is discarded.
    pub fn end_compound(&mut self) -> CommandResult {
        self.commit_pending()
    }

    /// Flush the pending compound (explicit or catch-all) into the history.
    /// No-op when nothing was captured.
    pub fn commit_pending(&mut self) -> CommandResult {
        let Some(compound) = self.current_compound.take() else {
            return Ok(());
        };
        if compound.is_empty() {
            tracing::debug!(compound = compound.name(), "discarding empty compound");
            return Ok(());
        }
        let name = compound.name().to_string();
        let command_count = compound.command_count();
        self.history.add_command(Box::new(compound))?;
        self.history.emit(HistoryEvent::CompoundEditPerformed {
            name,
            command_count,
        });
        Ok(())
    }

    /// Number of commands captured in the open transaction.
    #[must_use]
    pub fn pending_command_count(&self) -> usize {
        self.current_compound
            .as_ref()
            .map_or(0, CompoundCommand::command_count)
    }

    fn add_to_current_compound(&mut self, command: Box<dyn UndoableCommand>) {
        if self.current_compound.is_none() {
            tracing::debug!(compound = OUTER_EDIT, "compound edit started");
            self.history.emit(HistoryEvent::CompoundEditStarted {
                name: OUTER_EDIT.to_string(),
            });
            self.current_compound = Some(CompoundCommand::new(OUTER_EDIT));
        }
        if let Some(compound) = self.current_compound.as_mut() {
            compound.add_command(command);
        }
    }

    /// Build the capture command matching a mutation notification.
    #[must_use]
    pub fn command_for_mutation(&self, mutation: &Mutation) -> Box<dyn UndoableCommand> {
        match mutation {
            Mutation::NodeInserted {
                parent,
                next_sibling,
                node,
            } => Box::new(self.create_node_inserted_command(*parent, *next_sibling, *node)),
            Mutation::NodeRemoved {
                old_parent,
                old_next_sibling,
                node,
                related,
            } => {
                let parent = related.unwrap_or(*old_parent);
                Box::new(self.create_node_removed_command(parent, *old_next_sibling, *node))
            }
            Mutation::AttributeChanged {
                element,
                name,
                namespace,
                change,
                prev_value,
                new_value,
            } => match change {
                AttributeChange::Added => Box::new(self.create_attribute_added_command(
                    *element,
                    name,
                    namespace.clone(),
                    new_value.clone().unwrap_or_default(),
                )),
                AttributeChange::Removed => Box::new(self.create_attribute_removed_command(
                    *element,
                    name,
                    namespace.clone(),
                    prev_value.clone().unwrap_or_default(),
                )),
                AttributeChange::Modified => Box::new(self.create_attribute_modified_command(
                    *element,
                    name,
                    namespace.clone(),
                    prev_value.clone().unwrap_or_default(),
                    new_value.clone().unwrap_or_default(),
                )),
            },
            Mutation::TextChanged {
                node,
                prev_value,
                new_value,
            } => Box::new(self.create_text_changed_command(*node, prev_value, new_value)),
        }
    }

    // ------------------------------------------------------------------
    // Capture-command factories
    // ------------------------------------------------------------------

    #[must_use]
    pub fn create_node_inserted_command(
        &self,
        parent: NodeId,
        next_sibling: Option<NodeId>,
        node: NodeId,
    ) -> NodeInsertedCommand {
        NodeInsertedCommand::new(
            format!("{NODE_INSERTED_PREFIX}{}", self.bracketed(node)),
            self.document.clone(),
            parent,
            next_sibling,
            node,
        )
    }

    #[must_use]
    pub fn create_node_removed_command(
        &self,
        old_parent: NodeId,
        old_next_sibling: Option<NodeId>,
        node: NodeId,
    ) -> NodeRemovedCommand {
        NodeRemovedCommand::new(
            format!("{NODE_REMOVED_PREFIX}{}", self.bracketed(node)),
            self.document.clone(),
            old_parent,
            old_next_sibling,
            node,
        )
    }

    #[must_use]
    pub fn create_attribute_added_command(
        &self,
        element: NodeId,
        attribute: &str,
        namespace: Option<String>,
        new_value: String,
    ) -> AttributeAddedCommand {
        AttributeAddedCommand::new(
            format!("{ATTRIBUTE_ADDED_PREFIX}{}", self.bracketed(element)),
            self.document.clone(),
            element,
            attribute,
            namespace,
            new_value,
        )
    }

    #[must_use]
    pub fn create_attribute_removed_command(
        &self,
        element: NodeId,
        attribute: &str,
        namespace: Option<String>,
        prev_value: String,
    ) -> AttributeRemovedCommand {
        AttributeRemovedCommand::new(
            format!("{ATTRIBUTE_REMOVED_PREFIX}{}", self.bracketed(element)),
            self.document.clone(),
            element,
            attribute,
            namespace,
            prev_value,
        )
    }

    #[must_use]
    pub fn create_attribute_modified_command(
        &self,
        element: NodeId,
        attribute: &str,
        namespace: Option<String>,
        prev_value: String,
        new_value: String,
    ) -> AttributeModifiedCommand {
        AttributeModifiedCommand::new(
            format!("{ATTRIBUTE_MODIFIED_PREFIX}{}", self.bracketed(element)),
            self.document.clone(),
            element,
            attribute,
            namespace,
            prev_value,
            new_value,
        )
    }

    #[must_use]
    pub fn create_text_changed_command(
        &self,
        node: NodeId,
        prev_value: &str,
        new_value: &str,
    ) -> TextChangedCommand {
        TextChangedCommand::new(
            format!("{NODE_VALUE_CHANGED_PREFIX}{}", self.bracketed(node)),
            self.document.clone(),
            node,
            prev_value,
            new_value,
        )
    }

    // ------------------------------------------------------------------
    // Execute-now editing operations
    // ------------------------------------------------------------------

    /// Append `child` as the last child of `parent`, recorded as an
    /// undoable history entry.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> CommandResult {
        let name = format!(
            "Append {} to {}",
            self.document.node_label(child),
            self.document.node_label(parent)
        );
        let command = AppendChildCommand::new(name, self.document.clone(), parent, child);
        self.history.add_command(Box::new(command))
    }

    /// Insert `child` under `parent` before `sibling` (append when `None`),
    /// recorded as an undoable history entry.
    pub fn insert_child_before(
        &mut self,
        parent: NodeId,
        sibling: Option<NodeId>,
        child: NodeId,
    ) -> CommandResult {
        let name = match sibling {
            Some(sibling) => format!(
                "Insert {} to {} before {}",
                self.document.node_label(child),
                self.document.node_label(parent),
                self.document.node_label(sibling)
            ),
            None => format!(
                "Insert {} to {}",
                self.document.node_label(child),
                self.document.node_label(parent)
            ),
        };
        let command =
            InsertNodeBeforeCommand::new(name, self.document.clone(), parent, sibling, child);
        self.history.add_command(Box::new(command))
    }

    /// Remove `child` from `parent`, recorded as an undoable history entry.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> CommandResult {
        let name = format!(
            "Remove {} from {}",
            self.document.node_label(child),
            self.document.node_label(parent)
        );
        let command = RemoveChildCommand::new(name, self.document.clone(), parent, child);
        self.history.add_command(Box::new(command))
    }

    /// Set the text content of `node`, recorded as an undoable history
    /// entry.
    pub fn set_text(&mut self, node: NodeId, value: &str) -> CommandResult {
        let name = format!(
            "Change {} value to {value}",
            self.document.node_label(node)
        );
        let command = SetTextCommand::new(name, self.document.clone(), node, value);
        self.history.add_command(Box::new(command))
    }

    /// Display name for a compound that edits a single node,
    /// e.g. `Node rect "r1" changed`. Pair with
    /// [`begin_compound`](Self::begin_compound).
    #[must_use]
    pub fn node_changed_name(&self, node: NodeId) -> String {
        format!("Node {} changed", self.document.node_label(node))
    }

    fn bracketed(&self, node: NodeId) -> String {
        format!("({})", self.document.node_label(node))
    }
}

impl std::fmt::Debug for ChangeRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeRecorder")
            .field("history", &self.history)
            .field("pending", &self.pending_command_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
