#![forbid(unsafe_code)]

//! DOM History
//!
//! Undo/redo engine for an externally owned tree document. The engine never
//! owns the tree it edits: commands hold [`NodeId`]s plus a shared
//! [`DocumentHandle`] and invert or replay mutations through the
//! [`TreeDocument`] trait.
//!
//! # Key Components
//!
//! - [`UndoableCommand`] - Atomic, invertible unit of document change
//! - [`CompoundCommand`] - Named transaction undone/redone as one unit
//! - [`History`] - Bounded, branch-truncating command log with a cursor
//! - [`CommandController`] - Pluggable dispatch strategy and phase authority
//! - [`ChangeRecorder`] - Phase-gated capture of external mutation
//!   notifications into compound transactions
//! - [`HistoryListener`] - Observer of executed/undone/redone operations
//! - [`MemDocument`] - Arena-backed in-memory [`TreeDocument`]
//!
//! # How it fits together
//! The recorder is the usual entry point: hosts forward every [`Mutation`]
//! their document reports to [`ChangeRecorder::record`], which drops replay
//! echoes (any notification arriving while the history is not `Idle`) and
//! groups the rest into the current compound transaction. Undo and redo go
//! through the recorder's [`History`], which dispatches each command inline
//! or through an installed controller.

pub mod command;
pub mod controller;
pub mod document;
pub mod events;
pub mod history;
pub mod memdoc;
pub mod recorder;

pub use command::{
    AppendChildCommand, AttributeAddedCommand, AttributeModifiedCommand, AttributeRemovedCommand,
    CommandError, CommandResult, CompoundCommand, InsertNodeBeforeCommand, NodeInsertedCommand,
    NodeRemovedCommand, RemoveChildCommand, SetTextCommand, TextChangedCommand, UndoableCommand,
};
pub use controller::{CommandController, HistoryState, InlineController, PhaseFlag};
pub use document::{AttributeChange, DocumentHandle, Mutation, NodeId, TreeDocument};
pub use events::{CommandNames, HistoryEvent, HistoryListener};
pub use history::{History, HistoryConfig, StateProbe};
pub use memdoc::MemDocument;
pub use recorder::{ChangeRecorder, NODES_REMOVED, NODE_MOVED, OUTER_EDIT};
