#![forbid(unsafe_code)]

//! Execution phase tracking and pluggable command dispatch.
//!
//! The history is a state machine over [`HistoryState`]: `Idle` between
//! operations, `Executing`/`Undoing`/`Redoing` around each dispatched call.
//! The phase is the recorder's capture gate — a mutation notification that
//! arrives while the phase is not `Idle` is the echo of a command being
//! replayed and must not be re-captured.
//!
//! Dispatch itself is a strategy: with no [`CommandController`] installed
//! the history runs commands inline and tracks the phase itself; with one
//! installed, the controller both runs the command (inline, or marshalled
//! onto whatever single serializing context the host owns) and becomes the
//! authority on the phase.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::command::{CommandResult, UndoableCommand};

/// Execution phase of the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum HistoryState {
    /// No command is being executed, undone or redone.
    #[default]
    Idle = 0,
    /// A command's `execute()` is in flight.
    Executing = 1,
    /// A command's `undo()` is in flight.
    Undoing = 2,
    /// A command's `redo()` is in flight.
    Redoing = 3,
}

impl HistoryState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Executing,
            2 => Self::Undoing,
            3 => Self::Redoing,
            _ => Self::Idle,
        }
    }
}

/// Shared, atomically updated execution phase.
///
/// Cloneable so an observer (the recorder, or a controller running on
/// another thread) can read the phase while the history is mid-dispatch.
#[derive(Debug, Clone, Default)]
pub struct PhaseFlag(Arc<AtomicU8>);

impl PhaseFlag {
    /// Create a new flag in the `Idle` phase.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the current phase.
    #[must_use]
    pub fn get(&self) -> HistoryState {
        HistoryState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Set the current phase.
    pub fn set(&self, state: HistoryState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

/// Wraps how a command's execute, undo and redo methods are invoked.
///
/// The installed controller is the authority on the execution phase: while
/// a dispatch is in flight its [`state`](Self::state) must report the
/// matching non-idle phase, and `Idle` otherwise.
pub trait CommandController: Send + Sync {
    /// Run the command's `execute()` with phase `Executing`.
    fn execute(&self, command: &mut dyn UndoableCommand) -> CommandResult;

    /// Run the command's `undo()` with phase `Undoing`.
    fn undo(&self, command: &mut dyn UndoableCommand) -> CommandResult;

    /// Run the command's `redo()` with phase `Redoing`.
    fn redo(&self, command: &mut dyn UndoableCommand) -> CommandResult;

    /// Current phase as seen by this controller.
    fn state(&self) -> HistoryState;
}

/// Controller that runs commands inline on the calling thread.
///
/// The non-GUI rendition of a UI-thread-marshalling controller: the
/// "serializing execution context" is simply the caller. Hosts that own a
/// real update queue implement [`CommandController`] themselves.
#[derive(Debug, Default)]
pub struct InlineController {
    phase: PhaseFlag,
}

impl InlineController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A cloneable view of this controller's phase.
    #[must_use]
    pub fn phase_flag(&self) -> PhaseFlag {
        self.phase.clone()
    }

    fn run(
        &self,
        phase: HistoryState,
        command: &mut dyn UndoableCommand,
        op: fn(&mut dyn UndoableCommand) -> CommandResult,
    ) -> CommandResult {
        tracing::debug!(command = command.name(), ?phase, "dispatching");
        self.phase.set(phase);
        let result = op(command);
        // Phase returns to idle even when the mutation failed; the error
        // still propagates to the caller.
        self.phase.set(HistoryState::Idle);
        result
    }
}

impl CommandController for InlineController {
    fn execute(&self, command: &mut dyn UndoableCommand) -> CommandResult {
        self.run(HistoryState::Executing, command, |c| c.execute())
    }

    fn undo(&self, command: &mut dyn UndoableCommand) -> CommandResult {
        self.run(HistoryState::Undoing, command, |c| c.undo())
    }

    fn redo(&self, command: &mut dyn UndoableCommand) -> CommandResult {
        self.run(HistoryState::Redoing, command, |c| c.redo())
    }

    fn state(&self) -> HistoryState {
        self.phase.get()
    }
}
