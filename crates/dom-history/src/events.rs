#![forbid(unsafe_code)]

//! History notification channel.
//!
//! A closed set of event variants dispatched to registered listeners by
//! direct iteration. Listeners run synchronously, on the thread that
//! performed the dispatch, after the mutation completes; they must not call
//! back into the history synchronously.

/// Names surrounding a performed operation: the command just run plus what
/// the next undo/redo would act on (if anything).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandNames {
    /// The command that was executed, undone or redone.
    pub command: String,
    /// Name of the next undoable command, if any.
    pub next_undo: Option<String>,
    /// Name of the next redoable command, if any.
    pub next_redo: Option<String>,
}

/// Event emitted by the history to its listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEvent {
    /// A command was executed and appended.
    ExecutePerformed(CommandNames),
    /// A command was undone.
    UndoPerformed(CommandNames),
    /// A command was redone.
    RedoPerformed(CommandNames),
    /// All entries were cleared.
    HistoryReset,
    /// A pending compound transaction was opened.
    CompoundEditStarted {
        /// Display name of the compound.
        name: String,
    },
    /// A pending compound transaction was flushed into the history.
    CompoundEditPerformed {
        /// Display name of the compound.
        name: String,
        /// Number of atomic commands it groups.
        command_count: usize,
    },
}

/// Observer of history events.
pub trait HistoryListener: Send {
    fn on_event(&mut self, event: &HistoryEvent);
}

impl<F> HistoryListener for F
where
    F: FnMut(&HistoryEvent) + Send,
{
    fn on_event(&mut self, event: &HistoryEvent) {
        self(event)
    }
}
