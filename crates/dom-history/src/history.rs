#![forbid(unsafe_code)]

//! Bounded command history with cursor and execution-phase state machine.
//!
//! The history is an ordered log of commands with a current-position cursor.
//! Entries past the cursor are the redo branch; they are discarded the next
//! time a command is added. When the log outgrows its capacity the oldest
//! entry is evicted and the cursor shifts down with it.
//!
//! ```text
//! add(c4) after undo() x2
//! ┌──────────────────────────────────────────────┐
//! │ entries: [c1, c2, c3]     cursor: 0          │
//! │                 └──┴─ redo branch            │
//! │ entries: [c1, c4]         cursor: 1          │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Invariants
//!
//! - `cursor < entries.len()` whenever it is set.
//! - `entries.len() <= capacity` after every operation.
//! - Phase transitions are `Idle → {Executing, Undoing, Redoing} → Idle`
//!   around each dispatched call; commands must not reenter the history
//!   synchronously.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::command::{CommandResult, UndoableCommand};
use crate::controller::{CommandController, HistoryState, PhaseFlag};
use crate::events::{CommandNames, HistoryEvent, HistoryListener};

type ControllerSlot = Arc<RwLock<Option<Arc<dyn CommandController>>>>;

/// Configuration for the history.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Maximum number of entries to keep. Once exceeded, the oldest entry
    /// is evicted.
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}

impl HistoryConfig {
    /// Create a configuration with the given capacity. A zero capacity
    /// would evict every entry as it arrives, so it is clamped to 1.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
        }
    }

    /// Create an unbounded configuration (for testing).
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            capacity: usize::MAX,
        }
    }
}

/// Read-only view of the effective execution phase.
///
/// Cloneable and readable while the history itself is mid-dispatch, which
/// is exactly when a synchronously notified observer needs it. Reports the
/// installed controller's phase when one is present, the history's own
/// otherwise.
#[derive(Clone)]
pub struct StateProbe {
    phase: PhaseFlag,
    controller: ControllerSlot,
}

impl StateProbe {
    /// The effective execution phase.
    #[must_use]
    pub fn state(&self) -> HistoryState {
        let slot = self
            .controller
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(controller) => controller.state(),
            None => self.phase.get(),
        }
    }
}

impl fmt::Debug for StateProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateProbe")
            .field("state", &self.state())
            .finish()
    }
}

/// Bounded, branch-truncating command history.
pub struct History {
    entries: Vec<Box<dyn UndoableCommand>>,
    /// Index of the most recently applied command; `None` means "before
    /// the first entry".
    cursor: Option<usize>,
    config: HistoryConfig,
    phase: PhaseFlag,
    controller: ControllerSlot,
    listeners: Vec<Box<dyn HistoryListener>>,
}

impl fmt::Debug for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("History")
            .field("entries", &self.entries.len())
            .field("cursor", &self.cursor)
            .field("capacity", &self.config.capacity)
            .field("state", &self.state())
            .finish()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl History {
    /// Create an empty history.
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            entries: Vec::new(),
            cursor: None,
            config,
            phase: PhaseFlag::new(),
            controller: Arc::new(RwLock::new(None)),
            listeners: Vec::new(),
        }
    }

    /// Install the execution strategy. The controller becomes the authority
    /// on the execution phase reported by [`state`](Self::state).
    pub fn set_command_controller(&mut self, controller: Arc<dyn CommandController>) {
        *self
            .controller
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(controller);
    }

    /// Register a listener. Registrations survive [`reset_history`]
    /// (Self::reset_history).
    pub fn add_listener<L: HistoryListener + 'static>(&mut self, listener: L) {
        self.listeners.push(Box::new(listener));
    }

    /// Execute the command and append it, discarding any redo branch.
    ///
    /// A command whose `should_execute()` is false is silently dropped.
    /// If the underlying mutation fails, the entry is still recorded (the
    /// document may be partially changed) but no event fires and the error
    /// propagates.
    pub fn add_command(&mut self, mut command: Box<dyn UndoableCommand>) -> CommandResult {
        if !command.should_execute() {
            tracing::debug!(command = command.name(), "dropping invalid command");
            return Ok(());
        }

        let keep = self.cursor.map_or(0, |c| c + 1);
        if keep < self.entries.len() {
            tracing::debug!(
                discarded = self.entries.len() - keep,
                "discarding redo branch"
            );
            self.entries.truncate(keep);
        }

        let result = match self.controller() {
            Some(controller) => controller.execute(command.as_mut()),
            None => {
                self.phase.set(HistoryState::Executing);
                let result = command.execute();
                self.phase.set(HistoryState::Idle);
                result
            }
        };

        let name = command.name().to_string();
        self.entries.push(command);
        self.cursor = Some(self.entries.len() - 1);

        if self.entries.len() > self.config.capacity {
            let evicted = self.entries.remove(0);
            self.cursor = self.cursor.and_then(|c| c.checked_sub(1));
            tracing::debug!(command = evicted.name(), "evicted oldest entry");
        }

        result?;
        tracing::debug!(command = %name, "command added");
        let names = self.command_names(name);
        self.emit(HistoryEvent::ExecutePerformed(names));
        Ok(())
    }

    /// Undo the command at the cursor. No-op (and no event) when there is
    /// nothing to undo.
    pub fn undo(&mut self) -> CommandResult {
        let Some(cursor) = self.cursor else {
            return Ok(());
        };

        let result = match self.controller() {
            Some(controller) => controller.undo(self.entries[cursor].as_mut()),
            None => {
                self.phase.set(HistoryState::Undoing);
                let result = self.entries[cursor].undo();
                self.phase.set(HistoryState::Idle);
                result
            }
        };

        let name = self.entries[cursor].name().to_string();
        self.cursor = cursor.checked_sub(1);

        result?;
        tracing::debug!(command = %name, "undo performed");
        let names = self.command_names(name);
        self.emit(HistoryEvent::UndoPerformed(names));
        Ok(())
    }

    /// Redo the command after the cursor. No-op (and no event) when there
    /// is nothing to redo.
    pub fn redo(&mut self) -> CommandResult {
        let next = match self.cursor {
            Some(c) if c + 1 < self.entries.len() => c + 1,
            None if !self.entries.is_empty() => 0,
            _ => return Ok(()),
        };

        let result = match self.controller() {
            Some(controller) => controller.redo(self.entries[next].as_mut()),
            None => {
                self.phase.set(HistoryState::Redoing);
                let result = self.entries[next].redo();
                self.phase.set(HistoryState::Idle);
                result
            }
        };

        let name = self.entries[next].name().to_string();
        self.cursor = Some(next);

        result?;
        tracing::debug!(command = %name, "redo performed");
        let names = self.command_names(name);
        self.emit(HistoryEvent::RedoPerformed(names));
        Ok(())
    }

    /// Undo up to `count` times, stopping early at the stack boundary.
    pub fn compound_undo(&mut self, count: usize) -> CommandResult {
        for _ in 0..count {
            if !self.can_undo() {
                break;
            }
            self.undo()?;
        }
        Ok(())
    }

    /// Redo up to `count` times, stopping early at the stack boundary.
    pub fn compound_redo(&mut self, count: usize) -> CommandResult {
        for _ in 0..count {
            if !self.can_redo() {
                break;
            }
            self.redo()?;
        }
        Ok(())
    }

    /// Clear all entries and reset the cursor. Listener registrations are
    /// kept.
    pub fn reset_history(&mut self) {
        tracing::debug!(discarded = self.entries.len(), "history reset");
        self.entries.clear();
        self.cursor = None;
        self.emit(HistoryEvent::HistoryReset);
    }

    /// Whether an undo would do anything.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor.is_some()
    }

    /// Whether a redo would do anything.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        match self.cursor {
            Some(c) => c + 1 < self.entries.len(),
            None => !self.entries.is_empty(),
        }
    }

    /// Name of the command an undo would act on.
    #[must_use]
    pub fn last_undoable_command_name(&self) -> Option<&str> {
        self.cursor.map(|c| self.entries[c].name())
    }

    /// Name of the command a redo would act on.
    #[must_use]
    pub fn last_redoable_command_name(&self) -> Option<&str> {
        let next = match self.cursor {
            Some(c) => c + 1,
            None => 0,
        };
        self.entries.get(next).map(|command| command.name())
    }

    /// Effective execution phase: the installed controller's when one is
    /// present, the internally tracked one otherwise.
    #[must_use]
    pub fn state(&self) -> HistoryState {
        match self.controller() {
            Some(controller) => controller.state(),
            None => self.phase.get(),
        }
    }

    /// A cloneable probe reading the same effective phase, usable while
    /// the history is mid-dispatch.
    #[must_use]
    pub fn state_probe(&self) -> StateProbe {
        StateProbe {
            phase: self.phase.clone(),
            controller: Arc::clone(&self.controller),
        }
    }

    /// Number of entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the history holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cursor position, `None` meaning "before the first entry".
    #[must_use]
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Capacity configured for this history.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub(crate) fn emit(&mut self, event: HistoryEvent) {
        tracing::trace!(?event, "emitting history event");
        for listener in &mut self.listeners {
            listener.on_event(&event);
        }
    }

    fn controller(&self) -> Option<Arc<dyn CommandController>> {
        self.controller
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn command_names(&self, command: String) -> CommandNames {
        CommandNames {
            command,
            next_undo: self.last_undoable_command_name().map(str::to_string),
            next_redo: self.last_redoable_command_name().map(str::to_string),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandError;
    use std::sync::{Arc, Mutex};

    struct JournalCommand {
        name: String,
        journal: Arc<Mutex<Vec<String>>>,
        valid: bool,
        fail_execute: bool,
    }

    impl JournalCommand {
        fn new(name: &str, journal: &Arc<Mutex<Vec<String>>>) -> Box<Self> {
            Box::new(Self {
                name: name.to_string(),
                journal: journal.clone(),
                valid: true,
                fail_execute: false,
            })
        }

        fn log(&self, op: &str) {
            self.journal
                .lock()
                .unwrap()
                .push(format!("{}:{}", op, self.name));
        }
    }

    impl UndoableCommand for JournalCommand {
        fn name(&self) -> &str {
            &self.name
        }

        fn execute(&mut self) -> CommandResult {
            if self.fail_execute {
                return Err(CommandError::Other("boom".into()));
            }
            self.log("execute");
            Ok(())
        }

        fn undo(&mut self) -> CommandResult {
            self.log("undo");
            Ok(())
        }

        fn redo(&mut self) -> CommandResult {
            self.log("redo");
            Ok(())
        }

        fn should_execute(&self) -> bool {
            self.valid
        }
    }

    fn collecting_listener(
        history: &mut History,
    ) -> Arc<Mutex<Vec<HistoryEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        history.add_listener(move |event: &HistoryEvent| {
            sink.lock().unwrap().push(event.clone());
        });
        events
    }

    #[test]
    fn undo_redo_roundtrip_restores_cursor() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut history = History::default();

        for name in ["a", "b", "c"] {
            history.add_command(JournalCommand::new(name, &journal)).unwrap();
        }
        assert_eq!(history.cursor(), Some(2));

        for _ in 0..3 {
            history.undo().unwrap();
        }
        assert_eq!(history.cursor(), None);
        assert!(!history.can_undo());

        for _ in 0..3 {
            history.redo().unwrap();
        }
        assert_eq!(history.cursor(), Some(2));

        let log = journal.lock().unwrap();
        assert_eq!(
            *log,
            vec![
                "execute:a",
                "execute:b",
                "execute:c",
                "undo:c",
                "undo:b",
                "undo:a",
                "redo:a",
                "redo:b",
                "redo:c",
            ]
        );
    }

    #[test]
    fn add_after_undo_discards_redo_branch() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut history = History::default();

        history.add_command(JournalCommand::new("a", &journal)).unwrap();
        history.add_command(JournalCommand::new("b", &journal)).unwrap();
        history.undo().unwrap();
        assert_eq!(history.last_redoable_command_name(), Some("b"));

        history.add_command(JournalCommand::new("c", &journal)).unwrap();
        assert_eq!(history.last_redoable_command_name(), None);
        assert_eq!(history.len(), 2);
        assert_eq!(history.last_undoable_command_name(), Some("c"));
    }

    #[test]
    fn capacity_evicts_oldest_and_shifts_cursor() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut history = History::new(HistoryConfig::new(3));

        for name in ["a", "b", "c", "d"] {
            history.add_command(JournalCommand::new(name, &journal)).unwrap();
        }

        assert_eq!(history.len(), 3);
        assert_eq!(history.cursor(), Some(2));

        // "a" is no longer undoable
        history.compound_undo(10).unwrap();
        let log = journal.lock().unwrap();
        let undos: Vec<_> = log.iter().filter(|e| e.starts_with("undo")).collect();
        assert_eq!(undos, vec!["undo:d", "undo:c", "undo:b"]);
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut history = History::new(HistoryConfig::new(0));

        history.add_command(JournalCommand::new("a", &journal)).unwrap();
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.len(), 1);
        assert_eq!(history.last_undoable_command_name(), Some("a"));

        history.add_command(JournalCommand::new("b", &journal)).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.last_undoable_command_name(), Some("b"));
    }

    #[test]
    fn boundary_undo_redo_is_noop_without_events() {
        let mut history = History::default();
        let events = collecting_listener(&mut history);

        history.undo().unwrap();
        history.redo().unwrap();
        assert!(events.lock().unwrap().is_empty());

        let journal = Arc::new(Mutex::new(Vec::new()));
        history.add_command(JournalCommand::new("a", &journal)).unwrap();
        history.redo().unwrap(); // already at the last entry
        let seen = events.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], HistoryEvent::ExecutePerformed(_)));
    }

    #[test]
    fn events_carry_neighbour_names() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut history = History::default();
        let events = collecting_listener(&mut history);

        history.add_command(JournalCommand::new("a", &journal)).unwrap();
        history.add_command(JournalCommand::new("b", &journal)).unwrap();
        history.undo().unwrap();

        let seen = events.lock().unwrap();
        let HistoryEvent::UndoPerformed(names) = &seen[2] else {
            panic!("expected UndoPerformed, got {:?}", seen[2]);
        };
        assert_eq!(names.command, "b");
        assert_eq!(names.next_undo.as_deref(), Some("a"));
        assert_eq!(names.next_redo.as_deref(), Some("b"));
    }

    #[test]
    fn invalid_command_is_dropped_silently() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut history = History::default();
        let events = collecting_listener(&mut history);

        let mut command = JournalCommand::new("stale", &journal);
        command.valid = false;
        history.add_command(command).unwrap();

        assert!(history.is_empty());
        assert!(events.lock().unwrap().is_empty());
        assert!(journal.lock().unwrap().is_empty());
    }

    #[test]
    fn failed_execute_keeps_entry_and_propagates() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut history = History::default();
        let events = collecting_listener(&mut history);

        let mut command = JournalCommand::new("bad", &journal);
        command.fail_execute = true;
        let result = history.add_command(command);

        assert_eq!(result, Err(CommandError::Other("boom".into())));
        assert_eq!(history.len(), 1);
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn reset_clears_entries_but_keeps_listeners() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut history = History::default();
        let events = collecting_listener(&mut history);

        history.add_command(JournalCommand::new("a", &journal)).unwrap();
        history.reset_history();
        assert!(history.is_empty());
        assert_eq!(history.cursor(), None);

        history.add_command(JournalCommand::new("b", &journal)).unwrap();
        let seen = events.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(matches!(seen[1], HistoryEvent::HistoryReset));
        assert!(matches!(seen[2], HistoryEvent::ExecutePerformed(_)));
    }

    #[test]
    fn compound_undo_redo_short_circuit() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut history = History::default();

        history.add_command(JournalCommand::new("a", &journal)).unwrap();
        history.add_command(JournalCommand::new("b", &journal)).unwrap();

        history.compound_undo(10).unwrap();
        assert_eq!(history.cursor(), None);

        history.compound_redo(10).unwrap();
        assert_eq!(history.cursor(), Some(1));
    }

    /// Controller that records which operations it dispatched and reports
    /// a fixed phase.
    struct RecordingController {
        ops: Mutex<Vec<String>>,
        reported: HistoryState,
    }

    impl CommandController for RecordingController {
        fn execute(&self, command: &mut dyn UndoableCommand) -> CommandResult {
            self.ops.lock().unwrap().push("execute".into());
            command.execute()
        }

        fn undo(&self, command: &mut dyn UndoableCommand) -> CommandResult {
            self.ops.lock().unwrap().push("undo".into());
            command.undo()
        }

        fn redo(&self, command: &mut dyn UndoableCommand) -> CommandResult {
            self.ops.lock().unwrap().push("redo".into());
            command.redo()
        }

        fn state(&self) -> HistoryState {
            self.reported
        }
    }

    #[test]
    fn installed_controller_dispatches_and_owns_state() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut history = History::default();
        let controller = Arc::new(RecordingController {
            ops: Mutex::new(Vec::new()),
            reported: HistoryState::Undoing,
        });
        history.set_command_controller(controller.clone());

        history.add_command(JournalCommand::new("a", &journal)).unwrap();
        history.undo().unwrap();
        history.redo().unwrap();

        assert_eq!(
            *controller.ops.lock().unwrap(),
            vec!["execute", "undo", "redo"]
        );
        // The controller is the phase authority.
        assert_eq!(history.state(), HistoryState::Undoing);
        assert_eq!(history.state_probe().state(), HistoryState::Undoing);
    }

    #[test]
    fn state_probe_tracks_inline_phase() {
        let history = History::default();
        let probe = history.state_probe();
        assert_eq!(probe.state(), HistoryState::Idle);
    }
}
