#![forbid(unsafe_code)]

//! Property tests for [`History`] invariants.
//!
//! Validates, against a reference model, over random operation sequences:
//! - Undo walks the log backwards in exact reverse order; redo replays
//!   forwards.
//! - Adding after an undo discards the redo branch.
//! - The entry count never exceeds the configured capacity; eviction keeps
//!   the cursor on the same logical entry.
//! - Undo/redo at the boundaries are no-ops.

use proptest::prelude::*;
use std::sync::{Arc, Mutex};

use dom_history::{CommandResult, History, HistoryConfig, UndoableCommand};

// ============================================================================
// Journalling command
// ============================================================================

struct JournalCommand {
    name: String,
    journal: Arc<Mutex<Vec<String>>>,
}

impl JournalCommand {
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
}

// ============================================================================
// Reference model
// ============================================================================

/// Straight-line reimplementation of the cursor/eviction rules, kept in a
/// form simple enough to be obviously correct.
struct Model {
    entries: Vec<String>,
    cursor: Option<usize>,
    capacity: usize,
    journal: Vec<String>,
    next: usize,
}

impl Model {
    fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: None,
            capacity,
            journal: Vec::new(),
            next: 0,
        }
    }

    fn add(&mut self) -> String {
        let name = format!("cmd-{}", self.next);
        self.next += 1;
        let keep = self.cursor.map_or(0, |c| c + 1);
        self.entries.truncate(keep);
        self.journal.push(format!("execute:{name}"));
        self.entries.push(name.clone());
        self.cursor = Some(self.entries.len() - 1);
        if self.entries.len() > self.capacity {
            self.entries.remove(0);
            self.cursor = self.cursor.and_then(|c| c.checked_sub(1));
        }
        name
    }

    fn undo(&mut self) {
        if let Some(c) = self.cursor {
            self.journal.push(format!("undo:{}", self.entries[c]));
            self.cursor = c.checked_sub(1);
        }
    }

    fn redo(&mut self) {
        let next = match self.cursor {
            Some(c) if c + 1 < self.entries.len() => c + 1,
            None if !self.entries.is_empty() => 0,
            _ => return,
        };
        self.journal.push(format!("redo:{}", self.entries[next]));
        self.cursor = Some(next);
    }

    fn reset(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    fn last_undoable(&self) -> Option<&str> {
        self.cursor.map(|c| self.entries[c].as_str())
    }

    fn last_redoable(&self) -> Option<&str> {
        let next = match self.cursor {
            Some(c) => c + 1,
            None => 0,
        };
        self.entries.get(next).map(String::as_str)
    }
}

// ============================================================================
// Strategy helpers
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Add,
    Undo,
    Redo,
    CompoundUndo(usize),
    CompoundRedo(usize),
    Reset,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        5 => Just(Op::Add),
        3 => Just(Op::Undo),
        3 => Just(Op::Redo),
        1 => (1usize..5).prop_map(Op::CompoundUndo),
        1 => (1usize..5).prop_map(Op::CompoundRedo),
        1 => Just(Op::Reset),
    ]
}

fn ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op_strategy(), 1..=max_len)
}

fn add_named(history: &mut History, name: String, journal: &Arc<Mutex<Vec<String>>>) {
    history
        .add_command(Box::new(JournalCommand {
            name,
            journal: journal.clone(),
        }))
        .unwrap();
}

// ============================================================================
// Invariant 1: history agrees with the reference model step for step
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn history_matches_reference_model(
        capacity in 1usize..8,
        ops in ops_strategy(40)
    ) {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut history = History::new(HistoryConfig::new(capacity));
        let mut model = Model::new(capacity);

        for op in ops {
            match op {
                Op::Add => {
                    let name = model.add();
                    add_named(&mut history, name, &journal);
                }
                Op::Undo => {
                    model.undo();
                    history.undo().unwrap();
                }
                Op::Redo => {
                    model.redo();
                    history.redo().unwrap();
                }
                Op::CompoundUndo(n) => {
                    for _ in 0..n {
                        model.undo();
                    }
                    history.compound_undo(n).unwrap();
                }
                Op::CompoundRedo(n) => {
                    for _ in 0..n {
                        model.redo();
                    }
                    history.compound_redo(n).unwrap();
                }
                Op::Reset => {
                    model.reset();
                    history.reset_history();
                }
            }

            prop_assert!(history.len() <= capacity);
            prop_assert_eq!(history.len(), model.entries.len());
            prop_assert_eq!(history.cursor(), model.cursor);
            prop_assert_eq!(history.last_undoable_command_name(), model.last_undoable());
            prop_assert_eq!(history.last_redoable_command_name(), model.last_redoable());
        }

        prop_assert_eq!(&*journal.lock().unwrap(), &model.journal);
    }
}

// ============================================================================
// Invariant 2: undo-all then redo-all replays the exact sequence
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn full_undo_then_redo_replays_in_order(count in 1usize..20) {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut history = History::new(HistoryConfig::unlimited());

        for i in 0..count {
            add_named(&mut history, format!("cmd-{i}"), &journal);
        }
        history.compound_undo(count).unwrap();
        prop_assert!(!history.can_undo());
        history.compound_redo(count).unwrap();
        prop_assert!(!history.can_redo());

        let log = journal.lock().unwrap();
        prop_assert_eq!(log.len(), count * 3);
        for i in 0..count {
            prop_assert_eq!(&log[i], &format!("execute:cmd-{i}"));
            prop_assert_eq!(&log[count + i], &format!("undo:cmd-{}", count - 1 - i));
            prop_assert_eq!(&log[2 * count + i], &format!("redo:cmd-{i}"));
        }
    }
}

// ============================================================================
// Invariant 3: boundary operations never touch commands
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn boundary_operations_are_noops(extra in 1usize..10) {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut history = History::default();

        add_named(&mut history, "only".to_string(), &journal);
        for _ in 0..extra {
            history.redo().unwrap(); // already at the end
        }
        history.undo().unwrap();
        for _ in 0..extra {
            history.undo().unwrap(); // already at the start
        }

        let log = journal.lock().unwrap();
        prop_assert_eq!(&*log, &["execute:only".to_string(), "undo:only".to_string()]);
    }
}
