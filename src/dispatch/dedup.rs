//! Command Deduplication
//!
//! Remembers the result of recently completed command ids so a client
//! resubmitting after a lost reply gets the original answer instead of a
//! second application. Ids are scoped to the issuing player, and each entry
//! keeps the command it was first used for so a reused id carrying a
//! different command is refused rather than answered with a stale result.
//! Bounded; the oldest completed id is forgotten first.

use std::collections::{HashMap, VecDeque};

use crate::dispatch::{Command, CommandOutcome};
use crate::error::CommandError;
use crate::game::state::PlayerId;

/// Recorded result of a completed command.
pub type CommandResult = Result<CommandOutcome, CommandError>;

/// A command id as seen from one player.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DedupKey {
    issuer: PlayerId,
    command_id: String,
}

impl DedupKey {
    /// Key for `command_id` submitted by `issuer`.
    pub fn new(issuer: PlayerId, command_id: impl Into<String>) -> Self {
        Self { issuer, command_id: command_id.into() }
    }
}

/// What to do with an incoming command id.
#[derive(Clone, Debug, PartialEq)]
pub enum Admission {
    /// Never seen, or forgotten. Execute it.
    Fresh,
    /// Already completed. Return this.
    Replay(CommandResult),
    /// First submission has not finished.
    InFlight,
    /// Id already taken by a different command from the same player.
    Mismatch,
}

#[derive(Debug)]
enum Slot {
    InFlight,
    Done(CommandResult),
}

#[derive(Debug)]
struct Entry {
    command: Command,
    slot: Slot,
}

/// Bounded FIFO of command results.
#[derive(Debug)]
pub struct DedupCache {
    capacity: usize,
    entries: HashMap<DedupKey, Entry>,
    completed: VecDeque<DedupKey>,
}

impl DedupCache {
    /// Cache remembering up to `capacity` completed ids. A zero capacity
    /// still tracks in-flight ids but remembers no results.
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: HashMap::new(), completed: VecDeque::new() }
    }

    /// Classify `key` for `command`, marking it in flight when fresh.
    pub fn admit(&mut self, key: &DedupKey, command: &Command) -> Admission {
        match self.entries.get(key) {
            Some(entry) if entry.command != *command => Admission::Mismatch,
            Some(Entry { slot: Slot::InFlight, .. }) => Admission::InFlight,
            Some(Entry { slot: Slot::Done(result), .. }) => Admission::Replay(result.clone()),
            None => {
                self.entries
                    .insert(key.clone(), Entry { command: command.clone(), slot: Slot::InFlight });
                Admission::Fresh
            }
        }
    }

    /// Record the result of an admitted key. Transient failures are dropped
    /// so a resubmission runs again.
    pub fn complete(&mut self, key: &DedupKey, result: &CommandResult) {
        let transient = matches!(result, Err(err) if err.is_transient());
        if transient || self.capacity == 0 {
            self.entries.remove(key);
            return;
        }

        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        entry.slot = Slot::Done(result.clone());
        self.completed.push_back(key.clone());

        while self.completed.len() > self.capacity {
            if let Some(oldest) = self.completed.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    /// Forget an admitted key that never completed.
    pub fn abandon(&mut self, key: &DedupKey) {
        if matches!(self.entries.get(key), Some(Entry { slot: Slot::InFlight, .. })) {
            self.entries.remove(key);
        }
    }

    /// Completed ids remembered.
    pub fn len(&self) -> usize {
        self.completed.len()
    }

    /// Nothing remembered.
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }
}
