//! Durable State
//!
//! Versioned documents with optimistic transactions. A transaction reads a
//! snapshot, runs a synchronous body against a draft, and commits only if
//! no other writer committed to the same document in between; otherwise it
//! re-reads and re-runs the body, up to a bounded number of attempts.
//!
//! Two document kinds are contended: the single waiting seat, and each
//! game (record plus lines). Writes staged on a draft (new games,
//! notifications) commit together with the document or not at all.

pub mod memory;

use std::fmt;

use thiserror::Error;

use crate::game::events::Delivery;
use crate::game::geometry::LineNumber;
use crate::game::state::{GameDocument, GameId};
use crate::matchmaking::seat::WaitingSeat;

pub use memory::MemoryStore;

/// A document with its commit counter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Versioned<T> {
    /// Bumped on every commit.
    pub version: u64,
    /// Document body.
    pub value: T,
}

impl<T> Versioned<T> {
    /// Fresh document at version 0.
    pub fn new(value: T) -> Self {
        Self { version: 0, value }
    }
}

/// Which document a transaction targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxnScope {
    /// The waiting seat.
    Seat,
    /// One game.
    Game(GameId),
}

impl fmt::Display for TxnScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxnScope::Seat => f.write_str("seat"),
            TxnScope::Game(id) => write!(f, "game {}", id),
        }
    }
}

/// Store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Every attempt lost to a concurrent writer. Transient.
    #[error("{scope} transaction conflict after {attempts} attempts")]
    Conflict {
        /// Contended document.
        scope: TxnScope,
        /// Attempts made.
        attempts: u32,
    },

    /// No such game.
    #[error("game {0} not found")]
    GameNotFound(GameId),

    /// A draft tried to change or drop a recorded line.
    #[error("line {line} of game {game} is already recorded")]
    LineOverwrite {
        /// Game.
        game: GameId,
        /// Line.
        line: LineNumber,
    },

    /// A staged game reused an existing id.
    #[error("game {0} already exists")]
    DuplicateGame(GameId),
}

/// Result of one commit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Commit {
    /// Draft written.
    Applied,
    /// Another writer got there first.
    Stale,
}

/// Draft of the waiting seat.
#[derive(Debug)]
pub struct SeatTxn {
    seat: WaitingSeat,
    staged_games: Vec<GameDocument>,
    outbox: Vec<Delivery>,
}

impl SeatTxn {
    pub(crate) fn new(seat: WaitingSeat) -> Self {
        Self { seat, staged_games: Vec::new(), outbox: Vec::new() }
    }

    /// Seat as read.
    pub fn seat(&self) -> &WaitingSeat {
        &self.seat
    }

    /// Seat draft.
    pub fn seat_mut(&mut self) -> &mut WaitingSeat {
        &mut self.seat
    }

    /// Create `doc` when the seat change commits.
    pub fn create_game(&mut self, doc: GameDocument) {
        self.staged_games.push(doc);
    }

    /// Deliver when the seat change commits.
    pub fn notify_all(&mut self, deliveries: impl IntoIterator<Item = Delivery>) {
        self.outbox.extend(deliveries);
    }
}

/// Draft of one game document.
#[derive(Debug)]
pub struct GameTxn {
    doc: GameDocument,
    outbox: Vec<Delivery>,
}

impl GameTxn {
    pub(crate) fn new(doc: GameDocument) -> Self {
        Self { doc, outbox: Vec::new() }
    }

    /// Document as read.
    pub fn doc(&self) -> &GameDocument {
        &self.doc
    }

    /// Document draft.
    pub fn doc_mut(&mut self) -> &mut GameDocument {
        &mut self.doc
    }

    /// Deliver when the game change commits.
    pub fn notify_all(&mut self, deliveries: impl IntoIterator<Item = Delivery>) {
        self.outbox.extend(deliveries);
    }
}
