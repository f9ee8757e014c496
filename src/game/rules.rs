//! Move Rules
//!
//! Validates and applies one move to a game document. Runs inside the
//! game's transaction: the read of already-played lines, the closure
//! decision and the write of the new line plus score/turn/winner all
//! happen against the same draft, which the store commits atomically.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::clock::Millis;
use crate::error::CommandError;
use crate::game::geometry::{BoxIndex, Grid, LineNumber};
use crate::game::state::{EndReason, GameDocument, LineRecord, PlayerId, Winner};

/// Result of an accepted move.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    /// Line that was played.
    pub line: LineNumber,
    /// Player who played it.
    pub by: PlayerId,
    /// Boxes this move closed (0, 1 or 2).
    pub closed_boxes: Vec<BoxIndex>,
    /// Who moves next; `None` once the game is over.
    pub next_turn: Option<PlayerId>,
    /// Set when this move closed the last box.
    pub winner: Option<Winner>,
}

impl MoveOutcome {
    /// Did the mover keep the turn?
    pub fn keeps_turn(&self) -> bool {
        !self.closed_boxes.is_empty()
    }

    /// Did this move end the game?
    pub fn ended_game(&self) -> bool {
        self.winner.is_some()
    }
}

/// Boxes that `line` would close given the already-played `lines`.
///
/// A box closes when exactly three of its sides are already played and
/// `line` is the fourth. `line` itself is not expected in `lines`.
pub fn boxes_closed_by(
    grid: &Grid,
    lines: &BTreeMap<LineNumber, LineRecord>,
    line: LineNumber,
) -> Vec<BoxIndex> {
    grid.line_boxes(line)
        .into_iter()
        .filter(|&b| {
            grid.box_lines(b).is_some_and(|sides| {
                let played = sides
                    .as_array()
                    .iter()
                    .filter(|&&side| side != line && lines.contains_key(&side))
                    .count();
                played == 3
            })
        })
        .collect()
}

/// Validate and apply `player`'s move on `line`.
///
/// On rejection the document is untouched.
pub fn apply_move(
    doc: &mut GameDocument,
    grid: &Grid,
    player: &PlayerId,
    line: i64,
    now: Millis,
) -> Result<MoveOutcome, CommandError> {
    let total = grid.total_lines();
    let line = LineNumber::try_from(line)
        .ok()
        .filter(|l| grid.is_valid_line(*l))
        .ok_or(CommandError::InvalidLineNumber { line, total })?;

    if doc.game.is_terminal() {
        return Err(CommandError::GameAlreadyOver);
    }
    if doc.game.turn != *player {
        return Err(CommandError::NotYourTurn);
    }
    if doc.is_played(line) {
        return Err(CommandError::LineAlreadyPlayed(line));
    }

    let closed = boxes_closed_by(grid, &doc.lines, line);
    let game = &mut doc.game;

    let next_turn = if closed.is_empty() {
        let other = game
            .opponent_of(player)
            .cloned()
            .ok_or(CommandError::NotAParticipant)?;
        game.turn = other.clone();
        Some(other)
    } else {
        let k = closed.len() as u32;
        if *player == game.player1 {
            game.player1_boxes += k;
        } else {
            game.player2_boxes += k;
        }

        if game.closed_boxes() == grid.box_count() {
            let winner = game.leader();
            game.finish(winner, EndReason::Completed);
            None
        } else {
            Some(player.clone())
        }
    };

    game.turn_started_at = now;
    let winner = game.winner.clone();

    doc.lines.insert(line, LineRecord { played_at: now, played_by: player.clone() });

    Ok(MoveOutcome {
        line,
        by: player.clone(),
        closed_boxes: closed,
        next_turn,
        winner,
    })
}
