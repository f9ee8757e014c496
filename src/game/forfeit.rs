//! Turn Budget Arbitration
//!
//! The server never ends a turn on its own clock. Players raise disputes:
//! the turn holder may `quit`, and the waiting player may `claim_timeout`
//! once the turn holder has overrun the per-turn budget. Either way the
//! whole game is forfeited.
//!
//! Both operations are idempotent against a finished game: they report the
//! recorded result without touching it.

use serde::{Deserialize, Serialize};

use crate::core::clock::Millis;
use crate::error::{ClaimRejection, CommandError};
use crate::game::state::{EndReason, GameRecord, PlayerId, Winner};

/// Result of a quit or timeout claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum ForfeitOutcome {
    /// This command ended the game.
    #[serde(rename_all = "camelCase")]
    Forfeited {
        /// Player awarded the game.
        winner: PlayerId,
        /// Player who forfeited.
        loser: PlayerId,
        /// Quit or timeout.
        reason: EndReason,
    },
    /// The game had already ended; nothing changed.
    #[serde(rename_all = "camelCase")]
    AlreadyOver {
        /// Recorded result.
        winner: Winner,
    },
}

impl ForfeitOutcome {
    /// Did this command change the game?
    pub fn changed(&self) -> bool {
        matches!(self, ForfeitOutcome::Forfeited { .. })
    }
}

fn already_over(game: &GameRecord) -> Option<ForfeitOutcome> {
    game.winner
        .clone()
        .map(|winner| ForfeitOutcome::AlreadyOver { winner })
}

/// `player` forfeits. The opponent wins.
pub fn quit(game: &mut GameRecord, player: &PlayerId) -> Result<ForfeitOutcome, CommandError> {
    let opponent = game
        .opponent_of(player)
        .cloned()
        .ok_or(CommandError::NotAParticipant)?;

    if let Some(done) = already_over(game) {
        return Ok(done);
    }

    game.finish(Winner::Player(opponent.clone()), EndReason::Forfeit);
    Ok(ForfeitOutcome::Forfeited {
        winner: opponent,
        loser: player.clone(),
        reason: EndReason::Forfeit,
    })
}

/// `claimant` asserts the turn holder has overrun `budget_ms`.
///
/// Valid only while active, for the player not holding the turn, and once
/// strictly more than `budget_ms` has elapsed since the turn started.
pub fn claim_timeout(
    game: &mut GameRecord,
    claimant: &PlayerId,
    now: Millis,
    budget_ms: Millis,
) -> Result<ForfeitOutcome, CommandError> {
    if !game.is_participant(claimant) {
        return Err(CommandError::NotAParticipant);
    }

    if let Some(done) = already_over(game) {
        return Ok(done);
    }

    if game.turn == *claimant {
        return Err(CommandError::ClaimRejected(ClaimRejection::TurnHolder));
    }

    let elapsed_ms = now.saturating_sub(game.turn_started_at);
    if elapsed_ms <= budget_ms {
        return Err(CommandError::ClaimRejected(ClaimRejection::BudgetNotExceeded {
            elapsed_ms,
            budget_ms,
        }));
    }

    let loser = game.turn.clone();
    game.finish(Winner::Player(claimant.clone()), EndReason::Timeout);
    Ok(ForfeitOutcome::Forfeited {
        winner: claimant.clone(),
        loser,
        reason: EndReason::Timeout,
    })
}
