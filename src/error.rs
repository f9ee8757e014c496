//! Command Errors
//!
//! Every rejection a command can produce. A rejected command has made no
//! state change; transient rejections are safe to resubmit.

use thiserror::Error;

use crate::core::clock::Millis;
use crate::game::geometry::LineNumber;
use crate::game::state::{GameId, InvalidPlayerId};
use crate::store::{StoreError, TxnScope};

/// Why a timeout claim was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimRejection {
    /// The claimant holds the turn; only the waiting player may claim.
    TurnHolder,
    /// The turn budget has not run out yet.
    BudgetNotExceeded {
        /// Time since the turn started.
        elapsed_ms: Millis,
        /// Configured budget.
        budget_ms: Millis,
    },
}

impl std::fmt::Display for ClaimRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClaimRejection::TurnHolder => f.write_str("claimant holds the turn"),
            ClaimRejection::BudgetNotExceeded { elapsed_ms, budget_ms } => {
                write!(f, "turn running for {}ms of {}ms", elapsed_ms, budget_ms)
            }
        }
    }
}

/// Command rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Line outside `[1, total]`.
    #[error("line {line} is outside 1..={total}")]
    InvalidLineNumber {
        /// Requested line.
        line: i64,
        /// Lines on this board.
        total: LineNumber,
    },

    /// Mover does not hold the turn.
    #[error("not your turn")]
    NotYourTurn,

    /// Game is terminal.
    #[error("game is already over")]
    GameAlreadyOver,

    /// Line was played before.
    #[error("line {0} already played")]
    LineAlreadyPlayed(LineNumber),

    /// Unknown game id.
    #[error("game {0} not found")]
    GameNotFound(GameId),

    /// Waiting seat kept changing under the transaction.
    #[error("waiting seat contended, gave up after {attempts} attempts")]
    SeatTransactionConflict {
        /// Commit attempts made.
        attempts: u32,
    },

    /// Game kept changing under the transaction.
    #[error("game contended, gave up after {attempts} attempts")]
    GameTransactionConflict {
        /// Commit attempts made.
        attempts: u32,
    },

    /// Caller is not seated in the game.
    #[error("not a participant in this game")]
    NotAParticipant,

    /// Timeout claim refused.
    #[error("timeout claim rejected: {0}")]
    ClaimRejected(ClaimRejection),

    /// Command type not in the dispatch table.
    #[error("unrecognized command type {0:?}")]
    UnrecognizedCommand(String),

    /// Params missing or malformed for the command type.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Malformed player id.
    #[error("invalid player id: {0}")]
    InvalidPlayerId(#[from] InvalidPlayerId),

    /// Same command id is still executing.
    #[error("command {0:?} is already in flight")]
    DuplicateInFlight(String),

    /// Command id already used by this player for a different command.
    #[error("command id {0:?} was already used for a different command")]
    CommandIdReused(String),

    /// Store invariant violated; indicates a bug, not a bad command.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CommandError {
    /// Safe to resubmit unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CommandError::SeatTransactionConflict { .. }
                | CommandError::GameTransactionConflict { .. }
                | CommandError::DuplicateInFlight(_)
        )
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::InvalidLineNumber { .. } => "invalid_line_number",
            CommandError::NotYourTurn => "not_your_turn",
            CommandError::GameAlreadyOver => "game_already_over",
            CommandError::LineAlreadyPlayed(_) => "line_already_played",
            CommandError::GameNotFound(_) => "game_not_found",
            CommandError::SeatTransactionConflict { .. } => "seat_transaction_conflict",
            CommandError::GameTransactionConflict { .. } => "game_transaction_conflict",
            CommandError::NotAParticipant => "not_a_participant",
            CommandError::ClaimRejected(_) => "claim_rejected",
            CommandError::UnrecognizedCommand(_) => "unrecognized_command",
            CommandError::InvalidParams(_) => "invalid_params",
            CommandError::InvalidPlayerId(_) => "invalid_player_id",
            CommandError::DuplicateInFlight(_) => "duplicate_in_flight",
            CommandError::CommandIdReused(_) => "command_id_reused",
            CommandError::Internal(_) => "internal_error",
        }
    }
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { scope: TxnScope::Seat, attempts } => {
                CommandError::SeatTransactionConflict { attempts }
            }
            StoreError::Conflict { scope: TxnScope::Game(_), attempts } => {
                CommandError::GameTransactionConflict { attempts }
            }
            StoreError::GameNotFound(id) => CommandError::GameNotFound(id),
            other @ (StoreError::LineOverwrite { .. } | StoreError::DuplicateGame(_)) => {
                CommandError::Internal(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(CommandError::SeatTransactionConflict { attempts: 5 }.is_transient());
        assert!(CommandError::GameTransactionConflict { attempts: 5 }.is_transient());
        assert!(CommandError::DuplicateInFlight("c1".into()).is_transient());
        assert!(!CommandError::NotYourTurn.is_transient());
        assert!(!CommandError::LineAlreadyPlayed(3).is_transient());
        assert!(!CommandError::CommandIdReused("c1".into()).is_transient());
    }

    #[test]
    fn test_store_conflicts_map_by_scope() {
        let seat: CommandError = StoreError::Conflict { scope: TxnScope::Seat, attempts: 3 }.into();
        assert_eq!(seat, CommandError::SeatTransactionConflict { attempts: 3 });

        let id = GameId::new_v4();
        let game: CommandError = StoreError::Conflict { scope: TxnScope::Game(id), attempts: 2 }.into();
        assert_eq!(game, CommandError::GameTransactionConflict { attempts: 2 });

        let missing: CommandError = StoreError::GameNotFound(id).into();
        assert_eq!(missing, CommandError::GameNotFound(id));
    }

    #[test]
    fn test_messages() {
        let err = CommandError::InvalidLineNumber { line: 0, total: 31 };
        assert_eq!(err.to_string(), "line 0 is outside 1..=31");
        assert_eq!(err.code(), "invalid_line_number");

        let claim = CommandError::ClaimRejected(ClaimRejection::BudgetNotExceeded {
            elapsed_ms: 100,
            budget_ms: 30_000,
        });
        assert_eq!(claim.to_string(), "timeout claim rejected: turn running for 100ms of 30000ms");
    }
}
