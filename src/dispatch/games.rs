//! Game Handlers
//!
//! `move`, `quit` and `claimTimeout` as game transactions. The rules run
//! on the transaction draft; notifications are staged on the same draft.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::core::clock::{Clock, Millis};
use crate::error::CommandError;
use crate::game::events::{forfeit_deliveries, move_deliveries};
use crate::game::forfeit::{self, ForfeitOutcome};
use crate::game::geometry::Grid;
use crate::game::rules::{apply_move, MoveOutcome};
use crate::game::state::{GameId, PlayerId};
use crate::store::MemoryStore;

/// Runs game commands against the store.
pub struct GameService {
    store: Arc<MemoryStore>,
    clock: Arc<dyn Clock>,
    grid: Grid,
    play_time_ms: Millis,
}

impl GameService {
    /// Service for boards of `grid` with a per-turn budget of `play_time_ms`.
    pub fn new(store: Arc<MemoryStore>, clock: Arc<dyn Clock>, grid: Grid, play_time_ms: Millis) -> Self {
        Self { store, clock, grid, play_time_ms }
    }

    /// Board geometry.
    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// Play `line` for `player`.
    #[instrument(skip(self, game_id, player), fields(game = %game_id, player = %player))]
    pub async fn make_move(
        &self,
        game_id: GameId,
        player: &PlayerId,
        line: i64,
    ) -> Result<MoveOutcome, CommandError> {
        let now = self.clock.now_ms();
        let grid = self.grid;

        let outcome = self
            .store
            .game_transaction(game_id, |txn| {
                let outcome = apply_move(txn.doc_mut(), &grid, player, line, now)?;
                let deliveries = move_deliveries(&txn.doc().game, &outcome);
                txn.notify_all(deliveries);
                Ok::<_, CommandError>(outcome)
            })
            .await?;

        if let Some(winner) = &outcome.winner {
            info!(line = outcome.line, %winner, "Final box closed");
        } else {
            debug!(line = outcome.line, closed = outcome.closed_boxes.len(), "Move applied");
        }
        Ok(outcome)
    }

    /// `player` forfeits.
    #[instrument(skip(self, game_id, player), fields(game = %game_id, player = %player))]
    pub async fn quit(&self, game_id: GameId, player: &PlayerId) -> Result<ForfeitOutcome, CommandError> {
        let outcome = self
            .store
            .game_transaction(game_id, |txn| {
                let outcome = forfeit::quit(&mut txn.doc_mut().game, player)?;
                let deliveries = forfeit_deliveries(&txn.doc().game, &outcome);
                txn.notify_all(deliveries);
                Ok::<_, CommandError>(outcome)
            })
            .await?;

        log_forfeit(&outcome);
        Ok(outcome)
    }

    /// `player` claims the turn holder overran the budget.
    #[instrument(skip(self, game_id, player), fields(game = %game_id, player = %player))]
    pub async fn claim_timeout(
        &self,
        game_id: GameId,
        player: &PlayerId,
    ) -> Result<ForfeitOutcome, CommandError> {
        let now = self.clock.now_ms();
        let budget_ms = self.play_time_ms;

        let outcome = self
            .store
            .game_transaction(game_id, |txn| {
                let outcome = forfeit::claim_timeout(&mut txn.doc_mut().game, player, now, budget_ms)?;
                let deliveries = forfeit_deliveries(&txn.doc().game, &outcome);
                txn.notify_all(deliveries);
                Ok::<_, CommandError>(outcome)
            })
            .await?;

        log_forfeit(&outcome);
        Ok(outcome)
    }
}

fn log_forfeit(outcome: &ForfeitOutcome) {
    match outcome {
        ForfeitOutcome::Forfeited { winner, loser, reason } => {
            info!(%winner, %loser, ?reason, "Game forfeited");
        }
        ForfeitOutcome::AlreadyOver { .. } => debug!("Game already over"),
    }
}
