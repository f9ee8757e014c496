//! Match Rendezvous
//!
//! `requestMatch` and `cancelMatch` as atomic seat transactions. Pairing
//! clears the seat, creates the game and queues both `newGame`
//! notifications in the same commit.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::core::clock::{Clock, Millis};
use crate::error::CommandError;
use crate::game::events::{new_game_deliveries, Delivery, Notification};
use crate::game::state::{GameDocument, GameId, GameRecord, PlayerId};
use crate::matchmaking::seat::{decide_cancel, decide_match, CancelDecision, SeatDecision};
use crate::store::MemoryStore;

/// Result of `requestMatch`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum MatchOutcome {
    /// Caller now holds the seat.
    Waiting {
        /// Stale waiter removed to make room.
        evicted: Option<PlayerId>,
    },
    /// Caller already held the seat; wait restarted.
    Refreshed,
    /// Caller was paired. The opponent moves first.
    Paired {
        /// New game.
        #[serde(rename = "gameID")]
        game_id: GameId,
        /// The waiter.
        opponent: PlayerId,
    },
}

/// Pairs players through the waiting seat.
pub struct Matchmaker {
    store: Arc<MemoryStore>,
    clock: Arc<dyn Clock>,
    threshold_ms: Millis,
}

impl Matchmaker {
    /// Matchmaker over `store`. A waiter older than `threshold_ms` is stale.
    pub fn new(store: Arc<MemoryStore>, clock: Arc<dyn Clock>, threshold_ms: Millis) -> Self {
        Self { store, clock, threshold_ms }
    }

    /// Liveness window.
    pub fn threshold_ms(&self) -> Millis {
        self.threshold_ms
    }

    /// Occupy the seat, refresh it, or pair with its occupant.
    #[instrument(skip(self, player), fields(player = %player))]
    pub async fn request_match(&self, player: &PlayerId) -> Result<MatchOutcome, CommandError> {
        let now = self.clock.now_ms();
        let threshold_ms = self.threshold_ms;

        let outcome = self
            .store
            .seat_transaction(|txn| {
                let outcome = match decide_match(txn.seat_mut(), player, now, threshold_ms) {
                    SeatDecision::Seated { evicted } => {
                        if let Some(stale) = &evicted {
                            txn.notify_all([Delivery::new(stale.clone(), Notification::WaitExpired)]);
                        }
                        MatchOutcome::Waiting { evicted }
                    }
                    SeatDecision::Refreshed => MatchOutcome::Refreshed,
                    SeatDecision::Paired { opponent } => {
                        let game =
                            GameRecord::new(GameId::new_v4(), opponent.clone(), player.clone(), now);
                        let game_id = game.id;
                        txn.notify_all(new_game_deliveries(&game));
                        txn.create_game(GameDocument::new(game));
                        MatchOutcome::Paired { game_id, opponent }
                    }
                };
                Ok::<_, CommandError>(outcome)
            })
            .await?;

        match &outcome {
            MatchOutcome::Waiting { evicted: Some(stale) } => {
                info!(evicted = %stale, "Stale waiter evicted, caller seated");
            }
            MatchOutcome::Waiting { evicted: None } => debug!("Caller seated"),
            MatchOutcome::Refreshed => debug!("Wait refreshed"),
            MatchOutcome::Paired { game_id, opponent } => {
                info!(%game_id, %opponent, "Players paired");
            }
        }

        Ok(outcome)
    }

    /// Leave the seat if the caller holds it and is not stale.
    #[instrument(skip(self, player), fields(player = %player))]
    pub async fn cancel_match(&self, player: &PlayerId) -> Result<CancelDecision, CommandError> {
        let now = self.clock.now_ms();
        let threshold_ms = self.threshold_ms;

        let decision = self
            .store
            .seat_transaction(|txn| {
                Ok::<_, CommandError>(decide_cancel(txn.seat_mut(), player, now, threshold_ms))
            })
            .await?;

        debug!(?decision, "Cancel handled");
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::matchmaking::seat::WaitingSeat;

    const T: Millis = 10_000;

    fn player(id: &str) -> PlayerId {
        PlayerId::parse(id).unwrap()
    }

    fn setup() -> (Arc<MemoryStore>, Arc<ManualClock>, Matchmaker) {
        let store = Arc::new(MemoryStore::new(5));
        let clock = Arc::new(ManualClock::new(1_000));
        let matchmaker = Matchmaker::new(store.clone(), clock.clone(), T);
        (store, clock, matchmaker)
    }

    #[tokio::test]
    async fn test_pairing_creates_game_and_notifies() {
        let (store, clock, mm) = setup();

        assert_eq!(
            mm.request_match(&player("alice")).await.unwrap(),
            MatchOutcome::Waiting { evicted: None }
        );
        clock.advance(5_000);

        let outcome = mm.request_match(&player("bob")).await.unwrap();
        let MatchOutcome::Paired { game_id, opponent } = outcome else {
            panic!("expected pairing, got {:?}", outcome);
        };
        assert_eq!(opponent, player("alice"));
        assert_eq!(store.seat().await, WaitingSeat::empty());

        let game = store.game(game_id).await.unwrap();
        assert_eq!(game.player1, player("alice"));
        assert_eq!(game.player2, player("bob"));
        assert_eq!(game.turn, player("alice"));
        assert_eq!(game.created_at, 6_000);
        assert_eq!(game.turn_started_at, 6_000);

        let alice = store.inbox(&player("alice")).await;
        assert_eq!(
            alice,
            vec![Notification::NewGame { game_id, opponent: player("bob"), your_turn: true }]
        );
        assert_eq!(store.inbox(&player("bob")).await.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_waiter_is_evicted_and_told() {
        let (store, clock, mm) = setup();

        mm.request_match(&player("alice")).await.unwrap();
        clock.advance(T + 1);

        let outcome = mm.request_match(&player("bob")).await.unwrap();
        assert_eq!(outcome, MatchOutcome::Waiting { evicted: Some(player("alice")) });
        assert_eq!(store.game_count().await, 0);
        assert_eq!(store.seat().await.occupant, Some(player("bob")));
        assert_eq!(store.inbox(&player("alice")).await, vec![Notification::WaitExpired]);
    }

    #[tokio::test]
    async fn test_rematch_refreshes_instead_of_self_pairing() {
        let (store, clock, mm) = setup();

        mm.request_match(&player("alice")).await.unwrap();
        clock.advance(8_000);
        assert_eq!(mm.request_match(&player("alice")).await.unwrap(), MatchOutcome::Refreshed);
        assert_eq!(store.seat().await, WaitingSeat::occupied(player("alice"), 9_000));

        // The refresh keeps alice live past her original window.
        clock.advance(8_000);
        let outcome = mm.request_match(&player("bob")).await.unwrap();
        assert!(matches!(outcome, MatchOutcome::Paired { .. }));
        assert_eq!(store.game_count().await, 1);
    }

    #[tokio::test]
    async fn test_cancel_then_match_seats_next_player() {
        let (store, clock, mm) = setup();

        mm.request_match(&player("alice")).await.unwrap();
        clock.advance(1_000);
        assert_eq!(mm.cancel_match(&player("alice")).await.unwrap(), CancelDecision::Cancelled);
        assert_eq!(mm.cancel_match(&player("alice")).await.unwrap(), CancelDecision::NotWaiting);

        mm.request_match(&player("bob")).await.unwrap();
        assert_eq!(store.seat().await.occupant, Some(player("bob")));
        assert_eq!(store.game_count().await, 0);
    }

    #[tokio::test]
    async fn test_cancel_by_stale_waiter_is_noop() {
        let (store, clock, mm) = setup();

        mm.request_match(&player("alice")).await.unwrap();
        clock.advance(T + 1);
        assert_eq!(mm.cancel_match(&player("alice")).await.unwrap(), CancelDecision::Expired);
        assert_eq!(store.seat().await.occupant, Some(player("alice")));
    }
}
