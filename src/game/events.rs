//! Player Notifications
//!
//! Records delivered to a player's inbox. Staged inside the transaction
//! that causes them, so a notification exists iff its state change
//! committed.

use serde::{Deserialize, Serialize};

use crate::game::forfeit::ForfeitOutcome;
use crate::game::geometry::{BoxIndex, LineNumber};
use crate::game::rules::MoveOutcome;
use crate::game::state::{EndReason, GameId, GameRecord, PlayerId, Winner};

/// Notification payloads.
///
/// Wire form is `{type, params}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "camelCase")]
pub enum Notification {
    /// Paired into a new game.
    #[serde(rename_all = "camelCase")]
    NewGame {
        /// Game to open.
        #[serde(rename = "gameID")]
        game_id: GameId,
        /// The other player.
        opponent: PlayerId,
        /// Recipient moves first.
        your_turn: bool,
    },

    /// A move was accepted.
    #[serde(rename_all = "camelCase")]
    MoveApplied {
        /// Game.
        #[serde(rename = "gameID")]
        game_id: GameId,
        /// Line played.
        line: LineNumber,
        /// Mover.
        by: PlayerId,
        /// Boxes closed by the move.
        closed_boxes: Vec<BoxIndex>,
        /// Next turn holder, unset once over.
        next_turn: Option<PlayerId>,
    },

    /// A timeout claim succeeded against `player`.
    #[serde(rename_all = "camelCase")]
    TurnTimeout {
        /// Game.
        #[serde(rename = "gameID")]
        game_id: GameId,
        /// Player who ran out of time.
        player: PlayerId,
    },

    /// The game ended.
    #[serde(rename_all = "camelCase")]
    GameOver {
        /// Game.
        #[serde(rename = "gameID")]
        game_id: GameId,
        /// Winner or draw.
        winner: Winner,
        /// How it ended.
        reason: EndReason,
        /// Final count for player 1.
        player1_boxes: u32,
        /// Final count for player 2.
        player2_boxes: u32,
    },

    /// The recipient sat in the waiting seat too long and was evicted.
    WaitExpired,
}

/// A notification addressed to one player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    /// Inbox owner.
    pub recipient: PlayerId,
    /// Payload.
    pub notification: Notification,
}

impl Delivery {
    /// Address `notification` to `recipient`.
    pub fn new(recipient: PlayerId, notification: Notification) -> Self {
        Self { recipient, notification }
    }
}

/// `newGame` to both players.
pub fn new_game_deliveries(game: &GameRecord) -> Vec<Delivery> {
    [(&game.player1, &game.player2), (&game.player2, &game.player1)]
        .into_iter()
        .map(|(me, other)| {
            Delivery::new(
                me.clone(),
                Notification::NewGame {
                    game_id: game.id,
                    opponent: other.clone(),
                    your_turn: game.turn == *me,
                },
            )
        })
        .collect()
}

/// `moveApplied` to both players, then `gameOver` if the move ended it.
pub fn move_deliveries(game: &GameRecord, outcome: &MoveOutcome) -> Vec<Delivery> {
    let applied = Notification::MoveApplied {
        game_id: game.id,
        line: outcome.line,
        by: outcome.by.clone(),
        closed_boxes: outcome.closed_boxes.clone(),
        next_turn: outcome.next_turn.clone(),
    };

    let mut deliveries = to_both(game, applied);
    deliveries.extend(game_over_deliveries(game));
    deliveries
}

/// `turnTimeout` (on a successful claim) and `gameOver` to both players.
pub fn forfeit_deliveries(game: &GameRecord, outcome: &ForfeitOutcome) -> Vec<Delivery> {
    let mut deliveries = Vec::new();

    if let ForfeitOutcome::Forfeited { loser, reason: EndReason::Timeout, .. } = outcome {
        deliveries.extend(to_both(
            game,
            Notification::TurnTimeout { game_id: game.id, player: loser.clone() },
        ));
    }
    if outcome.changed() {
        deliveries.extend(game_over_deliveries(game));
    }

    deliveries
}

/// `gameOver` to both players, or nothing while the game is active.
pub fn game_over_deliveries(game: &GameRecord) -> Vec<Delivery> {
    match (&game.winner, game.ended_by) {
        (Some(winner), Some(reason)) => to_both(
            game,
            Notification::GameOver {
                game_id: game.id,
                winner: winner.clone(),
                reason,
                player1_boxes: game.player1_boxes,
                player2_boxes: game.player2_boxes,
            },
        ),
        _ => Vec::new(),
    }
}

fn to_both(game: &GameRecord, notification: Notification) -> Vec<Delivery> {
    vec![
        Delivery::new(game.player1.clone(), notification.clone()),
        Delivery::new(game.player2.clone(), notification),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::forfeit::quit;

    fn player(id: &str) -> PlayerId {
        PlayerId::parse(id).unwrap()
    }

    #[test]
    fn test_new_game_wire_shape() {
        let game = GameRecord::new(GameId::new_v4(), player("alice"), player("bob"), 0);
        let deliveries = new_game_deliveries(&game);
        assert_eq!(deliveries.len(), 2);

        let json = serde_json::to_value(&deliveries[0].notification).unwrap();
        assert_eq!(json["type"], "newGame");
        assert_eq!(json["params"]["gameID"], game.id.to_string());
        assert_eq!(json["params"]["opponent"], "bob");
        assert_eq!(json["params"]["yourTurn"], true);

        assert_eq!(deliveries[1].recipient, player("bob"));
        assert!(matches!(
            deliveries[1].notification,
            Notification::NewGame { your_turn: false, .. }
        ));
    }

    #[test]
    fn test_forfeit_by_quit_has_no_timeout_notice() {
        let mut game = GameRecord::new(GameId::new_v4(), player("alice"), player("bob"), 0);
        let outcome = quit(&mut game, &player("alice")).unwrap();
        let deliveries = forfeit_deliveries(&game, &outcome);

        assert_eq!(deliveries.len(), 2);
        assert!(deliveries
            .iter()
            .all(|d| matches!(d.notification, Notification::GameOver { reason: EndReason::Forfeit, .. })));
    }

    #[test]
    fn test_active_game_has_no_game_over() {
        let game = GameRecord::new(GameId::new_v4(), player("alice"), player("bob"), 0);
        assert!(game_over_deliveries(&game).is_empty());
    }

    #[test]
    fn test_wait_expired_wire_shape() {
        let json = serde_json::to_value(Notification::WaitExpired).unwrap();
        assert_eq!(json["type"], "waitExpired");
    }
}
