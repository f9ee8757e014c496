//! Game State Definitions
//!
//! Identity, game record and line record types. These are the durable
//! state surface clients read: one [`GameRecord`] per game plus its set of
//! [`LineRecord`]s keyed by line number.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::clock::Millis;
use crate::game::geometry::LineNumber;

/// Literal used for a drawn game wherever a winner is recorded.
pub const DRAW: &str = "DRAW";

/// Longest accepted player id.
pub const MAX_PLAYER_ID_LEN: usize = 128;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Rejected player id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidPlayerId {
    /// Empty or whitespace only.
    #[error("player id is empty")]
    Empty,
    /// Longer than [`MAX_PLAYER_ID_LEN`].
    #[error("player id longer than {} bytes", MAX_PLAYER_ID_LEN)]
    TooLong,
    /// Collides with the draw marker.
    #[error("player id {:?} is reserved", DRAW)]
    Reserved,
}

/// Opaque player identifier issued by the external identity provider.
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlayerId(String);

impl PlayerId {
    /// Validate and wrap an id.
    pub fn parse(raw: impl Into<String>) -> Result<Self, InvalidPlayerId> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(InvalidPlayerId::Empty);
        }
        if raw.len() > MAX_PLAYER_ID_LEN {
            return Err(InvalidPlayerId::TooLong);
        }
        if raw == DRAW {
            return Err(InvalidPlayerId::Reserved);
        }
        Ok(Self(raw))
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PlayerId {
    type Error = InvalidPlayerId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<PlayerId> for String {
    fn from(id: PlayerId) -> Self {
        id.0
    }
}

impl FromStr for PlayerId {
    type Err = InvalidPlayerId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// GAME ID
// =============================================================================

/// Unique game identifier (UUID v4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(uuid::Uuid);

impl GameId {
    /// Fresh random id.
    pub fn new_v4() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl FromStr for GameId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// OUTCOME
// =============================================================================

/// Recorded result of a finished game.
///
/// Serialized as the winning player's id, or `"DRAW"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Winner {
    /// One player won.
    Player(PlayerId),
    /// Equal box counts.
    Draw,
}

impl Winner {
    /// The winning player, if not a draw.
    pub fn player(&self) -> Option<&PlayerId> {
        match self {
            Winner::Player(id) => Some(id),
            Winner::Draw => None,
        }
    }
}

impl TryFrom<String> for Winner {
    type Error = InvalidPlayerId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == DRAW {
            Ok(Winner::Draw)
        } else {
            PlayerId::parse(value).map(Winner::Player)
        }
    }
}

impl From<Winner> for String {
    fn from(winner: Winner) -> Self {
        match winner {
            Winner::Player(id) => id.into(),
            Winner::Draw => DRAW.to_string(),
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Winner::Player(id) => id.fmt(f),
            Winner::Draw => f.write_str(DRAW),
        }
    }
}

/// Why a game became terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndReason {
    /// Every box was closed.
    Completed,
    /// A player quit.
    Forfeit,
    /// The opponent claimed an expired turn.
    Timeout,
}

/// Game state machine phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GamePhase {
    /// Winner unset, turn held by one of the two players.
    Active,
    /// Winner set. No transition out.
    Terminal,
}

// =============================================================================
// GAME RECORD
// =============================================================================

/// One game between two players.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    /// Game identifier.
    pub id: GameId,
    /// First waiter; moves first.
    pub player1: PlayerId,
    /// Second arrival.
    pub player2: PlayerId,
    /// Current turn holder (meaningful while active).
    pub turn: PlayerId,
    /// Boxes closed by player 1.
    pub player1_boxes: u32,
    /// Boxes closed by player 2.
    pub player2_boxes: u32,
    /// Set once, when the game ends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Winner>,
    /// Set together with `winner`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_by: Option<EndReason>,
    /// Creation time.
    pub created_at: Millis,
    /// Start of the current turn's budget.
    pub turn_started_at: Millis,
}

impl GameRecord {
    /// A fresh game. `player1` takes the first turn.
    pub fn new(id: GameId, player1: PlayerId, player2: PlayerId, now: Millis) -> Self {
        Self {
            id,
            turn: player1.clone(),
            player1,
            player2,
            player1_boxes: 0,
            player2_boxes: 0,
            winner: None,
            ended_by: None,
            created_at: now,
            turn_started_at: now,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> GamePhase {
        if self.winner.is_some() {
            GamePhase::Terminal
        } else {
            GamePhase::Active
        }
    }

    /// Has the game ended?
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.phase() == GamePhase::Terminal
    }

    /// Is `player` one of the two seats?
    pub fn is_participant(&self, player: &PlayerId) -> bool {
        *player == self.player1 || *player == self.player2
    }

    /// The other seat, or `None` for a non-participant.
    pub fn opponent_of(&self, player: &PlayerId) -> Option<&PlayerId> {
        if *player == self.player1 {
            Some(&self.player2)
        } else if *player == self.player2 {
            Some(&self.player1)
        } else {
            None
        }
    }

    /// Boxes closed by `player`.
    pub fn boxes_of(&self, player: &PlayerId) -> Option<u32> {
        if *player == self.player1 {
            Some(self.player1_boxes)
        } else if *player == self.player2 {
            Some(self.player2_boxes)
        } else {
            None
        }
    }

    /// Boxes closed so far by both players.
    #[inline]
    pub fn closed_boxes(&self) -> u32 {
        self.player1_boxes + self.player2_boxes
    }

    /// Player with the strictly higher box count, or a draw.
    pub fn leader(&self) -> Winner {
        use std::cmp::Ordering;
        match self.player1_boxes.cmp(&self.player2_boxes) {
            Ordering::Greater => Winner::Player(self.player1.clone()),
            Ordering::Less => Winner::Player(self.player2.clone()),
            Ordering::Equal => Winner::Draw,
        }
    }

    /// One-way transition to terminal.
    ///
    /// Callers must check [`Self::is_terminal`] first.
    pub(crate) fn finish(&mut self, winner: Winner, reason: EndReason) {
        debug_assert!(!self.is_terminal(), "game {} finished twice", self.id);
        self.winner = Some(winner);
        self.ended_by = Some(reason);
    }
}

// =============================================================================
// LINES
// =============================================================================

/// A played line. Written once, never changed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRecord {
    /// When it was played.
    pub played_at: Millis,
    /// Who played it.
    pub played_by: PlayerId,
}

/// A game record with its played lines.
///
/// Stored and versioned as one unit so a move reads and writes both inside
/// a single transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameDocument {
    /// The game record.
    pub game: GameRecord,
    /// Played lines by number.
    pub lines: BTreeMap<LineNumber, LineRecord>,
}

impl GameDocument {
    /// Document for a newly created game.
    pub fn new(game: GameRecord) -> Self {
        Self { game, lines: BTreeMap::new() }
    }

    /// Has `line` been played?
    #[inline]
    pub fn is_played(&self, line: LineNumber) -> bool {
        self.lines.contains_key(&line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: &str) -> PlayerId {
        PlayerId::parse(id).unwrap()
    }

    #[test]
    fn test_player_id_validation() {
        assert!(PlayerId::parse("alice").is_ok());
        assert_eq!(PlayerId::parse(""), Err(InvalidPlayerId::Empty));
        assert_eq!(PlayerId::parse("   "), Err(InvalidPlayerId::Empty));
        assert_eq!(PlayerId::parse(DRAW), Err(InvalidPlayerId::Reserved));
        assert_eq!(PlayerId::parse("x".repeat(129)), Err(InvalidPlayerId::TooLong));
    }

    #[test]
    fn test_player_id_json_is_plain_string() {
        let json = serde_json::to_string(&player("alice")).unwrap();
        assert_eq!(json, "\"alice\"");
        assert!(serde_json::from_str::<PlayerId>("\"\"").is_err());
    }

    #[test]
    fn test_winner_serialization() {
        assert_eq!(serde_json::to_string(&Winner::Draw).unwrap(), "\"DRAW\"");
        assert_eq!(
            serde_json::to_string(&Winner::Player(player("bob"))).unwrap(),
            "\"bob\""
        );
        let parsed: Winner = serde_json::from_str("\"DRAW\"").unwrap();
        assert_eq!(parsed, Winner::Draw);
    }

    #[test]
    fn test_new_game_first_waiter_moves_first() {
        let game = GameRecord::new(GameId::new_v4(), player("alice"), player("bob"), 42);
        assert_eq!(game.turn, player("alice"));
        assert_eq!(game.phase(), GamePhase::Active);
        assert_eq!(game.created_at, 42);
        assert_eq!(game.turn_started_at, 42);
        assert_eq!(game.closed_boxes(), 0);
    }

    #[test]
    fn test_opponent_and_participants() {
        let game = GameRecord::new(GameId::new_v4(), player("alice"), player("bob"), 0);
        assert_eq!(game.opponent_of(&player("alice")), Some(&player("bob")));
        assert_eq!(game.opponent_of(&player("bob")), Some(&player("alice")));
        assert_eq!(game.opponent_of(&player("carol")), None);
        assert!(!game.is_participant(&player("carol")));
    }

    #[test]
    fn test_leader() {
        let mut game = GameRecord::new(GameId::new_v4(), player("alice"), player("bob"), 0);
        assert_eq!(game.leader(), Winner::Draw);
        game.player2_boxes = 1;
        assert_eq!(game.leader(), Winner::Player(player("bob")));
    }

    #[test]
    fn test_record_field_names() {
        let game = GameRecord::new(GameId::new_v4(), player("alice"), player("bob"), 0);
        let json = serde_json::to_value(&game).unwrap();
        assert!(json.get("player1Boxes").is_some());
        assert!(json.get("turnStartedAt").is_some());
        assert!(json.get("winner").is_none());
    }

    #[test]
    fn test_game_id_parse() {
        let id = GameId::new_v4();
        let parsed: GameId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<GameId>().is_err());
    }
}
