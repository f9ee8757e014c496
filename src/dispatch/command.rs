//! Command Types
//!
//! Wire envelope `{commandID?, type, params}` and the closed set of
//! commands it decodes into. Decoding is two-step: the type string is
//! looked up in [`CommandKind::ALL`], then `params` is parsed for that kind.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CommandError;
use crate::game::state::{GameId, PlayerId};

// =============================================================================
// KINDS
// =============================================================================

/// Known command types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Enter matchmaking.
    Match,
    /// Leave matchmaking.
    CancelMatch,
    /// Play a line.
    Move,
    /// Forfeit a game.
    Quit,
    /// Claim the opponent ran out of time.
    ClaimTimeout,
}

impl CommandKind {
    /// Dispatch table, in wire-name order.
    pub const ALL: [CommandKind; 5] = [
        CommandKind::Match,
        CommandKind::CancelMatch,
        CommandKind::Move,
        CommandKind::Quit,
        CommandKind::ClaimTimeout,
    ];

    /// Wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            CommandKind::Match => "match",
            CommandKind::CancelMatch => "cancelMatch",
            CommandKind::Move => "move",
            CommandKind::Quit => "quit",
            CommandKind::ClaimTimeout => "claimTimeout",
        }
    }

    /// Kind for a wire name. Case-sensitive.
    pub fn lookup(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PARAMS
// =============================================================================

/// `{userID}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerParams {
    /// Issuing player.
    #[serde(rename = "userID")]
    pub user_id: PlayerId,
}

/// `{userID, gameID}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameParams {
    /// Issuing player.
    #[serde(rename = "userID")]
    pub user_id: PlayerId,
    /// Target game.
    #[serde(rename = "gameID")]
    pub game_id: GameId,
}

/// `{userID, gameID, line}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveParams {
    /// Issuing player.
    #[serde(rename = "userID")]
    pub user_id: PlayerId,
    /// Target game.
    #[serde(rename = "gameID")]
    pub game_id: GameId,
    /// 1-based line number. Range-checked against the board, not here.
    pub line: i64,
}

/// A decoded command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "camelCase")]
pub enum Command {
    /// Enter matchmaking.
    Match(PlayerParams),
    /// Leave matchmaking.
    CancelMatch(PlayerParams),
    /// Play a line.
    Move(MoveParams),
    /// Forfeit a game.
    Quit(GameParams),
    /// Claim the opponent ran out of time.
    ClaimTimeout(GameParams),
}

impl Command {
    /// Kind of this command.
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Match(_) => CommandKind::Match,
            Command::CancelMatch(_) => CommandKind::CancelMatch,
            Command::Move(_) => CommandKind::Move,
            Command::Quit(_) => CommandKind::Quit,
            Command::ClaimTimeout(_) => CommandKind::ClaimTimeout,
        }
    }

    /// Issuing player.
    pub fn issuer(&self) -> &PlayerId {
        match self {
            Command::Match(p) | Command::CancelMatch(p) => &p.user_id,
            Command::Move(p) => &p.user_id,
            Command::Quit(p) | Command::ClaimTimeout(p) => &p.user_id,
        }
    }
}

// =============================================================================
// ENVELOPE
// =============================================================================

/// Command as received.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Client-chosen id for deduplicating resubmissions.
    #[serde(rename = "commandID", default, skip_serializing_if = "Option::is_none")]
    pub command_id: Option<String>,
    /// Command type name.
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific parameters.
    #[serde(default)]
    pub params: Value,
}

impl CommandEnvelope {
    /// Envelope without a command id.
    pub fn new(kind: impl Into<String>, params: Value) -> Self {
        Self { command_id: None, kind: kind.into(), params }
    }

    /// Attach a deduplication id.
    pub fn with_id(mut self, command_id: impl Into<String>) -> Self {
        self.command_id = Some(command_id.into());
        self
    }

    /// Resolve the type and parse the params.
    ///
    /// A `userID` that is present but not a valid id is reported as
    /// [`CommandError::InvalidPlayerId`]; any other shape problem is
    /// [`CommandError::InvalidParams`].
    pub fn decode(&self) -> Result<Command, CommandError> {
        let kind = CommandKind::lookup(&self.kind)
            .ok_or_else(|| CommandError::UnrecognizedCommand(self.kind.clone()))?;

        if let Some(Value::String(raw)) = self.params.get("userID") {
            PlayerId::parse(raw.as_str())?;
        }

        let params = self.params.clone();
        Ok(match kind {
            CommandKind::Match => Command::Match(parse(params)?),
            CommandKind::CancelMatch => Command::CancelMatch(parse(params)?),
            CommandKind::Move => Command::Move(parse(params)?),
            CommandKind::Quit => Command::Quit(parse(params)?),
            CommandKind::ClaimTimeout => Command::ClaimTimeout(parse(params)?),
        })
    }
}

fn parse<T: DeserializeOwned>(params: Value) -> Result<T, CommandError> {
    serde_json::from_value(params).map_err(|e| CommandError::InvalidParams(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::InvalidPlayerId;
    use serde_json::json;

    #[test]
    fn test_lookup_table_matches_wire_names() {
        for kind in CommandKind::ALL {
            assert_eq!(CommandKind::lookup(kind.as_str()), Some(kind));
        }
        assert_eq!(CommandKind::lookup("Match"), None);
        assert_eq!(CommandKind::lookup("resign"), None);
    }

    #[test]
    fn test_decode_move() {
        let id = GameId::new_v4();
        let envelope: CommandEnvelope = serde_json::from_value(json!({
            "commandID": "c-1",
            "type": "move",
            "params": {"userID": "alice", "gameID": id.to_string(), "line": 20}
        }))
        .unwrap();

        assert_eq!(envelope.command_id.as_deref(), Some("c-1"));
        let command = envelope.decode().unwrap();
        assert_eq!(command.kind(), CommandKind::Move);
        assert_eq!(
            command,
            Command::Move(MoveParams {
                user_id: PlayerId::parse("alice").unwrap(),
                game_id: id,
                line: 20,
            })
        );
    }

    #[test]
    fn test_unknown_type() {
        let envelope = CommandEnvelope::new("resign", json!({"userID": "alice"}));
        assert_eq!(
            envelope.decode(),
            Err(CommandError::UnrecognizedCommand("resign".into()))
        );
    }

    #[test]
    fn test_bad_params() {
        let missing = CommandEnvelope::new("quit", json!({"userID": "alice"}));
        assert!(matches!(missing.decode(), Err(CommandError::InvalidParams(_))));

        let no_params = CommandEnvelope::new("match", Value::Null);
        assert!(matches!(no_params.decode(), Err(CommandError::InvalidParams(_))));

        let not_a_string = CommandEnvelope::new("match", json!({"userID": 7}));
        assert!(matches!(not_a_string.decode(), Err(CommandError::InvalidParams(_))));

        let fractional = CommandEnvelope::new(
            "move",
            json!({"userID": "alice", "gameID": GameId::new_v4().to_string(), "line": 1.5}),
        );
        assert!(matches!(fractional.decode(), Err(CommandError::InvalidParams(_))));
    }

    #[test]
    fn test_bad_player_id() {
        let reserved = CommandEnvelope::new("match", json!({"userID": "DRAW"}));
        assert_eq!(
            reserved.decode(),
            Err(CommandError::InvalidPlayerId(InvalidPlayerId::Reserved))
        );

        let blank = CommandEnvelope::new(
            "quit",
            json!({"userID": "  ", "gameID": GameId::new_v4().to_string()}),
        );
        assert_eq!(blank.decode(), Err(CommandError::InvalidPlayerId(InvalidPlayerId::Empty)));
    }

    #[test]
    fn test_out_of_range_line_still_decodes() {
        let envelope = CommandEnvelope::new(
            "move",
            json!({"userID": "alice", "gameID": GameId::new_v4().to_string(), "line": -3}),
        );
        assert!(matches!(envelope.decode(), Ok(Command::Move(MoveParams { line: -3, .. }))));
    }
}
