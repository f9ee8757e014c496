//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket. Every
//! frame is a JSON object tagged by `op`; commands and notifications keep
//! their own `type` field nested inside.

use serde::{Deserialize, Serialize};

use crate::dispatch::{CommandEnvelope, CommandOutcome, CommandResult};
use crate::error::CommandError;
use crate::game::events::Notification;
use crate::game::state::PlayerId;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Run a command.
    Submit {
        /// The command.
        command: CommandEnvelope,
    },

    /// Bind this connection to a player's inbox. The backlog is replayed,
    /// then new notifications are pushed as they commit.
    Subscribe {
        /// Player whose inbox to follow.
        #[serde(rename = "userID")]
        user_id: PlayerId,
    },

    /// Ping for latency measurement.
    Ping {
        /// Client timestamp, echoed back.
        timestamp: u64,
    },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A command succeeded.
    Result {
        /// Echo of the submitted id.
        #[serde(rename = "commandID", skip_serializing_if = "Option::is_none", default)]
        command_id: Option<String>,
        /// What it did.
        outcome: CommandOutcome,
    },

    /// A command was rejected. Nothing changed.
    Rejected {
        /// Echo of the submitted id.
        #[serde(rename = "commandID", skip_serializing_if = "Option::is_none", default)]
        command_id: Option<String>,
        /// Machine-readable reason.
        code: String,
        /// Human-readable reason.
        message: String,
        /// Resubmitting unchanged may succeed.
        transient: bool,
    },

    /// Inbox notification for the subscribed player.
    Notification {
        /// Recipient.
        #[serde(rename = "userID")]
        user_id: PlayerId,
        /// Payload.
        notification: Notification,
    },

    /// Subscription accepted.
    Subscribed {
        /// Player followed.
        #[serde(rename = "userID")]
        user_id: PlayerId,
        /// Backlog notifications that follow.
        backlog: usize,
    },

    /// Pong response.
    Pong {
        /// Echoed client timestamp.
        timestamp: u64,
        /// Server clock in milliseconds.
        server_time: u64,
    },

    /// Frame-level error (unparsable message, overload).
    Error(ServerError),

    /// Server is shutting down.
    Shutdown {
        /// Why.
        reason: String,
    },
}

/// Frame-level error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Frame-level error codes. Command rejections use
/// [`CommandError::code`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Frame is not a valid client message.
    InvalidMessage,
    /// Connection limit reached.
    ServerOverloaded,
    /// Live notifications were dropped for a slow connection.
    FeedLagged,
}

impl ServerMessage {
    /// Reply for a command result.
    pub fn for_result(command_id: Option<String>, result: CommandResult) -> Self {
        match result {
            Ok(outcome) => ServerMessage::Result { command_id, outcome },
            Err(err) => Self::rejected(command_id, &err),
        }
    }

    /// Reply for a command rejection.
    pub fn rejected(command_id: Option<String>, err: &CommandError) -> Self {
        ServerMessage::Rejected {
            command_id,
            code: err.code().to_string(),
            message: err.to_string(),
            transient: err.is_transient(),
        }
    }

    /// Frame-level error.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error(ServerError { code, message: message.into() })
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
