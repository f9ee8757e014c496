//! Network Layer
//!
//! WebSocket edge for command ingestion and notification delivery.
//! All state changes go through `dispatch/`; this layer only moves frames.

pub mod protocol;
pub mod server;

pub use protocol::{ClientMessage, ErrorCode, ServerError, ServerMessage};
pub use server::{GameServer, GameServerError, ServerConfig};
