//! # Dots and Boxes Server
//!
//! Authoritative matchmaking and rules engine for two-player Dots and Boxes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    DOTS AND BOXES SERVER                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Primitives                                │
//! │  ├── clock.rs    - Injectable millisecond clock              │
//! │  └── config.rs   - Tunables from the environment             │
//! │                                                              │
//! │  game/           - Rules (pure, synchronous)                 │
//! │  ├── geometry.rs - Line ↔ box mapping                        │
//! │  ├── state.rs    - Game record, lines, identifiers           │
//! │  ├── rules.rs    - Move validation, closure, turn/win        │
//! │  ├── forfeit.rs  - Quit and timeout arbitration              │
//! │  └── events.rs   - Player notifications                      │
//! │                                                              │
//! │  matchmaking/    - Single-seat rendezvous                    │
//! │  store/          - Versioned documents, optimistic txns      │
//! │  dispatch/       - Command decoding, routing, dedup          │
//! │                                                              │
//! │  network/        - WebSocket edge                            │
//! │  ├── server.rs   - Connection loop                           │
//! │  └── protocol.rs - Frame types                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency
//!
//! Every command is one transaction against one document: the waiting
//! seat, or a single game with its lines. Conflicting writers retry a
//! bounded number of times, then the command fails with a transient error
//! that is safe to resubmit. Notifications commit with the change that
//! caused them.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod dispatch;
pub mod error;
pub mod game;
pub mod matchmaking;
pub mod network;
pub mod store;

// Re-export commonly used types
pub use crate::core::{Clock, GameConfig, ManualClock, Millis, SystemClock};
pub use dispatch::{Command, CommandEnvelope, CommandOutcome, Dispatcher};
pub use error::CommandError;
pub use game::{GameId, GameRecord, Grid, Notification, PlayerId, Winner};
pub use store::MemoryStore;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
