//! Game Logic Module
//!
//! Board geometry and the per-game rules. Pure and synchronous: every
//! function here operates on a draft inside a store transaction.
//!
//! ## Module Structure
//!
//! - `geometry`: line ↔ box mapping for an R×C board
//! - `state`: identifiers, game record, line records
//! - `rules`: move validation, box closure, turn/win state machine
//! - `forfeit`: quit and timeout-claim arbitration
//! - `events`: player notifications

pub mod events;
pub mod forfeit;
pub mod geometry;
pub mod rules;
pub mod state;

// Re-export key types
pub use events::{Delivery, Notification};
pub use forfeit::ForfeitOutcome;
pub use geometry::{BoxIndex, BoxLines, Grid, LineNumber};
pub use rules::MoveOutcome;
pub use state::{EndReason, GameDocument, GameId, GamePhase, GameRecord, LineRecord, PlayerId, Winner};
