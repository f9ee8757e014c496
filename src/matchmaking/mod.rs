//! Matchmaking Module
//!
//! Two-player rendezvous through a single waiting seat.
//!
//! - `seat`: the seat document and pure match/cancel decisions
//! - `rendezvous`: runs those decisions as seat transactions and creates games

pub mod rendezvous;
pub mod seat;

pub use rendezvous::{MatchOutcome, Matchmaker};
pub use seat::{CancelDecision, SeatDecision, WaitingSeat};
