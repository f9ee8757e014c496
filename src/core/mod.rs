//! Core primitives.
//!
//! Time and configuration shared by every other module.

pub mod clock;
pub mod config;

// Re-export core types
pub use clock::{Clock, ManualClock, Millis, SystemClock};
pub use config::{ConfigError, GameConfig};
