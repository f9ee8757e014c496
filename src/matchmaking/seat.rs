//! Waiting Seat
//!
//! The single-slot rendezvous. Decisions here are pure functions over a
//! seat draft; the store makes each one an atomic read-modify-write.

use serde::{Deserialize, Serialize};

use crate::core::clock::Millis;
use crate::game::state::PlayerId;

/// Process-wide waiting slot. At most one occupant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitingSeat {
    /// Waiting player.
    pub occupant: Option<PlayerId>,
    /// When the occupant last proved interest. Meaningless when empty.
    pub since: Millis,
}

impl WaitingSeat {
    /// No one waiting.
    pub fn empty() -> Self {
        Self::default()
    }

    /// `player` waiting since `since`.
    pub fn occupied(player: PlayerId, since: Millis) -> Self {
        Self { occupant: Some(player), since }
    }

    /// How long the occupant has waited.
    pub fn age(&self, now: Millis) -> Option<Millis> {
        self.occupant.as_ref().map(|_| now.saturating_sub(self.since))
    }

    /// Occupied, but not refreshed within `threshold_ms`.
    pub fn is_stale(&self, now: Millis, threshold_ms: Millis) -> bool {
        self.age(now).is_some_and(|age| age > threshold_ms)
    }

    fn clear(&mut self) {
        self.occupant = None;
        self.since = 0;
    }
}

/// What `requestMatch` did to the seat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SeatDecision {
    /// Caller now occupies the seat, possibly after evicting a stale waiter.
    Seated {
        /// Stale occupant that was removed.
        evicted: Option<PlayerId>,
    },
    /// Caller was already waiting; `since` moved to now.
    Refreshed,
    /// Caller paired with the live occupant, who moves first. Seat cleared.
    Paired {
        /// The waiter.
        opponent: PlayerId,
    },
}

/// Apply `requestMatch(player)` to `seat`.
pub fn decide_match(
    seat: &mut WaitingSeat,
    player: &PlayerId,
    now: Millis,
    threshold_ms: Millis,
) -> SeatDecision {
    let stale = seat.is_stale(now, threshold_ms);

    match seat.occupant.take() {
        Some(occupant) if occupant == *player => {
            *seat = WaitingSeat::occupied(occupant, now);
            SeatDecision::Refreshed
        }
        Some(occupant) if !stale => {
            seat.clear();
            SeatDecision::Paired { opponent: occupant }
        }
        evicted => {
            *seat = WaitingSeat::occupied(player.clone(), now);
            SeatDecision::Seated { evicted }
        }
    }
}

/// What `cancelMatch` did to the seat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum CancelDecision {
    /// Caller left the seat.
    Cancelled,
    /// Caller is still recorded but stale; left for the next
    /// `requestMatch` to evict.
    Expired,
    /// Caller was not waiting.
    NotWaiting,
}

/// Apply `cancelMatch(player)` to `seat`.
pub fn decide_cancel(
    seat: &mut WaitingSeat,
    player: &PlayerId,
    now: Millis,
    threshold_ms: Millis,
) -> CancelDecision {
    if seat.occupant.as_ref() != Some(player) {
        return CancelDecision::NotWaiting;
    }
    if seat.is_stale(now, threshold_ms) {
        return CancelDecision::Expired;
    }
    seat.clear();
    CancelDecision::Cancelled
}
