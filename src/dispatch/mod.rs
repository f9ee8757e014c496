//! Command Dispatcher
//!
//! Routes decoded commands to matchmaking or the game handlers and
//! returns an explicit outcome or rejection for every one of them.
//!
//! ## Module Structure
//!
//! - `command`: wire envelope, kind table, typed commands
//! - `games`: move / quit / claimTimeout handlers
//! - `dedup`: replay cache for resubmitted command ids

pub mod command;
pub mod dedup;
pub mod games;

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::core::clock::Clock;
use crate::core::config::GameConfig;
use crate::error::CommandError;
use crate::game::forfeit::ForfeitOutcome;
use crate::game::rules::MoveOutcome;
use crate::matchmaking::{CancelDecision, MatchOutcome, Matchmaker};
use crate::store::MemoryStore;

pub use command::{Command, CommandEnvelope, CommandKind, GameParams, MoveParams, PlayerParams};
pub use dedup::{Admission, CommandResult, DedupCache, DedupKey};
pub use games::GameService;

/// Successful result of a command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum CommandOutcome {
    /// `match`.
    Match(MatchOutcome),
    /// `cancelMatch`.
    CancelMatch(CancelDecision),
    /// `move`.
    Move(MoveOutcome),
    /// `quit`.
    Quit(ForfeitOutcome),
    /// `claimTimeout`.
    ClaimTimeout(ForfeitOutcome),
}

/// Entry point for every inbound command.
pub struct Dispatcher {
    matchmaker: Matchmaker,
    games: GameService,
    dedup: Mutex<DedupCache>,
}

impl Dispatcher {
    /// Dispatcher over `store`, configured from `config`.
    pub fn new(store: Arc<MemoryStore>, clock: Arc<dyn Clock>, config: &GameConfig) -> Self {
        Self {
            matchmaker: Matchmaker::new(store.clone(), clock.clone(), config.waiting_time_threshold_ms),
            games: GameService::new(store, clock, config.grid(), config.play_time_ms),
            dedup: Mutex::new(DedupCache::new(config.dedup_capacity)),
        }
    }

    /// Decode and run a wire command, honouring its `commandID`.
    ///
    /// Command ids are scoped to the issuing player. Commands that fail to
    /// decode are rejected before the cache is consulted; decoding is
    /// deterministic, so a resubmission gets the same rejection.
    #[instrument(skip(self, envelope), fields(kind = %envelope.kind, id = ?envelope.command_id))]
    pub async fn submit(&self, envelope: &CommandEnvelope) -> CommandResult {
        let command = match envelope.decode() {
            Ok(command) => command,
            Err(err) => return Err(log_rejection(err)),
        };
        let Some(command_id) = envelope.command_id.as_deref() else {
            return self.run(command).await;
        };

        let key = DedupKey::new(command.issuer().clone(), command_id);
        match self.cache().admit(&key, &command) {
            Admission::Fresh => {}
            Admission::Replay(result) => {
                debug!("Replaying recorded result");
                return result;
            }
            Admission::InFlight => {
                return Err(CommandError::DuplicateInFlight(command_id.to_owned()));
            }
            Admission::Mismatch => {
                return Err(log_rejection(CommandError::CommandIdReused(command_id.to_owned())));
            }
        }

        let mut pending = Pending { dispatcher: self, key: &key, done: false };
        let result = self.run(command).await;
        self.cache().complete(&key, &result);
        pending.done = true;
        result
    }

    async fn run(&self, command: Command) -> CommandResult {
        self.execute(command).await.map_err(log_rejection)
    }

    /// Run an already-decoded command. No deduplication.
    pub async fn execute(&self, command: Command) -> CommandResult {
        match command {
            Command::Match(p) => self.matchmaker.request_match(&p.user_id).await.map(CommandOutcome::Match),
            Command::CancelMatch(p) => {
                self.matchmaker.cancel_match(&p.user_id).await.map(CommandOutcome::CancelMatch)
            }
            Command::Move(p) => {
                self.games.make_move(p.game_id, &p.user_id, p.line).await.map(CommandOutcome::Move)
            }
            Command::Quit(p) => self.games.quit(p.game_id, &p.user_id).await.map(CommandOutcome::Quit),
            Command::ClaimTimeout(p) => {
                self.games.claim_timeout(p.game_id, &p.user_id).await.map(CommandOutcome::ClaimTimeout)
            }
        }
    }

    fn cache(&self) -> MutexGuard<'_, DedupCache> {
        // The cache is consistent after every call, so a poisoned lock is usable.
        self.dedup.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn log_rejection(err: CommandError) -> CommandError {
    if err.is_transient() {
        warn!(code = err.code(), "Command failed transiently: {}", err);
    } else {
        debug!(code = err.code(), "Command rejected: {}", err);
    }
    err
}

/// Releases an admitted command id if its future is dropped mid-run.
struct Pending<'a> {
    dispatcher: &'a Dispatcher,
    key: &'a DedupKey,
    done: bool,
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.dispatcher.cache().abandon(self.key);
        }
    }
}
