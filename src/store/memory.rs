//! In-Memory Store
//!
//! Process-local backing for the waiting seat, games and player inboxes.
//! Games are kept for the life of the process; each inbox keeps only its
//! newest `inbox_retention` notifications.
//!
//! Lock order: seat → games map → inboxes, and game entry → inboxes.
//! No lock is held while a transaction body runs.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, warn};

use crate::core::config::GameConfig;
use crate::game::events::{Delivery, Notification};
use crate::game::geometry::LineNumber;
use crate::game::state::{GameDocument, GameId, GameRecord, LineRecord, PlayerId};
use crate::matchmaking::seat::WaitingSeat;

use super::{Commit, GameTxn, SeatTxn, StoreError, TxnScope, Versioned};

/// Live delivery channel depth. Slow subscribers lag and fall back to
/// their inbox.
const DELIVERY_CHANNEL_CAPACITY: usize = 1024;

/// Inbox cap used by [`MemoryStore::new`].
pub const DEFAULT_INBOX_RETENTION: usize = 256;

type GameEntry = Arc<Mutex<Versioned<GameDocument>>>;

/// In-memory versioned store.
pub struct MemoryStore {
    /// The single waiting seat.
    seat: Mutex<Versioned<WaitingSeat>>,
    /// Games by id.
    games: RwLock<BTreeMap<GameId, GameEntry>>,
    /// Committed notifications per player, oldest first.
    inboxes: Mutex<BTreeMap<PlayerId, VecDeque<Notification>>>,
    /// Per-inbox cap.
    inbox_retention: usize,
    /// Live feed of committed notifications.
    deliveries: broadcast::Sender<Delivery>,
    /// Attempts before a contended transaction gives up.
    max_attempts: u32,
}

impl MemoryStore {
    /// Empty store. `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32) -> Self {
        let (deliveries, _) = broadcast::channel(DELIVERY_CHANNEL_CAPACITY);
        Self {
            seat: Mutex::new(Versioned::new(WaitingSeat::empty())),
            games: RwLock::new(BTreeMap::new()),
            inboxes: Mutex::new(BTreeMap::new()),
            inbox_retention: DEFAULT_INBOX_RETENTION,
            deliveries,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Keep at most `retention` notifications per inbox (at least 1).
    pub fn with_inbox_retention(mut self, retention: usize) -> Self {
        self.inbox_retention = retention.max(1);
        self
    }

    /// Empty store using the transaction and inbox settings of `config`.
    pub fn from_config(config: &GameConfig) -> Self {
        Self::new(config.max_transaction_attempts).with_inbox_retention(config.inbox_retention)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current waiting seat.
    pub async fn seat(&self) -> WaitingSeat {
        self.seat.lock().await.value.clone()
    }

    /// Game record.
    pub async fn game(&self, id: GameId) -> Option<GameRecord> {
        self.document(id).await.map(|doc| doc.game)
    }

    /// Game record with its lines.
    pub async fn document(&self, id: GameId) -> Option<GameDocument> {
        let entry = self.entry(id).await.ok()?;
        let doc = entry.lock().await.value.clone();
        Some(doc)
    }

    /// Played lines of a game.
    pub async fn lines(&self, id: GameId) -> Option<BTreeMap<LineNumber, LineRecord>> {
        self.document(id).await.map(|doc| doc.lines)
    }

    /// Number of games ever created.
    pub async fn game_count(&self) -> usize {
        self.games.read().await.len()
    }

    /// Ids of games `player` is seated in, in id order.
    pub async fn games_of(&self, player: &PlayerId) -> Vec<GameId> {
        let entries: Vec<(GameId, GameEntry)> = self
            .games
            .read()
            .await
            .iter()
            .map(|(id, entry)| (*id, entry.clone()))
            .collect();

        let mut ids = Vec::new();
        for (id, entry) in entries {
            if entry.lock().await.value.game.is_participant(player) {
                ids.push(id);
            }
        }
        ids
    }

    /// Retained notifications for `player`, oldest first.
    pub async fn inbox(&self, player: &PlayerId) -> Vec<Notification> {
        let inboxes = self.inboxes.lock().await;
        backlog_of(&inboxes, player)
    }

    /// `player`'s backlog plus a live feed starting exactly after it.
    pub async fn follow(&self, player: &PlayerId) -> (Vec<Notification>, broadcast::Receiver<Delivery>) {
        let inboxes = self.inboxes.lock().await;
        (backlog_of(&inboxes, player), self.deliveries.subscribe())
    }

    /// Live feed of notifications committed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Delivery> {
        self.deliveries.subscribe()
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Atomic read-modify-write of the waiting seat.
    ///
    /// `body` may run several times and must only touch the draft. An `Err`
    /// from `body` aborts without writing.
    pub async fn seat_transaction<F, R, E>(&self, mut body: F) -> Result<R, E>
    where
        F: FnMut(&mut SeatTxn) -> Result<R, E>,
        E: From<StoreError>,
    {
        for attempt in 1..=self.max_attempts {
            let snapshot = self.read_seat().await;
            let mut txn = SeatTxn::new(snapshot.value);
            let result = body(&mut txn)?;

            match self.commit_seat(snapshot.version, txn).await? {
                Commit::Applied => return Ok(result),
                Commit::Stale => {
                    debug!(attempt, "Seat transaction lost a race, retrying");
                    tokio::task::yield_now().await;
                }
            }
        }

        warn!(attempts = self.max_attempts, "Seat transaction gave up");
        Err(StoreError::Conflict { scope: TxnScope::Seat, attempts: self.max_attempts }.into())
    }

    /// Atomic read-modify-write of one game and its lines.
    ///
    /// Same contract as [`seat_transaction`](Self::seat_transaction).
    /// Recorded lines must survive unchanged in the draft.
    pub async fn game_transaction<F, R, E>(&self, id: GameId, mut body: F) -> Result<R, E>
    where
        F: FnMut(&mut GameTxn) -> Result<R, E>,
        E: From<StoreError>,
    {
        let entry = self.entry(id).await?;

        for attempt in 1..=self.max_attempts {
            let snapshot = entry.lock().await.clone();
            let mut txn = GameTxn::new(snapshot.value);
            let result = body(&mut txn)?;

            match self.commit_game(&entry, snapshot.version, txn).await? {
                Commit::Applied => return Ok(result),
                Commit::Stale => {
                    debug!(%id, attempt, "Game transaction lost a race, retrying");
                    tokio::task::yield_now().await;
                }
            }
        }

        warn!(%id, attempts = self.max_attempts, "Game transaction gave up");
        Err(StoreError::Conflict { scope: TxnScope::Game(id), attempts: self.max_attempts }.into())
    }

    pub(crate) async fn read_seat(&self) -> Versioned<WaitingSeat> {
        self.seat.lock().await.clone()
    }

    /// Write `txn` if the seat is still at `expected`.
    pub(crate) async fn commit_seat(
        &self,
        expected: u64,
        txn: SeatTxn,
    ) -> Result<Commit, StoreError> {
        let mut seat = self.seat.lock().await;
        if seat.version != expected {
            return Ok(Commit::Stale);
        }

        let SeatTxn { seat: draft, staged_games, outbox } = txn;

        if !staged_games.is_empty() {
            let mut games = self.games.write().await;
            if let Some(doc) = staged_games.iter().find(|doc| games.contains_key(&doc.game.id)) {
                return Err(StoreError::DuplicateGame(doc.game.id));
            }
            for doc in staged_games {
                games.insert(doc.game.id, Arc::new(Mutex::new(Versioned::new(doc))));
            }
        }

        seat.value = draft;
        seat.version += 1;
        self.deliver(outbox).await;
        Ok(Commit::Applied)
    }

    async fn commit_game(
        &self,
        entry: &GameEntry,
        expected: u64,
        txn: GameTxn,
    ) -> Result<Commit, StoreError> {
        let mut current = entry.lock().await;
        if current.version != expected {
            return Ok(Commit::Stale);
        }

        let GameTxn { doc, outbox } = txn;
        let id = current.value.game.id;
        for (line, record) in &current.value.lines {
            if doc.lines.get(line) != Some(record) {
                return Err(StoreError::LineOverwrite { game: id, line: *line });
            }
        }

        current.value = doc;
        current.version += 1;
        self.deliver(outbox).await;
        Ok(Commit::Applied)
    }

    async fn entry(&self, id: GameId) -> Result<GameEntry, StoreError> {
        self.games
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::GameNotFound(id))
    }

    async fn deliver(&self, outbox: Vec<Delivery>) {
        if outbox.is_empty() {
            return;
        }

        let mut inboxes = self.inboxes.lock().await;
        for delivery in outbox {
            let inbox = inboxes.entry(delivery.recipient.clone()).or_default();
            inbox.push_back(delivery.notification.clone());
            if inbox.len() > self.inbox_retention {
                inbox.pop_front();
            }
            // No live subscribers is fine; the inbox holds it.
            let _ = self.deliveries.send(delivery);
        }
    }
}

fn backlog_of(
    inboxes: &BTreeMap<PlayerId, VecDeque<Notification>>,
    player: &PlayerId,
) -> Vec<Notification> {
    inboxes
        .get(player)
        .map(|inbox| inbox.iter().cloned().collect())
        .unwrap_or_default()
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::from_config(&GameConfig::default())
    }
}
