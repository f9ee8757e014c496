//! Command decoding, routing and resubmission handling.

use std::sync::Arc;

use serde_json::json;

use dots_boxes::matchmaking::{CancelDecision, MatchOutcome};
use dots_boxes::{
    CommandEnvelope, CommandError, CommandOutcome, Dispatcher, GameConfig, ManualClock, MemoryStore,
};

fn setup(config: GameConfig) -> (Arc<MemoryStore>, Dispatcher) {
    let store = Arc::new(MemoryStore::from_config(&config));
    let dispatcher = Dispatcher::new(store.clone(), Arc::new(ManualClock::new(0)), &config);
    (store, dispatcher)
}

fn envelope(raw: serde_json::Value) -> CommandEnvelope {
    serde_json::from_value(raw).unwrap()
}

#[tokio::test]
async fn test_unknown_and_malformed_commands() {
    let (store, d) = setup(GameConfig::default());

    let unknown = d.submit(&envelope(json!({"type": "surrender", "params": {}}))).await;
    assert_eq!(unknown, Err(CommandError::UnrecognizedCommand("surrender".into())));

    let no_user = d.submit(&envelope(json!({"type": "match", "params": {}}))).await;
    assert!(matches!(no_user, Err(CommandError::InvalidParams(_))));

    let bad_game = d
        .submit(&envelope(json!({"type": "quit", "params": {"userID": "alice", "gameID": "nope"}})))
        .await;
    assert!(matches!(bad_game, Err(CommandError::InvalidParams(_))));

    let empty_user = d.submit(&envelope(json!({"type": "match", "params": {"userID": ""}}))).await;
    assert!(matches!(empty_user, Err(CommandError::InvalidPlayerId(_))));

    assert_eq!(store.seat().await.occupant, None);
}

#[tokio::test]
async fn test_cancel_match_round_trip() {
    let (store, d) = setup(GameConfig::default());

    d.submit(&envelope(json!({"type": "match", "params": {"userID": "alice"}}))).await.unwrap();
    let cancelled = d
        .submit(&envelope(json!({"type": "cancelMatch", "params": {"userID": "alice"}})))
        .await;
    assert_eq!(cancelled, Ok(CommandOutcome::CancelMatch(CancelDecision::Cancelled)));
    assert_eq!(store.seat().await.occupant, None);
}

#[tokio::test]
async fn test_resubmitted_match_creates_one_game() {
    let (store, d) = setup(GameConfig::default());

    d.submit(&envelope(json!({"type": "match", "params": {"userID": "alice"}}))).await.unwrap();

    let bob = envelope(json!({"commandID": "bob-1", "type": "match", "params": {"userID": "bob"}}));
    let first = d.submit(&bob).await.unwrap();
    let again = d.submit(&bob).await.unwrap();

    assert!(matches!(first, CommandOutcome::Match(MatchOutcome::Paired { .. })));
    assert_eq!(again, first);
    assert_eq!(store.game_count().await, 1);
    assert_eq!(store.seat().await.occupant, None);
}

#[tokio::test]
async fn test_resubmitted_move_applies_once() {
    let (store, d) = setup(GameConfig::default());

    d.submit(&envelope(json!({"type": "match", "params": {"userID": "alice"}}))).await.unwrap();
    let Ok(CommandOutcome::Match(MatchOutcome::Paired { game_id, .. })) =
        d.submit(&envelope(json!({"type": "match", "params": {"userID": "bob"}}))).await
    else {
        panic!("pairing failed");
    };

    let mv = CommandEnvelope::new(
        "move",
        json!({"userID": "alice", "gameID": game_id.to_string(), "line": 9}),
    )
    .with_id("alice-move-1");

    let first = d.submit(&mv).await;
    let replay = d.submit(&mv).await;
    assert!(first.is_ok());
    assert_eq!(replay, first);
    assert_eq!(store.lines(game_id).await.unwrap().len(), 1);

    // Without an id the same command runs again and is rejected.
    let bare = CommandEnvelope { command_id: None, ..mv.clone() };
    assert_eq!(d.submit(&bare).await, Err(CommandError::NotYourTurn));
}

#[tokio::test]
async fn test_command_ids_are_scoped_to_the_player() {
    let (store, d) = setup(GameConfig::default());

    let alice = envelope(json!({"commandID": "1", "type": "match", "params": {"userID": "alice"}}));
    let carol = envelope(json!({"commandID": "1", "type": "match", "params": {"userID": "carol"}}));

    assert_eq!(d.submit(&alice).await, Ok(CommandOutcome::Match(MatchOutcome::Waiting { evicted: None })));
    let paired = d.submit(&carol).await;
    let Ok(CommandOutcome::Match(MatchOutcome::Paired { game_id, ref opponent })) = paired else {
        panic!("carol's command did not run: {:?}", paired);
    };
    assert_eq!(opponent.as_str(), "alice");
    assert!(store.game(game_id).await.is_some());
    assert_eq!(store.seat().await.occupant, None);

    // Each player still gets their own recorded answer back.
    assert_eq!(d.submit(&alice).await, Ok(CommandOutcome::Match(MatchOutcome::Waiting { evicted: None })));
    assert_eq!(d.submit(&carol).await, paired);
}

#[tokio::test]
async fn test_reused_id_for_a_different_command_is_refused() {
    let (store, d) = setup(GameConfig::default());

    let first = envelope(json!({"commandID": "7", "type": "match", "params": {"userID": "alice"}}));
    let other = envelope(json!({"commandID": "7", "type": "cancelMatch", "params": {"userID": "alice"}}));

    d.submit(&first).await.unwrap();
    assert_eq!(d.submit(&other).await, Err(CommandError::CommandIdReused("7".into())));
    assert_eq!(store.seat().await.occupant.as_ref().map(|p| p.as_str()), Some("alice"));
}

#[tokio::test]
async fn test_rejections_are_replayed_too() {
    let (_store, d) = setup(GameConfig::default());

    let bogus = envelope(json!({"commandID": "x", "type": "dance", "params": {}}));
    let first = d.submit(&bogus).await;
    assert_eq!(d.submit(&bogus).await, first);
    assert!(matches!(first, Err(CommandError::UnrecognizedCommand(_))));
}

#[tokio::test]
async fn test_dedup_capacity_bounds_memory() {
    let config = GameConfig { dedup_capacity: 1, ..GameConfig::default() };
    let (_store, d) = setup(config);

    let a = envelope(json!({"commandID": "a", "type": "match", "params": {"userID": "alice"}}));
    let b = envelope(json!({"commandID": "b", "type": "cancelMatch", "params": {"userID": "carol"}}));

    assert_eq!(d.submit(&a).await, Ok(CommandOutcome::Match(MatchOutcome::Waiting { evicted: None })));
    d.submit(&b).await.unwrap();

    // "a" was forgotten, so it executes again: alice is already waiting.
    assert_eq!(d.submit(&a).await, Ok(CommandOutcome::Match(MatchOutcome::Refreshed)));
}
