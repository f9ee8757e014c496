//! Matchmaking through the dispatcher: timelines, staleness and races.

use std::sync::Arc;

use dots_boxes::matchmaking::{MatchOutcome, Matchmaker, WaitingSeat};
use dots_boxes::{Clock, ManualClock, MemoryStore, Notification, PlayerId};

const THRESHOLD_MS: u64 = 10_000;

fn player(id: &str) -> PlayerId {
    PlayerId::parse(id).unwrap()
}

fn setup(start: u64) -> (Arc<MemoryStore>, Arc<ManualClock>, Matchmaker) {
    let store = Arc::new(MemoryStore::new(5));
    let clock = Arc::new(ManualClock::new(start));
    let matchmaker = Matchmaker::new(store.clone(), clock.clone(), THRESHOLD_MS);
    (store, clock, matchmaker)
}

#[tokio::test]
async fn test_alice_bob_carol_timeline() {
    let t0 = 1_700_000_000_000;
    let (store, clock, mm) = setup(t0);

    let alice = mm.request_match(&player("alice")).await.unwrap();
    assert_eq!(alice, MatchOutcome::Waiting { evicted: None });
    assert_eq!(store.seat().await, WaitingSeat::occupied(player("alice"), t0));

    clock.set(t0 + 5_000);
    let bob = mm.request_match(&player("bob")).await.unwrap();
    let MatchOutcome::Paired { game_id, opponent } = bob else {
        panic!("bob should pair, got {:?}", bob);
    };
    assert_eq!(opponent, player("alice"));
    assert_eq!(store.seat().await, WaitingSeat::empty());

    let game = store.game(game_id).await.unwrap();
    assert_eq!((game.player1.as_str(), game.player2.as_str()), ("alice", "bob"));
    assert_eq!(game.turn, player("alice"));

    clock.set(t0 + 20_000);
    let carol = mm.request_match(&player("carol")).await.unwrap();
    assert_eq!(carol, MatchOutcome::Waiting { evicted: None });
    assert_eq!(store.seat().await, WaitingSeat::occupied(player("carol"), t0 + 20_000));
    assert_eq!(store.game_count().await, 1);

    for name in ["alice", "bob"] {
        let inbox = store.inbox(&player(name)).await;
        assert!(matches!(
            inbox.as_slice(),
            [Notification::NewGame { game_id: id, .. }] if *id == game_id
        ));
    }
}

#[tokio::test]
async fn test_stale_waiter_never_gets_a_game() {
    let (store, clock, mm) = setup(0);

    mm.request_match(&player("alice")).await.unwrap();
    clock.advance(THRESHOLD_MS + 1);

    let outcome = mm.request_match(&player("bob")).await.unwrap();
    assert_eq!(outcome, MatchOutcome::Waiting { evicted: Some(player("alice")) });

    clock.advance(1_000);
    let outcome = mm.request_match(&player("carol")).await.unwrap();
    assert!(matches!(outcome, MatchOutcome::Paired { ref opponent, .. } if *opponent == player("bob")));

    assert_eq!(store.game_count().await, 1);
    assert!(store.games_of(&player("alice")).await.is_empty());
    assert_eq!(store.inbox(&player("alice")).await, vec![Notification::WaitExpired]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_pair_exactly_once() {
    for round in 0..50 {
        let (store, _clock, mm) = setup(round);
        let mm = Arc::new(mm);

        let a = {
            let mm = mm.clone();
            tokio::spawn(async move { mm.request_match(&player("alice")).await })
        };
        let b = {
            let mm = mm.clone();
            tokio::spawn(async move { mm.request_match(&player("bob")).await })
        };

        let outcomes = [a.await.unwrap().unwrap(), b.await.unwrap().unwrap()];
        let paired = outcomes
            .iter()
            .filter(|o| matches!(o, MatchOutcome::Paired { .. }))
            .count();
        let waiting = outcomes
            .iter()
            .filter(|o| matches!(o, MatchOutcome::Waiting { evicted: None }))
            .count();

        assert_eq!((paired, waiting), (1, 1), "round {}", round);
        assert_eq!(store.game_count().await, 1, "round {}", round);
        assert_eq!(store.seat().await, WaitingSeat::empty(), "round {}", round);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_players_pair_off() {
    let store = Arc::new(MemoryStore::new(64));
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
    let mm = Arc::new(Matchmaker::new(store.clone(), clock, THRESHOLD_MS));

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let mm = mm.clone();
            tokio::spawn(async move { mm.request_match(&player(&format!("p{}", i))).await })
        })
        .collect();

    let mut paired = 0;
    for handle in handles {
        if let MatchOutcome::Paired { .. } = handle.await.unwrap().unwrap() {
            paired += 1;
        }
    }

    // Every pairing consumed exactly one waiter; nobody was left stale.
    assert_eq!(paired, 10);
    assert_eq!(store.game_count().await, 10);
    assert_eq!(store.seat().await, WaitingSeat::empty());
}
