//! Client against a live scrumble-api router on a local port

use scrumble_api::db::{self, EntryInput, MatchupInput};
use scrumble_api::{build_router, AppState};
use scrumble_client::{HttpMatchupApi, RetryPolicy, Session, VoteOutcome};
use scrumble_common::config::TomlConfig;
use scrumble_common::models::{Side, VoteTally};
use scrumble_common::reconcile::VoteStatus;
use scrumble_common::state::FetchOutcome;
use scrumble_common::storage::{DurableStore, MemoryStore, FINGERPRINT_KEY};
use scrumble_common::time;

/// Serve a fresh database holding one active matchup per id; returns the base URL
async fn spawn_server(matchup_ids: &[&str]) -> String {
    let pool = db::connect_in_memory().await.unwrap();
    for id in matchup_ids {
        let left = EntryInput {
            id: format!("{}-l", id),
            name: "Velo".to_string(),
            ..Default::default()
        };
        let right = EntryInput {
            id: format!("{}-r", id),
            name: "Anchor".to_string(),
            ..Default::default()
        };
        let matchup = MatchupInput {
            id: id.to_string(),
            title: "Best Coffee".to_string(),
            category: "Coffee".to_string(),
            active: true,
            ..Default::default()
        };
        db::matchups::save_matchup(&pool, &matchup, &left.id, &right.id, &[&left, &right], time::now())
            .await
            .unwrap();
    }

    let app = build_router(AppState::new(pool, None));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn session(base_url: &str, store: scrumble_common::storage::SharedStore) -> Session<HttpMatchupApi> {
    let api = HttpMatchupApi::new(base_url, RetryPolicy::single_attempt()).unwrap();
    Session::new(api, store, &TomlConfig::default())
}

#[tokio::test]
async fn test_vote_round_trip() {
    let base = spawn_server(&["m1"]).await;
    let mut session = session(&base, MemoryStore::shared());

    assert_eq!(session.refresh().await, FetchOutcome::Applied);
    let views = session.views();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].id, "m1");
    assert_eq!(views[0].status, VoteStatus::Open);
    assert_eq!(views[0].left.name, "Velo");

    let outcome = session.vote("m1", "left").await.unwrap();
    assert!(matches!(outcome, VoteOutcome::Accepted(Side::Left)));
    assert_eq!(session.views()[0].tally, VoteTally::new(1, 0));

    // After a refetch the server's own count replaces the session increment
    assert_eq!(session.refresh().await, FetchOutcome::Applied);
    let views = session.views();
    assert_eq!(views[0].tally, VoteTally::new(1, 0));
    assert_eq!(views[0].status, VoteStatus::Voted(Side::Left));
}

#[tokio::test]
async fn test_same_fingerprint_without_ledger_is_resolved() {
    let base = spawn_server(&["m1"]).await;

    let first_store = MemoryStore::shared();
    let mut first = session(&base, first_store.clone());
    first.refresh().await;
    first.vote("m1", "right").await.unwrap();

    // Another browser profile that shares the fingerprint but lost its ledger
    let second_store = MemoryStore::shared();
    second_store
        .set(FINGERPRINT_KEY, first.fingerprint())
        .unwrap();
    let mut second = session(&base, second_store);
    second.refresh().await;

    let outcome = second.vote("m1", "left").await.unwrap();
    assert!(matches!(outcome, VoteOutcome::Resolved(_)));
    assert_eq!(second.views()[0].status, VoteStatus::Resolved);
    assert_eq!(second.views()[0].tally, VoteTally::new(0, 1));
}

#[tokio::test]
async fn test_listings_and_fresh_browsers() {
    let base = spawn_server(&["m1", "m2"]).await;

    let mut a = session(&base, MemoryStore::shared());
    let mut b = session(&base, MemoryStore::shared());
    a.refresh().await;
    b.refresh().await;
    assert_ne!(a.fingerprint(), b.fingerprint());

    assert!(matches!(a.vote("m2", "left").await.unwrap(), VoteOutcome::Accepted(_)));
    assert!(matches!(b.vote("m2", "left").await.unwrap(), VoteOutcome::Accepted(_)));

    b.refresh().await;
    let views = b.views();
    assert_eq!(views.len(), 2);
    assert_eq!(views[1].tally, VoteTally::new(2, 0));
    assert_eq!((views[1].left_pct, views[1].right_pct), (100, 0));
    assert_eq!(views[0].status, VoteStatus::Open);

    assert!(a.history().await.unwrap().is_empty());
    assert!(a.future().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_server_degrades_to_empty() {
    // Bind then drop to get a port nothing listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut session = session(&format!("http://{}", addr), MemoryStore::shared());
    assert_eq!(session.refresh().await, FetchOutcome::Failed);
    assert!(session.views().is_empty());
    assert!(session.state().last_error().is_some());
}
