//! Session vote flow and fetch handling against a scripted API

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use scrumble_client::session::VoteStart;
use scrumble_client::{ApiError, MatchupApi, Session, VoteOutcome};
use scrumble_common::config::TomlConfig;
use scrumble_common::ledger::VoteLedger;
use scrumble_common::models::{Entry, HistoryItem, MatchupInfo, RawMatchup, Side, VoteReceipt, VoteRequest, VoteTally};
use scrumble_common::reconcile::{SideState, VoteStatus};
use scrumble_common::state::FetchOutcome;
use scrumble_common::storage::{MemoryStore, SharedStore};

/// API double that serves a fixed snapshot and answers votes from a script
#[derive(Default)]
struct ScriptedApi {
    matchups: Mutex<Vec<RawMatchup>>,
    fetch_fails: Mutex<bool>,
    vote_replies: Mutex<VecDeque<Result<VoteReceipt, ApiError>>>,
    fetch_calls: AtomicUsize,
    vote_calls: AtomicUsize,
}

impl ScriptedApi {
    fn serving(matchups: Vec<RawMatchup>) -> Self {
        Self {
            matchups: Mutex::new(matchups),
            ..Default::default()
        }
    }

    fn reply(&self, reply: Result<VoteReceipt, ApiError>) {
        self.vote_replies.lock().unwrap().push_back(reply);
    }

    fn set_matchups(&self, matchups: Vec<RawMatchup>) {
        *self.matchups.lock().unwrap() = matchups;
    }

    fn votes_sent(&self) -> usize {
        self.vote_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MatchupApi for ScriptedApi {
    async fn fetch_matchups(&self) -> Result<Vec<RawMatchup>, ApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fetch_fails.lock().unwrap() {
            return Err(ApiError::Network("connection refused".to_string()));
        }
        Ok(self.matchups.lock().unwrap().clone())
    }

    async fn submit_vote(&self, _vote: &VoteRequest) -> Result<VoteReceipt, ApiError> {
        self.vote_calls.fetch_add(1, Ordering::SeqCst);
        self.vote_replies.lock().unwrap().pop_front().unwrap_or(Ok(VoteReceipt {
            success: true,
            votes: None,
        }))
    }

    async fn history(&self) -> Result<Vec<HistoryItem>, ApiError> {
        Ok(Vec::new())
    }

    async fn future(&self) -> Result<Vec<HistoryItem>, ApiError> {
        Ok(Vec::new())
    }
}

fn matchup(id: &str, left: u64, right: u64) -> RawMatchup {
    RawMatchup {
        matchup: MatchupInfo {
            id: Some(id.to_string()),
            title: Some("Best Coffee".to_string()),
            category: Some("Coffee".to_string()),
            ..Default::default()
        },
        left: Entry {
            name: Some("Velo".to_string()),
            ..Default::default()
        },
        right: Entry {
            name: Some("Anchor".to_string()),
            ..Default::default()
        },
        votes: Some(VoteTally::new(left, right)),
    }
}

async fn loaded(api: ScriptedApi, store: SharedStore) -> Session<ScriptedApi> {
    let mut session = Session::new(api, store, &TomlConfig::default());
    assert_eq!(session.refresh().await, FetchOutcome::Applied);
    session
}

#[tokio::test]
async fn test_accepted_vote_updates_view_and_ledger() {
    let store = MemoryStore::shared();
    let mut session = loaded(ScriptedApi::serving(vec![matchup("m1", 3, 7)]), store.clone()).await;

    let views = session.views();
    let view = &views[0];
    assert_eq!((view.left_pct, view.right_pct), (30, 70));
    assert!(view.controls_enabled());

    let outcome = session.vote("m1", "left").await.unwrap();
    assert!(matches!(outcome, VoteOutcome::Accepted(Side::Left)));
    assert_eq!(session.api().votes_sent(), 1);

    let views = session.views();
    let view = &views[0];
    assert_eq!(view.tally, VoteTally::new(4, 7));
    assert_eq!(view.status, VoteStatus::Voted(Side::Left));
    assert!(!view.controls_enabled());
    assert_eq!(view.left.state, SideState::Selected);
    assert_eq!(view.right.state, SideState::Dimmed);

    // Ledger is durable
    assert_eq!(VoteLedger::open(store).voted_side("m1"), Some(Side::Left));
}

#[tokio::test]
async fn test_ledgered_matchup_makes_no_network_call() {
    let store = MemoryStore::shared();
    VoteLedger::open(store.clone()).record_vote("m1", Side::Left);
    let mut session = loaded(ScriptedApi::serving(vec![matchup("m1", 3, 7)]), store).await;

    let outcome = session.vote("m1", "right").await.unwrap();
    assert!(matches!(outcome, VoteOutcome::AlreadyVoted));
    assert_eq!(session.api().votes_sent(), 0);
    assert_eq!(session.views()[0].status, VoteStatus::Voted(Side::Left));
}

#[tokio::test]
async fn test_second_vote_while_pending_is_in_flight() {
    let mut session = loaded(ScriptedApi::serving(vec![matchup("m1", 0, 0)]), MemoryStore::shared()).await;

    let request = match session.begin_vote("m1", Side::Right).unwrap() {
        VoteStart::Send(request) => request,
        VoteStart::Done(outcome) => panic!("expected a request, got {:?}", outcome),
    };
    assert_eq!(request.matchup_id, "m1");
    assert_eq!(request.fingerprint, session.fingerprint());
    assert_eq!(session.views()[0].status, VoteStatus::Pending);
    assert!(!session.views()[0].controls_enabled());

    assert!(matches!(
        session.begin_vote("m1", Side::Left).unwrap(),
        VoteStart::Done(VoteOutcome::InFlight)
    ));

    let outcome = session.finish_vote(
        "m1",
        Side::Right,
        Ok(VoteReceipt {
            success: true,
            votes: Some(VoteTally::new(0, 1)),
        }),
    );
    assert!(matches!(outcome, VoteOutcome::Accepted(Side::Right)));
    assert_eq!(session.views()[0].tally, VoteTally::new(0, 1));
}

#[tokio::test]
async fn test_conflict_resolves_without_ledger_entry() {
    let api = ScriptedApi::serving(vec![matchup("m1", 2, 2)]);
    api.reply(Err(ApiError::Conflict("Already voted".to_string())));
    let store = MemoryStore::shared();
    let mut session = loaded(api, store.clone()).await;

    let outcome = session.vote("m1", "left").await.unwrap();
    assert!(matches!(outcome, VoteOutcome::Resolved(ref reason) if reason == "Already voted"));

    let views = session.views();
    let view = &views[0];
    assert_eq!(view.status, VoteStatus::Resolved);
    assert!(view.results_visible());
    assert_eq!(view.tally, VoteTally::new(2, 2));
    assert!(!VoteLedger::open(store).has_voted("m1"));

    // Closed for the rest of the session
    let again = session.vote("m1", "right").await.unwrap();
    assert!(matches!(again, VoteOutcome::AlreadyVoted));
    assert_eq!(session.api().votes_sent(), 1);
}

#[tokio::test]
async fn test_transient_failure_reopens_matchup() {
    let api = ScriptedApi::serving(vec![matchup("m1", 1, 1)]);
    api.reply(Err(ApiError::Timeout));
    let mut session = loaded(api, MemoryStore::shared()).await;

    let outcome = session.vote("m1", "left").await.unwrap();
    assert!(matches!(outcome, VoteOutcome::Failed(ApiError::Timeout)));
    assert_eq!(session.views()[0].status, VoteStatus::Open);
    assert!(!session.ledger().has_voted("m1"));

    let retry = session.vote("m1", "left").await.unwrap();
    assert!(matches!(retry, VoteOutcome::Accepted(Side::Left)));
    assert_eq!(session.api().votes_sent(), 2);
}

#[tokio::test]
async fn test_unsuccessful_receipt_is_a_failure() {
    let api = ScriptedApi::serving(vec![matchup("m1", 0, 0)]);
    api.reply(Ok(VoteReceipt {
        success: false,
        votes: None,
    }));
    let mut session = loaded(api, MemoryStore::shared()).await;

    let outcome = session.vote("m1", "left").await.unwrap();
    assert!(matches!(outcome, VoteOutcome::Failed(_)));
    assert_eq!(session.views()[0].status, VoteStatus::Open);
}

#[tokio::test]
async fn test_invalid_votes_rejected_locally() {
    let mut session = loaded(ScriptedApi::serving(vec![matchup("m1", 0, 0)]), MemoryStore::shared()).await;

    assert!(session.vote("m1", "middle").await.is_err());
    assert!(session.vote("unknown", "left").await.is_err());
    assert_eq!(session.api().votes_sent(), 0);
}

#[tokio::test]
async fn test_stale_fetch_discarded() {
    let api = ScriptedApi::serving(Vec::new());
    let mut session = Session::new(api, MemoryStore::shared(), &TomlConfig::default());

    let older = session.begin_fetch();
    let newer = session.begin_fetch();
    assert_eq!(session.complete_fetch(newer, Ok(vec![matchup("new", 0, 0)])), FetchOutcome::Applied);
    assert_eq!(session.complete_fetch(older, Ok(vec![matchup("old", 0, 0)])), FetchOutcome::Stale);

    let views = session.views();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].id, "new");
}

#[tokio::test]
async fn test_failed_refresh_clears_snapshot() {
    let mut session = loaded(ScriptedApi::serving(vec![matchup("m1", 0, 0)]), MemoryStore::shared()).await;
    assert_eq!(session.views().len(), 1);

    *session.api().fetch_fails.lock().unwrap() = true;
    assert_eq!(session.refresh().await, FetchOutcome::Failed);
    assert!(session.views().is_empty());
    assert!(session.state().last_error().is_some());
    assert_eq!(session.api().fetch_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_refresh_drops_session_increment() {
    let mut session = loaded(ScriptedApi::serving(vec![matchup("m1", 3, 7)]), MemoryStore::shared()).await;
    session.vote("m1", "left").await.unwrap();
    assert_eq!(session.views()[0].tally, VoteTally::new(4, 7));

    // Server now reports the counted vote itself
    session.api().set_matchups(vec![matchup("m1", 4, 7)]);
    assert_eq!(session.refresh().await, FetchOutcome::Applied);

    let views = session.views();
    let view = &views[0];
    assert_eq!(view.tally, VoteTally::new(4, 7));
    assert_eq!(view.status, VoteStatus::Voted(Side::Left));
}

#[tokio::test]
async fn test_fetch_spanning_vote_keeps_vote_in_tally() {
    let mut session = loaded(ScriptedApi::serving(vec![matchup("m1", 3, 7)]), MemoryStore::shared()).await;

    let ticket = session.begin_fetch();
    let outcome = session.vote("m1", "left").await.unwrap();
    assert!(matches!(outcome, VoteOutcome::Accepted(Side::Left)));

    // Snapshot taken before the server counted the vote
    let outcome = session.complete_fetch(ticket, Ok(vec![matchup("m1", 3, 7)]));
    assert_eq!(outcome, FetchOutcome::Applied);

    let views = session.views();
    assert_eq!(views[0].status, VoteStatus::Voted(Side::Left));
    assert_eq!(views[0].tally, VoteTally::new(4, 7));
}

#[tokio::test]
async fn test_fingerprint_survives_new_session() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let first = Session::new(ScriptedApi::default(), store.clone(), &TomlConfig::default());
    let second = Session::new(ScriptedApi::default(), store, &TomlConfig::default());
    assert_eq!(first.fingerprint(), second.fingerprint());
}
