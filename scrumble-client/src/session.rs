//! Client session
//!
//! A `Session` owns the application state and the per-browser stores and is
//! the only thing that moves the state forward. Reconciliation reads from it;
//! the vote flow and fetches replace its state through explicit transitions.

use tracing::{debug, info, warn};

use scrumble_common::config::TomlConfig;
use scrumble_common::fingerprint::FingerprintStore;
use scrumble_common::ledger::VoteLedger;
use scrumble_common::models::{HistoryItem, RawMatchup, Side, VoteReceipt, VoteRequest};
use scrumble_common::overrides::OverrideStore;
use scrumble_common::reconcile::{MatchupView, Reconciler};
use scrumble_common::seed::SeedGenerator;
use scrumble_common::state::{AppState, FetchOutcome, FetchTicket, SessionVote};
use scrumble_common::storage::SharedStore;
use scrumble_common::{Error, Result};

use crate::api::{ApiError, MatchupApi};

/// Result of a vote attempt
#[derive(Debug)]
pub enum VoteOutcome {
    /// Server counted the vote
    Accepted(Side),
    /// This browser already voted, or the server already closed the matchup
    /// for it; nothing was sent
    AlreadyVoted,
    /// A vote for this matchup is still waiting for the server
    InFlight,
    /// Server refused as duplicate or missing; closed for the session
    Resolved(String),
    /// Could not reach the server; the matchup is open again
    Failed(ApiError),
}

/// First half of a vote: either a request to send or an early answer
#[derive(Debug)]
pub enum VoteStart {
    Send(VoteRequest),
    Done(VoteOutcome),
}

pub struct Session<A> {
    api: A,
    state: AppState,
    ledger: VoteLedger,
    overrides: OverrideStore,
    seeds: SeedGenerator,
    fingerprint: String,
}

impl<A: MatchupApi> Session<A> {
    /// Open the per-browser stores on `store` and start with an empty snapshot
    pub fn new(api: A, store: SharedStore, config: &TomlConfig) -> Self {
        let fingerprint = FingerprintStore::new(store.clone()).get_or_create();
        debug!(fingerprint = %fingerprint, "Session opened");
        Self {
            api,
            state: AppState::new(),
            ledger: VoteLedger::open(store.clone()),
            overrides: OverrideStore::open(store.clone(), config.overrides.clone()),
            seeds: SeedGenerator::open(store, config.seed_votes),
            fingerprint,
        }
    }

    /// Replace the seed generator (tests pin its random source)
    pub fn with_seeds(mut self, seeds: SeedGenerator) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn ledger(&self) -> &VoteLedger {
        &self.ledger
    }

    pub fn overrides(&self) -> &OverrideStore {
        &self.overrides
    }

    pub fn overrides_mut(&mut self) -> &mut OverrideStore {
        &mut self.overrides
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Render-ready view of the current snapshot
    pub fn views(&mut self) -> Vec<MatchupView> {
        Reconciler::new(&self.ledger, &self.overrides, &mut self.seeds).reconcile(&self.state)
    }

    fn transition<T>(&mut self, f: impl FnOnce(AppState) -> (AppState, T)) -> T {
        let (state, out) = f(std::mem::take(&mut self.state));
        self.state = state;
        out
    }

    fn update(&mut self, f: impl FnOnce(AppState) -> AppState) {
        self.state = f(std::mem::take(&mut self.state));
    }

    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.transition(AppState::begin_fetch)
    }

    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: std::result::Result<Vec<RawMatchup>, ApiError>,
    ) -> FetchOutcome {
        let result = result.map_err(|e| e.to_string());
        self.transition(|state| state.complete_fetch(ticket, result))
    }

    /// Fetch the active matchups and install them
    pub async fn refresh(&mut self) -> FetchOutcome {
        let ticket = self.begin_fetch();
        let result = self.api.fetch_matchups().await;
        let outcome = self.complete_fetch(ticket, result);
        info!(ticket = ticket.id(), ?outcome, "Refresh finished");
        outcome
    }

    /// Vote for `side` (`"left"` or `"right"`) on `matchup_id`
    pub async fn vote(&mut self, matchup_id: &str, side: &str) -> Result<VoteOutcome> {
        let side: Side = side.parse()?;
        self.vote_side(matchup_id, side).await
    }

    pub async fn vote_side(&mut self, matchup_id: &str, side: Side) -> Result<VoteOutcome> {
        let request = match self.begin_vote(matchup_id, side)? {
            VoteStart::Send(request) => request,
            VoteStart::Done(outcome) => return Ok(outcome),
        };
        let result = self.api.submit_vote(&request).await;
        Ok(self.finish_vote(matchup_id, side, result))
    }

    /// Check the vote locally and, if it may go out, mark it pending
    ///
    /// Returns an error for a matchup not in the current snapshot. No
    /// network call is made here.
    pub fn begin_vote(&mut self, matchup_id: &str, side: Side) -> Result<VoteStart> {
        if let Some(recorded) = self.ledger.voted_side(matchup_id) {
            debug!(matchup_id, recorded = %recorded, "Already voted, not sending");
            return Ok(VoteStart::Done(VoteOutcome::AlreadyVoted));
        }

        match self.state.session_vote(matchup_id) {
            Some(SessionVote::Pending(_)) => return Ok(VoteStart::Done(VoteOutcome::InFlight)),
            Some(SessionVote::Accepted(_)) | Some(SessionVote::Resolved) => {
                return Ok(VoteStart::Done(VoteOutcome::AlreadyVoted));
            }
            None => {}
        }

        if self.state.find(matchup_id).is_none() {
            return Err(Error::InvalidInput(format!("Unknown matchup: {}", matchup_id)));
        }

        self.update(|state| state.mark_pending(matchup_id, side));
        Ok(VoteStart::Send(VoteRequest {
            matchup_id: matchup_id.to_string(),
            side,
            fingerprint: self.fingerprint.clone(),
        }))
    }

    /// Apply the server's answer to a pending vote
    pub fn finish_vote(
        &mut self,
        matchup_id: &str,
        side: Side,
        result: std::result::Result<VoteReceipt, ApiError>,
    ) -> VoteOutcome {
        let result = result.and_then(|receipt| {
            if receipt.success {
                Ok(receipt)
            } else {
                Err(ApiError::Status {
                    status: 200,
                    message: "vote not accepted".to_string(),
                })
            }
        });

        match result {
            Ok(_) => {
                self.update(|state| state.accept_vote(matchup_id, side));
                self.ledger.record_vote(matchup_id, side);
                info!(matchup_id, side = %side, "Vote recorded");
                VoteOutcome::Accepted(side)
            }
            Err(ApiError::Conflict(reason)) | Err(ApiError::NotFound(reason)) => {
                self.update(|state| state.resolve_vote(matchup_id));
                info!(matchup_id, reason = %reason, "Server closed matchup for this browser");
                VoteOutcome::Resolved(reason)
            }
            Err(e) => {
                self.update(|state| state.release_vote(matchup_id));
                warn!(matchup_id, error = %e, "Vote failed");
                VoteOutcome::Failed(e)
            }
        }
    }

    pub async fn history(&self) -> std::result::Result<Vec<HistoryItem>, ApiError> {
        self.api.history().await
    }

    pub async fn future(&self) -> std::result::Result<Vec<HistoryItem>, ApiError> {
        self.api.future().await
    }
}
