//! Explicitly owned application state
//!
//! `AppState` holds the last accepted server snapshot and the per-session
//! vote bookkeeping. It is owned by one caller and every transition consumes
//! the old value and returns the new one; nothing else mutates it.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::models::{RawMatchup, Side, VoteTally};

/// Identifies one matchup fetch; later fetches get larger tickets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchTicket(u64);

impl FetchTicket {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// What happened to a completed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// New snapshot installed
    Applied,
    /// Data source unavailable; the snapshot is now empty
    Failed,
    /// A newer fetch already completed, so this result was dropped
    Stale,
}

/// Vote progress known only to this session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionVote {
    /// Submitted, waiting for the server
    Pending(Side),
    /// Accepted by the server
    Accepted(Side),
    /// Server refused as duplicate or missing; closed for this session
    Resolved,
}

/// Votes accepted this session, with the newest fetch ticket issued when
/// they were accepted
#[derive(Debug, Clone, Copy, Default)]
struct SessionIncrement {
    tally: VoteTally,
    issued_at: u64,
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    matchups: Vec<RawMatchup>,
    session: BTreeMap<String, SessionVote>,
    increments: BTreeMap<String, SessionIncrement>,
    issued: u64,
    applied: u64,
    last_error: Option<String>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State holding `matchups` as if a fetch had just been applied
    pub fn with_matchups(matchups: Vec<RawMatchup>) -> Self {
        Self {
            matchups,
            ..Self::default()
        }
    }

    /// Current server snapshot
    pub fn matchups(&self) -> &[RawMatchup] {
        &self.matchups
    }

    /// Failure message of the last fetch, cleared by the next success
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn session_vote(&self, matchup_id: &str) -> Option<SessionVote> {
        self.session.get(matchup_id).copied()
    }

    /// Votes accepted this session that the current snapshot does not include
    pub fn session_increment(&self, matchup_id: &str) -> VoteTally {
        self.increments
            .get(matchup_id)
            .map(|increment| increment.tally)
            .unwrap_or_default()
    }

    /// Position and raw data of the matchup with resolved id `matchup_id`
    pub fn find(&self, matchup_id: &str) -> Option<(usize, &RawMatchup)> {
        self.matchups
            .iter()
            .enumerate()
            .find(|(index, raw)| raw.resolved_id(*index) == matchup_id)
    }

    /// Start a fetch
    pub fn begin_fetch(mut self) -> (Self, FetchTicket) {
        self.issued += 1;
        let ticket = FetchTicket(self.issued);
        (self, ticket)
    }

    /// Finish a fetch
    ///
    /// Results older than the last completed fetch are discarded. An applied
    /// snapshot drops the session increments it already counts: those of
    /// votes accepted before this fetch was issued. A failed fetch leaves an
    /// empty snapshot and records the error so the caller can offer a retry.
    pub fn complete_fetch(
        mut self,
        ticket: FetchTicket,
        result: std::result::Result<Vec<RawMatchup>, String>,
    ) -> (Self, FetchOutcome) {
        if ticket.0 <= self.applied {
            debug!(ticket = ticket.0, applied = self.applied, "Discarding stale fetch result");
            return (self, FetchOutcome::Stale);
        }
        self.applied = ticket.0;

        match result {
            Ok(matchups) => {
                debug!(ticket = ticket.0, count = matchups.len(), "Installed matchup snapshot");
                self.matchups = matchups;
                self.increments
                    .retain(|_, increment| increment.issued_at >= ticket.0);
                self.last_error = None;
                (self, FetchOutcome::Applied)
            }
            Err(message) => {
                warn!(ticket = ticket.0, error = %message, "Matchup fetch failed");
                self.matchups = Vec::new();
                self.last_error = Some(message);
                (self, FetchOutcome::Failed)
            }
        }
    }

    /// A vote for `matchup_id` was sent
    pub fn mark_pending(mut self, matchup_id: &str, side: Side) -> Self {
        self.session.insert(matchup_id.to_string(), SessionVote::Pending(side));
        self
    }

    /// The server accepted the vote; count it until the next snapshot
    pub fn accept_vote(mut self, matchup_id: &str, side: Side) -> Self {
        let issued = self.issued;
        let increment = self.increments.entry(matchup_id.to_string()).or_default();
        increment.tally.increment(side);
        increment.issued_at = issued;
        self.session.insert(matchup_id.to_string(), SessionVote::Accepted(side));
        self
    }

    /// The server refused the vote as duplicate or missing
    pub fn resolve_vote(mut self, matchup_id: &str) -> Self {
        self.session.insert(matchup_id.to_string(), SessionVote::Resolved);
        self
    }

    /// The vote could not be delivered; the matchup is open again
    pub fn release_vote(mut self, matchup_id: &str) -> Self {
        if let Some(SessionVote::Pending(_)) = self.session.get(matchup_id) {
            self.session.remove(matchup_id);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchupInfo;

    fn matchup(id: &str, left: u64, right: u64) -> RawMatchup {
        RawMatchup {
            matchup: MatchupInfo {
                id: Some(id.to_string()),
                ..Default::default()
            },
            votes: Some(VoteTally::new(left, right)),
            ..Default::default()
        }
    }

    #[test]
    fn test_newest_completed_fetch_wins() {
        let state = AppState::new();
        let (state, older) = state.begin_fetch();
        let (state, newer) = state.begin_fetch();
        assert!(newer > older);

        let (state, outcome) = state.complete_fetch(newer, Ok(vec![matchup("new", 0, 0)]));
        assert_eq!(outcome, FetchOutcome::Applied);

        let (state, outcome) = state.complete_fetch(older, Ok(vec![matchup("old", 0, 0)]));
        assert_eq!(outcome, FetchOutcome::Stale);
        assert_eq!(state.matchups()[0].resolved_id(0), "new");
    }

    #[test]
    fn test_out_of_order_older_applies_if_first() {
        let (state, first) = AppState::new().begin_fetch();
        let (state, second) = state.begin_fetch();
        let (state, outcome) = state.complete_fetch(first, Ok(vec![matchup("a", 0, 0)]));
        assert_eq!(outcome, FetchOutcome::Applied);
        let (state, outcome) = state.complete_fetch(second, Ok(vec![matchup("b", 0, 0)]));
        assert_eq!(outcome, FetchOutcome::Applied);
        assert_eq!(state.matchups()[0].resolved_id(0), "b");
    }

    #[test]
    fn test_failed_fetch_empties_snapshot() {
        let state = AppState::with_matchups(vec![matchup("m1", 1, 1)]);
        let (state, ticket) = state.begin_fetch();
        let (state, outcome) = state.complete_fetch(ticket, Err("HTTP 503".to_string()));
        assert_eq!(outcome, FetchOutcome::Failed);
        assert!(state.matchups().is_empty());
        assert_eq!(state.last_error(), Some("HTTP 503"));

        let (state, ticket) = state.begin_fetch();
        let (state, _) = state.complete_fetch(ticket, Ok(vec![matchup("m1", 1, 1)]));
        assert_eq!(state.last_error(), None);
    }

    #[test]
    fn test_accept_vote_counts_in_memory() {
        let state = AppState::with_matchups(vec![matchup("m1", 3, 7)])
            .mark_pending("m1", Side::Left)
            .accept_vote("m1", Side::Left);
        assert_eq!(state.session_increment("m1"), VoteTally::new(1, 0));
        assert_eq!(state.matchups()[0].tally(), VoteTally::new(3, 7));
        assert_eq!(state.session_vote("m1"), Some(SessionVote::Accepted(Side::Left)));
    }

    #[test]
    fn test_fresh_snapshot_clears_increments() {
        let state = AppState::with_matchups(vec![matchup("m1", 3, 7)]).accept_vote("m1", Side::Left);
        let (state, ticket) = state.begin_fetch();
        let (state, _) = state.complete_fetch(ticket, Ok(vec![matchup("m1", 4, 7)]));
        assert_eq!(state.session_increment("m1"), VoteTally::default());
        assert_eq!(state.session_vote("m1"), Some(SessionVote::Accepted(Side::Left)));
    }

    #[test]
    fn test_fetch_issued_before_vote_keeps_increment() {
        let state = AppState::with_matchups(vec![matchup("m1", 3, 7)]);
        let (state, in_flight) = state.begin_fetch();
        let state = state.mark_pending("m1", Side::Left).accept_vote("m1", Side::Left);

        // Server answered before it counted the vote
        let (state, outcome) = state.complete_fetch(in_flight, Ok(vec![matchup("m1", 3, 7)]));
        assert_eq!(outcome, FetchOutcome::Applied);
        assert_eq!(state.session_increment("m1"), VoteTally::new(1, 0));

        let (state, later) = state.begin_fetch();
        let (state, _) = state.complete_fetch(later, Ok(vec![matchup("m1", 4, 7)]));
        assert_eq!(state.session_increment("m1"), VoteTally::default());
    }

    #[test]
    fn test_release_only_clears_pending() {
        let state = AppState::new().mark_pending("m1", Side::Left).release_vote("m1");
        assert_eq!(state.session_vote("m1"), None);

        let state = state.resolve_vote("m1").release_vote("m1");
        assert_eq!(state.session_vote("m1"), Some(SessionVote::Resolved));
    }

    #[test]
    fn test_find() {
        let state = AppState::with_matchups(vec![matchup("m1", 0, 0), RawMatchup::default()]);
        assert_eq!(state.find("m1").map(|(i, _)| i), Some(0));
        assert_eq!(state.find("matchup-2").map(|(i, _)| i), Some(1));
        assert!(state.find("nope").is_none());
    }
}
