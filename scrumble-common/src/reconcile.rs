//! Reconciliation of server data with local per-browser state
//!
//! Every render starts from the raw snapshot in [`AppState`] and rebuilds the
//! view model in a fixed order:
//!
//! 1. resolve the matchup id (server id, else positional fallback)
//! 2. raw tally, replaced by a seed tally when the seeding policy applies
//! 3. override bundle (votes and display fields, field by field)
//! 4. votes accepted during this session
//! 5. vote status from the ledger and session state, then percentages
//! 6. collision-free anchor
//!
//! Nothing here talks to the network. Storage failures inside the seed
//! generator only cost persistence.

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::anchor::{normalize_key, AnchorAllocator};
use crate::ledger::VoteLedger;
use crate::models::{Entry, MatchupInfo, RawMatchup, Side, VoteTally};
use crate::overrides::OverrideStore;
use crate::seed::SeedGenerator;
use crate::state::{AppState, SessionVote};
use crate::time::time_remaining;

/// Where a matchup stands for this browser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteStatus {
    /// Accepting a vote
    Open,
    /// Vote sent, waiting for the server
    Pending,
    /// This browser chose `side`
    Voted(Side),
    /// Server refused the vote; closed for the session without a side
    Resolved,
}

/// How one side of a matchup is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideState {
    Neutral,
    Selected,
    Dimmed,
}

/// Render-ready contestant
#[derive(Debug, Clone, PartialEq)]
pub struct EntryView {
    pub id: Option<String>,
    pub name: String,
    /// Neighborhood, else blurb, else empty
    pub subtitle: String,
    pub tag: String,
    pub image_url: Option<String>,
    pub url: Option<String>,
    pub state: SideState,
}

impl EntryView {
    fn from_entry(entry: Entry, state: SideState) -> Self {
        let subtitle = entry
            .neighborhood
            .filter(|s| !s.trim().is_empty())
            .or(entry.blurb)
            .unwrap_or_default();
        Self {
            id: entry.id,
            name: entry
                .name
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "TBD".to_string()),
            subtitle,
            tag: entry
                .tag
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "Local".to_string()),
            image_url: entry.image_url,
            url: entry.url,
            state,
        }
    }
}

/// Render-ready matchup
#[derive(Debug, Clone, PartialEq)]
pub struct MatchupView {
    /// Position in the server snapshot
    pub index: usize,
    /// Resolved id used for voting, overrides and the ledger
    pub id: String,
    /// Unique within one reconciliation
    pub anchor: String,
    /// Header fields after display overrides
    pub info: MatchupInfo,
    pub left: EntryView,
    pub right: EntryView,
    /// Displayed tally after seeds, overrides and session votes
    pub tally: VoteTally,
    pub left_pct: u8,
    pub right_pct: u8,
    pub status: VoteStatus,
    /// Counts come from the seed generator rather than the server
    pub seeded: bool,
}

impl MatchupView {
    pub fn controls_enabled(&self) -> bool {
        self.status == VoteStatus::Open
    }

    pub fn voted_side(&self) -> Option<Side> {
        match self.status {
            VoteStatus::Voted(side) => Some(side),
            _ => None,
        }
    }

    pub fn side_state(&self, side: Side) -> SideState {
        match side {
            Side::Left => self.left.state,
            Side::Right => self.right.state,
        }
    }

    /// Counts stay hidden until this browser can no longer vote
    pub fn results_visible(&self) -> bool {
        matches!(self.status, VoteStatus::Voted(_) | VoteStatus::Resolved)
    }

    /// Banner message, else title, else category, upper-cased
    pub fn headline(&self) -> String {
        [&self.info.message, &self.info.title, &self.info.category]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .map(|s| s.to_uppercase())
            .unwrap_or_else(|| "MATCHUP".to_string())
    }

    pub fn cadence_label(&self) -> String {
        self.info.cadence.label()
    }

    /// Call to action, e.g. `VOTE BEST COFFEE`
    pub fn vote_label(&self) -> String {
        let subject = self
            .info
            .category
            .as_deref()
            .or(self.info.title.as_deref())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("Matchup");
        format!("VOTE {}", subject.to_uppercase())
    }

    /// Time left to vote, `None` when the matchup has no end time
    pub fn countdown(&self, now: DateTime<Utc>) -> Option<String> {
        self.info.ends_at.map(|ends_at| time_remaining(ends_at, now))
    }
}

/// First matchup this browser can still vote on
pub fn next_unvoted(views: &[MatchupView]) -> Option<&MatchupView> {
    views.iter().find(|view| view.status == VoteStatus::Open)
}

/// Borrowed per-browser state a reconciliation reads from
///
/// The seed generator is borrowed mutably because a first sighting of a
/// matchup generates and caches its seed.
pub struct Reconciler<'a> {
    ledger: &'a VoteLedger,
    overrides: &'a OverrideStore,
    seeds: &'a mut SeedGenerator,
}

impl<'a> Reconciler<'a> {
    pub fn new(ledger: &'a VoteLedger, overrides: &'a OverrideStore, seeds: &'a mut SeedGenerator) -> Self {
        Self {
            ledger,
            overrides,
            seeds,
        }
    }

    /// Build the view model for the current snapshot
    ///
    /// An empty snapshot, including one left by a failed fetch, yields an
    /// empty view model.
    pub fn reconcile(&mut self, state: &AppState) -> Vec<MatchupView> {
        let mut anchors = AnchorAllocator::new();
        let mut views = Vec::with_capacity(state.matchups().len());
        for (index, raw) in state.matchups().iter().enumerate() {
            views.push(self.reconcile_one(index, raw, state, &mut anchors));
        }
        views
    }

    fn reconcile_one(
        &mut self,
        index: usize,
        raw: &RawMatchup,
        state: &AppState,
        anchors: &mut AnchorAllocator,
    ) -> MatchupView {
        let id = raw.resolved_id(index);

        let mut tally = raw.tally();
        let seed = self.seeds.seed_for(&id, index, tally);
        let seeded = seed.is_some();
        if let Some(seed) = seed {
            tally = seed;
        }

        let bundle = self.overrides.get(index, &id);
        bundle.votes.apply(&mut tally);
        tally += state.session_increment(&id);

        let mut info = raw.matchup.clone();
        bundle.matchup.apply(&mut info);
        let mut left = raw.left.clone();
        bundle.left.apply(&mut left);
        let mut right = raw.right.clone();
        bundle.right.apply(&mut right);

        let status = self.status(&id, state);
        let (left_state, right_state) = side_states(status);
        let (left_pct, right_pct) = tally.percentages();

        let anchor = anchors.allocate(&anchor_base(&info, index));

        trace!(
            index,
            matchup_id = %id,
            anchor = %anchor,
            left = tally.left,
            right = tally.right,
            seeded,
            ?status,
            "Reconciled matchup"
        );

        MatchupView {
            index,
            id,
            anchor,
            info,
            left: EntryView::from_entry(left, left_state),
            right: EntryView::from_entry(right, right_state),
            tally,
            left_pct,
            right_pct,
            status,
            seeded,
        }
    }

    /// A ledger entry always wins over session state
    fn status(&self, matchup_id: &str, state: &AppState) -> VoteStatus {
        if let Some(side) = self.ledger.voted_side(matchup_id) {
            return VoteStatus::Voted(side);
        }
        match state.session_vote(matchup_id) {
            Some(SessionVote::Accepted(side)) => VoteStatus::Voted(side),
            Some(SessionVote::Pending(_)) => VoteStatus::Pending,
            Some(SessionVote::Resolved) => VoteStatus::Resolved,
            None => VoteStatus::Open,
        }
    }
}

fn side_states(status: VoteStatus) -> (SideState, SideState) {
    match status {
        VoteStatus::Voted(Side::Left) => (SideState::Selected, SideState::Dimmed),
        VoteStatus::Voted(Side::Right) => (SideState::Dimmed, SideState::Selected),
        _ => (SideState::Neutral, SideState::Neutral),
    }
}

/// Server id, else the displayed title, else `matchup-{n}`
fn anchor_base(info: &MatchupInfo, index: usize) -> String {
    let source = [&info.id, &info.title]
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty());
    let key = source.map(|s| normalize_key(s)).unwrap_or_default();
    if key.is_empty() {
        format!("matchup-{}", index + 1)
    } else {
        key
    }
}
