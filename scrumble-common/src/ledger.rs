//! Local vote ledger
//!
//! Records which side this browser chose for each matchup. The ledger only
//! gates the UI (disabled buttons, "you voted" badge); the server never
//! trusts it. Entries are append-only: once a side is recorded for a matchup
//! it is never replaced.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::models::Side;
use crate::storage::{read_json, write_json, SharedStore, VOTED_KEY};

/// Vote ledger with an in-memory copy of the durable entries
///
/// The copy is what answers lookups, so a failing store still gives correct
/// session-only behavior.
pub struct VoteLedger {
    store: SharedStore,
    entries: BTreeMap<String, Side>,
}

impl VoteLedger {
    /// Open the ledger, loading whatever the store holds
    pub fn open(store: SharedStore) -> Self {
        let entries = match read_json::<BTreeMap<String, Side>>(store.as_ref(), VOTED_KEY) {
            Ok(Some(entries)) => entries,
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                debug!(error = %e, "Vote ledger unreadable, starting empty");
                BTreeMap::new()
            }
        };
        Self { store, entries }
    }

    /// Side recorded for `matchup_id`, if any
    pub fn voted_side(&self, matchup_id: &str) -> Option<Side> {
        self.entries.get(matchup_id).copied()
    }

    pub fn has_voted(&self, matchup_id: &str) -> bool {
        self.entries.contains_key(matchup_id)
    }

    /// Record a vote
    ///
    /// Recording the same side again changes nothing. Recording a different
    /// side for an already-voted matchup is refused and the first side kept.
    /// Storage failures are logged and otherwise ignored.
    pub fn record_vote(&mut self, matchup_id: &str, side: Side) {
        match self.entries.get(matchup_id) {
            Some(existing) if *existing == side => return,
            Some(existing) => {
                warn!(
                    matchup_id,
                    recorded = %existing,
                    attempted = %side,
                    "Refusing to change an already recorded vote"
                );
                return;
            }
            None => {}
        }

        self.entries.insert(matchup_id.to_string(), side);
        if let Err(e) = write_json(self.store.as_ref(), VOTED_KEY, &self.entries) {
            debug!(matchup_id, error = %e, "Vote ledger not persisted");
        }
    }

    /// All recorded votes, ordered by matchup id
    pub fn voted(&self) -> impl Iterator<Item = (&str, Side)> {
        self.entries.iter().map(|(id, side)| (id.as_str(), *side))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
