//! Seeded placeholder vote counts
//!
//! A freshly launched matchup with `0 - 0` looks dead, so the client can show
//! plausible placeholder counts instead. Each matchup gets one generated tally
//! per browser, cached so the numbers stay put across reloads. Seeds are
//! display-only and never sent to the server.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::{SeedMode, SeedVotesConfig};
use crate::models::VoteTally;
use crate::storage::{read_json, write_json, SharedStore, SEED_VOTES_KEY};

/// Cache key for a matchup: its id, or `index-{index}` when it has none
pub fn seed_key(matchup_id: &str, index: usize) -> String {
    if matchup_id.is_empty() {
        format!("index-{}", index)
    } else {
        matchup_id.to_string()
    }
}

/// Generator plus the per-browser cache of generated tallies
pub struct SeedGenerator {
    config: SeedVotesConfig,
    store: SharedStore,
    cache: BTreeMap<String, VoteTally>,
    rng: StdRng,
}

impl SeedGenerator {
    pub fn open(store: SharedStore, config: SeedVotesConfig) -> Self {
        let cache = match read_json::<BTreeMap<String, VoteTally>>(store.as_ref(), SEED_VOTES_KEY) {
            Ok(Some(cache)) => cache,
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                debug!(error = %e, "Seed cache unreadable, starting empty");
                BTreeMap::new()
            }
        };
        Self {
            config,
            store,
            cache,
            rng: StdRng::from_entropy(),
        }
    }

    /// Replace the random source (tests use a fixed seed)
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn config(&self) -> &SeedVotesConfig {
        &self.config
    }

    /// Whether the seeding policy applies to a matchup with `real` votes
    pub fn should_seed(&self, real: VoteTally) -> bool {
        if !self.config.enabled {
            return false;
        }
        match self.config.mode {
            SeedMode::Override => true,
            SeedMode::IfZero => real.is_zero(),
        }
    }

    /// Seeded tally for a matchup, or `None` when the policy does not apply
    pub fn seed_for(&mut self, matchup_id: &str, index: usize, real: VoteTally) -> Option<VoteTally> {
        if !self.should_seed(real) {
            return None;
        }
        Some(self.seed_tally(matchup_id, index))
    }

    /// Cached tally for the matchup, generated on first request
    pub fn seed_tally(&mut self, matchup_id: &str, index: usize) -> VoteTally {
        let key = seed_key(matchup_id, index);
        if let Some(tally) = self.cache.get(&key) {
            return *tally;
        }

        let tally = self.generate();
        self.cache.insert(key.clone(), tally);
        if let Err(e) = write_json(self.store.as_ref(), SEED_VOTES_KEY, &self.cache) {
            debug!(key = %key, error = %e, "Seed cache not persisted");
        }
        debug!(key = %key, left = tally.left, right = tally.right, "Generated seed tally");
        tally
    }

    /// Base from `[min, max]`, signed jitter from `[-jitter, jitter]`, both
    /// sides floored at 1
    fn generate(&mut self) -> VoteTally {
        let min = self.config.min;
        let max = self.config.max.max(min);
        let base = i64::try_from(self.rng.gen_range(min..=max)).unwrap_or(i64::MAX);

        let jitter = i64::try_from(self.config.jitter).unwrap_or(i64::MAX);
        let delta = if jitter > 0 {
            self.rng.gen_range(-jitter..=jitter)
        } else {
            0
        };

        VoteTally {
            left: base.saturating_add(delta).max(1) as u64,
            right: base.saturating_sub(delta).max(1) as u64,
        }
    }
}
