//! Override layers
//!
//! Overrides are local edits laid over server data for display only. They
//! never reach the server. Four layers are merged, lowest priority first:
//!
//! 1. global index-keyed (client configuration)
//! 2. global id-keyed (client configuration)
//! 3. local-UI index-keyed (durable storage, written by [`OverrideStore::set`])
//! 4. local-UI id-keyed (durable storage)
//!
//! Merging is per field: a later layer only replaces the fields it sets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::models::{Entry, MatchupInfo, VoteTally};
use crate::storage::{read_json, write_json, SharedStore, UI_OVERRIDES_KEY};
use crate::{Error, Result};

fn overlay<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
    if src.is_some() {
        dst.clone_from(src);
    }
}

/// Field group an override belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverrideGroup {
    Matchup,
    Left,
    Right,
    Votes,
}

impl OverrideGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideGroup::Matchup => "matchup",
            OverrideGroup::Left => "left",
            OverrideGroup::Right => "right",
            OverrideGroup::Votes => "votes",
        }
    }
}

impl fmt::Display for OverrideGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverrideGroup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "matchup" => Ok(OverrideGroup::Matchup),
            "left" => Ok(OverrideGroup::Left),
            "right" => Ok(OverrideGroup::Right),
            "votes" => Ok(OverrideGroup::Votes),
            other => Err(Error::InvalidInput(format!(
                "unknown override group {:?} (expected matchup, left, right or votes)",
                other
            ))),
        }
    }
}

/// Partial matchup header
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchupPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MatchupPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.category.is_none() && self.message.is_none()
    }

    fn layer(&mut self, over: &Self) {
        overlay(&mut self.title, &over.title);
        overlay(&mut self.category, &over.category);
        overlay(&mut self.message, &over.message);
    }

    fn field_mut(&mut self, key: &str) -> Result<&mut Option<String>> {
        match key {
            "title" => Ok(&mut self.title),
            "category" => Ok(&mut self.category),
            "message" => Ok(&mut self.message),
            other => Err(Error::InvalidInput(format!("unknown matchup field {:?}", other))),
        }
    }

    /// Replace the header fields this patch sets
    pub fn apply(&self, info: &mut MatchupInfo) {
        overlay(&mut info.title, &self.title);
        overlay(&mut info.category, &self.category);
        overlay(&mut info.message, &self.message);
    }
}

/// Partial entry
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.neighborhood.is_none()
            && self.tag.is_none()
            && self.image_url.is_none()
    }

    fn layer(&mut self, over: &Self) {
        overlay(&mut self.name, &over.name);
        overlay(&mut self.neighborhood, &over.neighborhood);
        overlay(&mut self.tag, &over.tag);
        overlay(&mut self.image_url, &over.image_url);
    }

    fn field_mut(&mut self, key: &str) -> Result<&mut Option<String>> {
        match key {
            "name" => Ok(&mut self.name),
            "neighborhood" => Ok(&mut self.neighborhood),
            "tag" => Ok(&mut self.tag),
            "image_url" => Ok(&mut self.image_url),
            other => Err(Error::InvalidInput(format!("unknown entry field {:?}", other))),
        }
    }

    pub fn apply(&self, entry: &mut Entry) {
        overlay(&mut entry.name, &self.name);
        overlay(&mut entry.neighborhood, &self.neighborhood);
        overlay(&mut entry.tag, &self.tag);
        overlay(&mut entry.image_url, &self.image_url);
    }
}

/// Partial vote tally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<u64>,
}

impl TallyPatch {
    pub fn is_empty(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    fn layer(&mut self, over: &Self) {
        overlay(&mut self.left, &over.left);
        overlay(&mut self.right, &over.right);
    }

    fn field_mut(&mut self, key: &str) -> Result<&mut Option<u64>> {
        match key {
            "left" => Ok(&mut self.left),
            "right" => Ok(&mut self.right),
            other => Err(Error::InvalidInput(format!("unknown votes field {:?}", other))),
        }
    }

    pub fn apply(&self, tally: &mut VoteTally) {
        if let Some(left) = self.left {
            tally.left = left;
        }
        if let Some(right) = self.right {
            tally.right = right;
        }
    }
}

/// All override groups for one matchup
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverrideBundle {
    #[serde(skip_serializing_if = "MatchupPatch::is_empty")]
    pub matchup: MatchupPatch,
    #[serde(skip_serializing_if = "EntryPatch::is_empty")]
    pub left: EntryPatch,
    #[serde(skip_serializing_if = "EntryPatch::is_empty")]
    pub right: EntryPatch,
    #[serde(skip_serializing_if = "TallyPatch::is_empty")]
    pub votes: TallyPatch,
}

impl OverrideBundle {
    pub fn is_empty(&self) -> bool {
        self.matchup.is_empty() && self.left.is_empty() && self.right.is_empty() && self.votes.is_empty()
    }

    /// Lay `over` on top of `self`, field by field
    pub fn layer(&mut self, over: &OverrideBundle) {
        self.matchup.layer(&over.matchup);
        self.left.layer(&over.left);
        self.right.layer(&over.right);
        self.votes.layer(&over.votes);
    }

    /// Merge layers in order, lowest priority first
    pub fn merged<'a>(layers: impl IntoIterator<Item = &'a OverrideBundle>) -> OverrideBundle {
        let mut merged = OverrideBundle::default();
        for layer in layers {
            merged.layer(layer);
        }
        merged
    }

    fn set_text(&mut self, group: OverrideGroup, key: &str, value: Option<String>) -> Result<()> {
        let slot = match group {
            OverrideGroup::Matchup => self.matchup.field_mut(key)?,
            OverrideGroup::Left => self.left.field_mut(key)?,
            OverrideGroup::Right => self.right.field_mut(key)?,
            OverrideGroup::Votes => {
                return Err(Error::Internal("votes are numeric".to_string()));
            }
        };
        *slot = value;
        Ok(())
    }
}

/// Index-keyed and id-keyed override maps
///
/// Index keys are decimal strings so the same shape loads from both JSON
/// storage and TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverrideLayers {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub by_index: BTreeMap<String, OverrideBundle>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub by_id: BTreeMap<String, OverrideBundle>,
}

impl OverrideLayers {
    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty() && self.by_id.is_empty()
    }

    pub fn for_index(&self, index: usize) -> Option<&OverrideBundle> {
        self.by_index.get(&index.to_string())
    }

    pub fn for_id(&self, matchup_id: &str) -> Option<&OverrideBundle> {
        if matchup_id.is_empty() {
            return None;
        }
        self.by_id.get(matchup_id)
    }
}

/// Override layers with the local-UI layer kept in durable storage
pub struct OverrideStore {
    store: SharedStore,
    global: OverrideLayers,
    ui: OverrideLayers,
}

impl OverrideStore {
    /// Open the store with `global` layers from configuration
    pub fn open(store: SharedStore, global: OverrideLayers) -> Self {
        let ui = match read_json::<OverrideLayers>(store.as_ref(), UI_OVERRIDES_KEY) {
            Ok(Some(ui)) => ui,
            Ok(None) => OverrideLayers::default(),
            Err(e) => {
                debug!(error = %e, "UI overrides unreadable, starting empty");
                OverrideLayers::default()
            }
        };
        Self { store, global, ui }
    }

    /// Merged overrides for the matchup at `index` with id `matchup_id`
    pub fn get(&self, index: usize, matchup_id: &str) -> OverrideBundle {
        OverrideBundle::merged(
            [
                self.global.for_index(index),
                self.global.for_id(matchup_id),
                self.ui.for_index(index),
                self.ui.for_id(matchup_id),
            ]
            .into_iter()
            .flatten(),
        )
    }

    /// Write one field into the local-UI index layer
    ///
    /// `votes` values must parse as integers (negatives clamp to zero);
    /// anything else deletes the field. Text values are trimmed and an empty
    /// value deletes the field. An unknown field name is rejected.
    pub fn set(&mut self, index: usize, group: OverrideGroup, key: &str, value: &str) -> Result<()> {
        let key = key.trim();
        let index_key = index.to_string();
        let mut bundle = self.ui.by_index.get(&index_key).cloned().unwrap_or_default();

        match group {
            OverrideGroup::Votes => {
                let slot = bundle.votes.field_mut(key)?;
                *slot = value.trim().parse::<i64>().ok().map(|n| n.max(0) as u64);
            }
            _ => {
                let trimmed = value.trim();
                let text = (!trimmed.is_empty()).then(|| trimmed.to_string());
                bundle.set_text(group, key, text)?;
            }
        }

        if bundle.is_empty() {
            self.ui.by_index.remove(&index_key);
        } else {
            self.ui.by_index.insert(index_key, bundle);
        }
        self.persist();
        Ok(())
    }

    /// Drop every local-UI override for the matchup at `index`
    pub fn clear(&mut self, index: usize) {
        if self.ui.by_index.remove(&index.to_string()).is_some() {
            self.persist();
        }
    }

    /// Drop every local-UI override
    pub fn clear_all(&mut self) {
        self.ui = OverrideLayers::default();
        self.persist();
    }

    /// Local-UI layer as currently held
    pub fn ui_layer(&self) -> &OverrideLayers {
        &self.ui
    }

    fn persist(&self) {
        let result = if self.ui.is_empty() {
            self.store.remove(UI_OVERRIDES_KEY)
        } else {
            write_json(self.store.as_ref(), UI_OVERRIDES_KEY, &self.ui)
        };
        if let Err(e) = result {
            debug!(error = %e, "UI overrides not persisted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, UnavailableStore};

    fn votes(left: Option<u64>, right: Option<u64>) -> OverrideBundle {
        OverrideBundle {
            votes: TallyPatch { left, right },
            ..Default::default()
        }
    }

    #[test]
    fn test_layer_precedence() {
        let mut global = OverrideLayers::default();
        global.by_index.insert("0".to_string(), votes(Some(5), Some(1)));
        global.by_id.insert("m1".to_string(), votes(Some(9), None));

        let overrides = OverrideStore::open(MemoryStore::shared(), global);
        let merged = overrides.get(0, "m1");
        assert_eq!(merged.votes.left, Some(9));
        // Untouched by the id layer, so the index layer value survives
        assert_eq!(merged.votes.right, Some(1));
    }

    #[test]
    fn test_ui_layer_beats_global() {
        let mut global = OverrideLayers::default();
        global.by_id.insert("m1".to_string(), votes(Some(9), None));

        let mut overrides = OverrideStore::open(MemoryStore::shared(), global);
        overrides.set(0, OverrideGroup::Votes, "left", "12").unwrap();
        assert_eq!(overrides.get(0, "m1").votes.left, Some(12));
        // Index layers only apply at their own index
        assert_eq!(overrides.get(1, "m1").votes.left, Some(9));
    }

    #[test]
    fn test_set_is_idempotent() {
        let mut overrides = OverrideStore::open(MemoryStore::shared(), OverrideLayers::default());
        overrides.set(0, OverrideGroup::Left, "name", "Velo").unwrap();
        let once = overrides.get(0, "m1");
        overrides.set(0, OverrideGroup::Left, "name", "Velo").unwrap();
        assert_eq!(overrides.get(0, "m1"), once);
    }

    #[test]
    fn test_votes_parsing() {
        let mut overrides = OverrideStore::open(MemoryStore::shared(), OverrideLayers::default());
        overrides.set(0, OverrideGroup::Votes, "left", " 42 ").unwrap();
        assert_eq!(overrides.get(0, "").votes.left, Some(42));

        overrides.set(0, OverrideGroup::Votes, "left", "-3").unwrap();
        assert_eq!(overrides.get(0, "").votes.left, Some(0));

        overrides.set(0, OverrideGroup::Votes, "left", "lots").unwrap();
        assert_eq!(overrides.get(0, "").votes.left, None);
    }

    #[test]
    fn test_empty_shells_are_pruned() {
        let store = MemoryStore::shared();
        let mut overrides = OverrideStore::open(store.clone(), OverrideLayers::default());

        overrides.set(2, OverrideGroup::Matchup, "title", "  Taco Tuesday ").unwrap();
        overrides.set(2, OverrideGroup::Votes, "right", "7").unwrap();
        assert_eq!(
            store.get(UI_OVERRIDES_KEY).unwrap().as_deref(),
            Some(r#"{"by_index":{"2":{"matchup":{"title":"Taco Tuesday"},"votes":{"right":7}}}}"#)
        );

        overrides.set(2, OverrideGroup::Votes, "right", "").unwrap();
        assert_eq!(
            store.get(UI_OVERRIDES_KEY).unwrap().as_deref(),
            Some(r#"{"by_index":{"2":{"matchup":{"title":"Taco Tuesday"}}}}"#)
        );

        overrides.set(2, OverrideGroup::Matchup, "title", "   ").unwrap();
        assert!(overrides.ui_layer().is_empty());
        assert_eq!(store.get(UI_OVERRIDES_KEY).unwrap(), None);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut overrides = OverrideStore::open(MemoryStore::shared(), OverrideLayers::default());
        assert!(matches!(
            overrides.set(0, OverrideGroup::Left, "color", "red"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            overrides.set(0, OverrideGroup::Votes, "middle", "3"),
            Err(Error::InvalidInput(_))
        ));
        assert!("scores".parse::<OverrideGroup>().is_err());
        assert!(overrides.ui_layer().is_empty());
    }

    #[test]
    fn test_clear_and_clear_all() {
        let mut overrides = OverrideStore::open(MemoryStore::shared(), OverrideLayers::default());
        overrides.set(0, OverrideGroup::Left, "tag", "Local").unwrap();
        overrides.set(1, OverrideGroup::Right, "tag", "Challenger").unwrap();

        overrides.clear(0);
        assert!(overrides.get(0, "").is_empty());
        assert_eq!(overrides.get(1, "").right.tag.as_deref(), Some("Challenger"));

        overrides.clear_all();
        assert!(overrides.ui_layer().is_empty());
    }

    #[test]
    fn test_ui_layer_survives_reopen() {
        let store = MemoryStore::shared();
        let mut overrides = OverrideStore::open(store.clone(), OverrideLayers::default());
        overrides.set(0, OverrideGroup::Right, "name", "Mean Mug").unwrap();

        let reopened = OverrideStore::open(store, OverrideLayers::default());
        assert_eq!(reopened.get(0, "m1").right.name.as_deref(), Some("Mean Mug"));
    }

    #[test]
    fn test_unavailable_storage_keeps_session_edits() {
        let mut overrides =
            OverrideStore::open(UnavailableStore::shared("disabled"), OverrideLayers::default());
        overrides.set(0, OverrideGroup::Votes, "left", "3").unwrap();
        assert_eq!(overrides.get(0, "m1").votes.left, Some(3));
    }

    #[test]
    fn test_patch_apply() {
        let mut info = MatchupInfo {
            title: Some("Best Coffee".to_string()),
            category: Some("Food".to_string()),
            ..Default::default()
        };
        MatchupPatch {
            message: Some("Coffee Clash".to_string()),
            category: Some("Business".to_string()),
            ..Default::default()
        }
        .apply(&mut info);
        assert_eq!(info.title.as_deref(), Some("Best Coffee"));
        assert_eq!(info.category.as_deref(), Some("Business"));
        assert_eq!(info.message.as_deref(), Some("Coffee Clash"));
    }
}
