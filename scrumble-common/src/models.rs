//! Matchup data model and JSON wire shapes shared by the client and the API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::AddAssign;
use std::str::FromStr;

use crate::Error;

/// One side of a matchup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Side::Left),
            "right" => Ok(Side::Right),
            other => Err(Error::InvalidInput(format!(
                "side must be left or right, got {:?}",
                other
            ))),
        }
    }
}

/// How often a matchup runs
///
/// Unknown strings are kept verbatim so they can still be shown.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum Cadence {
    #[default]
    None,
    Daily,
    Weekly,
    Flash,
    Other(String),
}

impl Cadence {
    /// Badge text for the matchup header
    pub fn label(&self) -> String {
        match self {
            Cadence::None => String::new(),
            Cadence::Daily => "Daily Battle".to_string(),
            Cadence::Weekly => "Weekly Spotlight".to_string(),
            Cadence::Flash => "Flash Fight".to_string(),
            Cadence::Other(value) => value.to_uppercase(),
        }
    }
}

impl From<Option<String>> for Cadence {
    fn from(value: Option<String>) -> Self {
        let normalized = value.unwrap_or_default().trim().to_lowercase();
        match normalized.as_str() {
            "" | "none" => Cadence::None,
            "daily" => Cadence::Daily,
            "weekly" => Cadence::Weekly,
            "flash" => Cadence::Flash,
            _ => Cadence::Other(normalized),
        }
    }
}

impl From<Cadence> for String {
    fn from(value: Cadence) -> Self {
        match value {
            Cadence::None => String::new(),
            Cadence::Daily => "daily".to_string(),
            Cadence::Weekly => "weekly".to_string(),
            Cadence::Flash => "flash".to_string(),
            Cadence::Other(other) => other,
        }
    }
}

/// Vote counts for both sides of a matchup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoteTally {
    #[serde(default)]
    pub left: u64,
    #[serde(default)]
    pub right: u64,
}

impl VoteTally {
    pub fn new(left: u64, right: u64) -> Self {
        Self { left, right }
    }

    /// Sum of both sides, saturating at `u64::MAX`
    pub fn total(&self) -> u64 {
        self.left.saturating_add(self.right)
    }

    pub fn is_zero(&self) -> bool {
        self.total() == 0
    }

    pub fn get(&self, side: Side) -> u64 {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn increment(&mut self, side: Side) {
        match side {
            Side::Left => self.left = self.left.saturating_add(1),
            Side::Right => self.right = self.right.saturating_add(1),
        }
    }

    /// Whole-number percentages `(left, right)`
    ///
    /// The left share is rounded half-up and the right share is the
    /// remainder, so the pair sums to 100 whenever any vote exists and is
    /// `(0, 0)` otherwise.
    pub fn percentages(&self) -> (u8, u8) {
        let total = self.left as u128 + self.right as u128;
        if total == 0 {
            return (0, 0);
        }
        let left = ((self.left as u128 * 200 + total) / (total * 2)) as u8;
        (left, 100 - left)
    }
}

impl AddAssign for VoteTally {
    fn add_assign(&mut self, other: Self) {
        self.left = self.left.saturating_add(other.left);
        self.right = self.right.saturating_add(other.right);
    }
}

/// Matchup header fields as served by `GET /matchup`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchupInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Banner message shown instead of the title when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub cadence: Cadence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

/// One contestant of a matchup
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Entry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blurb: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A matchup exactly as the server sent it, before any local layering
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawMatchup {
    pub matchup: MatchupInfo,
    pub left: Entry,
    pub right: Entry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes: Option<VoteTally>,
}

impl RawMatchup {
    /// Server id, or the positional fallback `matchup-{index+1}`
    ///
    /// The fallback keeps override and ledger keys stable for matchups the
    /// server sent without an id. It is positional, so if the server reorders
    /// such matchups between loads their local state follows the position,
    /// not the matchup.
    pub fn resolved_id(&self, index: usize) -> String {
        match self.matchup.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("matchup-{}", index + 1),
        }
    }

    /// Server tally, zero when the server sent none
    pub fn tally(&self) -> VoteTally {
        self.votes.unwrap_or_default()
    }
}

/// `GET /matchup` response body
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchupFeed {
    #[serde(default)]
    pub matchups: Vec<RawMatchup>,
}

/// Read-only listing row used by `GET /history` and `GET /future`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub id: String,
    pub title: String,
    pub category: String,
    pub left: Entry,
    pub right: Entry,
    pub votes: VoteTally,
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
}

impl HistoryItem {
    /// Side with more votes; a tie counts for the right side
    pub fn winner(&self) -> Side {
        if self.votes.left > self.votes.right {
            Side::Left
        } else {
            Side::Right
        }
    }
}

/// `GET /history` response body
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoryFeed {
    #[serde(default)]
    pub history: Vec<HistoryItem>,
}

/// `GET /future` response body
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FutureFeed {
    #[serde(default)]
    pub future: Vec<HistoryItem>,
}

/// `POST /vote` request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub matchup_id: String,
    pub side: Side,
    pub fingerprint: String,
}

/// `POST /vote` success body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub votes: Option<VoteTally>,
}

/// Error body used by every non-success API response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
