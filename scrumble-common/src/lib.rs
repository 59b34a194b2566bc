//! # Scrumble Common Library
//!
//! Shared code for the Scrumble client and API including:
//! - Matchup data model and JSON wire shapes
//! - Durable per-browser storage (fingerprint, vote ledger, overrides, seeds)
//! - Configuration loading
//! - Explicit application state and the reconciliation engine

pub mod anchor;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod ledger;
pub mod models;
pub mod overrides;
pub mod reconcile;
pub mod seed;
pub mod state;
pub mod storage;
pub mod time;

pub use error::{Error, Result};
pub use models::{RawMatchup, Side, VoteTally};
pub use reconcile::{MatchupView, Reconciler, VoteStatus};
pub use state::AppState;
