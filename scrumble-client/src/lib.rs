//! # Scrumble Client
//!
//! Session, transport and terminal rendering for voting on Scrumble
//! matchups from the command line.

pub mod api;
pub mod render;
pub mod retry;
pub mod session;

pub use api::{ApiError, HttpMatchupApi, MatchupApi};
pub use retry::RetryPolicy;
pub use session::{Session, VoteOutcome};
