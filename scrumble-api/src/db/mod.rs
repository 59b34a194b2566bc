//! Database access layer for scrumble-api
//!
//! One SQLite file holds entries, matchups with their running tallies, one
//! row per accepted vote, and community submissions. Timestamps are stored
//! as RFC 3339 text.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

pub mod matchups;
pub mod submissions;

pub use matchups::{EntryInput, MatchupInput, MatchupWriteError, VoteError};
pub use submissions::{Submission, SubmissionInput};

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS entries (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        blurb TEXT,
        neighborhood TEXT,
        category TEXT,
        tag TEXT NOT NULL DEFAULT 'Local',
        url TEXT,
        image_url TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS matchups (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        category TEXT NOT NULL,
        message TEXT,
        cadence TEXT,
        left_entry_id TEXT NOT NULL REFERENCES entries(id),
        right_entry_id TEXT NOT NULL REFERENCES entries(id),
        starts_at TEXT,
        ends_at TEXT,
        active INTEGER NOT NULL DEFAULT 0,
        left_votes INTEGER NOT NULL DEFAULT 0 CHECK (left_votes >= 0),
        right_votes INTEGER NOT NULL DEFAULT 0 CHECK (right_votes >= 0),
        created_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS votes (
        matchup_id TEXT NOT NULL REFERENCES matchups(id),
        fingerprint TEXT NOT NULL,
        side TEXT NOT NULL CHECK (side IN ('left', 'right')),
        created_at TEXT NOT NULL,
        UNIQUE (matchup_id, fingerprint)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS submissions (
        id TEXT PRIMARY KEY,
        left_name TEXT NOT NULL,
        right_name TEXT NOT NULL,
        category TEXT NOT NULL,
        email TEXT NOT NULL DEFAULT '',
        reason TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'pending',
        created_at TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_matchups_active ON matchups(active)",
    "CREATE INDEX IF NOT EXISTS idx_submissions_created ON submissions(created_at)",
];

/// Open (creating if needed) the database file and apply the schema
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    init_schema(&pool).await?;
    info!("Database ready: {}", db_path.display());
    Ok(pool)
}

/// Private in-memory database with the schema applied
///
/// Limited to one connection: every `:memory:` connection is its own database.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .context("Failed to open in-memory database")?;
    init_schema(&pool).await?;
    Ok(pool)
}

/// Create tables and indexes that do not exist yet
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("Failed to apply schema")?;
    }
    Ok(())
}
