//! Matchup, entry and vote queries

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use thiserror::Error;
use tracing::{debug, info};

use scrumble_common::models::{Cadence, Entry, HistoryItem, MatchupInfo, RawMatchup, Side, VoteTally};

const SELECT_MATCHUPS: &str = r#"
    SELECT m.id, m.title, m.category, m.message, m.cadence, m.starts_at, m.ends_at,
           m.active, m.left_votes, m.right_votes,
           l.id AS l_id, l.name AS l_name, l.blurb AS l_blurb, l.neighborhood AS l_neighborhood,
           l.tag AS l_tag, l.url AS l_url, l.image_url AS l_image_url,
           r.id AS r_id, r.name AS r_name, r.blurb AS r_blurb, r.neighborhood AS r_neighborhood,
           r.tag AS r_tag, r.url AS r_url, r.image_url AS r_image_url
    FROM matchups m
    JOIN entries l ON l.id = m.left_entry_id
    JOIN entries r ON r.id = m.right_entry_id
"#;

/// Why a vote was not counted
#[derive(Debug, Error)]
pub enum VoteError {
    #[error("Matchup not found or inactive")]
    NotOpen,

    #[error("Already voted on this matchup")]
    Duplicate,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Why a matchup could not be written
#[derive(Debug, Error)]
pub enum MatchupWriteError {
    #[error("Entry not found: {0}")]
    MissingEntry(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Entry fields accepted by the admin API
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EntryInput {
    pub id: String,
    pub name: String,
    pub blurb: Option<String>,
    pub neighborhood: Option<String>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
}

/// Matchup fields accepted by the admin API
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MatchupInput {
    pub id: String,
    pub title: String,
    pub category: String,
    pub message: Option<String>,
    pub cadence: Option<String>,
    pub left_entry_id: Option<String>,
    pub right_entry_id: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub active: bool,
}

fn entry_from_row(row: &SqliteRow, prefix: &str) -> Result<Entry, sqlx::Error> {
    let column = |name: &str| format!("{}_{}", prefix, name);
    Ok(Entry {
        id: Some(row.try_get(column("id").as_str())?),
        name: Some(row.try_get(column("name").as_str())?),
        blurb: row.try_get(column("blurb").as_str())?,
        neighborhood: row.try_get(column("neighborhood").as_str())?,
        tag: row.try_get(column("tag").as_str())?,
        image_url: row.try_get(column("image_url").as_str())?,
        url: row.try_get(column("url").as_str())?,
    })
}

fn tally_from_row(row: &SqliteRow) -> Result<VoteTally, sqlx::Error> {
    let left: i64 = row.try_get("left_votes")?;
    let right: i64 = row.try_get("right_votes")?;
    Ok(VoteTally::new(left.max(0) as u64, right.max(0) as u64))
}

fn raw_from_row(row: &SqliteRow) -> Result<RawMatchup, sqlx::Error> {
    let cadence: Option<String> = row.try_get("cadence")?;
    Ok(RawMatchup {
        matchup: MatchupInfo {
            id: Some(row.try_get("id")?),
            title: Some(row.try_get("title")?),
            category: Some(row.try_get("category")?),
            message: row.try_get("message")?,
            cadence: Cadence::from(cadence),
            starts_at: row.try_get("starts_at")?,
            ends_at: row.try_get("ends_at")?,
            active: Some(row.try_get("active")?),
        },
        left: entry_from_row(row, "l")?,
        right: entry_from_row(row, "r")?,
        votes: Some(tally_from_row(row)?),
    })
}

fn history_from_row(row: &SqliteRow) -> Result<HistoryItem, sqlx::Error> {
    Ok(HistoryItem {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        category: row.try_get("category")?,
        left: entry_from_row(row, "l")?,
        right: entry_from_row(row, "r")?,
        votes: tally_from_row(row)?,
        active: row.try_get("active")?,
        starts_at: row.try_get("starts_at")?,
        ends_at: row.try_get("ends_at")?,
    })
}

/// Matchups open for voting at `now`, oldest first
pub async fn active_matchups(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<RawMatchup>, sqlx::Error> {
    let sql = format!(
        "{} WHERE m.active = 1
           AND (m.starts_at IS NULL OR m.starts_at <= ?)
           AND (m.ends_at IS NULL OR m.ends_at > ?)
         ORDER BY m.created_at, m.id",
        SELECT_MATCHUPS
    );
    let rows = sqlx::query(&sql).bind(now).bind(now).fetch_all(pool).await?;
    rows.iter().map(raw_from_row).collect()
}

/// Ended matchups and deactivated ones that had started, newest first
pub async fn history(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<HistoryItem>, sqlx::Error> {
    let sql = format!(
        "{} WHERE (m.ends_at IS NOT NULL AND m.ends_at <= ?)
            OR (m.active = 0 AND (m.starts_at IS NULL OR m.starts_at <= ?))
         ORDER BY COALESCE(m.ends_at, m.created_at) DESC, m.id",
        SELECT_MATCHUPS
    );
    let rows = sqlx::query(&sql).bind(now).bind(now).fetch_all(pool).await?;
    rows.iter().map(history_from_row).collect()
}

/// Matchups scheduled to start after `now`, soonest first
pub async fn future(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<HistoryItem>, sqlx::Error> {
    let sql = format!(
        "{} WHERE m.starts_at IS NOT NULL AND m.starts_at > ?
         ORDER BY m.starts_at, m.id",
        SELECT_MATCHUPS
    );
    let rows = sqlx::query(&sql).bind(now).fetch_all(pool).await?;
    rows.iter().map(history_from_row).collect()
}

/// Record one vote and return the new tally
///
/// Runs as a single transaction. The vote row is only inserted while the
/// matchup is active and inside its window, and the UNIQUE constraint on
/// `(matchup_id, fingerprint)` rejects a second vote from the same browser.
pub async fn cast_vote(
    pool: &SqlitePool,
    matchup_id: &str,
    side: Side,
    fingerprint: &str,
    now: DateTime<Utc>,
) -> Result<VoteTally, VoteError> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"INSERT INTO votes (matchup_id, fingerprint, side, created_at)
           SELECT ?, ?, ?, ?
           WHERE EXISTS (
               SELECT 1 FROM matchups
               WHERE id = ? AND active = 1
                 AND (starts_at IS NULL OR starts_at <= ?)
                 AND (ends_at IS NULL OR ends_at > ?)
           )"#,
    )
    .bind(matchup_id)
    .bind(fingerprint)
    .bind(side.as_str())
    .bind(now)
    .bind(matchup_id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await;

    match inserted {
        Ok(result) if result.rows_affected() == 0 => return Err(VoteError::NotOpen),
        Ok(_) => {}
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            debug!(matchup_id, "Duplicate vote rejected");
            return Err(VoteError::Duplicate);
        }
        Err(e) => return Err(e.into()),
    }

    let update = match side {
        Side::Left => "UPDATE matchups SET left_votes = left_votes + 1 WHERE id = ?",
        Side::Right => "UPDATE matchups SET right_votes = right_votes + 1 WHERE id = ?",
    };
    sqlx::query(update).bind(matchup_id).execute(&mut *tx).await?;

    let row = sqlx::query("SELECT left_votes, right_votes FROM matchups WHERE id = ?")
        .bind(matchup_id)
        .fetch_one(&mut *tx)
        .await?;
    let tally = tally_from_row(&row)?;

    tx.commit().await?;
    Ok(tally)
}

async fn upsert_entry(
    tx: &mut Transaction<'_, Sqlite>,
    entry: &EntryInput,
    category: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO entries (id, name, blurb, neighborhood, category, tag, url, image_url)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)
           ON CONFLICT(id) DO UPDATE SET
               name = excluded.name,
               blurb = excluded.blurb,
               neighborhood = excluded.neighborhood,
               category = excluded.category,
               tag = excluded.tag,
               url = excluded.url,
               image_url = excluded.image_url"#,
    )
    .bind(&entry.id)
    .bind(&entry.name)
    .bind(&entry.blurb)
    .bind(&entry.neighborhood)
    .bind(entry.category.as_deref().unwrap_or(category))
    .bind(entry.tag.as_deref().unwrap_or("Local"))
    .bind(&entry.url)
    .bind(&entry.image_url)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn entry_exists(tx: &mut Transaction<'_, Sqlite>, id: &str) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE id = ?")
        .bind(id)
        .fetch_one(&mut **tx)
        .await?;
    Ok(count > 0)
}

/// Create or replace a matchup, upserting any entries supplied inline
///
/// Replacing a matchup keeps its tallies. Entries referenced only by id
/// must already exist.
pub async fn save_matchup(
    pool: &SqlitePool,
    matchup: &MatchupInput,
    left_entry_id: &str,
    right_entry_id: &str,
    entries: &[&EntryInput],
    now: DateTime<Utc>,
) -> Result<(), MatchupWriteError> {
    let mut tx = pool.begin().await?;

    for entry in entries {
        upsert_entry(&mut tx, entry, &matchup.category).await?;
    }
    for id in [left_entry_id, right_entry_id] {
        if !entry_exists(&mut tx, id).await? {
            return Err(MatchupWriteError::MissingEntry(id.to_string()));
        }
    }

    sqlx::query(
        r#"INSERT INTO matchups (id, title, category, message, cadence, left_entry_id, right_entry_id,
                                 starts_at, ends_at, active, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
           ON CONFLICT(id) DO UPDATE SET
               title = excluded.title,
               category = excluded.category,
               message = excluded.message,
               cadence = excluded.cadence,
               left_entry_id = excluded.left_entry_id,
               right_entry_id = excluded.right_entry_id,
               starts_at = excluded.starts_at,
               ends_at = excluded.ends_at,
               active = excluded.active"#,
    )
    .bind(&matchup.id)
    .bind(&matchup.title)
    .bind(&matchup.category)
    .bind(&matchup.message)
    .bind(&matchup.cadence)
    .bind(left_entry_id)
    .bind(right_entry_id)
    .bind(matchup.starts_at)
    .bind(matchup.ends_at)
    .bind(matchup.active)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(matchup_id = %matchup.id, active = matchup.active, "Matchup saved");
    Ok(())
}

/// Mark a matchup active; `false` when no such matchup exists
pub async fn activate(pool: &SqlitePool, matchup_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE matchups SET active = 1 WHERE id = ?")
        .bind(matchup_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
