//! Community matchup suggestions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

/// Newest submissions returned to admins
pub const LATEST_LIMIT: i64 = 50;

/// `POST /submit` body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubmissionInput {
    pub left_name: String,
    pub right_name: String,
    pub category: String,
    pub email: Option<String>,
    pub reason: Option<String>,
}

impl SubmissionInput {
    /// Name of the first required field left blank, if any
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("left_name", &self.left_name),
            ("right_name", &self.right_name),
            ("category", &self.category),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Submission {
    pub id: String,
    pub left_name: String,
    pub right_name: String,
    pub category: String,
    pub email: String,
    pub reason: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Store a pending suggestion and return its id
pub async fn insert(pool: &SqlitePool, input: &SubmissionInput, now: DateTime<Utc>) -> Result<String, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"INSERT INTO submissions (id, left_name, right_name, category, email, reason, status, created_at)
           VALUES (?, ?, ?, ?, ?, ?, 'pending', ?)"#,
    )
    .bind(&id)
    .bind(input.left_name.trim())
    .bind(input.right_name.trim())
    .bind(input.category.trim())
    .bind(input.email.as_deref().map(str::trim).unwrap_or(""))
    .bind(input.reason.as_deref().map(str::trim).unwrap_or(""))
    .bind(now)
    .execute(pool)
    .await?;
    Ok(id)
}

/// Newest submissions first, at most [`LATEST_LIMIT`]
pub async fn latest(pool: &SqlitePool) -> Result<Vec<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(
        r#"SELECT id, left_name, right_name, category, email, reason, status, created_at
           FROM submissions
           ORDER BY created_at DESC
           LIMIT ?"#,
    )
    .bind(LATEST_LIMIT)
    .fetch_all(pool)
    .await
}
