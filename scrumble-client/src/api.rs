//! Matchup API transport
//!
//! [`MatchupApi`] is the seam between the client session and the network.
//! [`HttpMatchupApi`] talks to the scrumble API over HTTP and runs every
//! request through the injected [`RetryPolicy`].

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use scrumble_common::models::{
    ErrorBody, FutureFeed, HistoryFeed, HistoryItem, MatchupFeed, RawMatchup, VoteReceipt,
    VoteRequest,
};

use crate::retry::RetryPolicy;

const USER_AGENT: &str = concat!("scrumble/", env!("CARGO_PKG_VERSION"));

/// Transport errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },

    /// The server already holds a vote from this fingerprint
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Matchup missing or no longer active
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// Worth retrying: network trouble, timeouts, 5xx and 429
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout => true,
            ApiError::Status { status, .. } => *status >= 500 || *status == 429,
            ApiError::Conflict(_) | ApiError::NotFound(_) | ApiError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

/// Operations the client needs from the matchup API
#[async_trait]
pub trait MatchupApi: Send + Sync {
    /// Active matchups with current tallies
    async fn fetch_matchups(&self) -> Result<Vec<RawMatchup>, ApiError>;

    async fn submit_vote(&self, vote: &VoteRequest) -> Result<VoteReceipt, ApiError>;

    /// Finished matchups, newest first
    async fn history(&self) -> Result<Vec<HistoryItem>, ApiError>;

    /// Scheduled matchups that have not started
    async fn future(&self) -> Result<Vec<HistoryItem>, ApiError>;
}

/// HTTP implementation backed by `reqwest`
pub struct HttpMatchupApi {
    http_client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpMatchupApi {
    pub fn new(base_url: &str, retry: RetryPolicy) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let url = url.as_str();
        let client = &self.http_client;
        self.retry
            .run(path, move || async move {
                debug!(url = %url, "GET");
                let response = client.get(url).send().await?;
                decode(response).await
            })
            .await
    }
}

/// Map a response to `T` or to the matching [`ApiError`]
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();

    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()));
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);

    Err(match status {
        StatusCode::CONFLICT => ApiError::Conflict(message),
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        _ => ApiError::Status {
            status: status.as_u16(),
            message,
        },
    })
}

#[async_trait]
impl MatchupApi for HttpMatchupApi {
    async fn fetch_matchups(&self) -> Result<Vec<RawMatchup>, ApiError> {
        let feed: MatchupFeed = self.get_json("/matchup").await?;
        debug!(count = feed.matchups.len(), "Fetched matchups");
        Ok(feed.matchups)
    }

    async fn submit_vote(&self, vote: &VoteRequest) -> Result<VoteReceipt, ApiError> {
        let url = self.url("/vote");
        let url = url.as_str();
        let client = &self.http_client;
        let receipt: VoteReceipt = self
            .retry
            .run("/vote", move || async move {
                let response = client.post(url).json(vote).send().await?;
                decode(response).await
            })
            .await?;

        info!(
            matchup_id = %vote.matchup_id,
            side = %vote.side,
            "Vote accepted by server"
        );
        Ok(receipt)
    }

    async fn history(&self) -> Result<Vec<HistoryItem>, ApiError> {
        let feed: HistoryFeed = self.get_json("/history").await?;
        Ok(feed.history)
    }

    async fn future(&self) -> Result<Vec<HistoryItem>, ApiError> {
        let feed: FutureFeed = self.get_json("/future").await?;
        Ok(feed.future)
    }
}
