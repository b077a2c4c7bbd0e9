use chrono::{DateTime, Utc};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use uuid::Uuid;

/// A scheduled webhook delivery.
///
/// `try_count` carries three-way semantics: `-1` marks a permanent,
/// non-retryable failure; `0..=max_retries` counts retryable attempts
/// used so far; anything above `max_retries` means retries are
/// exhausted. `errors` is append-only and grows without bound across
/// attempts.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub uri: String,
    pub error_uri: Option<String>,
    pub execute_at: DateTime<Utc>,
    pub payload: Value,
    pub errors: Vec<String>,
    pub sent: bool,
    #[serde(rename = "try")]
    #[sqlx(rename = "try")]
    pub try_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub uri: String,
    pub error_uri: Option<String>,
    pub execute_at: DateTime<Utc>,
    pub payload: Value,
}

impl Job {
    /// Terminal jobs are never dispatched again: delivered, permanently
    /// failed, or out of retries.
    pub fn is_terminal(&self, max_retries: i32) -> bool {
        self.sent || self.try_count == -1 || self.try_count > max_retries
    }

    /// A job becomes eligible once `execute_at` is no longer in the future.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.execute_at <= now
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}
