use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::jobs::model::Job;

/// What a single delivery attempt did to the job.
///
/// `NoChange` covers the ambiguous status ranges (1xx/3xx): the job is
/// left untouched and stays eligible, so it retries at tick cadence
/// without moving its counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// 2xx response. Terminal success.
    Delivered,
    /// Transport failure or 4xx response. Terminal, non-retryable.
    PermanentFailure(String),
    /// 5xx response. Retryable until the counter passes the ceiling.
    RetryableFailure,
    /// Any other status. No state change.
    NoChange,
}

impl DeliveryOutcome {
    pub fn apply(self, job: &mut Job) {
        match self {
            DeliveryOutcome::Delivered => job.sent = true,
            DeliveryOutcome::PermanentFailure(message) => {
                job.record_error(message);
                job.try_count = -1;
            }
            DeliveryOutcome::RetryableFailure => job.try_count += 1,
            DeliveryOutcome::NoChange => {}
        }
    }
}

pub fn classify(status: StatusCode, body: &str) -> DeliveryOutcome {
    if status.is_success() {
        DeliveryOutcome::Delivered
    } else if status.is_client_error() {
        DeliveryOutcome::PermanentFailure(format!("destination returned {status}: {body}"))
    } else if status.is_server_error() {
        DeliveryOutcome::RetryableFailure
    } else {
        DeliveryOutcome::NoChange
    }
}

/// Performs one HTTP delivery attempt per job handed to a worker.
#[derive(Clone)]
pub struct Deliverer {
    client: Client,
}

impl Deliverer {
    pub fn new(request_timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client })
    }

    /// POST the job's payload to its destination and fold the outcome
    /// into the job's retry state. Never returns an error: every
    /// failure mode is recorded on the job itself.
    pub async fn attempt(&self, job: &mut Job) {
        let body = match serde_json::to_vec(&job.payload) {
            Ok(body) => body,
            Err(e) => {
                // No network attempt for an unserializable payload.
                job.record_error(e.to_string());
                return;
            }
        };

        let response = self
            .client
            .post(&job.uri)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await;

        let outcome = match response {
            Err(e) => DeliveryOutcome::PermanentFailure(e.to_string()),
            Ok(response) => {
                let status = response.status();
                let body = match response.text().await {
                    Ok(text) => text,
                    Err(e) => {
                        job.record_error(format!("error reading body: {e}"));
                        String::new()
                    }
                };
                debug!(job_id = %job.id, %status, "delivery response");
                classify(status, &body)
            }
        };

        outcome.apply(job);
    }
}
