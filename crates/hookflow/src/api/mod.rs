use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::error;

use crate::jobs::engine::DeliveryEngine;
use crate::jobs::model::{Job, NewJob};
use crate::jobs::store::JobStore;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn JobStore>,
    pub engine: Arc<DeliveryEngine>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/jobs", get(list_jobs).post(create_job))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthBody {
    message: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub uri: String,
    pub error_uri: Option<String>,
    pub execute_at: DateTime<Utc>,
    pub payload: Map<String, Value>,
}

fn internal_err(e: anyhow::Error) -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("internal error: {e}"),
    )
}

/// The destination must be an absolute http(s) URL; anything else is
/// rejected before the job is ever persisted.
fn validate_destination(field: &str, raw: &str) -> Result<(), (StatusCode, String)> {
    let url = reqwest::Url::parse(raw)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid {field}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("invalid {field}: must be an absolute http(s) URL"),
        ));
    }

    Ok(())
}

pub async fn create_job(
    State(state): State<ApiState>,
    Json(body): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<Job>), (StatusCode, String)> {
    validate_destination("uri", &body.uri)?;
    if let Some(error_uri) = &body.error_uri {
        validate_destination("error_uri", error_uri)?;
    }

    let job = state
        .engine
        .enqueue(NewJob {
            uri: body.uri,
            error_uri: body.error_uri,
            execute_at: body.execute_at,
            payload: Value::Object(body.payload),
        })
        .await
        .map_err(internal_err)?;

    Ok((StatusCode::CREATED, Json(job)))
}

pub async fn list_jobs(
    State(state): State<ApiState>,
) -> Result<Json<Vec<Job>>, (StatusCode, String)> {
    let jobs = state.store.get_jobs().await.map_err(internal_err)?;
    Ok(Json(jobs))
}

pub async fn health(State(state): State<ApiState>) -> (StatusCode, Json<HealthBody>) {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthBody {
                message: "healthy".into(),
            }),
        ),
        Err(e) => {
            error!(error = %e, "health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthBody {
                    message: "unhealthy".into(),
                }),
            )
        }
    }
}
