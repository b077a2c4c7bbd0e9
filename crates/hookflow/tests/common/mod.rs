use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use uuid::Uuid;

use hookflow::jobs::engine::EngineConfig;
use hookflow::jobs::model::{Job, NewJob};
use hookflow::jobs::store::JobStore;

/// In-process store double. Assigns ids and timestamps on create the
/// way the Postgres store does, and can be told to reject creates.
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<Uuid, Job>>,
    fail_creates: bool,
}

impl MemoryJobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            jobs: Mutex::new(HashMap::new()),
            fail_creates: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            jobs: Mutex::new(HashMap::new()),
            fail_creates: true,
        })
    }

    /// Seed a job directly, bypassing create. Used to model rows that
    /// already exist at engine startup.
    #[allow(dead_code)]
    pub fn insert(&self, job: Job) {
        self.jobs.lock().insert(job.id, job);
    }

    #[allow(dead_code)]
    pub fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.lock().get(&id).cloned()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_job(&self, job: NewJob) -> anyhow::Result<Job> {
        if self.fail_creates {
            anyhow::bail!("create rejected");
        }

        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            uri: job.uri,
            error_uri: job.error_uri,
            execute_at: job.execute_at,
            payload: job.payload,
            errors: Vec::new(),
            sent: false,
            try_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.jobs.lock().insert(job.id, job.clone());
        Ok(job)
    }

    async fn update_job(&self, job: &Job) -> anyhow::Result<()> {
        self.jobs.lock().insert(job.id, job.clone());
        Ok(())
    }

    async fn get_jobs(&self) -> anyhow::Result<Vec<Job>> {
        Ok(self.jobs.lock().values().cloned().collect())
    }

    async fn get_pending_jobs(&self, max_retries: i32) -> anyhow::Result<Vec<Job>> {
        Ok(self
            .jobs
            .lock()
            .values()
            .filter(|j| j.try_count > -1 && j.try_count <= max_retries && !j.sent)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Local delivery target that answers every POST with a fixed status
/// and body, recording when each hit arrived.
pub struct TargetServer {
    pub uri: String,
    hits: Arc<Mutex<Vec<Instant>>>,
}

impl TargetServer {
    pub async fn start(status: StatusCode, body: &'static str) -> Self {
        let hits: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));

        let app = Router::new().route(
            "/hook",
            post({
                let hits = Arc::clone(&hits);
                move || {
                    let hits = Arc::clone(&hits);
                    async move {
                        hits.lock().push(Instant::now());
                        (status, body)
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind target server");
        let addr = listener.local_addr().expect("target server addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("target server");
        });

        Self {
            uri: format!("http://{addr}/hook"),
            hits,
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.lock().len()
    }

    #[allow(dead_code)]
    pub fn hit_times(&self) -> Vec<Instant> {
        self.hits.lock().clone()
    }
}

/// A job that became due ten minutes ago.
#[allow(dead_code)]
pub fn due_job(uri: &str) -> NewJob {
    NewJob {
        uri: uri.to_string(),
        error_uri: None,
        execute_at: Utc::now() - chrono::Duration::minutes(10),
        payload: json!({"event": "test"}),
    }
}

/// Fast-tick engine configuration for tests.
#[allow(dead_code)]
pub fn test_config(max_retries: i32) -> EngineConfig {
    EngineConfig {
        workers: 2,
        max_retries,
        tick: Duration::from_millis(100),
        channel_capacity: 100,
        request_timeout: Duration::from_secs(5),
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
#[allow(dead_code)]
pub async fn wait_for(condition: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
