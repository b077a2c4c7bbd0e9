use async_trait::async_trait;
use sqlx::PgPool;

use crate::jobs::model::{Job, NewJob};

/// Persistence port consumed by the delivery engine and the API.
///
/// `get_pending_jobs` takes the engine's retry ceiling explicitly so
/// the store's notion of "still pending" can never drift from the
/// engine's configured `max_retries`.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Durably insert a new job and return the stored record with its
    /// generated id and timestamps.
    async fn create_job(&self, job: NewJob) -> anyhow::Result<Job>;

    /// Persist the mutable fields (`errors`, `sent`, `try`,
    /// `updated_at`) keyed by id.
    async fn update_job(&self, job: &Job) -> anyhow::Result<()>;

    async fn get_jobs(&self) -> anyhow::Result<Vec<Job>>;

    /// Jobs eligible for in-memory seeding at startup: retryable range
    /// and not yet delivered.
    async fn get_pending_jobs(&self, max_retries: i32) -> anyhow::Result<Vec<Job>>;

    async fn ping(&self) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create_job(&self, job: NewJob) -> anyhow::Result<Job> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (uri, error_uri, execute_at, payload)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&job.uri)
        .bind(&job.error_uri)
        .bind(job.execute_at)
        .bind(&job.payload)
        .fetch_one(&self.pool)
        .await?;

        Ok(job)
    }

    async fn update_job(&self, job: &Job) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET errors = $2,
                sent = $3,
                "try" = $4,
                updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(&job.errors)
        .bind(job.sent)
        .bind(job.try_count)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_jobs(&self) -> anyhow::Result<Vec<Job>> {
        let jobs = sqlx::query_as::<_, Job>("SELECT * FROM jobs ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        Ok(jobs)
    }

    async fn get_pending_jobs(&self, max_retries: i32) -> anyhow::Result<Vec<Job>> {
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE "try" > -1
              AND "try" <= $1
              AND sent = false
            "#,
        )
        .bind(max_retries)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
