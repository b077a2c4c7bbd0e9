use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::jobs::delivery::Deliverer;
use crate::jobs::model::{Job, NewJob};
use crate::jobs::registry::JobRegistry;
use crate::jobs::store::JobStore;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub workers: usize,
    pub max_retries: i32,
    pub tick: Duration,
    pub channel_capacity: usize,
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            max_retries: 3,
            tick: Duration::from_secs(5),
            channel_capacity: 100,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Orchestrates the scheduler loop, the worker pool, and the result
/// collector over a shared [`JobRegistry`].
///
/// `start` is idempotent and may be called from multiple places; the
/// first successful call seeds the registry from the store's pending
/// set and launches the loops, which then run for the lifetime of the
/// process. A failed `start` leaves the engine not-started so the
/// caller may retry.
pub struct DeliveryEngine {
    store: Arc<dyn JobStore>,
    registry: Arc<JobRegistry>,
    config: EngineConfig,
    started: AsyncMutex<bool>,
}

impl DeliveryEngine {
    pub fn new(store: Arc<dyn JobStore>, config: EngineConfig) -> Self {
        Self {
            store,
            registry: Arc::new(JobRegistry::new()),
            config,
            started: AsyncMutex::new(false),
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        let mut started = self.started.lock().await;
        if *started {
            return Ok(());
        }

        // The engine cannot operate without a consistent starting
        // state; a failed load is fatal to startup, not papered over.
        let pending = self
            .store
            .get_pending_jobs(self.config.max_retries)
            .await
            .context("loading pending jobs")?;

        info!(count = pending.len(), "seeding registry with pending jobs");
        for job in pending {
            self.registry.put(job);
        }

        let (dispatch_tx, dispatch_rx) = mpsc::channel::<Job>(self.config.channel_capacity);
        let (result_tx, result_rx) = mpsc::channel::<Job>(self.config.channel_capacity);
        let dispatch_rx = Arc::new(AsyncMutex::new(dispatch_rx));
        let deliverer = Deliverer::new(self.config.request_timeout)?;

        for worker_id in 0..self.config.workers {
            tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&dispatch_rx),
                result_tx.clone(),
                deliverer.clone(),
            ));
        }

        tokio::spawn(scheduler_loop(
            Arc::clone(&self.registry),
            dispatch_tx,
            self.config.tick,
            self.config.max_retries,
        ));

        tokio::spawn(collector_loop(
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
            result_rx,
        ));

        *started = true;
        Ok(())
    }

    /// Persist a new job, then register it in memory. If the store
    /// rejects the create, the job never enters the registry and is
    /// never scheduled.
    pub async fn enqueue(&self, new_job: NewJob) -> anyhow::Result<Job> {
        let job = self.store.create_job(new_job).await?;
        self.registry.put(job.clone());
        Ok(job)
    }
}

/// Periodic due-job scan. Terminal jobs are pruned from both maps;
/// due, non-in-flight jobs are claimed and submitted. The dispatch
/// channel is bounded, so a full channel blocks the tick rather than
/// dropping jobs.
async fn scheduler_loop(
    registry: Arc<JobRegistry>,
    dispatch_tx: mpsc::Sender<Job>,
    tick: Duration,
    max_retries: i32,
) {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let now = Utc::now();

        for job in registry.snapshot() {
            if job.is_terminal(max_retries) {
                debug!(job_id = %job.id, sent = job.sent, try_count = job.try_count, "pruning terminal job");
                registry.remove(job.id);
                continue;
            }

            if !job.is_due(now) {
                continue;
            }

            // First claim wins; a job already held by a worker stays
            // untouched until the collector clears its mark.
            if !registry.mark_in_flight(job.id) {
                continue;
            }

            // Re-read after claiming: the collector may have stored a
            // newer revision since the snapshot was taken, and a stale
            // clone here would roll back its retry state.
            let Some(job) = registry.get(job.id) else {
                registry.clear_in_flight(job.id);
                continue;
            };
            if job.is_terminal(max_retries) {
                registry.remove(job.id);
                continue;
            }

            if dispatch_tx.send(job).await.is_err() {
                return;
            }
        }
    }
}

/// One of N identical workers pulling from the shared dispatch
/// channel. Workers never touch the registry; every state mutation
/// after an attempt flows through the collector.
async fn worker_loop(
    worker_id: usize,
    dispatch_rx: Arc<AsyncMutex<mpsc::Receiver<Job>>>,
    result_tx: mpsc::Sender<Job>,
    deliverer: Deliverer,
) {
    loop {
        let job = { dispatch_rx.lock().await.recv().await };
        let Some(mut job) = job else {
            return;
        };

        debug!(worker_id, job_id = %job.id, uri = %job.uri, "starting delivery attempt");
        deliverer.attempt(&mut job).await;
        debug!(worker_id, job_id = %job.id, sent = job.sent, try_count = job.try_count, "finished delivery attempt");

        if result_tx.send(job).await.is_err() {
            return;
        }
    }
}

/// Single sequential consumer of completed attempts. Serializing all
/// post-attempt mutation here is what makes per-job locking
/// unnecessary elsewhere.
async fn collector_loop(
    store: Arc<dyn JobStore>,
    registry: Arc<JobRegistry>,
    mut result_rx: mpsc::Receiver<Job>,
) {
    while let Some(mut job) = result_rx.recv().await {
        job.updated_at = Utc::now();

        // Non-fatal: the in-memory state still reflects the attempt,
        // so later ticks behave correctly even if durability lagged.
        if let Err(e) = store.update_job(&job).await {
            warn!(job_id = %job.id, error = %e, "failed to persist job after attempt");
        } else {
            info!(job_id = %job.id, sent = job.sent, try_count = job.try_count, "processed job");
        }

        let id = job.id;
        registry.put(job);
        registry.clear_in_flight(id);
    }
}
