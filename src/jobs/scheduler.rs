use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::handler::JobHandler;
use super::payload::JobPayload;
use super::queue::JobQueue;
use crate::clock::now_millis;
use crate::config::SchedulerSettings;
use crate::db::{JobCounts, SyncJobRecord};
use crate::error::AppError;

/// Snapshot of the queue and the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerMetrics {
    pub counts: JobCounts,
    pub worker_alive: bool,
    /// Average age of the active jobs, in millis.
    pub active_latency_ms: Option<i64>,
}

/// Single worker pulling jobs from the queue, one at a time.
///
/// Job starts are spaced by at least `job_interval`, whatever the job duration.
pub struct Scheduler {
    queue: JobQueue,
    handler: Arc<dyn JobHandler>,
    settings: SchedulerSettings,
    throttle: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    alive: AtomicBool,
    /// Outcome of a finished job whose state could not be written yet.
    unsettled: Mutex<Option<(i64, JobOutcome)>>,
}

/// Final state a job run leads to.
#[derive(Debug, Clone)]
enum JobOutcome {
    Completed,
    Delayed { run_at: i64, error: String },
    Failed(String),
}

/// Clears the liveness flag when the worker loop exits or is aborted.
struct AliveGuard<'a>(&'a AtomicBool);

impl Drop for AliveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Scheduler {
    pub fn new(queue: JobQueue, handler: Arc<dyn JobHandler>, settings: SchedulerSettings) -> Self {
        let quota = Quota::with_period(settings.job_interval.max(Duration::from_millis(1)))
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::MIN);

        Self {
            queue,
            handler,
            settings,
            throttle: RateLimiter::direct(quota),
            alive: AtomicBool::new(false),
            unsettled: Mutex::new(None),
        }
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Spawn a task logging the scheduler metrics once a minute.
    pub fn start_metrics_logging(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.metrics_log_loop().await })
    }

    pub async fn metrics(&self) -> Result<SchedulerMetrics, AppError> {
        let repo = self.queue.repository();
        Ok(SchedulerMetrics {
            counts: repo.count_jobs().await?,
            worker_alive: self.alive.load(Ordering::SeqCst),
            active_latency_ms: repo.active_job_latency(now_millis()).await?,
        })
    }

    async fn run(&self) {
        self.alive.store(true, Ordering::SeqCst);
        let _alive = AliveGuard(&self.alive);

        match self.queue.repository().requeue_active_jobs().await {
            Ok(0) => {}
            Ok(count) => warn!(count, "⚙️ Requeued jobs interrupted by a previous run"),
            Err(e) => error!(error = ?e, "⚙️ ❌ Failed to requeue interrupted jobs"),
        }

        info!(
            interval_ms = self.settings.job_interval.as_millis() as u64,
            "⚙️ Job worker started"
        );

        loop {
            match self.run_next().await {
                Ok(true) => {}
                Ok(false) => self.wait_for_work().await,
                Err(e) => {
                    error!(error = ?e, "⚙️ ❌ Job worker iteration failed");
                    tokio::time::sleep(self.settings.idle_poll).await;
                }
            }
        }
    }

    async fn wait_for_work(&self) {
        tokio::select! {
            _ = self.queue.notified() => {}
            _ = tokio::time::sleep(self.settings.idle_poll) => {}
        }
    }

    /// Run the next ready job, if any. Returns whether a job ran.
    pub async fn run_next(&self) -> Result<bool, AppError> {
        let repo = self.queue.repository();

        self.settle_pending().await?;
        repo.promote_delayed_jobs(now_millis()).await?;
        if !repo.has_ready_job(now_millis()).await? {
            return Ok(false);
        }

        self.throttle.until_ready().await;

        let Some(job) = repo.claim_next_job(now_millis()).await? else {
            return Ok(false);
        };

        let job_id = job.id;
        let outcome = self.execute(job).await;
        self.settle(job_id, outcome).await?;

        let pruned = repo
            .prune_finished_jobs(
                self.settings.completed_retention,
                self.settings.failed_retention,
            )
            .await?;
        if pruned > 0 {
            debug!(pruned, "⚙️ Pruned finished jobs");
        }

        Ok(true)
    }

    /// Write the outcome of a finished job. On failure the outcome is held
    /// and written again before the next job is claimed.
    async fn settle(&self, job_id: i64, outcome: JobOutcome) -> Result<(), AppError> {
        if let Err(e) = self.record(job_id, &outcome).await {
            error!(job_id, error = ?e, "⚙️ ❌ Failed to record job outcome, will retry");
            if let Ok(mut unsettled) = self.unsettled.lock() {
                *unsettled = Some((job_id, outcome));
            }
            return Err(e);
        }
        Ok(())
    }

    async fn settle_pending(&self) -> Result<(), AppError> {
        let pending = match self.unsettled.lock() {
            Ok(mut unsettled) => unsettled.take(),
            Err(_) => None,
        };
        match pending {
            Some((job_id, outcome)) => {
                self.settle(job_id, outcome).await?;
                info!(job_id, "⚙️ Recorded held job outcome");
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn record(&self, job_id: i64, outcome: &JobOutcome) -> Result<(), AppError> {
        let repo = self.queue.repository();
        match outcome {
            JobOutcome::Completed => repo.complete_job(job_id, now_millis()).await,
            JobOutcome::Delayed { run_at, error } => repo.delay_job(job_id, *run_at, error).await,
            JobOutcome::Failed(error) => repo.fail_job(job_id, error, now_millis()).await,
        }
    }

    async fn execute(&self, job: SyncJobRecord) -> JobOutcome {
        let payload: JobPayload = match serde_json::from_str(&job.payload) {
            Ok(payload) => payload,
            Err(e) => {
                error!(job_id = job.id, kind = %job.kind, error = ?e, "⚙️ ❌ Unreadable job payload");
                return JobOutcome::Failed(format!("invalid payload: {e}"));
            }
        };

        let subject = payload.subject();
        let span = info_span!("job", id = job.id, kind = %job.kind, attempt = job.attempts);
        let handler = self.handler.clone();
        let queue = self.queue.clone();

        // A panicking job only takes its own task down.
        let result = tokio::spawn(
            async move { handler.handle(payload, &queue).await }.instrument(span),
        )
        .await;

        match result {
            Ok(Ok(())) => {
                info!(job_id = job.id, kind = %job.kind, %subject, "⚙️ ✅ Job completed");
                JobOutcome::Completed
            }
            Ok(Err(e)) => match e.retry_after() {
                Some(retry_after) if job.attempts < self.settings.max_attempts as i64 => {
                    let delay = retry_after + self.settings.rate_limit_slack;
                    warn!(
                        job_id = job.id,
                        kind = %job.kind,
                        %subject,
                        attempt = job.attempts,
                        delay_ms = delay.as_millis() as u64,
                        "⚙️ ⚠️ Job rate limited, delayed"
                    );
                    JobOutcome::Delayed {
                        run_at: now_millis() + delay.as_millis() as i64,
                        error: e.to_string(),
                    }
                }
                _ => {
                    error!(job_id = job.id, kind = %job.kind, %subject, error = ?e, "⚙️ ❌ Job failed");
                    JobOutcome::Failed(e.to_string())
                }
            },
            Err(join_error) => {
                error!(job_id = job.id, kind = %job.kind, %subject, error = ?join_error, "⚙️ ❌ Job panicked");
                JobOutcome::Failed(format!("job panicked: {join_error}"))
            }
        }
    }

    async fn metrics_log_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            let span = info_span!("📊 ", worker = "jobs");
            async {
                interval.tick().await;
                match self.metrics().await {
                    Ok(m) => info!(
                        queued = m.counts.queued,
                        active = m.counts.active,
                        delayed = m.counts.delayed,
                        completed = m.counts.completed,
                        failed = m.counts.failed,
                        worker_alive = m.worker_alive,
                        active_latency_ms = m.active_latency_ms,
                        "job queue status"
                    ),
                    Err(e) => warn!(error = ?e, "📊 ⚠️ Failed to read job metrics"),
                }
            }
            .instrument(span)
            .await;
        }
    }
}
