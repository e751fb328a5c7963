use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use riftsync::config::SchedulerSettings;
use riftsync::db::{JobState, Repository, connect_in_memory};
use riftsync::error::AppError;
use riftsync::jobs::{JobHandler, JobPayload, JobQueue, Scheduler};
use riftsync::riot::Platform;

/// Records when each job started; jobs on `EUW1_fail` return an error.
#[derive(Default)]
struct RecordingHandler {
    starts: Mutex<Vec<(String, Instant)>>,
}

impl RecordingHandler {
    fn started(&self) -> Vec<(String, Instant)> {
        self.starts.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobHandler for RecordingHandler {
    async fn handle(&self, payload: JobPayload, _queue: &JobQueue) -> Result<(), AppError> {
        let JobPayload::IngestOneMatch { match_id, .. } = payload else {
            return Ok(());
        };
        self.starts
            .lock()
            .unwrap()
            .push((match_id.clone(), Instant::now()));

        if match_id == "EUW1_fail" {
            return Err(AppError::RiotApi {
                status: 500,
                message: "Internal Server Error".into(),
            });
        }
        Ok(())
    }
}

fn settings(job_interval: Duration) -> SchedulerSettings {
    SchedulerSettings {
        job_interval,
        idle_poll: Duration::from_millis(20),
        ..SchedulerSettings::default()
    }
}

async fn setup(job_interval: Duration) -> (Arc<Scheduler>, JobQueue, Arc<RecordingHandler>) {
    let queue = JobQueue::new(Repository::new(connect_in_memory().await.unwrap()));
    let handler = Arc::new(RecordingHandler::default());
    let scheduler = Arc::new(Scheduler::new(
        queue.clone(),
        handler.clone(),
        settings(job_interval),
    ));
    (scheduler, queue, handler)
}

async fn ingest(queue: &JobQueue, match_id: &str) -> i64 {
    queue
        .enqueue(JobPayload::IngestOneMatch {
            match_id: match_id.into(),
            region: Platform::EUW1,
        })
        .await
        .unwrap()
        .job_id
}

async fn wait_for_starts(handler: &RecordingHandler, count: usize) {
    for _ in 0..300 {
        if handler.started().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("only {} job(s) started", handler.started().len());
}

#[tokio::test]
async fn job_starts_are_spaced_by_interval() {
    let interval = Duration::from_millis(100);
    let (scheduler, queue, handler) = setup(interval).await;
    for i in 1..=5 {
        ingest(&queue, &format!("EUW1_{i}")).await;
    }

    let worker = scheduler.clone().start();
    wait_for_starts(&handler, 5).await;
    worker.abort();

    let starts = handler.started();
    assert_eq!(starts.len(), 5);
    for pair in starts.windows(2) {
        let gap = pair[1].1.duration_since(pair[0].1);
        assert!(gap >= interval, "jobs started {gap:?} apart");
    }
}

#[tokio::test]
async fn failed_job_does_not_stop_worker() {
    let (scheduler, queue, handler) = setup(Duration::from_millis(5)).await;
    let failed = ingest(&queue, "EUW1_fail").await;
    let ok = ingest(&queue, "EUW1_ok").await;

    let worker = scheduler.clone().start();
    wait_for_starts(&handler, 2).await;

    // Give the worker time to record the outcome of the last job.
    for _ in 0..100 {
        if queue.counts().await.unwrap().completed == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    worker.abort();

    let repo = queue.repository();
    let failed = repo.get_job(failed).await.unwrap().unwrap();
    assert_eq!(failed.state, JobState::Failed);
    assert!(failed.last_error.unwrap().contains("500"));
    assert_eq!(
        repo.get_job(ok).await.unwrap().unwrap().state,
        JobState::Completed
    );
}

#[tokio::test]
async fn jobs_submitted_while_idle_wake_the_worker() {
    let (scheduler, queue, handler) = setup(Duration::from_millis(5)).await;
    let worker = scheduler.clone().start();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(handler.started().is_empty());

    ingest(&queue, "EUW1_late").await;
    wait_for_starts(&handler, 1).await;
    worker.abort();

    assert_eq!(handler.started()[0].0, "EUW1_late");
}

#[tokio::test]
async fn duplicate_submissions_run_once() {
    let (scheduler, queue, handler) = setup(Duration::from_millis(5)).await;
    let first = queue
        .submit_match_reprocess("EUW1_dup")
        .await
        .unwrap();
    let second = queue
        .submit_match_reprocess("EUW1_dup")
        .await
        .unwrap();
    assert!(second.deduplicated);
    assert_eq!(first.job_id, second.job_id);

    let worker = scheduler.clone().start();
    wait_for_starts(&handler, 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    worker.abort();

    assert_eq!(handler.started().len(), 1);
}
