use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{debug, info};

use super::payload::JobPayload;
use crate::clock::now_millis;
use crate::db::{JobCounts, Repository};
use crate::error::AppError;
use crate::riot::Platform;

/// Receipt of a job submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobAck {
    pub job_id: i64,
    /// The work was already pending under `job_id`.
    pub deduplicated: bool,
}

/// Durable job queue backed by the `sync_jobs` table.
#[derive(Clone, Debug)]
pub struct JobQueue {
    repo: Repository,
    notify: Arc<Notify>,
}

impl JobQueue {
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Persist a job and wake the worker.
    pub async fn enqueue(&self, payload: JobPayload) -> Result<JobAck, AppError> {
        let body = serde_json::to_string(&payload)?;
        let (job_id, deduplicated) = self
            .repo
            .insert_job(payload.kind(), &body, &payload.dedup_key(), now_millis())
            .await?;

        if deduplicated {
            debug!(job_id, kind = payload.kind(), subject = %payload.subject(), "📋 Job already pending");
        } else {
            info!(job_id, kind = payload.kind(), subject = %payload.subject(), "📋 Job queued");
            self.notify.notify_one();
        }

        Ok(JobAck {
            job_id,
            deduplicated,
        })
    }

    pub async fn submit_full_sync(
        &self,
        game_name: &str,
        tag_line: &str,
        region: Platform,
    ) -> Result<JobAck, AppError> {
        self.enqueue(JobPayload::FullSync {
            game_name: game_name.to_string(),
            tag_line: tag_line.to_string(),
            region,
        })
        .await
    }

    pub async fn submit_identity_sync(
        &self,
        game_name: &str,
        tag_line: &str,
        region: Platform,
    ) -> Result<JobAck, AppError> {
        self.enqueue(JobPayload::IdentityOnlySync {
            game_name: game_name.to_string(),
            tag_line: tag_line.to_string(),
            region,
        })
        .await
    }

    /// Queue a single match for ingestion; the region is read from the id.
    pub async fn submit_match_reprocess(&self, match_id: &str) -> Result<JobAck, AppError> {
        let region = Platform::from_match_id(match_id)
            .ok_or_else(|| AppError::InvalidRegion(match_id.to_string()))?;

        self.enqueue(JobPayload::IngestOneMatch {
            match_id: match_id.to_string(),
            region,
        })
        .await
    }

    pub async fn counts(&self) -> Result<JobCounts, AppError> {
        self.repo.count_jobs().await
    }

    /// Resolves once a job was enqueued after the last wake-up.
    pub(crate) async fn notified(&self) {
        self.notify.notified().await
    }
}
