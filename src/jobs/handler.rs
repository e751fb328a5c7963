use async_trait::async_trait;
use tracing::info;

use super::payload::JobPayload;
use super::queue::JobQueue;
use crate::error::AppError;
use crate::sync::{IngestOutcome, ProfileSynchronizer};

/// Executes the payload of a claimed job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, payload: JobPayload, queue: &JobQueue) -> Result<(), AppError>;
}

/// Runs jobs against the sync pipeline.
pub struct SyncJobHandler {
    sync: ProfileSynchronizer,
}

impl SyncJobHandler {
    pub fn new(sync: ProfileSynchronizer) -> Self {
        Self { sync }
    }
}

#[async_trait]
impl JobHandler for SyncJobHandler {
    async fn handle(&self, payload: JobPayload, queue: &JobQueue) -> Result<(), AppError> {
        match payload {
            JobPayload::FullSync {
                game_name,
                tag_line,
                region,
            } => {
                self.sync.full_sync(&game_name, &tag_line, region).await?;
            }
            JobPayload::IdentityOnlySync {
                game_name,
                tag_line,
                region,
            } => {
                let account = self.sync.identity_sync(&game_name, &tag_line, region).await?;
                info!(puuid = %account.puuid, "🪪 Identity refreshed");
            }
            JobPayload::IngestOneMatch { match_id, region } => {
                match self.sync.ingestor().ingest_match(&match_id, region).await {
                    IngestOutcome::Added | IngestOutcome::Skipped => {}
                    IngestOutcome::Failed(reason) => {
                        return Err(AppError::IngestFailed { match_id, reason });
                    }
                }
            }
            JobPayload::DiscoverAndEnqueue { puuid, region } => {
                self.sync
                    .discover_and_enqueue(&puuid, region, queue)
                    .await?;
            }
        }

        Ok(())
    }
}
