use super::models::{JobState, SyncJobRecord};
use super::repository::Repository;
use crate::error::AppError;

/// Number of jobs per lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub queued: i64,
    pub active: i64,
    pub delayed: i64,
    pub completed: i64,
    pub failed: i64,
}

impl Repository {
    /// Insert a queued job unless one with the same dedup key is still pending.
    ///
    /// Returns the job id and whether an existing job was reused. The pending
    /// unique index arbitrates concurrent submitters.
    pub async fn insert_job(
        &self,
        kind: &str,
        payload: &str,
        dedup_key: &str,
        now: i64,
    ) -> Result<(i64, bool), AppError> {
        loop {
            let inserted = sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO sync_jobs (kind, payload, dedup_key, state, run_at, enqueued_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT DO NOTHING
                RETURNING id
                "#,
            )
            .bind(kind)
            .bind(payload)
            .bind(dedup_key)
            .bind(JobState::Queued)
            .bind(now)
            .bind(now)
            .fetch_optional(self.pool())
            .await?;

            if let Some(id) = inserted {
                return Ok((id, false));
            }

            let pending = sqlx::query_scalar::<_, i64>(
                r#"
                SELECT id FROM sync_jobs
                WHERE dedup_key = ? AND state IN ('queued', 'delayed', 'active')
                LIMIT 1
                "#,
            )
            .bind(dedup_key)
            .fetch_optional(self.pool())
            .await?;

            // The pending job may have finished in between; try again.
            if let Some(id) = pending {
                return Ok((id, true));
            }
        }
    }

    pub async fn get_job(&self, id: i64) -> Result<Option<SyncJobRecord>, AppError> {
        let job = sqlx::query_as::<_, SyncJobRecord>("SELECT * FROM sync_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(job)
    }

    /// Put jobs left active by a previous process back in the queue.
    pub async fn requeue_active_jobs(&self) -> Result<u64, AppError> {
        let res = sqlx::query("UPDATE sync_jobs SET state = ?, started_at = NULL WHERE state = ?")
            .bind(JobState::Queued)
            .bind(JobState::Active)
            .execute(self.pool())
            .await?;
        Ok(res.rows_affected())
    }

    /// Move delayed jobs whose backoff elapsed back to the queue.
    pub async fn promote_delayed_jobs(&self, now: i64) -> Result<u64, AppError> {
        let res = sqlx::query("UPDATE sync_jobs SET state = ? WHERE state = ? AND run_at <= ?")
            .bind(JobState::Queued)
            .bind(JobState::Delayed)
            .bind(now)
            .execute(self.pool())
            .await?;
        Ok(res.rows_affected())
    }

    pub async fn has_ready_job(&self, now: i64) -> Result<bool, AppError> {
        let ready = sqlx::query_scalar::<_, i32>(
            "SELECT 1 FROM sync_jobs WHERE state = ? AND run_at <= ? LIMIT 1",
        )
        .bind(JobState::Queued)
        .bind(now)
        .fetch_optional(self.pool())
        .await?;
        Ok(ready.is_some())
    }

    /// Mark the oldest runnable queued job active and return it.
    pub async fn claim_next_job(&self, now: i64) -> Result<Option<SyncJobRecord>, AppError> {
        let job = sqlx::query_as::<_, SyncJobRecord>(
            r#"
            UPDATE sync_jobs
            SET state = ?, attempts = attempts + 1, started_at = ?
            WHERE id = (
                SELECT id FROM sync_jobs
                WHERE state = ? AND run_at <= ?
                ORDER BY run_at ASC, id ASC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(JobState::Active)
        .bind(now)
        .bind(JobState::Queued)
        .bind(now)
        .fetch_optional(self.pool())
        .await?;
        Ok(job)
    }

    pub async fn complete_job(&self, id: i64, now: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE sync_jobs SET state = ?, last_error = NULL, finished_at = ? WHERE id = ?")
            .bind(JobState::Completed)
            .bind(now)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn fail_job(&self, id: i64, error: &str, now: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE sync_jobs SET state = ?, last_error = ?, finished_at = ? WHERE id = ?")
            .bind(JobState::Failed)
            .bind(error)
            .bind(now)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Park a job until `run_at`.
    pub async fn delay_job(&self, id: i64, run_at: i64, error: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE sync_jobs SET state = ?, last_error = ?, run_at = ?, started_at = NULL WHERE id = ?",
        )
        .bind(JobState::Delayed)
        .bind(error)
        .bind(run_at)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Delete the oldest finished jobs beyond the retention limits.
    pub async fn prune_finished_jobs(
        &self,
        keep_completed: u32,
        keep_failed: u32,
    ) -> Result<u64, AppError> {
        let mut pruned = 0;

        for (state, keep) in [
            (JobState::Completed, keep_completed),
            (JobState::Failed, keep_failed),
        ] {
            let res = sqlx::query(
                r#"
                DELETE FROM sync_jobs
                WHERE state = ?
                  AND id NOT IN (
                      SELECT id FROM sync_jobs
                      WHERE state = ?
                      ORDER BY finished_at DESC, id DESC
                      LIMIT ?
                  )
                "#,
            )
            .bind(state)
            .bind(state)
            .bind(keep as i64)
            .execute(self.pool())
            .await?;
            pruned += res.rows_affected();
        }

        Ok(pruned)
    }

    pub async fn count_jobs(&self) -> Result<JobCounts, AppError> {
        let rows = sqlx::query_as::<_, (JobState, i64)>(
            "SELECT state, COUNT(*) FROM sync_jobs GROUP BY state",
        )
        .fetch_all(self.pool())
        .await?;

        let mut counts = JobCounts::default();
        for (state, count) in rows {
            match state {
                JobState::Queued => counts.queued = count,
                JobState::Active => counts.active = count,
                JobState::Delayed => counts.delayed = count,
                JobState::Completed => counts.completed = count,
                JobState::Failed => counts.failed = count,
            }
        }
        Ok(counts)
    }

    /// Average time active jobs have been running, in millis.
    pub async fn active_job_latency(&self, now: i64) -> Result<Option<i64>, AppError> {
        let latency = sqlx::query_scalar::<_, Option<f64>>(
            "SELECT AVG(? - started_at) FROM sync_jobs WHERE state = ? AND started_at IS NOT NULL",
        )
        .bind(now)
        .bind(JobState::Active)
        .fetch_one(self.pool())
        .await?;
        Ok(latency.map(|ms| ms.round() as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    async fn repo() -> Repository {
        Repository::new(connect_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn pending_jobs_are_deduplicated() {
        let repo = repo().await;

        let (first, dedup) = repo.insert_job("full_sync", "{}", "k", 1).await.unwrap();
        assert!(!dedup);
        let (second, dedup) = repo.insert_job("full_sync", "{}", "k", 2).await.unwrap();
        assert!(dedup);
        assert_eq!(first, second);

        // Claimed jobs still block duplicates, finished ones don't.
        repo.claim_next_job(3).await.unwrap().unwrap();
        assert!(repo.insert_job("full_sync", "{}", "k", 4).await.unwrap().1);
        repo.complete_job(first, 5).await.unwrap();
        let (third, dedup) = repo.insert_job("full_sync", "{}", "k", 6).await.unwrap();
        assert!(!dedup);
        assert_ne!(third, first);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submitters_share_a_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("jobs.db").display());
        let pool = crate::db::connect(&url).await.unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        let repo = Repository::new(pool);

        let mut tasks = Vec::new();
        for worker in 0..4 {
            let repo = repo.clone();
            tasks.push(tokio::spawn(async move {
                let mut fresh = Vec::new();
                for i in 0..50 {
                    let own = format!("own-{worker}-{i}");
                    let (_, dedup) = repo.insert_job("x", "{}", &own, i).await?;
                    assert!(!dedup);

                    let shared = format!("shared-{i}");
                    let (id, dedup) = repo.insert_job("x", "{}", &shared, i).await?;
                    if !dedup {
                        fresh.push(id);
                    }
                }
                Ok::<_, AppError>(fresh)
            }));
        }

        let mut fresh_shared = 0;
        for task in tasks {
            fresh_shared += task.await.unwrap().unwrap().len();
        }

        assert_eq!(fresh_shared, 50);
        assert_eq!(repo.count_jobs().await.unwrap().queued, 4 * 50 + 50);
    }

    #[tokio::test]
    async fn claim_takes_oldest_runnable_job() {
        let repo = repo().await;
        let (a, _) = repo.insert_job("x", "{}", "a", 10).await.unwrap();
        let (b, _) = repo.insert_job("x", "{}", "b", 10).await.unwrap();

        let job = repo.claim_next_job(10).await.unwrap().unwrap();
        assert_eq!(job.id, a);
        assert_eq!(job.state, JobState::Active);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.started_at, Some(10));

        let job = repo.claim_next_job(10).await.unwrap().unwrap();
        assert_eq!(job.id, b);
        assert!(repo.claim_next_job(10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delayed_jobs_wait_for_run_at() {
        let repo = repo().await;
        let (id, _) = repo.insert_job("x", "{}", "a", 0).await.unwrap();
        repo.claim_next_job(0).await.unwrap();
        repo.delay_job(id, 5_000, "rate limited").await.unwrap();

        assert_eq!(repo.promote_delayed_jobs(4_999).await.unwrap(), 0);
        assert!(!repo.has_ready_job(4_999).await.unwrap());
        assert!(repo.claim_next_job(4_999).await.unwrap().is_none());

        assert_eq!(repo.promote_delayed_jobs(5_000).await.unwrap(), 1);
        assert!(repo.has_ready_job(5_000).await.unwrap());
        let job = repo.claim_next_job(5_000).await.unwrap().unwrap();
        assert_eq!(job.attempts, 2);
        assert_eq!(job.last_error.as_deref(), Some("rate limited"));
    }

    #[tokio::test]
    async fn active_jobs_are_requeued_on_recovery() {
        let repo = repo().await;
        let (id, _) = repo.insert_job("x", "{}", "a", 0).await.unwrap();
        repo.claim_next_job(0).await.unwrap();

        assert_eq!(repo.requeue_active_jobs().await.unwrap(), 1);
        let job = repo.get_job(id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.started_at, None);
    }

    #[tokio::test]
    async fn prune_keeps_newest_finished_jobs() {
        let repo = repo().await;
        for i in 0..5 {
            let (id, _) = repo
                .insert_job("x", "{}", &format!("c{i}"), i)
                .await
                .unwrap();
            repo.complete_job(id, i).await.unwrap();
        }
        for i in 0..3 {
            let (id, _) = repo
                .insert_job("x", "{}", &format!("f{i}"), i)
                .await
                .unwrap();
            repo.fail_job(id, "boom", i).await.unwrap();
        }

        assert_eq!(repo.prune_finished_jobs(2, 1).await.unwrap(), 5);

        let counts = repo.count_jobs().await.unwrap();
        assert_eq!(counts.completed, 2);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.queued, 0);
    }

    #[tokio::test]
    async fn latency_averages_active_jobs() {
        let repo = repo().await;
        assert_eq!(repo.active_job_latency(0).await.unwrap(), None);

        repo.insert_job("x", "{}", "a", 0).await.unwrap();
        repo.claim_next_job(1_000).await.unwrap();

        assert_eq!(repo.active_job_latency(1_500).await.unwrap(), Some(500));
        assert_eq!(repo.count_jobs().await.unwrap().active, 1);
    }
}
