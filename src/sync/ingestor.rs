use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::clock::now_millis;
use crate::db::Repository;
use crate::error::AppError;
use crate::riot::{Platform, RiotApi};

/// Result of ingesting one match id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Added,
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedMatch {
    pub match_id: String,
    pub reason: String,
}

/// Where every id of a batch ended up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchLedger {
    pub added: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<FailedMatch>,
}

impl MatchLedger {
    pub fn len(&self) -> usize {
        self.added.len() + self.skipped.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&mut self, match_id: String, outcome: IngestOutcome) {
        match outcome {
            IngestOutcome::Added => self.added.push(match_id),
            IngestOutcome::Skipped => self.skipped.push(match_id),
            IngestOutcome::Failed(reason) => self.failed.push(FailedMatch { match_id, reason }),
        }
    }
}

/// Fetches match details and stores them once.
#[derive(Clone)]
pub struct MatchIngestor {
    repo: Repository,
    api: Arc<dyn RiotApi>,
    max_rate_limit_attempts: u32,
    rate_limit_slack: Duration,
}

impl MatchIngestor {
    pub fn new(
        repo: Repository,
        api: Arc<dyn RiotApi>,
        max_rate_limit_attempts: u32,
        rate_limit_slack: Duration,
    ) -> Self {
        Self {
            repo,
            api,
            max_rate_limit_attempts: max_rate_limit_attempts.max(1),
            rate_limit_slack,
        }
    }

    /// Ingest one match, sleeping through rate limits until the attempt cap.
    #[instrument(skip(self))]
    pub async fn ingest_match(&self, match_id: &str, region: Platform) -> IngestOutcome {
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.try_ingest(match_id, region).await {
                Ok(outcome) => return outcome,
                Err(AppError::RateLimited { retry_after }) if attempts < self.max_rate_limit_attempts => {
                    warn!(attempts, retry_after_ms = retry_after.as_millis() as u64, "📥 ⚠️ Rate limited, retrying match");
                    tokio::time::sleep(retry_after + self.rate_limit_slack).await;
                }
                Err(e) => return self.failed(match_id, &e),
            }
        }
    }

    /// Ingest a batch of match ids.
    ///
    /// Ids hitting a rate limit in the first pass are retried after the
    /// first pass, each up to the attempt cap. Every id ends up in exactly
    /// one list of the returned ledger.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn process_matches(
        &self,
        puuid: &str,
        region: Platform,
        ids: &[String],
    ) -> MatchLedger {
        let mut ledger = MatchLedger::default();
        let mut retry_queue = VecDeque::new();

        for match_id in ids {
            match self.try_ingest(match_id, region).await {
                Ok(outcome) => ledger.record(match_id.clone(), outcome),
                Err(AppError::RateLimited { retry_after }) if self.max_rate_limit_attempts > 1 => {
                    warn!(%match_id, "📥 ⚠️ Rate limited, queued for retry");
                    tokio::time::sleep(retry_after + self.rate_limit_slack).await;
                    retry_queue.push_back((match_id, 1));
                }
                Err(e) => {
                    let outcome = self.failed(match_id, &e);
                    ledger.record(match_id.clone(), outcome);
                }
            }
        }

        while let Some((match_id, attempts)) = retry_queue.pop_front() {
            let attempts = attempts + 1;
            match self.try_ingest(match_id, region).await {
                Ok(outcome) => ledger.record(match_id.clone(), outcome),
                Err(AppError::RateLimited { retry_after }) if attempts < self.max_rate_limit_attempts => {
                    warn!(%match_id, attempts, "📥 ⚠️ Rate limited again, requeued");
                    tokio::time::sleep(retry_after + self.rate_limit_slack).await;
                    retry_queue.push_back((match_id, attempts));
                }
                Err(e) => {
                    let outcome = self.failed(match_id, &e);
                    ledger.record(match_id.clone(), outcome);
                }
            }
        }

        info!(
            puuid,
            added = ledger.added.len(),
            skipped = ledger.skipped.len(),
            failed = ledger.failed.len(),
            "📥 ✅ Matches processed"
        );
        ledger
    }

    async fn try_ingest(&self, match_id: &str, region: Platform) -> Result<IngestOutcome, AppError> {
        if self.repo.match_exists(match_id).await? {
            debug!(match_id, "📥 Match already stored");
            return Ok(IngestOutcome::Skipped);
        }

        let match_data = self.api.match_by_id(region.to_region(), match_id).await?;

        // A concurrent writer may have committed the match in between.
        if self.repo.insert_match(&match_data, region, now_millis()).await? {
            debug!(match_id, "📥 Match stored");
            Ok(IngestOutcome::Added)
        } else {
            Ok(IngestOutcome::Skipped)
        }
    }

    fn failed(&self, match_id: &str, error: &AppError) -> IngestOutcome {
        warn!(match_id, error = ?error, "📥 ❌ Failed to ingest match");
        IngestOutcome::Failed(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::testing::{StubRiotApi, match_fixture};

    async fn setup(api: StubRiotApi, max_attempts: u32) -> (MatchIngestor, Repository, Arc<StubRiotApi>) {
        let repo = Repository::new(connect_in_memory().await.unwrap());
        let api = Arc::new(api);
        let ingestor = MatchIngestor::new(repo.clone(), api.clone(), max_attempts, Duration::ZERO);
        (ingestor, repo, api)
    }

    fn game(id: &str) -> crate::riot::MatchDto {
        match_fixture(id, 10_000_000, &[("p1", "abc", "1"), ("p2", "def", "2")])
    }

    #[tokio::test]
    async fn stored_match_is_skipped_without_fetch() {
        let (ingestor, _, api) = setup(StubRiotApi::new().with_match(game("EUW1_1")), 5).await;

        assert_eq!(ingestor.ingest_match("EUW1_1", Platform::EUW1).await, IngestOutcome::Added);
        assert_eq!(ingestor.ingest_match("EUW1_1", Platform::EUW1).await, IngestOutcome::Skipped);
        assert_eq!(api.match_calls("EUW1_1"), 1);
    }

    #[tokio::test]
    async fn rate_limit_is_retried_until_success() {
        let (ingestor, repo, api) = setup(
            StubRiotApi::new()
                .with_match(game("EUW1_1"))
                .with_match_rate_limit("EUW1_1", 2),
            5,
        )
        .await;

        assert_eq!(ingestor.ingest_match("EUW1_1", Platform::EUW1).await, IngestOutcome::Added);
        assert_eq!(api.match_calls("EUW1_1"), 3);
        assert_eq!(repo.get_match_participations("EUW1_1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rate_limit_gives_up_at_cap() {
        let (ingestor, repo, api) = setup(
            StubRiotApi::new()
                .with_match(game("EUW1_1"))
                .with_match_rate_limit("EUW1_1", 10),
            3,
        )
        .await;

        let outcome = ingestor.ingest_match("EUW1_1", Platform::EUW1).await;

        assert!(matches!(outcome, IngestOutcome::Failed(_)));
        assert_eq!(api.match_calls("EUW1_1"), 3);
        assert!(!repo.match_exists("EUW1_1").await.unwrap());
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let (ingestor, _, api) = setup(StubRiotApi::new(), 5).await;

        let outcome = ingestor.ingest_match("EUW1_404", Platform::EUW1).await;

        assert!(matches!(outcome, IngestOutcome::Failed(_)));
        assert_eq!(api.match_calls("EUW1_404"), 1);
    }

    #[tokio::test]
    async fn batch_retries_rate_limited_ids_after_first_pass() {
        let (ingestor, _, api) = setup(
            StubRiotApi::new()
                .with_match(game("EUW1_1"))
                .with_match(game("EUW1_2"))
                .with_match(game("EUW1_3"))
                .with_match_rate_limit("EUW1_2", 1),
            5,
        )
        .await;
        let ids: Vec<String> = ["EUW1_1", "EUW1_2", "EUW1_3"].map(String::from).into();

        let ledger = ingestor.process_matches("p1", Platform::EUW1, &ids).await;

        assert_eq!(ledger.added, vec!["EUW1_1", "EUW1_3", "EUW1_2"]);
        assert!(ledger.skipped.is_empty());
        assert!(ledger.failed.is_empty());
        assert_eq!(api.match_calls("EUW1_2"), 2);
    }

    #[tokio::test]
    async fn batch_accounts_for_every_id() {
        let (ingestor, _, _) = setup(
            StubRiotApi::new()
                .with_match(game("EUW1_1"))
                .with_match(game("EUW1_2"))
                .with_match_rate_limit("EUW1_2", 10),
            2,
        )
        .await;
        ingestor.ingest_match("EUW1_1", Platform::EUW1).await;
        let ids: Vec<String> = ["EUW1_1", "EUW1_2", "EUW1_missing"].map(String::from).into();

        let ledger = ingestor.process_matches("p1", Platform::EUW1, &ids).await;

        assert_eq!(ledger.len(), ids.len());
        assert_eq!(ledger.skipped, vec!["EUW1_1"]);
        let failed: Vec<_> = ledger.failed.iter().map(|f| f.match_id.as_str()).collect();
        assert_eq!(failed, vec!["EUW1_missing", "EUW1_2"]);
    }
}
