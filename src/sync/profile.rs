use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::discovery::MatchDiscovery;
use super::ingestor::{MatchIngestor, MatchLedger};
use super::resolver::AccountResolver;
use crate::clock::now_millis;
use crate::config::SyncSettings;
use crate::db::{Account, Repository};
use crate::error::AppError;
use crate::jobs::{JobPayload, JobQueue};
use crate::riot::{Platform, RiotApi};

/// Result of one unit of a full sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Number of rows or ids handled.
    Synced(usize),
    Failed(String),
}

impl UnitOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub account: Account,
    pub challenge_catalog: UnitOutcome,
    pub champion_catalog: UnitOutcome,
    pub masteries: UnitOutcome,
    pub challenges: UnitOutcome,
    pub discovery: UnitOutcome,
    pub matches: MatchLedger,
}

impl SyncReport {
    pub fn failed_units(&self) -> usize {
        [
            &self.challenge_catalog,
            &self.champion_catalog,
            &self.masteries,
            &self.challenges,
            &self.discovery,
        ]
        .into_iter()
        .filter(|unit| unit.is_failed())
        .count()
    }
}

/// Drives identity resolution, profile refreshes and match ingestion.
#[derive(Clone)]
pub struct ProfileSynchronizer {
    repo: Repository,
    api: Arc<dyn RiotApi>,
    resolver: AccountResolver,
    discovery: MatchDiscovery,
    ingestor: MatchIngestor,
    settings: SyncSettings,
}

impl ProfileSynchronizer {
    pub fn new(repo: Repository, api: Arc<dyn RiotApi>, settings: SyncSettings) -> Self {
        Self {
            resolver: AccountResolver::new(repo.clone(), api.clone(), settings.freshness_window),
            discovery: MatchDiscovery::new(api.clone(), settings.page_size, settings.discovery_cap),
            ingestor: MatchIngestor::new(
                repo.clone(),
                api.clone(),
                settings.max_rate_limit_attempts,
                settings.rate_limit_slack,
            ),
            repo,
            api,
            settings,
        }
    }

    pub fn ingestor(&self) -> &MatchIngestor {
        &self.ingestor
    }

    /// Resolve an account and refresh everything stored about it.
    ///
    /// Fails only when the account cannot be resolved; other failures are
    /// reported per unit.
    #[instrument(skip(self))]
    pub async fn full_sync(
        &self,
        game_name: &str,
        tag_line: &str,
        region: Platform,
    ) -> Result<SyncReport, AppError> {
        let catalogs = async {
            tokio::join!(
                self.sync_challenge_catalog(region),
                self.sync_champion_catalog()
            )
        };
        let ((challenge_catalog, champion_catalog), account) = tokio::join!(
            catalogs,
            self.resolver.resolve(game_name, tag_line, region)
        );
        let account = account?;

        let (masteries, challenges) = tokio::join!(
            self.sync_masteries(&account, region),
            self.sync_challenges(&account, region)
        );

        let since = self.history_since(account.last_match_sync_at);
        let (discovery, matches) = match self.discover(&account.puuid, region, since).await {
            Ok(ids) => {
                let ledger = self
                    .ingestor
                    .process_matches(&account.puuid, region, &ids)
                    .await;
                if ledger.failed.is_empty() {
                    self.advance_watermark(&account.puuid).await;
                }
                (UnitOutcome::Synced(ids.len()), ledger)
            }
            Err(e) => (unit_failed("discovery", e), MatchLedger::default()),
        };

        let report = SyncReport {
            account,
            challenge_catalog,
            champion_catalog,
            masteries,
            challenges,
            discovery,
            matches,
        };

        info!(
            puuid = %report.account.puuid,
            failed_units = report.failed_units(),
            added = report.matches.added.len(),
            "🔁 ✅ Full sync finished"
        );
        Ok(report)
    }

    /// Re-verify an identity upstream, bypassing the freshness window.
    pub async fn identity_sync(
        &self,
        game_name: &str,
        tag_line: &str,
        region: Platform,
    ) -> Result<Account, AppError> {
        self.resolver
            .resolve_fresh(game_name, tag_line, region)
            .await
    }

    /// Queue an ingestion job for every discovered match not stored yet.
    ///
    /// Returns the number of newly queued jobs.
    #[instrument(skip(self, queue))]
    pub async fn discover_and_enqueue(
        &self,
        puuid: &str,
        region: Platform,
        queue: &JobQueue,
    ) -> Result<usize, AppError> {
        let watermark = self
            .repo
            .get_account(puuid)
            .await?
            .and_then(|account| account.last_match_sync_at);
        let ids = self
            .discover(puuid, region, self.history_since(watermark))
            .await?;
        let mut queued = 0;

        for match_id in ids {
            if self.repo.match_exists(&match_id).await? {
                continue;
            }
            let ack = queue
                .enqueue(JobPayload::IngestOneMatch { match_id, region })
                .await?;
            if !ack.deduplicated {
                queued += 1;
            }
        }

        info!(queued, "🔎 ✅ Match ingestion jobs queued");
        Ok(queued)
    }

    /// Discovery lower bound in epoch seconds: the history watermark, else the
    /// configured lookback.
    ///
    /// Matches stored while the account was only seen as a participant do not
    /// count; only a completed history sync moves the watermark.
    fn history_since(&self, watermark: Option<i64>) -> Option<i64> {
        match watermark {
            Some(start) => Some(start / 1000),
            None => self
                .settings
                .match_lookback
                .map(|lookback| (now_millis() - lookback.as_millis() as i64) / 1000),
        }
    }

    async fn discover(
        &self,
        puuid: &str,
        region: Platform,
        since: Option<i64>,
    ) -> Result<Vec<String>, AppError> {
        self.discovery
            .discover_by_puuid(puuid, region, since, 0)
            .await
    }

    /// Move the watermark to the newest stored match once every discovered
    /// id has been stored.
    async fn advance_watermark(&self, puuid: &str) {
        let result = async {
            if let Some(start) = self.repo.get_latest_match_start(puuid).await? {
                self.repo.set_match_sync_watermark(puuid, start).await?;
            }
            Ok::<_, AppError>(())
        }
        .await;

        if let Err(e) = result {
            warn!(puuid, error = ?e, "🔁 ⚠️ Failed to record match sync watermark");
        }
    }

    async fn sync_masteries(&self, account: &Account, region: Platform) -> UnitOutcome {
        let result = async {
            let masteries = self.api.champion_masteries(region, &account.puuid).await?;
            self.repo
                .save_masteries(&account.puuid, &masteries, now_millis())
                .await
        }
        .await;

        unit("masteries", result)
    }

    async fn sync_challenges(&self, account: &Account, region: Platform) -> UnitOutcome {
        let result = async {
            let player = self.api.player_challenges(region, &account.puuid).await?;
            self.repo
                .save_challenge_progress(&account.puuid, &player.challenges, now_millis())
                .await
        }
        .await;

        unit("challenges", result)
    }

    async fn sync_challenge_catalog(&self, region: Platform) -> UnitOutcome {
        let result = async {
            let configs = self.api.challenge_config(region).await?;
            self.repo.save_challenge_catalog(&configs, now_millis()).await
        }
        .await;

        unit("challenge_catalog", result)
    }

    async fn sync_champion_catalog(&self) -> UnitOutcome {
        let result = async {
            let catalog = self.api.champion_catalog().await?;
            self.repo.save_champion_catalog(&catalog, now_millis()).await
        }
        .await;

        unit("champion_catalog", result)
    }
}

fn unit(name: &'static str, result: Result<usize, AppError>) -> UnitOutcome {
    match result {
        Ok(count) => UnitOutcome::Synced(count),
        Err(e) => unit_failed(name, e),
    }
}

fn unit_failed(name: &'static str, error: AppError) -> UnitOutcome {
    warn!(unit = name, error = ?error, "🔁 ⚠️ Sync unit failed");
    UnitOutcome::Failed(error.to_string())
}
