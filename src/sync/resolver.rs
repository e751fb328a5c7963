use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::clock::now_millis;
use crate::db::{Account, Repository, ResolvedAccount};
use crate::error::AppError;
use crate::riot::{Platform, RiotApi};

/// Maps a Riot id to the stable account behind it.
#[derive(Clone)]
pub struct AccountResolver {
    repo: Repository,
    api: Arc<dyn RiotApi>,
    freshness_window: Duration,
}

impl AccountResolver {
    pub fn new(repo: Repository, api: Arc<dyn RiotApi>, freshness_window: Duration) -> Self {
        Self {
            repo,
            api,
            freshness_window,
        }
    }

    /// Stored account for the Riot id when verified recently, otherwise the
    /// account returned by a fresh upstream lookup.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        game_name: &str,
        tag_line: &str,
        region: Platform,
    ) -> Result<Account, AppError> {
        let cached = self
            .repo
            .get_account_by_riot_id(game_name, tag_line, region)
            .await?;

        if let Some(account) = cached.filter(|a| a.is_fresh(now_millis(), self.freshness_window)) {
            debug!(puuid = %account.puuid, "🪪 Using cached account");
            return Ok(account);
        }

        self.resolve_fresh(game_name, tag_line, region).await
    }

    /// Look the Riot id up upstream and store the result, ignoring the cache.
    #[instrument(skip(self))]
    pub async fn resolve_fresh(
        &self,
        game_name: &str,
        tag_line: &str,
        region: Platform,
    ) -> Result<Account, AppError> {
        let identity = self
            .api
            .account_by_riot_id(region.to_region(), game_name, tag_line)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    AppError::PlayerNotFound {
                        game_name: game_name.to_string(),
                        tag_line: tag_line.to_string(),
                    }
                } else {
                    e
                }
            })?;

        let (profile_icon_id, summoner_level) =
            match self.api.summoner_by_puuid(region, &identity.puuid).await {
                Ok(summoner) => (Some(summoner.profile_icon_id), Some(summoner.summoner_level)),
                Err(e @ AppError::RateLimited { .. }) => return Err(e),
                Err(e) => {
                    warn!(error = ?e, puuid = %identity.puuid, "🪪 ⚠️ Failed to fetch summoner profile");
                    (None, None)
                }
            };

        let resolved = ResolvedAccount {
            game_name: identity.game_name.unwrap_or_else(|| game_name.to_string()),
            tag_line: identity.tag_line.unwrap_or_else(|| tag_line.to_string()),
            puuid: identity.puuid,
            region,
            profile_icon_id,
            summoner_level,
        };

        let account = self.repo.save_resolved_account(&resolved, now_millis()).await?;
        info!(puuid = %account.puuid, riot_id = %account.riot_id(), "🪪 ✅ Account resolved");
        Ok(account)
    }
}
