//! Typed access to the Riot API.
//!
//! [`RiotApi`] is the surface the sync pipeline depends on; [`RiotClient`]
//! is its HTTP implementation.

use async_trait::async_trait;

use crate::error::AppError;

mod client;
mod endpoints;
pub mod metrics;
mod region;
pub mod types;

pub use client::RiotClient;
pub use endpoints::MatchIdsQuery;
pub use region::{Platform, Region};
pub use types::{
    AccountDto, ChallengeConfigDto, ChampionCatalogDto, ChampionMasteryDto, MatchDto,
    PlayerChallengesDto, SummonerDto,
};

/// Upstream calls consumed by the sync pipeline.
///
/// Any call may fail with [`AppError::RateLimited`], a not-found status or a
/// transport error.
#[async_trait]
pub trait RiotApi: Send + Sync {
    async fn account_by_riot_id(
        &self,
        region: Region,
        game_name: &str,
        tag_line: &str,
    ) -> Result<AccountDto, AppError>;

    async fn summoner_by_puuid(
        &self,
        platform: Platform,
        puuid: &str,
    ) -> Result<SummonerDto, AppError>;

    async fn match_ids(
        &self,
        region: Region,
        puuid: &str,
        query: MatchIdsQuery,
    ) -> Result<Vec<String>, AppError>;

    async fn match_by_id(&self, region: Region, match_id: &str) -> Result<MatchDto, AppError>;

    async fn champion_masteries(
        &self,
        platform: Platform,
        puuid: &str,
    ) -> Result<Vec<ChampionMasteryDto>, AppError>;

    async fn player_challenges(
        &self,
        platform: Platform,
        puuid: &str,
    ) -> Result<PlayerChallengesDto, AppError>;

    async fn challenge_config(&self, platform: Platform)
    -> Result<Vec<ChallengeConfigDto>, AppError>;

    async fn champion_catalog(&self) -> Result<ChampionCatalogDto, AppError>;
}

#[async_trait]
impl RiotApi for RiotClient {
    async fn account_by_riot_id(
        &self,
        region: Region,
        game_name: &str,
        tag_line: &str,
    ) -> Result<AccountDto, AppError> {
        self.get_account_by_riot_id(region, game_name, tag_line)
            .await
    }

    async fn summoner_by_puuid(
        &self,
        platform: Platform,
        puuid: &str,
    ) -> Result<SummonerDto, AppError> {
        self.get_summoner_by_puuid(platform, puuid).await
    }

    async fn match_ids(
        &self,
        region: Region,
        puuid: &str,
        query: MatchIdsQuery,
    ) -> Result<Vec<String>, AppError> {
        self.get_match_ids(region, puuid, query).await
    }

    async fn match_by_id(&self, region: Region, match_id: &str) -> Result<MatchDto, AppError> {
        self.get_match(region, match_id).await
    }

    async fn champion_masteries(
        &self,
        platform: Platform,
        puuid: &str,
    ) -> Result<Vec<ChampionMasteryDto>, AppError> {
        self.get_champion_masteries(platform, puuid).await
    }

    async fn player_challenges(
        &self,
        platform: Platform,
        puuid: &str,
    ) -> Result<PlayerChallengesDto, AppError> {
        self.get_player_challenges(platform, puuid).await
    }

    async fn challenge_config(
        &self,
        platform: Platform,
    ) -> Result<Vec<ChallengeConfigDto>, AppError> {
        self.get_challenge_config(platform).await
    }

    async fn champion_catalog(&self) -> Result<ChampionCatalogDto, AppError> {
        self.get_champion_catalog().await
    }
}
