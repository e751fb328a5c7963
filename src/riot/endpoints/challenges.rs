use crate::error::AppError;
use crate::riot::client::RiotClient;
use crate::riot::region::Platform;
use crate::riot::types::{ChallengeConfigDto, PlayerChallengesDto};

impl RiotClient {
    /// Get the challenge progress of a player
    pub async fn get_player_challenges(
        &self,
        platform: Platform,
        puuid: &str,
    ) -> Result<PlayerChallengesDto, AppError> {
        let url = self.platform_url(
            platform,
            &format!("/lol/challenges/v1/player-data/{puuid}"),
        );

        self.get(&url).await
    }

    /// Get the configuration of every challenge
    pub async fn get_challenge_config(
        &self,
        platform: Platform,
    ) -> Result<Vec<ChallengeConfigDto>, AppError> {
        let url = self.platform_url(platform, "/lol/challenges/v1/challenges/config");

        self.get(&url).await
    }
}
