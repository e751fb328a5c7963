use crate::error::AppError;
use crate::riot::client::RiotClient;
use crate::riot::region::Platform;
use crate::riot::types::ChampionMasteryDto;

impl RiotClient {
    /// Get every champion mastery entry of a player
    /// Uses platform routing (euw1, na1, kr, etc.)
    pub async fn get_champion_masteries(
        &self,
        platform: Platform,
        puuid: &str,
    ) -> Result<Vec<ChampionMasteryDto>, AppError> {
        let url = self.platform_url(
            platform,
            &format!("/lol/champion-mastery/v4/champion-masteries/by-puuid/{puuid}"),
        );

        self.get(&url).await
    }
}
