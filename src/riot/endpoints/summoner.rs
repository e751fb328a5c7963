use crate::error::AppError;
use crate::riot::client::RiotClient;
use crate::riot::region::Platform;
use crate::riot::types::SummonerDto;

impl RiotClient {
    /// Get summoner by PUUID (for profile icon and level)
    pub async fn get_summoner_by_puuid(
        &self,
        platform: Platform,
        puuid: &str,
    ) -> Result<SummonerDto, AppError> {
        let url = self.platform_url(
            platform,
            &format!("/lol/summoner/v4/summoners/by-puuid/{puuid}"),
        );

        self.get(&url).await
    }
}
