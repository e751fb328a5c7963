use crate::error::AppError;
use crate::riot::client::RiotClient;
use crate::riot::types::ChampionCatalogDto;

impl RiotClient {
    /// Get the static champion list from Data Dragon for the configured version
    pub async fn get_champion_catalog(&self) -> Result<ChampionCatalogDto, AppError> {
        let url = self.ddragon_url("/data/en_US/champion.json");

        self.get_static(&url).await
    }
}
