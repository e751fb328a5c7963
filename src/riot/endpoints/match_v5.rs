use crate::error::AppError;
use crate::riot::client::RiotClient;
use crate::riot::region::Region;
use crate::riot::types::MatchDto;

/// Paging window of a match id listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchIdsQuery {
    /// Epoch seconds; only matches started after it are listed.
    pub start_time: Option<i64>,
    pub start: u32,
    pub count: u32,
}

impl MatchIdsQuery {
    fn to_query_string(self) -> String {
        let mut query = format!("start={}&count={}", self.start, self.count);
        if let Some(start_time) = self.start_time {
            query.push_str(&format!("&startTime={start_time}"));
        }
        query
    }
}

impl RiotClient {
    /// Get list of match IDs by PUUID
    /// Uses regional routing (americas, europe, asia, sea)
    pub async fn get_match_ids(
        &self,
        region: Region,
        puuid: &str,
        query: MatchIdsQuery,
    ) -> Result<Vec<String>, AppError> {
        let url = self.regional_url(
            region,
            &format!(
                "/lol/match/v5/matches/by-puuid/{}/ids?{}",
                puuid,
                query.to_query_string()
            ),
        );

        self.get(&url).await
    }

    /// Get match details by match ID
    /// Uses regional routing (americas, europe, asia, sea)
    pub async fn get_match(&self, region: Region, match_id: &str) -> Result<MatchDto, AppError> {
        let url = self.regional_url(region, &format!("/lol/match/v5/matches/{match_id}"));

        self.get(&url).await
    }
}
