use std::sync::Arc;

use tracing::{debug, instrument};

use crate::db::Account;
use crate::error::AppError;
use crate::riot::{MatchIdsQuery, Platform, RiotApi};

/// Pages through the match history of an account.
#[derive(Clone)]
pub struct MatchDiscovery {
    api: Arc<dyn RiotApi>,
    page_size: u32,
    cap: usize,
}

impl MatchDiscovery {
    pub fn new(api: Arc<dyn RiotApi>, page_size: u32, cap: usize) -> Self {
        Self {
            api,
            page_size: page_size.max(1),
            cap,
        }
    }

    /// Match ids of `account`, newest first, started after `since` (epoch seconds).
    pub async fn discover_match_ids(
        &self,
        account: &Account,
        since: Option<i64>,
    ) -> Result<Vec<String>, AppError> {
        self.discover_match_ids_from(account, since, 0).await
    }

    pub async fn discover_match_ids_from(
        &self,
        account: &Account,
        since: Option<i64>,
        offset: u32,
    ) -> Result<Vec<String>, AppError> {
        self.discover_by_puuid(&account.puuid, account.platform()?, since, offset)
            .await
    }

    #[instrument(skip(self))]
    pub async fn discover_by_puuid(
        &self,
        puuid: &str,
        region: Platform,
        since: Option<i64>,
        offset: u32,
    ) -> Result<Vec<String>, AppError> {
        let region = region.to_region();
        let mut ids = Vec::new();
        let mut start = offset;

        while ids.len() < self.cap {
            let query = MatchIdsQuery {
                start_time: since,
                start,
                count: self.page_size,
            };
            let page = self.api.match_ids(region, puuid, query).await?;
            let short_page = page.len() < self.page_size as usize;
            ids.extend(page);

            if short_page {
                break;
            }
            start += self.page_size;
        }

        ids.truncate(self.cap);
        debug!(count = ids.len(), "🔎 Match ids discovered");
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubRiotApi;

    fn account() -> Account {
        Account {
            puuid: "p1".into(),
            game_name: Some("abc".into()),
            tag_line: Some("1".into()),
            region: "EUW1".into(),
            profile_icon_id: None,
            summoner_level: None,
            last_verified_at: None,
            last_update_at: None,
            last_match_sync_at: None,
            created_at: 0,
        }
    }

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("EUW1_{i}")).collect()
    }

    #[tokio::test]
    async fn stops_on_short_page() {
        let api = Arc::new(StubRiotApi::new().with_match_ids(ids(250)));
        let discovery = MatchDiscovery::new(api.clone(), 100, 1000);

        let found = discovery
            .discover_match_ids(&account(), Some(1_700_000_000))
            .await
            .unwrap();

        assert_eq!(found, ids(250));
        let queries = api.match_id_queries.lock().unwrap();
        let starts: Vec<_> = queries.iter().map(|q| q.start).collect();
        assert_eq!(starts, vec![0, 100, 200]);
        assert!(queries.iter().all(|q| q.start_time == Some(1_700_000_000)));
    }

    #[tokio::test]
    async fn exact_multiple_needs_one_empty_page() {
        let api = Arc::new(StubRiotApi::new().with_match_ids(ids(200)));
        let discovery = MatchDiscovery::new(api.clone(), 100, 1000);

        let found = discovery.discover_match_ids(&account(), None).await.unwrap();

        assert_eq!(found.len(), 200);
        assert_eq!(api.match_id_queries.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn result_is_truncated_to_cap() {
        let api = Arc::new(StubRiotApi::new().with_match_ids(ids(500)));
        let discovery = MatchDiscovery::new(api.clone(), 100, 150);

        let found = discovery.discover_match_ids(&account(), None).await.unwrap();

        assert_eq!(found, ids(150));
        assert_eq!(api.match_id_queries.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn resumes_from_offset() {
        let api = Arc::new(StubRiotApi::new().with_match_ids(ids(30)));
        let discovery = MatchDiscovery::new(api, 10, 1000);

        let found = discovery
            .discover_match_ids_from(&account(), None, 20)
            .await
            .unwrap();

        assert_eq!(found, ids(30)[20..].to_vec());
    }
}
