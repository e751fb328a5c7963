//! In-process stand-ins for the Riot API used by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::error::AppError;
use crate::riot::types::{ChallengeProgressDto, PlayerChallengesDto};
use crate::riot::{
    AccountDto, ChallengeConfigDto, ChampionCatalogDto, ChampionMasteryDto, MatchDto,
    MatchIdsQuery, Platform, Region, RiotApi, SummonerDto,
};

/// Scripted [`RiotApi`] counting the calls it receives.
#[derive(Default)]
pub struct StubRiotApi {
    /// Keyed by lower-cased `name#tag`.
    accounts: Mutex<HashMap<String, AccountDto>>,
    summoner_error: Mutex<Option<u16>>,
    match_ids: Mutex<Vec<String>>,
    matches: Mutex<HashMap<String, MatchDto>>,
    /// Remaining 429 responses per match id.
    match_rate_limits: Mutex<HashMap<String, u32>>,
    masteries: Mutex<Vec<ChampionMasteryDto>>,
    challenges: Mutex<Vec<ChallengeProgressDto>>,
    catalog_error: Mutex<Option<u16>>,

    pub account_calls: AtomicUsize,
    pub summoner_calls: AtomicUsize,
    pub match_id_queries: Mutex<Vec<MatchIdsQuery>>,
    pub match_calls: Mutex<HashMap<String, usize>>,
    pub mastery_calls: AtomicUsize,
    pub challenge_calls: AtomicUsize,
    pub catalog_calls: AtomicUsize,
}

impl StubRiotApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `name#tag` resolve to `puuid`; replaces any previous mapping.
    pub fn with_account(self, puuid: &str, game_name: &str, tag_line: &str) -> Self {
        self.set_account(puuid, game_name, tag_line);
        self
    }

    pub fn set_account(&self, puuid: &str, game_name: &str, tag_line: &str) {
        self.accounts.lock().unwrap().insert(
            riot_id_key(game_name, tag_line),
            AccountDto {
                puuid: puuid.into(),
                game_name: Some(game_name.into()),
                tag_line: Some(tag_line.into()),
            },
        );
    }

    pub fn with_summoner_error(self, status: u16) -> Self {
        *self.summoner_error.lock().unwrap() = Some(status);
        self
    }

    /// Ids listed for every account, newest first.
    pub fn with_match_ids<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.match_ids.lock().unwrap() = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_match(self, game: MatchDto) -> Self {
        self.matches
            .lock()
            .unwrap()
            .insert(game.metadata.match_id.clone(), game);
        self
    }

    /// Answer the next `times` fetches of `match_id` with a 429.
    pub fn with_match_rate_limit(self, match_id: &str, times: u32) -> Self {
        self.match_rate_limits
            .lock()
            .unwrap()
            .insert(match_id.into(), times);
        self
    }

    pub fn with_masteries(self, masteries: Vec<ChampionMasteryDto>) -> Self {
        *self.masteries.lock().unwrap() = masteries;
        self
    }

    pub fn with_challenges(self, challenges: Vec<ChallengeProgressDto>) -> Self {
        *self.challenges.lock().unwrap() = challenges;
        self
    }

    pub fn with_catalog_error(self, status: u16) -> Self {
        *self.catalog_error.lock().unwrap() = Some(status);
        self
    }

    pub fn account_calls(&self) -> usize {
        self.account_calls.load(Ordering::SeqCst)
    }

    pub fn match_calls(&self, match_id: &str) -> usize {
        self.match_calls
            .lock()
            .unwrap()
            .get(match_id)
            .copied()
            .unwrap_or_default()
    }
}

fn riot_id_key(game_name: &str, tag_line: &str) -> String {
    format!("{game_name}#{tag_line}").to_lowercase()
}

fn status_error(status: u16) -> AppError {
    AppError::RiotApi {
        status,
        message: String::new(),
    }
}

#[async_trait]
impl RiotApi for StubRiotApi {
    async fn account_by_riot_id(
        &self,
        _region: Region,
        game_name: &str,
        tag_line: &str,
    ) -> Result<AccountDto, AppError> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        self.accounts
            .lock()
            .unwrap()
            .get(&riot_id_key(game_name, tag_line))
            .cloned()
            .ok_or_else(|| AppError::PlayerNotFound {
                game_name: game_name.into(),
                tag_line: tag_line.into(),
            })
    }

    async fn summoner_by_puuid(
        &self,
        _platform: Platform,
        _puuid: &str,
    ) -> Result<SummonerDto, AppError> {
        self.summoner_calls.fetch_add(1, Ordering::SeqCst);
        match *self.summoner_error.lock().unwrap() {
            Some(status) => Err(status_error(status)),
            None => Ok(SummonerDto {
                profile_icon_id: 29,
                summoner_level: 420,
            }),
        }
    }

    async fn match_ids(
        &self,
        _region: Region,
        _puuid: &str,
        query: MatchIdsQuery,
    ) -> Result<Vec<String>, AppError> {
        self.match_id_queries.lock().unwrap().push(query);
        let ids = self.match_ids.lock().unwrap();
        Ok(ids
            .iter()
            .skip(query.start as usize)
            .take(query.count as usize)
            .cloned()
            .collect())
    }

    async fn match_by_id(&self, _region: Region, match_id: &str) -> Result<MatchDto, AppError> {
        *self
            .match_calls
            .lock()
            .unwrap()
            .entry(match_id.into())
            .or_default() += 1;

        if let Some(remaining) = self.match_rate_limits.lock().unwrap().get_mut(match_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(AppError::RateLimited {
                    retry_after: Duration::ZERO,
                });
            }
        }

        self.matches
            .lock()
            .unwrap()
            .get(match_id)
            .cloned()
            .ok_or_else(|| status_error(404))
    }

    async fn champion_masteries(
        &self,
        _platform: Platform,
        _puuid: &str,
    ) -> Result<Vec<ChampionMasteryDto>, AppError> {
        self.mastery_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.masteries.lock().unwrap().clone())
    }

    async fn player_challenges(
        &self,
        _platform: Platform,
        _puuid: &str,
    ) -> Result<PlayerChallengesDto, AppError> {
        self.challenge_calls.fetch_add(1, Ordering::SeqCst);
        Ok(PlayerChallengesDto {
            challenges: self.challenges.lock().unwrap().clone(),
        })
    }

    async fn challenge_config(
        &self,
        _platform: Platform,
    ) -> Result<Vec<ChallengeConfigDto>, AppError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = *self.catalog_error.lock().unwrap() {
            return Err(status_error(status));
        }
        Ok(serde_json::from_value(json!([{
            "id": 101000,
            "localizedNames": { "en_US": { "name": "ARAM Authority", "description": "Win ARAM games" } },
            "state": "ENABLED",
            "thresholds": { "IRON": 1.0, "GOLD": 10.0 }
        }]))?)
    }

    async fn champion_catalog(&self) -> Result<ChampionCatalogDto, AppError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = *self.catalog_error.lock().unwrap() {
            return Err(status_error(status));
        }
        Ok(serde_json::from_value(json!({
            "version": "16.1.1",
            "data": {
                "Aatrox": { "id": "Aatrox", "key": "266", "name": "Aatrox", "title": "the Darkin Blade" }
            }
        }))?)
    }
}

/// Match payload ending at `end` (epoch millis) with the given
/// `(puuid, game name, tag line)` participants.
pub fn match_fixture(match_id: &str, end: i64, participants: &[(&str, &str, &str)]) -> MatchDto {
    let participants: Vec<_> = participants
        .iter()
        .enumerate()
        .map(|(i, (puuid, name, tag))| {
            json!({
                "puuid": puuid,
                "riotIdGameName": name,
                "riotIdTagline": tag,
                "profileIcon": 10,
                "summonerLevel": 100,
                "championId": 100 + i,
                "teamId": if i % 2 == 0 { 100 } else { 200 },
                "win": i % 2 == 0,
                "kills": 3
            })
        })
        .collect();

    serde_json::from_value(json!({
        "metadata": { "matchId": match_id },
        "info": {
            "gameCreation": end - 2_000_000,
            "gameStartTimestamp": end - 1_800_000,
            "gameEndTimestamp": end,
            "gameDuration": 1_800,
            "gameMode": "CLASSIC",
            "gameType": "MATCHED_GAME",
            "gameVersion": "16.1.1",
            "mapId": 11,
            "queueId": 420,
            "platformId": "EUW1",
            "participants": participants,
            "teams": [{ "teamId": 100, "win": true }, { "teamId": 200, "win": false }]
        }
    }))
    .unwrap()
}

pub fn mastery(champion_id: i64, points: i64) -> ChampionMasteryDto {
    ChampionMasteryDto {
        champion_id,
        champion_level: 5,
        champion_points: points,
        last_play_time: 0,
        champion_points_since_last_level: 0,
        champion_points_until_next_level: 0,
        tokens_earned: 0,
    }
}
