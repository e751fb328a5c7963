use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Account-v1
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDto {
    pub puuid: String,
    pub game_name: Option<String>,
    pub tag_line: Option<String>,
}

// ============================================================================
// Summoner-v4
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummonerDto {
    pub profile_icon_id: i32,
    pub summoner_level: i64,
}

// ============================================================================
// Champion-Mastery-v4
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChampionMasteryDto {
    pub champion_id: i64,
    pub champion_level: i32,
    pub champion_points: i64,
    #[serde(default)]
    pub last_play_time: i64,
    #[serde(default)]
    pub champion_points_since_last_level: i64,
    #[serde(default)]
    pub champion_points_until_next_level: i64,
    #[serde(default)]
    pub tokens_earned: i32,
}

// ============================================================================
// Challenges-v1
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerChallengesDto {
    #[serde(default)]
    pub challenges: Vec<ChallengeProgressDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeProgressDto {
    pub challenge_id: i64,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub percentile: f64,
    pub achieved_time: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeConfigDto {
    pub id: i64,
    #[serde(default)]
    pub localized_names: HashMap<String, LocalizedChallengeName>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub thresholds: HashMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizedChallengeName {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl ChallengeConfigDto {
    const CATALOG_LOCALE: &'static str = "en_US";

    /// English name, falling back to any locale the provider sent.
    pub fn name(&self) -> Option<&LocalizedChallengeName> {
        self.localized_names
            .get(Self::CATALOG_LOCALE)
            .or_else(|| self.localized_names.values().next())
    }
}

// ============================================================================
// Data Dragon
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ChampionCatalogDto {
    pub version: String,
    pub data: HashMap<String, ChampionDataDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChampionDataDto {
    /// Slug such as `MonkeyKing`.
    pub id: String,
    /// Numeric champion id, as a string.
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub title: String,
}

// ============================================================================
// Match-v5
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDto {
    pub metadata: MetadataDto,
    pub info: InfoDto,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDto {
    pub match_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoDto {
    pub game_creation: i64,
    #[serde(default)]
    pub game_start_timestamp: Option<i64>,
    #[serde(default)]
    pub game_end_timestamp: Option<i64>,
    pub game_duration: i64,
    #[serde(default)]
    pub game_mode: String,
    #[serde(default)]
    pub game_type: String,
    #[serde(default)]
    pub game_version: String,
    #[serde(default)]
    pub map_id: i32,
    pub queue_id: i32,
    #[serde(default)]
    pub platform_id: String,
    pub participants: Vec<ParticipantDto>,
    #[serde(default)]
    pub teams: Vec<Value>,
}

impl InfoDto {
    pub fn started_at(&self) -> i64 {
        self.game_start_timestamp.unwrap_or(self.game_creation)
    }

    /// Epoch millis at which the game ended.
    ///
    /// Older payloads carry no end timestamp and report `gameDuration` in
    /// millis instead of seconds.
    pub fn ended_at(&self) -> i64 {
        match self.game_end_timestamp {
            Some(end) => end,
            None => self.started_at() + self.game_duration,
        }
    }
}

/// One participant of a match.
///
/// Only the fields the mirror reads are typed; everything else is kept in
/// `extra` so the raw payload can be stored untouched.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDto {
    pub puuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub riot_id_game_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub riot_id_tagline: Option<String>,
    #[serde(default)]
    pub profile_icon: i32,
    #[serde(default)]
    pub summoner_level: i64,
    pub champion_id: i64,
    pub team_id: i32,
    pub win: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ParticipantDto {
    /// Riot id of the participant at the time of the match, when the payload has one.
    pub fn riot_id(&self) -> Option<(&str, &str)> {
        match (self.riot_id_game_name.as_deref(), self.riot_id_tagline.as_deref()) {
            (Some(name), Some(tag)) if !name.is_empty() && !tag.is_empty() => Some((name, tag)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn participant_keeps_unknown_fields() {
        let raw = json!({
            "puuid": "p1",
            "riotIdGameName": "abc",
            "riotIdTagline": "1",
            "profileIcon": 7,
            "summonerLevel": 300,
            "championId": 266,
            "teamId": 100,
            "win": true,
            "kills": 4,
            "item0": 3031
        });

        let participant: ParticipantDto = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(participant.riot_id(), Some(("abc", "1")));
        assert_eq!(participant.extra.get("kills"), Some(&json!(4)));

        let back = serde_json::to_value(&participant).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn empty_riot_id_is_ignored() {
        let participant: ParticipantDto = serde_json::from_value(json!({
            "puuid": "p1",
            "riotIdGameName": "",
            "riotIdTagline": "",
            "championId": 1,
            "teamId": 200,
            "win": false
        }))
        .unwrap();

        assert_eq!(participant.riot_id(), None);
    }

    #[test]
    fn ended_at_falls_back_to_duration() {
        let info: InfoDto = serde_json::from_value(json!({
            "gameCreation": 1_000,
            "gameStartTimestamp": 2_000,
            "gameDuration": 500,
            "queueId": 420,
            "participants": []
        }))
        .unwrap();

        assert_eq!(info.ended_at(), 2_500);
    }

    #[test]
    fn challenge_name_prefers_english() {
        let config: ChallengeConfigDto = serde_json::from_value(json!({
            "id": 101,
            "localizedNames": {
                "fr_FR": { "name": "Nom", "description": "Desc" },
                "en_US": { "name": "Name", "description": "Description" }
            },
            "state": "ENABLED",
            "thresholds": { "GOLD": 10.0 }
        }))
        .unwrap();

        assert_eq!(config.name().map(|n| n.name.as_str()), Some("Name"));
    }
}
