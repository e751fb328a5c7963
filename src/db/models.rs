use std::time::Duration;

use sqlx::FromRow;

use crate::error::AppError;
use crate::riot::Platform;

#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub puuid: String,
    pub game_name: Option<String>,
    pub tag_line: Option<String>,
    pub region: String,
    pub profile_icon_id: Option<i32>,
    pub summoner_level: Option<i64>,
    pub last_verified_at: Option<i64>,
    pub last_update_at: Option<i64>,
    /// Start of the newest match covered by a completed history sync.
    pub last_match_sync_at: Option<i64>,
    pub created_at: i64,
}

impl Account {
    /// `Name#Tag`, or the puuid once the name was handed to another account.
    pub fn riot_id(&self) -> String {
        match (&self.game_name, &self.tag_line) {
            (Some(name), Some(tag)) => format!("{name}#{tag}"),
            _ => self.puuid.clone(),
        }
    }

    pub fn platform(&self) -> Result<Platform, AppError> {
        self.region.parse()
    }

    /// Whether the identity was verified upstream less than `window` ago.
    pub fn is_fresh(&self, now: i64, window: Duration) -> bool {
        self.last_verified_at
            .is_some_and(|verified| now.saturating_sub(verified) < window.as_millis() as i64)
    }
}

/// Identity returned by an upstream lookup, ready to be stored.
#[derive(Debug, Clone)]
pub struct ResolvedAccount {
    pub puuid: String,
    pub game_name: String,
    pub tag_line: String,
    pub region: Platform,
    pub profile_icon_id: Option<i32>,
    pub summoner_level: Option<i64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct MatchInfo {
    pub match_id: String,
    pub game_creation: i64,
    pub game_start: i64,
    pub game_end: i64,
    pub game_duration: i64,
    pub game_mode: String,
    pub game_type: String,
    pub game_version: String,
    pub queue_id: i32,
    pub map_id: i32,
    pub platform_id: String,
    pub participants_json: String,
    pub teams_json: String,
}

#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct MatchParticipation {
    pub match_id: String,
    pub puuid: String,
    pub champion_id: i64,
    pub team_id: i32,
    pub win: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct MasterySnapshot {
    pub puuid: String,
    pub champion_id: i64,
    pub champion_level: i32,
    pub champion_points: i64,
    pub last_play_time: i64,
    pub points_since_last_level: i64,
    pub points_until_next_level: i64,
    pub tokens_earned: i32,
    pub synced_at: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct ChallengeProgress {
    pub puuid: String,
    pub challenge_id: i64,
    pub level: String,
    pub value: f64,
    pub percentile: f64,
    pub achieved_at: Option<i64>,
    pub synced_at: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct ChallengeCatalogEntry {
    pub challenge_id: i64,
    pub name: String,
    pub description: String,
    pub state: String,
    pub thresholds_json: String,
    pub refreshed_at: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct ChampionCatalogEntry {
    pub champion_id: i64,
    pub slug: String,
    pub name: String,
    pub title: String,
    pub version: String,
    pub refreshed_at: i64,
}

/// Lifecycle of a sync job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Active,
    Delayed,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Active => "active",
            Self::Delayed => "delayed",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SyncJobRecord {
    pub id: i64,
    pub kind: String,
    pub payload: String,
    pub dedup_key: String,
    pub state: JobState,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub run_at: i64,
    pub enqueued_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
}
