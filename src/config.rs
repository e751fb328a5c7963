use std::env;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::riot::Platform;

/// Knobs of the job worker.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Minimum spacing between two job starts.
    pub job_interval: Duration,
    /// How long the idle worker sleeps before re-checking delayed jobs.
    pub idle_poll: Duration,
    /// Runs allowed for a job that keeps hitting the upstream rate limit.
    pub max_attempts: u32,
    pub completed_retention: u32,
    pub failed_retention: u32,
    pub rate_limit_slack: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            job_interval: Duration::from_millis(1200),
            idle_poll: Duration::from_secs(1),
            max_attempts: 5,
            completed_retention: 100,
            failed_retention: 500,
            rate_limit_slack: Duration::from_secs(1),
        }
    }
}

/// Knobs of the synchronization pipeline.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub freshness_window: Duration,
    pub page_size: u32,
    pub discovery_cap: usize,
    pub match_lookback: Option<Duration>,
    pub max_rate_limit_attempts: u32,
    pub rate_limit_slack: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            freshness_window: Duration::from_secs(600),
            page_size: 100,
            discovery_cap: 1000,
            match_lookback: None,
            max_rate_limit_attempts: 5,
            rate_limit_slack: Duration::from_secs(1),
        }
    }
}

/// An account submitted for a full sync at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedAccount {
    pub game_name: String,
    pub tag_line: String,
    pub region: Platform,
}

impl FromStr for SeedAccount {
    type Err = AppError;

    /// Parses `Name#Tag@REGION`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::Config(format!("invalid account `{s}`, expected Name#Tag@REGION"));

        let (riot_id, region) = s.trim().rsplit_once('@').ok_or_else(invalid)?;
        let (game_name, tag_line) = riot_id.rsplit_once('#').ok_or_else(invalid)?;
        if game_name.is_empty() || tag_line.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            game_name: game_name.to_string(),
            tag_line: tag_line.to_string(),
            region: region.parse()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub riot_api_key: String,
    pub database_url: String,
    pub riot_rate_limit_per_second: NonZeroU32,
    pub riot_api_base_url: Option<String>,
    pub ddragon_base_url: String,
    pub ddragon_version: String,
    pub scheduler: SchedulerSettings,
    pub sync: SyncSettings,
    pub seed_accounts: Vec<SeedAccount>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        const DEFAULT_RIOT_RATE_LIMIT_PER_SECOND: u32 = 20;
        const DEFAULT_DDRAGON_BASE_URL: &str = "https://ddragon.leagueoflegends.com";
        const DEFAULT_DDRAGON_VERSION: &str = "16.1.1";

        let riot_api_key = env::var("RIOT_API_KEY")
            .map_err(|_| AppError::Config("RIOT_API_KEY must be set".into()))?;

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:riftsync.db".into());

        let riot_rate_limit_per_second = parsed::<u32>("RIOT_RATE_LIMIT_PER_SECOND")
            .and_then(NonZeroU32::new)
            .unwrap_or_else(|| {
                NonZeroU32::new(DEFAULT_RIOT_RATE_LIMIT_PER_SECOND).unwrap_or(NonZeroU32::MIN)
            });

        let riot_api_base_url = env::var("RIOT_API_BASE_URL").ok();
        let ddragon_base_url =
            env::var("DDRAGON_BASE_URL").unwrap_or_else(|_| DEFAULT_DDRAGON_BASE_URL.into());
        let ddragon_version =
            env::var("DDRAGON_VERSION").unwrap_or_else(|_| DEFAULT_DDRAGON_VERSION.into());

        let scheduler_defaults = SchedulerSettings::default();
        let scheduler = SchedulerSettings {
            job_interval: parsed("JOB_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(scheduler_defaults.job_interval),
            idle_poll: parsed("JOB_IDLE_POLL_MS")
                .map(Duration::from_millis)
                .unwrap_or(scheduler_defaults.idle_poll),
            max_attempts: parsed("JOB_MAX_ATTEMPTS").unwrap_or(scheduler_defaults.max_attempts),
            completed_retention: parsed("JOB_COMPLETED_RETENTION")
                .unwrap_or(scheduler_defaults.completed_retention),
            failed_retention: parsed("JOB_FAILED_RETENTION")
                .unwrap_or(scheduler_defaults.failed_retention),
            rate_limit_slack: parsed("RATE_LIMIT_SLACK_MS")
                .map(Duration::from_millis)
                .unwrap_or(scheduler_defaults.rate_limit_slack),
        };

        let sync_defaults = SyncSettings::default();
        let sync = SyncSettings {
            freshness_window: parsed("ACCOUNT_FRESHNESS_SECS")
                .map(Duration::from_secs)
                .unwrap_or(sync_defaults.freshness_window),
            page_size: parsed::<u32>("MATCH_PAGE_SIZE")
                .filter(|size| (1..=100).contains(size))
                .unwrap_or(sync_defaults.page_size),
            discovery_cap: parsed("MATCH_DISCOVERY_CAP").unwrap_or(sync_defaults.discovery_cap),
            match_lookback: parsed::<u64>("MATCH_LOOKBACK_DAYS")
                .map(|days| Duration::from_secs(days * 24 * 60 * 60)),
            max_rate_limit_attempts: parsed("RATE_LIMIT_MAX_ATTEMPTS")
                .filter(|attempts| *attempts > 0)
                .unwrap_or(sync_defaults.max_rate_limit_attempts),
            rate_limit_slack: scheduler.rate_limit_slack,
        };

        let seed_accounts = match env::var("SYNC_ACCOUNTS") {
            Ok(list) => list
                .split(',')
                .filter(|entry| !entry.trim().is_empty())
                .map(str::parse)
                .collect::<Result<Vec<_>, _>>()?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            riot_api_key,
            database_url,
            riot_rate_limit_per_second,
            riot_api_base_url,
            ddragon_base_url,
            ddragon_version,
            scheduler,
            sync,
            seed_accounts,
        })
    }
}

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_account_parses_riot_id_and_region() {
        let seed: SeedAccount = "Le Conservateur#3012@euw".parse().unwrap();

        assert_eq!(seed.game_name, "Le Conservateur");
        assert_eq!(seed.tag_line, "3012");
        assert_eq!(seed.region, Platform::EUW1);
    }

    #[test]
    fn seed_account_rejects_missing_parts() {
        assert!("abc@EUW".parse::<SeedAccount>().is_err());
        assert!("abc#1".parse::<SeedAccount>().is_err());
        assert!("#1@EUW".parse::<SeedAccount>().is_err());
        assert!("abc#1@MOON".parse::<SeedAccount>().is_err());
    }
}
