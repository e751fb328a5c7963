use sqlx::SqlitePool;
use tracing::info;

use crate::error::AppError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    puuid TEXT PRIMARY KEY,
    game_name TEXT,
    tag_line TEXT,
    region TEXT NOT NULL,
    profile_icon_id INTEGER,
    summoner_level INTEGER,
    last_verified_at INTEGER,
    last_update_at INTEGER,
    last_match_sync_at INTEGER,
    created_at INTEGER NOT NULL DEFAULT (unixepoch() * 1000)
);

CREATE TABLE IF NOT EXISTS matches (
    match_id TEXT PRIMARY KEY,
    region TEXT NOT NULL,
    inserted_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS match_info (
    match_id TEXT PRIMARY KEY,
    game_creation INTEGER NOT NULL,
    game_start INTEGER NOT NULL,
    game_end INTEGER NOT NULL,
    game_duration INTEGER NOT NULL,
    game_mode TEXT NOT NULL,
    game_type TEXT NOT NULL,
    game_version TEXT NOT NULL,
    queue_id INTEGER NOT NULL,
    map_id INTEGER NOT NULL,
    platform_id TEXT NOT NULL,
    participants_json TEXT NOT NULL,
    teams_json TEXT NOT NULL,
    FOREIGN KEY (match_id) REFERENCES matches(match_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS match_participations (
    match_id TEXT NOT NULL,
    puuid TEXT NOT NULL,
    champion_id INTEGER NOT NULL,
    team_id INTEGER NOT NULL,
    win INTEGER NOT NULL,
    PRIMARY KEY (match_id, puuid),
    FOREIGN KEY (match_id) REFERENCES matches(match_id) ON DELETE CASCADE,
    FOREIGN KEY (puuid) REFERENCES accounts(puuid)
);

CREATE TABLE IF NOT EXISTS champion_masteries (
    puuid TEXT NOT NULL,
    champion_id INTEGER NOT NULL,
    champion_level INTEGER NOT NULL,
    champion_points INTEGER NOT NULL,
    last_play_time INTEGER NOT NULL,
    points_since_last_level INTEGER NOT NULL,
    points_until_next_level INTEGER NOT NULL,
    tokens_earned INTEGER NOT NULL,
    synced_at INTEGER NOT NULL,
    PRIMARY KEY (puuid, champion_id),
    FOREIGN KEY (puuid) REFERENCES accounts(puuid)
);

CREATE TABLE IF NOT EXISTS challenge_progress (
    puuid TEXT NOT NULL,
    challenge_id INTEGER NOT NULL,
    level TEXT NOT NULL,
    value REAL NOT NULL,
    percentile REAL NOT NULL,
    achieved_at INTEGER,
    synced_at INTEGER NOT NULL,
    PRIMARY KEY (puuid, challenge_id),
    FOREIGN KEY (puuid) REFERENCES accounts(puuid)
);

CREATE TABLE IF NOT EXISTS challenge_catalog (
    challenge_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    state TEXT NOT NULL,
    thresholds_json TEXT NOT NULL,
    refreshed_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS champion_catalog (
    champion_id INTEGER PRIMARY KEY,
    slug TEXT NOT NULL,
    name TEXT NOT NULL,
    title TEXT NOT NULL,
    version TEXT NOT NULL,
    refreshed_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sync_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    payload TEXT NOT NULL,
    dedup_key TEXT NOT NULL,
    state TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    run_at INTEGER NOT NULL,
    enqueued_at INTEGER NOT NULL,
    started_at INTEGER,
    finished_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_accounts_riot_id ON accounts(region, game_name COLLATE NOCASE, tag_line COLLATE NOCASE);
CREATE INDEX IF NOT EXISTS idx_match_participations_puuid ON match_participations(puuid);
CREATE INDEX IF NOT EXISTS idx_sync_jobs_state ON sync_jobs(state, run_at);
CREATE INDEX IF NOT EXISTS idx_sync_jobs_dedup ON sync_jobs(dedup_key, state);
CREATE UNIQUE INDEX IF NOT EXISTS idx_sync_jobs_pending_dedup ON sync_jobs(dedup_key)
    WHERE state IN ('queued', 'delayed', 'active');
"#;

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    info!("🗄️ Database migrations completed");
    Ok(())
}
