//! SQLite persistence: schema, row models and the [`Repository`].

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::info;

use crate::error::AppError;

mod jobs;
mod migrations;
mod models;
mod repository;

pub use jobs::JobCounts;
pub use migrations::run_migrations;
pub use models::{
    Account, ChallengeCatalogEntry, ChallengeProgress, ChampionCatalogEntry, JobState,
    MasterySnapshot, MatchInfo, MatchParticipation, ResolvedAccount, SyncJobRecord,
};
pub use repository::Repository;

/// Open (creating if needed) the database behind `url`.
pub async fn connect(url: &str) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    info!(url, "🗄️ Database connected");
    Ok(pool)
}

/// Private in-memory database, migrated and ready to use.
///
/// Held by a single never-recycled connection: every connection to
/// `sqlite::memory:` would otherwise see its own empty database.
pub async fn connect_in_memory() -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}
