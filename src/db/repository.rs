use sqlx::{Sqlite, SqlitePool, Transaction};

use super::models::{
    Account, ChallengeCatalogEntry, ChallengeProgress, ChampionCatalogEntry, MasterySnapshot,
    MatchInfo, MatchParticipation, ResolvedAccount,
};
use crate::error::AppError;
use crate::riot::Platform;
use crate::riot::types::{
    ChallengeConfigDto, ChallengeProgressDto, ChampionCatalogDto, ChampionMasteryDto, MatchDto,
    ParticipantDto,
};

const ACCOUNT_COLUMN_NAMES: [&str; 10] = [
    "puuid",
    "game_name",
    "tag_line",
    "region",
    "profile_icon_id",
    "summoner_level",
    "last_verified_at",
    "last_update_at",
    "last_match_sync_at",
    "created_at",
];

fn account_columns(alias: Option<&str>) -> String {
    let prefix = alias.map(|a| format!("{a}.")).unwrap_or_default();
    ACCOUNT_COLUMN_NAMES
        .iter()
        .map(|col| format!("{prefix}{col}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Clone, Debug)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(super) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // === Account operations ===

    pub async fn get_account(&self, puuid: &str) -> Result<Option<Account>, AppError> {
        let columns = account_columns(None);
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {columns} FROM accounts WHERE puuid = ?"
        ))
        .bind(puuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    /// Current holder of a Riot id in a region, compared case-insensitively.
    pub async fn get_account_by_riot_id(
        &self,
        game_name: &str,
        tag_line: &str,
        region: Platform,
    ) -> Result<Option<Account>, AppError> {
        let columns = account_columns(None);
        let account = sqlx::query_as::<_, Account>(&format!(
            r#"
            SELECT {columns} FROM accounts
            WHERE region = ?
              AND game_name = ? COLLATE NOCASE
              AND tag_line = ? COLLATE NOCASE
            "#
        ))
        .bind(region.to_string())
        .bind(game_name)
        .bind(tag_line)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    /// Store an identity verified upstream at `now`.
    ///
    /// Any other account of the region still holding the same Riot id loses
    /// its name and tag; its puuid and history stay untouched.
    pub async fn save_resolved_account(
        &self,
        resolved: &ResolvedAccount,
        now: i64,
    ) -> Result<Account, AppError> {
        let region = resolved.region.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE accounts SET game_name = NULL, tag_line = NULL
            WHERE region = ?
              AND game_name = ? COLLATE NOCASE
              AND tag_line = ? COLLATE NOCASE
              AND puuid != ?
            "#,
        )
        .bind(&region)
        .bind(&resolved.game_name)
        .bind(&resolved.tag_line)
        .bind(&resolved.puuid)
        .execute(&mut *tx)
        .await?;

        let columns = account_columns(None);
        let account = sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO accounts
                (puuid, game_name, tag_line, region, profile_icon_id, summoner_level,
                 last_verified_at, last_update_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(puuid) DO UPDATE SET
                game_name = excluded.game_name,
                tag_line = excluded.tag_line,
                region = excluded.region,
                profile_icon_id = COALESCE(excluded.profile_icon_id, accounts.profile_icon_id),
                summoner_level = COALESCE(excluded.summoner_level, accounts.summoner_level),
                last_verified_at = excluded.last_verified_at,
                last_update_at = MAX(COALESCE(accounts.last_update_at, 0), excluded.last_update_at)
            RETURNING {columns}
            "#
        ))
        .bind(&resolved.puuid)
        .bind(&resolved.game_name)
        .bind(&resolved.tag_line)
        .bind(&region)
        .bind(resolved.profile_icon_id)
        .bind(resolved.summoner_level)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(account)
    }

    // === Match operations ===

    pub async fn match_exists(&self, match_id: &str) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, i32>("SELECT 1 FROM matches WHERE match_id = ?")
            .bind(match_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(exists.is_some())
    }

    /// Persist a match, its info, its participants' accounts and participations
    /// in one transaction.
    ///
    /// Returns `false` without writing anything when the match is already stored.
    pub async fn insert_match(
        &self,
        match_data: &MatchDto,
        region: Platform,
        now: i64,
    ) -> Result<bool, AppError> {
        let match_id = match_data.metadata.match_id.as_str();
        let info = &match_data.info;
        let mut tx = self.pool.begin().await?;

        let inserted =
            sqlx::query("INSERT OR IGNORE INTO matches (match_id, region, inserted_at) VALUES (?, ?, ?)")
                .bind(match_id)
                .bind(region.to_string())
                .bind(now)
                .execute(&mut *tx)
                .await?
                .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO match_info
                (match_id, game_creation, game_start, game_end, game_duration, game_mode,
                 game_type, game_version, queue_id, map_id, platform_id,
                 participants_json, teams_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(match_id)
        .bind(info.game_creation)
        .bind(info.started_at())
        .bind(info.ended_at())
        .bind(info.game_duration)
        .bind(&info.game_mode)
        .bind(&info.game_type)
        .bind(&info.game_version)
        .bind(info.queue_id)
        .bind(info.map_id)
        .bind(&info.platform_id)
        .bind(serde_json::to_string(&info.participants)?)
        .bind(serde_json::to_string(&info.teams)?)
        .execute(&mut *tx)
        .await?;

        let ended_at = info.ended_at();
        for participant in &info.participants {
            upsert_participant_account(&mut tx, participant, region, ended_at).await?;

            sqlx::query(
                r#"
                INSERT OR IGNORE INTO match_participations
                    (match_id, puuid, champion_id, team_id, win)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(match_id)
            .bind(&participant.puuid)
            .bind(participant.champion_id)
            .bind(participant.team_id)
            .bind(participant.win)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    pub async fn get_match_info(&self, match_id: &str) -> Result<Option<MatchInfo>, AppError> {
        let info = sqlx::query_as::<_, MatchInfo>("SELECT * FROM match_info WHERE match_id = ?")
            .bind(match_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(info)
    }

    pub async fn get_match_participations(
        &self,
        match_id: &str,
    ) -> Result<Vec<MatchParticipation>, AppError> {
        let rows = sqlx::query_as::<_, MatchParticipation>(
            r#"
            SELECT match_id, puuid, champion_id, team_id, win
            FROM match_participations
            WHERE match_id = ?
            ORDER BY puuid ASC
            "#,
        )
        .bind(match_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Ids of the stored matches an account took part in, newest first.
    pub async fn get_account_match_ids(&self, puuid: &str) -> Result<Vec<String>, AppError> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT mp.match_id
            FROM match_participations mp
            INNER JOIN match_info mi ON mi.match_id = mp.match_id
            WHERE mp.puuid = ?
            ORDER BY mi.game_start DESC
            "#,
        )
        .bind(puuid)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Start of the newest stored match of an account, in epoch millis.
    pub async fn get_latest_match_start(&self, puuid: &str) -> Result<Option<i64>, AppError> {
        let latest = sqlx::query_scalar::<_, Option<i64>>(
            r#"
            SELECT MAX(mi.game_start)
            FROM match_participations mp
            INNER JOIN match_info mi ON mi.match_id = mp.match_id
            WHERE mp.puuid = ?
            "#,
        )
        .bind(puuid)
        .fetch_one(&self.pool)
        .await?;
        Ok(latest)
    }

    /// Record how far the match history of an account has been synced.
    pub async fn set_match_sync_watermark(
        &self,
        puuid: &str,
        game_start: i64,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET last_match_sync_at = MAX(COALESCE(last_match_sync_at, 0), ?)
            WHERE puuid = ?
            "#,
        )
        .bind(game_start)
        .bind(puuid)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // === Profile operations ===

    /// Overwrite the mastery rows of an account with the given entries.
    pub async fn save_masteries(
        &self,
        puuid: &str,
        masteries: &[ChampionMasteryDto],
        now: i64,
    ) -> Result<usize, AppError> {
        let mut tx = self.pool.begin().await?;

        for mastery in masteries {
            sqlx::query(
                r#"
                INSERT INTO champion_masteries
                    (puuid, champion_id, champion_level, champion_points, last_play_time,
                     points_since_last_level, points_until_next_level, tokens_earned, synced_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(puuid, champion_id) DO UPDATE SET
                    champion_level = excluded.champion_level,
                    champion_points = excluded.champion_points,
                    last_play_time = excluded.last_play_time,
                    points_since_last_level = excluded.points_since_last_level,
                    points_until_next_level = excluded.points_until_next_level,
                    tokens_earned = excluded.tokens_earned,
                    synced_at = excluded.synced_at
                "#,
            )
            .bind(puuid)
            .bind(mastery.champion_id)
            .bind(mastery.champion_level)
            .bind(mastery.champion_points)
            .bind(mastery.last_play_time)
            .bind(mastery.champion_points_since_last_level)
            .bind(mastery.champion_points_until_next_level)
            .bind(mastery.tokens_earned)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(masteries.len())
    }

    pub async fn get_masteries(&self, puuid: &str) -> Result<Vec<MasterySnapshot>, AppError> {
        let rows = sqlx::query_as::<_, MasterySnapshot>(
            "SELECT * FROM champion_masteries WHERE puuid = ? ORDER BY champion_points DESC",
        )
        .bind(puuid)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Overwrite the challenge progress rows of an account with the given entries.
    pub async fn save_challenge_progress(
        &self,
        puuid: &str,
        challenges: &[ChallengeProgressDto],
        now: i64,
    ) -> Result<usize, AppError> {
        let mut tx = self.pool.begin().await?;

        for challenge in challenges {
            sqlx::query(
                r#"
                INSERT INTO challenge_progress
                    (puuid, challenge_id, level, value, percentile, achieved_at, synced_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(puuid, challenge_id) DO UPDATE SET
                    level = excluded.level,
                    value = excluded.value,
                    percentile = excluded.percentile,
                    achieved_at = excluded.achieved_at,
                    synced_at = excluded.synced_at
                "#,
            )
            .bind(puuid)
            .bind(challenge.challenge_id)
            .bind(&challenge.level)
            .bind(challenge.value)
            .bind(challenge.percentile)
            .bind(challenge.achieved_time)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(challenges.len())
    }

    pub async fn get_challenge_progress(
        &self,
        puuid: &str,
    ) -> Result<Vec<ChallengeProgress>, AppError> {
        let rows = sqlx::query_as::<_, ChallengeProgress>(
            "SELECT * FROM challenge_progress WHERE puuid = ? ORDER BY challenge_id ASC",
        )
        .bind(puuid)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // === Catalog operations ===

    pub async fn save_challenge_catalog(
        &self,
        configs: &[ChallengeConfigDto],
        now: i64,
    ) -> Result<usize, AppError> {
        let mut tx = self.pool.begin().await?;

        for config in configs {
            let (name, description) = config
                .name()
                .map(|n| (n.name.as_str(), n.description.as_str()))
                .unwrap_or_default();

            sqlx::query(
                r#"
                INSERT INTO challenge_catalog
                    (challenge_id, name, description, state, thresholds_json, refreshed_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(challenge_id) DO UPDATE SET
                    name = excluded.name,
                    description = excluded.description,
                    state = excluded.state,
                    thresholds_json = excluded.thresholds_json,
                    refreshed_at = excluded.refreshed_at
                "#,
            )
            .bind(config.id)
            .bind(name)
            .bind(description)
            .bind(&config.state)
            .bind(serde_json::to_string(&config.thresholds)?)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(configs.len())
    }

    pub async fn get_challenge_catalog(&self) -> Result<Vec<ChallengeCatalogEntry>, AppError> {
        let rows = sqlx::query_as::<_, ChallengeCatalogEntry>(
            "SELECT * FROM challenge_catalog ORDER BY challenge_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Upsert every champion of a Data Dragon catalog; entries with a
    /// non-numeric key are skipped.
    pub async fn save_champion_catalog(
        &self,
        catalog: &ChampionCatalogDto,
        now: i64,
    ) -> Result<usize, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut saved = 0;

        for champion in catalog.data.values() {
            let Ok(champion_id) = champion.key.parse::<i64>() else {
                continue;
            };

            sqlx::query(
                r#"
                INSERT INTO champion_catalog
                    (champion_id, slug, name, title, version, refreshed_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(champion_id) DO UPDATE SET
                    slug = excluded.slug,
                    name = excluded.name,
                    title = excluded.title,
                    version = excluded.version,
                    refreshed_at = excluded.refreshed_at
                "#,
            )
            .bind(champion_id)
            .bind(&champion.id)
            .bind(&champion.name)
            .bind(&champion.title)
            .bind(&catalog.version)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            saved += 1;
        }

        tx.commit().await?;
        Ok(saved)
    }

    pub async fn get_champion_catalog(&self) -> Result<Vec<ChampionCatalogEntry>, AppError> {
        let rows = sqlx::query_as::<_, ChampionCatalogEntry>(
            "SELECT * FROM champion_catalog ORDER BY champion_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// Insert or refresh the account of a match participant.
///
/// Stored fields are only overwritten when the match ended after the
/// information currently stored. A Riot id taken from the match then wins
/// over holders with older information and loses to newer ones.
async fn upsert_participant_account(
    tx: &mut Transaction<'_, Sqlite>,
    participant: &ParticipantDto,
    region: Platform,
    ended_at: i64,
) -> Result<(), AppError> {
    let region = region.to_string();
    let riot_id = participant.riot_id();

    let applied = sqlx::query(
        r#"
        INSERT INTO accounts
            (puuid, game_name, tag_line, region, profile_icon_id, summoner_level, last_update_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(puuid) DO UPDATE SET
            game_name = COALESCE(excluded.game_name, accounts.game_name),
            tag_line = COALESCE(excluded.tag_line, accounts.tag_line),
            region = excluded.region,
            profile_icon_id = excluded.profile_icon_id,
            summoner_level = excluded.summoner_level,
            last_update_at = excluded.last_update_at
        WHERE accounts.last_update_at IS NULL
           OR excluded.last_update_at > accounts.last_update_at
        "#,
    )
    .bind(&participant.puuid)
    .bind(riot_id.map(|(name, _)| name))
    .bind(riot_id.map(|(_, tag)| tag))
    .bind(&region)
    .bind(participant.profile_icon)
    .bind(participant.summoner_level)
    .bind(ended_at)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    let Some((game_name, tag_line)) = riot_id else {
        return Ok(());
    };
    if applied == 0 {
        return Ok(());
    }

    sqlx::query(
        r#"
        UPDATE accounts SET game_name = NULL, tag_line = NULL
        WHERE region = ?
          AND game_name = ? COLLATE NOCASE
          AND tag_line = ? COLLATE NOCASE
          AND puuid != ?
          AND (last_update_at IS NULL OR last_update_at < ?)
        "#,
    )
    .bind(&region)
    .bind(game_name)
    .bind(tag_line)
    .bind(&participant.puuid)
    .bind(ended_at)
    .execute(&mut **tx)
    .await?;

    // A holder verified after this match keeps the name.
    sqlx::query(
        r#"
        UPDATE accounts SET game_name = NULL, tag_line = NULL
        WHERE puuid = ?
          AND EXISTS (
              SELECT 1 FROM accounts other
              WHERE other.region = ?
                AND other.game_name = ? COLLATE NOCASE
                AND other.tag_line = ? COLLATE NOCASE
                AND other.puuid != ?
          )
        "#,
    )
    .bind(&participant.puuid)
    .bind(&region)
    .bind(game_name)
    .bind(tag_line)
    .bind(&participant.puuid)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
