use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::warn;

use crate::models::{MatchRecord, PerformanceSnapshot, Subject};
use crate::store::{Store, StoreError, DEFAULT_RUN_TIMES};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the tables and seed rows if they do not exist yet. Safe to run
    /// on every startup.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS battle_results (
                id BIGSERIAL PRIMARY KEY,
                battle_id TEXT NOT NULL UNIQUE,
                played_at TIMESTAMP NOT NULL,
                mode TEXT NOT NULL,
                p1_name TEXT NOT NULL,
                p1_char TEXT NOT NULL,
                p1_mr INTEGER NOT NULL,
                p1_control TEXT NOT NULL,
                p1_result TEXT NOT NULL,
                p2_name TEXT NOT NULL,
                p2_char TEXT NOT NULL,
                p2_mr INTEGER NOT NULL,
                p2_control TEXT NOT NULL,
                p2_result TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS player_stats (
                id BIGSERIAL PRIMARY KEY,
                user_id TEXT NOT NULL,
                player_name TEXT NOT NULL DEFAULT '',
                recorded_at DATE NOT NULL,
                d_parry_pct DOUBLE PRECISION NOT NULL DEFAULT 0,
                d_impact_pct DOUBLE PRECISION NOT NULL DEFAULT 0,
                d_od_pct DOUBLE PRECISION NOT NULL DEFAULT 0,
                d_rush_p_pct DOUBLE PRECISION NOT NULL DEFAULT 0,
                d_rush_c_pct DOUBLE PRECISION NOT NULL DEFAULT 0,
                d_reversal_pct DOUBLE PRECISION NOT NULL DEFAULT 0,
                sa1_pct DOUBLE PRECISION NOT NULL DEFAULT 0,
                sa2_pct DOUBLE PRECISION NOT NULL DEFAULT 0,
                sa3_pct DOUBLE PRECISION NOT NULL DEFAULT 0,
                ca_pct DOUBLE PRECISION NOT NULL DEFAULT 0,
                impact_win DOUBLE PRECISION NOT NULL DEFAULT 0,
                impact_pc_win DOUBLE PRECISION NOT NULL DEFAULT 0,
                impact_counter_win DOUBLE PRECISION NOT NULL DEFAULT 0,
                impact_lose DOUBLE PRECISION NOT NULL DEFAULT 0,
                impact_pc_lose DOUBLE PRECISION NOT NULL DEFAULT 0,
                impact_counter_lose DOUBLE PRECISION NOT NULL DEFAULT 0,
                just_parry_count DOUBLE PRECISION NOT NULL DEFAULT 0,
                throw_win DOUBLE PRECISION NOT NULL DEFAULT 0,
                throw_lose DOUBLE PRECISION NOT NULL DEFAULT 0,
                throw_escape DOUBLE PRECISION NOT NULL DEFAULT 0,
                stun_win DOUBLE PRECISION NOT NULL DEFAULT 0,
                stun_lose DOUBLE PRECISION NOT NULL DEFAULT 0,
                wall_push_sec DOUBLE PRECISION NOT NULL DEFAULT 0,
                wall_pushed_sec DOUBLE PRECISION NOT NULL DEFAULT 0,
                UNIQUE (user_id, recorded_at)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scraper_config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS target_users (
                user_code TEXT PRIMARY KEY,
                player_name TEXT NOT NULL DEFAULT '',
                note TEXT NOT NULL DEFAULT '',
                is_active BOOLEAN NOT NULL DEFAULT TRUE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS system_status (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL DEFAULT '',
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "INSERT INTO scraper_config (key, value) VALUES ('run_times', $1) \
             ON CONFLICT (key) DO NOTHING",
        )
        .bind(DEFAULT_RUN_TIMES)
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "INSERT INTO system_status (key, value) VALUES ('public_url', '') \
             ON CONFLICT (key) DO NOTHING",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_matches(&self, matches: &[MatchRecord]) -> Result<u64, StoreError> {
        let mut inserted = 0;
        for record in matches {
            let result = sqlx::query(
                r#"
                INSERT INTO battle_results (
                    battle_id, played_at, mode,
                    p1_name, p1_char, p1_mr, p1_control, p1_result,
                    p2_name, p2_char, p2_mr, p2_control, p2_result
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                ON CONFLICT (battle_id) DO NOTHING
                "#,
            )
            .bind(&record.battle_id)
            .bind(record.played_at)
            .bind(&record.mode)
            .bind(&record.p1.name)
            .bind(&record.p1.character)
            .bind(record.p1.rank_points)
            .bind(record.p1.control.as_str())
            .bind(&record.p1.result)
            .bind(&record.p2.name)
            .bind(&record.p2.character)
            .bind(record.p2.rank_points)
            .bind(record.p2.control.as_str())
            .bind(&record.p2.result)
            .execute(&self.pool)
            .await;

            match result {
                Ok(done) => inserted += done.rows_affected(),
                Err(e) => warn!("failed to insert match {}: {e}", record.battle_id),
            }
        }
        Ok(inserted)
    }

    async fn upsert_snapshot(&self, snapshot: &PerformanceSnapshot) -> Result<(), StoreError> {
        let s = &snapshot.stats;
        sqlx::query(
            r#"
            INSERT INTO player_stats (
                user_id, player_name, recorded_at,
                d_parry_pct, d_impact_pct, d_od_pct, d_rush_p_pct, d_rush_c_pct,
                d_reversal_pct, sa1_pct, sa2_pct, sa3_pct, ca_pct,
                impact_win, impact_pc_win, impact_counter_win,
                impact_lose, impact_pc_lose, impact_counter_lose,
                just_parry_count, throw_win, throw_lose, throw_escape,
                stun_win, stun_lose, wall_push_sec, wall_pushed_sec
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27
            )
            ON CONFLICT (user_id, recorded_at) DO UPDATE SET
                player_name = EXCLUDED.player_name,
                d_parry_pct = EXCLUDED.d_parry_pct,
                d_impact_pct = EXCLUDED.d_impact_pct,
                d_od_pct = EXCLUDED.d_od_pct,
                d_rush_p_pct = EXCLUDED.d_rush_p_pct,
                d_rush_c_pct = EXCLUDED.d_rush_c_pct,
                d_reversal_pct = EXCLUDED.d_reversal_pct,
                sa1_pct = EXCLUDED.sa1_pct,
                sa2_pct = EXCLUDED.sa2_pct,
                sa3_pct = EXCLUDED.sa3_pct,
                ca_pct = EXCLUDED.ca_pct,
                impact_win = EXCLUDED.impact_win,
                impact_pc_win = EXCLUDED.impact_pc_win,
                impact_counter_win = EXCLUDED.impact_counter_win,
                impact_lose = EXCLUDED.impact_lose,
                impact_pc_lose = EXCLUDED.impact_pc_lose,
                impact_counter_lose = EXCLUDED.impact_counter_lose,
                just_parry_count = EXCLUDED.just_parry_count,
                throw_win = EXCLUDED.throw_win,
                throw_lose = EXCLUDED.throw_lose,
                throw_escape = EXCLUDED.throw_escape,
                stun_win = EXCLUDED.stun_win,
                stun_lose = EXCLUDED.stun_lose,
                wall_push_sec = EXCLUDED.wall_push_sec,
                wall_pushed_sec = EXCLUDED.wall_pushed_sec
            "#,
        )
        .bind(&snapshot.user_code)
        .bind(&snapshot.player_name)
        .bind(snapshot.recorded_at)
        .bind(s.d_parry_pct)
        .bind(s.d_impact_pct)
        .bind(s.d_od_pct)
        .bind(s.d_rush_p_pct)
        .bind(s.d_rush_c_pct)
        .bind(s.d_reversal_pct)
        .bind(s.sa1_pct)
        .bind(s.sa2_pct)
        .bind(s.sa3_pct)
        .bind(s.ca_pct)
        .bind(s.impact_win)
        .bind(s.impact_pc_win)
        .bind(s.impact_counter_win)
        .bind(s.impact_lose)
        .bind(s.impact_pc_lose)
        .bind(s.impact_counter_lose)
        .bind(s.just_parry_count)
        .bind(s.throw_win)
        .bind(s.throw_lose)
        .bind(s.throw_escape)
        .bind(s.stun_win)
        .bind(s.stun_lose)
        .bind(s.wall_push_sec)
        .bind(s.wall_pushed_sec)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, StoreError> {
        let subjects = sqlx::query_as::<_, Subject>(
            "SELECT user_code, player_name, note, is_active FROM target_users ORDER BY user_code",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(subjects)
    }

    async fn active_subjects(&self) -> Result<Vec<Subject>, StoreError> {
        let subjects = sqlx::query_as::<_, Subject>(
            "SELECT user_code, player_name, note, is_active FROM target_users \
             WHERE is_active ORDER BY user_code",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(subjects)
    }

    async fn subject(&self, user_code: &str) -> Result<Option<Subject>, StoreError> {
        let subject = sqlx::query_as::<_, Subject>(
            "SELECT user_code, player_name, note, is_active FROM target_users \
             WHERE user_code = $1",
        )
        .bind(user_code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(subject)
    }

    async fn upsert_subject(&self, subject: &Subject) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO target_users (user_code, player_name, note, is_active)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_code) DO UPDATE SET
                player_name = EXCLUDED.player_name,
                note = EXCLUDED.note,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(&subject.user_code)
        .bind(&subject.player_name)
        .bind(&subject.note)
        .bind(subject.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn run_times(&self) -> Result<String, StoreError> {
        let row = sqlx::query("SELECT value FROM scraper_config WHERE key = 'run_times'")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row
            .map(|r| r.get("value"))
            .unwrap_or_else(|| DEFAULT_RUN_TIMES.to_string()))
    }

    async fn set_run_times(&self, csv: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO scraper_config (key, value) VALUES ('run_times', $1) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(csv)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_public_url(&self, url: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO system_status (key, value, updated_at) \
             VALUES ('public_url', $1, NOW()) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
        )
        .bind(url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
