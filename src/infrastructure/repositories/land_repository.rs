//! Land Repository Implementation
//!
//! SQLite implementation of the LandRepository trait over `my_lands`,
//! `friends` and `friend_lands`.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::{LandRecord, LandRepository};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct LandRow {
    land_id: i64,
    plant_id: i64,
    plant_name: String,
    mature_time: i64,
    phase: i32,
}

impl From<LandRow> for LandRecord {
    fn from(row: LandRow) -> Self {
        Self {
            land_id: row.land_id,
            plant_id: row.plant_id,
            plant_name: row.plant_name,
            mature_time: row.mature_time,
            phase: row.phase,
        }
    }
}

/// SQLite land repository implementation.
#[derive(Clone)]
pub struct SqliteLandRepository {
    pool: SqlitePool,
}

impl SqliteLandRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LandRepository for SqliteLandRepository {
    async fn upsert_own_land(&self, account_id: i64, land: &LandRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO my_lands
                (account_id, land_id, plant_id, plant_name, mature_time, phase, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, strftime('%s', 'now'))
            ON CONFLICT (account_id, land_id) DO UPDATE SET
                plant_id = excluded.plant_id,
                plant_name = excluded.plant_name,
                mature_time = excluded.mature_time,
                phase = excluded.phase,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(account_id)
        .bind(land.land_id)
        .bind(land.plant_id)
        .bind(&land.plant_name)
        .bind(land.mature_time)
        .bind(land.phase)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_friend(
        &self,
        account_id: i64,
        gid: i64,
        name: &str,
        level: i64,
    ) -> Result<i64, AppError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO friends (account_id, gid, name, level)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (account_id, gid) DO UPDATE SET
                name = CASE WHEN excluded.name = '' THEN friends.name ELSE excluded.name END,
                level = CASE WHEN excluded.level = 0 THEN friends.level ELSE excluded.level END
            RETURNING id
            "#,
        )
        .bind(account_id)
        .bind(gid)
        .bind(name)
        .bind(level)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn upsert_friend_land(&self, friend_id: i64, land: &LandRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO friend_lands
                (friend_id, land_id, plant_id, plant_name, mature_time, phase, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, strftime('%s', 'now'))
            ON CONFLICT (friend_id, land_id) DO UPDATE SET
                plant_id = excluded.plant_id,
                plant_name = excluded.plant_name,
                mature_time = excluded.mature_time,
                phase = excluded.phase,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(friend_id)
        .bind(land.land_id)
        .bind(land.plant_id)
        .bind(&land.plant_name)
        .bind(land.mature_time)
        .bind(land.phase)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn own_lands(&self, account_id: i64) -> Result<Vec<LandRecord>, AppError> {
        let rows = sqlx::query_as::<_, LandRow>(
            r#"
            SELECT land_id, plant_id, plant_name, mature_time, phase
            FROM my_lands
            WHERE account_id = ?1
            ORDER BY land_id
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LandRecord::from).collect())
    }

    async fn next_maturity(&self, account_id: i64, now: i64) -> Result<Option<i64>, AppError> {
        let next = sqlx::query_scalar::<_, Option<i64>>(
            r#"
            SELECT MIN(mature_time) FROM (
                SELECT mature_time FROM my_lands
                WHERE account_id = ?1 AND mature_time > ?2
                UNION ALL
                SELECT fl.mature_time FROM friend_lands fl
                JOIN friends f ON fl.friend_id = f.id
                WHERE f.account_id = ?1 AND fl.mature_time > ?2
            )
            "#,
        )
        .bind(account_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(next)
    }
}
