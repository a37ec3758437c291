//! Account Repository Implementation
//!
//! SQLite implementation of the AccountRepository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use validator::Validate;

use crate::domain::{Account, AccountRepository, AccountStats, AccountStatus, NewAccount};
use crate::shared::error::AppError;

/// Database row representation of the accounts table.
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: i64,
    gid: Option<i64>,
    name: String,
    code: String,
    platform: String,
    level: i64,
    gold: i64,
    exp: i64,
    status: String,
    created_at: i64,
    updated_at: i64,
}

impl AccountRow {
    /// Convert database row to domain Account entity.
    fn into_account(self) -> Account {
        Account {
            id: self.id,
            gid: self.gid,
            name: self.name,
            code: self.code,
            platform: self.platform,
            level: self.level,
            gold: self.gold,
            exp: self.exp,
            status: AccountStatus::from_str(&self.status),
            created_at: from_unix(self.created_at),
            updated_at: from_unix(self.updated_at),
        }
    }
}

fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

const ACCOUNT_COLUMNS: &str =
    "id, gid, name, code, platform, level, gold, exp, status, created_at, updated_at";

/// SQLite account repository implementation.
#[derive(Clone)]
pub struct SqliteAccountRepository {
    pool: SqlitePool,
}

impl SqliteAccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn create(&self, account: &NewAccount) -> Result<Account, AppError> {
        account
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "INSERT INTO accounts (code, platform, name) VALUES (?1, ?2, ?3) \
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(&account.code)
        .bind(&account.platform)
        .bind(&account.name)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_account())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, AppError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_account()))
    }

    async fn find_active(&self) -> Result<Vec<Account>, AppError> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE status = ?1 ORDER BY id"
        ))
        .bind(AccountStatus::Active.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_account()).collect())
    }

    async fn is_active(&self, id: i64) -> Result<bool, AppError> {
        let active = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM accounts WHERE id = ?1 AND status = ?2)",
        )
        .bind(id)
        .bind(AccountStatus::Active.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(active)
    }

    async fn update_stats(&self, id: i64, stats: &AccountStats) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET gid = CASE WHEN ?2 = 0 THEN gid ELSE ?2 END,
                name = CASE WHEN ?3 = '' THEN name ELSE ?3 END,
                level = ?4,
                gold = ?5,
                exp = ?6,
                updated_at = strftime('%s', 'now')
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(stats.gid)
        .bind(&stats.name)
        .bind(stats.level)
        .bind(stats.gold)
        .bind(stats.exp)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Account with id {} not found", id)));
        }

        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Account with id {} not found", id)));
        }

        Ok(())
    }
}
