//! Account entity and repository trait.
//!
//! Maps to the `accounts` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::shared::error::AppError;

/// Whether the scheduler should drive an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Disabled,
}

impl AccountStatus {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "active" => Self::Active,
            _ => Self::Disabled,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A game account the runner logs into.
///
/// Maps to the `accounts` table:
/// - id: INTEGER PRIMARY KEY AUTOINCREMENT
/// - gid: INTEGER UNIQUE NULL (known after the first login)
/// - name, code, platform: TEXT
/// - level, gold, exp: INTEGER
/// - status: TEXT DEFAULT 'active'
/// - created_at, updated_at: INTEGER unix seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,

    /// Game-side player id, set after the first successful login
    pub gid: Option<i64>,

    pub name: String,

    /// Login code handed to the gateway
    #[serde(skip_serializing)]
    pub code: String,

    /// Platform tag sent at login
    pub platform: String,

    pub level: i64,
    pub gold: i64,
    pub exp: i64,

    #[serde(default)]
    pub status: AccountStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Name for logs, falling back to the id.
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            format!("account#{}", self.id)
        } else {
            self.name.clone()
        }
    }
}

/// Input for registering an account.
#[derive(Debug, Clone, Validate)]
pub struct NewAccount {
    #[validate(length(min = 1, message = "Login code must not be empty"))]
    pub code: String,
    #[validate(length(min = 1, max = 16, message = "Platform must be 1-16 characters"))]
    pub platform: String,
    #[validate(length(max = 64, message = "Name must be at most 64 characters"))]
    pub name: String,
}

/// Player stats as last observed by a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountStats {
    pub gid: i64,
    pub name: String,
    pub level: i64,
    pub gold: i64,
    pub exp: i64,
}

/// Repository trait for Account data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Register a new account; it starts active.
    async fn create(&self, account: &NewAccount) -> Result<Account, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, AppError>;

    /// All active accounts, ordered by id.
    async fn find_active(&self) -> Result<Vec<Account>, AppError>;

    /// Whether the account exists and is active.
    async fn is_active(&self, id: i64) -> Result<bool, AppError>;

    /// Persist stats observed by a session. A zero gid leaves the stored gid alone.
    async fn update_stats(&self, id: i64, stats: &AccountStats) -> Result<(), AppError>;

    /// Delete an account and everything recorded for it.
    ///
    /// Returns `AppError::NotFound` if no such account exists.
    async fn delete(&self, id: i64) -> Result<(), AppError>;
}
