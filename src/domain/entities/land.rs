//! Land and friend records and the repository trait over them.
//!
//! Maps to the `my_lands`, `friends` and `friend_lands` tables.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// State of one land plot, own or observed on a friend's farm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandRecord {
    pub land_id: i64,
    pub plant_id: i64,
    pub plant_name: String,
    /// Unix seconds when the crop matures; 0 when empty
    pub mature_time: i64,
    pub phase: i32,
}

/// A friend of an account, as last seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friend {
    pub id: i64,
    pub account_id: i64,
    pub gid: i64,
    pub name: String,
    pub level: i64,
    /// Unix seconds of the last visit; 0 if never visited
    pub last_visit: i64,
}

/// Repository trait for land-state data access.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LandRepository: Send + Sync {
    /// Insert or replace one of the account's own plots.
    async fn upsert_own_land(&self, account_id: i64, land: &LandRecord) -> Result<(), AppError>;

    /// Insert or refresh a friend; returns the friend's row id.
    async fn upsert_friend(
        &self,
        account_id: i64,
        gid: i64,
        name: &str,
        level: i64,
    ) -> Result<i64, AppError>;

    /// Insert or replace a plot observed on a friend's farm.
    async fn upsert_friend_land(&self, friend_id: i64, land: &LandRecord) -> Result<(), AppError>;

    /// The account's own plots, ordered by land id.
    async fn own_lands(&self, account_id: i64) -> Result<Vec<LandRecord>, AppError>;

    /// Earliest maturity strictly after `now` across own and friend plots.
    async fn next_maturity(&self, account_id: i64, now: i64) -> Result<Option<i64>, AppError>;
}
