//! Session Events
//!
//! Typed events published by a session to its subscribers.

use serde::Serialize;

use super::messages::{FriendApplication, FriendInfo, GoodsInfo, LandInfo, TaskInfo};

/// Cached view of the logged-in player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountSnapshot {
    /// Game-side player id; zero until login succeeds
    pub gid: i64,
    pub name: String,
    pub level: i64,
    pub gold: i64,
    pub exp: i64,
}

/// Events emitted by a session.
///
/// Delivered over a broadcast channel: fire-and-forget, any number of
/// independent subscribers, slow subscribers may observe `Lagged`.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    LoginSuccess(AccountSnapshot),
    StatsUpdate { level: i64, gold: i64, exp: i64 },
    Kickout { tag: String },
    LandsChanged(Vec<LandInfo>),
    /// Plots of another player's farm, pushed while visiting it.
    FriendLandsChanged { host_gid: i64, lands: Vec<LandInfo> },
    FriendApplicationReceived(Vec<FriendApplication>),
    FriendAdded(Vec<FriendInfo>),
    GoodsUnlocked(Vec<GoodsInfo>),
    TaskInfo(TaskInfo),
    Disconnected { reason: String },
}

impl SessionEvent {
    /// Get the event name for logging
    pub fn event_name(&self) -> &'static str {
        match self {
            SessionEvent::LoginSuccess(_) => "loginSuccess",
            SessionEvent::StatsUpdate { .. } => "statsUpdate",
            SessionEvent::Kickout { .. } => "kickout",
            SessionEvent::LandsChanged(_) => "landsChanged",
            SessionEvent::FriendLandsChanged { .. } => "friendLandsChanged",
            SessionEvent::FriendApplicationReceived(_) => "friendApplicationReceived",
            SessionEvent::FriendAdded(_) => "friendAdded",
            SessionEvent::GoodsUnlocked(_) => "goodsUnlocked",
            SessionEvent::TaskInfo(_) => "taskInfo",
            SessionEvent::Disconnected { .. } => "disconnected",
        }
    }
}
