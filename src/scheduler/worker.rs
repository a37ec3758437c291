//! Account Worker
//!
//! The unit of work the scheduler runs per wake-up: connect one fresh
//! session, let a routine use it, record what was learned, disconnect.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use rand::Rng;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;

use crate::domain::{Account, AccountRepository, AccountStats, LandRecord, LandRepository};
use crate::protocol::events::{AccountSnapshot, SessionEvent};
use crate::protocol::messages::LandInfo;
use crate::protocol::session::{Credential, Session, SessionFactory};
use crate::shared::error::ProtocolError;

/// Work callback invoked by the scheduler.
#[async_trait]
pub trait Worker: Send + Sync {
    async fn run(&self, account_id: i64) -> anyhow::Result<()>;
}

/// What to do with a logged-in session.
#[async_trait]
pub trait Routine: Send + Sync {
    async fn run(&self, session: &Session, account: &Account) -> anyhow::Result<()>;
}

/// Default worker: one session per run.
pub struct AccountWorker {
    sessions: SessionFactory,
    accounts: Arc<dyn AccountRepository>,
    routine: Arc<dyn Routine>,
    preconnect_min: Duration,
    preconnect_max: Duration,
}

impl AccountWorker {
    pub fn new(
        sessions: SessionFactory,
        accounts: Arc<dyn AccountRepository>,
        routine: Arc<dyn Routine>,
    ) -> Self {
        let settings = sessions.settings();
        let preconnect_min = Duration::from_millis(settings.preconnect_min_ms);
        let preconnect_max =
            Duration::from_millis(settings.preconnect_max_ms.max(settings.preconnect_min_ms));
        Self {
            sessions,
            accounts,
            routine,
            preconnect_min,
            preconnect_max,
        }
    }

    async fn drive(&self, session: &Session, account: &Account) -> anyhow::Result<()> {
        let credential = Credential {
            code: account.code.clone(),
            platform: account.platform.clone(),
        };
        let snapshot = session.connect(&credential).await.context("login failed")?;
        self.accounts.update_stats(account.id, &stats_from(&snapshot)).await?;

        let outcome = self.routine.run(session, account).await;

        // Pushes received during the routine may have moved the stats
        let last = session.snapshot();
        if last.gid != 0 {
            self.accounts.update_stats(account.id, &stats_from(&last)).await?;
        }
        outcome
    }
}

#[async_trait]
impl Worker for AccountWorker {
    async fn run(&self, account_id: i64) -> anyhow::Result<()> {
        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| anyhow!("account {account_id} not found"))?;

        let wait = {
            let mut rng = rand::rng();
            let min = self.preconnect_min.as_millis() as u64;
            let max = self.preconnect_max.as_millis() as u64;
            let millis = rng.random_range(min..=max);
            Duration::from_millis(millis)
        };
        tracing::debug!(account_id, wait_ms = wait.as_millis() as u64, "Waiting before connect");
        tokio::time::sleep(wait).await;

        let session = self.sessions.create(account_id);
        tracing::info!(
            account_id,
            session_id = %session.id(),
            name = %account.display_name(),
            "Worker run started"
        );

        let outcome = self.drive(&session, &account).await;
        session.disconnect();

        match &outcome {
            Ok(()) => tracing::info!(account_id, "Worker run finished"),
            Err(e) if connection_lost(e) => {
                tracing::warn!(account_id, error = %e, "Worker run cut short, connection lost")
            }
            Err(e) => tracing::warn!(account_id, error = %e, "Worker run failed"),
        }
        outcome
    }
}

/// Whether a run failed because its session went away rather than on a
/// request or store error.
fn connection_lost(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<ProtocolError>())
        .any(ProtocolError::is_fatal)
}

fn stats_from(snapshot: &AccountSnapshot) -> AccountStats {
    AccountStats {
        gid: snapshot.gid,
        name: snapshot.name.clone(),
        level: snapshot.level,
        gold: snapshot.gold,
        exp: snapshot.exp,
    }
}

impl From<&LandInfo> for LandRecord {
    fn from(land: &LandInfo) -> Self {
        Self {
            land_id: land.id,
            plant_id: land.plant_id,
            plant_name: land.plant_name.clone(),
            mature_time: land.mature_time,
            phase: land.phase,
        }
    }
}

/// Observes a session for a fixed window and records the plot states, own and
/// friends', and the friends it is told about.
pub struct LandSyncRoutine {
    lands: Arc<dyn LandRepository>,
    window: Duration,
}

impl LandSyncRoutine {
    pub fn new(lands: Arc<dyn LandRepository>, window: Duration) -> Self {
        Self { lands, window }
    }
}

#[async_trait]
impl Routine for LandSyncRoutine {
    async fn run(&self, session: &Session, account: &Account) -> anyhow::Result<()> {
        let mut events = session.subscribe();
        let deadline = Instant::now() + self.window;
        let mut lands_stored = 0usize;
        let mut friend_lands_stored = 0usize;

        loop {
            let event = match tokio::time::timeout_at(deadline, events.recv()).await {
                Err(_) => break,
                Ok(Ok(event)) => event,
                Ok(Err(RecvError::Lagged(skipped))) => {
                    tracing::warn!(account_id = account.id, skipped, "Session events lagged");
                    continue;
                }
                Ok(Err(RecvError::Closed)) => break,
            };

            match event {
                SessionEvent::LandsChanged(lands) => {
                    for land in &lands {
                        self.lands.upsert_own_land(account.id, &LandRecord::from(land)).await?;
                    }
                    lands_stored += lands.len();
                }
                SessionEvent::FriendLandsChanged { host_gid, lands } => {
                    // Name and level are unknown here; the store keeps what it has
                    let friend_id = self.lands.upsert_friend(account.id, host_gid, "", 0).await?;
                    for land in &lands {
                        self.lands.upsert_friend_land(friend_id, &LandRecord::from(land)).await?;
                    }
                    friend_lands_stored += lands.len();
                }
                SessionEvent::FriendAdded(friends) => {
                    for friend in &friends {
                        self.lands
                            .upsert_friend(account.id, friend.gid, &friend.name, friend.level)
                            .await?;
                    }
                }
                SessionEvent::Disconnected { reason } => {
                    anyhow::bail!("session ended during routine: {reason}");
                }
                other => {
                    tracing::trace!(
                        account_id = account.id,
                        event = other.event_name(),
                        "Event not recorded"
                    );
                }
            }
        }

        tracing::debug!(
            account_id = account.id,
            lands_stored,
            friend_lands_stored,
            "Land sync window closed"
        );
        Ok(())
    }
}
