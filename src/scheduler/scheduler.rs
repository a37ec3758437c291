//! Per-Account Scheduler
//!
//! Every scheduled account owns one driver task that sleeps, runs the work
//! callback, recomputes its delay from the store and sleeps again. The map of
//! driver tasks is keyed by account id; replacing an entry aborts the old
//! driver, so an account never has two live timers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::wake::WakePolicy;
use super::worker::Worker;
use crate::domain::{AccountRepository, LandRepository};
use crate::infrastructure::metrics;
use crate::shared::clock::ServerClock;
use crate::shared::error::AppError;

/// Snapshot of scheduler state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    /// Accounts with an armed timer, ascending
    pub account_ids: Vec<i64>,
}

struct ScheduleEntry {
    generation: u64,
    task: JoinHandle<()>,
}

struct SchedulerInner {
    running: AtomicBool,
    entries: DashMap<i64, ScheduleEntry>,
    /// Generation counter value at each account's last removal
    removals: DashMap<i64, u64>,
    next_generation: AtomicU64,
    policy: WakePolicy,
    accounts: Arc<dyn AccountRepository>,
    lands: Arc<dyn LandRepository>,
    worker: Arc<dyn Worker>,
    clock: Arc<ServerClock>,
}

/// Adaptive per-account scheduler. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(
        policy: WakePolicy,
        accounts: Arc<dyn AccountRepository>,
        lands: Arc<dyn LandRepository>,
        worker: Arc<dyn Worker>,
        clock: Arc<ServerClock>,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                running: AtomicBool::new(false),
                entries: DashMap::new(),
                removals: DashMap::new(),
                next_generation: AtomicU64::new(1),
                policy,
                accounts,
                lands,
                worker,
                clock,
            }),
        }
    }

    /// Start scheduling every active account.
    ///
    /// Returns the number of accounts armed; a no-op returning 0 when
    /// already running.
    pub async fn start(&self) -> Result<usize, AppError> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            tracing::info!("Scheduler already running");
            return Ok(0);
        }

        let accounts = match self.inner.accounts.find_active().await {
            Ok(accounts) => accounts,
            Err(e) => {
                self.inner.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let mut armed = 0;
        for account in &accounts {
            if self.inner.schedule(account.id).await {
                armed += 1;
            }
        }

        if armed == 0 {
            tracing::info!("Scheduler started with no active accounts");
        } else {
            tracing::info!(accounts = armed, "Scheduler started");
        }
        Ok(armed)
    }

    /// Stop scheduling. Runs already in progress finish but are not rescheduled.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.entries.retain(|_, entry| {
            entry.task.abort();
            false
        });
        metrics::set_scheduled_accounts(0);
        tracing::info!("Scheduler stopped");
    }

    /// Arm (or re-arm) an account. Ignored unless running.
    pub async fn add_account(&self, account_id: i64) -> bool {
        if !self.is_running() {
            return false;
        }
        self.inner.schedule(account_id).await
    }

    /// Cancel an account's timer. Returns whether one was armed.
    pub fn remove_account(&self, account_id: i64) -> bool {
        // Stamped first so an add still computing its delay sees the removal
        let stamp = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
        self.inner.removals.insert(account_id, stamp);
        let removed = self.inner.entries.remove(&account_id);
        let found = match removed {
            Some((_, entry)) => {
                entry.task.abort();
                true
            }
            None => false,
        };
        metrics::set_scheduled_accounts(self.inner.entries.len());
        found
    }

    pub fn status(&self) -> SchedulerStatus {
        let mut account_ids: Vec<i64> = self.inner.entries.iter().map(|e| *e.key()).collect();
        account_ids.sort_unstable();
        SchedulerStatus {
            running: self.is_running(),
            account_ids,
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }
}

impl SchedulerInner {
    /// Compute the first delay and install a driver task for the account.
    async fn schedule(self: &Arc<Self>, account_id: i64) -> bool {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        match self.accounts.is_active(account_id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(account_id, "Account not active, not scheduling");
                return false;
            }
            Err(e) => {
                tracing::warn!(account_id, error = %e, "Failed to check account status");
                return false;
            }
        }

        let delay = self.compute_delay(account_id).await;
        let wake_at = Instant::now() + delay;

        // Checked and spawned under the entry lock: the driver can never see
        // a half-installed entry, and a stop or removal that raced the awaits
        // above wins.
        let entry = self.entries.entry(account_id);
        if !self.running.load(Ordering::SeqCst) || self.removed_since(account_id, generation) {
            tracing::debug!(account_id, "Stopped or removed while scheduling, not armed");
            return false;
        }
        match entry {
            Entry::Occupied(mut occupied) => {
                let task = tokio::spawn(Arc::clone(self).drive(account_id, generation, wake_at));
                let previous =
                    std::mem::replace(occupied.get_mut(), ScheduleEntry { generation, task });
                previous.task.abort();
            }
            Entry::Vacant(vacant) => {
                let task = tokio::spawn(Arc::clone(self).drive(account_id, generation, wake_at));
                vacant.insert(ScheduleEntry { generation, task });
            }
        }
        metrics::set_scheduled_accounts(self.entries.len());

        tracing::info!(account_id, delay_mins = delay.as_secs() / 60, "Next run scheduled");
        true
    }

    fn removed_since(&self, account_id: i64, generation: u64) -> bool {
        self.removals
            .get(&account_id)
            .is_some_and(|stamp| *stamp > generation)
    }

    async fn drive(self: Arc<Self>, account_id: i64, generation: u64, mut wake_at: Instant) {
        loop {
            tokio::time::sleep_until(wake_at).await;
            if !self.running.load(Ordering::SeqCst) {
                return;
            }

            // Own task: a panic in the callback must not take the driver down
            let worker = Arc::clone(&self.worker);
            let outcome = tokio::spawn(async move { worker.run(account_id).await }).await;
            match outcome {
                Ok(Ok(())) => metrics::record_scheduler_run("ok"),
                Ok(Err(e)) => {
                    metrics::record_scheduler_run("error");
                    tracing::warn!(account_id, error = %e, "Worker run failed");
                }
                Err(join_error) => {
                    metrics::record_scheduler_run("panic");
                    tracing::error!(account_id, error = %join_error, "Worker run panicked");
                }
            }

            if !self.running.load(Ordering::SeqCst) {
                return;
            }

            match self.accounts.is_active(account_id).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::info!(account_id, "Account no longer active, unscheduled");
                    self.entries.remove_if(&account_id, |_, entry| entry.generation == generation);
                    metrics::set_scheduled_accounts(self.entries.len());
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        account_id,
                        error = %e,
                        "Failed to check account status, keeping schedule"
                    );
                }
            }

            let delay = self.compute_delay(account_id).await;
            wake_at = Instant::now() + delay;
            tracing::info!(account_id, delay_mins = delay.as_secs() / 60, "Next run scheduled");
        }
    }

    async fn compute_delay(&self, account_id: i64) -> Duration {
        let now = self.clock.now_secs();
        let next_maturity = match self.lands.next_maturity(account_id, now).await {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!(
                    account_id,
                    error = %e,
                    "Failed to read maturity times, using default delay"
                );
                None
            }
        };
        let mut rng = rand::rng();
        self.policy.next_delay(now, next_maturity, &mut rng)
    }
}
