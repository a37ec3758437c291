//! Application Startup
//!
//! Builds the store, the session factory, the worker and the scheduler from
//! settings, and runs the scheduler until Ctrl-C.

use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Settings;
use crate::domain::{Account, AccountRepository, LandRepository};
use crate::infrastructure::repositories::{SqliteAccountRepository, SqliteLandRepository};
use crate::infrastructure::{database, metrics};
use crate::protocol::session::SessionFactory;
use crate::protocol::transport::{Connector, WebSocketConnector};
use crate::scheduler::{AccountWorker, LandSyncRoutine, Scheduler, WakePolicy, Worker};
use crate::shared::clock::ServerClock;

/// Stored farm state of one active account.
#[derive(Debug, Clone)]
pub struct AccountReport {
    pub account: Account,
    pub lands: usize,
    /// Earliest future maturity, own or friend land, in server seconds.
    pub next_maturity: Option<i64>,
}

/// Application instance
pub struct Application {
    pub settings: Arc<Settings>,
    pub pool: SqlitePool,
    pub accounts: Arc<dyn AccountRepository>,
    pub lands: Arc<dyn LandRepository>,
    pub clock: Arc<ServerClock>,
    pub worker: Arc<dyn Worker>,
    pub scheduler: Scheduler,
}

impl Application {
    /// Build the application from settings, talking to the real gateway.
    pub async fn build(settings: Settings) -> Result<Self> {
        let connector = Arc::new(WebSocketConnector::new(
            settings.gateway.user_agent.clone(),
            settings.gateway.origin.clone(),
        ));
        Self::build_with_connector(settings, connector).await
    }

    /// Build the application with a custom gateway connector.
    pub async fn build_with_connector(
        settings: Settings,
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        database::ensure_data_dir(&settings.database.url)?;
        let pool = database::create_pool(&settings.database).await?;
        database::run_migrations(&pool).await?;
        tracing::info!("Database ready");

        let accounts: Arc<dyn AccountRepository> =
            Arc::new(SqliteAccountRepository::new(pool.clone()));
        let lands: Arc<dyn LandRepository> = Arc::new(SqliteLandRepository::new(pool.clone()));
        let clock = Arc::new(ServerClock::new());

        let sessions = SessionFactory::new(
            settings.gateway.clone(),
            settings.session.clone(),
            connector,
            Arc::clone(&clock),
        );
        let routine = Arc::new(LandSyncRoutine::new(
            Arc::clone(&lands),
            settings.session.observe_window(),
        ));
        let worker: Arc<dyn Worker> =
            Arc::new(AccountWorker::new(sessions, Arc::clone(&accounts), routine));

        let scheduler = Scheduler::new(
            WakePolicy::from_settings(&settings.scheduler),
            Arc::clone(&accounts),
            Arc::clone(&lands),
            Arc::clone(&worker),
            Arc::clone(&clock),
        );

        Ok(Self {
            settings: Arc::new(settings),
            pool,
            accounts,
            lands,
            clock,
            worker,
            scheduler,
        })
    }

    /// Run the scheduler until Ctrl-C
    pub async fn run_until_stopped(self) -> Result<()> {
        let armed = self.scheduler.start().await?;
        tracing::info!(accounts = armed, "Scheduler running, press Ctrl-C to stop");

        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown requested");

        self.scheduler.stop();
        tracing::debug!(metrics = %metrics::gather_metrics(), "Final metrics");
        self.pool.close().await;
        Ok(())
    }

    /// Run one account's work immediately.
    pub async fn run_once(&self, account_id: i64) -> Result<()> {
        self.worker.run(account_id).await
    }

    /// Recorded lands and upcoming maturity for every active account.
    pub async fn report(&self) -> Result<Vec<AccountReport>> {
        let now = self.clock.now_secs();
        let mut reports = Vec::new();
        for account in self.accounts.find_active().await? {
            let lands = self.lands.own_lands(account.id).await?.len();
            let next_maturity = self.lands.next_maturity(account.id, now).await?;
            reports.push(AccountReport {
                account,
                lands,
                next_maturity,
            });
        }
        Ok(reports)
    }
}
