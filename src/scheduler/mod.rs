//! # Scheduler
//!
//! Decides when each account runs next and drives the runs.
//!
//! - **wake**: delay policy from maturity times
//! - **scheduler**: one cancellable driver task per account
//! - **worker**: the work callback and the routine it runs on a session

pub mod wake;
#[allow(clippy::module_inception)]
pub mod scheduler;
pub mod worker;

pub use scheduler::{Scheduler, SchedulerStatus};
pub use wake::WakePolicy;
pub use worker::{AccountWorker, LandSyncRoutine, Routine, Worker};
