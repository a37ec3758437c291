//! # Domain Entities
//!
//! Records the runner persists between scheduled runs.
//!
//! - **Account**: a game account with its login code and last known stats
//! - **LandRecord / Friend**: plot states used to time the next wake-up
//!
//! Each entity has an associated repository trait defining data access
//! operations, implemented in the infrastructure layer.

mod account;
mod land;

pub use account::{Account, AccountRepository, AccountStats, AccountStatus, NewAccount};
pub use land::{Friend, LandRecord, LandRepository};

#[cfg(test)]
pub use account::MockAccountRepository;
#[cfg(test)]
pub use land::MockLandRepository;
