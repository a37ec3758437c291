//! Repository Implementations
//!
//! SQLite implementations of domain repository traits.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use sqlx::SqlitePool;
//! use crate::infrastructure::repositories::{SqliteAccountRepository, SqliteLandRepository};
//!
//! fn setup_repositories(pool: SqlitePool) {
//!     let accounts = SqliteAccountRepository::new(pool.clone());
//!     let lands = SqliteLandRepository::new(pool);
//! }
//! ```

pub mod account_repository;
pub mod land_repository;

pub use account_repository::SqliteAccountRepository;
pub use land_repository::SqliteLandRepository;
