//! # Domain Layer
//!
//! Account and land records plus the repository contracts the scheduler and
//! worker depend on. Independent of the store and of the gateway protocol.

pub mod entities;

pub use entities::*;
