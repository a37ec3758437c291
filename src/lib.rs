//! # Farm Runner Library
//!
//! Unattended client for a farming game's WebSocket gateway:
//! - Protocol client engine (framing, request correlation, push dispatch,
//!   heartbeat liveness)
//! - Adaptive per-account scheduler that wakes each account shortly after its
//!   crops mature
//! - SQLite store for accounts and observed land state
//!
//! ## Module Structure
//!
//! ```text
//! farm_runner/
//! +-- config/         Configuration management
//! +-- domain/         Entities and repository traits
//! +-- infrastructure/ Database, repositories, metrics
//! +-- protocol/       Gateway client engine
//! +-- scheduler/      Wake policy, driver tasks, worker
//! +-- shared/         Errors and server clock
//! ```

// Configuration module
pub mod config;

// Domain layer - entities and repository contracts
pub mod domain;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Gateway protocol client
pub mod protocol;

// Account scheduling
pub mod scheduler;

// Shared utilities
pub mod shared;

// Application startup and wiring
pub mod startup;

// Telemetry and observability
pub mod telemetry;
