//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database pool and repositories (SQLite)
//! - Prometheus metrics

pub mod database;
pub mod metrics;
pub mod repositories;
