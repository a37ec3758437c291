//! Server Clock
//!
//! Tracks the offset between local wall time and the game server's clock.
//! Login and heartbeat replies carry a server timestamp which is folded in
//! here; the scheduler reads "now" through the same offset so maturity
//! timestamps written from server data compare correctly.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Clock-sync offset shared by every session of one application.
#[derive(Debug, Default)]
pub struct ServerClock {
    offset_ms: AtomicI64,
}

impl ServerClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a server timestamp (milliseconds since the epoch).
    ///
    /// Zero or negative hints are ignored.
    pub fn sync(&self, server_millis: i64) {
        if server_millis <= 0 {
            return;
        }
        let offset = server_millis - Utc::now().timestamp_millis();
        self.offset_ms.store(offset, Ordering::Relaxed);
        tracing::trace!(offset_ms = offset, "Server clock synced");
    }

    /// Current offset in milliseconds (server minus local).
    pub fn offset_ms(&self) -> i64 {
        self.offset_ms.load(Ordering::Relaxed)
    }

    /// Estimated server time in milliseconds.
    pub fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis() + self.offset_ms()
    }

    /// Estimated server time in whole seconds.
    pub fn now_secs(&self) -> i64 {
        self.now_millis().div_euclid(1000)
    }
}
