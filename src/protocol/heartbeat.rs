//! Heartbeat Liveness Tracking
//!
//! Distinguishes a stalled connection from an idle one. The session drives
//! the monitor from its heartbeat task: `check` on every tick, `record_reply`
//! whenever a heartbeat reply arrives.

use std::time::Duration;

use tokio::time::Instant;

/// Result of one liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// A reply arrived within the staleness threshold.
    Healthy,
    /// Silent for too long, but below the miss limit.
    Stale { misses: u32, silent_for: Duration },
    /// Miss limit reached; pending requests should be failed.
    Unresponsive { misses: u32, silent_for: Duration },
}

#[derive(Debug, Clone, Copy)]
struct HeartbeatState {
    last_response: Instant,
    miss_count: u32,
}

#[derive(Debug)]
pub struct HeartbeatMonitor {
    state: HeartbeatState,
    stale_after: Duration,
    miss_limit: u32,
}

impl HeartbeatMonitor {
    pub fn new(stale_after: Duration, miss_limit: u32) -> Self {
        Self {
            state: HeartbeatState {
                last_response: Instant::now(),
                miss_count: 0,
            },
            stale_after,
            miss_limit: miss_limit.max(1),
        }
    }

    /// Restart tracking, as after a fresh login.
    pub fn reset(&mut self, now: Instant) {
        self.state = HeartbeatState {
            last_response: now,
            miss_count: 0,
        };
    }

    /// A heartbeat reply arrived. Returns the misses it cleared.
    pub fn record_reply(&mut self, now: Instant) -> u32 {
        self.state.last_response = now;
        std::mem::take(&mut self.state.miss_count)
    }

    /// Evaluate liveness on a tick.
    pub fn check(&mut self, now: Instant) -> Liveness {
        let silent_for = now.saturating_duration_since(self.state.last_response);
        if silent_for <= self.stale_after {
            return Liveness::Healthy;
        }

        self.state.miss_count = self.state.miss_count.saturating_add(1);
        let misses = self.state.miss_count;
        if misses >= self.miss_limit {
            Liveness::Unresponsive { misses, silent_for }
        } else {
            Liveness::Stale { misses, silent_for }
        }
    }
}
