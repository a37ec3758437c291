//! Wake-Delay Policy
//!
//! Decides how long an account sleeps before its next run: shortly after the
//! earliest tracked crop matures, or a randomized default when nothing worth
//! waking for is known.

use std::time::Duration;

use rand::Rng;

use crate::config::SchedulerSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakePolicy {
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub jitter_min: Duration,
    pub jitter_max: Duration,
}

impl WakePolicy {
    pub fn from_settings(settings: &SchedulerSettings) -> Self {
        Self {
            min_interval: Duration::from_secs(settings.min_interval_secs),
            max_interval: Duration::from_secs(settings.max_interval_secs),
            jitter_min: Duration::from_secs(settings.jitter_min_secs),
            jitter_max: Duration::from_secs(settings.jitter_max_secs),
        }
    }

    /// Delay until the next run.
    ///
    /// With a maturity time, wake `jitter` after it; if that lands sooner than
    /// `min_interval`, fall back to the randomized default range.
    pub fn next_delay<R: Rng + ?Sized>(
        &self,
        now_secs: i64,
        next_maturity: Option<i64>,
        rng: &mut R,
    ) -> Duration {
        let Some(mature_at) = next_maturity else {
            return self.default_delay(rng);
        };

        let until = Duration::from_secs(mature_at.saturating_sub(now_secs).max(0) as u64);
        let delay = until + random_between(rng, self.jitter_min, self.jitter_max);
        if delay < self.min_interval {
            return self.default_delay(rng);
        }
        delay
    }

    /// Uniform delay in `[min_interval, max_interval]`.
    pub fn default_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        random_between(rng, self.min_interval, self.max_interval)
    }
}

impl Default for WakePolicy {
    fn default() -> Self {
        Self::from_settings(&SchedulerSettings::default())
    }
}

fn random_between<R: Rng + ?Sized>(rng: &mut R, low: Duration, high: Duration) -> Duration {
    if high <= low {
        return low;
    }
    let millis = rng.random_range(low.as_millis() as u64..=high.as_millis() as u64);
    Duration::from_millis(millis)
}
