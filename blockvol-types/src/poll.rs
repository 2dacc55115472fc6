//! Bounded polling budgets

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fixed retry count and fixed interval for a status poll
///
/// Polls never consult a caller deadline; the budget is exhausted after
/// `retries * interval` and the poll then fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    pub retries: u32,
    pub interval_ms: u64,
}

impl PollPolicy {
    pub const fn new(retries: u32, interval: Duration) -> Self {
        Self {
            retries,
            interval_ms: interval.as_millis() as u64,
        }
    }

    /// Same retry count with no sleep between attempts
    pub const fn immediate(retries: u32) -> Self {
        Self {
            retries,
            interval_ms: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Worst-case wall time spent sleeping
    pub fn budget(&self) -> Duration {
        self.interval() * self.retries
    }
}
