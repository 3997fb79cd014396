//! Reconnect delay policy: exponential growth with a device-dependent cap
//! and attempt budget. Pure so the schedule is testable without timers.

use crate::config::DeviceProfile;
use std::time::Duration;

const BASE_DELAY_MS: u64 = 1000;

pub struct Backoff {
    attempts: u32,
    cap: Duration,
    budget: u32,
}

impl Backoff {
    pub fn new(profile: DeviceProfile) -> Self {
        Self {
            attempts: 0,
            cap: profile.reconnect_cap(),
            budget: profile.reconnect_budget(),
        }
    }

    /// Delay before the next reconnect attempt, or `None` once the attempt
    /// budget is exhausted. Each call consumes one attempt.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.budget {
            return None;
        }
        let delay = Duration::from_millis(BASE_DELAY_MS.saturating_mul(1 << self.attempts.min(30)));
        self.attempts += 1;
        Some(delay.min(self.cap))
    }

    /// Reset after a successful open.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn exhausted(&self) -> bool {
        self.attempts >= self.budget
    }
}
