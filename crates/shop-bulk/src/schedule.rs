//! Poll cadence for bulk operations.

use std::time::Duration;

/// Tiered poll schedule: short intervals while a job is likely to finish
/// soon, longer ones after that, and a hard cap on the number of polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    /// Polls 1 through `first_tier_polls` wait `first_interval`.
    pub first_tier_polls: u32,
    pub first_interval: Duration,
    /// Polls up to `second_tier_polls` wait `second_interval`.
    pub second_tier_polls: u32,
    pub second_interval: Duration,
    /// Every later poll waits `later_interval`.
    pub later_interval: Duration,
    /// Polls before giving up.
    pub max_polls: u32,
}

impl PollSchedule {
    pub const FIRST_TIER_POLLS: u32 = 10;
    pub const SECOND_TIER_POLLS: u32 = 20;
    pub const FIRST_INTERVAL: Duration = Duration::from_secs(10);
    pub const SECOND_INTERVAL: Duration = Duration::from_secs(20);
    pub const LATER_INTERVAL: Duration = Duration::from_secs(30);
    pub const MAX_POLLS: u32 = 30;

    /// The same interval for every poll.
    pub fn fixed(interval: Duration, max_polls: u32) -> Self {
        Self {
            first_tier_polls: max_polls,
            first_interval: interval,
            second_tier_polls: max_polls,
            second_interval: interval,
            later_interval: interval,
            max_polls,
        }
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }

    /// Wait before poll number `poll` (1-based).
    pub fn interval_for(&self, poll: u32) -> Duration {
        if poll <= self.first_tier_polls {
            self.first_interval
        } else if poll <= self.second_tier_polls {
            self.second_interval
        } else {
            self.later_interval
        }
    }

    /// Sum of every wait when all polls are used.
    pub fn total_wait(&self) -> Duration {
        (1..=self.max_polls).map(|poll| self.interval_for(poll)).sum()
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            first_tier_polls: Self::FIRST_TIER_POLLS,
            first_interval: Self::FIRST_INTERVAL,
            second_tier_polls: Self::SECOND_TIER_POLLS,
            second_interval: Self::SECOND_INTERVAL,
            later_interval: Self::LATER_INTERVAL,
            max_polls: Self::MAX_POLLS,
        }
    }
}
