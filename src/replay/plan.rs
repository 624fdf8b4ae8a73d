//! Replay bounds

use std::time::Duration;

/// Options for one replay run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOptions {
    /// Publish the recorded start message before the first event
    pub send_initial_state: bool,
    /// Number of leading events to skip
    pub skip: usize,
    /// Number of events to send, 0 for all remaining
    pub limit: usize,
    /// Pause between issuing consecutive events
    pub delay: Duration,
}

/// Range of event indices a replay will send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayPlan {
    pub start: usize,
    pub count: usize,
    pub total: usize,
    /// A non-zero limit was reduced to fit the artifact
    pub clamped: bool,
    /// `skip` is past the end of the artifact
    pub skipped_all: bool,
}

impl ReplayPlan {
    pub fn new(total: usize, skip: usize, limit: usize) -> Self {
        if skip > total {
            return Self {
                start: total,
                count: 0,
                total,
                clamped: false,
                skipped_all: true,
            };
        }
        let remaining = total - skip;
        let (count, clamped) = match limit {
            0 => (remaining, false),
            n if n > remaining => (remaining, true),
            n => (n, false),
        };
        Self {
            start: skip,
            count,
            total,
            clamped,
            skipped_all: false,
        }
    }

    pub fn indices(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_bounds() {
        let plan = ReplayPlan::new(10, 2, 3);
        assert_eq!(plan.indices(), 2..5);
        assert!(!plan.clamped);
        assert!(!plan.skipped_all);
    }

    #[test]
    fn test_limit_clamped_to_remaining() {
        let plan = ReplayPlan::new(3, 1, 10);
        assert_eq!(plan.count, 2);
        assert_eq!(plan.indices(), 1..3);
        assert!(plan.clamped);
    }

    #[test]
    fn test_zero_limit_means_all_remaining() {
        let plan = ReplayPlan::new(5, 1, 0);
        assert_eq!(plan.count, 4);
        assert!(!plan.clamped);
    }

    #[test]
    fn test_skip_past_end() {
        let plan = ReplayPlan::new(3, 4, 1);
        assert_eq!(plan.count, 0);
        assert!(plan.skipped_all);
        assert!(plan.indices().is_empty());
    }

    #[test]
    fn test_skip_equal_to_total_sends_nothing() {
        let plan = ReplayPlan::new(3, 3, 1);
        assert_eq!(plan.count, 0);
        assert!(!plan.skipped_all);
        assert!(plan.clamped);
    }
}
