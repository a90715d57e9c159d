//! Poll pacing as a pure value, independent of any timer primitive.
//!
//! The mailbox wait is a bounded retry loop: check, and if nothing arrived,
//! sleep a fixed interval and check again until the deadline. [`PollSchedule`]
//! captures only the decision - given how much time has elapsed, retry after
//! the interval or give up - so the pacing is unit-testable without real
//! delays.

use std::time::Duration;

/// Fixed-interval polling schedule with a total wall-clock bound.
#[derive(Debug, Clone, Copy)]
pub struct PollSchedule {
    interval: Duration,
    max_wait: Duration,
}

/// What to do after an unsuccessful poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    /// Sleep this long, then poll again.
    RetryAfter(Duration),
    /// The wait bound has elapsed; stop polling.
    GiveUp,
}

impl PollSchedule {
    /// Creates a schedule polling every `interval` for at most `max_wait`.
    #[must_use]
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self { interval, max_wait }
    }

    /// Decides whether to keep polling after `elapsed` wall-clock time.
    ///
    /// The caller polls once before consulting the schedule, so the total
    /// wait never exceeds `max_wait` by more than one interval plus the
    /// duration of the final check.
    #[must_use]
    pub fn decide(&self, elapsed: Duration) -> PollDecision {
        if elapsed >= self.max_wait {
            PollDecision::GiveUp
        } else {
            PollDecision::RetryAfter(self.interval)
        }
    }

    /// The configured poll interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The configured total wait bound.
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEDULE: PollSchedule = PollSchedule {
        interval: Duration::from_secs(2),
        max_wait: Duration::from_secs(120),
    };

    #[test]
    fn test_retries_while_inside_bound() {
        assert_eq!(
            SCHEDULE.decide(Duration::ZERO),
            PollDecision::RetryAfter(Duration::from_secs(2))
        );
        assert_eq!(
            SCHEDULE.decide(Duration::from_secs(119)),
            PollDecision::RetryAfter(Duration::from_secs(2))
        );
    }

    #[test]
    fn test_gives_up_at_bound() {
        assert_eq!(SCHEDULE.decide(Duration::from_secs(120)), PollDecision::GiveUp);
        assert_eq!(SCHEDULE.decide(Duration::from_secs(500)), PollDecision::GiveUp);
    }

    #[test]
    fn test_total_wait_bounded_by_max_plus_one_interval() {
        // Walk the schedule with simulated time: the accumulated sleep at
        // the moment it gives up must not exceed max_wait + interval.
        let mut elapsed = Duration::ZERO;
        loop {
            match SCHEDULE.decide(elapsed) {
                PollDecision::RetryAfter(d) => elapsed += d,
                PollDecision::GiveUp => break,
            }
        }
        assert!(elapsed <= SCHEDULE.max_wait() + SCHEDULE.interval());
    }

    #[test]
    fn test_zero_max_wait_gives_up_immediately() {
        let schedule = PollSchedule::new(Duration::from_secs(2), Duration::ZERO);
        assert_eq!(schedule.decide(Duration::ZERO), PollDecision::GiveUp);
    }
}
