//! Poll configuration.

use std::time::Duration;

use crate::error::{JobError, Result};

/// Longest duration any poll setting may take.
pub const MAX_POLL_DURATION: Duration = Duration::from_secs(86_400 * 365);

/// Timing and retry policy for one polling session.
///
/// There is no `Default`: every caller states its own policy.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Wall-clock ceiling for the whole session, initiation excluded.
    pub max_total_time: Duration,
    /// Delay before the first re-poll.
    pub min_poll_interval: Duration,
    /// Ceiling any delay may grow to.
    pub max_poll_interval: Duration,
    /// Transient status-request failures tolerated before giving up.
    pub max_retries: u32,
    /// Factor applied to the interval after each non-terminal poll or retry.
    pub backoff_multiplier: f64,
    /// Share of `max_total_time` after which polling stops escalating and
    /// holds at `max_poll_interval`.
    pub slow_phase_fraction: f64,
}

impl PollConfig {
    /// Reject configs the polling loop cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_total_time.is_zero() {
            return Err(JobError::InvalidConfig(
                "max_total_time must be greater than zero".into(),
            ));
        }
        if self.min_poll_interval.is_zero() {
            return Err(JobError::InvalidConfig(
                "min_poll_interval must be greater than zero".into(),
            ));
        }
        for (name, value) in [
            ("max_total_time", self.max_total_time),
            ("max_poll_interval", self.max_poll_interval),
        ] {
            if value > MAX_POLL_DURATION {
                return Err(JobError::InvalidConfig(format!(
                    "{} ({:?}) exceeds the {:?} ceiling",
                    name, value, MAX_POLL_DURATION
                )));
            }
        }
        if self.min_poll_interval > self.max_poll_interval {
            return Err(JobError::InvalidConfig(format!(
                "min_poll_interval ({:?}) exceeds max_poll_interval ({:?})",
                self.min_poll_interval, self.max_poll_interval
            )));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(JobError::InvalidConfig(format!(
                "backoff_multiplier must be a finite value >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.slow_phase_fraction) {
            return Err(JobError::InvalidConfig(format!(
                "slow_phase_fraction must be within [0, 1], got {}",
                self.slow_phase_fraction
            )));
        }
        Ok(())
    }

    /// Elapsed time after which the interval is pinned to `max_poll_interval`.
    pub fn slow_phase_after(&self) -> Duration {
        Duration::try_from_secs_f64(self.max_total_time.as_secs_f64() * self.slow_phase_fraction)
            .unwrap_or(self.max_total_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PollConfig {
        PollConfig {
            max_total_time: Duration::from_secs(10),
            min_poll_interval: Duration::from_secs(1),
            max_poll_interval: Duration::from_secs(5),
            max_retries: 3,
            backoff_multiplier: 1.5,
            slow_phase_fraction: 0.75,
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_fixed_interval_is_valid() {
        let cfg = PollConfig {
            min_poll_interval: Duration::from_secs(3),
            max_poll_interval: Duration::from_secs(3),
            backoff_multiplier: 1.0,
            ..config()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_intervals() {
        let cfg = PollConfig {
            min_poll_interval: Duration::from_secs(6),
            ..config()
        };
        assert!(matches!(cfg.validate(), Err(JobError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_shrinking_multiplier() {
        let cfg = PollConfig {
            backoff_multiplier: 0.5,
            ..config()
        };
        assert!(matches!(cfg.validate(), Err(JobError::InvalidConfig(_))));

        let cfg = PollConfig {
            backoff_multiplier: f64::NAN,
            ..config()
        };
        assert!(matches!(cfg.validate(), Err(JobError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_zero_durations() {
        let cfg = PollConfig {
            max_total_time: Duration::ZERO,
            ..config()
        };
        assert!(cfg.validate().is_err());

        let cfg = PollConfig {
            min_poll_interval: Duration::ZERO,
            ..config()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_slow_phase() {
        let cfg = PollConfig {
            slow_phase_fraction: 1.5,
            ..config()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_durations_past_ceiling() {
        let cfg = PollConfig {
            max_total_time: Duration::from_millis(u64::MAX),
            ..config()
        };
        assert!(matches!(cfg.validate(), Err(JobError::InvalidConfig(_))));

        let cfg = PollConfig {
            min_poll_interval: Duration::from_millis(u64::MAX),
            max_poll_interval: Duration::from_millis(u64::MAX),
            ..config()
        };
        assert!(matches!(cfg.validate(), Err(JobError::InvalidConfig(_))));

        let cfg = PollConfig {
            max_total_time: MAX_POLL_DURATION,
            max_poll_interval: MAX_POLL_DURATION,
            ..config()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_slow_phase_after_does_not_panic_on_huge_values() {
        let cfg = PollConfig {
            max_total_time: Duration::MAX,
            slow_phase_fraction: 1.0,
            ..config()
        };
        assert!(cfg.slow_phase_after() <= Duration::MAX);
    }

    #[test]
    fn test_slow_phase_after() {
        assert_eq!(config().slow_phase_after(), Duration::from_millis(7500));
    }
}
