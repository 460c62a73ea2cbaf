#![forbid(unsafe_code)]

//! Polling schedule for element lookup.

use std::time::Duration;

use sprig_runtime::LookupError;

/// Delay between `querySelector` attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// When to retry a lookup and when to give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPlan {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPlan {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Delay before the next attempt, or `None` once the deadline passed.
    ///
    /// The last delay is shortened so the final attempt lands on the
    /// deadline rather than past it.
    #[must_use]
    pub fn next_delay(&self, elapsed: Duration) -> Option<Duration> {
        let remaining = self.timeout.checked_sub(elapsed)?;
        if remaining.is_zero() {
            return None;
        }
        Some(self.interval.min(remaining))
    }

    /// Error reported when the deadline passes without a match.
    #[must_use]
    pub fn not_found(&self, selector: &str) -> LookupError {
        LookupError::NotFound {
            selector: selector.to_owned(),
            timeout: self.timeout,
        }
    }
}

/// Reject selectors no document could match.
pub fn check_selector(selector: &str) -> Result<(), LookupError> {
    if selector.trim().is_empty() {
        return Err(LookupError::InvalidSelector(selector.to_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn polls_every_interval_until_deadline() {
        let plan = PollPlan::new(ms(120));
        assert_eq!(plan.next_delay(ms(0)), Some(ms(50)));
        assert_eq!(plan.next_delay(ms(50)), Some(ms(50)));
        assert_eq!(plan.next_delay(ms(100)), Some(ms(20)));
        assert_eq!(plan.next_delay(ms(120)), None);
        assert_eq!(plan.next_delay(ms(500)), None);
    }

    #[test]
    fn zero_timeout_never_waits() {
        assert_eq!(PollPlan::new(Duration::ZERO).next_delay(Duration::ZERO), None);
    }

    #[test]
    fn interval_has_a_floor() {
        let plan = PollPlan::new(ms(10)).with_interval(Duration::ZERO);
        assert_eq!(plan.next_delay(ms(0)), Some(ms(1)));
    }

    #[test]
    fn not_found_carries_timeout() {
        assert_eq!(
            PollPlan::new(ms(5000)).not_found("#app"),
            LookupError::NotFound {
                selector: "#app".into(),
                timeout: ms(5000),
            }
        );
    }

    #[test]
    fn blank_selectors_are_rejected() {
        assert!(check_selector("  ").is_err());
        assert!(check_selector("#app").is_ok());
    }
}
