use std::time::Duration;

/// Delay after a successful attempt
pub const BASE_DELAY: Duration = Duration::from_secs(3);

/// Delay after a recoverable failure
pub const ERROR_DELAY: Duration = Duration::from_secs(10);

/// Error streak length beyond which delays start escalating
pub const MAX_CONSECUTIVE_ERRORS: u32 = 5;

pub const BACKOFF_MULTIPLIER: u32 = 2;

/// Hard cap on any computed delay. Keeps escalation bounded so a long error
/// streak can never stall the batch indefinitely.
pub const MAX_DELAY: Duration = Duration::from_secs(300);

/// Adaptive inter-attempt delay control.
///
/// Owned by exactly one batch run; never persisted. Tracks the current streak
/// of recoverable failures: a success resets it and drops back to the base
/// delay, and once the streak exceeds [`MAX_CONSECUTIVE_ERRORS`] each further
/// failure doubles the error delay, capped at [`MAX_DELAY`].
#[derive(Debug, Clone)]
pub struct RateController {
    base_delay: Duration,
    error_delay: Duration,
    max_consecutive_errors: u32,
    consecutive_errors: u32,
}

impl RateController {
    pub fn new(base_delay: Duration) -> Self {
        Self {
            base_delay,
            error_delay: ERROR_DELAY,
            max_consecutive_errors: MAX_CONSECUTIVE_ERRORS,
            consecutive_errors: 0,
        }
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn record_success(&mut self) {
        self.consecutive_errors = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
    }

    pub fn should_escalate(&self) -> bool {
        self.consecutive_errors > self.max_consecutive_errors
    }

    /// Delay before the next attempt after a success
    pub fn success_delay(&self) -> Duration {
        self.base_delay
    }

    /// Delay before the next attempt after a recoverable failure.
    ///
    /// Below the escalation threshold this is the flat [`ERROR_DELAY`]; once
    /// the streak exceeds [`MAX_CONSECUTIVE_ERRORS`] the delay doubles per
    /// excess failure, capped at [`MAX_DELAY`].
    pub fn failure_delay(&self) -> Duration {
        if !self.should_escalate() {
            return self.error_delay;
        }

        let excess = self.consecutive_errors - self.max_consecutive_errors;
        // Checked pow so a pathological streak saturates instead of
        // overflowing.
        let multiplier = BACKOFF_MULTIPLIER.checked_pow(excess).unwrap_or(u32::MAX);
        self.error_delay
            .checked_mul(multiplier)
            .unwrap_or(MAX_DELAY)
            .min(MAX_DELAY)
    }
}

impl Default for RateController {
    fn default() -> Self {
        Self::new(BASE_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_error_delay_below_threshold() {
        let mut rate = RateController::default();
        for _ in 0..MAX_CONSECUTIVE_ERRORS {
            rate.record_failure();
        }
        assert!(!rate.should_escalate());
        assert_eq!(rate.failure_delay(), ERROR_DELAY);
    }

    #[test]
    fn test_escalation_after_six_failures() {
        let mut rate = RateController::default();
        for _ in 0..6 {
            rate.record_failure();
        }
        assert!(rate.consecutive_errors() > MAX_CONSECUTIVE_ERRORS);
        assert!(rate.should_escalate());
        assert!(rate.failure_delay() > ERROR_DELAY);
        assert_eq!(rate.failure_delay(), ERROR_DELAY * 2);
    }

    #[test]
    fn test_escalated_delay_doubles_per_failure() {
        let mut rate = RateController::default();
        for _ in 0..7 {
            rate.record_failure();
        }
        assert_eq!(rate.failure_delay(), ERROR_DELAY * 4);
    }

    #[test]
    fn test_success_resets_streak_and_delay() {
        let mut rate = RateController::default();
        for _ in 0..6 {
            rate.record_failure();
        }
        rate.record_success();
        assert_eq!(rate.consecutive_errors(), 0);
        assert_eq!(rate.success_delay(), BASE_DELAY);
        assert_eq!(rate.failure_delay(), ERROR_DELAY);
    }

    #[test]
    fn test_delay_respects_max_cap() {
        let mut rate = RateController::default();
        for _ in 0..200 {
            rate.record_failure();
        }
        assert_eq!(rate.failure_delay(), MAX_DELAY);
    }

    #[test]
    fn test_base_delay_override() {
        let rate = RateController::new(Duration::from_secs(1));
        assert_eq!(rate.success_delay(), Duration::from_secs(1));
    }
}
