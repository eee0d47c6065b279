//! Circuit breaker for the completion API

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    /// Reset timeout elapsed; the next call is a trial call
    HalfOpen,
}

#[derive(Debug, Clone)]
struct BreakerEntry {
    state: BreakerState,
    failure_count: usize,
    last_failure: Option<Instant>,
    opened_at: Option<Instant>,
}

impl Default for BreakerEntry {
    fn default() -> Self {
        Self {
            state: BreakerState::Closed,
            failure_count: 0,
            last_failure: None,
            opened_at: None,
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: usize,
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Per-operation circuit breaker
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    breakers: Mutex<HashMap<String, BreakerEntry>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            config,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, BreakerEntry>> {
        self.breakers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether calls for `operation` should be rejected. An open breaker whose
    /// reset timeout has elapsed moves to half-open and lets the call through.
    pub fn is_open(&self, operation: &str) -> bool {
        let mut breakers = self.entries();
        let entry = breakers.entry(operation.to_string()).or_default();

        match entry.state {
            BreakerState::Closed | BreakerState::HalfOpen => false,
            BreakerState::Open => match entry.opened_at {
                Some(opened_at) if opened_at.elapsed() >= self.config.reset_timeout => {
                    entry.state = BreakerState::HalfOpen;
                    false
                }
                _ => true,
            },
        }
    }

    pub fn mark_success(&self, operation: &str) {
        let mut breakers = self.entries();
        breakers.insert(operation.to_string(), BreakerEntry::default());
    }

    /// Record a failure. A failed half-open trial call reopens immediately.
    pub fn mark_failure(&self, operation: &str) {
        let mut breakers = self.entries();
        let entry = breakers.entry(operation.to_string()).or_default();

        let now = Instant::now();
        entry.failure_count += 1;
        entry.last_failure = Some(now);

        if entry.state == BreakerState::HalfOpen
            || entry.failure_count >= self.config.failure_threshold
        {
            entry.state = BreakerState::Open;
            entry.opened_at = Some(now);
        }
    }

    pub fn state(&self, operation: &str) -> BreakerState {
        self.entries()
            .get(operation)
            .map(|e| e.state)
            .unwrap_or(BreakerState::Closed)
    }

    pub fn stats(&self, operation: &str) -> BreakerStats {
        match self.entries().get(operation) {
            Some(entry) => BreakerStats {
                state: entry.state,
                failure_count: entry.failure_count,
                last_failure: entry.last_failure,
            },
            None => BreakerStats {
                state: BreakerState::Closed,
                failure_count: 0,
                last_failure: None,
            },
        }
    }

    pub fn reset(&self, operation: &str) {
        self.entries().remove(operation);
    }
}

/// Circuit breaker statistics
#[derive(Debug, Clone)]
pub struct BreakerStats {
    pub state: BreakerState,
    pub failure_count: usize,
    pub last_failure: Option<Instant>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: usize, reset: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            reset_timeout: reset,
        })
    }

    #[test]
    fn test_closed_by_default() {
        let breaker = CircuitBreaker::default();
        assert!(!breaker.is_open("complete"));
        assert_eq!(breaker.state("complete"), BreakerState::Closed);
    }

    #[test]
    fn test_opens_after_threshold() {
        let breaker = breaker(3, Duration::from_secs(30));

        breaker.mark_failure("complete");
        breaker.mark_failure("complete");
        assert!(!breaker.is_open("complete"));

        breaker.mark_failure("complete");
        assert!(breaker.is_open("complete"));
        assert_eq!(breaker.state("complete"), BreakerState::Open);
    }

    #[test]
    fn test_success_resets() {
        let breaker = breaker(3, Duration::from_secs(30));
        breaker.mark_failure("complete");
        breaker.mark_failure("complete");
        breaker.mark_success("complete");

        let stats = breaker.stats("complete");
        assert_eq!(stats.state, BreakerState::Closed);
        assert_eq!(stats.failure_count, 0);
    }

    #[test]
    fn test_half_open_trial_failure_reopens() {
        let breaker = breaker(2, Duration::from_millis(50));
        breaker.mark_failure("complete");
        breaker.mark_failure("complete");
        assert!(breaker.is_open("complete"));

        std::thread::sleep(Duration::from_millis(80));
        assert!(!breaker.is_open("complete"));
        assert_eq!(breaker.state("complete"), BreakerState::HalfOpen);

        breaker.mark_failure("complete");
        assert!(breaker.is_open("complete"));
    }

    #[test]
    fn test_operations_are_independent() {
        let breaker = breaker(1, Duration::from_secs(30));
        breaker.mark_failure("complete");
        assert!(breaker.is_open("complete"));
        assert!(!breaker.is_open("other"));

        breaker.reset("complete");
        assert!(!breaker.is_open("complete"));
    }
}
