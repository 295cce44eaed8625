//! Poll-until synchronization with live page state.
//!
//! UI state changes (modal open, counter increment, list populated) are
//! asynchronous relative to the script driving them. Every wait in the suite
//! goes through [`Poller`] so that timeout policy lives in one place instead
//! of ad hoc sleeps scattered through the page objects.

use std::thread;
use std::time::{Duration, Instant};

use crate::error::{CheckError, CheckResult};

/// Default deadline for a single wait-bound operation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default gap between probe evaluations.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(250);

/// Repeatedly evaluates a probe against live browser state until it produces
/// a value or a deadline elapses.
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    timeout: Duration,
    interval: Duration,
}

impl Default for Poller {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl Poller {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Evaluate `probe` until it yields a value.
    ///
    /// `Ok(Some(v))` resolves the wait. `Ok(None)` means "not yet ready" and
    /// schedules another round after the poll interval. Any `Err` from the
    /// probe propagates immediately; the poller never retries through an
    /// unexpected driver failure. Reaching the deadline without a value fails
    /// with [`CheckError::TimeoutExceeded`] carrying `expectation`.
    pub fn poll_until<T>(
        &self,
        expectation: &str,
        mut probe: impl FnMut() -> CheckResult<Option<T>>,
    ) -> CheckResult<T> {
        let start = Instant::now();
        loop {
            if let Some(value) = probe()? {
                return Ok(value);
            }
            if start.elapsed() >= self.timeout {
                return Err(CheckError::TimeoutExceeded {
                    expectation: expectation.to_string(),
                    timeout: self.timeout,
                });
            }
            thread::sleep(self.interval);
        }
    }

    /// Boolean convenience over [`Poller::poll_until`].
    pub fn poll_for(
        &self,
        expectation: &str,
        mut pred: impl FnMut() -> CheckResult<bool>,
    ) -> CheckResult<()> {
        self.poll_until(expectation, || Ok(if pred()? { Some(()) } else { None }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_value_once_probe_succeeds() {
        let poller = Poller::new(Duration::from_secs(2), Duration::from_millis(5));
        let mut rounds = 0;
        let got = poller
            .poll_until("counter to reach three", || {
                rounds += 1;
                Ok(if rounds >= 3 { Some(rounds) } else { None })
            })
            .unwrap();
        assert_eq!(got, 3);
    }

    #[test]
    fn succeeds_before_the_deadline_when_condition_flips() {
        let poller = Poller::new(Duration::from_millis(500), Duration::from_millis(5));
        let start = Instant::now();
        let mut rounds = 0;
        poller
            .poll_for("predicate to flip", || {
                rounds += 1;
                Ok(rounds > 4)
            })
            .unwrap();
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn times_out_at_approximately_the_deadline() {
        let timeout = Duration::from_millis(80);
        let poller = Poller::new(timeout, Duration::from_millis(5));
        let start = Instant::now();
        let err = poller.poll_for("a thing that never happens", || Ok(false));
        let elapsed = start.elapsed();

        match err {
            Err(CheckError::TimeoutExceeded {
                expectation,
                timeout: t,
            }) => {
                assert_eq!(expectation, "a thing that never happens");
                assert_eq!(t, timeout);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_millis(100));
    }

    #[test]
    fn probe_errors_propagate_immediately() {
        let poller = Poller::new(Duration::from_secs(5), Duration::from_millis(5));
        let start = Instant::now();
        let err = poller.poll_until("never reached", || -> CheckResult<Option<()>> {
            Err(CheckError::Driver(anyhow::anyhow!("websocket closed")))
        });
        assert!(matches!(err, Err(CheckError::Driver(_))));
        // Fail-fast, not retried until the deadline.
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn zero_round_success_needs_no_sleep() {
        let poller = Poller::default();
        let got = poller.poll_until("immediate", || Ok(Some(42))).unwrap();
        assert_eq!(got, 42);
    }
}
