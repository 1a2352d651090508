//! Bounded retry with a fixed delay

use std::time::Duration;

/// Blocking delay between attempts
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Maximum attempts and the fixed delay between consecutive attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(3))
    }
}

impl RetryPolicy {
    /// `max_attempts` below 1 is clamped to a single attempt
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `op` until `retryable` rejects its outcome or attempts run out
    ///
    /// `op` receives the 1-based attempt number. Returns the last outcome.
    pub fn run<T, F, P>(&self, sleeper: &dyn Sleeper, mut op: F, retryable: P) -> T
    where
        F: FnMut(u32) -> T,
        P: Fn(&T) -> bool,
    {
        let mut attempt = 1;
        loop {
            let outcome = op(attempt);
            if attempt >= self.max_attempts || !retryable(&outcome) {
                return outcome;
            }
            sleeper.sleep(self.delay);
            attempt += 1;
        }
    }
}
