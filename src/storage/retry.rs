use crate::config::Config;
use crate::error::Result;
use log::warn;
use std::thread;
use std::time::Duration;

/// Retries transient store/transport failures with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(3, Duration::from_millis(50))
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, initial_backoff: Duration) -> RetryPolicy {
        RetryPolicy {
            attempts: attempts.max(1),
            initial_backoff,
        }
    }

    pub fn from_config(config: &Config) -> RetryPolicy {
        RetryPolicy::new(config.store_retry_attempts, config.retry_backoff())
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Non-transient errors are returned immediately; transient ones are
    /// retried until the attempts run out, then the last error is returned.
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut delay = self.initial_backoff;
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.attempts => {
                    warn!(
                        "{what} failed (attempt {attempt}/{}): {e}; retrying in {delay:?}",
                        self.attempts
                    );
                    thread::sleep(delay);
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
