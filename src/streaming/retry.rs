// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Retry policy for broker connection attempts

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Decides how long to wait after a failed attempt, or whether to stop
pub trait RetryPolicy: Send {
    /// Delay before the next attempt; `None` gives up
    fn next_delay(&mut self) -> Option<Duration>;

    /// Forget previous failures
    fn reset(&mut self);
}

/// Same delay between every attempt. Unbounded unless a limit is set.
#[derive(Debug, Clone)]
pub struct FixedBackoff {
    delay: Duration,
    max_attempts: Option<u32>,
    failures: u32,
}

impl FixedBackoff {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
            failures: 0,
        }
    }

    /// Stop after `max` attempts in total
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = Some(max);
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

impl RetryPolicy for FixedBackoff {
    fn next_delay(&mut self) -> Option<Duration> {
        self.failures = self.failures.saturating_add(1);
        match self.max_attempts {
            Some(max) if self.failures >= max => None,
            _ => Some(self.delay),
        }
    }

    fn reset(&mut self) {
        self.failures = 0;
    }
}

/// Run `attempt` until it succeeds or `policy` gives up.
///
/// `attempt` receives the 1-based attempt number. The last error is returned
/// when the policy runs out.
pub async fn retry<P, F, Fut, T, E>(policy: &mut P, what: &str, mut attempt: F) -> Result<T, E>
where
    P: RetryPolicy + ?Sized,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    policy.reset();
    let mut n = 0u32;

    loop {
        n = n.saturating_add(1);
        let err = match attempt(n).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        match policy.next_delay() {
            Some(delay) => {
                warn!("{} failed (attempt {}): {}. Retrying in {:?}", what, n, err, delay);
                tokio::time::sleep(delay).await;
            }
            None => return Err(err),
        }
    }
}
