//! Bounded polling.
//!
//! A [`WaitPolicy`] is a (timeout, poll interval) pair; the success predicate is
//! supplied per call to [`WaitPolicy::until`]. Three named policies cover every
//! interaction: `short` for optimistic probes, `default` for ordinary element
//! waits and `long` for confirmations that follow a network round trip.

use crate::config::WaitConfig;
use crate::{Error, Result};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Timeout plus poll interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    name: &'static str,
    timeout: Duration,
    poll_interval: Duration,
}

impl WaitPolicy {
    pub const fn new(name: &'static str, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            name,
            timeout,
            poll_interval,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Poll `check` until it yields `Some`, or fail with
    /// [`Error::ElementWaitTimeout`] once the deadline passes.
    ///
    /// `check` runs at least once. Errors from `check` are not swallowed; "not
    /// there yet" must be reported as `Ok(None)`. The wait cannot be cancelled
    /// before its deadline other than by dropping the future.
    pub async fn until<T, F, Fut>(&self, what: &dyn fmt::Display, mut check: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut polls = 0u32;
        loop {
            polls += 1;
            if let Some(value) = check().await? {
                debug!("{} wait for {} satisfied after {} poll(s)", self.name, what, polls);
                return Ok(value);
            }
            let now = Instant::now();
            if now >= deadline {
                debug!("{} wait for {} expired after {} poll(s)", self.name, what, polls);
                return Err(Error::ElementWaitTimeout {
                    locator: what.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

impl fmt::Display for WaitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}ms, every {}ms)",
            self.name,
            self.timeout.as_millis(),
            self.poll_interval.as_millis()
        )
    }
}

/// The three named policies.
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicies {
    pub short: WaitPolicy,
    pub default: WaitPolicy,
    pub long: WaitPolicy,
}

impl WaitPolicies {
    pub fn from_config(config: &WaitConfig) -> Self {
        let poll = Duration::from_millis(config.poll_ms);
        Self {
            short: WaitPolicy::new("short", Duration::from_millis(config.short_ms), poll),
            default: WaitPolicy::new("default", Duration::from_millis(config.default_ms), poll),
            long: WaitPolicy::new("long", Duration::from_millis(config.long_ms), poll),
        }
    }
}

impl Default for WaitPolicies {
    fn default() -> Self {
        Self::from_config(&WaitConfig::default())
    }
}
