//! Polling an element query until it resolves
//!
//! The matcher is called directly on whatever context the body is running
//! on; only the waits between attempts are bounced to the driver.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::sleep;
use crate::config::{secs_to_duration, PollSettings};
use crate::error::Error;

pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(33);

/// Resolves a query against a root element.
///
/// Implemented for any `Fn(&R, &str) -> Vec<Item>`.
pub trait Matcher<R: ?Sized> {
    type Item;

    fn matches(&self, root: &R, query: &str) -> Vec<Self::Item>;
}

impl<R, I, F> Matcher<R> for F
where
    R: ?Sized,
    F: Fn(&R, &str) -> Vec<I>,
{
    type Item = I;

    fn matches(&self, root: &R, query: &str) -> Vec<I> {
        self(root, query)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollOptions {
    pub timeout: Duration,
    pub interval: Duration,
    /// Fail with [`Error::NotFound`] instead of returning nothing.
    pub strict: bool,
}

impl PollOptions {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        PollOptions {
            timeout: DEFAULT_POLL_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
            strict: false,
        }
    }
}

impl TryFrom<&PollSettings> for PollOptions {
    type Error = anyhow::Error;

    fn try_from(settings: &PollSettings) -> anyhow::Result<Self> {
        Ok(PollOptions {
            timeout: secs_to_duration("poll.timeout_secs", settings.timeout_secs)?,
            interval: secs_to_duration("poll.interval_secs", settings.interval_secs)?,
            strict: settings.strict,
        })
    }
}

/// Query `root` until something matches or `options.timeout` passes.
///
/// Must run inside a task body: the waits go through [`sleep`].
pub fn poll_query<R, M>(
    root: &R,
    query: &str,
    matcher: &M,
    options: &PollOptions,
) -> anyhow::Result<Vec<M::Item>>
where
    R: ?Sized,
    M: Matcher<R> + ?Sized,
{
    let started = Instant::now();
    let mut attempts = 0usize;

    loop {
        attempts += 1;
        let found = matcher.matches(root, query);
        if !found.is_empty() {
            tracing::debug!(query, attempts, matches = found.len(), "query resolved");
            return Ok(found);
        }
        if started.elapsed() >= options.timeout {
            break;
        }
        sleep(options.interval)?;
    }

    tracing::debug!(query, attempts, strict = options.strict, "query timed out");
    if options.strict {
        return Err(Error::NotFound {
            query: query.to_string(),
        }
        .into());
    }
    Ok(Vec::new())
}

#[cfg(test)]
#[path = "poll_tests.rs"]
mod tests;
