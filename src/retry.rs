use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

use crate::range::CellRange;
use crate::store::{RangeUpdate, SheetStore, StoreError};

/// Delay between two attempts of the same store call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "delay_ms", rename_all = "lowercase")]
pub enum Backoff {
    None,
    Fixed(#[serde(with = "millis")] Duration),
    /// `delay * attempt`: 1x after the first failure, 2x after the second, ...
    Linear(#[serde(with = "millis")] Duration),
}

impl Backoff {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(d) => *d,
            Backoff::Linear(d) => d.saturating_mul(attempt),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            backoff: Backoff::Fixed(Duration::from_secs(2)),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Single attempt, no waiting.
    pub fn no_retry() -> Self {
        RetryPolicy::new(1, Backoff::None)
    }

    /// Run `f` until it succeeds, fails with a non-transient error, or the
    /// attempt budget is spent. The last error is returned as-is.
    pub fn run<T, F>(&self, op: &str, mut f: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Result<T, StoreError>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match f() {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", op, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.backoff.delay(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        op, attempt, max_attempts, e, delay
                    );
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!("{} failed after {} attempts: {}", op, attempt, e);
                    }
                    return Err(e);
                }
            }
        }
    }
}

/// A [`SheetStore`] that runs every call of the wrapped store under a [`RetryPolicy`].
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: SheetStore> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        RetryingStore { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: SheetStore> SheetStore for RetryingStore<S> {
    fn worksheet_titles(&self) -> Result<Vec<String>, StoreError> {
        self.policy.run("list worksheets", || self.inner.worksheet_titles())
    }

    fn add_worksheet(&mut self, title: &str, rows: u32, cols: u32) -> Result<(), StoreError> {
        let inner = &mut self.inner;
        self.policy
            .run("add worksheet", || inner.add_worksheet(title, rows, cols))
    }

    fn read_range(&self, title: &str, range: &CellRange) -> Result<Vec<Vec<String>>, StoreError> {
        self.policy
            .run("read range", || self.inner.read_range(title, range))
    }

    fn write_range(
        &mut self,
        title: &str,
        range: &CellRange,
        values: &[Vec<String>],
    ) -> Result<(), StoreError> {
        let inner = &mut self.inner;
        self.policy
            .run("write range", || inner.write_range(title, range, values))
    }

    fn clear_range(&mut self, title: &str, range: &CellRange) -> Result<(), StoreError> {
        let inner = &mut self.inner;
        self.policy
            .run("clear range", || inner.clear_range(title, range))
    }

    fn batch_update(&mut self, title: &str, updates: &[RangeUpdate]) -> Result<(), StoreError> {
        let inner = &mut self.inner;
        self.policy
            .run("batch update", || inner.batch_update(title, updates))
    }
}
