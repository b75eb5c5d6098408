//! Bounded polling against a deadline.
//!
//! One primitive backs every wait in the acquisition flow: navigation
//! settling, element resolution, and the human-paced MFA step. The probe
//! runs on a fixed tick until it yields a value or the deadline passes, so
//! a hung third-party page degrades to a typed timeout instead of a hang.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::Result;

/// Deadline and tick interval for [`poll_until`].
#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub interval: Duration,
}

impl WaitOptions {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

/// Polls `probe` until it returns a value, fails, or the deadline elapses.
///
/// The probe always runs at least once. `Ok(None)` signals the deadline;
/// callers map that to their own timeout error kind. Probe errors abort
/// the wait immediately.
pub async fn poll_until<T, F, Fut>(options: WaitOptions, mut probe: F) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + options.timeout;
    loop {
        if let Some(value) = probe().await? {
            return Ok(Some(value));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(options.interval.min(deadline - now)).await;
    }
}
