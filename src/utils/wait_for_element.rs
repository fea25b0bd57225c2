//! Element polling utility for SPA support
//!
//! Single Page Applications render elements via JavaScript after the load
//! event fires, so lookups poll with exponential backoff until a deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Exponential backoff schedule for DOM polling
///
/// - Starts at 100ms intervals
/// - Doubles each retry
/// - Caps at 1 second
#[derive(Debug, Clone, Copy)]
struct Backoff {
    current: Duration,
    max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            current: Duration::from_millis(100),
            max: Duration::from_secs(1),
        }
    }
}

impl Backoff {
    /// Returns the interval to sleep now and advances the schedule
    pub fn next_interval(&mut self) -> Duration {
        let interval = self.current;
        self.current = (self.current * 2).min(self.max);
        interval
    }
}

/// Poll `lookup` until it yields `Some` or `timeout` elapses
///
/// The lookup always runs at least once, so a zero timeout still gets one
/// lookup. Returns `None` when the deadline passes without a hit.
pub async fn poll_until<T, F, Fut>(timeout: Duration, mut lookup: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let start = Instant::now();
    let mut backoff = Backoff::default();

    loop {
        if let Some(found) = lookup().await {
            return Some(found);
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return None;
        }

        let remaining = timeout - elapsed;
        tokio::time::sleep(backoff.next_interval().min(remaining)).await;
    }
}
