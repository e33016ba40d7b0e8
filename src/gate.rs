//! Rolling-window admission control for the dispatch loop.
//!
//! The gate counts sends, not admissions. The loop takes an [`Admission`] for
//! each request it lets through; the admission holds one unit of budget until
//! the worker [stamps](Admission::stamp) it right before the call goes out, or
//! drops it unsent. The window is measured from the stamps, so no window of
//! length `per` ever holds more than `requests` sends, however late a worker
//! gets scheduled and including right after an idle period.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimit {
    pub requests: u32,
    pub per: Duration,
}

impl RateLimit {
    /// `requests` is clamped to at least one.
    pub fn new(requests: u32, per: Duration) -> Self {
        Self {
            requests: requests.max(1),
            per,
        }
    }

    pub fn per_second(requests: u32) -> Self {
        Self::new(requests, Duration::from_secs(1))
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::per_second(2)
    }
}

#[derive(Debug)]
struct Window {
    sent: VecDeque<Instant>,
    /// Admitted but not sent yet.
    reserved: usize,
}

#[derive(Debug)]
struct Shared {
    limit: RateLimit,
    window: Mutex<Window>,
    changed: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Window> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone, Debug)]
pub struct RateGate {
    shared: Arc<Shared>,
}

impl RateGate {
    pub fn new(limit: RateLimit) -> Self {
        let window = Window {
            sent: VecDeque::with_capacity((limit.requests as usize).min(1024)),
            reserved: 0,
        };
        Self {
            shared: Arc::new(Shared {
                limit,
                window: Mutex::new(window),
                changed: Notify::new(),
            }),
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.shared.limit
    }

    /// Reserves budget at `now`. Otherwise tells when to try again: `Some` is
    /// the instant the oldest send leaves the window, `None` means the budget
    /// is held by admissions that have not been sent yet.
    pub fn try_admit(&self, now: Instant) -> Result<Admission, Option<Instant>> {
        let limit = self.shared.limit;
        let mut window = self.shared.lock();
        while let Some(&oldest) = window.sent.front() {
            if oldest + limit.per <= now {
                window.sent.pop_front();
            } else {
                break;
            }
        }

        let budget = limit.requests as usize;
        if window.sent.len() >= budget {
            return Err(window.sent.front().map(|&oldest| oldest + limit.per));
        }
        if window.sent.len() + window.reserved >= budget {
            return Err(None);
        }

        window.reserved += 1;
        Ok(Admission {
            shared: Some(self.shared.clone()),
        })
    }

    /// Suspends until budget is available. Returns `None` without consuming
    /// any if `shutdown` fires first.
    pub async fn admit(&self, shutdown: &CancellationToken) -> Option<Admission> {
        loop {
            if shutdown.is_cancelled() {
                return None;
            }
            // registered before the check so a stamp or release in between
            // still wakes us
            let changed = self.shared.changed.notified();
            let retry_at = match self.try_admit(Instant::now()) {
                Ok(admission) => return Some(admission),
                Err(at) => at,
            };

            let deadline = retry_at.unwrap_or_else(|| Instant::now() + self.shared.limit.per);
            tracing::trace!(
                wait_ms = deadline.saturating_duration_since(Instant::now()).as_millis() as u64,
                unsent = retry_at.is_none(),
                "rate gate closed, waiting"
            );
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return None,
                _ = changed => {}
                _ = sleep_until(deadline) => {}
            }
        }
    }
}

/// One unit of send budget, held from admission until the request goes out.
/// Dropping it unsent gives the budget back.
#[derive(Debug)]
#[must_use]
pub struct Admission {
    shared: Option<Arc<Shared>>,
}

impl Admission {
    /// Records the send at the current instant. Call right before the
    /// request is handed to the transport.
    pub fn stamp(mut self) {
        if let Some(shared) = self.shared.take() {
            let now = Instant::now();
            let mut window = shared.lock();
            window.reserved = window.reserved.saturating_sub(1);
            let at = window.sent.back().map_or(now, |&last| last.max(now));
            window.sent.push_back(at);
            drop(window);
            shared.changed.notify_waiters();
        }
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            let mut window = shared.lock();
            window.reserved = window.reserved.saturating_sub(1);
            drop(window);
            shared.changed.notify_waiters();
        }
    }
}
