//! One-shot result handles.
//!
//! Every submitted request gets a [`ResultHandle`] (kept by the caller) and a
//! [`Resolver`] (kept by the dispatcher). Both point at the same slot, which
//! accepts exactly one terminal outcome: the first `complete` wins and every
//! later one is a no-op. A `Resolver` dropped without resolving marks the slot
//! cancelled, so a handle can never be left pending forever.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;

pub type Outcome = Result<Value, ApiError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandleState {
    Pending,
    Resolved,
    Failed,
    /// Never got a response: shut down, rejected or cancelled by the caller.
    Cancelled,
}

impl HandleState {
    pub fn is_terminal(self) -> bool {
        self != HandleState::Pending
    }

    fn of(outcome: &Outcome) -> Self {
        match outcome {
            Ok(_) => HandleState::Resolved,
            Err(ApiError::Cancelled | ApiError::Rejected) => HandleState::Cancelled,
            Err(_) => HandleState::Failed,
        }
    }
}

struct Slot {
    outcome: Mutex<Option<Outcome>>,
    ready: Condvar,
    notify: Notify,
    cancel: CancellationToken,
}

impl Slot {
    fn lock(&self) -> MutexGuard<'_, Option<Outcome>> {
        self.outcome.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(&self, outcome: Outcome) -> bool {
        let mut slot = self.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(outcome);
        drop(slot);

        self.ready.notify_all();
        self.notify.notify_waiters();
        true
    }
}

/// Caller side of a submitted request.
pub struct ResultHandle {
    slot: Arc<Slot>,
}

/// Dispatcher side of a submitted request. Consumed by [`Resolver::resolve`].
pub struct Resolver {
    slot: Arc<Slot>,
}

/// Creates a pending handle and its resolver. `cancel` is the request's own
/// cancellation token; [`ResultHandle::cancel`] fires it.
pub fn pair(cancel: CancellationToken) -> (ResultHandle, Resolver) {
    let slot = Arc::new(Slot {
        outcome: Mutex::new(None),
        ready: Condvar::new(),
        notify: Notify::new(),
        cancel,
    });
    (
        ResultHandle { slot: slot.clone() },
        Resolver { slot },
    )
}

impl ResultHandle {
    /// A handle that is already terminal, for requests that never made it
    /// into the queue.
    pub fn completed(outcome: Outcome) -> Self {
        let (handle, resolver) = pair(CancellationToken::new());
        resolver.resolve(outcome);
        handle
    }

    pub fn state(&self) -> HandleState {
        self.slot
            .lock()
            .as_ref()
            .map_or(HandleState::Pending, HandleState::of)
    }

    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    /// Non-blocking: the outcome if there is one yet.
    pub fn poll(&self) -> Option<Outcome> {
        self.slot.lock().clone()
    }

    /// Blocks the current thread until the request is terminal.
    ///
    /// Must not be called from inside an async task; use `.await` or
    /// [`ResultHandle::resolved`] there.
    pub fn wait(&self) -> Outcome {
        let mut guard = self.slot.lock();
        loop {
            if let Some(outcome) = guard.as_ref() {
                return outcome.clone();
            }
            guard = self
                .slot
                .ready
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Blocking wait bounded by `timeout`. `None` if the request is still
    /// pending when the timeout elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Outcome> {
        let guard = self.slot.lock();
        let (guard, _) = self
            .slot
            .ready
            .wait_timeout_while(guard, timeout, |outcome| outcome.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }

    pub async fn resolved(&self) -> Outcome {
        loop {
            let notified = self.slot.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(outcome) = self.poll() {
                return outcome;
            }
            notified.await;
        }
    }

    /// Async wait bounded by `timeout`. `None` if still pending.
    pub async fn wait_for(&self, timeout: Duration) -> Option<Outcome> {
        tokio::time::timeout(timeout, self.resolved()).await.ok()
    }

    /// Gives up on the request. A request that has not been sent yet never
    /// reaches the network; one already in flight is abandoned. No-op if the
    /// handle is already terminal.
    pub fn cancel(&self) {
        self.slot.cancel.cancel();
        self.slot.complete(Err(ApiError::Cancelled));
    }
}

impl std::fmt::Debug for ResultHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultHandle")
            .field("state", &self.state())
            .finish()
    }
}

impl IntoFuture for ResultHandle {
    type Output = Outcome;
    type IntoFuture = Pin<Box<dyn Future<Output = Outcome> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.resolved().await })
    }
}

impl Resolver {
    /// Returns false if the handle was already terminal (e.g. cancelled by
    /// its owner), in which case `outcome` is discarded.
    pub fn resolve(self, outcome: Outcome) -> bool {
        self.slot.complete(outcome)
    }

    pub fn cancel(self) -> bool {
        self.resolve(Err(ApiError::Cancelled))
    }

    pub fn is_done(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        self.slot.complete(Err(ApiError::Cancelled));
    }
}
