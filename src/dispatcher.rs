//! Request queue, dispatch loop and lifecycle.
//!
//! Callers [`submit`](Dispatcher::submit) from any thread or task. Entries go
//! into an unbounded channel read by a single dispatch loop task, which owns
//! the [`RateGate`] and is therefore the only thing that decides queue order.
//! Admitted requests run on tracked tasks, at most `max_in_flight` at a time,
//! and each one stamps its admission right before it is sent.
//!
//! ```text
//! submit ──► mpsc ──► dispatch loop ──► gate ──► worker slot ──► Executor
//!   │                                                                │
//!   └──────────── ResultHandle ◄──────── Resolver ◄──────────────────┘
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::ApiError;
use crate::executor::Executor;
use crate::gate::{RateGate, RateLimit};
use crate::handle::{self, ResultHandle, Resolver};
use crate::request::Request;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Running,
    ShuttingDown,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    pub rate_limit: RateLimit,
    /// Upper bound on concurrent network calls.
    pub max_in_flight: usize,
    /// Backlog size past which `submit` answers `Overloaded`. `None` means
    /// unbounded.
    pub queue_capacity: Option<usize>,
    /// How long `shutdown` lets in-flight calls finish before abandoning them.
    pub drain_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimit::default(),
            max_in_flight: 4,
            queue_capacity: None,
            drain_timeout: Duration::from_secs(30),
        }
    }
}

struct Entry {
    request: Request,
    resolver: Resolver,
}

struct Control {
    /// `Some` while the dispatcher admits work.
    queue: Option<mpsc::UnboundedSender<Entry>>,
    dispatch_loop: Option<JoinHandle<()>>,
}

pub struct Dispatcher {
    control: Mutex<Control>,
    state: Arc<watch::Sender<Lifecycle>>,
    depth: Arc<AtomicUsize>,
    config: DispatchConfig,
    shutdown: CancellationToken,
    abort: CancellationToken,
    in_flight: TaskTracker,
}

impl Dispatcher {
    /// Starts the dispatch loop. Must be called from within a Tokio runtime.
    pub fn new(executor: Executor, config: DispatchConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();
        let abort = CancellationToken::new();
        let in_flight = TaskTracker::new();

        let dispatch_loop = tokio::spawn(dispatch_loop(DispatchLoop {
            rx,
            executor,
            gate: RateGate::new(config.rate_limit),
            workers: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
            depth: depth.clone(),
            shutdown: shutdown.clone(),
            abort: abort.clone(),
            in_flight: in_flight.clone(),
        }));

        let (state, _) = watch::channel(Lifecycle::Running);
        Self {
            control: Mutex::new(Control {
                queue: Some(tx),
                dispatch_loop: Some(dispatch_loop),
            }),
            state: Arc::new(state),
            depth,
            config,
            shutdown,
            abort,
            in_flight,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> Lifecycle {
        *self.state.borrow()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Entries waiting for the dispatch loop.
    pub fn queued(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// Queues `request` and returns its pending handle.
    ///
    /// Fails with `Rejected` once shutdown has begun and with `Overloaded` if
    /// a queue capacity is configured and reached.
    pub fn submit(&self, request: Request) -> Result<ResultHandle, ApiError> {
        let control = self.lock();
        let Some(queue) = control.queue.as_ref() else {
            tracing::debug!(%request, "rejecting request, dispatcher is shut down");
            return Err(ApiError::Rejected);
        };

        if let Some(capacity) = self.config.queue_capacity {
            if self.depth.load(Ordering::Acquire) >= capacity {
                tracing::warn!(%request, capacity, "dispatch queue full");
                return Err(ApiError::Overloaded);
            }
        }

        let label = request.to_string();
        let (handle, resolver) = handle::pair(request.cancellation().clone());
        self.depth.fetch_add(1, Ordering::AcqRel);
        if queue.send(Entry { request, resolver }).is_err() {
            // loop task is gone with its runtime; the dropped resolver has
            // already cancelled the handle
            self.depth.fetch_sub(1, Ordering::AcqRel);
            return Err(ApiError::Rejected);
        }

        tracing::debug!(request = %label, "request queued");
        Ok(handle)
    }

    /// Like [`Dispatcher::submit`], but a refused request comes back as a
    /// handle that is already terminal instead of an error.
    pub fn submit_handle(&self, request: Request) -> ResultHandle {
        self.submit(request)
            .unwrap_or_else(|e| ResultHandle::completed(Err(e)))
    }

    /// Stops admitting work, cancels everything still queued, lets in-flight
    /// calls finish (up to `drain_timeout`) and moves to `Stopped`.
    ///
    /// Idempotent, and every call returns once the dispatcher is `Stopped`.
    /// The teardown runs on its own task, so dropping this future early does
    /// not stall it.
    pub async fn shutdown(&self) {
        let mut state = self.state.subscribe();
        self.begin_shutdown();
        let _ = state.wait_for(|s| *s == Lifecycle::Stopped).await;
    }

    fn begin_shutdown(&self) {
        let mut control = self.lock();
        let Some(queue) = control.queue.take() else {
            return;
        };
        drop(queue);

        self.state.send_replace(Lifecycle::ShuttingDown);
        tracing::info!(queued = self.queued(), "dispatcher shutting down");
        self.shutdown.cancel();

        tokio::spawn(teardown(Teardown {
            dispatch_loop: control.dispatch_loop.take(),
            in_flight: self.in_flight.clone(),
            abort: self.abort.clone(),
            drain_timeout: self.config.drain_timeout,
            state: self.state.clone(),
        }));
    }
}

struct Teardown {
    dispatch_loop: Option<JoinHandle<()>>,
    in_flight: TaskTracker,
    abort: CancellationToken,
    drain_timeout: Duration,
    state: Arc<watch::Sender<Lifecycle>>,
}

async fn teardown(teardown: Teardown) {
    if let Some(dispatch_loop) = teardown.dispatch_loop {
        if let Err(e) = dispatch_loop.await {
            tracing::error!("dispatch loop ended abnormally: {e}");
        }
    }

    teardown.in_flight.close();
    let in_flight = teardown.in_flight.len();
    if tokio::time::timeout(teardown.drain_timeout, teardown.in_flight.wait())
        .await
        .is_err()
    {
        tracing::warn!(
            in_flight = teardown.in_flight.len(),
            "in-flight requests did not finish in time, cancelling"
        );
        teardown.abort.cancel();
        teardown.in_flight.wait().await;
    } else if in_flight > 0 {
        tracing::debug!(in_flight, "in-flight requests drained");
    }

    teardown.state.send_replace(Lifecycle::Stopped);
    tracing::info!("dispatcher stopped");
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // the loop drains whatever is queued as cancelled on its way out
        self.shutdown.cancel();
    }
}

struct DispatchLoop {
    rx: mpsc::UnboundedReceiver<Entry>,
    executor: Executor,
    gate: RateGate,
    workers: Arc<Semaphore>,
    depth: Arc<AtomicUsize>,
    shutdown: CancellationToken,
    abort: CancellationToken,
    in_flight: TaskTracker,
}

async fn dispatch_loop(mut state: DispatchLoop) {
    tracing::debug!(
        requests = state.gate.limit().requests,
        per_ms = state.gate.limit().per.as_millis() as u64,
        "dispatch loop started"
    );

    loop {
        let entry = tokio::select! {
            biased;
            _ = state.shutdown.cancelled() => break,
            entry = state.rx.recv() => match entry {
                Some(entry) => entry,
                None => break,
            },
        };
        state.depth.fetch_sub(1, Ordering::AcqRel);

        if entry.resolver.is_done() || entry.request.is_cancelled() {
            tracing::debug!(request = %entry.request, "skipping cancelled request");
            entry.resolver.cancel();
            continue;
        }

        let permit = tokio::select! {
            biased;
            _ = state.shutdown.cancelled() => {
                entry.resolver.cancel();
                break;
            }
            permit = state.workers.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    entry.resolver.cancel();
                    break;
                }
            },
        };

        let Some(admission) = state.gate.admit(&state.shutdown).await else {
            entry.resolver.cancel();
            break;
        };
        if entry.resolver.is_done() || entry.request.is_cancelled() {
            entry.resolver.cancel();
            continue;
        }

        tracing::debug!(request = %entry.request, "dispatching request");
        let executor = state.executor.clone();
        let abort = state.abort.clone();
        state.in_flight.spawn(async move {
            let _permit = permit;
            let Entry { request, resolver } = entry;
            if abort.is_cancelled() || request.is_cancelled() {
                // unsent: the admission goes back to the gate
                resolver.cancel();
                return;
            }
            admission.stamp();

            let outcome = tokio::select! {
                biased;
                _ = abort.cancelled() => Err(ApiError::Cancelled),
                outcome = executor.run(&request) => outcome,
            };
            match &outcome {
                Ok(_) => tracing::debug!(%request, "request resolved"),
                Err(e) => tracing::warn!(%request, "request failed: {e}"),
            }
            resolver.resolve(outcome);
        });
    }

    state.rx.close();
    let mut cancelled = 0usize;
    while let Ok(entry) = state.rx.try_recv() {
        state.depth.fetch_sub(1, Ordering::AcqRel);
        if entry.resolver.cancel() {
            cancelled += 1;
        }
    }
    tracing::debug!(cancelled, "dispatch loop stopped");
}
