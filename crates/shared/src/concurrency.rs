//! Request-scoped context, cancellation, and bounded worker pools.
//!
//! - [`RequestContext`] carries a correlation id plus a hierarchical
//!   cancellation token. Child contexts are cancelled with their parent, and
//!   cancelling a child never affects the parent. Job deadlines rely on this
//!   to abort in-flight network calls of one job only.
//! - [`WorkerPool`] bounds how many jobs of one kind run at once. Callers ask
//!   for a slot with [`WorkerPool::try_spawn`]; a full pool hands the work back
//!   so it can stay queued.

use crate::{ErrorCode, ErrorEnvelope, Result};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// A correlation identifier used for logging/telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(Arc<str>);

impl CorrelationId {
    /// Parse a correlation identifier from user input.
    ///
    /// The value is trimmed; empty values are rejected.
    pub fn parse(value: impl AsRef<str>) -> Result<Self> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "correlationId must be non-empty",
            ));
        }
        Ok(Self(Arc::from(trimmed)))
    }

    /// Create a new request id, unique within this process.
    #[must_use]
    pub fn new_request_id() -> Self {
        let n = REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(Arc::from(format!("req_{n}")))
    }

    /// Borrow the identifier as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Request-scoped context passed across boundaries.
#[derive(Debug, Clone)]
pub struct RequestContext {
    correlation_id: CorrelationId,
    cancellation: CancellationToken,
}

impl RequestContext {
    /// Create a root context with a fresh cancellation token.
    #[must_use]
    pub fn new(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            cancellation: CancellationToken::new(),
        }
    }

    /// Create a root context with an auto-generated `req_*` id.
    #[must_use]
    pub fn new_request() -> Self {
        Self::new(CorrelationId::new_request_id())
    }

    /// Derive a child context that is cancelled together with `self`.
    #[must_use]
    pub fn child(&self, correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            cancellation: self.cancellation.child_token(),
        }
    }

    /// Return the correlation id.
    #[must_use]
    pub const fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Return a clone of the cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Returns true if the request was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Cancel this context and every child derived from it.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Await cancellation.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }

    /// Return a cancellation error when this context was cancelled.
    pub fn ensure_not_cancelled(&self, operation: &'static str) -> Result<()> {
        if self.is_cancelled() {
            return Err(cancelled_error(operation));
        }
        Ok(())
    }

    /// Drive `fut` until it finishes or this context is cancelled.
    ///
    /// On cancellation the future is dropped, which aborts any in-flight I/O
    /// it owns.
    pub async fn run_cancellable<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.ensure_not_cancelled(operation)?;
        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(cancelled_error(operation)),
            result = fut => result,
        }
    }
}

pub(crate) fn cancelled_error(operation: &'static str) -> ErrorEnvelope {
    ErrorEnvelope::cancelled("operation cancelled").with_metadata("operation", operation)
}

/// Bounded set of concurrently running jobs of one kind.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    name: Arc<str>,
    capacity: usize,
    slots: Arc<Semaphore>,
    tracker: TaskTracker,
}

impl WorkerPool {
    /// Create a pool that runs at most `capacity` tasks at once.
    ///
    /// A zero capacity is treated as one.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            name: name.into(),
            capacity,
            slots: Arc::new(Semaphore::new(capacity)),
            tracker: TaskTracker::new(),
        }
    }

    /// Pool name used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum number of concurrently running tasks.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of free slots right now.
    #[must_use]
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Number of tasks currently holding a slot.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }

    /// Spawn `task` when a slot is free.
    ///
    /// Returns the task back when the pool is full so the caller can keep it
    /// queued.
    pub fn try_spawn<F>(&self, task: F) -> std::result::Result<(), F>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(permit) = Arc::clone(&self.slots).try_acquire_owned() else {
            return Err(task);
        };
        self.tracker.spawn(async move {
            task.await;
            drop(permit);
        });
        Ok(())
    }

    /// Wait for every spawned task to finish.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}
