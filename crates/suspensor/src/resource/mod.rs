mod suspension;

#[cfg(test)]
mod tests;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{ReadError, SuspensorError};
pub(crate) use suspension::SignalState;
use suspension::SettleSignal;

pub use suspension::Suspension;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(u64);

impl ResourceId {
    fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Pending,
    Success,
    Error,
}

enum Outcome<T, E> {
    Pending,
    Success(Arc<T>),
    Error(Arc<E>),
}

struct Shared<T, E> {
    id: ResourceId,
    outcome: Mutex<Outcome<T, E>>,
    signal: Arc<SettleSignal>,
    created_at: Instant,
}

/// Result of a single non-blocking read.
pub enum Read<T, E> {
    Pending(Suspension),
    Ready(Arc<T>),
    Failed(Arc<E>),
}

impl<T, E> Read<T, E> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    pub fn into_result(self) -> Result<Arc<T>, ReadError<E>> {
        match self {
            Self::Pending(suspension) => Err(ReadError::Suspended(suspension)),
            Self::Ready(value) => Ok(value),
            Self::Failed(error) => Err(ReadError::OperationFailed(error)),
        }
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Read<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending(suspension) => f.debug_tuple("Pending").field(suspension).finish(),
            Self::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Self::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
        }
    }
}

/// A shared handle around one asynchronous operation.
///
/// The operation starts when the resource is created, never on first read.
/// Cloning is cheap and every clone observes the same outcome.
pub struct Resource<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Resource<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Invokes `operation` immediately and drives its future on the current
    /// Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new<F, Fut>(operation: F) -> Self
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (resource, settle) = Self::deferred();
        let pending = operation();

        tokio::spawn(async move {
            settle.settle(pending.await);
        });

        resource
    }
}

impl<T, E> Resource<T, E> {
    /// A pending resource together with the only handle that can settle it.
    pub fn deferred() -> (Self, Settle<T, E>) {
        let resource = Self::with_outcome(Outcome::Pending, SignalState::Pending);
        debug!("Created pending {}", resource.id());
        let settle = Settle { shared: Some(Arc::clone(&resource.shared)) };
        (resource, settle)
    }

    pub fn ready(value: T) -> Self {
        Self::with_outcome(Outcome::Success(Arc::new(value)), SignalState::Settled)
    }

    pub fn failed(error: E) -> Self {
        Self::with_outcome(Outcome::Error(Arc::new(error)), SignalState::Settled)
    }

    fn with_outcome(outcome: Outcome<T, E>, signal: SignalState) -> Self {
        let id = ResourceId::next();
        Self {
            shared: Arc::new(Shared {
                id,
                outcome: Mutex::new(outcome),
                signal: Arc::new(SettleSignal::new(id, signal)),
                created_at: Instant::now(),
            }),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.shared.id
    }

    pub fn age(&self) -> Duration {
        self.shared.created_at.elapsed()
    }

    pub fn read(&self) -> Read<T, E> {
        match &*self.shared.outcome.lock() {
            Outcome::Pending => {
                trace!("Read of {} suspended", self.shared.id);
                Read::Pending(Suspension::new(Arc::clone(&self.shared.signal)))
            }
            Outcome::Success(value) => Read::Ready(Arc::clone(value)),
            Outcome::Error(error) => Read::Failed(Arc::clone(error)),
        }
    }

    pub fn try_read(&self) -> Result<Arc<T>, ReadError<E>> {
        self.read().into_result()
    }

    pub fn status(&self) -> ResourceStatus {
        match &*self.shared.outcome.lock() {
            Outcome::Pending => ResourceStatus::Pending,
            Outcome::Success(_) => ResourceStatus::Success,
            Outcome::Error(_) => ResourceStatus::Error,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.status() != ResourceStatus::Pending
    }

    pub fn is_abandoned(&self) -> bool {
        self.shared.signal.current() == SignalState::Abandoned
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Waits for settlement without reading the payload.
    pub async fn settled(&self) -> Result<(), SuspensorError> {
        match self.read() {
            Read::Pending(suspension) => suspension.wait().await,
            Read::Ready(_) | Read::Failed(_) => Ok(()),
        }
    }
}

impl<T, E> Clone for Resource<T, E> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<T, E> fmt::Debug for Resource<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.shared.id)
            .field("status", &self.status())
            .finish()
    }
}

/// Completion handle for a deferred resource. Consumed on use; dropping it
/// unsettled marks the resource abandoned.
pub struct Settle<T, E> {
    shared: Option<Arc<Shared<T, E>>>,
}

impl<T, E> Settle<T, E> {
    pub fn resource_id(&self) -> Option<ResourceId> {
        self.shared.as_ref().map(|shared| shared.id)
    }

    pub fn resolve(mut self, value: T) {
        self.finish(Outcome::Success(Arc::new(value)));
    }

    pub fn reject(mut self, error: E) {
        self.finish(Outcome::Error(Arc::new(error)));
    }

    pub fn settle(self, outcome: Result<T, E>) {
        match outcome {
            Ok(value) => self.resolve(value),
            Err(error) => self.reject(error),
        }
    }

    fn finish(&mut self, outcome: Outcome<T, E>) {
        let Some(shared) = self.shared.take() else {
            return;
        };

        let status = match &outcome {
            Outcome::Success(_) => ResourceStatus::Success,
            Outcome::Error(_) => ResourceStatus::Error,
            Outcome::Pending => ResourceStatus::Pending,
        };

        {
            let mut slot = shared.outcome.lock();
            if !matches!(*slot, Outcome::Pending) {
                return;
            }
            *slot = outcome;
        }

        shared.signal.mark(SignalState::Settled);
        debug!(
            "Settled {} as {:?} after {}ms",
            shared.id,
            status,
            shared.created_at.elapsed().as_millis()
        );
    }
}

impl<T, E> Drop for Settle<T, E> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            debug!("Completion handle for {} dropped while pending", shared.id);
            shared.signal.mark(SignalState::Abandoned);
        }
    }
}
