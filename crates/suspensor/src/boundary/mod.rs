//! The retry loop that turns suspending reads back into rendered output.


use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, trace, warn};

use crate::error::{ReadError, SuspensorError};
use crate::resource::Suspension;

/// Produces placeholder output for a descriptor while its content is
/// suspended.
pub trait FallbackRenderer<D: ?Sized> {
    type Output;

    fn render_fallback(&self, descriptor: &D) -> Self::Output;
}

impl<D, O, F> FallbackRenderer<D> for F
where
    D: ?Sized,
    F: Fn(&D) -> O,
{
    type Output = O;

    fn render_fallback(&self, descriptor: &D) -> O {
        self(descriptor)
    }
}

/// Outcome of a single render attempt.
pub enum BoundaryView<V, E> {
    Fallback(Suspension),
    Content(V),
    Error(Arc<E>),
}

impl<V, E> BoundaryView<V, E> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    pub fn content(self) -> Option<V> {
        match self {
            Self::Content(value) => Some(value),
            Self::Fallback(_) | Self::Error(_) => None,
        }
    }
}

impl<V: fmt::Debug, E: fmt::Debug> fmt::Debug for BoundaryView<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fallback(suspension) => f.debug_tuple("Fallback").field(suspension).finish(),
            Self::Content(value) => f.debug_tuple("Content").field(value).finish(),
            Self::Error(error) => f.debug_tuple("Error").field(error).finish(),
        }
    }
}

/// Final outcome once nothing is left to wait on.
#[derive(Debug)]
pub enum Resolved<V, E> {
    Content(V),
    Error(Arc<E>),
}

impl<V, E> Resolved<V, E> {
    pub fn into_result(self) -> Result<V, Arc<E>> {
        match self {
            Self::Content(value) => Ok(value),
            Self::Error(error) => Err(error),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BoundaryStats {
    pub attempts: u64,
    pub suspensions: u64,
    pub failures: u64,
}

pub struct SuspenseBoundary {
    name: String,
    stats: Mutex<BoundaryStats>,
}

impl SuspenseBoundary {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), stats: Mutex::new(BoundaryStats::default()) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> BoundaryStats {
        *self.stats.lock()
    }

    /// Runs `render` once and classifies the result.
    pub fn attempt<V, E, F>(&self, render: F) -> BoundaryView<V, E>
    where
        F: FnOnce() -> Result<V, ReadError<E>>,
        E: fmt::Debug,
    {
        self.stats.lock().attempts += 1;

        match render() {
            Ok(value) => BoundaryView::Content(value),
            Err(ReadError::Suspended(suspension)) => {
                self.stats.lock().suspensions += 1;
                trace!("Boundary {} suspended on {}", self.name, suspension.resource());
                BoundaryView::Fallback(suspension)
            }
            Err(ReadError::OperationFailed(error)) => {
                self.stats.lock().failures += 1;
                warn!("Boundary {} showing error view: {:?}", self.name, error);
                BoundaryView::Error(error)
            }
        }
    }

    /// One attempt that substitutes `fallback`'s output for `descriptor` when
    /// the content suspends.
    pub fn render<D, V, E, B, F>(
        &self,
        descriptor: &D,
        fallback: &B,
        render: F,
    ) -> Result<V, Arc<E>>
    where
        D: ?Sized,
        B: FallbackRenderer<D, Output = V>,
        F: FnOnce() -> Result<V, ReadError<E>>,
        E: fmt::Debug,
    {
        match self.attempt(render) {
            BoundaryView::Content(value) => Ok(value),
            BoundaryView::Fallback(_) => Ok(fallback.render_fallback(descriptor)),
            BoundaryView::Error(error) => Err(error),
        }
    }

    /// Re-runs `render` after each suspension resolves until it produces
    /// content or an operation error.
    ///
    /// Fails with `ImpossibleState` when a suspension that already resolved
    /// is raised again, and with `Abandoned` when a suspended resource can
    /// never settle.
    pub async fn resolve<V, E, F>(&self, mut render: F) -> Result<Resolved<V, E>, SuspensorError>
    where
        F: FnMut() -> Result<V, ReadError<E>>,
        E: fmt::Debug,
    {
        let mut resolved: Option<Suspension> = None;

        loop {
            match self.attempt(&mut render) {
                BoundaryView::Content(value) => {
                    let attempts = self.stats().attempts;
                    debug!("Boundary {} resolved after {} attempts", self.name, attempts);
                    return Ok(Resolved::Content(value));
                }
                BoundaryView::Error(error) => return Ok(Resolved::Error(error)),
                BoundaryView::Fallback(suspension) => {
                    if resolved.as_ref().is_some_and(|previous| previous.same_as(&suspension)) {
                        error!(
                            "Boundary {} suspended again on settled {}",
                            self.name,
                            suspension.resource()
                        );
                        return Err(SuspensorError::impossible(format!(
                            "{} settled but still reads as pending",
                            suspension.resource()
                        )));
                    }

                    suspension.wait().await?;
                    resolved = Some(suspension);
                }
            }
        }
    }

    /// [`resolve`](Self::resolve) bounded by `limit`. `Ok(None)` means the
    /// limit passed first; the underlying operations keep running.
    pub async fn resolve_within<V, E, F>(
        &self,
        limit: Duration,
        render: F,
    ) -> Result<Option<Resolved<V, E>>, SuspensorError>
    where
        F: FnMut() -> Result<V, ReadError<E>>,
        E: fmt::Debug,
    {
        match tokio::time::timeout(limit, self.resolve(render)).await {
            Ok(resolved) => resolved.map(Some),
            Err(_) => {
                debug!("Boundary {} still suspended after {}ms", self.name, limit.as_millis());
                Ok(None)
            }
        }
    }
}

impl fmt::Debug for SuspenseBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuspenseBoundary")
            .field("name", &self.name)
            .field("stats", &self.stats())
            .finish()
    }
}
