use std::sync::Arc;

use futures::future::select_all;
use serde::Serialize;

use crate::error::SuspensorError;
use crate::resource::{Resource, ResourceStatus, Suspension};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyState {
    Pending,
    Ready,
    Failed,
}

impl ReadyState {
    pub fn is_settled(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl From<ResourceStatus> for ReadyState {
    fn from(status: ResourceStatus) -> Self {
        match status {
            ResourceStatus::Pending => Self::Pending,
            ResourceStatus::Success => Self::Ready,
            ResourceStatus::Error => Self::Failed,
        }
    }
}

/// Anything that can report whether its content is ready to show.
///
/// Implemented by single resources and by reveal groups so a group can be an
/// item of another group.
pub trait Readiness: Send + Sync {
    fn ready_state(&self) -> ReadyState;

    /// Suspensions whose resolution may change `ready_state`.
    fn pending_suspensions(&self) -> Vec<Suspension>;
}

impl<T, E> Readiness for Resource<T, E>
where
    T: Send + Sync,
    E: Send + Sync,
{
    fn ready_state(&self) -> ReadyState {
        self.status().into()
    }

    fn pending_suspensions(&self) -> Vec<Suspension> {
        match self.try_read() {
            Err(error) => error.suspension().cloned().into_iter().collect(),
            Ok(_) => Vec::new(),
        }
    }
}

impl<R: Readiness + ?Sized> Readiness for Arc<R> {
    fn ready_state(&self) -> ReadyState {
        (**self).ready_state()
    }

    fn pending_suspensions(&self) -> Vec<Suspension> {
        (**self).pending_suspensions()
    }
}

/// A fixed state, for work that has nothing left to wait on.
impl Readiness for ReadyState {
    fn ready_state(&self) -> ReadyState {
        *self
    }

    fn pending_suspensions(&self) -> Vec<Suspension> {
        Vec::new()
    }
}

/// Waits until at least one of `suspensions` resolves. Returns immediately
/// when there is nothing to wait on.
pub async fn wait_any(suspensions: Vec<Suspension>) -> Result<(), SuspensorError> {
    if suspensions.is_empty() {
        return Ok(());
    }

    let waits = suspensions
        .into_iter()
        .map(|suspension| Box::pin(async move { suspension.wait().await }))
        .collect::<Vec<_>>();

    let (result, _, _) = select_all(waits).await;
    result
}
