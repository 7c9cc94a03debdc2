use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use super::ResourceId;
use crate::error::SuspensorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SignalState {
    Pending,
    Settled,
    Abandoned,
}

type SettleListener = Box<dyn FnOnce(SignalState) + Send>;

pub(crate) struct SettleSignal {
    resource: ResourceId,
    state: watch::Sender<SignalState>,
    listeners: Mutex<Vec<SettleListener>>,
}

impl SettleSignal {
    pub(crate) fn new(resource: ResourceId, initial: SignalState) -> Self {
        let (state, _) = watch::channel(initial);
        Self { resource, state, listeners: Mutex::new(Vec::new()) }
    }

    /// Publishes `state` and runs listeners registered while pending, on the
    /// settling thread and without any resource lock held.
    pub(crate) fn mark(&self, state: SignalState) {
        self.state.send_replace(state);
        if state == SignalState::Pending {
            return;
        }

        let listeners = std::mem::take(&mut *self.listeners.lock());
        for listener in listeners {
            listener(state);
        }
    }

    /// Runs `listener` once the signal leaves `Pending`, or right away if it
    /// already has.
    pub(crate) fn on_settle(&self, listener: impl FnOnce(SignalState) + Send + 'static) {
        let mut listeners = self.listeners.lock();
        let current = self.current();
        if current == SignalState::Pending {
            listeners.push(Box::new(listener));
            return;
        }
        drop(listeners);
        listener(current);
    }

    pub(crate) fn current(&self) -> SignalState {
        *self.state.borrow()
    }
}

impl fmt::Debug for SettleSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettleSignal")
            .field("resource", &self.resource)
            .field("state", &self.current())
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

/// The in-flight handle a pending read hands back.
///
/// Every read of the same pending resource returns a suspension for the same
/// underlying signal, so `a == b` holds across repeated reads.
#[derive(Clone)]
pub struct Suspension {
    signal: Arc<SettleSignal>,
}

impl Suspension {
    pub(crate) fn new(signal: Arc<SettleSignal>) -> Self {
        Self { signal }
    }

    pub fn resource(&self) -> ResourceId {
        self.signal.resource
    }

    pub fn is_resolved(&self) -> bool {
        self.signal.current() != SignalState::Pending
    }

    /// Runs `listener` at the moment the resource settles or is abandoned.
    pub(crate) fn on_settle(&self, listener: impl FnOnce(SignalState) + Send + 'static) {
        self.signal.on_settle(listener);
    }

    pub fn same_as(&self, other: &Suspension) -> bool {
        Arc::ptr_eq(&self.signal, &other.signal)
    }

    /// Waits until the suspended resource settles, successfully or not.
    ///
    /// Returns `Abandoned` when the completion handle was dropped without
    /// settling, since the resource can then never leave `pending`.
    pub async fn wait(&self) -> Result<(), SuspensorError> {
        let mut receiver = self.signal.state.subscribe();
        let state = *receiver
            .wait_for(|state| *state != SignalState::Pending)
            .await
            .map_err(|_| {
                SuspensorError::impossible(format!(
                    "settle signal for resource {} closed while pending",
                    self.signal.resource
                ))
            })?;

        match state {
            SignalState::Settled => Ok(()),
            SignalState::Abandoned => Err(SuspensorError::Abandoned(self.signal.resource)),
            SignalState::Pending => Err(SuspensorError::impossible(format!(
                "resource {} woke while still pending",
                self.signal.resource
            ))),
        }
    }
}

impl PartialEq for Suspension {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Suspension {}

impl fmt::Debug for Suspension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suspension")
            .field("resource", &self.signal.resource)
            .field("state", &self.signal.current())
            .finish()
    }
}
