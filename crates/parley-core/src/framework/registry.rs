//! The listener registry and its request channels.
//!
//! Only the event loop mutates the [`Registry`]. Every other task asks for
//! changes through the unbounded channels of a [`RegistrySender`], which are
//! drained by the loop.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::trace;

use crate::foundation::error::{ListenerError, ListenerResult};
use crate::framework::filter::Filter;
use crate::framework::listener::{
    EventHandlerFn, Listener, ListenerHandle, ListenerId, MessageHandlerFn, TimeoutFn,
};

/// The handler kind of a registered listener.
#[derive(Clone)]
pub(crate) enum ListenerHandler {
    Message(MessageHandlerFn),
    Event(EventHandlerFn),
}

/// A validated listener as stored in the registry.
pub(crate) struct RegisteredListener {
    pub handle: ListenerHandle,
    pub filter: Filter,
    pub handler: ListenerHandler,
    pub on_timeout: Option<TimeoutFn>,
}

/// A timer arm request: fire for `id` at `deadline` if `generation` is still
/// current by then.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimerRequest {
    pub id: ListenerId,
    pub generation: u64,
    pub deadline: Instant,
}

/// A listener waiting to enter the registry, with its initial timer.
pub(crate) struct AddRequest {
    pub listener: Arc<RegisteredListener>,
    pub timer: Option<TimerRequest>,
}

// ============================================================================
// Request channels
// ============================================================================

/// Sending half of the registry request channels.
#[derive(Clone)]
pub(crate) struct RegistrySender {
    pub add: mpsc::UnboundedSender<AddRequest>,
    pub remove: mpsc::UnboundedSender<ListenerId>,
    pub rearm: mpsc::UnboundedSender<TimerRequest>,
}

impl RegistrySender {
    /// Validates `listener` and queues it for the loop.
    ///
    /// Nothing is queued when validation fails.
    pub fn register(&self, listener: Listener) -> ListenerResult<ListenerHandle> {
        let (handle, request) = listener.into_request(self)?;
        trace!(
            listener = %handle.id(),
            name = handle.name().unwrap_or("unnamed"),
            managed = request.timer.is_some(),
            "Queueing listener"
        );
        self.add
            .send(request)
            .map_err(|_| ListenerError::LoopClosed)?;
        Ok(handle)
    }
}

/// Receiving half of the registry request channels, owned by the loop.
pub(crate) struct RegistryReceiver {
    pub add: mpsc::UnboundedReceiver<AddRequest>,
    pub remove: mpsc::UnboundedReceiver<ListenerId>,
    pub rearm: mpsc::UnboundedReceiver<TimerRequest>,
}

/// Creates the registry request channels.
pub(crate) fn channel() -> (RegistrySender, RegistryReceiver) {
    let (add_tx, add_rx) = mpsc::unbounded_channel();
    let (remove_tx, remove_rx) = mpsc::unbounded_channel();
    let (rearm_tx, rearm_rx) = mpsc::unbounded_channel();
    (
        RegistrySender {
            add: add_tx,
            remove: remove_tx,
            rearm: rearm_tx,
        },
        RegistryReceiver {
            add: add_rx,
            remove: remove_rx,
            rearm: rearm_rx,
        },
    )
}

// ============================================================================
// Registry
// ============================================================================

/// Insertion-ordered live listeners.
#[derive(Default)]
pub(crate) struct Registry {
    listeners: Vec<Arc<RegisteredListener>>,
}

impl Registry {
    /// Adds a listener. Already-closed listeners are not added.
    pub fn insert(&mut self, listener: Arc<RegisteredListener>) -> bool {
        if listener.handle.is_closed() {
            return false;
        }
        self.listeners.push(listener);
        true
    }

    /// Removes a listener by identity. Unknown ids are ignored.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.handle.id() != id);
        before != self.listeners.len()
    }

    /// Looks up a listener by identity.
    pub fn get(&self, id: ListenerId) -> Option<&Arc<RegisteredListener>> {
        self.listeners.iter().find(|l| l.handle.id() == id)
    }

    /// A copy of the current registry, in insertion order.
    pub fn snapshot(&self) -> Vec<Arc<RegisteredListener>> {
        self.listeners.clone()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(tx: &RegistrySender) -> (ListenerHandle, AddRequest) {
        Listener::new()
            .on_event(|_, _| async {})
            .into_request(tx)
            .unwrap()
    }

    #[test]
    fn test_remove_by_identity() {
        let (tx, _rx) = channel();
        let mut registry = Registry::default();

        let (a, req_a) = request(&tx);
        let (b, req_b) = request(&tx);
        assert!(registry.insert(req_a.listener));
        assert!(registry.insert(req_b.listener));

        assert!(registry.remove(a.id()));
        assert!(!registry.remove(a.id()));
        assert_eq!(registry.len(), 1);
        assert!(registry.get(b.id()).is_some());
    }

    #[test]
    fn test_closed_listener_is_not_inserted() {
        let (tx, _rx) = channel();
        let mut registry = Registry::default();

        let (handle, req) = request(&tx);
        handle.close();
        assert!(!registry.insert(req.listener));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_register_fails_when_loop_is_gone() {
        let (tx, rx) = channel();
        drop(rx);
        let result = tx.register(Listener::new().on_event(|_, _| async {}));
        assert_eq!(result.unwrap_err(), ListenerError::LoopClosed);
    }
}
