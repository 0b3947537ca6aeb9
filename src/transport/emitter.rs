//! Keyed listener registry shared by the bundled transports.
//!
//! Listeners are snapshotted before dispatch, so a listener may attach or
//! detach listeners (including itself) while it runs.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::identifiers::ListenerId;

use super::event::{ManagerEvent, ManagerEventKind, SocketEvent, SocketEventKind};

// ============================================================================
// Types
// ============================================================================

/// Listener callback for events of type `E`.
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Listener for channel payloads.
pub type MessageListener = Listener<[Value]>;

/// Listener for socket lifecycle events.
pub type SocketListener = Listener<SocketEvent>;

/// Listener for reconnection-manager events.
pub type ManagerListener = Listener<ManagerEvent>;

// ============================================================================
// EventEmitter
// ============================================================================

/// Ordered listener registry keyed by `K`.
pub struct EventEmitter<K, E: ?Sized> {
    listeners: Mutex<Vec<(K, ListenerId, Listener<E>)>>,
}

impl<K, E: ?Sized> Default for EventEmitter<K, E> {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }
}

impl<K, E: ?Sized> fmt::Debug for EventEmitter<K, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

impl<K, E> EventEmitter<K, E>
where
    K: Eq + Hash + Clone,
    E: ?Sized,
{
    /// Attaches `listener` under `key`.
    pub fn on(&self, key: K, listener: Listener<E>) -> ListenerId {
        let id = ListenerId::next();
        self.listeners.lock().push((key, id, listener));
        id
    }

    /// Detaches one listener under `key`, or all of them when `id` is `None`.
    ///
    /// Returns how many listeners were removed.
    pub fn off<Q>(&self, key: &Q, id: Option<ListenerId>) -> usize
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();

        listeners.retain(|(k, listener_id, _)| {
            let key_matches = k.borrow() == key;
            let id_matches = id.is_none_or(|wanted| wanted == *listener_id);
            !(key_matches && id_matches)
        });

        before - listeners.len()
    }

    /// Detaches every listener.
    pub fn off_all(&self) {
        self.listeners.lock().clear();
    }

    /// Calls every listener under `key` with `event`.
    ///
    /// Returns how many listeners were called.
    pub fn emit<Q>(&self, key: &Q, event: &E) -> usize
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let snapshot: Vec<Listener<E>> = self
            .listeners
            .lock()
            .iter()
            .filter(|(k, _, _)| k.borrow() == key)
            .map(|(_, _, listener)| Arc::clone(listener))
            .collect();

        for listener in &snapshot {
            listener(event);
        }

        snapshot.len()
    }

    /// Returns how many listeners are attached under `key`.
    #[must_use]
    pub fn listener_count<Q>(&self, key: &Q) -> usize
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.listeners
            .lock()
            .iter()
            .filter(|(k, _, _)| k.borrow() == key)
            .count()
    }

    /// Returns the total number of listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Returns `true` if no listener is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }
}

// ============================================================================
// TransportListeners
// ============================================================================

/// The three listener tables every transport carries.
#[derive(Debug, Default)]
pub struct TransportListeners {
    /// Channel payload listeners.
    pub channels: EventEmitter<String, [Value]>,
    /// Socket lifecycle listeners.
    pub socket: EventEmitter<SocketEventKind, SocketEvent>,
    /// Reconnection-manager listeners.
    pub manager: EventEmitter<ManagerEventKind, ManagerEvent>,
}

impl TransportListeners {
    /// Dispatches a channel payload.
    #[inline]
    pub fn dispatch_message(&self, channel: &str, args: &[Value]) -> usize {
        self.channels.emit(channel, args)
    }

    /// Dispatches a socket lifecycle event.
    #[inline]
    pub fn dispatch_socket(&self, event: &SocketEvent) -> usize {
        self.socket.emit(&event.kind(), event)
    }

    /// Dispatches a reconnection-manager event.
    #[inline]
    pub fn dispatch_manager(&self, event: &ManagerEvent) -> usize {
        self.manager.emit(&event.kind(), event)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    fn counting_listener(count: &Arc<AtomicUsize>) -> MessageListener {
        let count = Arc::clone(count);
        Arc::new(move |_args: &[Value]| {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_emit_reaches_matching_key_only() {
        let emitter = EventEmitter::<String, [Value]>::default();
        let count = Arc::new(AtomicUsize::new(0));

        emitter.on("a".to_string(), counting_listener(&count));
        emitter.on("b".to_string(), counting_listener(&count));

        assert_eq!(emitter.emit("a", &[json!(1)]), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_off_by_id_and_by_key() {
        let emitter = EventEmitter::<String, [Value]>::default();
        let count = Arc::new(AtomicUsize::new(0));

        let first = emitter.on("a".to_string(), counting_listener(&count));
        emitter.on("a".to_string(), counting_listener(&count));
        emitter.on("a".to_string(), counting_listener(&count));

        assert_eq!(emitter.off("a", Some(first)), 1);
        assert_eq!(emitter.listener_count("a"), 2);
        assert_eq!(emitter.off("a", Some(first)), 0);
        assert_eq!(emitter.off("a", None), 2);
        assert!(emitter.is_empty());
    }

    #[test]
    fn test_listener_can_detach_itself() {
        let emitter = Arc::new(EventEmitter::<String, [Value]>::default());
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

        let weak = Arc::downgrade(&emitter);
        let id_slot = Arc::clone(&slot);
        let id = emitter.on(
            "a".to_string(),
            Arc::new(move |_| {
                let id = *id_slot.lock();
                if let (Some(emitter), Some(id)) = (weak.upgrade(), id) {
                    emitter.off("a", Some(id));
                }
            }),
        );
        *slot.lock() = Some(id);

        assert_eq!(emitter.emit("a", &[]), 1);
        assert_eq!(emitter.emit("a", &[]), 0);
    }

    #[test]
    fn test_dispatch_socket_by_kind() {
        let listeners = TransportListeners::default();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);

        listeners.socket.on(
            SocketEventKind::Connect,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(listeners.dispatch_socket(&SocketEvent::Connect), 1);
        assert_eq!(
            listeners.dispatch_socket(&SocketEvent::disconnect(
                crate::transport::DisconnectReason::TransportClose
            )),
            0
        );
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
