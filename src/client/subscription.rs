//! Channel subscriptions.
//!
//! Two registration styles share one registry:
//!
//! | Method | Listeners per channel |
//! |--------|-----------------------|
//! | [`subscribe`](ClientSocketManager::subscribe) | any number, removed by [`SubscriptionId`] |
//! | [`set_channel_listener`](ClientSocketManager::set_channel_listener) | one, replaced on re-registration |
//!
//! Every received payload goes to `on_any_subscribed_message_received`
//! first, then to the subscriber callback.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::devtool::LogType;
use crate::error::{Error, Result};
use crate::identifiers::{ListenerId, SubscriptionId};
use crate::signal::AbortSignal;
use crate::transport::{MessageListener, Transport, is_reserved_event};

use super::handlers::ChannelHandler;
use super::manager::ClientSocketManager;
use super::registry::Registration;

// ============================================================================
// SubscribeOptions
// ============================================================================

/// Options for [`ClientSocketManager::subscribe`].
#[derive(Clone, Default)]
pub struct SubscribeOptions {
    /// Called once the subscription is registered.
    pub on_subscription_complete: Option<ChannelHandler<ClientSocketManager>>,
    /// Unsubscribes when aborted.
    pub signal: Option<AbortSignal>,
}

impl fmt::Debug for SubscribeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscribeOptions")
            .field(
                "on_subscription_complete",
                &self.on_subscription_complete.is_some(),
            )
            .field("signal", &self.signal)
            .finish()
    }
}

impl SubscribeOptions {
    /// Creates empty options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the completion callback.
    #[must_use]
    pub fn with_subscription_complete(
        mut self,
        handler: impl Fn(&ClientSocketManager, &str) + Send + Sync + 'static,
    ) -> Self {
        self.on_subscription_complete = Some(Arc::new(handler));
        self
    }

    /// Binds the subscription to `signal`.
    #[inline]
    #[must_use]
    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Rejects channel names that cannot carry subscriber payloads.
fn validate_channel(channel: &str) -> Result<()> {
    if channel.is_empty() {
        return Err(Error::invalid_argument("Expected a non-empty channel name."));
    }

    if is_reserved_event(channel) {
        return Err(Error::invalid_argument(format!(
            "`{channel}` is a reserved event name and cannot be subscribed to."
        )));
    }

    Ok(())
}

// ============================================================================
// ClientSocketManager - Subscriptions
// ============================================================================

impl ClientSocketManager {
    /// Adds `callback` as a listener on `channel`.
    ///
    /// Returns the subscription id, or `None` when nothing was registered
    /// (disposed client, absent transport, signal already aborted).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty or reserved channel
    /// name, before anything is registered.
    ///
    /// # Example
    ///
    /// ```
    /// use socket_client_manager::transport::MemoryConnector;
    /// use socket_client_manager::{
    ///     AbortController, ClientSocketManager, ClientSocketManagerOptions, SubscribeOptions,
    /// };
    ///
    /// # fn main() -> socket_client_manager::Result<()> {
    /// let connector = MemoryConnector::new();
    /// let client = ClientSocketManager::with_connector(
    ///     "http://localhost",
    ///     ClientSocketManagerOptions::new(),
    ///     &connector,
    /// );
    ///
    /// let controller = AbortController::new();
    /// client.subscribe(
    ///     "chat",
    ///     |args| println!("{args:?}"),
    ///     SubscribeOptions::new().with_signal(controller.signal()),
    /// )?;
    /// assert_eq!(client.listener_count("chat"), 1);
    ///
    /// controller.abort();
    /// assert_eq!(client.listener_count("chat"), 0);
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe<F>(
        &self,
        channel: &str,
        callback: F,
        options: SubscribeOptions,
    ) -> Result<Option<SubscriptionId>>
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        validate_channel(channel)?;

        let Some(transport) = self.checked_transport() else {
            return Ok(None);
        };

        let SubscribeOptions {
            on_subscription_complete,
            signal,
        } = options;

        if signal.as_ref().is_some_and(AbortSignal::aborted) {
            debug!(channel, "Signal already aborted, subscription skipped");
            return Ok(None);
        }

        let id = self.install(channel, transport.as_ref(), callback);

        if let Some(signal) = &signal {
            self.bind_signal(channel, id, signal);
        }

        self.complete(channel, on_subscription_complete);
        Ok(Some(id))
    }

    /// Removes the subscription `id` from `channel`, or every listener of the
    /// channel when `id` is `None`.
    pub fn unsubscribe(&self, channel: &str, id: Option<SubscriptionId>) {
        self.remove_subscriptions(channel, id);
    }

    /// Installs `callback` as the only listener of `channel`.
    ///
    /// A listener previously installed this way is removed first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty or reserved channel
    /// name.
    pub fn set_channel_listener<F>(
        &self,
        channel: &str,
        callback: F,
        on_subscription_complete: Option<ChannelHandler<ClientSocketManager>>,
    ) -> Result<Option<SubscriptionId>>
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        validate_channel(channel)?;

        let Some(transport) = self.checked_transport() else {
            return Ok(None);
        };

        let (id, listener) = self.attach(channel, transport.as_ref(), callback);
        let previous = {
            let mut state = self.inner.state.lock();
            let registry = &mut state.registry;
            registry.insert(channel, Registration::new(id, listener));
            registry
                .set_exclusive(channel, id)
                .and_then(|previous| registry.remove(channel, previous))
        };
        if let Some(previous) = previous {
            transport.off(channel, Some(previous.listener));
            debug!(channel, id = %previous.id, "Channel listener replaced");
        }

        self.complete(channel, on_subscription_complete);
        Ok(Some(id))
    }

    /// Removes every listener of `channel`.
    pub fn delete_channel_listener(&self, channel: &str) {
        self.remove_subscriptions(channel, None);
    }

    /// Returns how many listeners `channel` has on the transport.
    #[must_use]
    pub fn listener_count(&self, channel: &str) -> usize {
        self.transport().map_or(0, |t| t.listener_count(channel))
    }

    /// Returns the channels with at least one subscription, sorted.
    #[must_use]
    pub fn channels(&self) -> Vec<String> {
        self.inner.state.lock().registry.channels()
    }
}

// ============================================================================
// ClientSocketManager - Subscription Internals
// ============================================================================

impl ClientSocketManager {
    /// Attaches the wrapped callback and records it.
    fn install<F>(&self, channel: &str, transport: &dyn Transport, callback: F) -> SubscriptionId
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        let (id, listener) = self.attach(channel, transport, callback);
        self.inner
            .state
            .lock()
            .registry
            .insert(channel, Registration::new(id, listener));
        id
    }

    /// Attaches the wrapped callback to the transport without recording it.
    fn attach<F>(
        &self,
        channel: &str,
        transport: &dyn Transport,
        callback: F,
    ) -> (SubscriptionId, ListenerId)
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        let weak = self.downgrade();
        let name = channel.to_string();
        let listener: MessageListener = Arc::new(move |args: &[Value]| {
            let Some(manager) = weak.upgrade() else {
                return;
            };
            if manager.checked_transport().is_none() {
                return;
            }

            trace!(channel = %name, args = args.len(), "Message received");

            if let Some(handler) = manager.handler(|h| h.on_any_subscribed_message_received.clone())
            {
                handler(&manager, name.as_str(), args);
            }
            callback(args);
        });

        let id = SubscriptionId::next();
        let listener = transport.on(channel, listener);

        debug!(channel, %id, "Subscribed");
        (id, listener)
    }

    /// Ties the subscription to `signal`.
    fn bind_signal(&self, channel: &str, id: SubscriptionId, signal: &AbortSignal) {
        let weak = self.downgrade();
        let name = channel.to_string();
        let registration = signal.register(move || {
            if let Some(manager) = weak.upgrade() {
                debug!(channel = %name, %id, "Subscription aborted");
                manager.remove_subscriptions(&name, Some(id));
            }
        });

        match registration {
            Some(abort) => {
                let orphan = self.inner.state.lock().registry.attach_abort(channel, id, abort);
                drop(orphan);
            }
            None => {
                self.remove_subscriptions(channel, Some(id));
            }
        }
    }

    /// Runs the completion callback and records the subscription.
    fn complete(&self, channel: &str, on_complete: Option<ChannelHandler<ClientSocketManager>>) {
        if let Some(on_complete) = on_complete {
            on_complete(self, channel);
        }

        self.render(|s| {
            s.channels.insert(channel);
            s.log(
                LogType::Subscribed,
                format!("subscribed to `{channel}` channel"),
            );
        });
    }

    /// Removes one or all registrations of `channel`; returns how many went.
    pub(crate) fn remove_subscriptions(&self, channel: &str, id: Option<SubscriptionId>) -> usize {
        let Some(transport) = self.checked_transport() else {
            return 0;
        };

        let (removed, remaining) = {
            let mut state = self.inner.state.lock();
            let removed: Vec<Registration> = match id {
                Some(id) => state.registry.remove(channel, id).into_iter().collect(),
                None => state.registry.remove_channel(channel),
            };
            (removed, state.registry.count(channel))
        };

        match id {
            Some(_) => {
                for registration in &removed {
                    transport.off(channel, Some(registration.listener));
                }
            }
            None => transport.off(channel, None),
        }

        self.render(|s| {
            if remaining == 0 {
                s.channels.remove(channel);
            }
            s.log(
                LogType::Unsubscribed,
                format!("unsubscribed from `{channel}` channel"),
            );
        });

        debug!(channel, removed = removed.len(), remaining, "Unsubscribed");
        removed.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;
    use serde_json::json;

    use crate::client::{ClientSocketManagerOptions, DevtoolOptions, EventHandlers};
    use crate::signal::AbortController;
    use crate::transport::{MemoryConnector, MemoryTransport};

    fn client(handlers: EventHandlers) -> (ClientSocketManager, Arc<MemoryTransport>) {
        let connector = MemoryConnector::new();
        let options = ClientSocketManagerOptions::new()
            .with_event_handlers(handlers)
            .with_devtool(DevtoolOptions::enabled());
        let manager = ClientSocketManager::with_connector("http://localhost", options, &connector);
        (manager, connector.last().unwrap())
    }

    fn recorder() -> (Arc<Mutex<Vec<Vec<Value>>>>, impl Fn(&[Value]) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |args: &[Value]| sink.lock().push(args.to_vec()))
    }

    fn channel_set(manager: &ClientSocketManager) -> Vec<String> {
        let state = manager.devtool().unwrap().snapshot();
        state.channels.iter().map(str::to_string).collect()
    }

    #[test]
    fn test_subscribe_delivers_payloads() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let any_sink = Arc::clone(&order);
        let handlers = EventHandlers::new().with_any_subscribed_message_received(
            move |_, channel, args| any_sink.lock().push(format!("any:{channel}:{}", args.len())),
        );
        let (manager, transport) = client(handlers);

        let callback_sink = Arc::clone(&order);
        manager
            .subscribe(
                "chat",
                move |args| callback_sink.lock().push(format!("cb:{}", args[0])),
                SubscribeOptions::new(),
            )
            .unwrap();

        assert_eq!(transport.server_emit("chat", vec![json!("hi")]), 1);
        assert_eq!(*order.lock(), vec!["any:chat:1", "cb:\"hi\""]);
    }

    #[test]
    fn test_subscription_complete_and_devtool() {
        let completed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&completed);
        let (manager, _) = client(EventHandlers::new());

        manager
            .subscribe(
                "news",
                |_| {},
                SubscribeOptions::new()
                    .with_subscription_complete(move |_, channel| sink.lock().push(channel.to_string())),
            )
            .unwrap();

        assert_eq!(*completed.lock(), vec!["news"]);
        assert_eq!(channel_set(&manager), vec!["news"]);
        let state = manager.devtool().unwrap().snapshot();
        let last = state.logs.iter().last().unwrap();
        assert_eq!(last.kind, LogType::Subscribed);
        assert_eq!(last.detail, "subscribed to `news` channel");
    }

    #[test]
    fn test_invalid_channels_are_rejected() {
        let (manager, transport) = client(EventHandlers::new());

        for channel in ["", "connect", "disconnect", "connect_error"] {
            let err = manager
                .subscribe(channel, |_| {}, SubscribeOptions::new())
                .unwrap_err();
            assert!(err.is_invalid_argument());
            assert_eq!(transport.listener_count(channel), 0);
        }

        assert!(manager.set_channel_listener("", |_| {}, None).is_err());
        assert!(manager.channels().is_empty());
    }

    #[test]
    fn test_multiple_listeners_and_selective_unsubscribe() {
        let (manager, transport) = client(EventHandlers::new());
        let (first_seen, first) = recorder();
        let (second_seen, second) = recorder();

        let first_id = manager
            .subscribe("chat", first, SubscribeOptions::new())
            .unwrap()
            .unwrap();
        manager.subscribe("chat", second, SubscribeOptions::new()).unwrap();
        assert_eq!(manager.listener_count("chat"), 2);

        manager.unsubscribe("chat", Some(first_id));
        assert_eq!(manager.listener_count("chat"), 1);
        assert_eq!(channel_set(&manager), vec!["chat"]);

        transport.server_emit("chat", vec![json!(1)]);
        assert!(first_seen.lock().is_empty());
        assert_eq!(second_seen.lock().len(), 1);

        manager.unsubscribe("chat", None);
        assert_eq!(manager.listener_count("chat"), 0);
        assert!(channel_set(&manager).is_empty());
        assert!(manager.channels().is_empty());
    }

    #[test]
    fn test_subscribe_then_unsubscribe_silences_channel() {
        let (manager, transport) = client(EventHandlers::new());
        let (seen, callback) = recorder();

        let id = manager.subscribe("chat", callback, SubscribeOptions::new()).unwrap();
        manager.unsubscribe("chat", id);

        assert_eq!(transport.server_emit("chat", vec![json!(1)]), 0);
        assert!(seen.lock().is_empty());

        let state = manager.devtool().unwrap().snapshot();
        assert_eq!(
            state.logs.iter().last().unwrap().detail,
            "unsubscribed from `chat` channel"
        );
    }

    #[test]
    fn test_abort_removes_exactly_one_registration() {
        let (manager, transport) = client(EventHandlers::new());
        let controller = AbortController::new();
        let (aborted_seen, aborted) = recorder();
        let (kept_seen, kept) = recorder();

        manager
            .subscribe(
                "chat",
                aborted,
                SubscribeOptions::new().with_signal(controller.signal()),
            )
            .unwrap();
        manager.subscribe("chat", kept, SubscribeOptions::new()).unwrap();
        assert_eq!(controller.signal().listener_count(), 1);

        controller.abort();

        assert_eq!(controller.signal().listener_count(), 0);
        assert_eq!(manager.listener_count("chat"), 1);

        transport.server_emit("chat", vec![json!(1)]);
        assert!(aborted_seen.lock().is_empty());
        assert_eq!(kept_seen.lock().len(), 1);

        let unsubscribed = manager
            .devtool()
            .unwrap()
            .snapshot()
            .logs
            .iter()
            .filter(|l| l.kind == LogType::Unsubscribed)
            .count();
        assert_eq!(unsubscribed, 1);
    }

    #[test]
    fn test_unsubscribe_detaches_abort_listener() {
        let (manager, _) = client(EventHandlers::new());
        let controller = AbortController::new();

        let id = manager
            .subscribe(
                "chat",
                |_| {},
                SubscribeOptions::new().with_signal(controller.signal()),
            )
            .unwrap();
        manager.unsubscribe("chat", id);

        assert_eq!(controller.signal().listener_count(), 0);
        controller.abort();
        assert_eq!(manager.listener_count("chat"), 0);
    }

    #[test]
    fn test_already_aborted_signal_registers_nothing() {
        let (manager, transport) = client(EventHandlers::new());
        let completed = Arc::new(Mutex::new(false));
        let sink = Arc::clone(&completed);

        let id = manager
            .subscribe(
                "chat",
                |_| panic!("must not be called"),
                SubscribeOptions::new()
                    .with_signal(AbortSignal::aborted_signal())
                    .with_subscription_complete(move |_, _| *sink.lock() = true),
            )
            .unwrap();

        assert_eq!(id, None);
        assert_eq!(transport.server_emit("chat", vec![json!(1)]), 0);
        assert!(!*completed.lock());
    }

    #[test]
    fn test_set_channel_listener_replaces() {
        let (manager, transport) = client(EventHandlers::new());
        let (first_seen, first) = recorder();
        let (second_seen, second) = recorder();

        manager.set_channel_listener("chat", first, None).unwrap();
        manager.set_channel_listener("chat", second, None).unwrap();
        assert_eq!(manager.listener_count("chat"), 1);

        transport.server_emit("chat", vec![json!("x")]);
        assert!(first_seen.lock().is_empty());
        assert_eq!(second_seen.lock().len(), 1);

        manager.delete_channel_listener("chat");
        assert_eq!(manager.listener_count("chat"), 0);
        assert!(manager.channels().is_empty());
    }

    #[test]
    fn test_set_channel_listener_keeps_other_subscribers() {
        let (manager, _) = client(EventHandlers::new());

        manager.subscribe("chat", |_| {}, SubscribeOptions::new()).unwrap();
        manager.set_channel_listener("chat", |_| {}, None).unwrap();
        manager.set_channel_listener("chat", |_| {}, None).unwrap();

        assert_eq!(manager.listener_count("chat"), 2);
    }

    #[test]
    fn test_concurrent_set_channel_listener_keeps_one() {
        let (manager, transport) = client(EventHandlers::new());

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let manager = manager.clone();
                scope.spawn(move || {
                    for _ in 0..50 {
                        manager.set_channel_listener("chat", |_| {}, None).unwrap();
                    }
                });
            }
        });

        assert_eq!(manager.listener_count("chat"), 1);
        assert_eq!(manager.inner.state.lock().registry.count("chat"), 1);
        assert_eq!(transport.server_emit("chat", vec![json!("x")]), 1);
    }

    #[test]
    fn test_disposed_client_is_inert() {
        let (manager, transport) = client(EventHandlers::new());
        manager.subscribe("chat", |_| {}, SubscribeOptions::new()).unwrap();

        manager.dispose();

        assert_eq!(transport.listener_count("chat"), 0);
        assert_eq!(
            manager.subscribe("chat", |_| {}, SubscribeOptions::new()).unwrap(),
            None
        );
        assert_eq!(manager.listener_count("chat"), 0);
        assert!(manager.channels().is_empty());
        manager.unsubscribe("chat", None);
    }

    #[test]
    fn test_abort_after_dispose_is_noop() {
        let (manager, _) = client(EventHandlers::new());
        let controller = AbortController::new();
        manager
            .subscribe(
                "chat",
                |_| {},
                SubscribeOptions::new().with_signal(controller.signal()),
            )
            .unwrap();

        manager.dispose();

        assert_eq!(controller.signal().listener_count(), 0);
        controller.abort();
    }

    #[test]
    fn test_callback_may_unsubscribe_itself() {
        let (manager, transport) = client(EventHandlers::new());
        let handle = manager.clone();

        manager
            .subscribe(
                "once",
                move |_| handle.unsubscribe("once", None),
                SubscribeOptions::new(),
            )
            .unwrap();

        assert_eq!(transport.server_emit("once", vec![]), 1);
        assert_eq!(transport.server_emit("once", vec![]), 0);
    }
}
