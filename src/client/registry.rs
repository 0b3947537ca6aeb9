//! Channel subscription registry.
//!
//! Tracks, per channel, the transport listeners installed by the manager and
//! the abort-signal registrations tied to them. Dropping a [`Registration`]
//! detaches its abort listener.

// ============================================================================
// Imports
// ============================================================================

use std::mem;

use rustc_hash::FxHashMap;

use crate::identifiers::{ListenerId, SubscriptionId};
use crate::signal::AbortRegistration;

// ============================================================================
// Registration
// ============================================================================

/// One subscriber installed on a channel.
#[derive(Debug)]
pub(crate) struct Registration {
    /// Identifier handed to the caller.
    pub(crate) id: SubscriptionId,
    /// Transport listener carrying the wrapped callback.
    pub(crate) listener: ListenerId,
    /// Abort listener, if the subscription was bound to a signal.
    pub(crate) abort: Option<AbortRegistration>,
}

impl Registration {
    pub(crate) fn new(id: SubscriptionId, listener: ListenerId) -> Self {
        Self {
            id,
            listener,
            abort: None,
        }
    }
}

// ============================================================================
// SubscriptionRegistry
// ============================================================================

/// Channel name to registrations, in subscription order.
#[derive(Debug, Default)]
pub(crate) struct SubscriptionRegistry {
    channels: FxHashMap<String, Vec<Registration>>,
    /// Registration installed through the single-listener API, per channel.
    exclusive: FxHashMap<String, SubscriptionId>,
}

impl SubscriptionRegistry {
    /// Adds a registration to `channel`.
    pub(crate) fn insert(&mut self, channel: &str, registration: Registration) {
        self.channels
            .entry(channel.to_string())
            .or_default()
            .push(registration);
    }

    /// Binds an abort listener to an existing registration.
    ///
    /// Hands the abort registration back if the subscription is gone.
    pub(crate) fn attach_abort(
        &mut self,
        channel: &str,
        id: SubscriptionId,
        abort: AbortRegistration,
    ) -> Option<AbortRegistration> {
        let registration = self
            .channels
            .get_mut(channel)
            .and_then(|registrations| registrations.iter_mut().find(|r| r.id == id));

        match registration {
            Some(registration) => {
                registration.abort = Some(abort);
                None
            }
            None => Some(abort),
        }
    }

    /// Removes one registration.
    pub(crate) fn remove(&mut self, channel: &str, id: SubscriptionId) -> Option<Registration> {
        let registrations = self.channels.get_mut(channel)?;
        let index = registrations.iter().position(|r| r.id == id)?;
        let registration = registrations.remove(index);

        if registrations.is_empty() {
            self.channels.remove(channel);
        }
        if self.exclusive.get(channel) == Some(&id) {
            self.exclusive.remove(channel);
        }

        Some(registration)
    }

    /// Removes every registration of `channel`.
    pub(crate) fn remove_channel(&mut self, channel: &str) -> Vec<Registration> {
        self.exclusive.remove(channel);
        self.channels.remove(channel).unwrap_or_default()
    }

    /// Marks `id` as the single listener of `channel`; returns the previous one.
    pub(crate) fn set_exclusive(&mut self, channel: &str, id: SubscriptionId) -> Option<SubscriptionId> {
        self.exclusive.insert(channel.to_string(), id)
    }

    /// Returns the single listener of `channel`, if any.
    pub(crate) fn exclusive(&self, channel: &str) -> Option<SubscriptionId> {
        self.exclusive.get(channel).copied()
    }

    /// Returns how many registrations `channel` has.
    pub(crate) fn count(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, Vec::len)
    }

    /// Returns the channels with at least one registration, sorted.
    pub(crate) fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.channels.keys().cloned().collect();
        channels.sort_unstable();
        channels
    }

    /// Removes every registration.
    pub(crate) fn drain(&mut self) -> Vec<(String, Registration)> {
        self.exclusive.clear();
        mem::take(&mut self.channels)
            .into_iter()
            .flat_map(|(channel, registrations)| {
                registrations
                    .into_iter()
                    .map(move |registration| (channel.clone(), registration))
            })
            .collect()
    }

    /// Returns the total number of registrations.
    pub(crate) fn len(&self) -> usize {
        self.channels.values().map(Vec::len).sum()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::signal::AbortController;

    fn registration() -> Registration {
        Registration::new(SubscriptionId::next(), ListenerId::next())
    }

    #[test]
    fn test_insert_and_remove() {
        let mut registry = SubscriptionRegistry::default();
        let first = registration();
        let first_id = first.id;

        registry.insert("chat", first);
        registry.insert("chat", registration());
        registry.insert("news", registration());

        assert_eq!(registry.count("chat"), 2);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.channels(), vec!["chat", "news"]);

        assert!(registry.remove("chat", first_id).is_some());
        assert!(registry.remove("chat", first_id).is_none());
        assert_eq!(registry.count("chat"), 1);
    }

    #[test]
    fn test_empty_channel_is_dropped() {
        let mut registry = SubscriptionRegistry::default();
        let only = registration();
        let id = only.id;

        registry.insert("chat", only);
        registry.remove("chat", id);

        assert!(registry.channels().is_empty());
        assert_eq!(registry.count("chat"), 0);
    }

    #[test]
    fn test_remove_channel() {
        let mut registry = SubscriptionRegistry::default();
        registry.insert("chat", registration());
        registry.insert("chat", registration());

        assert_eq!(registry.remove_channel("chat").len(), 2);
        assert!(registry.remove_channel("chat").is_empty());
    }

    #[test]
    fn test_exclusive_slot() {
        let mut registry = SubscriptionRegistry::default();
        let first = registration();
        let first_id = first.id;
        registry.insert("chat", first);

        assert_eq!(registry.set_exclusive("chat", first_id), None);
        assert_eq!(registry.exclusive("chat"), Some(first_id));

        registry.remove("chat", first_id);
        assert_eq!(registry.exclusive("chat"), None);
    }

    #[test]
    fn test_dropping_registration_detaches_abort() {
        let controller = AbortController::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        let mut registry = SubscriptionRegistry::default();
        let entry = registration();
        let id = entry.id;
        registry.insert("chat", entry);

        let abort = controller
            .signal()
            .register(move || flag.store(true, Ordering::SeqCst))
            .unwrap();
        assert!(registry.attach_abort("chat", id, abort).is_none());
        assert_eq!(controller.signal().listener_count(), 1);

        drop(registry.drain());
        assert_eq!(controller.signal().listener_count(), 0);

        controller.abort();
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_attach_abort_to_missing_registration() {
        let controller = AbortController::new();
        let mut registry = SubscriptionRegistry::default();

        let abort = controller.signal().register(|| {}).unwrap();
        let returned = registry.attach_abort("chat", SubscriptionId::next(), abort);
        assert!(returned.is_some());
    }
}
