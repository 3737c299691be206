// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback management for device change notifications.
//!
//! This module provides the core types for managing listeners:
//!
//! - [`SubscriptionId`] - Unique identifier for unsubscribing
//! - [`CallbackRegistry`] - Registry that stores and dispatches callbacks

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::state::{DeviceChange, DeviceStatus, StateField};

/// Unique identifier for a listener.
///
/// IDs are handed out in increasing order, so they also record registration
/// order. They are unique within a device's lifetime.
///
/// # Examples
///
/// ```ignore
/// let sub_id = device.on_status_changed(|status| { /* ... */ });
///
/// // Later, unsubscribe
/// device.unsubscribe(sub_id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    #[must_use]
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

type ChangeCallback = Arc<dyn Fn(&DeviceChange) + Send + Sync>;
type FieldCallback = Arc<dyn Fn(StateField) + Send + Sync>;
type StatusCallback = Arc<dyn Fn(DeviceStatus) + Send + Sync>;
type FlashingCallback = Arc<dyn Fn(bool) + Send + Sync>;
type UsageCallback = Arc<dyn Fn(f64) + Send + Sync>;

#[derive(Clone)]
enum Listener {
    Change(ChangeCallback),
    Field(FieldCallback),
    Status(StatusCallback),
    Flashing(FlashingCallback),
    Usage(UsageCallback),
}

impl Listener {
    fn deliver(&self, change: &DeviceChange) {
        match (self, change) {
            (Self::Change(callback), _) => callback(change),
            (Self::Field(callback), DeviceChange::Field(field)) => callback(*field),
            (Self::Status(callback), DeviceChange::Status(status)) => callback(*status),
            (Self::Flashing(callback), DeviceChange::Flashing(flashing)) => callback(*flashing),
            (Self::Usage(callback), DeviceChange::Usage(usage)) => callback(*usage),
            _ => {}
        }
    }
}

/// Registry for device change listeners.
///
/// Listeners are called synchronously, in registration order. The registry
/// lock is released before any listener runs, so a listener may register or
/// unsubscribe listeners, or read the device it listens to.
pub struct CallbackRegistry {
    next_id: AtomicU64,
    listeners: RwLock<BTreeMap<SubscriptionId, Listener>>,
}

impl CallbackRegistry {
    /// Creates a new empty callback registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: RwLock::new(BTreeMap::new()),
        }
    }

    fn register(&self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().insert(id, listener);
        id
    }

    // =========================================================================
    // Registration methods
    // =========================================================================

    /// Registers a callback for every change notification.
    pub fn on_change<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&DeviceChange) + Send + Sync + 'static,
    {
        self.register(Listener::Change(Arc::new(callback)))
    }

    /// Registers a callback for snapshot field changes.
    pub fn on_field_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(StateField) + Send + Sync + 'static,
    {
        self.register(Listener::Field(Arc::new(callback)))
    }

    /// Registers a callback for status changes.
    pub fn on_status_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(DeviceStatus) + Send + Sync + 'static,
    {
        self.register(Listener::Status(Arc::new(callback)))
    }

    /// Registers a callback for changes of the flashing flag.
    pub fn on_flashing_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.register(Listener::Flashing(Arc::new(callback)))
    }

    /// Registers a callback for data usage changes.
    pub fn on_usage_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.register(Listener::Usage(Arc::new(callback)))
    }

    // =========================================================================
    // Unsubscription
    // =========================================================================

    /// Unregisters a callback by its subscription ID.
    ///
    /// Returns `true` if a callback was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.write().remove(&id).is_some()
    }

    /// Clears all callbacks.
    pub fn clear(&self) {
        self.listeners.write().clear();
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Dispatches a change to every listener interested in it.
    pub fn dispatch(&self, change: &DeviceChange) {
        let listeners: Vec<Listener> = self.listeners.read().values().cloned().collect();
        for listener in &listeners {
            listener.deliver(change);
        }
    }

    /// Dispatches a sequence of changes in order.
    pub fn dispatch_all<'a, I>(&self, changes: I)
    where
        I: IntoIterator<Item = &'a DeviceChange>,
    {
        for change in changes {
            self.dispatch(change);
        }
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Returns the total number of registered callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Returns `true` if there are no registered callbacks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callback_count() == 0
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callback_count", &self.callback_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn subscription_id_display() {
        let id = SubscriptionId::new(42);
        assert_eq!(id.to_string(), "Sub(42)");
        assert_eq!(id.value(), 42);
    }

    #[test]
    fn registry_new_is_empty() {
        let registry = CallbackRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.callback_count(), 0);
    }

    #[test]
    fn registry_status_callback() {
        let registry = CallbackRegistry::new();
        let received = Arc::new(RwLock::new(Vec::new()));
        let received_clone = Arc::clone(&received);

        let id = registry.on_status_changed(move |status| {
            received_clone.write().push(status);
        });

        registry.dispatch(&DeviceChange::Status(DeviceStatus::Online));
        registry.dispatch(&DeviceChange::Field(StateField::Name));
        assert_eq!(*received.read(), vec![DeviceStatus::Online]);

        assert!(registry.unsubscribe(id));
        registry.dispatch(&DeviceChange::Status(DeviceStatus::Offline));
        assert_eq!(received.read().len(), 1);
    }

    #[test]
    fn registry_typed_callbacks_only_see_their_kind() {
        let registry = CallbackRegistry::new();
        let fields = Arc::new(AtomicU32::new(0));
        let flashing = Arc::new(AtomicU32::new(0));
        let usage = Arc::new(RwLock::new(None::<f64>));

        let f = Arc::clone(&fields);
        registry.on_field_changed(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });
        let fl = Arc::clone(&flashing);
        registry.on_flashing_changed(move |_| {
            fl.fetch_add(1, Ordering::SeqCst);
        });
        let u = Arc::clone(&usage);
        registry.on_usage_changed(move |value| {
            *u.write() = Some(value);
        });

        registry.dispatch(&DeviceChange::Field(StateField::Functions));
        registry.dispatch(&DeviceChange::Flashing(true));
        registry.dispatch(&DeviceChange::Usage(-1.0));

        assert_eq!(fields.load(Ordering::SeqCst), 1);
        assert_eq!(flashing.load(Ordering::SeqCst), 1);
        assert_eq!(*usage.read(), Some(-1.0));
    }

    #[test]
    fn registry_change_callback_sees_everything() {
        let registry = CallbackRegistry::new();
        let received = Arc::new(RwLock::new(Vec::new()));
        let received_clone = Arc::clone(&received);

        registry.on_change(move |change| received_clone.write().push(*change));

        let changes = [
            DeviceChange::Field(StateField::Online),
            DeviceChange::Status(DeviceStatus::Offline),
            DeviceChange::Usage(0.0),
        ];
        registry.dispatch_all(&changes);

        assert_eq!(*received.read(), changes.to_vec());
    }

    #[test]
    fn registry_delivers_in_registration_order() {
        let registry = CallbackRegistry::new();
        let order = Arc::new(RwLock::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            registry.on_change(move |_| order.write().push(label));
        }

        registry.dispatch(&DeviceChange::Flashing(false));
        assert_eq!(*order.read(), vec!["first", "second", "third"]);
    }

    #[test]
    fn listener_may_unsubscribe_itself() {
        let registry = Arc::new(CallbackRegistry::new());
        let slot = Arc::new(RwLock::new(None::<SubscriptionId>));
        let counter = Arc::new(AtomicU32::new(0));

        let inner_registry = Arc::clone(&registry);
        let inner_slot = Arc::clone(&slot);
        let inner_counter = Arc::clone(&counter);
        let id = registry.on_change(move |_| {
            inner_counter.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = inner_slot.write().take() {
                inner_registry.unsubscribe(id);
            }
        });
        *slot.write() = Some(id);

        registry.dispatch(&DeviceChange::Flashing(true));
        registry.dispatch(&DeviceChange::Flashing(false));

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn registry_unsubscribe_nonexistent() {
        let registry = CallbackRegistry::new();
        assert!(!registry.unsubscribe(SubscriptionId::new(999)));
    }

    #[test]
    fn registry_clear() {
        let registry = CallbackRegistry::new();
        registry.on_change(|_| {});
        registry.on_status_changed(|_| {});
        registry.on_usage_changed(|_| {});
        assert_eq!(registry.callback_count(), 3);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn registry_unique_ids() {
        let registry = CallbackRegistry::new();
        let id1 = registry.on_change(|_| {});
        let id2 = registry.on_field_changed(|_| {});
        let id3 = registry.on_status_changed(|_| {});

        assert!(id1 < id2);
        assert!(id2 < id3);
    }

    #[test]
    fn registry_debug() {
        let registry = CallbackRegistry::new();
        registry.on_change(|_| {});

        let debug = format!("{registry:?}");
        assert!(debug.contains("CallbackRegistry"));
        assert!(debug.contains("callback_count"));
    }
}
