// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-process event stream.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{CloudEvent, EventCallback, EventFilter, EventStream, EventSubscriptionId};
use crate::error::ProtocolError;

type Subscriptions = HashMap<EventSubscriptionId, (EventFilter, EventCallback)>;

/// Event stream that lives in the current process.
///
/// The `EventBus` delivers every published event to the callbacks of all
/// subscriptions whose [`EventFilter`] matches. Applications feed it from
/// whatever transport actually carries cloud events; tests publish to it
/// directly.
///
/// Delivery is synchronous: [`publish`](Self::publish) returns after every
/// matching callback ran. Callbacks must therefore be short and must not
/// block.
///
/// # Examples
///
/// ```
/// use particle_mirror::event::{CloudEvent, EventBus};
///
/// let bus = EventBus::new();
/// assert_eq!(bus.subscription_count(), 0);
///
/// // No subscriber: the event is dropped.
/// assert_eq!(bus.publish(CloudEvent::new("spark/status", "online", "abc")), 0);
/// ```
#[derive(Default)]
pub struct EventBus {
    subscriptions: Arc<RwLock<Subscriptions>>,
}

impl EventBus {
    /// Creates a new event bus without subscriptions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Returns `true` if the subscription is still live.
    #[must_use]
    pub fn is_subscribed(&self, id: EventSubscriptionId) -> bool {
        self.subscriptions.read().contains_key(&id)
    }

    /// Publishes an event and returns the number of callbacks that received it.
    pub fn publish(&self, event: CloudEvent) -> usize {
        // Collect first so callbacks may subscribe or unsubscribe.
        let targets: Vec<EventCallback> = self
            .subscriptions
            .read()
            .values()
            .filter(|(filter, _)| filter.matches(&event))
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        tracing::trace!(name = %event.name, device_id = %event.device_id, receivers = targets.len(), "Publishing event");

        for callback in &targets {
            callback(event.clone());
        }
        targets.len()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            subscriptions: Arc::clone(&self.subscriptions),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscription_count", &self.subscription_count())
            .finish()
    }
}

impl EventStream for EventBus {
    async fn subscribe(
        &self,
        filter: EventFilter,
        callback: EventCallback,
    ) -> Result<EventSubscriptionId, ProtocolError> {
        let id = EventSubscriptionId::new();
        tracing::debug!(subscription = %id, prefix = %filter.name_prefix, "Event subscription added");
        self.subscriptions.write().insert(id, (filter, callback));
        Ok(id)
    }

    async fn unsubscribe(&self, id: EventSubscriptionId) -> Result<(), ProtocolError> {
        tracing::debug!(subscription = %id, "Event subscription removed");
        self.subscriptions.write().remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn counting_callback(counter: &Arc<AtomicU32>) -> EventCallback {
        let counter = Arc::clone(counter);
        Arc::new(move |_event: CloudEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn new_bus_has_no_subscriptions() {
        let bus = EventBus::new();
        assert_eq!(bus.subscription_count(), 0);
    }

    #[tokio::test]
    async fn publish_delivers_to_matching_subscriptions() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicU32::new(0));

        bus.subscribe(
            EventFilter::prefix("spark").for_device("a"),
            counting_callback(&counter),
        )
        .await
        .unwrap();

        assert_eq!(bus.publish(CloudEvent::new("spark/status", "online", "a")), 1);
        assert_eq!(bus.publish(CloudEvent::new("spark/status", "online", "b")), 0);
        assert_eq!(bus.publish(CloudEvent::new("temperature", "20", "a")), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicU32::new(0));

        let id = bus
            .subscribe(EventFilter::prefix(""), counting_callback(&counter))
            .await
            .unwrap();
        assert!(bus.is_subscribed(id));

        bus.unsubscribe(id).await.unwrap();
        assert!(!bus.is_subscribed(id));

        bus.publish(CloudEvent::new("anything", "", "a"));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn callback_may_unsubscribe_itself() {
        let bus = EventBus::new();
        let slot = Arc::new(RwLock::new(None::<EventSubscriptionId>));

        let inner_bus = bus.clone();
        let inner_slot = Arc::clone(&slot);
        let callback: EventCallback = Arc::new(move |_event: CloudEvent| {
            if let Some(id) = inner_slot.write().take() {
                inner_bus.subscriptions.write().remove(&id);
            }
        });
        let id = bus
            .subscribe(EventFilter::prefix("spark"), callback)
            .await
            .unwrap();
        *slot.write() = Some(id);

        assert_eq!(bus.publish(CloudEvent::new("spark/status", "online", "a")), 1);
        assert_eq!(bus.subscription_count(), 0);
    }

    #[test]
    fn clone_shares_subscriptions() {
        let bus = EventBus::new();
        let other = bus.clone();
        bus.subscriptions.write().insert(
            EventSubscriptionId::new(),
            (
                EventFilter::prefix(""),
                Arc::new(|_event: CloudEvent| {}) as EventCallback,
            ),
        );
        assert_eq!(other.subscription_count(), 1);
    }
}
