// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One-shot monitor for the "device came back online" event.
//!
//! After a flash the device reboots and announces itself with a
//! `spark/status` event carrying `online`. The [`OnlineMonitor`] holds the
//! event subscription that waits for it. The subscription is consumed by the
//! first matching event: it is released from the stream before the caller
//! reacts to the event, so a burst of online events reconciles only once.

use tokio::sync::Mutex;

use crate::error::ProtocolError;
use crate::event::{CloudEvent, EventCallback, EventFilter, EventStream, EventSubscriptionId};

/// Name of the event a device publishes when its connection state changes.
pub const ONLINE_EVENT_NAME: &str = "spark/status";

/// Payload of [`ONLINE_EVENT_NAME`] when the device is back online.
pub const ONLINE_EVENT_DATA: &str = "online";

/// Event name prefix the monitor subscribes to.
pub const MONITOR_EVENT_PREFIX: &str = "spark";

/// Outcome of [`OnlineMonitor::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorStart {
    /// A new subscription was opened.
    Started(EventSubscriptionId),
    /// A subscription was already open and was kept.
    AlreadyActive(EventSubscriptionId),
}

impl MonitorStart {
    /// Returns the subscription that is now active.
    #[must_use]
    pub fn id(self) -> EventSubscriptionId {
        match self {
            Self::Started(id) | Self::AlreadyActive(id) => id,
        }
    }

    /// Returns `true` if this call opened the subscription.
    #[must_use]
    pub fn is_started(self) -> bool {
        matches!(self, Self::Started(_))
    }
}

/// Returns `true` if the event announces that a device is online.
#[must_use]
pub fn is_online_event(event: &CloudEvent) -> bool {
    event.name == ONLINE_EVENT_NAME && event.data == ONLINE_EVENT_DATA
}

/// Holder of at most one online-event subscription.
///
/// The slot lock is held across the subscribe and unsubscribe calls, so
/// concurrent `start` calls never open two subscriptions. `held` mirrors the
/// slot for synchronous readers and is only written under the slot lock.
#[derive(Debug, Default)]
pub struct OnlineMonitor {
    slot: Mutex<Option<EventSubscriptionId>>,
    held: parking_lot::Mutex<Option<EventSubscriptionId>>,
}

impl OnlineMonitor {
    /// Creates a monitor without a subscription.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the subscription unless one is already held.
    ///
    /// `make_callback` is only invoked when a new subscription is opened.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the stream refuses the subscription. The
    /// monitor then stays empty.
    pub async fn start<S, F>(
        &self,
        stream: &S,
        filter: EventFilter,
        make_callback: F,
    ) -> Result<MonitorStart, ProtocolError>
    where
        S: EventStream,
        F: FnOnce() -> EventCallback,
    {
        let mut slot = self.slot.lock().await;
        if let Some(id) = *slot {
            tracing::debug!(subscription = %id, "Online monitor already active");
            return Ok(MonitorStart::AlreadyActive(id));
        }

        let id = stream.subscribe(filter, make_callback()).await?;
        *slot = Some(id);
        *self.held.lock() = Some(id);
        tracing::debug!(subscription = %id, "Online monitor started");
        Ok(MonitorStart::Started(id))
    }

    /// Consumes the subscription if `event` is an online event.
    ///
    /// Returns `true` if the subscription was released. The handle is taken
    /// and unsubscribed before this returns; an unsubscribe failure is logged
    /// and does not keep the handle alive.
    pub async fn consume<S: EventStream>(&self, stream: &S, event: &CloudEvent) -> bool {
        if !is_online_event(event) {
            return false;
        }

        let mut slot = self.slot.lock().await;
        let Some(id) = slot.take() else {
            return false;
        };
        *self.held.lock() = None;

        if let Err(err) = stream.unsubscribe(id).await {
            tracing::warn!(subscription = %id, error = %err, "Failed to release online monitor");
        }
        tracing::debug!(subscription = %id, device_id = %event.device_id, "Online monitor consumed");
        true
    }

    /// Releases the subscription without waiting for an event.
    ///
    /// Returns `Ok(false)` if no subscription was held.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the stream refuses to unsubscribe. The
    /// handle is kept in that case.
    pub async fn cancel<S: EventStream>(&self, stream: &S) -> Result<bool, ProtocolError> {
        let mut slot = self.slot.lock().await;
        let Some(id) = *slot else {
            return Ok(false);
        };

        stream.unsubscribe(id).await?;
        *slot = None;
        *self.held.lock() = None;
        tracing::debug!(subscription = %id, "Online monitor cancelled");
        Ok(true)
    }

    /// Releases the subscription if it is still `id`.
    ///
    /// Used to undo a [`start`](Self::start) whose follow-up failed.
    pub(crate) async fn cancel_if<S: EventStream>(&self, stream: &S, id: EventSubscriptionId) {
        let mut slot = self.slot.lock().await;
        if *slot != Some(id) {
            return;
        }
        *slot = None;
        *self.held.lock() = None;
        if let Err(err) = stream.unsubscribe(id).await {
            tracing::warn!(subscription = %id, error = %err, "Failed to release online monitor");
        }
    }

    /// Returns the held subscription, if any.
    ///
    /// Never waits: a `start` or `consume` in progress is reported by its
    /// state before the call.
    #[must_use]
    pub fn active(&self) -> Option<EventSubscriptionId> {
        *self.held.lock()
    }

    /// Takes the handle without releasing it from the stream.
    pub(crate) fn take(&mut self) -> Option<EventSubscriptionId> {
        self.held.get_mut().take();
        self.slot.get_mut().take()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::event::EventBus;

    fn noop_callback() -> EventCallback {
        Arc::new(|_event: CloudEvent| {})
    }

    fn device_filter() -> EventFilter {
        EventFilter::prefix(MONITOR_EVENT_PREFIX).for_device("abc")
    }

    struct RefusingStream;

    impl EventStream for RefusingStream {
        async fn subscribe(
            &self,
            _filter: EventFilter,
            _callback: EventCallback,
        ) -> Result<EventSubscriptionId, ProtocolError> {
            Err(ProtocolError::ConnectionFailed("stream down".to_string()))
        }

        async fn unsubscribe(&self, _id: EventSubscriptionId) -> Result<(), ProtocolError> {
            Err(ProtocolError::ConnectionFailed("stream down".to_string()))
        }
    }

    #[test]
    fn online_event_detection() {
        assert!(is_online_event(&CloudEvent::new("spark/status", "online", "abc")));
        assert!(!is_online_event(&CloudEvent::new("spark/status", "offline", "abc")));
        assert!(!is_online_event(&CloudEvent::new("spark/flash/status", "success", "abc")));
    }

    #[tokio::test]
    async fn start_subscribes_once() {
        let bus = EventBus::new();
        let monitor = OnlineMonitor::new();

        let first = monitor
            .start(&bus, device_filter(), noop_callback)
            .await
            .unwrap();
        assert!(first.is_started());
        assert_eq!(monitor.active(), Some(first.id()));

        let calls = AtomicU32::new(0);
        let second = monitor
            .start(&bus, device_filter(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                noop_callback()
            })
            .await
            .unwrap();
        assert_eq!(second, MonitorStart::AlreadyActive(first.id()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(bus.subscription_count(), 1);
    }

    #[tokio::test]
    async fn online_event_consumes_subscription_once() {
        let bus = EventBus::new();
        let monitor = OnlineMonitor::new();
        monitor
            .start(&bus, device_filter(), noop_callback)
            .await
            .unwrap();

        let online = CloudEvent::new(ONLINE_EVENT_NAME, ONLINE_EVENT_DATA, "abc");
        assert!(monitor.consume(&bus, &online).await);
        assert_eq!(monitor.active(), None);
        assert_eq!(bus.subscription_count(), 0);

        assert!(!monitor.consume(&bus, &online).await);
    }

    #[tokio::test]
    async fn other_events_leave_subscription_alone() {
        let bus = EventBus::new();
        let monitor = OnlineMonitor::new();
        let started = monitor
            .start(&bus, device_filter(), noop_callback)
            .await
            .unwrap();

        let offline = CloudEvent::new(ONLINE_EVENT_NAME, "offline", "abc");
        assert!(!monitor.consume(&bus, &offline).await);
        assert_eq!(monitor.active(), Some(started.id()));
        assert!(bus.is_subscribed(started.id()));
    }

    #[tokio::test]
    async fn cancel_releases_subscription() {
        let bus = EventBus::new();
        let monitor = OnlineMonitor::new();

        assert!(!monitor.cancel(&bus).await.unwrap());

        monitor
            .start(&bus, device_filter(), noop_callback)
            .await
            .unwrap();
        assert!(monitor.cancel(&bus).await.unwrap());
        assert_eq!(monitor.active(), None);
        assert_eq!(bus.subscription_count(), 0);
    }

    #[tokio::test]
    async fn cancel_if_ignores_other_subscription() {
        let bus = EventBus::new();
        let monitor = OnlineMonitor::new();
        let started = monitor
            .start(&bus, device_filter(), noop_callback)
            .await
            .unwrap();

        monitor.cancel_if(&bus, EventSubscriptionId::new()).await;
        assert_eq!(monitor.active(), Some(started.id()));

        monitor.cancel_if(&bus, started.id()).await;
        assert_eq!(monitor.active(), None);
    }

    #[tokio::test]
    async fn refused_subscription_leaves_monitor_empty() {
        let monitor = OnlineMonitor::new();
        let result = monitor
            .start(&RefusingStream, device_filter(), noop_callback)
            .await;

        assert!(result.is_err());
        assert_eq!(monitor.active(), None);
    }

    #[tokio::test]
    async fn active_is_readable_while_slot_is_locked() {
        let bus = EventBus::new();
        let monitor = OnlineMonitor::new();
        let started = monitor
            .start(&bus, device_filter(), noop_callback)
            .await
            .unwrap();

        let _slot = monitor.slot.lock().await;
        assert_eq!(monitor.active(), Some(started.id()));
    }

    #[tokio::test]
    async fn take_hands_over_the_handle() {
        let bus = EventBus::new();
        let mut monitor = OnlineMonitor::new();
        let started = monitor
            .start(&bus, device_filter(), noop_callback)
            .await
            .unwrap();

        assert_eq!(monitor.take(), Some(started.id()));
        assert_eq!(monitor.active(), None);
        assert!(bus.is_subscribed(started.id()));
        assert_eq!(monitor.take(), None);
    }

    #[tokio::test]
    async fn consume_survives_unsubscribe_failure() {
        let bus = EventBus::new();
        let monitor = OnlineMonitor::new();
        monitor
            .start(&bus, device_filter(), noop_callback)
            .await
            .unwrap();

        let online = CloudEvent::new(ONLINE_EVENT_NAME, ONLINE_EVENT_DATA, "abc");
        assert!(monitor.consume(&RefusingStream, &online).await);
        assert_eq!(monitor.active(), None);
    }
}
