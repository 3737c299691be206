// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Local mirror of one cloud device.
//!
//! A [`Device`] keeps the last snapshot the cloud reported, the status
//! derived from it, the flashing flag and the cellular data usage. Every
//! mutation of these is announced to listeners registered through
//! [`Subscribable`], synchronously and in the order it happened.
//!
//! # Serialized reconciliation
//!
//! [`refresh`](Device::refresh), [`start_flash`](Device::start_flash) and
//! [`handle_event`](Device::handle_event) take a per-device operation lock
//! for their whole duration, network I/O included. Concurrent callers on
//! the same device queue; different devices never wait on each other.
//!
//! Events delivered by the online monitor are not handled on the event
//! stream's context. The monitor's callback only queues them; a background
//! task feeds them to [`handle_event`](Device::handle_event), which waits
//! for the operation lock like any other caller.
//!
//! # Examples
//!
//! ```no_run
//! use particle_mirror::{CloudClient, Device, DeviceStatus, EventBus, FlashFirmware};
//! use particle_mirror::subscription::Subscribable;
//!
//! # async fn example() -> particle_mirror::Result<()> {
//! let events = EventBus::new();
//! let device = Device::builder(CloudClient::new("token")?, events.clone())
//!     .with_id("0123456789abcdef01234567")
//!     .build()?;
//!
//! device.on_status_changed(|status| println!("status: {status}"));
//! device.refresh().await?;
//!
//! // Flash and wait for the device to announce itself again
//! device.start_flash(FlashFirmware::Tinker, true).await?;
//! let mut status = device.watch_status();
//! status.wait_for(|s| *s != DeviceStatus::Flashing).await.ok();
//! # Ok(())
//! # }
//! ```

mod builder;

pub use builder::DeviceBuilder;

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc, watch};

use crate::error::{DeviceError, Error, ParseError, ProtocolError};
use crate::event::{CloudEvent, EventCallback, EventFilter, EventStream};
use crate::protocol::{RequestBody, Transport};
use crate::state::{self, DeviceChange, DeviceState, DeviceStatus, StateDiff, StateField};
use crate::subscription::{
    CallbackRegistry, MONITOR_EVENT_PREFIX, MonitorStart, OnlineMonitor, Subscribable,
    SubscriptionId,
};
use crate::usage::{self, USAGE_LOOKUP_FAILED};

/// Firmware to flash onto a device.
///
/// Flashing asks the cloud to install firmware it already knows by name;
/// no binary is uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashFirmware {
    /// The stock Tinker application.
    Tinker,
    /// A named application known to the cloud.
    App(String),
}

impl FlashFirmware {
    /// Returns the application name sent to the cloud.
    #[must_use]
    pub fn app_name(&self) -> &str {
        match self {
            Self::Tinker => "tinker",
            Self::App(name) => name,
        }
    }
}

impl std::fmt::Display for FlashFirmware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.app_name())
    }
}

// ============================================================================
// Mirror - Mutable device attributes
// ============================================================================

struct Mirror {
    state: DeviceState,
    status: DeviceStatus,
    flashing: bool,
    usage: f64,
}

impl Mirror {
    fn set_status(&mut self, status: DeviceStatus, changes: &mut Vec<DeviceChange>) {
        if self.status != status {
            self.status = status;
            changes.push(DeviceChange::Status(status));
        }
    }

    fn set_flashing(&mut self, flashing: bool, changes: &mut Vec<DeviceChange>) {
        if self.flashing != flashing {
            self.flashing = flashing;
            changes.push(DeviceChange::Flashing(flashing));
        }
    }

    fn set_usage(&mut self, usage: f64, changes: &mut Vec<DeviceChange>) {
        if (self.usage - usage).abs() > f64::EPSILON {
            self.usage = usage;
            changes.push(DeviceChange::Usage(usage));
        }
    }

    fn resolve_status(&mut self, changes: &mut Vec<DeviceChange>) {
        let status = state::resolve(
            self.flashing,
            self.state.is_online(),
            self.state.functions(),
        );
        self.set_status(status, changes);
    }
}

// ============================================================================
// Device
// ============================================================================

struct Inner<T: Transport, S: EventStream> {
    id: String,
    transport: T,
    events: Arc<S>,
    mirror: RwLock<Mirror>,
    operation: Mutex<()>,
    monitor: OnlineMonitor,
    callbacks: CallbackRegistry,
    status_tx: watch::Sender<DeviceStatus>,
}

/// Mirror of a single cloud device.
///
/// `Device` is cheap to clone; clones share the same state, listeners and
/// operation lock.
///
/// Use [`Device::builder`] to create one.
pub struct Device<T: Transport, S: EventStream> {
    inner: Arc<Inner<T, S>>,
}

impl<T: Transport, S: EventStream> Device<T, S> {
    /// Starts building a device that talks to the cloud through `transport`
    /// and receives events from `events`.
    #[must_use]
    pub fn builder(transport: T, events: S) -> DeviceBuilder<T, S> {
        DeviceBuilder::new(transport, events)
    }

    pub(crate) fn new(transport: T, events: S, snapshot: DeviceState, status: DeviceStatus) -> Self {
        let (status_tx, _) = watch::channel(status);
        Self {
            inner: Arc::new(Inner {
                id: snapshot.id().to_string(),
                transport,
                events: Arc::new(events),
                mirror: RwLock::new(Mirror {
                    state: snapshot,
                    status,
                    flashing: false,
                    usage: 0.0,
                }),
                operation: Mutex::new(()),
                monitor: OnlineMonitor::new(),
                callbacks: CallbackRegistry::new(),
                status_tx,
            }),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the device id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Returns a copy of the last snapshot.
    #[must_use]
    pub fn state(&self) -> DeviceState {
        self.inner.mirror.read().state.clone()
    }

    /// Returns the derived status.
    #[must_use]
    pub fn status(&self) -> DeviceStatus {
        self.inner.mirror.read().status
    }

    /// Returns `true` while a flash is in progress.
    #[must_use]
    pub fn is_flashing(&self) -> bool {
        self.inner.mirror.read().flashing
    }

    /// Returns the cellular data usage in megabytes.
    ///
    /// `0.0` for devices without a cellular modem, and
    /// [`USAGE_LOOKUP_FAILED`] if the last lookup failed.
    #[must_use]
    pub fn usage(&self) -> f64 {
        self.inner.mirror.read().usage
    }

    /// Returns `true` while the device waits for its online event.
    ///
    /// The answer reflects the last completed subscribe or release; a
    /// concurrent [`start_flash`](Self::start_flash) or online event may
    /// change it right after.
    #[must_use]
    pub fn is_monitoring(&self) -> bool {
        self.inner.monitor.active().is_some()
    }

    /// Returns a receiver that tracks the derived status.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<DeviceStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Returns `true` if the device is online and runs the Tinker firmware.
    #[must_use]
    pub fn is_running_tinker(&self) -> bool {
        self.inner.mirror.read().state.is_running_tinker()
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Fetches the current snapshot from the cloud and reconciles it.
    ///
    /// Listeners see one [`DeviceChange::Field`] per changed field in table
    /// order, then the status change if any, then the usage change if any.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails, the response cannot be decoded,
    /// or the cloud answers for a different device. The mirror is left
    /// untouched in that case.
    pub async fn refresh(&self) -> Result<StateDiff, Error> {
        let _operation = self.inner.operation.lock().await;
        self.inner.refresh_locked().await
    }

    /// Asks the cloud to flash `firmware` onto the device.
    ///
    /// The device is marked as flashing before the request is sent. With
    /// `monitor` set, it stays flashing until the device publishes its
    /// online event; otherwise the flag clears once the cloud accepted the
    /// request.
    ///
    /// A second call while a monitor is active sends its flash request but
    /// keeps the existing monitor.
    ///
    /// # Errors
    ///
    /// Returns error if the monitor cannot subscribe or the cloud rejects
    /// the flash. After a rejected flash the status is
    /// [`DeviceStatus::Unknown`] until the next refresh.
    pub async fn start_flash(&self, firmware: FlashFirmware, monitor: bool) -> Result<(), Error> {
        let inner = &self.inner;
        let _operation = inner.operation.lock().await;

        tracing::info!(device_id = %inner.id, app = %firmware, monitor, "Starting flash");

        inner.update(|mirror, changes| {
            mirror.set_flashing(true, changes);
            mirror.resolve_status(changes);
        });

        let started = if monitor {
            match self.start_monitor().await {
                Ok(started) => Some(started),
                Err(err) => {
                    inner.update(|mirror, changes| {
                        mirror.set_flashing(false, changes);
                        mirror.resolve_status(changes);
                    });
                    return Err(err.into());
                }
            }
        } else {
            None
        };

        let body = RequestBody::field("app", firmware.app_name());
        match inner.transport.put(&inner.device_path(), body).await {
            Ok(_) => {
                if !monitor {
                    inner.update(|mirror, changes| {
                        mirror.set_flashing(false, changes);
                        mirror.resolve_status(changes);
                    });
                }
                Ok(())
            }
            Err(err) => {
                tracing::warn!(device_id = %inner.id, error = %err, "Flash request failed");
                if let Some(MonitorStart::Started(id)) = started {
                    inner.monitor.cancel_if(&*inner.events, id).await;
                }
                inner.update(|mirror, changes| {
                    mirror.set_flashing(false, changes);
                    mirror.set_status(DeviceStatus::Unknown, changes);
                });
                Err(err.into())
            }
        }
    }

    /// Stops waiting for the online event.
    ///
    /// Returns `Ok(false)` if no monitor was active. The flashing flag is
    /// left as it is.
    ///
    /// # Errors
    ///
    /// Returns error if the event stream refuses to unsubscribe.
    pub async fn cancel_monitoring(&self) -> Result<bool, Error> {
        Ok(self.inner.monitor.cancel(&*self.inner.events).await?)
    }

    /// Reconciles the mirror with an event published by the device.
    ///
    /// An online event consumes the active monitor: the subscription is
    /// released first, then the flashing flag clears, the status is
    /// re-derived and the snapshot is refreshed. Any other event, or an
    /// online event without an active monitor, changes nothing.
    ///
    /// Returns `true` if the event consumed the monitor.
    ///
    /// # Errors
    ///
    /// Returns error if the follow-up refresh fails.
    pub async fn handle_event(&self, event: CloudEvent) -> Result<bool, Error> {
        let inner = &self.inner;
        if event.device_id != inner.id {
            return Ok(false);
        }

        let _operation = inner.operation.lock().await;
        if !inner.monitor.consume(&*inner.events, &event).await {
            return Ok(false);
        }

        tracing::info!(device_id = %inner.id, "Device back online after flash");

        inner.update(|mirror, changes| {
            mirror.set_flashing(false, changes);
            mirror.resolve_status(changes);
        });
        inner.refresh_locked().await?;
        Ok(true)
    }

    async fn start_monitor(&self) -> Result<MonitorStart, ProtocolError> {
        let inner = &self.inner;
        let filter = EventFilter::prefix(MONITOR_EVENT_PREFIX).for_device(inner.id.clone());
        let weak = Arc::downgrade(inner);

        inner
            .monitor
            .start(&*inner.events, filter, move || {
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(reconcile_events(weak, rx));
                Arc::new(move |event: CloudEvent| {
                    if tx.send(event).is_err() {
                        tracing::trace!("Reconciliation task gone, event dropped");
                    }
                }) as EventCallback
            })
            .await
    }

    // ========================================================================
    // Best-effort operations
    // ========================================================================

    /// Calls a cloud function on the device and returns its result.
    ///
    /// # Errors
    ///
    /// Returns error only if the cloud rejected the credentials or the
    /// request. Any other failure yields `Ok(None)`.
    pub async fn run_function(&self, name: &str, argument: &str) -> Result<Option<i32>, Error> {
        let result = self.inner.call_function(name, argument).await;
        self.inner.collapse("run_function", result.map(Some), None)
    }

    /// Renames the device and refreshes the mirror.
    ///
    /// A failing refresh after a successful rename is logged; the rename
    /// still reports success.
    ///
    /// # Errors
    ///
    /// Returns error only if the cloud rejected the credentials or the
    /// request. Any other failure yields `Ok(false)`.
    pub async fn rename(&self, name: &str) -> Result<bool, Error> {
        let inner = &self.inner;
        let result = inner
            .transport
            .put(&inner.device_path(), RequestBody::field("name", name))
            .await
            .map_err(Error::from);
        if !inner.collapse("rename", result.map(|_| true), false)? {
            return Ok(false);
        }

        tracing::info!(device_id = %inner.id, name, "Device renamed");

        if let Err(err) = self.refresh().await {
            tracing::warn!(device_id = %inner.id, error = %err, "Refresh after rename failed");
        }
        Ok(true)
    }

    /// Moves the device into the given product groups.
    ///
    /// Returns `Ok(false)` without a request if the device does not belong
    /// to a product.
    ///
    /// # Errors
    ///
    /// Returns error only if the cloud rejected the credentials or the
    /// request. Any other failure yields `Ok(false)`.
    pub async fn set_group<G: AsRef<str>>(&self, groups: &[G]) -> Result<bool, Error> {
        let inner = &self.inner;
        let product_id = inner.mirror.read().state.product_id();
        let Some(product_id) = product_id else {
            tracing::debug!(device_id = %inner.id, "Device has no product, groups not set");
            return Ok(false);
        };

        let groups: Vec<&str> = groups.iter().map(AsRef::as_ref).collect();
        let path = format!(
            "/v1/products/{product_id}/devices/{}",
            urlencoding::encode(&inner.id)
        );
        let body = RequestBody::Json(serde_json::json!({ "groups": groups }));
        let result = inner.transport.put(&path, body).await.map_err(Error::from);
        inner.collapse("set_group", result.map(|_| true), false)
    }

    /// Turns the device's signaling LED pattern on or off.
    ///
    /// # Errors
    ///
    /// Returns error only if the cloud rejected the credentials or the
    /// request. Any other failure yields `Ok(false)`.
    pub async fn signal(&self, on: bool) -> Result<bool, Error> {
        let inner = &self.inner;
        let value = if on { "1" } else { "0" };
        let result = inner
            .transport
            .put(&inner.device_path(), RequestBody::field("signal", value))
            .await
            .map_err(Error::from);
        inner.collapse("signal", result.map(|_| true), false)
    }

    /// Removes the device from the account.
    ///
    /// # Errors
    ///
    /// Returns error only if the cloud rejected the credentials or the
    /// request. Any other failure yields `Ok(false)`.
    pub async fn unclaim(&self) -> Result<bool, Error> {
        let inner = &self.inner;
        let result = inner
            .transport
            .delete(&inner.device_path())
            .await
            .map_err(Error::from);
        inner.collapse("unclaim", result.map(|_| true), false)
    }

    /// Reads a cloud variable. Returns `None` on any failure.
    pub async fn get_variable(&self, name: &str) -> Option<Value> {
        let inner = &self.inner;
        let path = format!("{}/{}", inner.device_path(), urlencoding::encode(name));
        match inner.fetch_json(&path).await {
            Ok(mut document) => document.get_mut("result").map(Value::take),
            Err(err) => {
                tracing::warn!(device_id = %inner.id, variable = name, error = %err, "Variable lookup failed");
                None
            }
        }
    }

    /// Returns the last diagnostics report. Returns `None` on any failure.
    pub async fn vitals(&self) -> Option<Value> {
        let inner = &self.inner;
        let path = format!("/v1/diagnostics/{}/last", urlencoding::encode(&inner.id));
        match inner.fetch_json(&path).await {
            Ok(document) => Some(document),
            Err(err) => {
                tracing::warn!(device_id = %inner.id, error = %err, "Vitals lookup failed");
                None
            }
        }
    }
}

impl<T: Transport, S: EventStream> Inner<T, S> {
    fn device_path(&self) -> String {
        format!("/v1/devices/{}", urlencoding::encode(&self.id))
    }

    /// Mutates the mirror and announces the changes once the lock is gone.
    fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut Mirror, &mut Vec<DeviceChange>),
    {
        let mut changes = Vec::new();
        mutate(&mut *self.mirror.write(), &mut changes);
        self.announce(&changes);
    }

    fn announce(&self, changes: &[DeviceChange]) {
        let status = changes.iter().rev().find_map(|change| match change {
            DeviceChange::Status(status) => Some(*status),
            _ => None,
        });
        if let Some(status) = status {
            self.status_tx.send_replace(status);
        }
        self.callbacks.dispatch_all(changes);
    }

    async fn refresh_locked(&self) -> Result<StateDiff, Error> {
        let body = self.transport.get(&self.device_path()).await?;
        let fresh = DeviceState::from_json(&body)?;
        if fresh.id() != self.id {
            return Err(DeviceError::IdMismatch {
                expected: self.id.clone(),
                actual: fresh.id().to_string(),
            }
            .into());
        }

        let cellular = fresh.is_cellular();
        let iccid = fresh.iccid().map(str::to_string);

        let mut changes = Vec::new();
        let diff = {
            let mut mirror = self.mirror.write();
            let diff = state::diff(&mirror.state, &fresh);
            mirror.state = fresh;
            changes.extend(diff.changed.iter().copied().map(DeviceChange::Field));
            if diff.status_relevant || mirror.status == DeviceStatus::Unknown {
                mirror.resolve_status(&mut changes);
            }
            diff
        };
        self.announce(&changes);

        tracing::debug!(device_id = %self.id, changed = diff.changed.len(), "Snapshot refreshed");

        let usage = if cellular {
            self.lookup_usage(iccid.as_deref()).await
        } else {
            0.0
        };
        self.update(|mirror, changes| mirror.set_usage(usage, changes));

        Ok(diff)
    }

    async fn lookup_usage(&self, iccid: Option<&str>) -> f64 {
        let Some(iccid) = iccid else {
            tracing::warn!(device_id = %self.id, "Cellular device without ICCID");
            return USAGE_LOOKUP_FAILED;
        };
        match usage::fetch_usage(&self.transport, iccid).await {
            Ok(megabytes) => megabytes.max(0.0),
            Err(err) => {
                tracing::warn!(device_id = %self.id, error = %err, "Usage lookup failed");
                USAGE_LOOKUP_FAILED
            }
        }
    }

    async fn call_function(&self, name: &str, argument: &str) -> Result<i32, Error> {
        let path = format!("{}/{}", self.device_path(), urlencoding::encode(name));
        let body = self
            .transport
            .post(&path, RequestBody::field("arg", argument))
            .await?;
        Ok(parse_return_value(&body)?)
    }

    async fn fetch_json(&self, path: &str) -> Result<Value, Error> {
        let body = self.transport.get(path).await?;
        serde_json::from_str(&body).map_err(|err| ParseError::Json(err).into())
    }

    /// Keeps authorization and bad-request failures, turns every other
    /// failure into `fallback`.
    fn collapse<V>(&self, operation: &str, result: Result<V, Error>, fallback: V) -> Result<V, Error> {
        match result {
            Ok(value) => Ok(value),
            Err(err) if err.is_caller_facing() => Err(err),
            Err(err) => {
                tracing::warn!(device_id = %self.id, operation, error = %err, "Operation failed");
                Ok(fallback)
            }
        }
    }
}

impl<T: Transport, S: EventStream> Drop for Inner<T, S> {
    /// Releases a monitor the device was still waiting on.
    ///
    /// The unsubscribe runs on a spawned task; outside a Tokio runtime the
    /// handle cannot be released and the subscription is left to the
    /// stream.
    fn drop(&mut self) {
        let Some(id) = self.monitor.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(device_id = %self.id, subscription = %id, "Device dropped outside a runtime, online monitor leaked");
            return;
        };

        tracing::debug!(device_id = %self.id, subscription = %id, "Releasing online monitor of dropped device");
        let events = Arc::clone(&self.events);
        runtime.spawn(async move {
            if let Err(err) = events.unsubscribe(id).await {
                tracing::warn!(subscription = %id, error = %err, "Failed to release online monitor");
            }
        });
    }
}

fn parse_return_value(body: &str) -> Result<i32, ParseError> {
    let document: Value = serde_json::from_str(body)?;
    let value = document
        .get("return_value")
        .and_then(Value::as_i64)
        .ok_or_else(|| ParseError::MissingField("return_value".to_string()))?;
    i32::try_from(value)
        .map_err(|_| ParseError::UnexpectedFormat(format!("return value out of range: {value}")))
}

/// Feeds monitor events to the device until the monitor's callback is
/// dropped or the device is gone.
async fn reconcile_events<T: Transport, S: EventStream>(
    inner: Weak<Inner<T, S>>,
    mut events: mpsc::UnboundedReceiver<CloudEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let device = Device { inner };
        if let Err(err) = device.handle_event(event).await {
            tracing::warn!(device_id = %device.id(), error = %err, "Reconciliation after online event failed");
        }
    }
}

impl<T: Transport, S: EventStream> Clone for Device<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport, S: EventStream> std::fmt::Debug for Device<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mirror = self.inner.mirror.read();
        f.debug_struct("Device")
            .field("id", &self.inner.id)
            .field("status", &mirror.status)
            .field("flashing", &mirror.flashing)
            .field("usage", &mirror.usage)
            .finish_non_exhaustive()
    }
}

impl<T: Transport, S: EventStream> Subscribable for Device<T, S> {
    fn on_change<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&DeviceChange) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_change(callback)
    }

    fn on_field_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(StateField) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_field_changed(callback)
    }

    fn on_status_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(DeviceStatus) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_status_changed(callback)
    }

    fn on_flashing_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_flashing_changed(callback)
    }

    fn on_usage_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_usage_changed(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.callbacks.unsubscribe(id)
    }
}
