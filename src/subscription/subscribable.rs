// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscribable trait for types that emit change notifications.

use crate::state::{DeviceChange, DeviceStatus, StateField};
use crate::subscription::SubscriptionId;

/// Trait for types that notify listeners about changes.
///
/// Notifications are delivered synchronously, before the call that caused
/// them returns, and in the order the changes happened.
///
/// # Examples
///
/// ```no_run
/// use particle_mirror::{CloudClient, Device, EventBus};
/// use particle_mirror::subscription::Subscribable;
///
/// # async fn example() -> particle_mirror::Result<()> {
/// let device = Device::builder(CloudClient::new("token")?, EventBus::new())
///     .with_id("0123456789abcdef01234567")
///     .build()?;
///
/// let sub_id = device.on_status_changed(|status| {
///     println!("Device is now {status}");
/// });
///
/// device.on_field_changed(|field| {
///     println!("{field} changed");
/// });
///
/// device.refresh().await?;
/// device.unsubscribe(sub_id);
/// # Ok(())
/// # }
/// ```
pub trait Subscribable {
    /// Subscribes to every change notification.
    fn on_change<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&DeviceChange) + Send + Sync + 'static;

    /// Subscribes to snapshot field changes.
    ///
    /// The callback receives the field whose value changed.
    fn on_field_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(StateField) + Send + Sync + 'static;

    /// Subscribes to status changes.
    fn on_status_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(DeviceStatus) + Send + Sync + 'static;

    /// Subscribes to flashing flag changes.
    fn on_flashing_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static;

    /// Subscribes to data usage changes.
    ///
    /// A value of `-1.0` means the usage lookup failed.
    fn on_usage_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(f64) + Send + Sync + 'static;

    /// Unsubscribes a callback by its subscription ID.
    ///
    /// Returns `true` if the subscription was found and removed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}
