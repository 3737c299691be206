// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscriptions in both directions.
//!
//! # Overview
//!
//! - [`SubscriptionId`] - Identifier of a change listener, used to unsubscribe
//! - [`CallbackRegistry`] - Registry that manages listeners and dispatches changes
//! - [`Subscribable`] - Trait for types that emit change notifications
//! - [`OnlineMonitor`] - One-shot cloud event subscription that waits for a
//!   device to come back online after a flash
//!
//! # Usage
//!
//! Listeners are registered through methods on the device:
//!
//! ```no_run
//! use particle_mirror::{CloudClient, Device, EventBus};
//! use particle_mirror::subscription::Subscribable;
//!
//! # async fn example() -> particle_mirror::Result<()> {
//! let device = Device::builder(CloudClient::new("token")?, EventBus::new())
//!     .with_id("0123456789abcdef01234567")
//!     .build()?;
//!
//! let sub_id = device.on_change(|change| println!("{change:?}"));
//!
//! // Later, unsubscribe
//! device.unsubscribe(sub_id);
//! # Ok(())
//! # }
//! ```

mod callback;
mod online_monitor;
mod subscribable;

pub use callback::{CallbackRegistry, SubscriptionId};
pub use online_monitor::{
    MONITOR_EVENT_PREFIX, MonitorStart, ONLINE_EVENT_DATA, ONLINE_EVENT_NAME, OnlineMonitor,
    is_online_event,
};
pub use subscribable::Subscribable;
