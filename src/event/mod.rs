// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cloud event stream.
//!
//! Devices publish named events (for example `spark/status` with payload
//! `online` when they reconnect). The library consumes them through the
//! [`EventStream`] trait; [`EventBus`] is an in-process implementation that
//! applications can feed from their own transport.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use particle_mirror::event::{CloudEvent, EventBus, EventFilter, EventStream};
//!
//! # async fn example() -> Result<(), particle_mirror::ProtocolError> {
//! let bus = EventBus::new();
//! let id = bus
//!     .subscribe(
//!         EventFilter::prefix("spark").for_device("abc"),
//!         Arc::new(|event: CloudEvent| println!("{} = {}", event.name, event.data)),
//!     )
//!     .await?;
//!
//! bus.publish(CloudEvent::new("spark/status", "online", "abc"));
//! bus.unsubscribe(id).await?;
//! # Ok(())
//! # }
//! ```

mod cloud_event;
mod event_bus;

use std::future::Future;
use std::sync::Arc;

pub use cloud_event::{CloudEvent, EventFilter, EventSubscriptionId};
pub use event_bus::EventBus;

use crate::error::ProtocolError;

/// Callback invoked for every delivered event.
///
/// Streams call it on their own execution context, so it must not block.
pub type EventCallback = Arc<dyn Fn(CloudEvent) + Send + Sync>;

/// Source of cloud events.
///
/// Events for a single device arrive in publication order; there is no
/// ordering guarantee across devices.
pub trait EventStream: Send + Sync + 'static {
    /// Starts delivering events that pass `filter` to `callback`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the subscription cannot be established.
    fn subscribe(
        &self,
        filter: EventFilter,
        callback: EventCallback,
    ) -> impl Future<Output = Result<EventSubscriptionId, ProtocolError>> + Send;

    /// Stops a subscription. The stream drops the callback.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the stream could not be told to stop.
    fn unsubscribe(
        &self,
        id: EventSubscriptionId,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;
}
