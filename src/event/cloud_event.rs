// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cloud event types.

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// An event published through the cloud event stream.
///
/// # Examples
///
/// ```
/// use particle_mirror::event::CloudEvent;
///
/// let event = CloudEvent::new("spark/status", "online", "e00fce68aa1b2c3d4e5f6a7b");
/// assert_eq!(event.name, "spark/status");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CloudEvent {
    /// Event name, e.g. `spark/status`.
    pub name: String,
    /// Event payload.
    pub data: String,
    /// Id of the device that published the event.
    pub device_id: String,
    /// When the cloud received the event.
    pub published_at: DateTime<Utc>,
}

impl CloudEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        data: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            device_id: device_id.into(),
            published_at: Utc::now(),
        }
    }
}

/// Selects which events a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    /// Only events whose name starts with this prefix are delivered.
    pub name_prefix: String,
    /// When set, only events from this device are delivered.
    pub device_id: Option<String>,
}

impl EventFilter {
    /// Creates a filter for all devices.
    #[must_use]
    pub fn prefix(name_prefix: impl Into<String>) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            device_id: None,
        }
    }

    /// Restricts the filter to a single device.
    #[must_use]
    pub fn for_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Returns `true` if `event` passes the filter.
    #[must_use]
    pub fn matches(&self, event: &CloudEvent) -> bool {
        event.name.starts_with(&self.name_prefix)
            && self
                .device_id
                .as_deref()
                .is_none_or(|id| id == event.device_id)
    }
}

/// Handle returned by an event stream subscription.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventSubscriptionId(Uuid);

impl EventSubscriptionId {
    /// Creates a new unique handle.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID, e.g. one issued by a remote stream.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventSubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventSubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = &self.0.to_string()[..8];
        write!(f, "EventSubscriptionId({short}...)")
    }
}

impl fmt::Display for EventSubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
