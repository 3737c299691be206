// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device builder.

use crate::device::Device;
use crate::error::{DeviceError, Error};
use crate::event::EventStream;
use crate::protocol::Transport;
use crate::state::{self, DeviceState};

/// Builder for [`Device`].
///
/// A device needs either its id or a snapshot that was already fetched
/// (for example from a device listing). Building never touches the
/// network; call [`Device::refresh`] to load the current state.
///
/// # Examples
///
/// ```no_run
/// use particle_mirror::{CloudClient, Device, DeviceState, EventBus};
///
/// # fn example() -> particle_mirror::Result<()> {
/// // From an id only
/// let device = Device::builder(CloudClient::new("token")?, EventBus::new())
///     .with_id("0123456789abcdef01234567")
///     .build()?;
///
/// // From a known snapshot
/// let snapshot = DeviceState::from_json(r#"{"id": "0123456789abcdef01234567", "online": true}"#)?;
/// let device = Device::builder(CloudClient::new("token")?, EventBus::new())
///     .with_snapshot(snapshot)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct DeviceBuilder<T, S> {
    transport: T,
    events: S,
    id: Option<String>,
    snapshot: Option<DeviceState>,
}

impl<T: Transport, S: EventStream> DeviceBuilder<T, S> {
    pub(crate) fn new(transport: T, events: S) -> Self {
        Self {
            transport,
            events,
            id: None,
            snapshot: None,
        }
    }

    /// Sets the device id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the initial snapshot.
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: DeviceState) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Returns the configured id, if any.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id
            .as_deref()
            .or_else(|| self.snapshot.as_ref().map(DeviceState::id))
    }

    /// Builds the device.
    ///
    /// The initial status is derived from the snapshot right away. A device
    /// built from an id alone has no online flag yet and starts as
    /// [`DeviceStatus::Offline`](crate::DeviceStatus::Offline).
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::InvalidConfiguration`] if neither an id nor a
    /// snapshot was given, or if the id is empty, and
    /// [`DeviceError::IdMismatch`] if both were given and disagree.
    pub fn build(self) -> Result<Device<T, S>, Error> {
        let snapshot = match (self.id, self.snapshot) {
            (None, None) => {
                return Err(DeviceError::InvalidConfiguration(
                    "device id or snapshot is required".to_string(),
                )
                .into());
            }
            (Some(id), None) => DeviceState::with_id(id),
            (None, Some(snapshot)) => snapshot,
            (Some(id), Some(snapshot)) => {
                if snapshot.id() != id {
                    return Err(DeviceError::IdMismatch {
                        expected: id,
                        actual: snapshot.id().to_string(),
                    }
                    .into());
                }
                snapshot
            }
        };

        if snapshot.id().trim().is_empty() {
            return Err(
                DeviceError::InvalidConfiguration("device id must not be empty".to_string()).into(),
            );
        }

        let status = state::resolve(false, snapshot.is_online(), snapshot.functions());

        Ok(Device::new(self.transport, self.events, snapshot, status))
    }
}

impl<T, S> std::fmt::Debug for DeviceBuilder<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBuilder")
            .field("id", &self.id)
            .field("has_snapshot", &self.snapshot.is_some())
            .finish_non_exhaustive()
    }
}
