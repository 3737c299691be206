// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Change notifications emitted by a device.
//!
//! Every mutation the device façade performs is announced as one
//! [`DeviceChange`], in the order the mutations happened:
//!
//! - [`DeviceChange::Field`] - one per snapshot field that changed on refresh
//! - [`DeviceChange::Status`] - the derived status was recomputed to a new value
//! - [`DeviceChange::Flashing`] - the flashing flag was set or cleared
//! - [`DeviceChange::Usage`] - the cellular usage accumulator changed
//!
//! # Examples
//!
//! ```
//! use particle_mirror::state::{DeviceChange, DeviceStatus, StateField};
//!
//! let change = DeviceChange::Field(StateField::Functions);
//! assert!(change.is_field());
//!
//! let change = DeviceChange::Status(DeviceStatus::Online);
//! assert!(change.is_status());
//! ```

use super::{DeviceStatus, StateField};

/// A single observed mutation of a device.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum DeviceChange {
    /// A snapshot field changed. Read the new value from the device.
    Field(StateField),

    /// The derived status changed.
    Status(DeviceStatus),

    /// The flashing flag changed.
    Flashing(bool),

    /// The cellular usage accumulator changed.
    ///
    /// `-1.0` means the usage lookup failed.
    Usage(f64),
}

impl DeviceChange {
    /// Returns `true` if this is a snapshot field change.
    #[must_use]
    pub fn is_field(&self) -> bool {
        matches!(self, Self::Field(_))
    }

    /// Returns `true` if this is a status change.
    #[must_use]
    pub fn is_status(&self) -> bool {
        matches!(self, Self::Status(_))
    }

    /// Returns `true` if this is a flashing flag change.
    #[must_use]
    pub fn is_flashing(&self) -> bool {
        matches!(self, Self::Flashing(_))
    }

    /// Returns `true` if this is a usage change.
    #[must_use]
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(DeviceChange::Field(StateField::Name).is_field());
        assert!(!DeviceChange::Field(StateField::Name).is_status());
        assert!(DeviceChange::Status(DeviceStatus::Offline).is_status());
        assert!(DeviceChange::Flashing(true).is_flashing());
        assert!(DeviceChange::Usage(-1.0).is_usage());
        assert!(!DeviceChange::Usage(0.0).is_field());
    }
}
