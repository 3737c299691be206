// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Derived operational status.

use std::fmt;

/// Function names exposed by the stock Tinker firmware, lowercased.
pub const TINKER_FUNCTIONS: [&str; 4] = ["digitalread", "digitalwrite", "analogread", "analogwrite"];

/// Simplified operational status of a device.
///
/// Unlike the raw online flag, the status also reflects an in-flight
/// firmware flash and whether the device is running the stock Tinker
/// firmware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DeviceStatus {
    /// Status could not be determined (e.g. after a failed flash request).
    #[default]
    Unknown,
    /// The cloud reports the device as disconnected.
    Offline,
    /// A firmware flash is in progress.
    Flashing,
    /// The device is connected and runs custom firmware.
    Online,
    /// The device is connected and runs Tinker.
    Tinker,
}

impl DeviceStatus {
    /// Returns `true` for the two connected statuses.
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Online | Self::Tinker)
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unknown => "unknown",
            Self::Offline => "offline",
            Self::Flashing => "flashing",
            Self::Online => "online",
            Self::Tinker => "tinker",
        };
        f.write_str(label)
    }
}

/// Derives the status from the raw flags.
///
/// First match wins: flashing, then offline, then Tinker detection, and
/// finally online.
///
/// # Examples
///
/// ```
/// use particle_mirror::state::{resolve, DeviceStatus};
///
/// assert_eq!(resolve(true, false, None), DeviceStatus::Flashing);
/// assert_eq!(resolve(false, false, None), DeviceStatus::Offline);
/// assert_eq!(resolve(false, true, None), DeviceStatus::Online);
/// ```
#[must_use]
pub fn resolve(flashing: bool, online: bool, functions: Option<&[String]>) -> DeviceStatus {
    if flashing {
        DeviceStatus::Flashing
    } else if !online {
        DeviceStatus::Offline
    } else if is_tinker_function_set(functions) {
        DeviceStatus::Tinker
    } else {
        DeviceStatus::Online
    }
}

/// Returns `true` if `functions` contains every Tinker function name,
/// ignoring case. Lists shorter than the Tinker set never match.
#[must_use]
pub fn is_tinker_function_set(functions: Option<&[String]>) -> bool {
    let Some(functions) = functions else {
        return false;
    };
    if functions.len() < TINKER_FUNCTIONS.len() {
        return false;
    }
    TINKER_FUNCTIONS
        .iter()
        .all(|tinker| functions.iter().any(|f| f.eq_ignore_ascii_case(tinker)))
}
