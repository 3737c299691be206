// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Comparable snapshot fields.
//!
//! [`StateField`] is the table the change detector walks. Every snapshot
//! attribute has exactly one entry, carrying its wire name, whether it feeds
//! the derived status, and how to compare it on two snapshots. Adding an
//! attribute to [`DeviceState`] means adding a variant here, an entry in
//! [`StateField::ALL`], and one comparison arm; nothing else changes.

use std::fmt;

use super::DeviceState;

/// A single comparable attribute of a [`DeviceState`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum StateField {
    Name,
    LastApp,
    LastIpAddress,
    LastHeard,
    ProductId,
    PlatformId,
    Online,
    Cellular,
    Status,
    Iccid,
    Imei,
    SystemFirmwareVersion,
    FirmwareVersion,
    CurrentBuildTarget,
    DefaultBuildTarget,
    Variables,
    Functions,
    Development,
    SerialNumber,
    Notes,
    Groups,
}

impl StateField {
    /// Every field, in notification order.
    pub const ALL: [StateField; 21] = [
        Self::Name,
        Self::LastApp,
        Self::LastIpAddress,
        Self::LastHeard,
        Self::ProductId,
        Self::PlatformId,
        Self::Online,
        Self::Cellular,
        Self::Status,
        Self::Iccid,
        Self::Imei,
        Self::SystemFirmwareVersion,
        Self::FirmwareVersion,
        Self::CurrentBuildTarget,
        Self::DefaultBuildTarget,
        Self::Variables,
        Self::Functions,
        Self::Development,
        Self::SerialNumber,
        Self::Notes,
        Self::Groups,
    ];

    /// Returns the field's name as it appears in the device payload.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::LastApp => "last_app",
            Self::LastIpAddress => "last_ip_address",
            Self::LastHeard => "last_heard",
            Self::ProductId => "product_id",
            Self::PlatformId => "platform_id",
            Self::Online => "online",
            Self::Cellular => "cellular",
            Self::Status => "status",
            Self::Iccid => "iccid",
            Self::Imei => "imei",
            Self::SystemFirmwareVersion => "system_firmware_version",
            Self::FirmwareVersion => "firmware_version",
            Self::CurrentBuildTarget => "current_build_target",
            Self::DefaultBuildTarget => "default_build_target",
            Self::Variables => "variables",
            Self::Functions => "functions",
            Self::Development => "development",
            Self::SerialNumber => "serial_number",
            Self::Notes => "notes",
            Self::Groups => "groups",
        }
    }

    /// Returns `true` if a change to this field can change the derived
    /// [`DeviceStatus`](super::DeviceStatus).
    #[must_use]
    pub fn is_status_relevant(self) -> bool {
        matches!(self, Self::Online | Self::Functions)
    }

    /// Returns `true` if the field holds different values on `old` and `new`.
    #[must_use]
    pub fn differs(self, old: &DeviceState, new: &DeviceState) -> bool {
        match self {
            Self::Name => old.name() != new.name(),
            Self::LastApp => old.last_app() != new.last_app(),
            Self::LastIpAddress => old.last_ip_address() != new.last_ip_address(),
            Self::LastHeard => old.last_heard() != new.last_heard(),
            Self::ProductId => old.product_id() != new.product_id(),
            Self::PlatformId => old.platform_id() != new.platform_id(),
            Self::Online => old.is_online() != new.is_online(),
            Self::Cellular => old.is_cellular() != new.is_cellular(),
            Self::Status => old.status() != new.status(),
            Self::Iccid => old.iccid() != new.iccid(),
            Self::Imei => old.imei() != new.imei(),
            Self::SystemFirmwareVersion => {
                old.system_firmware_version() != new.system_firmware_version()
            }
            Self::FirmwareVersion => old.firmware_version() != new.firmware_version(),
            Self::CurrentBuildTarget => old.current_build_target() != new.current_build_target(),
            Self::DefaultBuildTarget => old.default_build_target() != new.default_build_target(),
            Self::Variables => old.variables() != new.variables(),
            Self::Functions => old.functions() != new.functions(),
            Self::Development => old.is_development() != new.is_development(),
            Self::SerialNumber => old.serial_number() != new.serial_number(),
            Self::Notes => old.notes() != new.notes(),
            Self::Groups => old.groups() != new.groups(),
        }
    }
}

impl fmt::Display for StateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
