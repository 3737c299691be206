// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device snapshot as reported by the cloud.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ParseError;

use super::status::is_tinker_function_set;

/// Last known state of a cloud device.
///
/// A snapshot is produced by a single refresh and is never patched field by
/// field: the device façade swaps the whole value in one step. All fields
/// except the id and the boolean flags are optional, because the cloud may
/// omit them (or the snapshot may have been created from an id alone).
///
/// # Examples
///
/// ```
/// use particle_mirror::state::DeviceState;
///
/// let state = DeviceState::from_json(r#"{
///     "id": "e00fce68aa1b2c3d4e5f6a7b",
///     "name": "garage",
///     "online": true,
///     "functions": ["digitalread", "digitalwrite", "analogread", "analogwrite"]
/// }"#).unwrap();
///
/// assert_eq!(state.name(), Some("garage"));
/// assert!(state.is_online());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    /// Cloud device id; stable for the lifetime of the device.
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    last_app: Option<String>,
    #[serde(default)]
    last_ip_address: Option<String>,
    #[serde(default)]
    last_heard: Option<DateTime<Utc>>,
    #[serde(default)]
    product_id: Option<u32>,
    #[serde(default)]
    platform_id: Option<u32>,
    #[serde(default)]
    online: Option<bool>,
    /// Listing endpoints report connectivity under this name, sometimes
    /// next to `online`.
    #[serde(default, skip_serializing)]
    connected: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    cellular: bool,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    iccid: Option<String>,
    #[serde(default)]
    imei: Option<String>,
    #[serde(default)]
    system_firmware_version: Option<String>,
    /// Product firmware version.
    #[serde(default)]
    firmware_version: Option<u32>,
    #[serde(default)]
    current_build_target: Option<String>,
    #[serde(default)]
    default_build_target: Option<String>,
    /// Cloud variables, name to type.
    #[serde(default)]
    variables: Option<BTreeMap<String, String>>,
    /// Cloud functions in the order the firmware registered them.
    #[serde(default)]
    functions: Option<Vec<String>>,
    #[serde(default, deserialize_with = "null_as_default")]
    development: bool,
    #[serde(default)]
    serial_number: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    groups: Option<Vec<String>>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl DeviceState {
    /// Creates a snapshot that knows nothing but the device id.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            last_app: None,
            last_ip_address: None,
            last_heard: None,
            product_id: None,
            platform_id: None,
            online: None,
            connected: None,
            cellular: false,
            status: None,
            iccid: None,
            imei: None,
            system_firmware_version: None,
            firmware_version: None,
            current_build_target: None,
            default_build_target: None,
            variables: None,
            functions: None,
            development: false,
            serial_number: None,
            notes: None,
            groups: None,
        }
    }

    /// Decodes a snapshot from a device info response body.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Json`] if the body is not valid JSON, lacks the
    /// device id, or carries a field with the wrong type.
    pub fn from_json(body: &str) -> Result<Self, ParseError> {
        serde_json::from_str(body).map_err(ParseError::Json)
    }

    /// Decodes a snapshot from an already parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Json`] under the same conditions as
    /// [`from_json`](Self::from_json).
    pub fn from_value(value: serde_json::Value) -> Result<Self, ParseError> {
        serde_json::from_value(value).map_err(ParseError::Json)
    }

    // ========== Identity ==========

    /// Returns the cloud device id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the device name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the serial number.
    #[must_use]
    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.as_deref()
    }

    /// Returns the free-form notes attached to the device.
    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Returns the product groups the device belongs to.
    #[must_use]
    pub fn groups(&self) -> Option<&[String]> {
        self.groups.as_deref()
    }

    // ========== Connectivity ==========

    /// Returns `true` if the cloud reports the device as connected.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.or(self.connected).unwrap_or(false)
    }

    /// Returns `true` for cellular devices.
    #[must_use]
    pub fn is_cellular(&self) -> bool {
        self.cellular
    }

    /// Returns the cloud status string (e.g. `"normal"`).
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Returns the name of the last application that ran on the device.
    #[must_use]
    pub fn last_app(&self) -> Option<&str> {
        self.last_app.as_deref()
    }

    /// Returns the public IP address the device last connected from.
    #[must_use]
    pub fn last_ip_address(&self) -> Option<&str> {
        self.last_ip_address.as_deref()
    }

    /// Returns when the cloud last heard from the device.
    #[must_use]
    pub fn last_heard(&self) -> Option<DateTime<Utc>> {
        self.last_heard
    }

    /// Returns the SIM card ICCID.
    #[must_use]
    pub fn iccid(&self) -> Option<&str> {
        self.iccid.as_deref()
    }

    /// Returns the modem IMEI.
    #[must_use]
    pub fn imei(&self) -> Option<&str> {
        self.imei.as_deref()
    }

    // ========== Platform & Firmware ==========

    /// Returns the product id.
    #[must_use]
    pub fn product_id(&self) -> Option<u32> {
        self.product_id
    }

    /// Returns the hardware platform id.
    #[must_use]
    pub fn platform_id(&self) -> Option<u32> {
        self.platform_id
    }

    /// Returns the Device OS version.
    #[must_use]
    pub fn system_firmware_version(&self) -> Option<&str> {
        self.system_firmware_version.as_deref()
    }

    /// Returns the product firmware version.
    #[must_use]
    pub fn firmware_version(&self) -> Option<u32> {
        self.firmware_version
    }

    /// Returns the build target the running firmware was compiled for.
    #[must_use]
    pub fn current_build_target(&self) -> Option<&str> {
        self.current_build_target.as_deref()
    }

    /// Returns the default build target for the platform.
    #[must_use]
    pub fn default_build_target(&self) -> Option<&str> {
        self.default_build_target.as_deref()
    }

    /// Returns `true` if the device is marked as a development device.
    #[must_use]
    pub fn is_development(&self) -> bool {
        self.development
    }

    // ========== Cloud API ==========

    /// Returns the exposed cloud variables (name to type).
    #[must_use]
    pub fn variables(&self) -> Option<&BTreeMap<String, String>> {
        self.variables.as_ref()
    }

    /// Returns the exposed cloud functions.
    #[must_use]
    pub fn functions(&self) -> Option<&[String]> {
        self.functions.as_deref()
    }

    /// Returns `true` if the device is online and exposes the Tinker
    /// function set.
    #[must_use]
    pub fn is_running_tinker(&self) -> bool {
        self.is_online() && is_tinker_function_set(self.functions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_id_is_empty() {
        let state = DeviceState::with_id("abc123");
        assert_eq!(state.id(), "abc123");
        assert!(state.name().is_none());
        assert!(!state.is_online());
        assert!(!state.is_cellular());
        assert!(state.functions().is_none());
        assert!(state.variables().is_none());
    }

    #[test]
    fn decodes_full_device_payload() {
        let json = r#"{
            "id": "e00fce68aa1b2c3d4e5f6a7b",
            "name": "weather_station",
            "last_app": null,
            "last_ip_address": "203.0.113.7",
            "last_heard": "2024-05-02T09:14:31.000Z",
            "product_id": 12,
            "platform_id": 12,
            "online": true,
            "cellular": false,
            "status": "normal",
            "serial_number": "ARGHAB812ABCDEF",
            "system_firmware_version": "5.8.0",
            "current_build_target": "5.8.0",
            "default_build_target": "5.8.0",
            "firmware_version": 3,
            "variables": {"temperature": "double", "label": "string"},
            "functions": ["setLed", "reset"],
            "development": true,
            "notes": null,
            "groups": ["roof"]
        }"#;

        let state = DeviceState::from_json(json).unwrap();
        assert_eq!(state.id(), "e00fce68aa1b2c3d4e5f6a7b");
        assert_eq!(state.name(), Some("weather_station"));
        assert!(state.last_app().is_none());
        assert_eq!(state.last_ip_address(), Some("203.0.113.7"));
        assert!(state.last_heard().is_some());
        assert_eq!(state.platform_id(), Some(12));
        assert!(state.is_online());
        assert_eq!(state.firmware_version(), Some(3));
        assert_eq!(
            state.variables().unwrap().get("temperature").map(String::as_str),
            Some("double")
        );
        assert_eq!(state.functions().unwrap(), ["setLed", "reset"]);
        assert!(state.is_development());
        assert_eq!(state.groups().unwrap(), ["roof"]);
    }

    #[test]
    fn accepts_connected_alias() {
        let state = DeviceState::from_json(r#"{"id": "a", "connected": true}"#).unwrap();
        assert!(state.is_online());
    }

    #[test]
    fn accepts_online_and_connected_together() {
        let state =
            DeviceState::from_json(r#"{"id": "a", "connected": true, "online": true}"#).unwrap();
        assert!(state.is_online());

        let state =
            DeviceState::from_json(r#"{"id": "a", "connected": true, "online": false}"#).unwrap();
        assert!(!state.is_online());
    }

    #[test]
    fn null_flags_decode_as_false() {
        let state =
            DeviceState::from_json(r#"{"id": "a", "online": null, "development": null}"#).unwrap();
        assert!(!state.is_online());
        assert!(!state.is_development());
    }

    #[test]
    fn missing_id_is_rejected() {
        let result = DeviceState::from_json(r#"{"name": "orphan", "online": true}"#);
        assert!(matches!(result, Err(ParseError::Json(_))));
    }

    #[test]
    fn malformed_payload_is_rejected() {
        assert!(DeviceState::from_json("<html>").is_err());
        assert!(DeviceState::from_json(r#"{"id": "a", "functions": "nope"}"#).is_err());
    }

    #[test]
    fn running_tinker_requires_online() {
        let tinker = serde_json::json!([
            "digitalread",
            "digitalwrite",
            "analogread",
            "analogwrite"
        ]);
        let online = DeviceState::from_value(
            serde_json::json!({"id": "a", "online": true, "functions": tinker}),
        )
        .unwrap();
        let offline = DeviceState::from_value(
            serde_json::json!({"id": "a", "online": false, "functions": tinker}),
        )
        .unwrap();

        assert!(online.is_running_tinker());
        assert!(!offline.is_running_tinker());
    }
}
