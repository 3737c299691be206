// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Snapshot change detection.

use super::{DeviceState, StateField};

/// Result of comparing two snapshots of the same device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDiff {
    /// Fields whose value differs, in [`StateField::ALL`] order.
    pub changed: Vec<StateField>,
    /// `true` if any changed field feeds the derived status.
    pub status_relevant: bool,
}

impl StateDiff {
    /// Returns `true` if no field changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    /// Returns `true` if `field` is among the changed fields.
    #[must_use]
    pub fn contains(&self, field: StateField) -> bool {
        self.changed.contains(&field)
    }
}

/// Compares two snapshots field by field.
///
/// Both snapshots must describe the same device; comparing snapshots of
/// different devices is a caller error.
///
/// # Examples
///
/// ```
/// use particle_mirror::state::{diff, DeviceState, StateField};
///
/// let old = DeviceState::with_id("abc");
/// let new = DeviceState::from_json(r#"{"id": "abc", "online": true}"#).unwrap();
///
/// let report = diff(&old, &new);
/// assert_eq!(report.changed, [StateField::Online]);
/// assert!(report.status_relevant);
/// ```
#[must_use]
pub fn diff(old: &DeviceState, new: &DeviceState) -> StateDiff {
    debug_assert_eq!(old.id(), new.id(), "diff across different devices");

    let changed: Vec<StateField> = StateField::ALL
        .into_iter()
        .filter(|field| field.differs(old, new))
        .collect();
    let status_relevant = changed.iter().any(|field| field.is_status_relevant());

    StateDiff {
        changed,
        status_relevant,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn base() -> Value {
        json!({
            "id": "e00fce68aa1b2c3d4e5f6a7b",
            "name": "pump",
            "last_app": "irrigation",
            "last_ip_address": "198.51.100.4",
            "last_heard": "2024-05-02T09:14:31Z",
            "product_id": 10,
            "platform_id": 10,
            "online": true,
            "cellular": true,
            "status": "normal",
            "iccid": "8934076500002589174",
            "imei": "352753090000000",
            "system_firmware_version": "4.2.0",
            "firmware_version": 7,
            "current_build_target": "4.2.0",
            "default_build_target": "4.2.0",
            "variables": {"pressure": "double"},
            "functions": ["water"],
            "development": false,
            "serial_number": "E40RAB000000000",
            "notes": "north field",
            "groups": ["field"]
        })
    }

    fn altered(field: StateField) -> Value {
        match field {
            StateField::Name => json!("sprinkler"),
            StateField::LastApp => json!("tinker"),
            StateField::LastIpAddress => json!("198.51.100.5"),
            StateField::LastHeard => json!("2024-05-02T10:00:00Z"),
            StateField::ProductId | StateField::PlatformId | StateField::FirmwareVersion => {
                json!(13)
            }
            StateField::Online | StateField::Cellular => json!(false),
            StateField::Development => json!(true),
            StateField::Status => json!("flagged"),
            StateField::Iccid => json!("8934076500002589175"),
            StateField::Imei => json!("352753090000001"),
            StateField::SystemFirmwareVersion
            | StateField::CurrentBuildTarget
            | StateField::DefaultBuildTarget => json!("5.0.0"),
            StateField::Variables => json!({"pressure": "int32"}),
            StateField::Functions => json!(["water", "drain"]),
            StateField::SerialNumber => json!("E40RAB000000001"),
            StateField::Notes => Value::Null,
            StateField::Groups => json!(["field", "east"]),
        }
    }

    fn snapshot(value: Value) -> DeviceState {
        DeviceState::from_value(value).unwrap()
    }

    #[test]
    fn identical_snapshots_have_no_changes() {
        let report = diff(&snapshot(base()), &snapshot(base()));
        assert!(report.is_empty());
        assert!(!report.status_relevant);
    }

    #[test]
    fn single_field_change_is_reported_alone() {
        let old = snapshot(base());
        for field in StateField::ALL {
            let mut value = base();
            value[field.name()] = altered(field);
            let report = diff(&old, &snapshot(value));

            assert_eq!(report.changed, [field], "{field}");
            assert_eq!(
                report.status_relevant,
                matches!(field, StateField::Online | StateField::Functions),
                "{field}"
            );
        }
    }

    #[test]
    fn absent_differs_from_present() {
        let old = DeviceState::with_id("a");
        let new = snapshot(json!({"id": "a", "functions": [], "name": ""}));

        let report = diff(&old, &new);
        assert_eq!(report.changed, [StateField::Name, StateField::Functions]);
        assert!(report.status_relevant);
    }

    #[test]
    fn function_order_matters() {
        let old = snapshot(json!({"id": "a", "functions": ["a", "b"]}));
        let new = snapshot(json!({"id": "a", "functions": ["b", "a"]}));
        assert!(diff(&old, &new).contains(StateField::Functions));
    }

    #[test]
    fn changes_follow_table_order() {
        let old = snapshot(base());
        let mut value = base();
        value["groups"] = altered(StateField::Groups);
        value["online"] = altered(StateField::Online);
        value["name"] = altered(StateField::Name);

        let report = diff(&old, &snapshot(value));
        assert_eq!(
            report.changed,
            [StateField::Name, StateField::Online, StateField::Groups]
        );
    }

    #[test]
    fn diff_does_not_touch_inputs() {
        let old = snapshot(base());
        let mut value = base();
        value["name"] = altered(StateField::Name);
        let new = snapshot(value);
        let (old_copy, new_copy) = (old.clone(), new.clone());

        let _ = diff(&old, &new);
        assert_eq!(old, old_copy);
        assert_eq!(new, new_copy);
    }
}
