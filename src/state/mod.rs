// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state model and reconciliation.
//!
//! This module provides the pieces the device façade composes on refresh:
//!
//! - [`DeviceState`] - an immutable snapshot of the cloud-reported attributes
//! - [`StateField`] - the table of comparable snapshot fields
//! - [`diff`] - compares two snapshots and reports the changed fields
//! - [`resolve`] - derives a [`DeviceStatus`] from the raw flags
//! - [`DeviceChange`] - the notifications sent to listeners
//!
//! # Examples
//!
//! ```
//! use particle_mirror::state::{diff, resolve, DeviceState, DeviceStatus, StateField};
//!
//! let old = DeviceState::from_json(r#"{
//!     "id": "abc",
//!     "online": true,
//!     "functions": ["digitalRead", "digitalWrite", "analogRead", "analogWrite"]
//! }"#).unwrap();
//! let new = DeviceState::from_json(r#"{
//!     "id": "abc",
//!     "online": true,
//!     "functions": ["customFn"]
//! }"#).unwrap();
//!
//! let report = diff(&old, &new);
//! assert_eq!(report.changed, [StateField::Functions]);
//! assert!(report.status_relevant);
//! assert_eq!(
//!     resolve(false, new.is_online(), new.functions()),
//!     DeviceStatus::Online
//! );
//! ```

mod device_state;
mod diff;
mod state_change;
mod state_field;
mod status;

pub use device_state::DeviceState;
pub use diff::{StateDiff, diff};
pub use state_change::DeviceChange;
pub use state_field::StateField;
pub use status::{DeviceStatus, TINKER_FUNCTIONS, is_tinker_function_set, resolve};
