// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `particle_mirror` - Local mirrors of Particle cloud devices.
//!
//! This library keeps an async, observable copy of a cloud device: the last
//! snapshot the cloud reported, a simplified status derived from it, and
//! the transient activities that span several round-trips, such as flashing
//! firmware and waiting for the device to come back online.
//!
//! # Supported Features
//!
//! - **Snapshot reconciliation**: field-level change detection on refresh
//! - **Derived status**: Unknown, Offline, Flashing, Online or Tinker
//! - **Flash monitoring**: one-shot wait for the `spark/status` online event
//! - **Cellular usage**: SIM data usage for cellular devices
//! - **Device operations**: functions, variables, rename, groups, signal, unclaim
//!
//! # Quick Start
//!
//! ```no_run
//! use particle_mirror::{CloudClient, Device, EventBus};
//! use particle_mirror::subscription::Subscribable;
//!
//! #[tokio::main]
//! async fn main() -> particle_mirror::Result<()> {
//!     let client = CloudClient::new("my-access-token")?;
//!     let device = Device::builder(client, EventBus::new())
//!         .with_id("0123456789abcdef01234567")
//!         .build()?;
//!
//!     device.on_field_changed(|field| println!("{field} changed"));
//!     device.on_status_changed(|status| println!("device is {status}"));
//!
//!     let diff = device.refresh().await?;
//!     println!("{} fields changed", diff.changed.len());
//!
//!     if let Some(value) = device.run_function("toggle", "on").await? {
//!         println!("toggle returned {value}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Custom Endpoint
//!
//! ```no_run
//! use std::time::Duration;
//! use particle_mirror::{CloudConfig, Device, EventBus};
//!
//! # fn example() -> particle_mirror::Result<()> {
//! let client = CloudConfig::new("my-access-token")
//!     .with_base_url("http://127.0.0.1:8080")
//!     .with_timeout(Duration::from_secs(5))
//!     .into_client()?;
//! let device = Device::builder(client, EventBus::new())
//!     .with_id("0123456789abcdef01234567")
//!     .build()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Events
//!
//! Cloud events reach the library through the [`event::EventStream`] trait.
//! [`EventBus`] is an in-process implementation: bridge the application's
//! own event source into it with [`EventBus::publish`].

mod device;
pub mod error;
pub mod event;
pub mod protocol;
pub mod state;
pub mod subscription;
pub mod usage;

pub use device::{Device, DeviceBuilder, FlashFirmware};
pub use error::{DeviceError, Error, ParseError, ProtocolError, Result};
pub use event::{CloudEvent, EventBus, EventFilter, EventStream, EventSubscriptionId};
#[cfg(feature = "http")]
pub use protocol::{CloudClient, CloudConfig};
pub use protocol::{Method, RequestBody, Transport};
pub use state::{DeviceChange, DeviceState, DeviceStatus, StateDiff, StateField};
pub use subscription::{CallbackRegistry, Subscribable, SubscriptionId};
