// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cellular data usage.
//!
//! The cloud reports SIM usage as a list of per-day entries, each with a
//! running cumulative total. The device only keeps the largest cumulative
//! value; [`USAGE_LOOKUP_FAILED`] marks a failed lookup so that it cannot be
//! mistaken for a SIM without usage (`0.0`).

use serde::Deserialize;

use crate::error::{Error, ParseError};
use crate::protocol::Transport;

/// Usage value reported when the lookup failed.
pub const USAGE_LOOKUP_FAILED: f64 = -1.0;

/// Usage of a SIM card over one day, in megabytes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UsageEntry {
    /// Day the entry covers (`YYYY-MM-DD`).
    pub date: String,
    /// Megabytes used on that day.
    #[serde(default)]
    pub mbs_used: f64,
    /// Megabytes used since the start of the billing period.
    #[serde(default)]
    pub mbs_used_cumulative: f64,
}

#[derive(Debug, Deserialize)]
struct UsageResponse {
    usage_by_day: Vec<UsageEntry>,
}

/// Returns the largest reading, or `0.0` for an empty series.
///
/// # Examples
///
/// ```
/// use particle_mirror::usage::aggregate;
///
/// assert_eq!(aggregate(&[]), 0.0);
/// assert_eq!(aggregate(&[5.0, 12.3, 3.1]), 12.3);
/// ```
#[must_use]
pub fn aggregate(readings: &[f64]) -> f64 {
    readings.iter().copied().reduce(f64::max).unwrap_or(0.0)
}

/// Decodes a SIM data usage response body.
///
/// # Errors
///
/// Returns [`ParseError::Json`] if the body is not a usage document.
pub fn parse_usage_response(body: &str) -> Result<Vec<UsageEntry>, ParseError> {
    let response: UsageResponse = serde_json::from_str(body)?;
    Ok(response.usage_by_day)
}

/// Looks up the cumulative usage of a SIM card.
///
/// # Errors
///
/// Returns error if the request fails or the response cannot be decoded.
pub async fn fetch_usage<T: Transport>(transport: &T, iccid: &str) -> Result<f64, Error> {
    let path = format!("/v1/sims/{}/data_usage", urlencoding::encode(iccid));
    let body = transport.get(&path).await?;
    let entries = parse_usage_response(&body)?;
    let readings: Vec<f64> = entries.iter().map(|e| e.mbs_used_cumulative).collect();
    Ok(aggregate(&readings))
}
