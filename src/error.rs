// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `particle_mirror` library.
//!
//! The hierarchy separates transport failures ([`ProtocolError`]), payload
//! decoding failures ([`ParseError`]) and misuse of the device façade
//! ([`DeviceError`]). Callers that need to tell "fix the request" apart from
//! "try again later" should use [`Error::is_unauthorized`] and
//! [`Error::is_bad_request`].

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred while talking to the cloud.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while decoding a response payload.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error occurred in a device operation.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}

impl Error {
    /// Returns `true` if the cloud rejected the credentials.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Protocol(ProtocolError::Unauthorized))
    }

    /// Returns `true` if the cloud rejected the request itself.
    #[must_use]
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::Protocol(ProtocolError::BadRequest(_)))
    }

    /// Returns `true` if the requested resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Protocol(ProtocolError::NotFound(_)))
    }

    /// Returns `true` if this error must reach the caller of a best-effort
    /// operation instead of being collapsed into a failure result.
    #[must_use]
    pub(crate) fn is_caller_facing(&self) -> bool {
        matches!(self, Self::Protocol(err) if err.is_caller_facing())
    }
}

/// Errors related to transport communication.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// HTTP request failed.
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The access token was missing, expired or lacks permission.
    #[error("unauthorized")]
    Unauthorized,

    /// The cloud rejected the request as malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Connection to the cloud failed or returned an unexpected status.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Request timed out.
    #[error("request timed out after {0} ms")]
    Timeout(u64),
}

impl ProtocolError {
    /// Returns `true` for the failure kinds that callers must always see:
    /// authorization failures and rejected requests.
    #[must_use]
    pub fn is_caller_facing(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::BadRequest(_))
    }
}

/// Errors related to decoding cloud responses.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Expected field is missing from the response.
    #[error("missing field in response: {0}")]
    MissingField(String),

    /// Unexpected response format.
    #[error("unexpected response format: {0}")]
    UnexpectedFormat(String),
}

/// Errors related to device operations.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Device configuration is invalid.
    #[error("invalid device configuration: {0}")]
    InvalidConfiguration(String),

    /// The cloud answered with a snapshot for a different device.
    #[error("snapshot for device {actual} does not match device {expected}")]
    IdMismatch {
        /// The id of the mirrored device.
        expected: String,
        /// The id found in the response.
        actual: String,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_display() {
        let err = ProtocolError::BadRequest("invalid argument".to_string());
        assert_eq!(err.to_string(), "bad request: invalid argument");
    }

    #[test]
    fn caller_facing_kinds() {
        assert!(ProtocolError::Unauthorized.is_caller_facing());
        assert!(ProtocolError::BadRequest(String::new()).is_caller_facing());
        assert!(!ProtocolError::NotFound("/v1/devices/x".to_string()).is_caller_facing());
        assert!(!ProtocolError::Timeout(10_000).is_caller_facing());
    }

    #[test]
    fn error_classification() {
        let err: Error = ProtocolError::Unauthorized.into();
        assert!(err.is_unauthorized());
        assert!(err.is_caller_facing());
        assert!(!err.is_bad_request());

        let err: Error = ProtocolError::NotFound("/v1/devices/x".to_string()).into();
        assert!(err.is_not_found());
        assert!(!err.is_caller_facing());

        let err: Error = ParseError::MissingField("id".to_string()).into();
        assert!(!err.is_caller_facing());
    }

    #[test]
    fn device_error_display() {
        let err = DeviceError::IdMismatch {
            expected: "abc".to_string(),
            actual: "def".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "snapshot for device def does not match device abc"
        );
    }
}
