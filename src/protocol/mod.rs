// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transport to the device cloud.
//!
//! The device façade talks to the cloud only through the [`Transport`]
//! trait: a request is a method, a path relative to the API root, and an
//! optional body; the response is the raw body text. Failures are reported
//! as [`ProtocolError`] so callers can tell authorization and bad-request
//! failures apart from everything else.
//!
//! # Implementations
//!
//! - [`CloudClient`]: HTTPS client for the cloud REST API (feature `http`)

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::{CloudClient, CloudConfig};

use std::fmt;
use std::future::Future;

use crate::error::ProtocolError;

/// HTTP method of a cloud request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

impl Method {
    /// Returns the method name in upper case.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a cloud request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// URL-encoded form fields, in order.
    Form(Vec<(String, String)>),
    /// A JSON document.
    Json(serde_json::Value),
}

impl RequestBody {
    /// Creates a form body with a single field.
    #[must_use]
    pub fn field(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Form(vec![(name.into(), value.into())])
    }

    /// Encodes the body and returns it with its content type.
    #[must_use]
    pub fn encode(&self) -> (&'static str, String) {
        match self {
            Self::Form(fields) => {
                let encoded = fields
                    .iter()
                    .map(|(name, value)| {
                        format!(
                            "{}={}",
                            urlencoding::encode(name),
                            urlencoding::encode(value)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("&");
                ("application/x-www-form-urlencoded", encoded)
            }
            Self::Json(value) => ("application/json", value.to_string()),
        }
    }
}

/// Request/response channel to the cloud API.
///
/// Implementations own authentication and timeouts. They must map an
/// authorization rejection to [`ProtocolError::Unauthorized`], a rejected
/// request to [`ProtocolError::BadRequest`] and a missing resource to
/// [`ProtocolError::NotFound`].
pub trait Transport: Send + Sync + 'static {
    /// Sends a request and returns the response body.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the request fails or the cloud rejects it.
    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<RequestBody>,
    ) -> impl Future<Output = Result<String, ProtocolError>> + Send;

    /// Sends a GET request.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    fn get(&self, path: &str) -> impl Future<Output = Result<String, ProtocolError>> + Send {
        self.request(Method::Get, path, None)
    }

    /// Sends a PUT request.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    fn put(
        &self,
        path: &str,
        body: RequestBody,
    ) -> impl Future<Output = Result<String, ProtocolError>> + Send {
        self.request(Method::Put, path, Some(body))
    }

    /// Sends a POST request.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    fn post(
        &self,
        path: &str,
        body: RequestBody,
    ) -> impl Future<Output = Result<String, ProtocolError>> + Send {
        self.request(Method::Post, path, Some(body))
    }

    /// Sends a DELETE request.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    fn delete(&self, path: &str) -> impl Future<Output = Result<String, ProtocolError>> + Send {
        self.request(Method::Delete, path, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_body_is_url_encoded() {
        let body = RequestBody::Form(vec![
            ("name".to_string(), "front door".to_string()),
            ("arg".to_string(), "a&b=c".to_string()),
        ]);
        let (content_type, encoded) = body.encode();
        assert_eq!(content_type, "application/x-www-form-urlencoded");
        assert_eq!(encoded, "name=front%20door&arg=a%26b%3Dc");
    }

    #[test]
    fn json_body_is_serialized() {
        let body = RequestBody::Json(serde_json::json!({"groups": ["roof"]}));
        let (content_type, encoded) = body.encode();
        assert_eq!(content_type, "application/json");
        assert_eq!(encoded, r#"{"groups":["roof"]}"#);
    }

    #[test]
    fn method_names() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Delete.as_str(), "DELETE");
    }
}
