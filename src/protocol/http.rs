// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTPS transport for the cloud REST API.

use std::time::Duration;

use reqwest::{Client, StatusCode};

use crate::error::ProtocolError;
use crate::protocol::{Method, RequestBody, Transport};

// ============================================================================
// CloudConfig - Connection parameters
// ============================================================================

/// Configuration for the cloud API client.
///
/// # Examples
///
/// ```
/// use particle_mirror::protocol::CloudConfig;
/// use std::time::Duration;
///
/// // Public cloud with defaults
/// let config = CloudConfig::new("my-access-token");
///
/// // Self-hosted endpoint with a shorter timeout
/// let config = CloudConfig::new("my-access-token")
///     .with_base_url("http://127.0.0.1:8080")
///     .with_timeout(Duration::from_secs(5));
/// ```
#[derive(Clone)]
pub struct CloudConfig {
    base_url: String,
    access_token: String,
    timeout: Duration,
}

impl CloudConfig {
    /// Default API endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.particle.io";
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a configuration for the public cloud.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            access_token: access_token.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets a custom API endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the API endpoint.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Creates a `CloudClient` from this configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn into_client(self) -> Result<CloudClient, ProtocolError> {
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(ProtocolError::Http)?;

        Ok(CloudClient {
            base_url: self.base_url,
            access_token: self.access_token,
            timeout: self.timeout,
            client,
        })
    }
}

impl std::fmt::Debug for CloudConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// CloudClient - Transport implementation
// ============================================================================

/// HTTP client for the cloud REST API.
///
/// Every request carries the access token as a bearer token. Response
/// statuses are mapped onto [`ProtocolError`]:
///
/// | Status | Error |
/// |---|---|
/// | 401, 403 | [`ProtocolError::Unauthorized`] |
/// | 400 | [`ProtocolError::BadRequest`] (with the response body) |
/// | 404 | [`ProtocolError::NotFound`] (with the path) |
/// | other non-2xx | [`ProtocolError::ConnectionFailed`] |
///
/// # Examples
///
/// ```no_run
/// use particle_mirror::protocol::{CloudConfig, Transport};
///
/// # async fn example() -> particle_mirror::Result<()> {
/// let client = CloudConfig::new("my-access-token").into_client()?;
/// let body = client.get("/v1/devices").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CloudClient {
    base_url: String,
    access_token: String,
    timeout: Duration,
    client: Client,
}

impl CloudClient {
    /// Creates a client for the public cloud with default settings.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(access_token: impl Into<String>) -> Result<Self, ProtocolError> {
        CloudConfig::new(access_token).into_client()
    }

    /// Returns the API endpoint.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    fn map_send_error(&self, err: reqwest::Error) -> ProtocolError {
        if err.is_timeout() {
            ProtocolError::Timeout(u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX))
        } else {
            ProtocolError::Http(err)
        }
    }
}

impl std::fmt::Debug for CloudClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Transport for CloudClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<RequestBody>,
    ) -> Result<String, ProtocolError> {
        let url = self.build_url(path);

        tracing::debug!(%method, url = %url, "Sending cloud request");

        let mut request = match method {
            Method::Get => self.client.get(&url),
            Method::Put => self.client.put(&url),
            Method::Post => self.client.post(&url),
            Method::Delete => self.client.delete(&url),
        }
        .bearer_auth(&self.access_token);

        if let Some(body) = body {
            let (content_type, encoded) = body.encode();
            request = request
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(encoded);
        }

        let response = request
            .send()
            .await
            .map_err(|err| self.map_send_error(err))?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ProtocolError::Unauthorized);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ProtocolError::NotFound(path.to_string()));
        }
        if status == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            return Err(ProtocolError::BadRequest(body));
        }
        if !status.is_success() {
            return Err(ProtocolError::ConnectionFailed(format!(
                "HTTP {} - {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|err| self.map_send_error(err))?;

        tracing::debug!(status = status.as_u16(), bytes = body.len(), "Received cloud response");

        Ok(body)
    }
}
