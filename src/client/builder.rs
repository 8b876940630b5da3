//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and creating [`Client`] instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tether_ws::{Client, PendingPolicy};
//!
//! # fn example() -> tether_ws::Result<()> {
//! let client = Client::builder()
//!     .endpoint("ws://127.0.0.1:8080/rpc")
//!     .request_timeout(Duration::from_secs(10))
//!     .pending_policy(PendingPolicy::AwaitTimeout)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::transport::{Connector, TungsteniteConnector};

use super::config::{
    ClientConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, PendingPolicy,
};
use super::core::Client;

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`Client`] instance.
///
/// Use [`Client::builder()`] to create a new builder.
#[derive(Clone)]
pub struct ClientBuilder {
    /// Raw endpoint, parsed on build.
    endpoint: Option<String>,
    /// Response wait per request.
    request_timeout: Duration,
    /// Connection attempt limit.
    connect_timeout: Duration,
    /// Pending request handling on disconnect.
    pending_policy: PendingPolicy,
    /// Custom transport factory.
    connector: Option<Arc<dyn Connector>>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("endpoint", &self.endpoint)
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("pending_policy", &self.pending_policy)
            .field("custom_connector", &self.connector.is_some())
            .finish()
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            endpoint: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            pending_policy: PendingPolicy::default(),
            connector: None,
        }
    }
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a new builder with default timeouts and no endpoint.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the WebSocket endpoint.
    ///
    /// # Arguments
    ///
    /// * `url` - `ws://` or `wss://` URL (e.g., "ws://127.0.0.1:8080/rpc")
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Sets how long a request waits for its response (default 30s).
    #[inline]
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets how long a connection attempt may take (default 30s).
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets what happens to pending requests when the connection drops.
    #[inline]
    #[must_use]
    pub fn pending_policy(mut self, policy: PendingPolicy) -> Self {
        self.pending_policy = policy;
        self
    }

    /// Replaces the transport factory.
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: impl Connector) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Builds the client with validation.
    ///
    /// No connection is opened; the first request does that.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the endpoint is missing, malformed, or not
    ///   `ws`/`wss`
    /// - [`Error::Config`] if a timeout is zero
    pub fn build(self) -> Result<Client> {
        Ok(Client::new(self.build_config()?))
    }

    /// Validates the settings into a [`ClientConfig`].
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub fn build_config(self) -> Result<ClientConfig> {
        let endpoint = self.validate_endpoint()?;
        self.validate_timeouts()?;

        Ok(ClientConfig {
            endpoint,
            request_timeout: self.request_timeout,
            connect_timeout: self.connect_timeout,
            pending_policy: self.pending_policy,
            connector: self
                .connector
                .unwrap_or_else(|| Arc::new(TungsteniteConnector)),
        })
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientBuilder {
    /// Validates the endpoint configuration.
    fn validate_endpoint(&self) -> Result<Url> {
        let raw = self.endpoint.as_deref().ok_or_else(|| {
            Error::config(
                "WebSocket endpoint is required. Use .endpoint() to set it.\n\
                 Example: Client::builder().endpoint(\"ws://127.0.0.1:8080/rpc\")",
            )
        })?;

        let url = Url::parse(raw)
            .map_err(|e| Error::config(format!("Invalid endpoint '{raw}': {e}")))?;

        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(Error::config(format!(
                    "Endpoint must use ws:// or wss://, got '{other}://'"
                )));
            }
        }

        if url.host_str().is_none() {
            return Err(Error::config(format!("Endpoint '{raw}' has no host")));
        }

        Ok(url)
    }

    /// Validates the timeout configuration.
    fn validate_timeouts(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            return Err(Error::config("request_timeout must be greater than zero"));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect_timeout must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
