//! Correlated request client.
//!
//! The [`Client`] ties the connection manager to the request correlator:
//! every request lazily opens the connection, is tagged with a fresh
//! [`RequestId`](crate::RequestId), and waits for the response carrying that id.
//!
//! # Example
//!
//! ```no_run
//! use serde_json::json;
//! use tether_ws::Client;
//!
//! # async fn example() -> tether_ws::Result<()> {
//! let client = Client::builder()
//!     .endpoint("ws://127.0.0.1:8080/rpc")
//!     .build()?;
//!
//! // Sends {"id":1,"type":"getToken","payload":{"user":"a"}}
//! let payload = client.send_request("getToken", json!({"user": "a"})).await?;
//! assert_eq!(payload["token"], "xyz");
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::Request;
use crate::transport::{ConnectionManager, ConnectionState, Correlator};

use super::builder::ClientBuilder;
use super::config::ClientConfig;

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the client.
struct ClientInner {
    /// Validated configuration.
    config: ClientConfig,

    /// Transport lifecycle.
    manager: ConnectionManager,

    /// Pending requests and id allocation.
    correlator: Arc<Correlator>,
}

// ============================================================================
// Client
// ============================================================================

/// Lazily connecting WebSocket request client.
///
/// Cloning is cheap; clones share one connection and one pending table.
#[derive(Clone)]
pub struct Client {
    /// Shared inner state.
    inner: Arc<ClientInner>,
}

// ============================================================================
// Client - Display
// ============================================================================

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.inner.config.endpoint.as_str())
            .field("state", &self.state())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Client - Constructor
// ============================================================================

impl Client {
    /// Creates a configuration builder for the client.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client from a validated configuration.
    ///
    /// No I/O happens until the first [`open`](Self::open) or request.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let correlator = Arc::new(Correlator::new());
        let manager = ConnectionManager::new(&config, Arc::clone(&correlator));

        Self {
            inner: Arc::new(ClientInner {
                config,
                manager,
                correlator,
            }),
        }
    }
}

// ============================================================================
// Client - Public API
// ============================================================================

impl Client {
    /// Opens the connection, or waits for the attempt already in flight.
    ///
    /// Returns immediately when already open.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if the transport fails to open
    /// - [`Error::ConnectionTimeout`] if opening exceeds the connect timeout
    /// - [`Error::ConnectionClosed`] if [`close`](Self::close) cancelled it
    pub async fn open(&self) -> Result<()> {
        self.inner.manager.ensure_open().await
    }

    /// Sends one request and waits for its response, using the configured
    /// request timeout.
    ///
    /// # Arguments
    ///
    /// * `kind` - Request kind, sent as the frame's `type`
    /// * `payload` - Request body
    ///
    /// # Errors
    ///
    /// - Any error of [`open`](Self::open); no request is registered then
    /// - [`Error::NotConnected`] if no usable connection remains after opening
    /// - [`Error::RequestTimeout`] if no response arrives in time
    /// - [`Error::Remote`] if the server answered with an `error` field
    /// - [`Error::ConnectionClosed`] if the connection dropped first
    pub async fn send_request(&self, kind: &str, payload: impl Serialize) -> Result<Value> {
        self.send_request_with_timeout(kind, payload, self.inner.config.request_timeout)
            .await
    }

    /// Sends one request with a custom response timeout.
    ///
    /// # Errors
    ///
    /// Same as [`send_request`](Self::send_request).
    pub async fn send_request_with_timeout(
        &self,
        kind: &str,
        payload: impl Serialize,
        request_timeout: Duration,
    ) -> Result<Value> {
        let payload = serde_json::to_value(payload)?;

        self.inner.manager.ensure_open().await?;

        let connection = self
            .inner
            .manager
            .connection()
            .filter(|connection| connection.is_open())
            .ok_or(Error::NotConnected)?;

        let correlator = &self.inner.correlator;
        let (request_id, response_rx) = correlator.register(kind, connection.generation());
        let _guard = correlator.guard(request_id);

        let frame = Request::new(request_id, kind, payload).to_json()?;
        connection.transmit(frame).await?;

        trace!(%request_id, kind, "Request sent");

        correlator
            .wait(request_id, kind, response_rx, request_timeout)
            .await
    }

    /// Sends one request and deserializes the response payload.
    ///
    /// # Errors
    ///
    /// Same as [`send_request`](Self::send_request), plus [`Error::Json`] if
    /// the payload does not match `T`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        kind: &str,
        payload: impl Serialize,
    ) -> Result<T> {
        let value = self.send_request(kind, payload).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Closes the connection.
    ///
    /// Does nothing (besides logging) when no connection is open. The next
    /// request reconnects.
    pub fn close(&self) {
        self.inner.manager.close();
    }

    /// Returns the connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.manager.state()
    }

    /// Returns the number of requests awaiting a response.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.correlator.pending_count()
    }

    /// Returns the configured endpoint.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.inner.config.endpoint
    }

    /// Returns the configured request timeout.
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.inner.config.request_timeout
    }
}

// ============================================================================
// Tests
// ============================================================================
