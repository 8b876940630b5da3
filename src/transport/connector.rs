//! Transport instantiation.
//!
//! A [`Connector`] opens one WebSocket stream per call. The connection
//! manager calls it exactly once per connection attempt, so counting calls
//! counts transport instantiations.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;
use url::Url;

use crate::error::Result;

// ============================================================================
// Types
// ============================================================================

/// WebSocket stream produced by a [`Connector`].
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// Connector
// ============================================================================

/// Opens the WebSocket transport for a connection attempt.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Opens a WebSocket to `endpoint` and completes the handshake.
    ///
    /// # Errors
    ///
    /// Returns the transport's error; its text is surfaced verbatim to
    /// callers waiting on the attempt.
    async fn connect(&self, endpoint: &Url) -> Result<WsStream>;
}

// ============================================================================
// TungsteniteConnector
// ============================================================================

/// Default connector backed by [`tokio_tungstenite::connect_async`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, endpoint: &Url) -> Result<WsStream> {
        let (ws_stream, response) = connect_async(endpoint.as_str()).await?;
        debug!(%endpoint, status = %response.status(), "WebSocket handshake completed");
        Ok(ws_stream)
    }
}

// ============================================================================
// Tests
// ============================================================================
