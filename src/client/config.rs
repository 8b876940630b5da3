//! Client configuration.
//!
//! [`ClientConfig`] is produced by [`ClientBuilder`](super::ClientBuilder)
//! after validation; every field is already checked when a client sees it.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::transport::Connector;

// ============================================================================
// Constants
// ============================================================================

/// Default time a request waits for its response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time a connection attempt may take.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// PendingPolicy
// ============================================================================

/// What happens to requests still awaiting a response when their
/// connection is lost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PendingPolicy {
    /// Fail them at once with [`Error::ConnectionClosed`](crate::Error::ConnectionClosed).
    #[default]
    FailOnDisconnect,
    /// Leave them to their request timeout.
    AwaitTimeout,
}

// ============================================================================
// ClientConfig
// ============================================================================

/// Validated client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint (`ws://` or `wss://`).
    pub endpoint: Url,

    /// Time a request waits for its response.
    pub request_timeout: Duration,

    /// Time a connection attempt may take.
    pub connect_timeout: Duration,

    /// Fate of pending requests on disconnect.
    pub pending_policy: PendingPolicy,

    /// Transport factory.
    pub connector: Arc<dyn Connector>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("pending_policy", &self.pending_policy)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
