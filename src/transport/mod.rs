//! WebSocket transport layer.
//!
//! This module handles the single client connection and the correlation of
//! requests with responses over it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐                      ┌─────────────────┐
//! │  Client                  │                      │  Server         │
//! │                          │      WebSocket       │                 │
//! │  ConnectionManager       │◄────────────────────►│  {id,type,      │
//! │   → Connection (loop)    │   one connection     │   payload}      │
//! │  Correlator (id → tx)    │                      │                 │
//! └──────────────────────────┘                      └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `ConnectionManager::ensure_open` - start (or join) a connection attempt
//! 2. `Connector::connect` - open the WebSocket, once per attempt
//! 3. `Connection` - event loop writes requests and reports incoming frames
//! 4. `Correlator::dispatch` - settle the pending request with the frame's id
//! 5. Close or error - handle cleared; the next request reconnects
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection and event loop |
//! | `connector` | Transport instantiation seam |
//! | `correlator` | Pending request table |
//! | `manager` | Connection lifecycle state machine |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

/// Transport instantiation.
pub mod connector;

/// Request/response correlation.
pub mod correlator;

/// Connection lifecycle state machine.
pub mod manager;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, EventSink, Fault, TransportEvent};
pub use connector::{Connector, TungsteniteConnector, WsStream};
pub use correlator::{Correlator, PendingGuard};
pub use manager::{ConnectionManager, ConnectionState};
