//! tether-ws - Lazily reconnecting WebSocket request client.
//!
//! This library multiplexes asynchronous request/response pairs over one
//! persistent WebSocket connection. The connection is opened on first use
//! and reopened on the next use after it is lost.
//!
//! # Architecture
//!
//! - **Connection Manager**: owns the single transport handle and its
//!   lifecycle (`Closed → Connecting → Open → Closed`); concurrent openers
//!   share one attempt
//! - **Correlator**: tags each request with a monotonically increasing id and
//!   settles it exactly once, by the matching response or by its timeout
//!
//! Responses may arrive in any order; correlation is by id only.
//!
//! # Quick Start
//!
//! ```no_run
//! use serde_json::json;
//! use tether_ws::{Client, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::builder()
//!         .endpoint("ws://127.0.0.1:8080/rpc")
//!         .build()?;
//!
//!     // Opens the connection, sends {"id":1,"type":"getToken","payload":{...}}
//!     let token = client.send_request("getToken", json!({"user": "a"})).await?;
//!     println!("token: {token}");
//!
//!     client.close();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`Client`], [`ClientBuilder`], configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | [`RequestId`] and its counter |
//! | [`protocol`] | Wire frames |
//! | [`transport`] | Connection lifecycle and correlation |

// ============================================================================
// Modules
// ============================================================================

/// Client entry point and configuration.
///
/// Use [`Client::builder()`] to create a configured client.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// WebSocket protocol message types.
///
/// Request and response envelopes.
pub mod protocol;

/// WebSocket transport layer.
///
/// Connection lifecycle, event loop, and request correlation.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{Client, ClientBuilder, ClientConfig, PendingPolicy};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{RequestId, RequestIdCounter};

// Transport types
pub use transport::{ConnectionState, Connector, TungsteniteConnector, WsStream};
