//! Client module.
//!
//! This module provides the public entry point: one [`Client`] owns one
//! lazily opened WebSocket connection and multiplexes requests over it.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | Open, request, close |
//! | [`ClientBuilder`] | Fluent configuration builder |
//! | [`ClientConfig`] | Validated configuration |
//! | [`PendingPolicy`] | Fate of pending requests on disconnect |
//!
//! # Example
//!
//! ```no_run
//! use serde_json::json;
//! use tether_ws::{Client, Result};
//!
//! # async fn example() -> Result<()> {
//! let client = Client::builder()
//!     .endpoint("ws://127.0.0.1:8080/rpc")
//!     .build()?;
//!
//! let token = client.send_request("getToken", json!({"user": "a"})).await?;
//! println!("token: {token}");
//!
//! client.close();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for client configuration.
pub mod builder;

/// Validated client configuration.
pub mod config;

/// Core client implementation.
pub mod core;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ClientBuilder;
pub use config::{ClientConfig, PendingPolicy};
pub use core::Client;
