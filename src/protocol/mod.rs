//! WebSocket protocol message types.
//!
//! This module defines the frame format exchanged with the server.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Local → Remote | Correlated request |
//! | `Response` | Remote → Local | Reply to a request, or an unsolicited push |
//!
//! Every frame is one JSON object carried in a WebSocket text message.
//! Requests are tagged with a [`RequestId`](crate::RequestId); the server
//! echoes it back so replies can arrive in any order.

// ============================================================================
// Submodules
// ============================================================================

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use request::{Request, Response};
