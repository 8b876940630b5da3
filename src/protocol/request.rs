//! Request and Response message types.
//!
//! Defines the frame format for correlated requests and their responses.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

// ============================================================================
// Request
// ============================================================================

/// A request frame from local end to remote end.
///
/// # Format
///
/// ```json
/// {
///   "id": 1,
///   "type": "getToken",
///   "payload": { ... }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    /// Identifier for request/response correlation.
    pub id: RequestId,

    /// Request kind.
    #[serde(rename = "type")]
    pub kind: String,

    /// Request body, passed through untouched.
    pub payload: Value,
}

impl Request {
    /// Creates a new request frame.
    #[inline]
    #[must_use]
    pub fn new(id: RequestId, kind: impl Into<String>, payload: Value) -> Self {
        Self {
            id,
            kind: kind.into(),
            payload,
        }
    }

    /// Encodes the frame as JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Response
// ============================================================================

/// A frame from remote end to local end.
///
/// # Format
///
/// Success:
/// ```json
/// { "id": 1, "payload": { ... } }
/// ```
///
/// Error:
/// ```json
/// { "id": 1, "error": "error message" }
/// ```
///
/// Frames without `id` are server pushes and never match a request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Response {
    /// Matches the request `id`, if any.
    #[serde(default)]
    pub id: Option<RequestId>,

    /// Result data (if success).
    #[serde(default)]
    pub payload: Option<Value>,

    /// Error message (if error).
    #[serde(default)]
    pub error: Option<String>,
}

impl Response {
    /// Decodes a frame from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the text is not a response envelope.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Returns `true` if the frame carries an `error` field.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Extracts the payload, or the peer's error.
    ///
    /// A success frame without `payload` yields [`Value::Null`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Remote`] carrying the `error` field verbatim.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(message) => Err(Error::remote(message)),
            None => Ok(self.payload.unwrap_or(Value::Null)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = Request::new(RequestId::new(1), "getToken", json!({"user": "a"}));
        let json = request.to_json().expect("serialize");

        assert_eq!(json, r#"{"id":1,"type":"getToken","payload":{"user":"a"}}"#);
    }

    #[test]
    fn test_request_null_payload() {
        let request = Request::new(RequestId::new(3), "ping", Value::Null);
        let json = request.to_json().expect("serialize");

        assert_eq!(json, r#"{"id":3,"type":"ping","payload":null}"#);
    }

    #[test]
    fn test_success_response() {
        let response = Response::from_json(r#"{"id": 1, "payload": {"token": "xyz"}}"#)
            .expect("parse");

        assert_eq!(response.id, Some(RequestId::new(1)));
        assert!(!response.is_error());
        assert_eq!(response.into_result().expect("success"), json!({"token": "xyz"}));
    }

    #[test]
    fn test_error_response() {
        let response =
            Response::from_json(r#"{"id": 2, "error": "user unknown"}"#).expect("parse");

        assert!(response.is_error());
        let err = response.into_result().expect_err("should fail");
        assert!(matches!(err, Error::Remote { ref message } if message == "user unknown"));
    }

    #[test]
    fn test_error_wins_over_payload() {
        let response = Response::from_json(r#"{"id": 2, "payload": 5, "error": "boom"}"#)
            .expect("parse");

        assert!(response.into_result().is_err());
    }

    #[test]
    fn test_missing_payload_is_null() {
        let response = Response::from_json(r#"{"id": 4}"#).expect("parse");
        assert_eq!(response.into_result().expect("success"), Value::Null);
    }

    #[test]
    fn test_push_without_id() {
        let response =
            Response::from_json(r#"{"payload": {"event": "tick"}}"#).expect("parse");
        assert_eq!(response.id, None);
    }

    #[test]
    fn test_invalid_frames_fail_to_decode() {
        assert!(Response::from_json("not json").is_err());
        assert!(Response::from_json(r#"[1, 2, 3]"#).is_err());
        assert!(Response::from_json(r#"{"id": "abc"}"#).is_err());
    }
}
