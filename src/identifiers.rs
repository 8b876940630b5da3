//! Type-safe identifiers.
//!
//! [`RequestId`] tags a request frame and its response frame.
//! [`RequestIdCounter`] hands them out in send order.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ============================================================================
// RequestId
// ============================================================================

/// Correlation identifier linking a request frame to its response frame.
///
/// Serialized as a bare JSON integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    /// Wraps a raw identifier.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RequestId {
    #[inline]
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ============================================================================
// RequestIdCounter
// ============================================================================

/// Monotonic source of request identifiers.
///
/// The first identifier is `1`. Identifiers are never reused within the
/// counter's lifetime; after `u64::MAX` the counter wraps back to `1`
/// (zero is never issued).
#[derive(Debug)]
pub struct RequestIdCounter {
    next: AtomicU64,
}

impl RequestIdCounter {
    /// Creates a counter whose first identifier is `1`.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates a counter whose first identifier is `first`.
    #[inline]
    #[must_use]
    pub(crate) const fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Allocates the next identifier.
    pub fn next_id(&self) -> RequestId {
        let previous = self
            .next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.checked_add(1).unwrap_or(1))
            })
            // fetch_update only fails when the closure returns None
            .unwrap_or_else(|current| current);

        RequestId(if previous == 0 { 1 } else { previous })
    }
}

impl Default for RequestIdCounter {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
