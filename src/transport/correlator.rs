//! Request/response correlation.
//!
//! Tracks outstanding requests by [`RequestId`] and settles each one exactly
//! once: by a matching response, by its timeout, or by the loss of the
//! connection it was sent on.
//!
//! Removal from the pending table is the single settlement point. Whoever
//! removes an entry (the dispatcher, the timeout path, or a disconnect)
//! owns its completion; everyone else finds it gone and backs off.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, RequestIdCounter};
use crate::protocol::Response;

// ============================================================================
// Types
// ============================================================================

/// Receiving half of a pending entry.
pub type ResponseReceiver = oneshot::Receiver<Result<Value>>;

/// One outstanding request.
struct PendingEntry {
    /// Request kind, kept for diagnostics.
    kind: String,
    /// Generation of the connection the request was sent on.
    generation: u64,
    /// Completion channel.
    settle: oneshot::Sender<Result<Value>>,
}

/// Map of request IDs to pending entries.
type PendingTable = FxHashMap<RequestId, PendingEntry>;

// ============================================================================
// Correlator
// ============================================================================

/// Pending request table plus identifier allocation.
///
/// # Thread Safety
///
/// `Correlator` is `Send + Sync`. The table lock is never held across an
/// `.await`.
pub struct Correlator {
    /// Identifier source.
    ids: RequestIdCounter,
    /// Outstanding requests.
    pending: Mutex<PendingTable>,
}

impl Correlator {
    /// Creates an empty correlator whose first identifier is `1`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ids: RequestIdCounter::new(),
            pending: Mutex::new(PendingTable::default()),
        }
    }

    /// Allocates the next identifier and registers a pending entry for it.
    ///
    /// `generation` identifies the connection the request is about to be
    /// written to.
    pub fn register(&self, kind: &str, generation: u64) -> (RequestId, ResponseReceiver) {
        let id = self.ids.next_id();
        let (settle, response_rx) = oneshot::channel();

        let previous = self.pending.lock().insert(
            id,
            PendingEntry {
                kind: kind.to_string(),
                generation,
                settle,
            },
        );
        debug_assert!(previous.is_none(), "request id {id} issued twice");

        (id, response_rx)
    }

    /// Removes a pending entry without settling it.
    ///
    /// Returns `false` if the entry was already gone.
    pub fn cancel(&self, id: RequestId) -> bool {
        self.pending.lock().remove(&id).is_some()
    }

    /// Returns a guard that cancels `id` when dropped.
    ///
    /// Hold it while waiting so a caller that gives up early leaves no entry
    /// behind. Dropping it after settlement is a no-op.
    #[must_use]
    pub fn guard(&self, id: RequestId) -> PendingGuard<'_> {
        PendingGuard {
            correlator: self,
            id,
        }
    }

    /// Waits for the response to `id`, racing it against `request_timeout`.
    ///
    /// # Errors
    ///
    /// - [`Error::RequestTimeout`] if no response arrives in time
    /// - [`Error::Remote`] if the peer answered with an error
    /// - [`Error::ConnectionClosed`] if the entry was dropped unsettled
    pub async fn wait(
        &self,
        id: RequestId,
        kind: &str,
        mut response_rx: ResponseReceiver,
        request_timeout: Duration,
    ) -> Result<Value> {
        match timeout(request_timeout, &mut response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                let timeout_ms = request_timeout.as_millis() as u64;

                if self.cancel(id) {
                    debug!(%id, kind, timeout_ms, "Request timed out");
                    return Err(Error::request_timeout(kind, id, timeout_ms));
                }

                // Someone else removed the entry first and sends its result
                // right after releasing the lock.
                response_rx.await.unwrap_or(Err(Error::ConnectionClosed))
            }
        }
    }

    /// Handles one incoming text frame.
    ///
    /// Undecodable frames, frames without an id, and frames whose id has no
    /// pending entry are logged and dropped.
    pub fn dispatch(&self, text: &str) {
        let response = match Response::from_json(text) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, text = %text, "Failed to decode incoming frame");
                return;
            }
        };

        let Some(id) = response.id else {
            warn!(text = %text, "Dropping unsolicited frame");
            return;
        };

        let entry = self.pending.lock().remove(&id);

        match entry {
            Some(entry) => {
                debug!(%id, kind = %entry.kind, error = response.is_error(), "Response received");
                // Receiver gone means the caller stopped waiting.
                let _ = entry.settle.send(response.into_result());
            }
            None => {
                warn!(%id, "Response for unknown request");
            }
        }
    }

    /// Fails every entry sent on connection `generation` with
    /// [`Error::ConnectionClosed`].
    ///
    /// Returns the number of entries failed.
    pub fn fail_generation(&self, generation: u64) -> usize {
        let failed: Vec<PendingEntry> = {
            let mut pending = self.pending.lock();
            let ids: Vec<RequestId> = pending
                .iter()
                .filter(|(_, entry)| entry.generation == generation)
                .map(|(id, _)| *id)
                .collect();
            let mut failed = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(entry) = pending.remove(&id) {
                    failed.push(entry);
                }
            }
            failed
        };

        let count = failed.len();
        for entry in failed {
            let _ = entry.settle.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, generation, "Failed pending requests on disconnect");
        }

        count
    }

    /// Returns the number of pending requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// PendingGuard
// ============================================================================

/// Cancels one pending entry on drop.
pub struct PendingGuard<'a> {
    correlator: &'a Correlator,
    id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.correlator.cancel(self.id) {
            debug!(id = %self.id, "Request abandoned before settling");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::json;
    use tokio::sync::oneshot::error::TryRecvError;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_register_allocates_in_send_order() {
        let correlator = Correlator::new();
        let (first, _rx1) = correlator.register("a", 1);
        let (second, _rx2) = correlator.register("b", 1);

        assert_eq!(first, RequestId::new(1));
        assert_eq!(second, RequestId::new(2));
        assert_eq!(correlator.pending_count(), 2);
    }

    #[test]
    fn test_dispatch_resolves_payload() {
        let correlator = Correlator::new();
        let (id, mut rx) = correlator.register("getToken", 1);

        correlator.dispatch(&format!(r#"{{"id":{id},"payload":{{"token":"xyz"}}}}"#));

        let result = rx.try_recv().expect("settled");
        assert_eq!(result.expect("success"), json!({"token": "xyz"}));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn test_dispatch_rejects_with_remote_error() {
        let correlator = Correlator::new();
        let (id, mut rx) = correlator.register("getToken", 1);

        correlator.dispatch(&format!(r#"{{"id":{id},"error":"denied"}}"#));

        let err = rx.try_recv().expect("settled").expect_err("should fail");
        assert!(matches!(err, Error::Remote { ref message } if message == "denied"));
    }

    #[test]
    fn test_dispatch_drops_unmatched_frames() {
        let correlator = Correlator::new();
        let (_id, mut rx) = correlator.register("a", 1);

        correlator.dispatch("garbage");
        correlator.dispatch(r#"{"payload":"broadcast"}"#);
        correlator.dispatch(r#"{"id":99,"payload":1}"#);

        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(correlator.pending_count(), 1);
    }

    #[test]
    fn test_duplicate_response_is_dropped() {
        let correlator = Correlator::new();
        let (id, mut rx) = correlator.register("a", 1);

        correlator.dispatch(&format!(r#"{{"id":{id},"payload":1}}"#));
        correlator.dispatch(&format!(r#"{{"id":{id},"payload":2}}"#));

        assert_eq!(rx.try_recv().expect("settled").expect("success"), json!(1));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn test_fail_generation_only_touches_that_connection() {
        let correlator = Correlator::new();
        let (_old, mut old_rx) = correlator.register("a", 1);
        let (_new, mut new_rx) = correlator.register("b", 2);

        assert_eq!(correlator.fail_generation(1), 1);

        let err = old_rx.try_recv().expect("settled").expect_err("should fail");
        assert!(matches!(err, Error::ConnectionClosed));
        assert!(matches!(new_rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(correlator.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_wait_times_out_and_removes_entry() {
        let correlator = Correlator::new();
        let (id, rx) = correlator.register("slow", 1);

        let err = assert_err!(
            correlator
                .wait(id, "slow", rx, Duration::from_millis(20))
                .await
        );

        assert!(matches!(
            err,
            Error::RequestTimeout { ref kind, request_id, timeout_ms: 20 }
                if kind == "slow" && request_id == id
        ));
        assert_eq!(correlator.pending_count(), 0);

        // Late response finds nothing to settle.
        correlator.dispatch(&format!(r#"{{"id":{id},"payload":1}}"#));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_wait_returns_response() {
        let correlator = Correlator::new();
        let (id, rx) = correlator.register("fast", 1);
        correlator.dispatch(&format!(r#"{{"id":{id},"payload":"ok"}}"#));

        let value = assert_ok!(correlator.wait(id, "fast", rx, Duration::from_secs(1)).await);
        assert_eq!(value, json!("ok"));
    }

    #[tokio::test]
    async fn test_claimed_response_beats_timeout() {
        let correlator = Correlator::new();
        let (id, rx) = correlator.register("slow", 1);

        // Remove the entry as the dispatcher does, but settle only after the
        // timer has fired.
        let entry = correlator.pending.lock().remove(&id).expect("registered");
        let settler = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = entry.settle.send(Ok(json!("claimed")));
        });

        let value = assert_ok!(correlator.wait(id, "slow", rx, Duration::from_millis(10)).await);
        assert_eq!(value, json!("claimed"));
        settler.await.expect("settler");
    }

    #[test]
    fn test_guard_cancels_abandoned_entry() {
        let correlator = Correlator::new();
        let (id, rx) = correlator.register("silent", 1);

        drop(correlator.guard(id));

        assert_eq!(correlator.pending_count(), 0);
        drop(rx);
    }

    #[test]
    fn test_guard_after_settlement_is_noop() {
        let correlator = Correlator::new();
        let (id, mut rx) = correlator.register("a", 1);
        let (other, _other_rx) = correlator.register("b", 1);

        let guard = correlator.guard(id);
        correlator.dispatch(&format!(r#"{{"id":{id},"payload":1}}"#));
        drop(guard);

        assert_eq!(assert_ok!(rx.try_recv().expect("settled")), json!(1));
        assert_eq!(correlator.pending_count(), 1);
        assert!(correlator.cancel(other));
    }

    proptest! {
        #[test]
        fn prop_out_of_order_responses_reach_their_callers(
            order in Just((0..16usize).collect::<Vec<_>>()).prop_shuffle()
        ) {
            let correlator = Correlator::new();
            let mut receivers: Vec<_> = (0..16)
                .map(|_| correlator.register("echo", 1))
                .collect();

            for &index in &order {
                let id = receivers[index].0;
                correlator.dispatch(&format!(r#"{{"id":{id},"payload":{}}}"#, id.get() * 10));
            }

            for (id, rx) in receivers.iter_mut() {
                let value = rx.try_recv().expect("settled").expect("success");
                prop_assert_eq!(value, json!(id.get() * 10));
            }
            prop_assert_eq!(correlator.pending_count(), 0);
        }
    }
}
