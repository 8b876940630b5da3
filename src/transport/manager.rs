//! Connection lifecycle management.
//!
//! The [`ConnectionManager`] owns the single transport handle and moves it
//! through `Closed → Connecting → Open → Closed`.
//!
//! # State Machine
//!
//! ```text
//!            ensure_open()             Open event
//!  Closed ──────────────────► Connecting ──────────► Open
//!    ▲                            │                    │
//!    │   Error event / close()    │                    │
//!    ├────────────────────────────┘                    │
//!    │   Close event / Error event / close()           │
//!    └─────────────────────────────────────────────────┘
//! ```
//!
//! Every attempt gets a new generation number. Events from a superseded
//! generation never touch the current handle, so a late close from an old
//! socket cannot tear down its replacement.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::result::Result as StdResult;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use crate::client::{ClientConfig, PendingPolicy};
use crate::error::Result;

use super::connection::{Connection, EventSink, Fault, TransportEvent};
use super::connector::Connector;
use super::correlator::Correlator;

// ============================================================================
// Types
// ============================================================================

/// Shared result of one connection attempt.
///
/// Every concurrent `ensure_open` caller awaits a clone of the same future.
type ConnectAttempt = Shared<BoxFuture<'static, StdResult<(), Fault>>>;

// ============================================================================
// ConnectionState
// ============================================================================

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No transport and no attempt in flight.
    Closed,
    /// An attempt is in flight.
    Connecting,
    /// The transport is open.
    Open,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::Connecting => f.write_str("connecting"),
            Self::Open => f.write_str("open"),
        }
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Mutable lifecycle record. Only touched under the manager's lock.
#[derive(Default)]
struct Lifecycle {
    /// Transport handle, set once open.
    handle: Option<Connection>,
    /// Current attempt, pending or resolved.
    attempt: Option<ConnectAttempt>,
    /// Completes `attempt`; present only while connecting.
    opener: Option<oneshot::Sender<StdResult<(), Fault>>>,
    /// Number of the current attempt.
    generation: u64,
}

impl Lifecycle {
    fn state(&self) -> ConnectionState {
        if self.handle.is_some() {
            ConnectionState::Open
        } else if self.attempt.is_some() {
            ConnectionState::Connecting
        } else {
            ConnectionState::Closed
        }
    }
}

// ============================================================================
// ManagerShared
// ============================================================================

/// State shared between the manager and its background tasks.
struct ManagerShared {
    /// Fixed server address.
    endpoint: Url,
    /// Transport factory.
    connector: Arc<dyn Connector>,
    /// Receives every incoming text frame.
    correlator: Arc<Correlator>,
    /// Upper bound on a single connection attempt.
    connect_timeout: Duration,
    /// What happens to pending requests when a connection is lost.
    pending_policy: PendingPolicy,
    /// Handle, attempt and generation.
    lifecycle: Mutex<Lifecycle>,
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Owns the single transport handle and its lifecycle.
///
/// # Thread Safety
///
/// `ConnectionManager` is `Send + Sync` and cheap to clone.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<ManagerShared>,
}

impl ConnectionManager {
    /// Creates a manager in the `Closed` state.
    ///
    /// No I/O happens until [`ensure_open`](Self::ensure_open).
    #[must_use]
    pub fn new(config: &ClientConfig, correlator: Arc<Correlator>) -> Self {
        Self {
            shared: Arc::new(ManagerShared {
                endpoint: config.endpoint.clone(),
                connector: Arc::clone(&config.connector),
                correlator,
                connect_timeout: config.connect_timeout,
                pending_policy: config.pending_policy,
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.lifecycle.lock().state()
    }

    /// Returns the open transport handle, if any.
    #[must_use]
    pub fn connection(&self) -> Option<Connection> {
        self.shared.lifecycle.lock().handle.clone()
    }

    /// Opens the connection if needed and waits until it is usable.
    ///
    /// Concurrent callers share one attempt; only one transport is ever
    /// instantiated per attempt. While open this returns immediately.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`](crate::Error::Connection) with the transport's
    ///   error text
    /// - [`Error::ConnectionTimeout`](crate::Error::ConnectionTimeout) if the
    ///   attempt exceeds the connect timeout
    /// - [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if
    ///   [`close`](Self::close) cancelled the attempt
    pub async fn ensure_open(&self) -> Result<()> {
        let attempt = {
            let mut lifecycle = self.shared.lifecycle.lock();

            if lifecycle.handle.as_ref().is_some_and(|handle| !handle.is_open()) {
                debug!(
                    generation = lifecycle.generation,
                    "Discarding dead transport handle"
                );
                lifecycle.handle = None;
                lifecycle.attempt = None;
            }

            match lifecycle.attempt.clone() {
                Some(attempt) => attempt,
                None => self.start_attempt(&mut lifecycle),
            }
        };

        attempt.await.map_err(Fault::into_error)
    }

    /// Closes the connection or cancels the attempt in flight.
    ///
    /// With nothing open this only logs.
    pub fn close(&self) {
        let (handle, opener, generation) = {
            let mut lifecycle = self.shared.lifecycle.lock();

            if lifecycle.state() == ConnectionState::Closed {
                drop(lifecycle);
                debug!("close() with no active connection");
                return;
            }

            let handle = lifecycle.handle.take();
            let opener = lifecycle.opener.take();
            lifecycle.attempt = None;
            let generation = lifecycle.generation;
            lifecycle.generation = generation.wrapping_add(1);
            (handle, opener, generation)
        };

        if let Some(opener) = opener {
            let _ = opener.send(Err(Fault::Closed));
        }
        if let Some(handle) = handle {
            handle.shutdown();
        }

        info!(endpoint = %self.shared.endpoint, generation, "Connection closed by client");
    }

    /// Starts a new attempt. Caller holds the lifecycle lock.
    fn start_attempt(&self, lifecycle: &mut Lifecycle) -> ConnectAttempt {
        lifecycle.generation = lifecycle.generation.wrapping_add(1);
        let generation = lifecycle.generation;

        let (opener, opened_rx) = oneshot::channel();
        let attempt = opened_rx
            .map(|outcome| outcome.unwrap_or(Err(Fault::Closed)))
            .boxed()
            .shared();

        lifecycle.attempt = Some(attempt.clone());
        lifecycle.opener = Some(opener);

        debug!(endpoint = %self.shared.endpoint, generation, "Connecting");

        tokio::spawn(ManagerShared::connect(Arc::clone(&self.shared), generation));

        attempt
    }
}

// ============================================================================
// ManagerShared - Event Handling
// ============================================================================

impl ManagerShared {
    /// Runs one connection attempt and reports its outcome as an event.
    async fn connect(shared: Arc<Self>, generation: u64) {
        let outcome = timeout(
            shared.connect_timeout,
            shared.connector.connect(&shared.endpoint),
        )
        .await;

        let event = match outcome {
            Ok(Ok(ws_stream)) => {
                let sink = Self::event_sink(Arc::downgrade(&shared), generation);
                TransportEvent::Open(Connection::new(ws_stream, generation, sink))
            }
            Ok(Err(e)) => TransportEvent::Error(Fault::from_error(e)),
            Err(_) => TransportEvent::Error(Fault::TimedOut {
                timeout_ms: shared.connect_timeout.as_millis() as u64,
            }),
        };

        shared.handle_event(generation, event);
    }

    /// Builds the event sink for a connection of `generation`.
    ///
    /// Holds the shared state weakly so a dropped client lets its event
    /// loop wind down.
    fn event_sink(shared: Weak<Self>, generation: u64) -> EventSink {
        Arc::new(move |event: TransportEvent| {
            if let Some(shared) = shared.upgrade() {
                shared.handle_event(generation, event);
            }
        })
    }

    /// Applies one transport event.
    fn handle_event(&self, generation: u64, event: TransportEvent) {
        match event {
            TransportEvent::Message(text) => self.correlator.dispatch(&text),
            TransportEvent::Open(connection) => self.opened(generation, connection),
            TransportEvent::Error(fault) => self.lost(generation, Some(fault)),
            TransportEvent::Close => self.lost(generation, None),
        }
    }

    /// Connecting → Open.
    fn opened(&self, generation: u64, connection: Connection) {
        let mut lifecycle = self.lifecycle.lock();

        if lifecycle.generation != generation || lifecycle.opener.is_none() {
            drop(lifecycle);
            debug!(generation, "Discarding connection opened after close");
            connection.shutdown();
            return;
        }

        lifecycle.handle = Some(connection);
        if let Some(opener) = lifecycle.opener.take() {
            let _ = opener.send(Ok(()));
        }
        drop(lifecycle);

        info!(endpoint = %self.endpoint, generation, "WebSocket connection open");
    }

    /// Connecting → Closed or Open → Closed.
    fn lost(&self, generation: u64, fault: Option<Fault>) {
        let previous = {
            let mut lifecycle = self.lifecycle.lock();

            if lifecycle.generation == generation {
                let previous = lifecycle.state();
                lifecycle.handle = None;
                lifecycle.attempt = None;
                if let Some(opener) = lifecycle.opener.take() {
                    let _ = opener.send(Err(fault.clone().unwrap_or(Fault::Closed)));
                }
                Some(previous)
            } else {
                None
            }
        };

        match (&previous, &fault) {
            (Some(ConnectionState::Connecting), Some(fault)) => {
                warn!(endpoint = %self.endpoint, generation, %fault, "Connection attempt failed");
            }
            (Some(_), Some(fault)) => {
                warn!(endpoint = %self.endpoint, generation, %fault, "Connection lost");
            }
            (Some(_), None) => {
                info!(endpoint = %self.endpoint, generation, "Connection closed");
            }
            (None, _) => {
                debug!(generation, "Ignoring event from superseded connection");
            }
        }

        if self.pending_policy == PendingPolicy::FailOnDisconnect {
            self.correlator.fail_generation(generation);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
