//! WebSocket connection and event loop.
//!
//! This module owns one open WebSocket stream. The connection spawns a tokio
//! task that handles:
//!
//! - Incoming frames from the server (reported as [`TransportEvent::Message`])
//! - Outgoing frames from the client API
//! - Exactly one terminal event ([`TransportEvent::Error`] or
//!   [`TransportEvent::Close`]) when the stream ends
//!
//! All events go through a single [`EventSink`] registered at construction.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, warn};

use crate::error::{Error, Result};

use super::connector::WsStream;

// ============================================================================
// Types
// ============================================================================

/// Event sink called by the event loop.
///
/// Registered once per connection; receives every event in the order the
/// transport surfaces them.
pub type EventSink = Arc<dyn Fn(TransportEvent) + Send + Sync>;

// ============================================================================
// Fault
// ============================================================================

/// Why a connection attempt or an open connection failed.
///
/// Cloneable so one failed attempt can be reported to every waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The transport reported an error; text kept verbatim.
    Transport(String),
    /// The attempt did not open in time.
    TimedOut {
        /// Milliseconds waited.
        timeout_ms: u64,
    },
    /// The attempt was closed before it opened.
    Closed,
}

impl Fault {
    /// Builds a transport fault from a crate error, unwrapping WebSocket
    /// errors so the underlying text is kept as-is.
    #[must_use]
    pub fn from_error(err: Error) -> Self {
        match err {
            Error::WebSocket(e) => Self::Transport(e.to_string()),
            Error::Connection { message } => Self::Transport(message),
            other => Self::Transport(other.to_string()),
        }
    }

    /// Converts the fault into the error surfaced to callers.
    #[must_use]
    pub fn into_error(self) -> Error {
        match self {
            Self::Transport(message) => Error::connection(message),
            Self::TimedOut { timeout_ms } => Error::connection_timeout(timeout_ms),
            Self::Closed => Error::ConnectionClosed,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(message) => f.write_str(message),
            Self::TimedOut { timeout_ms } => write!(f, "timed out after {timeout_ms}ms"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

// ============================================================================
// TransportEvent
// ============================================================================

/// Lifecycle and traffic events of one transport.
#[derive(Debug)]
pub enum TransportEvent {
    /// Handshake completed; the connection is usable.
    Open(Connection),
    /// A text frame arrived.
    Message(String),
    /// The transport failed.
    Error(Fault),
    /// The transport closed without error.
    Close,
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Write one text frame and acknowledge the outcome.
    Send {
        frame: String,
        ack_tx: oneshot::Sender<Result<()>>,
    },
    /// Close the socket.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// Handle to an open WebSocket connection.
///
/// Cloning is cheap; all clones talk to the same event loop. The loop stops
/// on [`shutdown`](Self::shutdown), when the server closes, or when the last
/// clone is dropped.
#[derive(Clone)]
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Attempt number this connection belongs to.
    generation: u64,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("generation", &self.generation)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Connection {
    /// Creates a new connection from a WebSocket stream.
    ///
    /// Spawns the event loop task internally.
    pub(crate) fn new(ws_stream: WsStream, generation: u64, events: EventSink) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::run_event_loop(ws_stream, command_rx, generation, events));

        Self {
            command_tx,
            generation,
        }
    }

    /// Returns the attempt number this connection belongs to.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `true` while the event loop is running.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.command_tx.is_closed()
    }

    /// Writes one text frame.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the event loop has stopped
    /// - [`Error::Connection`] if the socket write fails
    pub async fn transmit(&self, frame: String) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();

        self.command_tx
            .send(ConnectionCommand::Send { frame, ack_tx })
            .map_err(|_| Error::ConnectionClosed)?;

        ack_rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Closes the connection.
    ///
    /// The event loop writes a close frame and then reports
    /// [`TransportEvent::Close`].
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop(
        ws_stream: WsStream,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        generation: u64,
        events: EventSink,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        let terminal = loop {
            tokio::select! {
                // Incoming frames from the server
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            events(TransportEvent::Message(text.as_str().to_owned()));
                        }

                        Some(Ok(Message::Close(frame))) => {
                            debug!(generation, ?frame, "WebSocket closed by remote");
                            break TransportEvent::Close;
                        }

                        Some(Err(e)) => {
                            error!(generation, error = %e, "WebSocket error");
                            break TransportEvent::Error(Fault::Transport(e.to_string()));
                        }

                        None => {
                            debug!(generation, "WebSocket stream ended");
                            break TransportEvent::Close;
                        }

                        Some(Ok(Message::Binary(data))) => {
                            warn!(generation, len = data.len(), "Ignoring binary frame");
                        }

                        // Ping/Pong handled by tungstenite
                        _ => {}
                    }
                }

                // Commands from the client API
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { frame, ack_tx }) => {
                            let outcome = ws_write
                                .send(Message::Text(frame.into()))
                                .await
                                .map_err(|e| Error::connection(e.to_string()));

                            if let Err(e) = &outcome {
                                warn!(generation, error = %e, "Failed to write frame");
                            }
                            let _ = ack_tx.send(outcome);
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!(generation, "Shutdown command received");
                            let _ = ws_write.close().await;
                            break TransportEvent::Close;
                        }

                        None => {
                            debug!(generation, "All connection handles dropped");
                            let _ = ws_write.close().await;
                            break TransportEvent::Close;
                        }
                    }
                }
            }
        };

        // Stop accepting commands before reporting, so `is_open` is already
        // false when the sink observes the terminal event.
        drop(command_rx);

        events(terminal);

        debug!(generation, "Event loop terminated");
    }
}

// ============================================================================
// Tests
// ============================================================================
