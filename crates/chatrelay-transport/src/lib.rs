//! Backend-bound transport for the chat relay.
//!
//! The relay never writes to a socket itself. It hands each finished
//! [`OutgoingPacket`] to a [`PacketSink`], in the order packets must reach
//! the backend. Sinks are required to keep that order: serialized emission
//! upstream is only enough for wire-order correctness if the sink does not
//! reorder.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — [`WebSocketSink`] via `tokio-tungstenite`

mod channel;
mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use channel::ChannelSink;
pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketSink;

use std::fmt;
use std::future::Future;

use chatrelay_protocol::OutgoingPacket;

/// Opaque identifier for a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Receives packets bound for the backend server.
///
/// Implementations must deliver packets in the order `send` is called.
/// The relay awaits each `send` before starting the next one, so a sink
/// never sees two concurrent calls from the same connection.
///
/// ## Why `impl Future` instead of `async fn`?
///
/// An `async fn` in a public trait does not say whether its future is
/// `Send`. Writing the return type out as `impl Future + Send` makes that
/// a requirement on every implementation, so the drain task that awaits
/// it can be spawned on a multi-thread runtime. Implementations can still
/// write `async fn send(...)` as long as the body is `Send`.
///
/// ## Errors
///
/// A failed `send` ends the connection: the relay cannot tell which
/// packets the backend saw, so the signature chain is no longer in sync.
pub trait PacketSink: Send + Sync + 'static {
    /// The error type for failed sends.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one packet to the backend.
    fn send(
        &self,
        packet: OutgoingPacket,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
