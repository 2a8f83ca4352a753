//! # chatrelay
//!
//! Order-preserving chat and command relay for proxies that sit in front
//! of a signed-chat backend.
//!
//! Every chat message and command a client sends is shown to the proxy's
//! extensions, which may allow, deny, rewrite or redirect it and may take
//! as long as they like. The relay forwards the outcome to the backend in
//! the order the client sent the packets, and keeps the client's signature
//! chain intact whatever the extensions decided.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatrelay::prelude::*;
//!
//! # async fn run() -> Result<(), RelayError> {
//! let relay = ChatRelay::builder()
//!     .config(RelayConfig::default())
//!     .build(PassThrough, PassThrough);
//!
//! let (sink, _to_backend) = ChannelSink::new();
//! let connection = relay.connect(ConnectionId::new(1), sink);
//! // connection.handle_packet(packet)?;
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod error;
mod relay;

pub use config::{DEFAULT_ILLEGAL_STATE_MESSAGE, MAX_DELAYED_ACK_FLOOR, RelayConfig};
pub use connection::{ChatConnection, CloseReason, DisconnectReason};
pub use error::RelayError;
pub use relay::{ChatRelay, ChatRelayBuilder};

pub use chatrelay_chain as chain;
pub use chatrelay_pipeline as pipeline;
pub use chatrelay_protocol as protocol;
pub use chatrelay_queue as queue;
pub use chatrelay_transport as transport;

/// Everything needed to run a relay and write extensions for it.
pub mod prelude {
    pub use crate::{
        ChatConnection, ChatRelay, CloseReason, DisconnectReason, RelayConfig,
        RelayError,
    };
    pub use chatrelay_pipeline::{
        ChatEvent, ChatEvents, CommandExecutor, EventResult, ExtensionError,
        MessageKind, PassThrough, ResolutionFailure, SigningMode,
    };
    pub use chatrelay_protocol::{
        ChatPacket, CommandPacket, LastSeenMessages, MessageSignature,
        OutgoingPacket, Route, ServerboundPacket, Timestamp,
    };
    pub use chatrelay_transport::{ChannelSink, ConnectionId, PacketSink};
}
