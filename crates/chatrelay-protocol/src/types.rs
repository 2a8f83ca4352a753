//! Packet shapes for the chat relay.
//!
//! Every type here is something that crosses the proxy: the chat, command
//! and acknowledgement packets a client sends, and the [`OutgoingPacket`]
//! wrapper the relay hands to the backend-bound transport.
//!
//! The exact binary layout belongs to the framing layer. These types only
//! carry the fields the chat pipeline reasons about.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

/// A client-supplied message timestamp, in milliseconds since the Unix epoch.
///
/// Newtype over `u64` so a timestamp can't be mixed up with a salt or an
/// offset. `#[serde(transparent)]` keeps it a bare number on the wire.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// The Unix epoch. Used before any message has been seen.
    pub const EPOCH: Self = Self(0);

    /// Returns the raw millisecond value.
    pub fn as_millis(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// An opaque message signature.
///
/// The relay never creates or checks signatures; it only decides whether
/// an existing one can travel with a forwarded packet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageSignature(pub Vec<u8>);

impl MessageSignature {
    /// Returns the signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// A signature over one argument of a signed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentSignature {
    /// The command argument this signature covers.
    pub name: String,
    /// The signature itself.
    pub signature: MessageSignature,
}

// ---------------------------------------------------------------------------
// LastSeenMessages
// ---------------------------------------------------------------------------

/// The "last seen" window a client attaches to chat and commands.
///
/// `acknowledged` lists the signatures of the messages the client
/// declares it has observed, oldest first. `offset` counts how many of
/// them are new since the client last acknowledged. The backend uses it
/// to prune its own copy of the chain.
///
/// The offset is not covered by any signature, so the relay may fold
/// held-back acknowledgements into it. The entries themselves are never
/// touched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LastSeenMessages {
    /// Number of new entries since the last acknowledgement.
    pub offset: u32,
    /// Signatures the client has seen, bounded by [`Self::WINDOW_SIZE`].
    pub acknowledged: Vec<MessageSignature>,
}

impl LastSeenMessages {
    /// Maximum number of entries a window may carry.
    pub const WINDOW_SIZE: usize = 20;

    /// Creates a window from its parts.
    pub fn new(offset: u32, acknowledged: Vec<MessageSignature>) -> Self {
        Self {
            offset,
            acknowledged,
        }
    }

    /// Returns a copy of this window with a different offset.
    pub fn with_offset(&self, offset: u32) -> Self {
        Self {
            offset,
            acknowledged: self.acknowledged.clone(),
        }
    }

    /// Checks the window against the protocol bound.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidMessage` if the client sent more
    /// entries than [`Self::WINDOW_SIZE`].
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.acknowledged.len() > Self::WINDOW_SIZE {
            return Err(ProtocolError::InvalidMessage(format!(
                "last-seen window has {} entries, maximum is {}",
                self.acknowledged.len(),
                Self::WINDOW_SIZE
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Packets
// ---------------------------------------------------------------------------

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPacket {
    /// The message text.
    pub message: String,
    /// When the client composed the message.
    pub timestamp: Timestamp,
    /// Random salt mixed into the signature.
    pub salt: u64,
    /// The client's signature, absent for unsigned (system) messages.
    pub signature: Option<MessageSignature>,
    /// The client's last-seen window, absent on legacy clients.
    pub last_seen: Option<LastSeenMessages>,
}

impl ChatPacket {
    /// Returns `true` if the packet carries a signature.
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

/// A command, sent without its leading slash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPacket {
    /// The command line, e.g. `"msg alice hi"`.
    pub command: String,
    /// When the client issued the command.
    pub timestamp: Timestamp,
    /// Random salt mixed into the argument signatures.
    pub salt: u64,
    /// Signatures over the signable arguments. Empty for unsigned commands.
    pub argument_signatures: Vec<ArgumentSignature>,
    /// The client's last-seen window, absent on legacy clients.
    pub last_seen: Option<LastSeenMessages>,
}

impl CommandPacket {
    /// Returns `true` if any argument of the command is signed.
    pub fn is_signed(&self) -> bool {
        !self.argument_signatures.is_empty()
    }
}

/// An acknowledgement-only packet: advances the chain by `offset`
/// without carrying any content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcknowledgementPacket {
    /// Number of newly seen messages being acknowledged.
    pub offset: u32,
}

/// Every chat-related packet that travels towards a server.
///
/// Clients send these to the proxy, and the proxy sends the same shapes on
/// to the backend. `#[serde(tag = "type")]` produces
/// `{ "type": "Chat", "message": ..., ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerboundPacket {
    Chat(ChatPacket),
    Command(CommandPacket),
    Acknowledgement(AcknowledgementPacket),
}

impl ServerboundPacket {
    /// The last-seen window this packet references, if any.
    ///
    /// Acknowledgement packets reference the chain through their offset
    /// alone and return `None` here.
    pub fn last_seen(&self) -> Option<&LastSeenMessages> {
        match self {
            Self::Chat(p) => p.last_seen.as_ref(),
            Self::Command(p) => p.last_seen.as_ref(),
            Self::Acknowledgement(_) => None,
        }
    }

    /// The acknowledgement offset this packet carries towards the backend.
    pub fn acknowledged_offset(&self) -> Option<u32> {
        match self {
            Self::Acknowledgement(ack) => Some(ack.offset),
            other => other.last_seen().map(|w| w.offset),
        }
    }
}

// ---------------------------------------------------------------------------
// OutgoingPacket
// ---------------------------------------------------------------------------

/// How the backend should treat a forwarded packet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
pub enum Route {
    /// Normal forwarding: the packet is the player's own input.
    #[default]
    Backend,
    /// An extension asked for the packet to be handled server-side
    /// instead of by the proxy (the "forward to server" result).
    Redirected,
}

/// A packet the relay has decided to send to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingPacket {
    /// The packet itself.
    pub packet: ServerboundPacket,
    /// Routing mark set by the extension verdict.
    pub route: Route,
}

impl OutgoingPacket {
    /// Wraps a packet for normal forwarding.
    pub fn forward(packet: ServerboundPacket) -> Self {
        Self {
            packet,
            route: Route::Backend,
        }
    }

    /// Wraps a packet with an explicit route.
    pub fn routed(packet: ServerboundPacket, route: Route) -> Self {
        Self { packet, route }
    }

    /// An acknowledgement-only packet.
    pub fn acknowledgement(offset: u32) -> Self {
        Self::forward(ServerboundPacket::Acknowledgement(
            AcknowledgementPacket { offset },
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
