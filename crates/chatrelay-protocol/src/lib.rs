//! Wire shapes for the chat relay.
//!
//! This crate defines what the relay reads and writes:
//!
//! - **Types** ([`ChatPacket`], [`CommandPacket`], [`AcknowledgementPacket`],
//!   [`LastSeenMessages`], [`OutgoingPacket`]) — the chat-related packets
//!   and the acknowledgement window they carry.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those packets are
//!   turned into bytes for transports that need them.
//! - **Errors** ([`ProtocolError`]).
//!
//! The real binary framing of the game protocol lives outside this
//! workspace; the codec here exists for the WebSocket backend sink and
//! for tooling.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    AcknowledgementPacket, ArgumentSignature, ChatPacket, CommandPacket,
    LastSeenMessages, MessageSignature, OutgoingPacket, Route,
    ServerboundPacket, Timestamp,
};
