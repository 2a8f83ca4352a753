//! Codec trait and the JSON implementation.
//!
//! The relay itself only ever handles typed packets
//! ([`ServerboundPacket`](crate::ServerboundPacket),
//! [`OutgoingPacket`](crate::OutgoingPacket)). Bytes appear only at the
//! edges: the WebSocket backend sink writes frames, and the demo reads
//! JSON lines from stdin. Both go through a [`Codec`], so the byte format
//! is a parameter of the edge and not of the pipeline.
//!
//! ```text
//!   stdin line ──decode──→ ServerboundPacket ──→ relay
//!   relay ──→ OutgoingPacket ──encode──→ WebSocket frame
//! ```
//!
//! [`JsonCodec`] is the only implementation shipped here. A proxy with a
//! real binary framing layer implements [`Codec`] for it and hands that to
//! `WebSocketSink::connect_with_codec`.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes packets to bytes and decodes them back.
///
/// ## Trait bounds
///
/// - `Send + Sync` → a sink holding the codec is shared by a connection's
///   drain task, which Tokio may run on any worker thread.
/// - `'static` → the codec owns everything it needs and outlives the
///   tasks it is moved into.
///
/// ## Generic methods
///
/// `encode` and `decode` are generic over the value, so one codec serves
/// every packet type:
/// - `encode<T: Serialize>` → any packet the relay sends
/// - `decode<T: DeserializeOwned>` → the result owns its data, so the
///   input buffer can be dropped right after decoding
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value can't be represented.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// Human-readable, which makes relay traffic easy to inspect while
/// debugging an extension.
///
/// ```rust
/// use chatrelay_protocol::{Codec, JsonCodec, OutgoingPacket};
///
/// let codec = JsonCodec;
/// let packet = OutgoingPacket::acknowledgement(3);
/// let bytes = codec.encode(&packet).unwrap();
/// let decoded: OutgoingPacket = codec.decode(&bytes).unwrap();
/// assert_eq!(packet, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
