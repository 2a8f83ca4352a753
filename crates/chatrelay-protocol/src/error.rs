//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding or validating packets.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed input, missing fields or a
    /// truncated packet.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The packet decoded but breaks a protocol rule, e.g. a last-seen
    /// window larger than the protocol allows.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
