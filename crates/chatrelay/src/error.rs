//! Unified error type for the chat relay.

use chatrelay_chain::ChainError;
use chatrelay_pipeline::ResolveError;
use chatrelay_protocol::ProtocolError;
use chatrelay_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impl, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A transport-level error (connect, send, closed connection).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid packet).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The signature chain was violated.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// An extension failed while resolving an item.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}
