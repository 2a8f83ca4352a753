//! Error types for the pipeline layer.

use chatrelay_chain::ChainError;
use chatrelay_queue::{BoxError, SequenceNumber};
use chatrelay_transport::ConnectionId;

/// Errors raised by an extension hook.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    /// A chat or command event handler failed.
    #[error("event handler failed: {0}")]
    Handler(String),

    /// A command matched locally but its execution failed.
    #[error("command execution failed: {0}")]
    Execution(String),
}

/// Errors that stop one item from being resolved.
///
/// A resolution error never ends the connection. The item produces no
/// packet and is reported as a [`ResolutionFailure`].
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The extension layer failed.
    #[error(transparent)]
    Extension(#[from] ExtensionError),
}

/// Errors that end a connection's queue from inside the drain.
#[derive(Debug, thiserror::Error)]
pub enum DrainError {
    /// The signature chain would be corrupted by this item.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// The backend-bound sink rejected a packet.
    #[error("backend sink failed: {0}")]
    Sink(#[source] BoxError),
}

impl DrainError {
    /// Which side of the connection the error came from.
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::Chain(_) => FaultKind::Chain,
            Self::Sink(_) => FaultKind::Backend,
        }
    }
}

/// Classifies the error that ended a connection's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The client's signature chain can no longer be kept intact.
    Chain,
    /// The backend stopped accepting packets.
    Backend,
}

/// An item whose resolution failed. Sent to the relay's failure sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionFailure {
    /// Connection the item arrived on.
    pub connection: ConnectionId,
    /// Its position in the connection's queue.
    pub seq: SequenceNumber,
    /// What went wrong.
    pub reason: String,
}
