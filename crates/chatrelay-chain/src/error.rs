//! Error types for the chain layer.

/// Violations of signature-chain integrity.
///
/// Both variants are fatal for the connection: once the relay and the
/// client disagree about the chain, every later message would be rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// Something tried to move the acknowledged offset backwards.
    #[error("acknowledgement offset regressed from {current} to {requested}")]
    Regression {
        /// The offset already acknowledged.
        current: u64,
        /// The smaller offset that was requested.
        requested: u64,
    },

    /// An extension changed a message after its signature was final.
    #[error("illegal protocol state: {0}")]
    IllegalState(String),
}
