//! The outcome of resolving one chat item.

/// What should happen to a chat message or command.
///
/// Produced by the [`VerdictResolver`](crate::VerdictResolver), consumed
/// by the [`PacketSynthesizer`](crate::PacketSynthesizer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Forward `content`. If it differs from what the client sent, the
    /// packet is rebuilt around it.
    Allow {
        /// The text to forward.
        content: String,
        /// The backend should handle the item rather than the proxy.
        redirect_to_backend: bool,
    },
    /// Drop the item. Its acknowledgements still reach the backend.
    Deny,
    /// Forward the client's packet as it was sent.
    Unchanged,
}

impl Verdict {
    /// Shorthand for a plain, non-redirected `Allow`.
    pub fn allow(content: impl Into<String>) -> Self {
        Self::Allow {
            content: content.into(),
            redirect_to_backend: false,
        }
    }
}
