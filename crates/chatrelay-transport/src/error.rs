use chatrelay_protocol::ProtocolError;

/// Errors that can occur while delivering packets to the backend.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The backend side of the sink is gone.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Writing a packet failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Connecting to the backend failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// The packet could not be encoded for the wire.
    #[error(transparent)]
    Encode(#[from] ProtocolError),
}
