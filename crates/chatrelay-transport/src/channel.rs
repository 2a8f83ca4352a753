//! In-process sink backed by an unbounded Tokio channel.

use chatrelay_protocol::OutgoingPacket;
use tokio::sync::mpsc;

use crate::{PacketSink, TransportError};

/// A [`PacketSink`] that pushes packets into an `mpsc` channel.
///
/// Channels are FIFO, so order is preserved. Useful when the backend
/// connection is driven by a separate writer task, and in tests.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<OutgoingPacket>,
}

impl ChannelSink {
    /// Creates a sink and the receiver that observes its packets.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutgoingPacket>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Wraps an existing sender.
    pub fn from_sender(tx: mpsc::UnboundedSender<OutgoingPacket>) -> Self {
        Self { tx }
    }
}

impl PacketSink for ChannelSink {
    type Error = TransportError;

    async fn send(&self, packet: OutgoingPacket) -> Result<(), Self::Error> {
        self.tx.send(packet).map_err(|_| {
            TransportError::ConnectionClosed("backend receiver dropped".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_preserves_order() {
        let (sink, mut rx) = ChannelSink::new();
        for offset in 1..=3 {
            sink.send(OutgoingPacket::acknowledgement(offset))
                .await
                .unwrap();
        }
        for offset in 1..=3 {
            assert_eq!(
                rx.recv().await,
                Some(OutgoingPacket::acknowledgement(offset))
            );
        }
    }

    #[tokio::test]
    async fn test_channel_sink_closed_receiver_errors() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        let err = sink
            .send(OutgoingPacket::acknowledgement(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed(_)));
    }
}
