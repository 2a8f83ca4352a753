//! Per-connection packet routing and teardown.
//!
//! A [`ChatConnection`] is the relay's view of one client. The proxy hands
//! it every chat-related packet the client sends; it validates them,
//! starts their resolution and queues them in arrival order. The flow per
//! packet is:
//!   1. Chat / command → validate window → resolve via extensions → queue
//!   2. Acknowledgement → queue as is
//!   3. Drain (in order) → synthesize → send to the backend sink

use std::convert::Infallible;
use std::fmt;
use std::future;
use std::sync::Arc;

use chatrelay_pipeline::{
    ChatEvents, CommandExecutor, FaultHandle, FaultKind, InboundChatItem,
    Resolved, VerdictResolver,
};
use chatrelay_protocol::{
    ChatPacket, CommandPacket, ProtocolError, ServerboundPacket,
};
use chatrelay_queue::{QueueStatus, SequenceNumber, Sequencer};
use chatrelay_transport::ConnectionId;
use tokio::sync::mpsc;

use crate::RelayError;

/// Why the relay gave up on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// An extension broke the client's signature chain.
    IllegalProtocolState {
        /// Text to show the player.
        message: String,
        /// What went wrong, for the logs.
        cause: String,
    },
    /// The backend stopped accepting packets.
    BackendLost(String),
}

impl DisconnectReason {
    /// Text to show the player.
    pub fn message(&self) -> &str {
        match self {
            Self::IllegalProtocolState { message, .. } => message,
            Self::BackendLost(cause) => cause,
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IllegalProtocolState { cause, .. } => write!(f, "{cause}"),
            Self::BackendLost(cause) => write!(f, "backend lost: {cause}"),
        }
    }
}

/// How a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Closed by its owner; anything still in flight was discarded.
    Closed,
    /// Ended by the relay. The player should be disconnected.
    Terminated(DisconnectReason),
}

/// One client's chat pipeline.
///
/// Created by [`ChatRelay::connect`](crate::ChatRelay::connect). All
/// methods take `&self`, and packets from any task are ordered by the time
/// their `handle_*` call returns.
pub struct ChatConnection<E, X> {
    queue: Sequencer<Resolved>,
    resolver: VerdictResolver<E, X>,
    fault: FaultHandle,
    illegal_state_message: Arc<str>,
}

impl<E: ChatEvents, X: CommandExecutor> ChatConnection<E, X> {
    pub(crate) fn new(
        queue: Sequencer<Resolved>,
        resolver: VerdictResolver<E, X>,
        fault: FaultHandle,
        illegal_state_message: Arc<str>,
    ) -> Self {
        Self {
            queue,
            resolver,
            fault,
            illegal_state_message,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.queue.connection()
    }

    /// Routes one packet from the client.
    ///
    /// Returns the packet's place in the queue, or `None` if the
    /// connection has already ended and the packet was dropped.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidMessage` for an oversized last-seen
    /// window. Nothing is queued in that case.
    pub fn handle_packet(
        &self,
        packet: ServerboundPacket,
    ) -> Result<Option<SequenceNumber>, ProtocolError> {
        match packet {
            ServerboundPacket::Chat(chat) => self.handle_chat(chat),
            ServerboundPacket::Command(command) => self.handle_command(command),
            ServerboundPacket::Acknowledgement(ack) => {
                Ok(self.handle_acknowledgement(ack.offset))
            }
        }
    }

    /// Queues a chat message for resolution.
    ///
    /// # Errors
    /// See [`handle_packet`](Self::handle_packet).
    pub fn handle_chat(
        &self,
        packet: ChatPacket,
    ) -> Result<Option<SequenceNumber>, ProtocolError> {
        self.submit(InboundChatItem::Chat(packet))
    }

    /// Queues a command for resolution.
    ///
    /// # Errors
    /// See [`handle_packet`](Self::handle_packet).
    pub fn handle_command(
        &self,
        packet: CommandPacket,
    ) -> Result<Option<SequenceNumber>, ProtocolError> {
        self.submit(InboundChatItem::Command(packet))
    }

    /// Queues a standalone acknowledgement of `offset` messages.
    pub fn handle_acknowledgement(&self, offset: u32) -> Option<SequenceNumber> {
        self.queue
            .enqueue(future::ready(Ok::<_, Infallible>(Resolved::Acknowledgement(offset))))
    }

    /// Queues an unsigned chat message sent on the player's behalf.
    ///
    /// It reaches the backend after everything the client sent before
    /// this call.
    pub fn spoof_chat(&self, message: impl Into<String>) -> Option<SequenceNumber> {
        let message = message.into();
        self.queue
            .enqueue(future::ready(Ok::<_, Infallible>(Resolved::Spoofed(message))))
    }

    /// Tears the connection down. Items still being resolved are
    /// discarded. Idempotent.
    pub fn close(&self) {
        self.queue.close();
    }

    /// Returns `true` until the connection is closed or terminated.
    pub fn is_open(&self) -> bool {
        self.queue.status().is_running()
    }

    /// Items queued but not yet sent or dropped.
    pub fn in_flight(&self) -> u64 {
        self.queue.in_flight()
    }

    /// Waits until everything queued so far has been sent or dropped, or
    /// the connection ends.
    pub async fn settled(&self) {
        self.queue.settled().await;
    }

    /// Waits until the connection ends.
    pub async fn closed(&self) -> CloseReason {
        let status = self.queue.closed().await;
        self.close_reason(status)
    }

    /// Drives the connection from a stream of client packets.
    ///
    /// Returns when the client goes away (the channel closes), or when the
    /// relay terminates the connection. Either way, nothing queued is sent
    /// after this returns.
    ///
    /// # Errors
    /// Returns `RelayError::Protocol` if the client sends an invalid
    /// packet; the connection is closed first.
    pub async fn serve(
        self,
        mut inbound: mpsc::Receiver<ServerboundPacket>,
    ) -> Result<CloseReason, RelayError> {
        let connection = self.id();
        tracing::debug!(%connection, "serving connection");

        loop {
            let packet = tokio::select! {
                reason = self.closed() => {
                    tracing::info!(%connection, ?reason, "connection ended by relay");
                    return Ok(reason);
                }
                packet = inbound.recv() => packet,
            };

            let Some(packet) = packet else {
                tracing::info!(%connection, "client left");
                self.close();
                return Ok(CloseReason::Closed);
            };

            if let Err(e) = self.handle_packet(packet) {
                tracing::warn!(%connection, error = %e, "invalid packet, closing");
                self.close();
                return Err(e.into());
            }
        }
    }

    fn submit(
        &self,
        item: InboundChatItem,
    ) -> Result<Option<SequenceNumber>, ProtocolError> {
        item.validate()?;
        let item = Arc::new(item);
        let verdict = self.resolver.resolve(Arc::clone(&item));
        Ok(self.queue.enqueue(async move {
            verdict.await.map(|verdict| Resolved::Item { item, verdict })
        }))
    }

    fn close_reason(&self, status: QueueStatus) -> CloseReason {
        let QueueStatus::Faulted(cause) = status else {
            return CloseReason::Closed;
        };
        let reason = match self.fault.get() {
            Some(FaultKind::Backend) => DisconnectReason::BackendLost(cause),
            Some(FaultKind::Chain) | None => DisconnectReason::IllegalProtocolState {
                message: self.illegal_state_message.to_string(),
                cause,
            },
        };
        tracing::error!(connection = %self.id(), %reason, "connection terminated");
        CloseReason::Terminated(reason)
    }
}
