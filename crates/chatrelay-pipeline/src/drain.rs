//! The queue drain that turns resolved items into backend packets.

use std::sync::{Arc, OnceLock};

use chatrelay_chain::ChatState;
use chatrelay_protocol::OutgoingPacket;
use chatrelay_queue::{Drain, SequenceNumber, TaskFailure};
use chatrelay_transport::{ConnectionId, PacketSink};
use tokio::sync::mpsc;

use crate::{
    DrainError, FaultKind, InboundChatItem, PacketSynthesizer,
    ResolutionFailure, Verdict,
};

/// A unit of work that has finished its asynchronous part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// A chat message or command and the verdict on it.
    Item {
        item: Arc<InboundChatItem>,
        verdict: Verdict,
    },
    /// A standalone client acknowledgement of `count` messages.
    Acknowledgement(u32),
    /// A chat message the proxy sends on the player's behalf.
    Spoofed(String),
}

/// Read side of the fault a [`ChatDrain`] ended with.
///
/// Set at most once, before the queue reports itself faulted.
#[derive(Debug, Clone, Default)]
pub struct FaultHandle(Arc<OnceLock<FaultKind>>);

impl FaultHandle {
    /// The kind of error that faulted the queue, if one did.
    pub fn get(&self) -> Option<FaultKind> {
        self.0.get().copied()
    }
}

/// Owns a connection's [`ChatState`] and emits its packets.
///
/// Lives inside the connection's sequencer, which hands it one resolved
/// item at a time in arrival order.
pub struct ChatDrain<S> {
    connection: ConnectionId,
    synthesizer: PacketSynthesizer,
    state: ChatState,
    sink: Arc<S>,
    failures: Option<mpsc::UnboundedSender<ResolutionFailure>>,
    fault: FaultHandle,
}

impl<S: PacketSink> ChatDrain<S> {
    pub fn new(
        connection: ConnectionId,
        synthesizer: PacketSynthesizer,
        state: ChatState,
        sink: Arc<S>,
    ) -> Self {
        Self {
            connection,
            synthesizer,
            state,
            sink,
            failures: None,
            fault: FaultHandle::default(),
        }
    }

    /// A handle for finding out why the queue faulted.
    pub fn fault(&self) -> FaultHandle {
        self.fault.clone()
    }

    /// Reports failed resolutions to `failures` as well as the log.
    pub fn with_failure_sink(
        mut self,
        failures: mpsc::UnboundedSender<ResolutionFailure>,
    ) -> Self {
        self.failures = Some(failures);
        self
    }

    fn synthesize(
        &mut self,
        value: Resolved,
    ) -> Result<Option<OutgoingPacket>, DrainError> {
        let packet = match value {
            Resolved::Item { item, verdict } => {
                self.synthesizer.synthesize(verdict, &item, &mut self.state)?
            }
            Resolved::Acknowledgement(count) => self
                .synthesizer
                .synthesize_acknowledgement(count, &mut self.state)?,
            Resolved::Spoofed(message) => Some(
                self.synthesizer
                    .synthesize_spoofed(message, &mut self.state)?,
            ),
        };
        Ok(packet)
    }

    async fn emit(
        &mut self,
        seq: SequenceNumber,
        value: Resolved,
    ) -> Result<(), DrainError> {
        let Some(packet) = self.synthesize(value)? else {
            tracing::trace!(connection = %self.connection, %seq, "nothing to send");
            return Ok(());
        };

        tracing::debug!(
            connection = %self.connection,
            %seq,
            route = ?packet.route,
            "emitting packet"
        );
        self.sink
            .send(packet)
            .await
            .map_err(|e| DrainError::Sink(Box::new(e)))
    }
}

impl<S: PacketSink> Drain<Resolved> for ChatDrain<S> {
    type Error = DrainError;

    async fn on_resolved(
        &mut self,
        seq: SequenceNumber,
        value: Resolved,
    ) -> Result<(), DrainError> {
        let result = self.emit(seq, value).await;
        if let Err(e) = &result {
            let _ = self.fault.0.set(e.kind());
        }
        result
    }

    fn on_failed(&mut self, seq: SequenceNumber, failure: TaskFailure) {
        tracing::error!(
            connection = %self.connection,
            %seq,
            error = %failure,
            "chat item could not be resolved, dropping it"
        );
        if let Some(failures) = &self.failures {
            let _ = failures.send(ResolutionFailure {
                connection: self.connection,
                seq,
                reason: failure.to_string(),
            });
        }
    }
}
