//! `ChatRelay` builder and per-connection setup.
//!
//! The relay itself holds only what every connection shares: the config
//! and the extension hooks. Each [`connect`](ChatRelay::connect) creates an
//! independent pipeline (sequencer, chat state, drain) for one client.

use std::sync::Arc;

use chatrelay_chain::ChatState;
use chatrelay_pipeline::{
    ChatDrain, ChatEvents, CommandExecutor, PacketSynthesizer, PassThrough,
    ResolutionFailure, VerdictResolver,
};
use chatrelay_queue::Sequencer;
use chatrelay_transport::{ConnectionId, PacketSink, WebSocketSink};
use tokio::sync::mpsc;

use crate::{ChatConnection, RelayConfig, RelayError};

/// Builder for configuring a chat relay.
///
/// # Example
///
/// ```rust,ignore
/// use chatrelay::prelude::*;
///
/// let relay = ChatRelay::builder()
///     .config(RelayConfig { signing_mode: SigningMode::Keyed, ..Default::default() })
///     .failure_sink(failures_tx)
///     .build(MyFilter, MyCommands);
/// ```
#[derive(Debug, Default)]
pub struct ChatRelayBuilder {
    config: RelayConfig,
    failures: Option<mpsc::UnboundedSender<ResolutionFailure>>,
}

impl ChatRelayBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the relay configuration. It is validated on `build`.
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Reports every item whose resolution failed to `failures`.
    pub fn failure_sink(
        mut self,
        failures: mpsc::UnboundedSender<ResolutionFailure>,
    ) -> Self {
        self.failures = Some(failures);
        self
    }

    /// Builds the relay around the given extension hooks.
    pub fn build<E: ChatEvents, X: CommandExecutor>(
        self,
        events: E,
        executor: X,
    ) -> ChatRelay<E, X> {
        let config = self.config.validated();
        tracing::info!(
            signing_mode = ?config.signing_mode,
            delayed_ack_floor = config.delayed_ack_floor,
            "chat relay configured"
        );
        ChatRelay {
            illegal_state_message: Arc::from(config.illegal_state_message.as_str()),
            config,
            events: Arc::new(events),
            executor: Arc::new(executor),
            failures: self.failures,
        }
    }
}

/// A configured chat relay.
///
/// Cheap to share behind an `Arc`; `connect` takes `&self`.
pub struct ChatRelay<E, X> {
    config: RelayConfig,
    illegal_state_message: Arc<str>,
    events: Arc<E>,
    executor: Arc<X>,
    failures: Option<mpsc::UnboundedSender<ResolutionFailure>>,
}

impl ChatRelay<PassThrough, PassThrough> {
    /// Creates a new builder.
    pub fn builder() -> ChatRelayBuilder {
        ChatRelayBuilder::new()
    }
}

impl<E: ChatEvents, X: CommandExecutor> ChatRelay<E, X> {
    /// The validated configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Starts relaying chat for a new client connection.
    ///
    /// Packets the relay decides to forward go to `sink`, in the order the
    /// client sent them. Must be called inside a Tokio runtime.
    pub fn connect<S: PacketSink>(
        &self,
        id: ConnectionId,
        sink: S,
    ) -> ChatConnection<E, X> {
        let mut drain = ChatDrain::new(
            id,
            PacketSynthesizer::new(self.config.signing_mode),
            ChatState::new(self.config.delayed_ack_floor),
            Arc::new(sink),
        );
        if let Some(failures) = &self.failures {
            drain = drain.with_failure_sink(failures.clone());
        }
        let fault = drain.fault();

        let resolver = VerdictResolver::new(
            id,
            Arc::clone(&self.events),
            Arc::clone(&self.executor),
        );
        tracing::debug!(connection = %id, "connection attached to relay");
        ChatConnection::new(
            Sequencer::spawn(id, drain),
            resolver,
            fault,
            Arc::clone(&self.illegal_state_message),
        )
    }

    /// Opens a WebSocket to the backend at `url` and connects the client
    /// to it.
    ///
    /// # Errors
    /// Returns `RelayError::Transport` if the backend cannot be reached.
    pub async fn connect_backend(
        &self,
        id: ConnectionId,
        url: &str,
    ) -> Result<ChatConnection<E, X>, RelayError> {
        let sink = WebSocketSink::connect(id, url).await?;
        Ok(self.connect(id, sink))
    }
}
