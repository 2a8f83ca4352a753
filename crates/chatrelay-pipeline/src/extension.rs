//! The extension boundary: hooks that decide what happens to chat.
//!
//! The relay doesn't filter, rewrite or execute anything on its own. For
//! every chat message and command it fires a [`ChatEvent`] through
//! [`ChatEvents`], and for commands the proxy may handle it asks a
//! [`CommandExecutor`]. Both are traits you implement; the relay awaits
//! them from a queued task, so they may take as long as they need without
//! holding up other connections or reordering this one.

use std::future::Future;

use chatrelay_transport::ConnectionId;

use crate::{ExtensionError, MessageKind};

/// What an extension decided about a chat message or command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventResult {
    /// Let it through as sent.
    #[default]
    Allowed,
    /// Drop it.
    Denied,
    /// Let it through with different text.
    Modified(String),
    /// Hand it to the backend server, optionally with different text.
    /// For commands this skips local execution on the proxy.
    ForwardToServer(Option<String>),
}

/// A chat message or command, presented to extensions.
///
/// The content is what the client sent and can't be changed; extensions
/// change the [`result`](Self::result) instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    connection: ConnectionId,
    kind: MessageKind,
    content: String,
    result: EventResult,
}

impl ChatEvent {
    /// A new event whose result starts out as `Allowed`.
    pub fn new(
        connection: ConnectionId,
        kind: MessageKind,
        content: impl Into<String>,
    ) -> Self {
        Self {
            connection,
            kind,
            content: content.into(),
            result: EventResult::Allowed,
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// The text the client sent.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn result(&self) -> &EventResult {
        &self.result
    }

    pub fn set_result(&mut self, result: EventResult) {
        self.result = result;
    }

    pub fn into_result(self) -> EventResult {
        self.result
    }
}

/// Fires chat events through the proxy's extensions.
///
/// # Example
///
/// ```rust
/// use chatrelay_pipeline::{ChatEvent, ChatEvents, EventResult, ExtensionError};
///
/// /// Denies anything that shouts.
/// struct NoShouting;
///
/// impl ChatEvents for NoShouting {
///     async fn fire(&self, mut event: ChatEvent) -> Result<ChatEvent, ExtensionError> {
///         let text = event.content();
///         if text.chars().any(char::is_alphabetic) && text == text.to_uppercase() {
///             event.set_result(EventResult::Denied);
///         }
///         Ok(event)
///     }
/// }
/// ```
pub trait ChatEvents: Send + Sync + 'static {
    /// Runs every interested extension and returns the event with its
    /// final result.
    ///
    /// # Errors
    /// An error drops the item; the connection carries on.
    fn fire(
        &self,
        event: ChatEvent,
    ) -> impl Future<Output = Result<ChatEvent, ExtensionError>> + Send;
}

/// Runs commands that the proxy itself handles.
pub trait CommandExecutor: Send + Sync + 'static {
    /// Tries to run `command` (without its slash) on the proxy.
    ///
    /// # Returns
    /// - `Ok(true)` — the proxy handled it; the backend won't see it
    /// - `Ok(false)` — no proxy command matched; it goes to the backend
    fn execute(
        &self,
        connection: ConnectionId,
        command: &str,
    ) -> impl Future<Output = Result<bool, ExtensionError>> + Send;
}

/// Allows every event and runs no commands locally.
///
/// With `PassThrough` in both slots the relay forwards everything
/// verbatim, in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl ChatEvents for PassThrough {
    async fn fire(&self, event: ChatEvent) -> Result<ChatEvent, ExtensionError> {
        Ok(event)
    }
}

impl CommandExecutor for PassThrough {
    async fn execute(
        &self,
        _connection: ConnectionId,
        _command: &str,
    ) -> Result<bool, ExtensionError> {
        Ok(false)
    }
}
