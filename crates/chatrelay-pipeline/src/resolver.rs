//! Verdict resolution: from extension results to a [`Verdict`].

use std::future::Future;
use std::sync::Arc;

use chatrelay_transport::ConnectionId;

use crate::{
    ChatEvent, ChatEvents, CommandExecutor, EventResult, InboundChatItem,
    MessageKind, ResolveError, Verdict,
};

/// Asks the extensions what to do with each chat item of one connection.
///
/// Cheap to clone; each queued task gets its own copy.
pub struct VerdictResolver<E, X> {
    connection: ConnectionId,
    events: Arc<E>,
    executor: Arc<X>,
}

impl<E, X> Clone for VerdictResolver<E, X> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection,
            events: Arc::clone(&self.events),
            executor: Arc::clone(&self.executor),
        }
    }
}

impl<E: ChatEvents, X: CommandExecutor> VerdictResolver<E, X> {
    pub fn new(connection: ConnectionId, events: Arc<E>, executor: Arc<X>) -> Self {
        Self {
            connection,
            events,
            executor,
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Resolves `item` into a verdict.
    ///
    /// The returned future owns everything it needs, so it can be handed
    /// straight to the sequencer.
    ///
    /// # Errors
    /// Returns `ResolveError::Extension` if an event handler or a local
    /// command fails.
    pub fn resolve(
        &self,
        item: Arc<InboundChatItem>,
    ) -> impl Future<Output = Result<Verdict, ResolveError>> + Send + use<E, X> {
        let resolver = self.clone();
        async move { resolver.resolve_item(&item).await }
    }

    async fn resolve_item(
        &self,
        item: &InboundChatItem,
    ) -> Result<Verdict, ResolveError> {
        let event = ChatEvent::new(self.connection, item.kind(), item.content());
        let result = self.events.fire(event).await?.into_result();
        tracing::trace!(
            connection = %self.connection,
            kind = %item.kind(),
            ?result,
            "event fired"
        );

        match item.kind() {
            MessageKind::Chat => Ok(chat_verdict(item.content(), result)),
            MessageKind::Command => self.command_verdict(item.content(), result).await,
        }
    }

    async fn command_verdict(
        &self,
        original: &str,
        result: EventResult,
    ) -> Result<Verdict, ResolveError> {
        let command = match result {
            EventResult::Denied => return Ok(Verdict::Deny),
            EventResult::ForwardToServer(text) => {
                return Ok(Verdict::Allow {
                    content: text.unwrap_or_else(|| original.to_owned()),
                    redirect_to_backend: true,
                });
            }
            EventResult::Allowed => original.to_owned(),
            EventResult::Modified(text) => text,
        };

        // The proxy gets the first go at the command; whatever it doesn't
        // handle goes to the backend.
        if self.executor.execute(self.connection, &command).await? {
            tracing::debug!(connection = %self.connection, %command, "command handled by proxy");
            return Ok(Verdict::Deny);
        }
        if command == original {
            Ok(Verdict::Unchanged)
        } else {
            Ok(Verdict::allow(command))
        }
    }
}

fn chat_verdict(original: &str, result: EventResult) -> Verdict {
    match result {
        EventResult::Allowed => Verdict::Unchanged,
        EventResult::Denied => Verdict::Deny,
        EventResult::Modified(text) => Verdict::allow(text),
        EventResult::ForwardToServer(text) => Verdict::Allow {
            content: text.unwrap_or_else(|| original.to_owned()),
            redirect_to_backend: true,
        },
    }
}
