//! Packet synthesis: from a [`Verdict`] to what the backend receives.
//!
//! Runs in the drain, one item at a time and in arrival order, because it
//! reads and advances the connection's signature chain. For every verdict
//! the rules are:
//!
//! | verdict                     | packet                                   |
//! |-----------------------------|------------------------------------------|
//! | `Deny`                      | acknowledgement of the window, if any    |
//! | `Unchanged`                 | the original                             |
//! | `Allow`, same content       | the original                             |
//! | `Allow`, different content  | a new, unsigned packet with the content  |
//!
//! Whenever a packet goes out, the chain advances by the offset it
//! carries. Acknowledgements the relay is holding back are added to that
//! offset; this is the only field of an original packet that may change,
//! and it is not covered by the client's signature.

use chatrelay_chain::{ChainError, ChatState};
use chatrelay_protocol::{
    ChatPacket, CommandPacket, LastSeenMessages, OutgoingPacket, Route,
    ServerboundPacket,
};
use serde::{Deserialize, Serialize};

use crate::{InboundChatItem, Verdict};

/// How strictly the backend ties chat to signatures.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SigningMode {
    /// Session-signed chat: a rewritten message is sent on unsigned.
    #[default]
    Session,
    /// Key-signed chat: the backend rejects any signed message whose text
    /// changed, so rewriting one is an illegal protocol state.
    Keyed,
}

/// Builds backend packets and keeps the signature chain in step.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketSynthesizer {
    mode: SigningMode,
}

impl PacketSynthesizer {
    pub fn new(mode: SigningMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> SigningMode {
        self.mode
    }

    /// Turns a resolved item into at most one packet.
    ///
    /// `None` means nothing is sent; the chain is then left as it was.
    ///
    /// # Errors
    /// - `ChainError::IllegalState` when a signed item was rewritten under
    ///   [`SigningMode::Keyed`]
    /// - `ChainError::Regression` if the chain would move backwards
    pub fn synthesize(
        &self,
        verdict: Verdict,
        item: &InboundChatItem,
        state: &mut ChatState,
    ) -> Result<Option<OutgoingPacket>, ChainError> {
        state.observe(item.timestamp(), item.last_seen());
        let window = item.last_seen().map(|w| state.effective_window(w));

        let outgoing = match verdict {
            Verdict::Deny => window
                .as_ref()
                .filter(|w| w.offset > 0)
                .map(|w| OutgoingPacket::acknowledgement(w.offset)),
            Verdict::Unchanged => {
                Some(OutgoingPacket::forward(item.to_packet(window.clone())))
            }
            Verdict::Allow {
                content,
                redirect_to_backend,
            } => {
                let route = if redirect_to_backend {
                    Route::Redirected
                } else {
                    Route::Backend
                };
                let packet = if content == item.content() {
                    item.to_packet(window.clone())
                } else {
                    self.rewrite(item, content, window.clone())?
                };
                Some(OutgoingPacket::routed(packet, route))
            }
        };

        if let (Some(_), Some(window)) = (&outgoing, &window) {
            state.commit_window(window)?;
        }
        Ok(outgoing)
    }

    /// Builds a packet for a standalone client acknowledgement, or `None`
    /// while it is being held back.
    ///
    /// # Errors
    /// Propagates `ChainError::Regression`.
    pub fn synthesize_acknowledgement(
        &self,
        count: u32,
        state: &mut ChatState,
    ) -> Result<Option<OutgoingPacket>, ChainError> {
        Ok(state
            .accumulate_ack(count)?
            .map(OutgoingPacket::acknowledgement))
    }

    /// Builds an unsigned chat message on the player's behalf.
    ///
    /// It carries the newest timestamp seen on the connection and the
    /// entries the client last acknowledged. Held-back acknowledgements go
    /// out with it.
    ///
    /// # Errors
    /// Propagates `ChainError::Regression`.
    pub fn synthesize_spoofed(
        &self,
        message: String,
        state: &mut ChatState,
    ) -> Result<OutgoingPacket, ChainError> {
        let window = state.effective_window(&state.create_last_seen());
        state.commit_window(&window)?;
        Ok(OutgoingPacket::forward(ServerboundPacket::Chat(ChatPacket {
            message,
            timestamp: state.last_timestamp(),
            salt: 0,
            signature: None,
            last_seen: Some(window),
        })))
    }

    fn rewrite(
        &self,
        item: &InboundChatItem,
        content: String,
        window: Option<LastSeenMessages>,
    ) -> Result<ServerboundPacket, ChainError> {
        if self.mode == SigningMode::Keyed && item.is_signed() {
            return Err(ChainError::IllegalState(format!(
                "signed {} was changed by an extension",
                item.kind()
            )));
        }

        // The original signature no longer matches, so none is sent.
        let packet = match item {
            InboundChatItem::Chat(p) => ServerboundPacket::Chat(ChatPacket {
                message: content,
                timestamp: p.timestamp,
                salt: 0,
                signature: None,
                last_seen: window,
            }),
            InboundChatItem::Command(p) => {
                ServerboundPacket::Command(CommandPacket {
                    command: content,
                    timestamp: p.timestamp,
                    salt: 0,
                    argument_signatures: Vec::new(),
                    last_seen: window,
                })
            }
        };
        Ok(packet)
    }
}
