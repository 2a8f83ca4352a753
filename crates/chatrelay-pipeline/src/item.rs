//! Inbound chat items: the two packet kinds that go through extensions.

use std::fmt;

use chatrelay_protocol::{
    ChatPacket, CommandPacket, LastSeenMessages, ProtocolError,
    ServerboundPacket, Timestamp,
};

/// Whether an item is a chat message or a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Chat,
    Command,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat => write!(f, "chat message"),
            Self::Command => write!(f, "command"),
        }
    }
}

/// A chat message or command as the client sent it.
///
/// Immutable once received: verdicts and rewrites produce new packets,
/// the original stays available for verbatim forwarding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundChatItem {
    Chat(ChatPacket),
    Command(CommandPacket),
}

impl InboundChatItem {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Chat(_) => MessageKind::Chat,
            Self::Command(_) => MessageKind::Command,
        }
    }

    /// The message text, or the command line without its slash.
    pub fn content(&self) -> &str {
        match self {
            Self::Chat(p) => &p.message,
            Self::Command(p) => &p.command,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            Self::Chat(p) => p.timestamp,
            Self::Command(p) => p.timestamp,
        }
    }

    pub fn last_seen(&self) -> Option<&LastSeenMessages> {
        match self {
            Self::Chat(p) => p.last_seen.as_ref(),
            Self::Command(p) => p.last_seen.as_ref(),
        }
    }

    /// Returns `true` if any part of the item is covered by a signature.
    pub fn is_signed(&self) -> bool {
        match self {
            Self::Chat(p) => p.is_signed(),
            Self::Command(p) => p.is_signed(),
        }
    }

    /// Checks the attached window against the protocol bound.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidMessage` for an oversized window.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self.last_seen() {
            Some(window) => window.validate(),
            None => Ok(()),
        }
    }

    /// The original packet, with its window replaced by `window`.
    ///
    /// Only the window changes. Content, salt and signatures are kept, so
    /// with the client's own window this is the packet exactly as sent.
    pub fn to_packet(&self, window: Option<LastSeenMessages>) -> ServerboundPacket {
        match self {
            Self::Chat(p) => ServerboundPacket::Chat(ChatPacket {
                last_seen: window,
                ..p.clone()
            }),
            Self::Command(p) => ServerboundPacket::Command(CommandPacket {
                last_seen: window,
                ..p.clone()
            }),
        }
    }
}

impl From<ChatPacket> for InboundChatItem {
    fn from(packet: ChatPacket) -> Self {
        Self::Chat(packet)
    }
}

impl From<CommandPacket> for InboundChatItem {
    fn from(packet: CommandPacket) -> Self {
        Self::Command(packet)
    }
}

#[cfg(test)]
mod tests {
    use chatrelay_protocol::{ArgumentSignature, MessageSignature};

    use super::*;

    fn command(signed: bool) -> CommandPacket {
        CommandPacket {
            command: "msg alice hi".into(),
            timestamp: Timestamp(10),
            salt: 3,
            argument_signatures: if signed {
                vec![ArgumentSignature {
                    name: "message".into(),
                    signature: MessageSignature(vec![1]),
                }]
            } else {
                vec![]
            },
            last_seen: Some(LastSeenMessages::new(1, vec![])),
        }
    }

    #[test]
    fn test_accessors() {
        let item = InboundChatItem::from(command(true));
        assert_eq!(item.content(), "msg alice hi");
        assert_eq!(item.timestamp(), Timestamp(10));
        assert_eq!(item.last_seen().map(|w| w.offset), Some(1));
        assert!(item.is_signed());
        assert_eq!(item.kind().to_string(), "command");
    }

    #[test]
    fn test_to_packet_with_own_window_is_verbatim() {
        let original = command(true);
        let item = InboundChatItem::from(original.clone());
        assert_eq!(
            item.to_packet(original.last_seen.clone()),
            ServerboundPacket::Command(original)
        );
    }

    #[test]
    fn test_to_packet_only_replaces_window() {
        let item = InboundChatItem::from(command(true));
        let window = LastSeenMessages::new(9, vec![]);
        match item.to_packet(Some(window.clone())) {
            ServerboundPacket::Command(p) => {
                assert_eq!(p.last_seen, Some(window));
                assert_eq!(p.salt, 3);
                assert!(p.is_signed());
            }
            other => panic!("expected a command, got {other:?}"),
        }
    }
}
