//! The chat and command pipeline.
//!
//! Turns each inbound chat message or command into at most one packet for
//! the backend:
//!
//! ```text
//!   InboundChatItem ──VerdictResolver──→ Verdict ──PacketSynthesizer──→ Option<OutgoingPacket>
//!                     (extension event,              (consults the
//!                      local command run)             ChatState chain)
//! ```
//!
//! The resolver runs inside a queued task (see `chatrelay-queue`); the
//! synthesizer runs in the queue's drain, strictly in arrival order, via
//! [`ChatDrain`].
//!
//! # Key types
//!
//! - [`ChatEvents`] / [`CommandExecutor`] — the extension boundary that
//!   proxy plugins implement
//! - [`VerdictResolver`] — fires the event and maps the outcome to a
//!   [`Verdict`]
//! - [`PacketSynthesizer`] — builds the outgoing packet and advances the
//!   signature chain
//! - [`ChatDrain`] — the queue drain that ties the two to a packet sink

mod drain;
mod error;
mod extension;
mod item;
mod resolver;
mod synth;
mod verdict;

pub use drain::{ChatDrain, FaultHandle, Resolved};
pub use error::{
    DrainError, ExtensionError, FaultKind, ResolutionFailure, ResolveError,
};
pub use extension::{ChatEvent, ChatEvents, CommandExecutor, EventResult, PassThrough};
pub use item::{InboundChatItem, MessageKind};
pub use resolver::VerdictResolver;
pub use synth::{PacketSynthesizer, SigningMode};
pub use verdict::Verdict;
