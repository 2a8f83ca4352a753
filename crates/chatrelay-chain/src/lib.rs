//! Signature-chain bookkeeping for the chat relay.
//!
//! Every signed chat message references the messages its sender has seen,
//! and tells the backend how many of them are new (the acknowledgement
//! offset). If the proxy drops or rewrites a message it must still pass
//! those acknowledgements on, exactly once and never backwards, or the
//! client and the backend disagree about the chain and the client gets
//! kicked.
//!
//! # Key types
//!
//! - [`SignatureChain`] — the acknowledged offset and the held-back advance
//! - [`ChatState`] — per-connection state around the chain: last timestamp,
//!   last acknowledged entries, delayed standalone acknowledgements
//! - [`ChainError`] — integrity violations that end the connection
//!
//! One `ChatState` exists per connection. It is created when the
//! connection starts, owned by that connection's drain task, and dropped
//! at teardown. Nothing here is shared between connections.

mod chain;
mod error;
mod state;

pub use chain::SignatureChain;
pub use error::ChainError;
pub use state::{ChatState, DEFAULT_DELAYED_ACK_FLOOR};
