//! Per-connection ordering gate for the chat relay.
//!
//! Every chat message and command a client sends has to go through an
//! extension before it can be forwarded, and extensions take as long as
//! they like. The backend still has to receive the results in the order
//! the client sent the packets. The [`Sequencer`] makes that true:
//!
//! ```text
//!   enqueue(A) enqueue(B) enqueue(C)      ← arrival order
//!        │          │          │
//!    resolve A  resolve B  resolve C      ← run concurrently, finish whenever
//!        │          │          │
//!        └──────────┴──────────┘
//!          drain: A, then B, then C       ← acted upon strictly in order
//! ```
//!
//! # Integration
//!
//! One sequencer per connection. The caller supplies a [`Drain`] that turns
//! each resolved value into output (for the relay: a packet to the backend)
//! and receives failures:
//!
//! ```ignore
//! let queue = Sequencer::spawn(connection_id, MyDrain::new(sink));
//! queue.enqueue(async move { resolve(item).await });
//! // ...
//! queue.close(); // teardown: in-flight results are discarded
//! ```
//!
//! # Guarantees
//!
//! - Output order equals enqueue order, whatever order tasks finish in.
//! - A slow task delays only the *handling* of later tasks, never their
//!   computation.
//! - Each task is handled exactly once, or discarded at teardown.
//! - A failing or panicking task is reported to [`Drain::on_failed`] and
//!   skipped; it never blocks the queue.

mod drain;
mod sequencer;

pub use drain::{BoxError, Drain, TaskFailure};
pub use sequencer::{QueueStatus, Sequencer};

use std::fmt;

/// Position of a task in its connection's queue. Starts at 0 and grows by
/// one per enqueued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceNumber(pub u64);

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
