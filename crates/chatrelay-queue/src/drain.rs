//! The consumer side of a [`Sequencer`](crate::Sequencer).

use std::future::Future;

use crate::SequenceNumber;

/// Boxed error returned by a queued task.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a queued task produced no value.
#[derive(Debug, thiserror::Error)]
pub enum TaskFailure {
    /// The task's future returned an error.
    #[error("task returned an error: {0}")]
    Errored(#[source] BoxError),

    /// The task panicked.
    #[error("task panicked")]
    Panicked,

    /// The task was cancelled before it finished.
    #[error("task was cancelled")]
    Cancelled,
}

/// Handles the results of a sequencer, one at a time and in enqueue order.
///
/// The drain runs inside the sequencer's own task, so `&mut self` is never
/// shared: state kept here (such as the signature chain) needs no lock.
pub trait Drain<T>: Send + 'static {
    /// Error that ends the queue. Returning one from
    /// [`on_resolved`](Self::on_resolved) faults the sequencer and discards
    /// everything still in flight.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Handles the value of task `seq`. Every earlier task has already been
    /// handled or reported as failed.
    fn on_resolved(
        &mut self,
        seq: SequenceNumber,
        value: T,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the failure of task `seq`. The task counts as handled and
    /// produces no output; the queue moves on.
    ///
    /// Default: log and continue.
    fn on_failed(&mut self, seq: SequenceNumber, failure: TaskFailure) {
        tracing::warn!(%seq, error = %failure, "queued task failed");
    }
}
