//! The sequencer: a handle for enqueueing and one drain task per queue.
//!
//! Tasks are spawned the moment they are enqueued and their `JoinHandle`s
//! go into an unbounded FIFO channel. The drain task takes handles off the
//! channel one by one and awaits each before looking at the next, so a
//! result is only acted upon once everything before it has been.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chatrelay_transport::ConnectionId;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::{BoxError, Drain, SequenceNumber, TaskFailure};

/// Lifecycle of a queue.
///
/// ```text
///   Running ──close()────────────→ Closed
///      │
///      └──drain error────────────→ Faulted(reason)
/// ```
///
/// Both end states are final. Once a queue has left `Running`, enqueued
/// tasks are dropped and in-flight results are discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueStatus {
    /// Accepting and draining tasks.
    Running,
    /// Torn down by its owner.
    Closed,
    /// Stopped because the drain reported an error.
    Faulted(String),
}

impl QueueStatus {
    /// Returns `true` while the queue accepts tasks.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Closed => write!(f, "closed"),
            Self::Faulted(reason) => write!(f, "faulted: {reason}"),
        }
    }
}

/// A task owned by the queue from enqueue until it is drained.
struct QueuedTask<T> {
    seq: SequenceNumber,
    handle: JoinHandle<Result<T, BoxError>>,
}

/// Enqueue-side state. Assigning a sequence number and pushing the task
/// happen under one lock, so sequence order is channel order.
struct Gate<T> {
    next_seq: u64,
    tx: Option<mpsc::UnboundedSender<QueuedTask<T>>>,
}

/// State shared with the drain task.
struct Monitor {
    connection: ConnectionId,
    status: watch::Sender<QueueStatus>,
    /// Tasks handled so far, successfully or not.
    drained: watch::Sender<u64>,
}

impl Monitor {
    fn is_running(&self) -> bool {
        self.status.borrow().is_running()
    }

    /// Moves a running queue to `status`. Returns `false` if it had
    /// already stopped.
    fn finish(&self, status: QueueStatus) -> bool {
        self.status.send_if_modified(|current| {
            if current.is_running() {
                *current = status;
                true
            } else {
                false
            }
        })
    }
}

struct Shared<T> {
    gate: Mutex<Gate<T>>,
    monitor: Arc<Monitor>,
}

/// Handle to a connection's ordering queue.
///
/// Cheap to clone. When every handle is dropped, the drain task finishes
/// the tasks already queued and exits; call [`close`](Self::close) to
/// discard them instead.
pub struct Sequencer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Sequencer<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> Sequencer<T> {
    /// Creates a queue for `connection` and spawns its drain task.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn spawn<D: Drain<T>>(connection: ConnectionId, drain: D) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(QueueStatus::Running);
        let (drained, _) = watch::channel(0);
        let monitor = Arc::new(Monitor {
            connection,
            status,
            drained,
        });

        tokio::spawn(run_drain(Arc::clone(&monitor), rx, drain));

        Self {
            shared: Arc::new(Shared {
                gate: Mutex::new(Gate {
                    next_seq: 0,
                    tx: Some(tx),
                }),
                monitor,
            }),
        }
    }

    /// Queues a task and starts running it immediately.
    ///
    /// Returns the task's sequence number, or `None` if the queue has been
    /// closed or faulted. In that case the task is dropped without being
    /// polled.
    pub fn enqueue<F, E>(&self, task: F) -> Option<SequenceNumber>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let mut gate = self.lock_gate();
        if !self.shared.monitor.is_running() {
            gate.tx = None;
        }
        let Some(tx) = gate.tx.as_ref() else {
            tracing::trace!(
                connection = %self.shared.monitor.connection,
                "queue is shut, task discarded"
            );
            return None;
        };

        let seq = SequenceNumber(gate.next_seq);
        let handle = tokio::spawn(async move {
            task.await.map_err(Into::<BoxError>::into)
        });

        if let Err(mpsc::error::SendError(rejected)) =
            tx.send(QueuedTask { seq, handle })
        {
            // The drain task stopped between the status check and now.
            rejected.handle.abort();
            gate.tx = None;
            return None;
        }

        gate.next_seq += 1;
        tracing::trace!(connection = %self.shared.monitor.connection, %seq, "task queued");
        Some(seq)
    }

    /// Tears the queue down.
    ///
    /// Tasks still in flight are aborted and their results, if any, are
    /// never handed to the drain. Later `enqueue` calls return `None`.
    /// Idempotent, and a no-op on a faulted queue.
    pub fn close(&self) {
        let mut gate = self.lock_gate();
        gate.tx = None;
        if self.shared.monitor.finish(QueueStatus::Closed) {
            tracing::debug!(
                connection = %self.shared.monitor.connection,
                "sequencer closed"
            );
        }
    }

    /// Current status.
    pub fn status(&self) -> QueueStatus {
        self.shared.monitor.status.borrow().clone()
    }

    /// Waits until the queue stops and returns its final status.
    pub async fn closed(&self) -> QueueStatus {
        let mut rx = self.shared.monitor.status.subscribe();
        match rx.wait_for(|s| !s.is_running()).await {
            Ok(status) => status.clone(),
            Err(_) => QueueStatus::Closed,
        }
    }

    /// Number of tasks enqueued but not yet handled.
    pub fn in_flight(&self) -> u64 {
        let gate = self.lock_gate();
        gate.next_seq
            .saturating_sub(*self.shared.monitor.drained.borrow())
    }

    /// Waits until every task enqueued before this call has been handled,
    /// or the queue stops.
    ///
    /// Tasks enqueued while waiting are not waited for.
    pub async fn settled(&self) {
        let target = self.lock_gate().next_seq;
        let mut drained = self.shared.monitor.drained.subscribe();
        let mut status = self.shared.monitor.status.subscribe();
        tokio::select! {
            _ = reached(&mut drained, target) => {}
            _ = stopped(&mut status) => {}
        }
    }

    /// The connection this queue belongs to.
    pub fn connection(&self) -> ConnectionId {
        self.shared.monitor.connection
    }

    fn lock_gate(&self) -> MutexGuard<'_, Gate<T>> {
        // Nothing that holds the lock can panic halfway through an update.
        self.shared.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resolves once the queue has left `Running`.
async fn stopped(status: &mut watch::Receiver<QueueStatus>) {
    // The sender lives in the monitor, which this task keeps alive.
    let _ = status.wait_for(|s| !s.is_running()).await;
}

/// Resolves once `target` tasks have been handled.
async fn reached(drained: &mut watch::Receiver<u64>, target: u64) {
    let _ = drained.wait_for(|count| *count >= target).await;
}

/// The drain loop. Runs until the queue is closed or faulted, or every
/// handle is dropped and the channel is empty.
async fn run_drain<T, D>(
    monitor: Arc<Monitor>,
    mut rx: mpsc::UnboundedReceiver<QueuedTask<T>>,
    mut drain: D,
) where
    T: Send + 'static,
    D: Drain<T>,
{
    let connection = monitor.connection;
    let mut status = monitor.status.subscribe();
    tracing::debug!(%connection, "sequencer started");

    loop {
        // `biased` checks for teardown first, so nothing is acted upon once
        // the queue has stopped, even if a result is ready.
        let mut task = tokio::select! {
            biased;
            _ = stopped(&mut status) => break,
            next = rx.recv() => match next {
                Some(task) => task,
                None => break,
            },
        };

        let joined = tokio::select! {
            biased;
            _ = stopped(&mut status) => {
                task.handle.abort();
                break;
            }
            joined = &mut task.handle => joined,
        };

        let seq = task.seq;
        match joined {
            Ok(Ok(value)) => {
                // `close()` may have run on another thread while the task
                // was finishing.
                if !monitor.is_running() {
                    break;
                }
                if let Err(e) = drain.on_resolved(seq, value).await {
                    tracing::error!(
                        %connection,
                        %seq,
                        error = %e,
                        "drain failed, faulting queue"
                    );
                    monitor.finish(QueueStatus::Faulted(e.to_string()));
                    break;
                }
            }
            Ok(Err(e)) => drain.on_failed(seq, TaskFailure::Errored(e)),
            Err(e) if e.is_panic() => drain.on_failed(seq, TaskFailure::Panicked),
            Err(_) => drain.on_failed(seq, TaskFailure::Cancelled),
        }
        monitor.drained.send_modify(|count| *count += 1);
    }

    // Whatever is still queued belongs to a dead connection.
    rx.close();
    let mut discarded = 0u64;
    while let Ok(task) = rx.try_recv() {
        task.handle.abort();
        discarded += 1;
    }
    monitor.finish(QueueStatus::Closed);
    tracing::debug!(%connection, discarded, "sequencer stopped");
}
