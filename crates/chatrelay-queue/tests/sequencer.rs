//! Integration tests for the sequencer.
//!
//! Tasks are gated on `oneshot` channels so each test decides exactly when
//! every task completes. Tests run on a paused clock: the runtime skips
//! ahead whenever it is idle, so "nothing arrives within 20ms" is checked
//! without really waiting. The tests under "Threads" run on a real
//! multi-thread runtime instead, with producers and the drain on separate
//! workers.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use chatrelay_queue::{Drain, QueueStatus, SequenceNumber, Sequencer, TaskFailure};
use chatrelay_transport::ConnectionId;
use rand::seq::SliceRandom;
use tokio::sync::{mpsc, oneshot};

// =========================================================================
// Helpers
// =========================================================================

#[derive(Debug, PartialEq)]
enum Event {
    Resolved(SequenceNumber, u32),
    Failed(SequenceNumber, String),
}

#[derive(Debug, thiserror::Error)]
#[error("refused value {0}")]
struct Refused(u32);

/// Records everything the queue hands over. Refuses one value, if asked.
struct Recorder {
    out: mpsc::UnboundedSender<Event>,
    refuse: Option<u32>,
}

impl Drain<u32> for Recorder {
    type Error = Refused;

    async fn on_resolved(
        &mut self,
        seq: SequenceNumber,
        value: u32,
    ) -> Result<(), Refused> {
        if self.refuse == Some(value) {
            return Err(Refused(value));
        }
        let _ = self.out.send(Event::Resolved(seq, value));
        Ok(())
    }

    fn on_failed(&mut self, seq: SequenceNumber, failure: TaskFailure) {
        let _ = self.out.send(Event::Failed(seq, failure.to_string()));
    }
}

fn queue(
    refuse: Option<u32>,
) -> (Sequencer<u32>, mpsc::UnboundedReceiver<Event>) {
    let (out, rx) = mpsc::unbounded_channel();
    let seq = Sequencer::spawn(ConnectionId::new(1), Recorder { out, refuse });
    (seq, rx)
}

/// A task that yields `value` once its gate is opened.
fn gated(
    value: u32,
) -> (
    oneshot::Sender<()>,
    impl Future<Output = Result<u32, Infallible>> + Send + 'static,
) {
    let (tx, rx) = oneshot::channel();
    (tx, async move {
        let _ = rx.await;
        Ok(value)
    })
}

async fn ready(value: u32) -> Result<u32, Infallible> {
    Ok(value)
}

async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<Event>) {
    let next = tokio::time::timeout(Duration::from_millis(20), rx.recv()).await;
    assert!(next.is_err(), "expected no output, got {next:?}");
}

async fn next_value(rx: &mut mpsc::UnboundedReceiver<Event>) -> u32 {
    match rx.recv().await {
        Some(Event::Resolved(_, value)) => value,
        other => panic!("expected a resolved value, got {other:?}"),
    }
}

// =========================================================================
// Ordering
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_out_of_order_completion_is_emitted_in_enqueue_order() {
    let (queue, mut rx) = queue(None);
    let (gate1, t1) = gated(1);
    let (gate2, t2) = gated(2);
    let (gate3, t3) = gated(3);
    queue.enqueue(t1);
    queue.enqueue(t2);
    queue.enqueue(t3);

    gate2.send(()).unwrap();
    assert_quiet(&mut rx).await;
    gate3.send(()).unwrap();
    assert_quiet(&mut rx).await;
    gate1.send(()).unwrap();

    assert_eq!(next_value(&mut rx).await, 1);
    assert_eq!(next_value(&mut rx).await, 2);
    assert_eq!(next_value(&mut rx).await, 3);
    assert_quiet(&mut rx).await;
}

#[tokio::test(start_paused = true)]
async fn test_fully_reversed_completion_keeps_order() {
    let (queue, mut rx) = queue(None);
    let mut gates = Vec::new();
    for value in 0..20 {
        let (gate, task) = gated(value);
        queue.enqueue(task);
        gates.push(gate);
    }

    while let Some(gate) = gates.pop() {
        gate.send(()).unwrap();
        tokio::task::yield_now().await;
    }

    for expected in 0..20 {
        assert_eq!(next_value(&mut rx).await, expected);
    }
}

#[tokio::test(start_paused = true)]
async fn test_shuffled_completion_keeps_order() {
    let (queue, mut rx) = queue(None);
    let mut gates = Vec::new();
    for value in 0..50 {
        let (gate, task) = gated(value);
        queue.enqueue(task);
        gates.push(Some(gate));
    }

    let mut order: Vec<usize> = (0..50).collect();
    order.shuffle(&mut rand::rng());
    for index in order {
        if let Some(gate) = gates[index].take() {
            gate.send(()).unwrap();
        }
        tokio::task::yield_now().await;
    }

    for expected in 0..50 {
        assert_eq!(next_value(&mut rx).await, expected);
    }
    assert_quiet(&mut rx).await;
}

#[tokio::test(start_paused = true)]
async fn test_sequence_numbers_match_emission_under_concurrent_enqueue() {
    let (queue, mut rx) = queue(None);

    let mut producers = Vec::new();
    for producer in 0..4u32 {
        let queue = queue.clone();
        producers.push(tokio::spawn(async move {
            for i in 0..25u32 {
                queue.enqueue(ready(producer * 100 + i));
                tokio::task::yield_now().await;
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }

    for expected in 0..100u64 {
        match rx.recv().await {
            Some(Event::Resolved(seq, _)) => assert_eq!(seq, SequenceNumber(expected)),
            other => panic!("unexpected {other:?}"),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_head_does_not_block_later_computation() {
    let (queue, mut rx) = queue(None);
    let (gate1, t1) = gated(1);
    let computed = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&computed);

    queue.enqueue(t1);
    queue.enqueue(async move {
        flag.store(true, Ordering::SeqCst);
        Ok::<_, Infallible>(2)
    });

    assert_quiet(&mut rx).await;
    assert!(computed.load(Ordering::SeqCst), "second task should have run");
    assert_eq!(queue.in_flight(), 2);

    gate1.send(()).unwrap();
    assert_eq!(next_value(&mut rx).await, 1);
    assert_eq!(next_value(&mut rx).await, 2);
}

// =========================================================================
// Failures
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_failed_task_is_reported_and_skipped() {
    let (queue, mut rx) = queue(None);
    queue.enqueue(ready(1));
    queue.enqueue(async { Err::<u32, _>("extension exploded") });
    queue.enqueue(ready(3));

    assert_eq!(rx.recv().await, Some(Event::Resolved(SequenceNumber(0), 1)));
    match rx.recv().await {
        Some(Event::Failed(seq, message)) => {
            assert_eq!(seq, SequenceNumber(1));
            assert!(message.contains("extension exploded"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(rx.recv().await, Some(Event::Resolved(SequenceNumber(2), 3)));
    assert_eq!(queue.status(), QueueStatus::Running);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_task_is_reported_and_skipped() {
    let (queue, mut rx) = queue(None);
    queue.enqueue(async {
        if true {
            panic!("handler bug");
        }
        Ok::<u32, Infallible>(0)
    });
    queue.enqueue(ready(2));

    assert_eq!(
        rx.recv().await,
        Some(Event::Failed(SequenceNumber(0), "task panicked".into()))
    );
    assert_eq!(next_value(&mut rx).await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_drain_error_faults_queue_and_discards_rest() {
    let (queue, mut rx) = queue(Some(2));
    let (gate4, t4) = gated(4);
    queue.enqueue(ready(1));
    queue.enqueue(ready(2));
    queue.enqueue(ready(3));
    queue.enqueue(t4);

    assert_eq!(
        queue.closed().await,
        QueueStatus::Faulted("refused value 2".into())
    );
    assert_eq!(next_value(&mut rx).await, 1);
    let _ = gate4.send(());
    assert_quiet(&mut rx).await;
    assert_eq!(queue.enqueue(ready(5)), None);
}

// =========================================================================
// Teardown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_close_discards_unresolved_tasks() {
    let (queue, mut rx) = queue(None);
    let (gate1, t1) = gated(1);
    let (gate2, t2) = gated(2);
    queue.enqueue(t1);
    queue.enqueue(t2);

    queue.close();
    // The gates may already be gone with their aborted tasks.
    let _ = gate2.send(());
    let _ = gate1.send(());

    assert_quiet(&mut rx).await;
    assert_eq!(queue.status(), QueueStatus::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_enqueue_after_close_is_a_no_op() {
    let (queue, mut rx) = queue(None);
    queue.close();
    queue.close();

    assert_eq!(queue.enqueue(ready(1)), None);
    assert_quiet(&mut rx).await;
    assert_eq!(queue.closed().await, QueueStatus::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_settled_waits_for_everything_enqueued_before_it() {
    let (queue, mut rx) = queue(None);
    let (gate, task) = gated(1);
    queue.enqueue(task);
    queue.enqueue(ready(2));

    let waiter = queue.clone();
    let settled = tokio::spawn(async move { waiter.settled().await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!settled.is_finished());

    gate.send(()).unwrap();
    settled.await.unwrap();
    assert_eq!(queue.in_flight(), 0);
    assert_eq!(next_value(&mut rx).await, 1);
    assert_eq!(next_value(&mut rx).await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_settled_returns_when_queue_stops() {
    let (queue, _rx) = queue(None);
    let (_gate, task) = gated(1);
    queue.enqueue(task);

    let waiter = queue.clone();
    let settled = tokio::spawn(async move { waiter.settled().await });
    tokio::task::yield_now().await;
    queue.close();

    tokio::time::timeout(Duration::from_millis(20), settled)
        .await
        .expect("settled should return after close")
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_settled_on_idle_queue_returns_immediately() {
    let (queue, _rx) = queue(None);
    tokio::time::timeout(Duration::from_millis(1), queue.settled())
        .await
        .expect("nothing to wait for");
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_counts_unhandled_tasks() {
    let (queue, mut rx) = queue(None);
    let (gate, task) = gated(7);
    queue.enqueue(task);
    queue.enqueue(ready(8));
    assert_eq!(queue.in_flight(), 2);

    gate.send(()).unwrap();
    assert_eq!(next_value(&mut rx).await, 7);
    assert_eq!(next_value(&mut rx).await, 8);
    assert_quiet(&mut rx).await;
    assert_eq!(queue.in_flight(), 0);
    assert_eq!(queue.status(), QueueStatus::Running);
}

// =========================================================================
// Threads
// =========================================================================

/// Counts `on_resolved` calls that start after `closed` was set.
struct LateWatch {
    closed: Arc<AtomicBool>,
    late: Arc<AtomicUsize>,
}

impl Drain<u32> for LateWatch {
    type Error = Infallible;

    async fn on_resolved(
        &mut self,
        _seq: SequenceNumber,
        _value: u32,
    ) -> Result<(), Infallible> {
        if self.closed.load(Ordering::SeqCst) {
            self.late.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_producers_drain_contiguously() {
    const PRODUCERS: u32 = 8;
    const PER_PRODUCER: u32 = 200;

    let (queue, mut rx) = queue(None);
    let mut producers = Vec::new();
    for producer in 0..PRODUCERS {
        let queue = queue.clone();
        producers.push(tokio::spawn(async move {
            for i in 0..PER_PRODUCER {
                let value = producer * 1000 + i;
                let delay = Duration::from_micros(u64::from((value * 7) % 13) * 40);
                queue.enqueue(async move {
                    tokio::time::sleep(delay).await;
                    Ok::<_, Infallible>(value)
                });
                if i % 16 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }

    let total = u64::from(PRODUCERS * PER_PRODUCER);
    let mut last_per_producer = vec![None::<u32>; PRODUCERS as usize];
    for expected in 0..total {
        let next = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("drain stalled");
        let Some(Event::Resolved(seq, value)) = next else {
            panic!("unexpected {next:?}");
        };
        assert_eq!(seq, SequenceNumber(expected));

        // Each producer enqueued its own values in increasing order.
        let slot = &mut last_per_producer[(value / 1000) as usize];
        assert!(slot.is_none_or(|last| last < value % 1000));
        *slot = Some(value % 1000);
    }
    assert_eq!(queue.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_close_racing_resolution_emits_nothing_afterwards() {
    for round in 0..100u32 {
        let closed = Arc::new(AtomicBool::new(false));
        let late = Arc::new(AtomicUsize::new(0));
        let queue = Sequencer::spawn(
            ConnectionId::new(u64::from(round)),
            LateWatch {
                closed: Arc::clone(&closed),
                late: Arc::clone(&late),
            },
        );

        for value in 0..100u32 {
            queue.enqueue(async move {
                for _ in 0..value % 5 {
                    tokio::task::yield_now().await;
                }
                Ok::<_, Infallible>(value)
            });
        }

        let closer = queue.clone();
        let flag = Arc::clone(&closed);
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            closer.close();
            flag.store(true, Ordering::SeqCst);
        })
        .await
        .unwrap();

        assert_eq!(queue.closed().await, QueueStatus::Closed);
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(late.load(Ordering::SeqCst), 0, "round {round}");
        assert_eq!(queue.enqueue(ready(0)), None);
    }
}
