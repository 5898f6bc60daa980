//! Bookkeeping for the publishes of one batch that are still awaiting a
//! broker acknowledgment.
//!
//! Acknowledgments are awaited on small runtime tasks whose only job is to
//! push `(ordinal, outcome)` onto the tracker's completion queue. Everything
//! else (the in-flight map, the ceiling) is owned by the tracker and touched
//! only by whoever drives the batch.

use super::broker::{MessagePublisher, OutgoingMessage};
use crate::record::{Record, RecordWriter};
use crate::{Error, Result};
use bytes::Bytes;
use futures::FutureExt;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Outcome of offering a record to the tracker.
#[derive(Debug)]
pub enum Submission {
    /// Rendered and handed to the broker.
    Accepted,
    /// The ceiling is reached, or the client's queue is full; the record
    /// comes back and holds no slot.
    Deferred(Record),
    /// The record could not be rendered. No slot was used.
    Rejected(Record, Error),
}

/// A publish whose acknowledgment has resolved.
#[derive(Debug)]
pub struct Completion {
    pub record: Record,
    pub payload: Bytes,
    pub outcome: Result<()>,
}

struct InFlightPublish {
    record: Record,
    payload: Bytes,
}

pub struct PublishTracker {
    publisher: Arc<dyn MessagePublisher>,
    writer: RecordWriter,
    topic: String,
    properties: Arc<BTreeMap<String, String>>,
    ceiling: usize,
    in_flight: HashMap<usize, InFlightPublish>,
    completions_tx: mpsc::UnboundedSender<(usize, Result<()>)>,
    completions_rx: mpsc::UnboundedReceiver<(usize, Result<()>)>,
    runtime: Handle,
}

impl PublishTracker {
    pub fn new(
        publisher: Arc<dyn MessagePublisher>,
        writer: RecordWriter,
        topic: impl Into<String>,
        properties: BTreeMap<String, String>,
        ceiling: usize,
        runtime: Handle,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        Self {
            publisher,
            writer,
            topic: topic.into(),
            properties: Arc::new(properties),
            ceiling: ceiling.max(1),
            in_flight: HashMap::new(),
            completions_tx,
            completions_rx,
            runtime,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn has_capacity(&self) -> bool {
        self.in_flight.len() < self.ceiling
    }

    pub fn submit(&mut self, record: Record) -> Submission {
        if !self.has_capacity() {
            return Submission::Deferred(record);
        }

        let payload = match self.writer.render(&record) {
            Ok(payload) => payload,
            Err(e) => return Submission::Rejected(record, e),
        };

        let ordinal = record.ordinal;
        debug_assert!(
            !self.in_flight.contains_key(&ordinal),
            "ordinal {} submitted twice",
            ordinal
        );

        let message = OutgoingMessage {
            topic: self.topic.clone(),
            key: record.key.clone(),
            payload: payload.clone(),
            properties: Arc::clone(&self.properties),
        };

        let tx = self.completions_tx.clone();
        match self.publisher.publish_async(message) {
            Ok(ack) => {
                self.runtime.spawn(async move {
                    let outcome = AssertUnwindSafe(ack)
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            Err(Error::publish("acknowledgment future panicked"))
                        });
                    // The receiver lives as long as the tracker; a dropped
                    // tracker has nobody left to tell.
                    let _ = tx.send((ordinal, outcome));
                });
            }
            Err(Error::QueueFull { message }) => {
                debug!("Client queue full, deferring record {}: {}", ordinal, message);
                return Submission::Deferred(record);
            }
            Err(e) => {
                debug!("Broker refused record {}: {}", ordinal, e);
                let _ = tx.send((ordinal, Err(e)));
            }
        }

        self.in_flight.insert(ordinal, InFlightPublish { record, payload });
        Submission::Accepted
    }

    /// Drains every acknowledgment that resolved since the previous call, in
    /// the order they resolved. Never blocks.
    pub fn poll_completed(&mut self) -> Vec<Completion> {
        let mut completed = Vec::new();

        while let Ok((ordinal, outcome)) = self.completions_rx.try_recv() {
            match self.in_flight.remove(&ordinal) {
                Some(InFlightPublish { record, payload }) => completed.push(Completion {
                    record,
                    payload,
                    outcome,
                }),
                None => warn!("Dropping acknowledgment for unknown record {}", ordinal),
            }
        }

        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecordConfig;
    use crate::publish::broker::PendingAck;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    #[derive(Default)]
    struct ManualPublisher {
        acks: Mutex<Vec<oneshot::Sender<Result<()>>>>,
    }

    impl MessagePublisher for ManualPublisher {
        fn publish_async(&self, _message: OutgoingMessage) -> Result<PendingAck> {
            let (tx, rx) = oneshot::channel();
            self.acks.lock().unwrap().push(tx);
            Ok(async move {
                rx.await
                    .unwrap_or_else(|_| Err(Error::publish("acknowledgment dropped")))
            }
            .boxed())
        }
    }

    struct RefusingPublisher;

    impl MessagePublisher for RefusingPublisher {
        fn publish_async(&self, _message: OutgoingMessage) -> Result<PendingAck> {
            Err(Error::publish("queue full"))
        }
    }

    /// Reports a full queue for the first `full_for` sends.
    struct FullQueuePublisher {
        full_for: AtomicUsize,
    }

    impl MessagePublisher for FullQueuePublisher {
        fn publish_async(&self, _message: OutgoingMessage) -> Result<PendingAck> {
            let remaining = self.full_for.load(Ordering::SeqCst);
            if remaining > 0 {
                self.full_for.store(remaining - 1, Ordering::SeqCst);
                return Err(Error::QueueFull {
                    message: "Local: Queue full".to_string(),
                });
            }
            Ok(futures::future::ready(Ok(())).boxed())
        }
    }

    struct PanickingPublisher;

    impl MessagePublisher for PanickingPublisher {
        fn publish_async(&self, _message: OutgoingMessage) -> Result<PendingAck> {
            Ok(async { panic!("delivery callback blew up") }.boxed())
        }
    }

    fn tracker(publisher: Arc<dyn MessagePublisher>, ceiling: usize) -> PublishTracker {
        PublishTracker::new(
            publisher,
            RecordWriter::new(&RecordConfig::new(["name", "age"])),
            "people",
            BTreeMap::new(),
            ceiling,
            Handle::current(),
        )
    }

    fn record(ordinal: usize) -> Record {
        Record::new(
            ordinal,
            format!("person {}, {}\n", ordinal, ordinal),
            vec![format!("person {}", ordinal), ordinal.to_string()],
        )
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_ceiling_defers_without_rendering() {
        let publisher = Arc::new(ManualPublisher::default());
        let mut tracker = tracker(publisher.clone(), 2);

        assert!(matches!(tracker.submit(record(0)), Submission::Accepted));
        assert!(matches!(tracker.submit(record(1)), Submission::Accepted));
        match tracker.submit(record(2)) {
            Submission::Deferred(back) => assert_eq!(back.ordinal, 2),
            other => panic!("expected deferral, got {:?}", other),
        }

        assert_eq!(tracker.in_flight(), 2);
        assert_eq!(publisher.acks.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_completions_arrive_in_resolution_order() {
        let publisher = Arc::new(ManualPublisher::default());
        let mut tracker = tracker(publisher.clone(), 3);
        for ordinal in 0..3 {
            tracker.submit(record(ordinal));
        }

        let acks: Vec<_> = publisher.acks.lock().unwrap().drain(..).collect();
        let mut acks = acks.into_iter().map(Some).collect::<Vec<_>>();
        acks[2].take().unwrap().send(Ok(())).unwrap();
        settle().await;
        acks[0]
            .take()
            .unwrap()
            .send(Err(Error::publish("broker down")))
            .unwrap();
        settle().await;

        let completed = tracker.poll_completed();
        assert_eq!(completed.len(), 2);
        assert_eq!(completed[0].record.ordinal, 2);
        assert!(completed[0].outcome.is_ok());
        assert_eq!(completed[1].record.ordinal, 0);
        assert!(completed[1].outcome.is_err());
        assert_eq!(
            completed[1].payload,
            Bytes::from_static(b"\"person 0\",\"0\"\n")
        );
        assert_eq!(tracker.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_poll_is_idempotent() {
        let publisher = Arc::new(ManualPublisher::default());
        let mut tracker = tracker(publisher.clone(), 1);
        tracker.submit(record(0));

        let ack = publisher.acks.lock().unwrap().pop().unwrap();
        ack.send(Ok(())).unwrap();
        settle().await;

        assert_eq!(tracker.poll_completed().len(), 1);
        assert!(tracker.poll_completed().is_empty());
        assert!(tracker.has_capacity());
    }

    #[tokio::test]
    async fn test_render_failure_uses_no_slot() {
        let publisher = Arc::new(ManualPublisher::default());
        let mut tracker = tracker(publisher.clone(), 1);

        let broken = Record::new(0, "Mary Jane\n", vec!["Mary Jane".to_string()]);
        assert!(matches!(
            tracker.submit(broken),
            Submission::Rejected(_, Error::Serialization { .. })
        ));
        assert_eq!(tracker.in_flight(), 0);
        assert!(publisher.acks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refused_send_surfaces_on_poll() {
        let mut tracker = tracker(Arc::new(RefusingPublisher), 2);

        assert!(matches!(tracker.submit(record(0)), Submission::Accepted));
        let completed = tracker.poll_completed();

        assert_eq!(completed.len(), 1);
        assert!(matches!(completed[0].outcome, Err(Error::Publish { .. })));
        assert_eq!(tracker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_full_queue_defers_and_holds_no_slot() {
        let publisher = Arc::new(FullQueuePublisher {
            full_for: AtomicUsize::new(1),
        });
        let mut tracker = tracker(publisher, 2);

        let back = match tracker.submit(record(0)) {
            Submission::Deferred(back) => back,
            other => panic!("expected deferral, got {:?}", other),
        };
        assert_eq!(tracker.in_flight(), 0);
        assert!(tracker.poll_completed().is_empty());

        assert!(matches!(tracker.submit(back), Submission::Accepted));
        settle().await;
        let completed = tracker.poll_completed();
        assert_eq!(completed.len(), 1);
        assert!(completed[0].outcome.is_ok());
    }

    #[tokio::test]
    async fn test_panicking_ack_resolves_as_failure() {
        let mut tracker = tracker(Arc::new(PanickingPublisher), 1);
        assert!(matches!(tracker.submit(record(0)), Submission::Accepted));

        settle().await;
        let completed = tracker.poll_completed();

        assert_eq!(completed.len(), 1);
        assert!(matches!(completed[0].outcome, Err(Error::Publish { .. })));
        assert_eq!(tracker.in_flight(), 0);
    }
}
