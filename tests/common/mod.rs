#![allow(dead_code)]

use futures::FutureExt;
use record_publish::config::{DriverConfig, KafkaConfig, PublishConfig, RecordConfig};
use record_publish::publish::{MessagePublisher, OutgoingMessage, PendingAck};
use record_publish::{Error, Result};
use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const TOPIC_NAME: &str = "my-topic";

/// How the mock broker answers each publish.
pub enum Behavior {
    /// Acknowledge immediately.
    Ack,
    /// Refuse the message before it is queued.
    RefuseSend,
    /// Queue the message, then fail its acknowledgment.
    FailAck,
    /// Fail the acknowledgment of messages whose payload contains the text.
    FailMatching(&'static str),
    /// Report a full client queue for the first `n` sends, then acknowledge.
    QueueFull(usize),
    /// Never acknowledge.
    Hang,
}

/// Broker double that records every message it is handed.
pub struct MockBroker {
    behavior: Behavior,
    sent: Mutex<Vec<OutgoingMessage>>,
    queue_full_left: AtomicUsize,
    queue_full_count: AtomicUsize,
}

impl MockBroker {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        let queue_full_left = match behavior {
            Behavior::QueueFull(n) => n,
            _ => 0,
        };
        Arc::new(Self {
            behavior,
            sent: Mutex::new(Vec::new()),
            queue_full_left: AtomicUsize::new(queue_full_left),
            queue_full_count: AtomicUsize::new(0),
        })
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Sends turned away because the queue was full; not counted as sent.
    pub fn queue_full_count(&self) -> usize {
        self.queue_full_count.load(Ordering::SeqCst)
    }

    pub fn sends_with_payload(&self, payload: &[u8]) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.payload.as_ref() == payload)
            .count()
    }
}

impl MessagePublisher for MockBroker {
    fn publish_async(&self, message: OutgoingMessage) -> Result<PendingAck> {
        let full = self
            .queue_full_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if full {
            self.queue_full_count.fetch_add(1, Ordering::SeqCst);
            return Err(Error::QueueFull {
                message: "Local: Queue full".to_string(),
            });
        }

        let failing = match &self.behavior {
            Behavior::FailMatching(text) => String::from_utf8_lossy(&message.payload).contains(text),
            _ => false,
        };
        self.sent.lock().unwrap().push(message);

        match &self.behavior {
            Behavior::Ack | Behavior::QueueFull(_) => Ok(futures::future::ready(Ok(())).boxed()),
            Behavior::RefuseSend => Err(Error::publish("send refused by client")),
            Behavior::FailAck => {
                Ok(futures::future::ready(Err(Error::publish("broker rejected message"))).boxed())
            }
            Behavior::FailMatching(_) if failing => {
                Ok(futures::future::ready(Err(Error::publish("broker rejected message"))).boxed())
            }
            Behavior::FailMatching(_) => Ok(futures::future::ready(Ok(())).boxed()),
            Behavior::Hang => Ok(futures::future::pending().boxed()),
        }
    }
}

pub fn publish_config(max_async_requests: usize) -> PublishConfig {
    PublishConfig::new(TOPIC_NAME).with_max_async_requests(max_async_requests)
}

pub fn record_config() -> RecordConfig {
    RecordConfig::new(["name", "age"])
}

pub fn driver_config() -> DriverConfig {
    DriverConfig {
        poll_interval_ms: 1,
        max_cycles: None,
    }
}

/// Kafka settings for tests against a real cluster, from `TEST_KAFKA_BROKERS`.
pub fn get_test_kafka_config() -> KafkaConfig {
    KafkaConfig {
        brokers: env::var("TEST_KAFKA_BROKERS")
            .unwrap_or_else(|_| "localhost:9092".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect(),
        compression: "none".to_string(), // No compression for tests
        acks: "all".to_string(),
        linger_ms: 0, // Immediate sending for tests
        batch_size: 16384,
        message_timeout_ms: 10_000,
        create_topic: true,
        partitions: 1,
        replication_factor: 1,
    }
}
