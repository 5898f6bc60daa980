use crate::config::KafkaConfig;
use crate::publish::{MessagePublisher, OutgoingMessage, PendingAck};
use crate::{Error, Result};
use futures::FutureExt;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::{debug, info};

/// Broker client backed by librdkafka. Delivery reports are resolved on
/// librdkafka's own threads.
pub struct KafkaPublisher {
    producer: FutureProducer,
}

impl KafkaPublisher {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let client_config = client_config(config);
        debug!("rdkafka configuration: {:?}", client_config);

        let producer: FutureProducer = client_config.create().map_err(Error::Kafka)?;
        info!("Kafka producer created for brokers {}", config.brokers.join(","));

        Ok(Self { producer })
    }

    /// Waits for every queued message to be delivered or to fail.
    pub fn flush(&self, timeout: Duration) -> Result<()> {
        self.producer.flush(timeout).map_err(Error::Kafka)
    }
}

pub(crate) fn client_config(config: &KafkaConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", config.brokers.join(","))
        .set("compression.type", &config.compression)
        .set("acks", &config.acks)
        .set("linger.ms", config.linger_ms.to_string())
        .set("batch.size", config.batch_size.to_string())
        .set("message.timeout.ms", config.message_timeout_ms.to_string());
    client_config
}

/// A full local queue is backpressure, not a delivery failure.
pub(crate) fn send_error(e: KafkaError) -> Error {
    match e {
        KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull) => Error::QueueFull {
            message: e.to_string(),
        },
        e => Error::publish(e.to_string()),
    }
}

impl MessagePublisher for KafkaPublisher {
    fn publish_async(&self, message: OutgoingMessage) -> Result<PendingAck> {
        let mut headers = OwnedHeaders::new_with_capacity(message.properties.len());
        for (name, value) in message.properties.iter() {
            headers = headers.insert(Header {
                key: name.as_str(),
                value: Some(value.as_str()),
            });
        }

        let mut record: FutureRecord<'_, str, [u8]> = FutureRecord::to(&message.topic)
            .payload(&message.payload[..])
            .headers(headers);
        if let Some(key) = message.key.as_deref() {
            record = record.key(key);
        }

        let delivery = self
            .producer
            .send_result(record)
            .map_err(|(e, _)| send_error(e))?;

        Ok(async move {
            match delivery.await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err((e, _))) => Err(Error::publish(e.to_string())),
                Err(_) => Err(Error::publish(
                    "delivery cancelled before the broker acknowledged it",
                )),
            }
        }
        .boxed())
    }
}
