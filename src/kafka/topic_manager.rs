use crate::config::KafkaConfig;
use crate::{Error, Result};
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Creates the destination topic when it is missing.
pub struct TopicManager {
    admin_client: AdminClient<DefaultClientContext>,
    partitions: i32,
    replication_factor: i32,
}

impl TopicManager {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let admin_client: AdminClient<_> = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .create()
            .map_err(Error::Kafka)?;

        Ok(Self {
            admin_client,
            partitions: config.partitions,
            replication_factor: config.replication_factor,
        })
    }

    #[instrument(skip(self))]
    pub async fn ensure_topic_exists(&self, topic: &str) -> Result<()> {
        if self.topic_exists(topic)? {
            debug!("Topic '{}' already exists", topic);
            return Ok(());
        }

        info!(
            "Creating topic '{}' with {} partitions",
            topic, self.partitions
        );
        let new_topic = NewTopic::new(
            topic,
            self.partitions,
            TopicReplication::Fixed(self.replication_factor),
        );
        let opts = AdminOptions::new().operation_timeout(Some(Duration::from_secs(30)));

        let results = self
            .admin_client
            .create_topics(&[new_topic], &opts)
            .await
            .map_err(Error::Kafka)?;

        for result in results {
            match result {
                Ok(created) => info!("Created topic: {}", created),
                // Another publisher won the race.
                Err((_, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    debug!("Topic '{}' was created concurrently", topic)
                }
                Err((_, code)) => return Err(Error::Kafka(KafkaError::AdminOp(code))),
            }
        }

        Ok(())
    }

    fn topic_exists(&self, topic: &str) -> Result<bool> {
        let metadata = self
            .admin_client
            .inner()
            .fetch_metadata(Some(topic), Duration::from_secs(5))
            .map_err(Error::Kafka)?;

        Ok(metadata
            .topics()
            .iter()
            .any(|t| t.name() == topic && t.error().is_none()))
    }
}
