use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub kafka: KafkaConfig,
    pub publish: PublishConfig,
    pub record: RecordConfig,
    #[serde(default)]
    pub driver: DriverConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default = "default_acks")]
    pub acks: String,
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,
    #[serde(default)]
    pub create_topic: bool,
    #[serde(default = "default_partitions")]
    pub partitions: i32,
    #[serde(default = "default_replication_factor")]
    pub replication_factor: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublishConfig {
    pub topic: String,
    #[serde(default = "default_async_enabled")]
    pub async_enabled: bool,
    /// Absent means no ceiling on in-flight publishes.
    #[serde(default)]
    pub max_async_requests: Option<usize>,
    #[serde(default)]
    pub key_fields: Vec<String>,
    /// Message property name -> input attribute name.
    #[serde(default)]
    pub mapped_properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecordConfig {
    pub schema: Vec<String>,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default = "default_trim_fields")]
    pub trim_fields: bool,
    #[serde(default)]
    pub quote_mode: QuoteMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuoteMode {
    #[default]
    All,
    Minimal,
    Never,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriverConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub max_cycles: Option<u64>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_cycles: None,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("RECORD_PUBLISH")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.kafka.brokers.is_empty() {
            return Err(Error::Config("kafka.brokers must not be empty".to_string()));
        }
        self.publish.validate()?;
        self.record.validate()?;

        for field in &self.publish.key_fields {
            if !self.record.schema.contains(field) {
                return Err(Error::Config(format!(
                    "key field '{}' is not part of the record schema",
                    field
                )));
            }
        }

        Ok(())
    }
}

impl PublishConfig {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            async_enabled: default_async_enabled(),
            max_async_requests: None,
            key_fields: Vec::new(),
            mapped_properties: BTreeMap::new(),
        }
    }

    pub fn with_max_async_requests(mut self, max: usize) -> Self {
        self.max_async_requests = Some(max);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.topic.trim().is_empty() {
            return Err(Error::Config("publish.topic must not be empty".to_string()));
        }
        if self.max_async_requests == Some(0) {
            return Err(Error::Config(
                "publish.max_async_requests must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    /// The in-flight ceiling the tracker enforces. Disabling async publishing
    /// pins it to one outstanding request.
    pub fn concurrency_ceiling(&self) -> usize {
        if !self.async_enabled {
            return 1;
        }
        self.max_async_requests.unwrap_or(usize::MAX)
    }
}

impl RecordConfig {
    pub fn new<S: Into<String>>(schema: impl IntoIterator<Item = S>) -> Self {
        Self {
            schema: schema.into_iter().map(Into::into).collect(),
            delimiter: default_delimiter(),
            trim_fields: default_trim_fields(),
            quote_mode: QuoteMode::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema.is_empty() {
            return Err(Error::Config("record.schema must name at least one field".to_string()));
        }
        if matches!(self.delimiter, '"' | '\n' | '\r') {
            return Err(Error::Config(format!(
                "record.delimiter {:?} is not allowed",
                self.delimiter
            )));
        }
        Ok(())
    }
}

fn default_compression() -> String {
    "snappy".to_string()
}

fn default_acks() -> String {
    "all".to_string()
}

fn default_linger_ms() -> u32 {
    5
}

fn default_batch_size() -> usize {
    16384
}

fn default_message_timeout_ms() -> u64 {
    30_000
}

fn default_partitions() -> i32 {
    1
}

fn default_replication_factor() -> i32 {
    1
}

fn default_async_enabled() -> bool {
    true
}

fn default_delimiter() -> char {
    ','
}

fn default_trim_fields() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    10
}
