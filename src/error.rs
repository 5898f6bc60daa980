//! Error types and result handling for record-publish.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate.
//!
//! Per-record failures ([`Error::Serialization`], [`Error::Publish`]) and
//! unparseable input ([`Error::MalformedInput`]) never escape a publish cycle:
//! they are recorded against the failure artifact instead.
//! [`Error::QueueFull`] is backpressure: the record is retried on a later
//! cycle. The remaining variants are fatal and surface to whoever drives the
//! publisher.
//!
//! # Example
//!
//! ```rust
//! use record_publish::{Error, Result};
//!
//! fn load_topic(raw: &str) -> Result<String> {
//!     if raw.is_empty() {
//!         return Err(Error::Config("topic must not be empty".to_string()));
//!     }
//!     Ok(raw.to_string())
//! }
//!
//! match load_topic("") {
//!     Ok(topic) => println!("Publishing to {}", topic),
//!     Err(Error::Config(msg)) => eprintln!("Configuration error: {}", msg),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use thiserror::Error;

/// The main error type for record-publish operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error, from the config file, environment or validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Kafka client error while creating or managing the producer.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// A record could not be rendered into a message payload.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of why the record could not be rendered
        message: String,
    },

    /// The broker rejected or failed to acknowledge a message.
    #[error("Publish error: {message}")]
    Publish {
        /// Broker-side failure description
        message: String,
    },

    /// The client's local queue is full. The message was not accepted and
    /// should be offered again once earlier messages have been delivered.
    #[error("Queue full: {message}")]
    QueueFull {
        /// Client-side description
        message: String,
    },

    /// Input content that cannot be parsed into records.
    #[error("Malformed input: {message}")]
    MalformedInput {
        /// Description of what was invalid
        message: String,
    },

    /// JSON encoding error when writing artifact attributes.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error, typically from reading inputs or writing artifacts.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A batch did not resolve within the configured number of cycles.
    #[error("Timeout error: {message}")]
    Timeout {
        /// Description of what timed out
        message: String,
    },
}

impl Error {
    pub fn serialization(message: impl Into<String>) -> Self {
        Error::Serialization {
            message: message.into(),
        }
    }

    pub fn publish(message: impl Into<String>) -> Self {
        Error::Publish {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedInput {
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

/// A convenient Result type alias for record-publish operations.
///
/// This is equivalent to `std::result::Result<T, record_publish::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
