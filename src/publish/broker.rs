use crate::Result;
use bytes::Bytes;
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Acknowledgment of a single publish, resolved by the broker client.
pub type PendingAck = BoxFuture<'static, Result<()>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub topic: String,
    pub key: Option<String>,
    pub payload: Bytes,
    /// Message properties, sent as headers where the broker supports them.
    pub properties: Arc<BTreeMap<String, String>>,
}

/// The broker client seam.
///
/// `publish_async` must not wait for the broker: it hands the message to the
/// client and returns a future for the acknowledgment. An `Err` means the
/// client refused the message outright (queue full, closed producer, ...).
pub trait MessagePublisher: Send + Sync {
    fn publish_async(&self, message: OutgoingMessage) -> Result<PendingAck>;
}
