use super::batch::{Batch, BatchState, CycleResult, InputUnit};
use super::broker::MessagePublisher;
use super::tracker::{PublishTracker, Submission};
use crate::artifact::{OutputArtifact, Relationship, TOPIC_NAME};
use crate::config::{PublishConfig, RecordConfig};
use crate::record::{KeyStrategy, RecordReader, RecordWriter};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Turns input units into batches and advances them one cycle at a time.
///
/// `process_cycle` never waits on the broker. It submits whatever the
/// in-flight ceiling admits, collects whatever acknowledgments have arrived,
/// and returns. Callers keep handing the same [`Batch`] back until
/// [`CycleResult::still_pending`] is false.
pub struct RecordPublisher {
    publisher: Arc<dyn MessagePublisher>,
    reader: RecordReader,
    writer: RecordWriter,
    config: PublishConfig,
    runtime: Handle,
}

impl RecordPublisher {
    /// Must be called from within a tokio runtime; acknowledgments are
    /// awaited on that runtime.
    pub fn new(
        publisher: Arc<dyn MessagePublisher>,
        publish: PublishConfig,
        record: &RecordConfig,
    ) -> Result<Self> {
        publish.validate()?;
        record.validate()?;

        let runtime = Handle::try_current().map_err(|e| {
            Error::Config(format!("record publisher requires a tokio runtime: {}", e))
        })?;
        let key = KeyStrategy::from_schema(&record.schema, &publish.key_fields)?;

        info!(
            topic = %publish.topic,
            async_enabled = publish.async_enabled,
            max_async_requests = ?publish.max_async_requests,
            "Record publisher ready"
        );

        Ok(Self {
            publisher,
            reader: RecordReader::new(record, key),
            writer: RecordWriter::new(record),
            config: publish,
            runtime,
        })
    }

    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    /// Parses the input and prepares a batch. Unparseable input is not an
    /// error here: the batch resolves on its first cycle into a single
    /// failure artifact holding the raw content.
    pub fn open(&self, input: InputUnit) -> Batch {
        let (records, malformed) = match self.reader.parse(&input.content) {
            Ok(records) if records.is_empty() => {
                (Vec::new(), Some("input contains no records".to_string()))
            }
            Ok(records) => (records, None),
            Err(e) => (Vec::new(), Some(e.to_string())),
        };

        let tracker = PublishTracker::new(
            Arc::clone(&self.publisher),
            self.writer.clone(),
            self.config.topic.clone(),
            self.mapped_properties(&input.attributes),
            self.config.concurrency_ceiling(),
            self.runtime.clone(),
        );

        debug!(
            "Opened batch of {} records ({} bytes)",
            records.len(),
            input.content.len()
        );
        Batch::new(input, records, malformed, tracker)
    }

    pub fn process_cycle(&self, batch: &mut Batch) -> CycleResult {
        if batch.state == BatchState::Resolved {
            return CycleResult::default();
        }
        batch.cycles += 1;

        if let Some(reason) = batch.malformed.take() {
            warn!("Routing entire input to failure: {}", reason);
            batch.state = BatchState::Resolved;
            let mut failure =
                OutputArtifact::new(Relationship::Failure, batch.input.content.clone());
            failure.attributes = batch.input.attributes.clone();
            let failure = failure.with_attribute(TOPIC_NAME, self.config.topic.as_str());

            return CycleResult {
                still_pending: false,
                failure: Some(failure),
                ..CycleResult::default()
            };
        }

        let mut submitted = 0;
        let mut resolved = 0;

        while let Some(record) = batch.unsubmitted.pop_front() {
            match batch.tracker.submit(record) {
                Submission::Accepted => submitted += 1,
                Submission::Rejected(record, e) => {
                    debug!("Record {} failed before publishing: {}", record.ordinal, e);
                    batch.assembler.record_failure(record.ordinal, record.raw);
                    resolved += 1;
                }
                Submission::Deferred(record) => {
                    batch.unsubmitted.push_front(record);
                    break;
                }
            }
        }

        for completion in batch.tracker.poll_completed() {
            let ordinal = completion.record.ordinal;
            match completion.outcome {
                Ok(()) => batch.assembler.record_success(ordinal, completion.record.raw),
                Err(e) => {
                    debug!("Record {} failed to publish: {}", ordinal, e);
                    batch.assembler.record_failure(ordinal, completion.payload);
                }
            }
            resolved += 1;
        }

        batch.state = if !batch.unsubmitted.is_empty() {
            BatchState::Open
        } else if batch.tracker.in_flight() > 0 {
            BatchState::Draining
        } else {
            BatchState::Resolved
        };

        if batch.state != BatchState::Resolved {
            return CycleResult {
                still_pending: true,
                submitted,
                resolved,
                ..CycleResult::default()
            };
        }

        debug_assert_eq!(batch.assembler.resolved_count(), batch.record_count);
        let (success, failure) = batch
            .assembler
            .assemble(&self.config.topic, &batch.input.attributes);

        if batch.assembler.failure_count() > 0 {
            warn!(
                topic = %self.config.topic,
                published = batch.assembler.success_count(),
                failed = batch.assembler.failure_count(),
                cycles = batch.cycles,
                "Batch resolved with failures"
            );
        } else {
            info!(
                topic = %self.config.topic,
                published = batch.assembler.success_count(),
                cycles = batch.cycles,
                "Batch published"
            );
        }

        CycleResult {
            still_pending: false,
            success,
            failure,
            submitted,
            resolved,
        }
    }

    fn mapped_properties(&self, attributes: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        self.config
            .mapped_properties
            .iter()
            .filter_map(|(property, attribute)| {
                attributes
                    .get(attribute)
                    .map(|value| (property.clone(), value.clone()))
            })
            .collect()
    }
}
