use crate::artifact::{OutputArtifact, Relationship, MSG_COUNT, TOPIC_NAME};
use bytes::{Bytes, BytesMut};
use std::collections::BTreeMap;

/// Success and failure partitions of one batch, keyed by record ordinal so
/// that assembled content never depends on acknowledgment arrival order.
#[derive(Debug, Default)]
pub struct BatchAssembler {
    success: BTreeMap<usize, Bytes>,
    failure: BTreeMap<usize, Bytes>,
}

impl BatchAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, ordinal: usize, bytes: Bytes) {
        debug_assert!(!self.failure.contains_key(&ordinal));
        self.success.insert(ordinal, bytes);
    }

    pub fn record_failure(&mut self, ordinal: usize, bytes: Bytes) {
        debug_assert!(!self.success.contains_key(&ordinal));
        self.failure.insert(ordinal, bytes);
    }

    pub fn success_count(&self) -> usize {
        self.success.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failure.len()
    }

    pub fn resolved_count(&self) -> usize {
        self.success.len() + self.failure.len()
    }

    /// Builds one artifact per non-empty partition.
    pub fn assemble(
        &self,
        topic: &str,
        attributes: &BTreeMap<String, String>,
    ) -> (Option<OutputArtifact>, Option<OutputArtifact>) {
        let success = build(Relationship::Success, &self.success, topic, attributes);
        let failure = build(Relationship::Failure, &self.failure, topic, attributes);
        (success, failure)
    }
}

fn build(
    relationship: Relationship,
    partition: &BTreeMap<usize, Bytes>,
    topic: &str,
    attributes: &BTreeMap<String, String>,
) -> Option<OutputArtifact> {
    if partition.is_empty() {
        return None;
    }

    let size: usize = partition.values().map(Bytes::len).sum();
    let mut content = BytesMut::with_capacity(size);
    for bytes in partition.values() {
        content.extend_from_slice(bytes);
    }

    let mut artifact = OutputArtifact::new(relationship, content.freeze());
    artifact.attributes = attributes.clone();
    Some(
        artifact
            .with_attribute(MSG_COUNT, partition.len().to_string())
            .with_attribute(TOPIC_NAME, topic),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembles_in_ordinal_order() {
        let mut assembler = BatchAssembler::new();
        assembler.record_success(2, Bytes::from_static(b"c\n"));
        assembler.record_failure(1, Bytes::from_static(b"\"b\"\n"));
        assembler.record_success(0, Bytes::from_static(b"a\n"));
        assembler.record_success(3, Bytes::from_static(b"d\n"));

        assert_eq!(assembler.resolved_count(), 4);
        let (success, failure) = assembler.assemble("people", &BTreeMap::new());

        let success = success.unwrap();
        assert_eq!(success.content, Bytes::from_static(b"a\nc\nd\n"));
        assert_eq!(success.attribute(MSG_COUNT), Some("3"));
        assert_eq!(success.attribute(TOPIC_NAME), Some("people"));

        let failure = failure.unwrap();
        assert_eq!(failure.relationship, Relationship::Failure);
        assert_eq!(failure.content, Bytes::from_static(b"\"b\"\n"));
        assert_eq!(failure.message_count(), Some(1));
    }

    #[test]
    fn test_empty_partition_yields_no_artifact() {
        let mut assembler = BatchAssembler::new();
        assembler.record_success(0, Bytes::from_static(b"a\n"));

        let mut attributes = BTreeMap::new();
        attributes.insert("filename".to_string(), "people.csv".to_string());
        let (success, failure) = assembler.assemble("people", &attributes);

        assert!(failure.is_none());
        assert_eq!(success.unwrap().attribute("filename"), Some("people.csv"));
    }
}
