use super::assembler::BatchAssembler;
use super::tracker::PublishTracker;
use crate::artifact::OutputArtifact;
use crate::record::Record;
use bytes::Bytes;
use std::collections::{BTreeMap, VecDeque};

/// Raw content plus the attributes it arrived with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputUnit {
    pub content: Bytes,
    pub attributes: BTreeMap<String, String>,
}

impl InputUnit {
    pub fn new(content: impl Into<Bytes>) -> Self {
        Self {
            content: content.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Some records have not been handed to the broker yet.
    Open,
    /// Everything is submitted; acknowledgments are outstanding.
    Draining,
    /// Every record has an outcome and the artifacts have been emitted.
    Resolved,
}

/// What a single cycle produced.
#[derive(Debug, Default)]
pub struct CycleResult {
    pub still_pending: bool,
    pub success: Option<OutputArtifact>,
    pub failure: Option<OutputArtifact>,
    /// Records handed to the broker this cycle.
    pub submitted: usize,
    /// Records that reached an outcome this cycle.
    pub resolved: usize,
}

impl CycleResult {
    pub fn made_progress(&self) -> bool {
        self.submitted > 0 || self.resolved > 0 || !self.still_pending
    }
}

/// All records derived from one input unit, tracked until each has an
/// outcome. Created by [`RecordPublisher::open`](super::RecordPublisher::open)
/// and handed back to `process_cycle` until it resolves.
pub struct Batch {
    pub(super) input: InputUnit,
    pub(super) record_count: usize,
    pub(super) unsubmitted: VecDeque<Record>,
    /// Set when the input produced no records; the raw content goes to
    /// failure as a whole.
    pub(super) malformed: Option<String>,
    pub(super) tracker: PublishTracker,
    pub(super) assembler: BatchAssembler,
    pub(super) state: BatchState,
    pub(super) cycles: u64,
}

impl Batch {
    pub(super) fn new(
        input: InputUnit,
        records: Vec<Record>,
        malformed: Option<String>,
        tracker: PublishTracker,
    ) -> Self {
        Self {
            input,
            record_count: records.len(),
            unsubmitted: records.into(),
            malformed,
            tracker,
            assembler: BatchAssembler::new(),
            state: BatchState::Open,
            cycles: 0,
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn is_resolved(&self) -> bool {
        self.state == BatchState::Resolved
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn submitted_count(&self) -> usize {
        self.record_count - self.unsubmitted.len()
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.in_flight()
    }

    pub fn success_count(&self) -> usize {
        self.assembler.success_count()
    }

    pub fn failure_count(&self) -> usize {
        self.assembler.failure_count()
    }

    /// Cycles run against this batch so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn input(&self) -> &InputUnit {
        &self.input
    }
}
