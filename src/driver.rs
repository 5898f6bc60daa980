use crate::artifact::OutputArtifact;
use crate::config::DriverConfig;
use crate::publish::{Batch, RecordPublisher};
use crate::{Error, Result};
use std::time::Duration;
use tracing::{debug, instrument};

/// Artifacts of a resolved batch and how many cycles it took.
#[derive(Debug, Default)]
pub struct DriveReport {
    pub cycles: u64,
    pub success: Option<OutputArtifact>,
    pub failure: Option<OutputArtifact>,
}

impl DriveReport {
    pub fn artifacts(&self) -> impl Iterator<Item = &OutputArtifact> {
        self.success.iter().chain(self.failure.iter())
    }
}

/// Repeatedly invokes [`RecordPublisher::process_cycle`] until a batch
/// resolves. Between cycles it yields to the runtime so acknowledgment tasks
/// can run, and backs off for `poll_interval` after a cycle in which nothing
/// moved.
pub struct CycleDriver {
    poll_interval: Duration,
    max_cycles: Option<u64>,
}

impl CycleDriver {
    pub fn new(config: &DriverConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_cycles: config.max_cycles,
        }
    }

    #[instrument(skip_all, fields(topic = %publisher.topic(), records = batch.record_count()))]
    pub async fn drive(&self, publisher: &RecordPublisher, batch: &mut Batch) -> Result<DriveReport> {
        let mut report = DriveReport::default();

        loop {
            let mut result = publisher.process_cycle(batch);
            report.cycles += 1;
            if result.success.is_some() {
                report.success = result.success.take();
            }
            if result.failure.is_some() {
                report.failure = result.failure.take();
            }

            if !result.still_pending {
                debug!("Batch resolved after {} cycles", report.cycles);
                return Ok(report);
            }

            if let Some(max_cycles) = self.max_cycles {
                if report.cycles >= max_cycles {
                    return Err(Error::Timeout {
                        message: format!(
                            "batch still has {} records in flight and {} unsubmitted after {} cycles",
                            batch.in_flight(),
                            batch.record_count() - batch.submitted_count(),
                            report.cycles
                        ),
                    });
                }
            }

            if result.made_progress() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
    }
}
