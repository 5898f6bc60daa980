pub mod assembler;
pub mod batch;
pub mod broker;
pub mod processor;
pub mod tracker;


pub use assembler::BatchAssembler;
pub use batch::{Batch, BatchState, CycleResult, InputUnit};
pub use broker::{MessagePublisher, OutgoingMessage, PendingAck};
pub use processor::RecordPublisher;
pub use tracker::{Completion, PublishTracker, Submission};
