pub mod artifact;
pub mod config;
pub mod driver;
pub mod error;
pub mod record;

pub mod kafka;
pub mod publish;

pub use artifact::{ArtifactSink, OutputArtifact, Relationship};
pub use config::Config;
pub use driver::{CycleDriver, DriveReport};
pub use error::{Error, Result};
pub use publish::{Batch, CycleResult, InputUnit, MessagePublisher, RecordPublisher};
