//! Output artifacts and the directory sink the binary writes them to.

use crate::Result;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

/// Number of records bundled into an artifact.
pub const MSG_COUNT: &str = "msg.count";
/// Destination topic of the bundled records.
pub const TOPIC_NAME: &str = "topic.name";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relationship {
    Success,
    Failure,
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relationship::Success => f.write_str("success"),
            Relationship::Failure => f.write_str("failure"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub relationship: Relationship,
    pub content: Bytes,
    pub attributes: BTreeMap<String, String>,
}

impl OutputArtifact {
    pub fn new(relationship: Relationship, content: Bytes) -> Self {
        Self {
            relationship,
            content,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn message_count(&self) -> Option<usize> {
        self.attribute(MSG_COUNT).and_then(|count| count.parse().ok())
    }
}

/// Writes artifacts below `<root>/<relationship>/` as a content file plus a
/// `<name>.attributes.json` sidecar.
pub struct ArtifactSink {
    root: PathBuf,
}

impl ArtifactSink {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    #[instrument(skip(self, artifact), fields(relationship = %artifact.relationship))]
    pub async fn write(&self, name: &str, artifact: &OutputArtifact) -> Result<PathBuf> {
        let dir = self.root.join(artifact.relationship.to_string());
        fs::create_dir_all(&dir).await?;

        let content_path = dir.join(name);
        fs::write(&content_path, &artifact.content).await?;

        let attributes = serde_json::to_string_pretty(&artifact.attributes)?;
        fs::write(dir.join(format!("{}.attributes.json", name)), attributes).await?;

        debug!(
            "Wrote {} bytes to {:?}",
            artifact.content.len(),
            content_path
        );
        Ok(content_path)
    }
}
