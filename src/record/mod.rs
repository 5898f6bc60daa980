pub mod key_strategy;
pub mod reader;
pub mod writer;

pub use key_strategy::KeyStrategy;
pub use reader::RecordReader;
pub use writer::RecordWriter;

use bytes::Bytes;

/// One parsed input line destined for the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Position of the record within its batch, starting at zero.
    pub ordinal: usize,
    /// The line exactly as it appeared in the input, terminator included.
    pub raw: Bytes,
    pub fields: Vec<String>,
    pub key: Option<String>,
}

impl Record {
    pub fn new(ordinal: usize, raw: impl Into<Bytes>, fields: Vec<String>) -> Self {
        Self {
            ordinal,
            raw: raw.into(),
            fields,
            key: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}
