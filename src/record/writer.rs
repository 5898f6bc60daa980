use super::Record;
use crate::config::{QuoteMode, RecordConfig};
use crate::{Error, Result};
use bytes::Bytes;

/// Renders records back into CSV lines; the rendered line is the message
/// payload sent to the broker.
#[derive(Debug, Clone)]
pub struct RecordWriter {
    width: usize,
    delimiter: char,
    quote_mode: QuoteMode,
}

impl RecordWriter {
    pub fn new(config: &RecordConfig) -> Self {
        Self {
            width: config.schema.len(),
            delimiter: config.delimiter,
            quote_mode: config.quote_mode,
        }
    }

    pub fn render(&self, record: &Record) -> Result<Bytes> {
        if record.fields.len() != self.width {
            return Err(Error::serialization(format!(
                "record {} has {} fields, schema expects {}",
                record.ordinal,
                record.fields.len(),
                self.width
            )));
        }

        let mut line = String::new();
        for (i, value) in record.fields.iter().enumerate() {
            if i > 0 {
                line.push(self.delimiter);
            }
            let needs_quotes = value.contains(self.delimiter)
                || value.contains('"')
                || value.contains('\n')
                || value.contains('\r');

            match self.quote_mode {
                QuoteMode::All => push_quoted(&mut line, value),
                QuoteMode::Minimal if needs_quotes => push_quoted(&mut line, value),
                QuoteMode::Minimal => line.push_str(value),
                QuoteMode::Never if needs_quotes => {
                    return Err(Error::serialization(format!(
                        "record {} field {} cannot be written without quoting",
                        record.ordinal, i
                    )));
                }
                QuoteMode::Never => line.push_str(value),
            }
        }
        line.push('\n');

        Ok(Bytes::from(line))
    }
}

fn push_quoted(line: &mut String, value: &str) {
    line.push('"');
    line.push_str(&value.replace('"', "\"\""));
    line.push('"');
}
