//! Line-oriented CSV reader.
//!
//! Splits an input unit into [`Record`]s. Quoting follows RFC 4180 within a
//! single line: a quoted field may contain the delimiter and doubled quotes,
//! but not a line break. Every non-blank line must carry exactly as many
//! fields as the schema; otherwise the input as a whole is malformed.
//!
//! Blank lines produce no record. Their bytes are folded into the raw slice
//! of the preceding record (or the following one, for leading blank lines),
//! so the raw slices of all records always cover the whole input.

use super::{KeyStrategy, Record};
use crate::config::RecordConfig;
use crate::{Error, Result};
use bytes::Bytes;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RecordReader {
    width: usize,
    delimiter: char,
    trim_fields: bool,
    key: KeyStrategy,
}

impl RecordReader {
    pub fn new(config: &RecordConfig, key: KeyStrategy) -> Self {
        Self {
            width: config.schema.len(),
            delimiter: config.delimiter,
            trim_fields: config.trim_fields,
            key,
        }
    }

    pub fn parse(&self, input: &Bytes) -> Result<Vec<Record>> {
        let mut records: Vec<Record> = Vec::new();
        let mut start = 0;
        // Start of the bytes not yet owned by any record.
        let mut unowned = 0;
        // Start of the last record's raw slice.
        let mut last_start = 0;
        let mut line_number = 0;

        while start < input.len() {
            line_number += 1;
            let end = input[start..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|pos| start + pos + 1)
                .unwrap_or(input.len());
            let line_start = start;
            start = end;

            let line = std::str::from_utf8(&input[line_start..end])
                .map_err(|e| Error::malformed(format!("line {}: {}", line_number, e)))?
                .trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() {
                if let Some(last) = records.last_mut() {
                    last.raw = input.slice(last_start..end);
                    unowned = end;
                }
                continue;
            }

            let fields = split_fields(line, self.delimiter, self.trim_fields)
                .map_err(|msg| Error::malformed(format!("line {}: {}", line_number, msg)))?;
            if fields.len() != self.width {
                return Err(Error::malformed(format!(
                    "line {}: expected {} fields, found {}",
                    line_number,
                    self.width,
                    fields.len()
                )));
            }

            let key = self.key.extract_key(&fields);
            records.push(Record {
                ordinal: records.len(),
                raw: input.slice(unowned..end),
                fields,
                key,
            });
            last_start = unowned;
            unowned = end;
        }

        debug!("Parsed {} records from {} bytes", records.len(), input.len());
        Ok(records)
    }
}

/// Splits one line into fields. With `trim` set, whitespace around unquoted
/// fields and outside the quotes of quoted fields is dropped; whitespace
/// inside quotes is kept.
fn split_fields(
    line: &str,
    delimiter: char,
    trim: bool,
) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;
    let mut quoted = false;

    let finish = |field: &mut String, quoted: bool| {
        let field = std::mem::take(field);
        if trim && !quoted {
            field.trim().to_string()
        } else {
            field
        }
    };

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    // Escaped quote: "" -> "
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else if c == delimiter {
            fields.push(finish(&mut field, quoted));
            quoted = false;
        } else if c == '"' && !quoted && field.trim().is_empty() {
            field.clear();
            in_quotes = true;
            quoted = true;
        } else if quoted && trim && c.is_whitespace() {
            continue;
        } else {
            field.push(c);
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(finish(&mut field, quoted));
    Ok(fields)
}
