use crate::{Error, Result};
use tracing::debug;

/// How the message key is derived from a record's fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum KeyStrategy {
    #[default]
    None,
    /// Index of the single key field in the schema.
    Field(usize),
    /// Indices of several fields whose values are joined with `:`.
    Composite(Vec<usize>),
}

impl KeyStrategy {
    pub fn from_schema(schema: &[String], key_fields: &[String]) -> Result<Self> {
        let mut indices = Vec::with_capacity(key_fields.len());
        for name in key_fields {
            let index = schema.iter().position(|f| f == name).ok_or_else(|| {
                Error::Config(format!("key field '{}' is not part of the record schema", name))
            })?;
            indices.push(index);
        }

        Ok(match indices.len() {
            0 => KeyStrategy::None,
            1 => KeyStrategy::Field(indices[0]),
            _ => KeyStrategy::Composite(indices),
        })
    }

    pub fn extract_key(&self, fields: &[String]) -> Option<String> {
        match self {
            KeyStrategy::None => None,
            KeyStrategy::Field(index) => field_value(fields, *index).map(str::to_string),
            KeyStrategy::Composite(indices) => {
                let mut key_parts = Vec::with_capacity(indices.len());

                for index in indices {
                    match field_value(fields, *index) {
                        Some(value) => key_parts.push(value),
                        None => {
                            debug!("Missing field {} for composite key", index);
                            return None;
                        }
                    }
                }

                Some(key_parts.join(":"))
            }
        }
    }
}

fn field_value(fields: &[String], index: usize) -> Option<&str> {
    fields
        .get(index)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}
