//! Parser boundary: raw payloads in, canonical entities out.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::bundle::Payload;
use super::error::ParseError;
use crate::dataset::{DataSetFormat, DatasetDescriptor};
use crate::domain::CanonicalEntity;

/// Turns one payload of a feed format into canonical entities.
///
/// Implementations skip records they don't understand; they only fail
/// when the payload as a whole can't be read.
pub trait Parser: Send + Sync {
    fn parse(
        &self,
        payload: &Payload,
        dataset: &DatasetDescriptor,
    ) -> Result<Vec<CanonicalEntity>, ParseError>;
}

/// Parsers keyed by the format they handle.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: HashMap<DataSetFormat, Arc<dyn Parser>>,
}

impl ParserRegistry {
    /// A registry with only the in-crate canonical JSON parser.
    pub fn new() -> Self {
        Self::default().with_parser(DataSetFormat::CtdfJson, Arc::new(JsonEntityParser))
    }

    /// Register (or replace) the parser for `format`.
    pub fn with_parser(mut self, format: DataSetFormat, parser: Arc<dyn Parser>) -> Self {
        self.parsers.insert(format, parser);
        self
    }

    pub fn get(&self, format: DataSetFormat) -> Option<Arc<dyn Parser>> {
        self.parsers.get(&format).cloned()
    }
}

/// Parses canonical entities encoded as JSON, one per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEntityParser;

impl Parser for JsonEntityParser {
    fn parse(
        &self,
        payload: &Payload,
        dataset: &DatasetDescriptor,
    ) -> Result<Vec<CanonicalEntity>, ParseError> {
        if dataset.format != DataSetFormat::CtdfJson {
            return Err(ParseError::UnsupportedFormat(dataset.format));
        }

        let text = std::str::from_utf8(&payload.bytes).map_err(|e| ParseError::Malformed {
            message: format!("{}: {e}", payload.name),
        })?;

        let mut entities = Vec::new();
        let mut rejected = 0usize;

        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<CanonicalEntity>(line) {
                Ok(entity) => entities.push(entity),
                Err(e) => {
                    rejected += 1;
                    debug!(
                        payload = %payload.name,
                        line = number + 1,
                        error = %e,
                        "Skipping unreadable record"
                    );
                }
            }
        }

        if entities.is_empty() && rejected > 0 {
            return Err(ParseError::Malformed {
                message: format!("{}: no readable records", payload.name),
            });
        }

        Ok(entities)
    }
}
