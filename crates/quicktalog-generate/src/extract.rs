//! Structured-data extraction from model responses.
//!
//! Model output routinely wraps valid JSON in prose or Markdown fences.
//! The extractor strips fence markers, slices from the first opening
//! delimiter to the last matching closing delimiter, and parses the slice.
//! Nested unrelated braces in surrounding prose can still corrupt the
//! slice; that limitation is accepted and callers treat extraction
//! failures as recoverable per stage.

use quicktalog_core::{Error, Result};

/// Expected top-level JSON shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Object,
    Array,
}

impl Shape {
    fn delimiters(&self) -> (char, char) {
        match self {
            Shape::Object => ('{', '}'),
            Shape::Array => ('[', ']'),
        }
    }
}

/// Extract and parse the outermost JSON object or array from `raw`.
pub fn extract(raw: &str, shape: Shape) -> Result<serde_json::Value> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    let (open, close) = shape.delimiters();

    let start = cleaned.find(open).ok_or(Error::NoStructuredData)?;
    let end = cleaned.rfind(close).ok_or(Error::NoStructuredData)?;
    if end < start {
        return Err(Error::NoStructuredData);
    }

    let slice = &cleaned[start..=end];
    serde_json::from_str(slice).map_err(|e| Error::MalformedJson(e.to_string()))
}
