//! File-reference extraction from untyped generation responses.
//!
//! The service does not commit to a response schema. Any string that sits at
//! the top level, in a top-level list, or as a value (or list value) of a
//! top-level object is taken to be a path to an output file. Nothing here
//! can fail on shape; finding no references is a normal outcome.

use serde_json::{Map, Value};
use slide_client::ResponseBody;

use crate::error::ResponseParseDegradation;

/// A generation response classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationResult {
    Text(String),
    Sequence(Vec<Value>),
    Mapping(Map<String, Value>),
    Other(Value),
}

impl From<Value> for GenerationResult {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => GenerationResult::Text(text),
            Value::Array(items) => GenerationResult::Sequence(items),
            Value::Object(map) => GenerationResult::Mapping(map),
            other => GenerationResult::Other(other),
        }
    }
}

impl GenerationResult {
    /// Classify a response body. A body that is not JSON cannot be read for
    /// references.
    pub fn interpret(body: &ResponseBody) -> Result<Self, ResponseParseDegradation> {
        match body {
            ResponseBody::Json(value) => Ok(value.clone().into()),
            ResponseBody::Text(text) => serde_json::from_str::<Value>(text)
                .map(Into::into)
                .map_err(|e| ResponseParseDegradation {
                    reason: e.to_string(),
                }),
        }
    }

    pub fn file_references(&self) -> Vec<String> {
        extract_file_references(self)
    }
}

/// Every string that looks like an output file location, in response order.
/// Duplicates are kept.
pub fn extract_file_references(result: &GenerationResult) -> Vec<String> {
    match result {
        GenerationResult::Text(text) => vec![text.clone()],
        GenerationResult::Sequence(items) => strings_in(items).collect(),
        GenerationResult::Mapping(map) => map
            .values()
            .flat_map(|value| match value {
                Value::String(text) => vec![text.clone()],
                Value::Array(items) => strings_in(items).collect(),
                _ => Vec::new(),
            })
            .collect(),
        GenerationResult::Other(_) => Vec::new(),
    }
}

fn strings_in(items: &[Value]) -> impl Iterator<Item = String> + '_ {
    items.iter().filter_map(|item| item.as_str().map(str::to_string))
}

/// Name to save a reference under: its last component on either separator.
pub fn reference_file_name(reference: &str) -> &str {
    reference
        .rsplit(['/', '\\'])
        .find(|part| !part.is_empty())
        .unwrap_or(reference)
}
