//! Sleep payload adapters
//!
//! This module parses raw JSON payloads at the crate boundary and tags every
//! record with its shape, so the normalizer dispatches on a [`RawSleepRecord`]
//! variant instead of inspecting fields.

mod local;
mod whoop;

pub use local::LocalSessionAdapter;
pub use whoop::WhoopAdapter;

use crate::error::NormalizeError;
use crate::types::RawSleepRecord;
use serde_json::Value;

/// One page of tagged raw records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SleepRecordBatch {
    pub records: Vec<RawSleepRecord>,
    /// Pagination cursor reported by the source, if any
    pub next_token: Option<String>,
}

/// Trait for sleep payload adapters
pub trait SleepPayloadAdapter {
    /// Parse raw JSON into tagged records
    fn parse(&self, raw_json: &str) -> Result<SleepRecordBatch, NormalizeError>;
}

/// Split a payload into its record values.
///
/// Accepts a bare array, an object holding the array under one of
/// `collection_keys` (with an optional `next_token`), or a single record
/// object.
pub(crate) fn collection_items(
    raw_json: &str,
    collection_keys: &[&str],
) -> Result<(Vec<Value>, Option<String>), NormalizeError> {
    let value: Value = serde_json::from_str(raw_json)?;

    match value {
        Value::Array(items) => Ok((items, None)),
        Value::Object(mut map) => {
            for key in collection_keys {
                let Some(items) = map.remove(*key) else {
                    continue;
                };
                let next_token = map
                    .remove("next_token")
                    .or_else(|| map.remove("nextToken"))
                    .and_then(|token| token.as_str().map(str::to_string));

                return match items {
                    Value::Array(items) => Ok((items, next_token)),
                    Value::Null => Ok((Vec::new(), next_token)),
                    other => Err(NormalizeError::ParseError(format!(
                        "'{}' must be an array, got {}",
                        key,
                        json_kind(&other)
                    ))),
                };
            }
            Ok((vec![Value::Object(map)], None))
        }
        other => Err(NormalizeError::ParseError(format!(
            "expected a record, an array of records, or a page object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
