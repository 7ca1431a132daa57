//! Local session adapter
//!
//! Parses sessions that are already in canonical form, such as those kept by
//! the app locally or produced by the demo data source.

use crate::error::NormalizeError;
use crate::types::{CanonicalSleepSession, RawSleepRecord};

use super::{collection_items, SleepPayloadAdapter, SleepRecordBatch};

/// Adapter for dense, already-canonical sleep sessions
pub struct LocalSessionAdapter;

impl SleepPayloadAdapter for LocalSessionAdapter {
    fn parse(&self, raw_json: &str) -> Result<SleepRecordBatch, NormalizeError> {
        let (items, next_token) = collection_items(raw_json, &["records", "sessions"])?;

        let records = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json::from_value::<CanonicalSleepSession>(item)
                    .map(RawSleepRecord::Dense)
                    .map_err(|e| {
                        NormalizeError::ParseError(format!("local sleep session {}: {}", index, e))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SleepRecordBatch {
            records,
            next_token,
        })
    }
}
