//! WHOOP payload adapter
//!
//! Parses WHOOP sleep activity payloads into sparse raw records.

use crate::error::NormalizeError;
use crate::types::{RawSleepRecord, RawWearableSleepRecord};

use super::{collection_items, SleepPayloadAdapter, SleepRecordBatch};

/// WHOOP payload adapter.
///
/// Accepts a collection page (`{"records": [...], "next_token": ...}`), a
/// combined export (`{"sleep": [...]}`), a bare array, or a single sleep
/// object. Fields the normalizer does not use are ignored.
pub struct WhoopAdapter;

impl WhoopAdapter {
    /// Parse WHOOP JSON into untagged wearable records
    pub fn parse_records(
        raw_json: &str,
    ) -> Result<(Vec<RawWearableSleepRecord>, Option<String>), NormalizeError> {
        let (items, next_token) = collection_items(raw_json, &["records", "sleep"])?;

        let records = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json::from_value::<RawWearableSleepRecord>(item).map_err(|e| {
                    NormalizeError::ParseError(format!("WHOOP sleep record {}: {}", index, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((records, next_token))
    }
}

impl SleepPayloadAdapter for WhoopAdapter {
    fn parse(&self, raw_json: &str) -> Result<SleepRecordBatch, NormalizeError> {
        let (records, next_token) = Self::parse_records(raw_json)?;
        Ok(SleepRecordBatch {
            records: records.into_iter().map(RawSleepRecord::Sparse).collect(),
            next_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScoreState;

    fn sample_record() -> &'static str {
        r#"{
            "id": "ecfc6a15-4661-442f-a9a4-f160dd7afae8",
            "cycle_id": 93845,
            "v1_id": 93845,
            "user_id": 10129,
            "created_at": "2022-04-24T11:25:44.774Z",
            "updated_at": "2022-04-24T14:25:44.774Z",
            "start": "2022-04-24T02:25:44.774Z",
            "end": "2022-04-24T10:25:44.774Z",
            "timezone_offset": "-05:00",
            "nap": false,
            "score_state": "SCORED",
            "score": {
                "stage_summary": {
                    "total_in_bed_time_milli": 30272735,
                    "total_awake_time_milli": 1403507,
                    "total_no_data_time_milli": 0,
                    "total_light_sleep_time_milli": 14905851,
                    "total_slow_wave_sleep_time_milli": 6630370,
                    "total_rem_sleep_time_milli": 5879573,
                    "sleep_cycle_count": 3,
                    "disturbance_count": 12
                },
                "sleep_needed": {
                    "baseline_milli": 27395716,
                    "need_from_sleep_debt_milli": 352230,
                    "need_from_recent_strain_milli": 208595,
                    "need_from_recent_nap_milli": -12312
                },
                "respiratory_rate": 16.11328125,
                "sleep_performance_percentage": 98,
                "sleep_consistency_percentage": 90,
                "sleep_efficiency_percentage": 91.69533
            }
        }"#
    }

    #[test]
    fn test_parse_collection_page() {
        let json = format!(
            r#"{{ "records": [{}], "next_token": "MTIzOjEyMzEyMw" }}"#,
            sample_record()
        );

        let batch = WhoopAdapter.parse(&json).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.next_token.as_deref(), Some("MTIzOjEyMzEyMw"));

        let RawSleepRecord::Sparse(record) = &batch.records[0] else {
            panic!("expected a sparse record");
        };
        assert_eq!(record.id, "ecfc6a15-4661-442f-a9a4-f160dd7afae8");
        assert_eq!(record.timezone_offset.as_deref(), Some("-05:00"));
        assert_eq!(record.score_state, ScoreState::Scored);

        let summary = record
            .score
            .as_ref()
            .and_then(|s| s.stage_summary.as_ref())
            .unwrap();
        assert_eq!(summary.sleep_cycle_count, Some(3));
        assert_eq!(summary.disturbance_count, Some(12));
        assert_eq!(summary.total_in_bed_time_milli, Some(30272735));
    }

    #[test]
    fn test_parse_single_and_array() {
        let single = WhoopAdapter.parse(sample_record()).unwrap();
        assert_eq!(single.records.len(), 1);
        assert!(single.next_token.is_none());

        let array = WhoopAdapter
            .parse(&format!("[{}, {}]", sample_record(), sample_record()))
            .unwrap();
        assert_eq!(array.records.len(), 2);
    }

    #[test]
    fn test_parse_combined_export() {
        let json = format!(r#"{{ "sleep": [{}], "recovery": [] }}"#, sample_record());
        let batch = WhoopAdapter.parse(&json).unwrap();
        assert_eq!(batch.records.len(), 1);
    }

    #[test]
    fn test_parse_pending_record_without_score() {
        let json = r#"{
            "records": [{
                "id": 17,
                "start": "2024-01-15T22:30:00.000Z",
                "end": "2024-01-16T06:30:00.000Z",
                "score_state": "PENDING_SCORE"
            }],
            "next_token": null
        }"#;
        let (records, next_token) = WhoopAdapter::parse_records(json).unwrap();
        assert_eq!(records[0].id, "17");
        assert!(records[0].score.is_none());
        assert!(next_token.is_none());
    }

    #[test]
    fn test_empty_page() {
        let batch = WhoopAdapter.parse(r#"{ "records": [] }"#).unwrap();
        assert!(batch.records.is_empty());
    }

    #[test]
    fn test_invalid_payloads() {
        assert!(matches!(
            WhoopAdapter.parse("not valid json"),
            Err(NormalizeError::JsonError(_))
        ));
        assert!(matches!(
            WhoopAdapter.parse("42"),
            Err(NormalizeError::ParseError(_))
        ));
        assert!(matches!(
            WhoopAdapter.parse(r#"{ "records": "nope" }"#),
            Err(NormalizeError::ParseError(_))
        ));
        assert!(matches!(
            WhoopAdapter.parse(r#"[{ "id": "x", "start": "2024-01-15T22:30:00Z" }]"#),
            Err(NormalizeError::ParseError(_))
        ));
    }
}
