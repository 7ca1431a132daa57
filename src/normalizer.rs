//! Sleep record normalization
//!
//! This module turns either raw record shape into a canonical sleep session.
//! - Dense records pass through unchanged (after optional validation)
//! - Sparse wearable records are mapped: local times, duration, quality,
//!   heart-rate estimate, stage blocks and synthetic REM cycles
//! - Unscored, incomplete or unparsable records fail with a typed error

use crate::config::{HeartRateHeuristics, NormalizerConfig, QualityThresholds};
use crate::error::NormalizeError;
use crate::rem::RemCycleSynthesizer;
use crate::stages::{build_stages, StageTotals};
use crate::time::{minutes_from_millis, parse_clock, parse_local_date_time};
use crate::types::{
    CanonicalSleepSession, HeartRateData, RawSleepRecord, RawWearableSleepRecord, ScoreState,
    SleepQuality, StageSummary,
};
use chrono::NaiveDate;
use rand::Rng;
use tracing::debug;

/// Normalizer for converting raw sleep records to canonical sessions.
///
/// Holds configuration only; it is safe to share between threads and call
/// concurrently. Randomness comes in through each call.
#[derive(Debug, Clone, Default)]
pub struct SleepNormalizer {
    config: NormalizerConfig,
    synthesizer: RemCycleSynthesizer,
}

impl SleepNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        let synthesizer = RemCycleSynthesizer::from_config(&config);
        Self {
            config,
            synthesizer,
        }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize a record of either shape
    pub fn normalize<R: Rng + ?Sized>(
        &self,
        record: RawSleepRecord,
        rng: &mut R,
    ) -> Result<CanonicalSleepSession, NormalizeError> {
        match record {
            RawSleepRecord::Dense(session) => {
                if self.config.validate_dense {
                    validate_session(&session)?;
                }
                Ok(session)
            }
            RawSleepRecord::Sparse(record) => self.normalize_wearable(&record, rng),
        }
    }

    /// Map a sparse wearable record onto a canonical session
    pub fn normalize_wearable<R: Rng + ?Sized>(
        &self,
        record: &RawWearableSleepRecord,
        rng: &mut R,
    ) -> Result<CanonicalSleepSession, NormalizeError> {
        let scored = record
            .score
            .as_ref()
            .filter(|_| record.score_state == ScoreState::Scored)
            .and_then(|score| score.stage_summary.as_ref().map(|summary| (score, summary)));

        let Some((score, summary)) = scored else {
            return Err(NormalizeError::UnscoredSleepData {
                id: record.id.clone(),
                score_state: record.score_state.as_str().to_string(),
            });
        };

        let aggregates = required_aggregates(&record.id, summary)?;

        let offset = record.timezone_offset.as_deref();
        let start = parse_local_date_time(&record.start, offset).ok_or_else(|| {
            NormalizeError::InvalidTimestamp(format!(
                "start '{}' of sleep record {}",
                record.start, record.id
            ))
        })?;
        let end = parse_local_date_time(&record.end, offset).ok_or_else(|| {
            NormalizeError::InvalidTimestamp(format!(
                "end '{}' of sleep record {}",
                record.end, record.id
            ))
        })?;

        let total_duration_minutes = match summary.total_in_bed_time_milli {
            Some(in_bed) => minutes_from_millis(in_bed),
            None => minutes_from_millis((end.instant - start.instant).num_milliseconds()),
        };

        let rem_cycles = self.synthesizer.synthesize(
            aggregates.totals.rem_millis,
            aggregates.cycle_count,
            aggregates.disturbance_count,
            &start.time,
            rng,
        );
        let stages = build_stages(&aggregates.totals, start.minutes_from_midnight);

        debug!(
            id = %record.id,
            date = %start.date,
            rem_cycles = rem_cycles.len(),
            stages = stages.len(),
            "Normalized wearable sleep record"
        );

        Ok(CanonicalSleepSession {
            id: record.id.clone(),
            date: start.date,
            start_time: start.time,
            end_time: end.time,
            total_duration_minutes,
            sleep_quality: infer_sleep_quality(
                score.sleep_performance_percentage,
                &self.config.quality,
            ),
            wake_ups: u32::try_from(aggregates.disturbance_count.max(0)).unwrap_or(u32::MAX),
            rem_cycles,
            stages,
            heart_rate_data: derive_heart_rate(
                score.sleep_efficiency_percentage,
                &self.config.heart_rate,
            ),
        })
    }
}

struct SummaryAggregates {
    totals: StageTotals,
    cycle_count: i64,
    disturbance_count: i64,
}

/// Every aggregate except the in-bed total must be reported; a missing one
/// is never read as zero
fn required_aggregates(
    id: &str,
    summary: &StageSummary,
) -> Result<SummaryAggregates, NormalizeError> {
    let require = |value: Option<i64>, field: &'static str| {
        value.ok_or_else(|| NormalizeError::IncompleteSleepData {
            id: id.to_string(),
            field,
        })
    };

    Ok(SummaryAggregates {
        totals: StageTotals {
            awake_millis: require(summary.total_awake_time_milli, "total_awake_time_milli")?,
            light_millis: require(
                summary.total_light_sleep_time_milli,
                "total_light_sleep_time_milli",
            )?,
            deep_millis: require(
                summary.total_slow_wave_sleep_time_milli,
                "total_slow_wave_sleep_time_milli",
            )?,
            rem_millis: require(summary.total_rem_sleep_time_milli, "total_rem_sleep_time_milli")?,
        },
        cycle_count: require(summary.sleep_cycle_count, "sleep_cycle_count")?,
        disturbance_count: require(summary.disturbance_count, "disturbance_count")?,
    })
}

/// Quantize sleep performance into a quality bucket.
///
/// Thresholds are inclusive lower bounds. Missing or non-finite performance
/// maps to `Fair`.
pub fn infer_sleep_quality(performance: Option<f64>, thresholds: &QualityThresholds) -> SleepQuality {
    match performance {
        Some(p) if p.is_finite() => {
            if p >= thresholds.excellent {
                SleepQuality::Excellent
            } else if p >= thresholds.good {
                SleepQuality::Good
            } else if p >= thresholds.fair {
                SleepQuality::Fair
            } else {
                SleepQuality::Poor
            }
        }
        _ => SleepQuality::Fair,
    }
}

/// Estimate heart-rate figures from sleep efficiency.
///
/// Efficiency is a percentage and is clamped to 100 before scaling. Spikes
/// are always empty: the sleep payload has no heart-rate stream.
pub fn derive_heart_rate(efficiency: Option<f64>, heuristics: &HeartRateHeuristics) -> HeartRateData {
    let Some(efficiency) = efficiency.filter(|e| e.is_finite() && *e > 0.0) else {
        let fallback = &heuristics.fallback;
        return HeartRateData {
            resting_bpm: fallback.resting_bpm,
            average_bpm: fallback.average_bpm,
            min_bpm: fallback.min_bpm,
            max_bpm: fallback.max_bpm,
            spikes: Vec::new(),
        };
    };

    let efficiency = efficiency.min(100.0);
    let resting =
        ((efficiency / heuristics.efficiency_divisor).round() as u32).max(heuristics.resting_floor);

    HeartRateData {
        resting_bpm: resting,
        average_bpm: resting
            .saturating_sub(heuristics.average_offset)
            .max(heuristics.average_floor),
        min_bpm: resting
            .saturating_sub(heuristics.min_offset)
            .max(heuristics.min_floor),
        max_bpm: resting.saturating_add(heuristics.max_offset),
        spikes: Vec::new(),
    }
}

/// Check a dense session against the canonical invariants
pub fn validate_session(session: &CanonicalSleepSession) -> Result<(), NormalizeError> {
    let invalid = |detail: String| {
        Err(NormalizeError::InvalidSession(format!(
            "session {}: {}",
            session.id, detail
        )))
    };

    if NaiveDate::parse_from_str(&session.date, "%Y-%m-%d").is_err() {
        return invalid(format!("date '{}' is not YYYY-MM-DD", session.date));
    }
    for (label, clock) in [("startTime", &session.start_time), ("endTime", &session.end_time)] {
        if !is_canonical_clock(clock) {
            return invalid(format!("{} '{}' is not a clock time", label, clock));
        }
    }

    for (index, cycle) in session.rem_cycles.iter().enumerate() {
        if cycle.cycle_number as usize != index + 1 {
            return invalid(format!(
                "REM cycle at position {} is numbered {}",
                index + 1,
                cycle.cycle_number
            ));
        }
        if !is_canonical_clock(&cycle.start_time) {
            return invalid(format!(
                "REM cycle {} start '{}' is not a clock time",
                cycle.cycle_number, cycle.start_time
            ));
        }
    }

    for stage in &session.stages {
        if stage.duration_minutes == 0 {
            return invalid(format!("{:?} stage has zero duration", stage.kind));
        }
        if !is_canonical_clock(&stage.start_time) {
            return invalid(format!(
                "{:?} stage start '{}' is not a clock time",
                stage.kind, stage.start_time
            ));
        }
    }

    Ok(())
}

/// Canonical clocks always carry seconds: `HH:MM:SS`
fn is_canonical_clock(clock: &str) -> bool {
    clock.len() == 8 && parse_clock(clock).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StageKind, StageSummary, WearableSleepScore};
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const MINUTE: i64 = 60_000;

    fn make_record() -> RawWearableSleepRecord {
        RawWearableSleepRecord {
            id: "sleep-42".to_string(),
            start: "2024-10-18T18:00:00.000Z".to_string(),
            end: "2024-10-19T01:30:00.000Z".to_string(),
            timezone_offset: Some("+08:00".to_string()),
            nap: false,
            score_state: ScoreState::Scored,
            score: Some(WearableSleepScore {
                stage_summary: Some(StageSummary {
                    total_in_bed_time_milli: Some(450 * MINUTE),
                    total_awake_time_milli: Some(30 * MINUTE),
                    total_light_sleep_time_milli: Some(200 * MINUTE),
                    total_slow_wave_sleep_time_milli: Some(120 * MINUTE),
                    total_rem_sleep_time_milli: Some(100 * MINUTE),
                    sleep_cycle_count: Some(4),
                    disturbance_count: Some(2),
                }),
                sleep_performance_percentage: Some(83.0),
                sleep_consistency_percentage: Some(79.0),
                sleep_efficiency_percentage: Some(88.0),
                respiratory_rate: Some(14.9),
            }),
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(2024)
    }

    #[test]
    fn test_normalize_wearable_record() {
        let normalizer = SleepNormalizer::default();
        let session = normalizer.normalize_wearable(&make_record(), &mut rng()).unwrap();

        assert_eq!(session.id, "sleep-42");
        assert_eq!(session.date, "2024-10-19");
        assert_eq!(session.start_time, "02:00:00");
        assert_eq!(session.end_time, "09:30:00");
        assert_eq!(session.total_duration_minutes, 450);
        assert_eq!(session.sleep_quality, SleepQuality::Good);
        assert_eq!(session.wake_ups, 2);
        assert_eq!(session.rem_cycles.len(), 4);
        assert_eq!(
            session.rem_cycles.iter().filter(|c| c.is_interrupted).count(),
            2
        );
        assert_eq!(
            session.heart_rate_data,
            HeartRateData {
                resting_bpm: 55,
                average_bpm: 50,
                min_bpm: 45,
                max_bpm: 67,
                spikes: vec![],
            }
        );

        let kinds: Vec<StageKind> = session.stages.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![StageKind::Awake, StageKind::Core, StageKind::Deep, StageKind::Rem]
        );
        assert_eq!(session.stages[0].start_time, "02:00:00");
    }

    #[test]
    fn test_negative_offset_keeps_utc_date() {
        let mut record = make_record();
        record.timezone_offset = Some("-08:00".to_string());
        let session = SleepNormalizer::default()
            .normalize_wearable(&record, &mut rng())
            .unwrap();
        assert_eq!(session.date, "2024-10-18");
        assert_eq!(session.start_time, "10:00:00");
    }

    #[test]
    fn test_malformed_offset_falls_back_to_utc() {
        let mut record = make_record();
        record.timezone_offset = Some("GMT+8".to_string());
        let session = SleepNormalizer::default()
            .normalize_wearable(&record, &mut rng())
            .unwrap();
        assert_eq!(session.date, "2024-10-18");
        assert_eq!(session.start_time, "18:00:00");
    }

    #[test]
    fn test_pending_score_is_rejected() {
        let mut record = make_record();
        record.score_state = ScoreState::PendingScore;
        let err = SleepNormalizer::default()
            .normalize_wearable(&record, &mut rng())
            .unwrap_err();
        match err {
            NormalizeError::UnscoredSleepData { id, score_state } => {
                assert_eq!(id, "sleep-42");
                assert_eq!(score_state, "PENDING_SCORE");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_stage_summary_is_rejected() {
        let mut record = make_record();
        if let Some(score) = record.score.as_mut() {
            score.stage_summary = None;
        }
        let result = SleepNormalizer::default().normalize_wearable(&record, &mut rng());
        assert!(matches!(result, Err(NormalizeError::UnscoredSleepData { .. })));

        record.score = None;
        let result = SleepNormalizer::default().normalize_wearable(&record, &mut rng());
        assert!(matches!(result, Err(NormalizeError::UnscoredSleepData { .. })));
    }

    #[test]
    fn test_empty_stage_summary_is_rejected() {
        let json = r#"{
            "id": "hollow",
            "start": "2024-10-18T23:00:00Z",
            "end": "2024-10-19T06:30:00Z",
            "score_state": "SCORED",
            "score": { "stage_summary": {}, "sleep_performance_percentage": 80 }
        }"#;
        let record: RawWearableSleepRecord = serde_json::from_str(json).unwrap();
        let err = SleepNormalizer::default()
            .normalize_wearable(&record, &mut rng())
            .unwrap_err();
        match err {
            NormalizeError::IncompleteSleepData { id, field } => {
                assert_eq!(id, "hollow");
                assert_eq!(field, "total_awake_time_milli");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_each_missing_aggregate_is_named() {
        let clears: [(&str, fn(&mut StageSummary)); 6] = [
            ("total_awake_time_milli", |s: &mut StageSummary| s.total_awake_time_milli = None),
            ("total_light_sleep_time_milli", |s: &mut StageSummary| s.total_light_sleep_time_milli = None),
            ("total_slow_wave_sleep_time_milli", |s: &mut StageSummary| s.total_slow_wave_sleep_time_milli = None),
            ("total_rem_sleep_time_milli", |s: &mut StageSummary| s.total_rem_sleep_time_milli = None),
            ("sleep_cycle_count", |s: &mut StageSummary| s.sleep_cycle_count = None),
            ("disturbance_count", |s: &mut StageSummary| s.disturbance_count = None),
        ];

        for (expected, clear) in clears {
            let mut record = make_record();
            if let Some(summary) = record.score.as_mut().and_then(|s| s.stage_summary.as_mut()) {
                clear(summary);
            }
            let result = SleepNormalizer::default().normalize_wearable(&record, &mut rng());
            assert!(
                matches!(
                    &result,
                    Err(NormalizeError::IncompleteSleepData { field, .. }) if *field == expected
                ),
                "{expected}: {result:?}"
            );
        }
    }

    #[test]
    fn test_unscorable_with_score_is_rejected() {
        let mut record = make_record();
        record.score_state = ScoreState::Unscorable;
        let result = SleepNormalizer::default().normalize_wearable(&record, &mut rng());
        assert!(matches!(result, Err(NormalizeError::UnscoredSleepData { .. })));
    }

    #[test]
    fn test_invalid_timestamps() {
        let mut record = make_record();
        record.start = "not a time".to_string();
        let result = SleepNormalizer::default().normalize_wearable(&record, &mut rng());
        assert!(matches!(result, Err(NormalizeError::InvalidTimestamp(_))));

        let mut record = make_record();
        record.end = "2024-13-45T99:00:00Z".to_string();
        let result = SleepNormalizer::default().normalize_wearable(&record, &mut rng());
        assert!(matches!(result, Err(NormalizeError::InvalidTimestamp(_))));
    }

    #[test]
    fn test_duration_from_wall_clock() {
        let mut record = make_record();
        if let Some(summary) = record.score.as_mut().and_then(|s| s.stage_summary.as_mut()) {
            summary.total_in_bed_time_milli = None;
        }
        let session = SleepNormalizer::default()
            .normalize_wearable(&record, &mut rng())
            .unwrap();
        assert_eq!(session.total_duration_minutes, 450);

        record.end = "2024-10-18T17:00:00.000Z".to_string();
        let session = SleepNormalizer::default()
            .normalize_wearable(&record, &mut rng())
            .unwrap();
        assert_eq!(session.total_duration_minutes, 0);
    }

    #[test]
    fn test_zero_cycles_and_zero_stage() {
        let mut record = make_record();
        if let Some(summary) = record.score.as_mut().and_then(|s| s.stage_summary.as_mut()) {
            summary.sleep_cycle_count = Some(0);
            summary.total_awake_time_milli = Some(0);
        }
        let session = SleepNormalizer::default()
            .normalize_wearable(&record, &mut rng())
            .unwrap();
        assert!(session.rem_cycles.is_empty());
        assert!(session.stages.iter().all(|s| s.kind != StageKind::Awake));
        assert_eq!(session.stages.len(), 3);
    }

    #[test]
    fn test_configured_cycle_cap() {
        let config = NormalizerConfig {
            max_rem_cycles: 2,
            ..NormalizerConfig::default()
        };
        let session = SleepNormalizer::new(config)
            .normalize_wearable(&make_record(), &mut rng())
            .unwrap();
        assert_eq!(session.rem_cycles.len(), 2);
    }

    #[test]
    fn test_quality_thresholds() {
        let t = QualityThresholds::default();
        assert_eq!(infer_sleep_quality(Some(95.0), &t), SleepQuality::Excellent);
        assert_eq!(infer_sleep_quality(Some(80.0), &t), SleepQuality::Good);
        assert_eq!(infer_sleep_quality(Some(60.0), &t), SleepQuality::Fair);
        assert_eq!(infer_sleep_quality(Some(30.0), &t), SleepQuality::Poor);

        assert_eq!(infer_sleep_quality(Some(90.0), &t), SleepQuality::Excellent);
        assert_eq!(infer_sleep_quality(Some(75.0), &t), SleepQuality::Good);
        assert_eq!(infer_sleep_quality(Some(50.0), &t), SleepQuality::Fair);
        assert_eq!(infer_sleep_quality(Some(49.999), &t), SleepQuality::Poor);

        assert_eq!(infer_sleep_quality(None, &t), SleepQuality::Fair);
        assert_eq!(infer_sleep_quality(Some(f64::NAN), &t), SleepQuality::Fair);
    }

    #[test]
    fn test_heart_rate_from_out_of_range_efficiency() {
        let h = HeartRateHeuristics::default();
        let capped = derive_heart_rate(Some(100.0), &h);

        for huge in [150.0, 1e12, f64::MAX] {
            assert_eq!(derive_heart_rate(Some(huge), &h), capped);
        }
        assert_eq!(capped.resting_bpm, 63);
        assert_eq!(capped.max_bpm, 75);

        let extreme = HeartRateHeuristics {
            efficiency_divisor: 1e-300,
            max_offset: u32::MAX,
            ..HeartRateHeuristics::default()
        };
        assert_eq!(derive_heart_rate(Some(90.0), &extreme).max_bpm, u32::MAX);
    }

    #[test]
    fn test_heart_rate_heuristic() {
        let h = HeartRateHeuristics::default();

        let high = derive_heart_rate(Some(94.0), &h);
        assert_eq!(
            (high.resting_bpm, high.average_bpm, high.min_bpm, high.max_bpm),
            (59, 54, 49, 71)
        );

        let floored = derive_heart_rate(Some(40.0), &h);
        assert_eq!(floored.resting_bpm, 48);
        assert_eq!(floored.average_bpm, 50);
        assert_eq!(floored.min_bpm, 45);
        assert_eq!(floored.max_bpm, 60);

        for missing in [None, Some(0.0), Some(-3.0)] {
            let fallback = derive_heart_rate(missing, &h);
            assert_eq!(
                (
                    fallback.resting_bpm,
                    fallback.average_bpm,
                    fallback.min_bpm,
                    fallback.max_bpm
                ),
                (60, 56, 52, 70)
            );
            assert!(fallback.spikes.is_empty());
        }
    }

    #[test]
    fn test_dense_record_is_identity() {
        let normalizer = SleepNormalizer::default();
        let session = normalizer.normalize_wearable(&make_record(), &mut rng()).unwrap();

        let first = normalizer
            .normalize(RawSleepRecord::Dense(session.clone()), &mut rng())
            .unwrap();
        let second = normalizer
            .normalize(RawSleepRecord::Dense(first.clone()), &mut StdRng::seed_from_u64(1))
            .unwrap();

        assert_eq!(first, session);
        assert_eq!(second, first);
    }

    #[test]
    fn test_dense_record_validation() {
        let normalizer = SleepNormalizer::default();
        let mut session = normalizer.normalize_wearable(&make_record(), &mut rng()).unwrap();
        session.rem_cycles.remove(0);

        let result = normalizer.normalize(RawSleepRecord::Dense(session.clone()), &mut rng());
        assert!(matches!(result, Err(NormalizeError::InvalidSession(_))));

        let lenient = SleepNormalizer::new(NormalizerConfig {
            validate_dense: false,
            ..NormalizerConfig::default()
        });
        let passed = lenient
            .normalize(RawSleepRecord::Dense(session.clone()), &mut rng())
            .unwrap();
        assert_eq!(passed, session);
    }

    #[test]
    fn test_dense_clocks_require_seconds() {
        let normalizer = SleepNormalizer::default();
        let base = normalizer.normalize_wearable(&make_record(), &mut rng()).unwrap();
        assert!(validate_session(&base).is_ok());

        let mut session = base.clone();
        session.start_time = "02:00".to_string();
        assert!(matches!(
            validate_session(&session),
            Err(NormalizeError::InvalidSession(_))
        ));

        let mut session = base.clone();
        session.rem_cycles[1].start_time = "03:40".to_string();
        assert!(validate_session(&session).is_err());

        let mut session = base;
        session.stages[0].start_time = "2:00:00".to_string();
        assert!(validate_session(&session).is_err());
    }

    #[test]
    fn test_dense_zero_length_stage_rejected() {
        let normalizer = SleepNormalizer::default();
        let mut session = normalizer.normalize_wearable(&make_record(), &mut rng()).unwrap();
        session.stages[1].duration_minutes = 0;
        assert!(matches!(
            validate_session(&session),
            Err(NormalizeError::InvalidSession(_))
        ));

        let mut session = normalizer.normalize_wearable(&make_record(), &mut rng()).unwrap();
        session.date = "19/10/2024".to_string();
        assert!(validate_session(&session).is_err());
    }

    #[test]
    fn test_sparse_dispatch_matches_direct_call() {
        let normalizer = SleepNormalizer::default();
        let direct = normalizer.normalize_wearable(&make_record(), &mut rng()).unwrap();
        let dispatched = normalizer
            .normalize(RawSleepRecord::Sparse(make_record()), &mut rng())
            .unwrap();
        assert_eq!(direct, dispatched);
    }
}
