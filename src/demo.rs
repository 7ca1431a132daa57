//! Built-in demo data
//!
//! Four scored, WHOOP-shaped nights used when no wearable is connected. They
//! go through the same normalizer as real records.

use crate::error::NormalizeError;
use crate::normalizer::SleepNormalizer;
use crate::types::{
    CanonicalSleepSession, RawWearableSleepRecord, ScoreState, StageSummary, WearableSleepScore,
};
use rand::Rng;
use serde_json::json;

const MINUTE: i64 = 60_000;
const DEMO_TIMEZONE_OFFSET: &str = "-04:00";

struct DemoNight {
    start: &'static str,
    end: &'static str,
    /// in bed, awake, light, deep, REM
    minutes: [i64; 5],
    cycles: i64,
    disturbances: i64,
    respiratory_rate: f64,
    performance: f64,
    consistency: f64,
    efficiency: f64,
}

const DEMO_NIGHTS: [DemoNight; 4] = [
    DemoNight {
        start: "2025-10-18T23:30:00.000Z",
        end: "2025-10-19T07:45:00.000Z",
        minutes: [495, 26, 210, 130, 105],
        cycles: 4,
        disturbances: 1,
        respiratory_rate: 14.6,
        performance: 92.0,
        consistency: 88.0,
        efficiency: 94.0,
    },
    DemoNight {
        start: "2025-10-17T23:45:00.000Z",
        end: "2025-10-18T07:10:00.000Z",
        minutes: [445, 35, 185, 118, 90],
        cycles: 4,
        disturbances: 2,
        respiratory_rate: 14.9,
        performance: 83.0,
        consistency: 79.0,
        efficiency: 88.0,
    },
    DemoNight {
        start: "2025-10-16T23:20:00.000Z",
        end: "2025-10-17T06:50:00.000Z",
        minutes: [450, 28, 200, 120, 100],
        cycles: 4,
        disturbances: 1,
        respiratory_rate: 14.3,
        performance: 87.0,
        consistency: 84.0,
        efficiency: 91.0,
    },
    DemoNight {
        start: "2025-10-15T23:50:00.000Z",
        end: "2025-10-16T07:30:00.000Z",
        minutes: [460, 45, 205, 110, 95],
        cycles: 4,
        disturbances: 3,
        respiratory_rate: 15.2,
        performance: 74.0,
        consistency: 72.0,
        efficiency: 85.0,
    },
];

/// The demo nights as raw wearable records, most recent first
pub fn demo_wearable_records() -> Vec<RawWearableSleepRecord> {
    DEMO_NIGHTS
        .iter()
        .enumerate()
        .map(|(index, night)| {
            let [in_bed, awake, light, deep, rem] = night.minutes;
            RawWearableSleepRecord {
                id: format!("whoop-demo-{}", index),
                start: night.start.to_string(),
                end: night.end.to_string(),
                timezone_offset: Some(DEMO_TIMEZONE_OFFSET.to_string()),
                nap: false,
                score_state: ScoreState::Scored,
                score: Some(WearableSleepScore {
                    stage_summary: Some(StageSummary {
                        total_in_bed_time_milli: Some(in_bed * MINUTE),
                        total_awake_time_milli: Some(awake * MINUTE),
                        total_light_sleep_time_milli: Some(light * MINUTE),
                        total_slow_wave_sleep_time_milli: Some(deep * MINUTE),
                        total_rem_sleep_time_milli: Some(rem * MINUTE),
                        sleep_cycle_count: Some(night.cycles),
                        disturbance_count: Some(night.disturbances),
                    }),
                    sleep_performance_percentage: Some(night.performance),
                    sleep_consistency_percentage: Some(night.consistency),
                    sleep_efficiency_percentage: Some(night.efficiency),
                    respiratory_rate: Some(night.respiratory_rate),
                }),
            }
        })
        .collect()
}

/// The demo nights normalized into canonical sessions
pub fn demo_sleep_sessions<R: Rng + ?Sized>(
    normalizer: &SleepNormalizer,
    rng: &mut R,
) -> Result<Vec<CanonicalSleepSession>, NormalizeError> {
    demo_wearable_records()
        .iter()
        .map(|record| normalizer.normalize_wearable(record, rng))
        .collect()
}

/// The demo nights as a WHOOP collection page
pub fn demo_whoop_json() -> Result<String, NormalizeError> {
    Ok(serde_json::to_string(&json!({
        "records": demo_wearable_records(),
        "next_token": null,
    }))?)
}
