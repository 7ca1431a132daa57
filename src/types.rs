//! Core types for the Dream Flux normalization layer
//!
//! This module defines the data structures on both sides of the normalization
//! boundary: the sparse wearable sleep record as the vendor reports it, the
//! dense canonical sleep session consumed downstream, and the tagged union
//! that carries either one into the normalizer.

use serde::{Deserialize, Deserializer, Serialize};

/// Scoring state reported by the wearable for a sleep record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreState {
    Scored,
    PendingScore,
    Unscorable,
}

impl ScoreState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreState::Scored => "SCORED",
            ScoreState::PendingScore => "PENDING_SCORE",
            ScoreState::Unscorable => "UNSCORABLE",
        }
    }
}

/// Sparse sleep record as returned by the wearable API.
///
/// Only aggregate statistics are available; there is no per-cycle timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawWearableSleepRecord {
    /// Opaque identifier (the API has used both integers and UUIDs)
    #[serde(deserialize_with = "deserialize_record_id")]
    pub id: String,
    /// Sleep start (ISO-8601, UTC)
    pub start: String,
    /// Sleep end (ISO-8601, UTC)
    pub end: String,
    /// Wearer's local offset at sleep time, e.g. "-04:00"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone_offset: Option<String>,
    /// Whether the vendor classified this sleep as a nap
    #[serde(default)]
    pub nap: bool,
    pub score_state: ScoreState,
    /// Present only when `score_state` is `SCORED`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<WearableSleepScore>,
}

/// Aggregate scoring payload of a wearable sleep record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WearableSleepScore {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_summary: Option<StageSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_performance_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_consistency_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_efficiency_percentage: Option<f64>,
    /// Breaths per minute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respiratory_rate: Option<f64>,
}

/// Per-stage totals in milliseconds, plus cycle and disturbance counts.
///
/// Fields are optional on the wire so a scored record with a partial summary
/// still parses; the normalizer rejects it with
/// [`crate::error::NormalizeError::IncompleteSleepData`]. Only the in-bed
/// total has a fallback (the wall-clock span).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_in_bed_time_milli: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_awake_time_milli: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_light_sleep_time_milli: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_slow_wave_sleep_time_milli: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_rem_sleep_time_milli: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_cycle_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disturbance_count: Option<i64>,
}

/// Quantized sleep quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepQuality {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl SleepQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            SleepQuality::Poor => "poor",
            SleepQuality::Fair => "fair",
            SleepQuality::Good => "good",
            SleepQuality::Excellent => "excellent",
        }
    }
}

/// One synthetic REM period within a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemCycle {
    /// 1-based position in the night
    pub cycle_number: u32,
    /// Local clock time, HH:MM:SS
    pub start_time: String,
    pub duration_minutes: u32,
    pub is_interrupted: bool,
    pub is_primary_dream: bool,
}

/// Sleep stage classification used by canonical sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageKind {
    Awake,
    /// Light sleep
    Core,
    Deep,
    #[serde(rename = "REM")]
    Rem,
}

/// A contiguous block of one sleep stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepStage {
    #[serde(rename = "type")]
    pub kind: StageKind,
    /// Local clock time, HH:MM:SS
    pub start_time: String,
    pub duration_minutes: u32,
}

/// A heart-rate excursion above baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartRateSpike {
    pub time: String,
    pub bpm: u32,
    pub percentage_above_baseline: f64,
    pub context: String,
}

/// Heart-rate summary for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartRateData {
    #[serde(rename = "restingBPM")]
    pub resting_bpm: u32,
    #[serde(rename = "averageBPM")]
    pub average_bpm: u32,
    #[serde(rename = "minBPM")]
    pub min_bpm: u32,
    #[serde(rename = "maxBPM")]
    pub max_bpm: u32,
    #[serde(default)]
    pub spikes: Vec<HeartRateSpike>,
}

/// Dense, source-independent sleep session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalSleepSession {
    pub id: String,
    /// Local date of sleep onset (YYYY-MM-DD)
    pub date: String,
    /// Local clock time, HH:MM:SS
    pub start_time: String,
    /// Local clock time, HH:MM:SS
    pub end_time: String,
    pub total_duration_minutes: u32,
    pub sleep_quality: SleepQuality,
    pub wake_ups: u32,
    pub rem_cycles: Vec<RemCycle>,
    pub stages: Vec<SleepStage>,
    pub heart_rate_data: HeartRateData,
}

/// A raw sleep record of either supported shape.
///
/// The shape is decided where the record enters the crate (see
/// [`crate::adapters`]), never by probing fields later on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "lowercase")]
pub enum RawSleepRecord {
    /// Already canonical (local or demo data)
    Dense(CanonicalSleepSession),
    /// Aggregate-only wearable record that must be mapped
    Sparse(RawWearableSleepRecord),
}

impl RawSleepRecord {
    pub fn id(&self) -> &str {
        match self {
            RawSleepRecord::Dense(session) => &session.id,
            RawSleepRecord::Sparse(record) => &record.id,
        }
    }
}

/// Dream category used to template downstream prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DreamCategory {
    Wealth,
    Love,
    Career,
    Danger,
    Health,
    Family,
    Animals,
    Water,
    Food,
    Travel,
    Spiritual,
    Death,
}

impl DreamCategory {
    pub const ALL: [DreamCategory; 12] = [
        DreamCategory::Wealth,
        DreamCategory::Love,
        DreamCategory::Career,
        DreamCategory::Danger,
        DreamCategory::Health,
        DreamCategory::Family,
        DreamCategory::Animals,
        DreamCategory::Water,
        DreamCategory::Food,
        DreamCategory::Travel,
        DreamCategory::Spiritual,
        DreamCategory::Death,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DreamCategory::Wealth => "Wealth",
            DreamCategory::Love => "Love",
            DreamCategory::Career => "Career",
            DreamCategory::Danger => "Danger",
            DreamCategory::Health => "Health",
            DreamCategory::Family => "Family",
            DreamCategory::Animals => "Animals",
            DreamCategory::Water => "Water",
            DreamCategory::Food => "Food",
            DreamCategory::Travel => "Travel",
            DreamCategory::Spiritual => "Spiritual",
            DreamCategory::Death => "Death",
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

fn deserialize_record_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RecordId::deserialize(deserializer)? {
        RecordId::Text(id) => id,
        RecordId::Signed(id) => id.to_string(),
        RecordId::Unsigned(id) => id.to_string(),
    })
}
