//! Tunable constants for normalization
//!
//! Every heuristic constant lives here so callers and tests can override it.
//! None of these values has ground truth behind it; they are tuned for
//! plausibility, not accuracy.

use crate::error::NormalizeError;
use crate::types::DreamCategory;
use serde::{Deserialize, Serialize};

/// Default cap on synthesized REM cycles per session
pub const DEFAULT_MAX_REM_CYCLES: usize = 12;

/// Top-level normalizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Upper bound on the cycle count passed to the REM synthesizer
    pub max_rem_cycles: usize,
    /// Check dense records against the canonical invariants
    pub validate_dense: bool,
    pub quality: QualityThresholds,
    pub heart_rate: HeartRateHeuristics,
    pub rem: RemTiming,
    pub category: CategoryRules,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            max_rem_cycles: DEFAULT_MAX_REM_CYCLES,
            validate_dense: true,
            quality: QualityThresholds::default(),
            heart_rate: HeartRateHeuristics::default(),
            rem: RemTiming::default(),
            category: CategoryRules::default(),
        }
    }
}

impl NormalizerConfig {
    /// Load a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, NormalizeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to JSON
    pub fn to_json(&self) -> Result<String, NormalizeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject configurations the normalizer cannot run with
    pub fn validate(&self) -> Result<(), NormalizeError> {
        if self.max_rem_cycles == 0 {
            return Err(NormalizeError::ConfigError(
                "max_rem_cycles must be at least 1".to_string(),
            ));
        }

        let q = &self.quality;
        if !(q.excellent >= q.good && q.good >= q.fair) {
            return Err(NormalizeError::ConfigError(format!(
                "quality thresholds must be descending, got excellent={} good={} fair={}",
                q.excellent, q.good, q.fair
            )));
        }

        if !(self.heart_rate.efficiency_divisor > 0.0) {
            return Err(NormalizeError::ConfigError(
                "heart_rate.efficiency_divisor must be positive".to_string(),
            ));
        }

        let weights = [
            self.rem.first_cycle_disturbance_weight,
            self.rem.second_cycle_disturbance_weight,
            self.rem.later_cycles_disturbance_weight,
        ];
        if weights.iter().any(|w| !(*w > 0.0)) {
            return Err(NormalizeError::ConfigError(
                "disturbance weights must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Lower bounds (inclusive) of each sleep quality bucket, in performance percent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    pub excellent: f64,
    pub good: f64,
    pub fair: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            excellent: 90.0,
            good: 75.0,
            fair: 50.0,
        }
    }
}

/// Linear heart-rate estimate from sleep efficiency.
///
/// The wearable's sleep payload carries no heart-rate stream, so resting
/// rate is approximated as `efficiency / efficiency_divisor` and the other
/// figures are fixed offsets from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartRateHeuristics {
    pub efficiency_divisor: f64,
    pub resting_floor: u32,
    pub average_offset: u32,
    pub average_floor: u32,
    pub min_offset: u32,
    pub min_floor: u32,
    pub max_offset: u32,
    /// Used when efficiency is absent or non-positive
    pub fallback: HeartRateFallback,
}

impl Default for HeartRateHeuristics {
    fn default() -> Self {
        Self {
            efficiency_divisor: 1.6,
            resting_floor: 48,
            average_offset: 5,
            average_floor: 50,
            min_offset: 10,
            min_floor: 45,
            max_offset: 12,
            fallback: HeartRateFallback::default(),
        }
    }
}

/// Population-average heart-rate figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartRateFallback {
    pub resting_bpm: u32,
    pub average_bpm: u32,
    pub min_bpm: u32,
    pub max_bpm: u32,
}

impl Default for HeartRateFallback {
    fn default() -> Self {
        Self {
            resting_bpm: 60,
            average_bpm: 56,
            min_bpm: 52,
            max_bpm: 70,
        }
    }
}

/// REM placement and disturbance weighting.
///
/// Jitter values are exclusive upper bounds: an onset jitter of 15 draws
/// uniformly from 0..15 minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemTiming {
    pub first_onset_minutes: u32,
    pub first_onset_jitter_minutes: u32,
    pub cycle_period_minutes: u32,
    pub cycle_period_jitter_minutes: u32,
    pub first_cycle_disturbance_weight: f64,
    pub second_cycle_disturbance_weight: f64,
    /// Split evenly across cycles three and later
    pub later_cycles_disturbance_weight: f64,
}

impl Default for RemTiming {
    fn default() -> Self {
        Self {
            first_onset_minutes: 75,
            first_onset_jitter_minutes: 15,
            cycle_period_minutes: 85,
            cycle_period_jitter_minutes: 10,
            first_cycle_disturbance_weight: 0.1,
            second_cycle_disturbance_weight: 0.2,
            later_cycles_disturbance_weight: 0.7,
        }
    }
}

/// Half-open range of local onset hours mapped to a category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourWindow {
    pub start_hour: u32,
    pub end_hour: u32,
    pub category: DreamCategory,
}

impl HourWindow {
    pub fn contains(&self, hour: u32) -> bool {
        hour >= self.start_hour && hour < self.end_hour
    }
}

/// Ordered rules for dream category inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryRules {
    /// Performance strictly below this is considered poor
    pub poor_performance_below: f64,
    pub poor_performance_category: DreamCategory,
    /// Respiratory rate strictly above this is considered elevated
    pub respiratory_above: f64,
    pub respiratory_category: DreamCategory,
    /// Wake-up count at or above this is considered restless
    pub high_wake_ups: u32,
    pub wake_ups_category: DreamCategory,
    pub hour_windows: Vec<HourWindow>,
    pub default_category: DreamCategory,
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self {
            poor_performance_below: 65.0,
            poor_performance_category: DreamCategory::Health,
            respiratory_above: 18.0,
            respiratory_category: DreamCategory::Health,
            high_wake_ups: 4,
            wake_ups_category: DreamCategory::Danger,
            hour_windows: vec![
                HourWindow {
                    start_hour: 1,
                    end_hour: 3,
                    category: DreamCategory::Career,
                },
                HourWindow {
                    start_hour: 3,
                    end_hour: 5,
                    category: DreamCategory::Family,
                },
                HourWindow {
                    start_hour: 5,
                    end_hour: 7,
                    category: DreamCategory::Travel,
                },
            ],
            default_category: DreamCategory::Health,
        }
    }
}
