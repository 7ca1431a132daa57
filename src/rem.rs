//! Synthetic REM cycle reconstruction
//!
//! The wearable reports REM sleep only as a nightly total plus a cycle
//! count. This module spreads that total over individual cycles so that the
//! result follows ordinary sleep architecture:
//! - REM periods lengthen as the night goes on
//! - cycles recur roughly every 90 minutes after a 75-90 minute onset
//! - disturbances land mostly in later cycles
//! - the mid-night cycles carry the most memorable dreams
//!
//! Timing jitter and disturbance placement are random. The random source is
//! always supplied by the caller, so a seeded generator yields exactly
//! reproducible output.

use crate::config::{NormalizerConfig, RemTiming, DEFAULT_MAX_REM_CYCLES};
use crate::time::{advance_clock, parse_clock};
use crate::types::RemCycle;
use rand::Rng;
use tracing::warn;

const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// Hand-tuned REM share per cycle for nights of 1 to 5 cycles
const REM_DISTRIBUTION_PRESETS: [&[f64]; 5] = [
    &[1.0],
    &[0.4, 0.6],
    &[0.25, 0.35, 0.4],
    &[0.15, 0.25, 0.3, 0.3],
    &[0.12, 0.2, 0.25, 0.25, 0.18],
];

/// Builds per-cycle REM records from aggregate totals
#[derive(Debug, Clone)]
pub struct RemCycleSynthesizer {
    timing: RemTiming,
    max_cycles: usize,
}

impl Default for RemCycleSynthesizer {
    fn default() -> Self {
        Self::new(RemTiming::default(), DEFAULT_MAX_REM_CYCLES)
    }
}

impl RemCycleSynthesizer {
    pub fn new(timing: RemTiming, max_cycles: usize) -> Self {
        Self { timing, max_cycles }
    }

    pub fn from_config(config: &NormalizerConfig) -> Self {
        Self::new(config.rem.clone(), config.max_rem_cycles)
    }

    /// Synthesize REM cycles for one night.
    ///
    /// # Arguments
    /// * `total_rem_millis` - Total REM sleep reported for the night
    /// * `cycle_count` - Reported sleep cycles, capped at the configured maximum
    /// * `disturbance_count` - Reported disturbances
    /// * `sleep_start_time` - Local sleep onset, `HH:MM` or `HH:MM:SS`
    /// * `rng` - Source of timing jitter and disturbance placement
    ///
    /// Returns an empty list when there is nothing to distribute or the
    /// start clock cannot be read.
    pub fn synthesize<R: Rng + ?Sized>(
        &self,
        total_rem_millis: i64,
        cycle_count: i64,
        disturbance_count: i64,
        sleep_start_time: &str,
        rng: &mut R,
    ) -> Vec<RemCycle> {
        if cycle_count <= 0 || total_rem_millis <= 0 {
            return Vec::new();
        }

        let Some(sleep_start) = parse_clock(sleep_start_time) else {
            warn!(
                sleep_start_time,
                "Unable to parse sleep start time for REM cycle generation"
            );
            return Vec::new();
        };

        let cycles = cycle_count.min(self.max_cycles as i64) as usize;
        let total_rem_minutes = total_rem_millis as f64 / MILLIS_PER_MINUTE;
        let distribution = rem_distribution(cycles);
        let disturbed = self.pick_disturbed_cycles(cycles, disturbance_count, rng);
        let primary = primary_dream_cycles(cycles);

        let mut elapsed: i64 = 0;
        let mut result = Vec::with_capacity(cycles);

        for index in 0..cycles {
            let (base, span) = if index == 0 {
                (
                    self.timing.first_onset_minutes,
                    self.timing.first_onset_jitter_minutes,
                )
            } else {
                (
                    self.timing.cycle_period_minutes,
                    self.timing.cycle_period_jitter_minutes,
                )
            };
            elapsed += i64::from(base + jitter(rng, span));

            let onset = advance_clock(i64::from(sleep_start), elapsed);

            result.push(RemCycle {
                cycle_number: index as u32 + 1,
                start_time: onset.time,
                duration_minutes: (total_rem_minutes * distribution[index]).round() as u32,
                is_interrupted: disturbed[index],
                is_primary_dream: primary.contains(&index),
            });
        }

        result
    }

    /// Weighted draw without replacement: early cycles are the least likely
    /// to be disturbed. Flags `min(disturbance_count, cycles)` cycles.
    fn pick_disturbed_cycles<R: Rng + ?Sized>(
        &self,
        cycles: usize,
        disturbance_count: i64,
        rng: &mut R,
    ) -> Vec<bool> {
        let mut disturbed = vec![false; cycles];
        if disturbance_count <= 0 {
            return disturbed;
        }

        let later_share =
            self.timing.later_cycles_disturbance_weight / cycles.saturating_sub(2).max(1) as f64;
        let weights: Vec<f64> = (0..cycles)
            .map(|index| match index {
                0 => self.timing.first_cycle_disturbance_weight,
                1 => self.timing.second_cycle_disturbance_weight,
                _ => later_share,
            })
            .collect();

        let draws = (disturbance_count as usize).min(cycles);
        for _ in 0..draws {
            let remaining: f64 = weights
                .iter()
                .zip(&disturbed)
                .filter(|(_, taken)| !**taken)
                .map(|(weight, _)| weight)
                .sum();
            if remaining <= 0.0 {
                break;
            }

            let mut draw = rng.gen::<f64>() * remaining;
            let mut chosen = None;
            for (index, weight) in weights.iter().enumerate() {
                if disturbed[index] {
                    continue;
                }
                chosen = Some(index);
                draw -= weight;
                if draw <= 0.0 {
                    break;
                }
            }

            if let Some(index) = chosen {
                disturbed[index] = true;
            }
        }

        disturbed
    }
}

fn jitter<R: Rng + ?Sized>(rng: &mut R, span: u32) -> u32 {
    if span == 0 {
        0
    } else {
        rng.gen_range(0..span)
    }
}

/// Fraction of total REM assigned to each cycle; always sums to 1.0.
///
/// Nights of up to five cycles use the preset table. Longer nights rise
/// linearly over the first 60% of cycles and taper afterwards.
pub fn rem_distribution(cycle_count: usize) -> Vec<f64> {
    if cycle_count == 0 {
        return Vec::new();
    }

    let weights: Vec<f64> = match REM_DISTRIBUTION_PRESETS.get(cycle_count - 1) {
        Some(preset) => preset.to_vec(),
        None => {
            let n = cycle_count as f64;
            (0..cycle_count)
                .map(|index| {
                    let i = index as f64;
                    if i < n * 0.6 {
                        0.1 + (i / n) * 0.3
                    } else {
                        0.25 - ((i - n * 0.6) / n) * 0.1
                    }
                })
                .collect()
        }
    };

    let sum: f64 = weights.iter().sum();
    weights.into_iter().map(|weight| weight / sum).collect()
}

/// Zero-based indices of the cycles most likely to hold a vivid dream
pub fn primary_dream_cycles(cycle_count: usize) -> Vec<usize> {
    match cycle_count {
        0 => vec![],
        1 => vec![0],
        2 => vec![1],
        _ => vec![1, 2],
    }
}
