//! Sleep stage sequencing
//!
//! Turns per-stage totals into back-to-back blocks on the local clock. The
//! wearable gives no ordering, so blocks follow the fixed order
//! Awake → Core → Deep → REM starting at sleep onset.

use crate::time::{advance_clock, minutes_from_millis};
use crate::types::{SleepStage, StageKind};

/// Aggregate time per stage, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTotals {
    pub awake_millis: i64,
    pub light_millis: i64,
    pub deep_millis: i64,
    pub rem_millis: i64,
}

/// Lay out stage blocks starting at `sleep_start_minutes` (local minutes
/// from midnight). Stages that round to zero minutes are left out.
pub fn build_stages(totals: &StageTotals, sleep_start_minutes: u32) -> Vec<SleepStage> {
    let ordered = [
        (StageKind::Awake, totals.awake_millis),
        (StageKind::Core, totals.light_millis),
        (StageKind::Deep, totals.deep_millis),
        (StageKind::Rem, totals.rem_millis),
    ];

    let mut stages = Vec::with_capacity(ordered.len());
    let mut elapsed: i64 = 0;

    for (kind, millis) in ordered {
        let duration_minutes = minutes_from_millis(millis);
        if duration_minutes == 0 {
            continue;
        }

        let start = advance_clock(i64::from(sleep_start_minutes), elapsed);
        stages.push(SleepStage {
            kind,
            start_time: start.time,
            duration_minutes,
        });
        elapsed += i64::from(duration_minutes);
    }

    stages
}
