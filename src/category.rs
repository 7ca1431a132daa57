//! Dream category inference
//!
//! Picks one label from the closed [`DreamCategory`] set using ordered rules
//! over a handful of sleep metrics. The first matching rule wins; the
//! function is total and cannot fail.

use crate::config::CategoryRules;
use crate::time::{parse_clock, parse_local_date_time};
use crate::types::{CanonicalSleepSession, DreamCategory, RawWearableSleepRecord, SleepQuality};

/// Metrics the category rules look at
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryMetrics {
    /// Sleep performance, percent
    pub performance: Option<f64>,
    pub wake_ups: u32,
    /// Breaths per minute
    pub respiratory_rate: Option<f64>,
    /// Local hour of sleep onset, 0-23
    pub onset_hour: Option<u32>,
}

impl CategoryMetrics {
    /// Approximate metrics from a canonical session.
    ///
    /// Sessions carry no performance or respiratory figures, so performance
    /// is proxied from the quality bucket and respiration from average heart
    /// rate.
    pub fn from_session(session: &CanonicalSleepSession) -> Self {
        let performance = match session.sleep_quality {
            SleepQuality::Poor => 60.0,
            SleepQuality::Fair => 75.0,
            SleepQuality::Good => 85.0,
            SleepQuality::Excellent => 95.0,
        };

        Self {
            performance: Some(performance),
            wake_ups: session.wake_ups,
            respiratory_rate: Some((f64::from(session.heart_rate_data.average_bpm) / 4.0).round()),
            onset_hour: parse_clock(&session.start_time).map(|minutes| minutes / 60),
        }
    }

    /// Metrics straight from a wearable record, with onset in local time
    pub fn from_wearable(record: &RawWearableSleepRecord) -> Self {
        let score = record.score.as_ref();
        let wake_ups = score
            .and_then(|s| s.stage_summary.as_ref())
            .and_then(|summary| summary.disturbance_count)
            .map(|count| u32::try_from(count.max(0)).unwrap_or(u32::MAX))
            .unwrap_or(0);

        Self {
            performance: score.and_then(|s| s.sleep_performance_percentage),
            wake_ups,
            respiratory_rate: score.and_then(|s| s.respiratory_rate),
            onset_hour: parse_local_date_time(&record.start, record.timezone_offset.as_deref())
                .map(|local| local.minutes_from_midnight / 60),
        }
    }
}

/// Apply the category rules in priority order:
/// poor performance, elevated respiration, restless night, onset hour,
/// then the default
pub fn infer_category(metrics: &CategoryMetrics, rules: &CategoryRules) -> DreamCategory {
    if metrics.performance.unwrap_or(100.0) < rules.poor_performance_below {
        return rules.poor_performance_category;
    }
    if metrics.respiratory_rate.unwrap_or(0.0) > rules.respiratory_above {
        return rules.respiratory_category;
    }
    if metrics.wake_ups >= rules.high_wake_ups {
        return rules.wake_ups_category;
    }

    metrics
        .onset_hour
        .and_then(|hour| {
            rules
                .hour_windows
                .iter()
                .find(|window| window.contains(hour))
                .map(|window| window.category)
        })
        .unwrap_or(rules.default_category)
}

/// Convenience wrapper for canonical sessions
pub fn infer_session_category(
    session: &CanonicalSleepSession,
    rules: &CategoryRules,
) -> DreamCategory {
    infer_category(&CategoryMetrics::from_session(session), rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HourWindow;
    use crate::types::{HeartRateData, ScoreState, StageSummary, WearableSleepScore};

    fn metrics(hour: u32) -> CategoryMetrics {
        CategoryMetrics {
            performance: Some(85.0),
            wake_ups: 1,
            respiratory_rate: Some(14.5),
            onset_hour: Some(hour),
        }
    }

    #[test]
    fn test_rule_priority() {
        let rules = CategoryRules::default();

        let poor = CategoryMetrics {
            performance: Some(50.0),
            wake_ups: 6,
            ..metrics(2)
        };
        assert_eq!(infer_category(&poor, &rules), DreamCategory::Health);

        let breathless = CategoryMetrics {
            respiratory_rate: Some(19.0),
            wake_ups: 6,
            ..metrics(2)
        };
        assert_eq!(infer_category(&breathless, &rules), DreamCategory::Health);

        let restless = CategoryMetrics {
            wake_ups: 4,
            ..metrics(2)
        };
        assert_eq!(infer_category(&restless, &rules), DreamCategory::Danger);
    }

    #[test]
    fn test_hour_windows() {
        let rules = CategoryRules::default();
        assert_eq!(infer_category(&metrics(1), &rules), DreamCategory::Career);
        assert_eq!(infer_category(&metrics(2), &rules), DreamCategory::Career);
        assert_eq!(infer_category(&metrics(3), &rules), DreamCategory::Family);
        assert_eq!(infer_category(&metrics(6), &rules), DreamCategory::Travel);
        assert_eq!(infer_category(&metrics(7), &rules), DreamCategory::Health);
        assert_eq!(infer_category(&metrics(23), &rules), DreamCategory::Health);
        assert_eq!(
            infer_category(&CategoryMetrics::default(), &rules),
            DreamCategory::Health
        );
    }

    #[test]
    fn test_rules_can_be_overridden() {
        let rules = CategoryRules {
            hour_windows: vec![HourWindow {
                start_hour: 22,
                end_hour: 24,
                category: DreamCategory::Water,
            }],
            default_category: DreamCategory::Spiritual,
            ..CategoryRules::default()
        };
        assert_eq!(infer_category(&metrics(23), &rules), DreamCategory::Water);
        assert_eq!(infer_category(&metrics(2), &rules), DreamCategory::Spiritual);
    }

    #[test]
    fn test_metrics_from_session() {
        let session = CanonicalSleepSession {
            id: "s".to_string(),
            date: "2024-10-19".to_string(),
            start_time: "03:40:00".to_string(),
            end_time: "10:00:00".to_string(),
            total_duration_minutes: 380,
            sleep_quality: SleepQuality::Excellent,
            wake_ups: 2,
            rem_cycles: vec![],
            stages: vec![],
            heart_rate_data: HeartRateData {
                resting_bpm: 58,
                average_bpm: 54,
                min_bpm: 48,
                max_bpm: 70,
                spikes: vec![],
            },
        };

        let m = CategoryMetrics::from_session(&session);
        assert_eq!(m.performance, Some(95.0));
        assert_eq!(m.respiratory_rate, Some(14.0));
        assert_eq!(m.onset_hour, Some(3));
        assert_eq!(
            infer_session_category(&session, &CategoryRules::default()),
            DreamCategory::Family
        );
    }

    #[test]
    fn test_metrics_from_wearable_use_local_hour() {
        let record = RawWearableSleepRecord {
            id: "w".to_string(),
            start: "2024-10-18T18:30:00Z".to_string(),
            end: "2024-10-19T02:00:00Z".to_string(),
            timezone_offset: Some("+08:00".to_string()),
            nap: false,
            score_state: ScoreState::Scored,
            score: Some(WearableSleepScore {
                stage_summary: Some(StageSummary {
                    disturbance_count: Some(1),
                    ..StageSummary::default()
                }),
                sleep_performance_percentage: Some(88.0),
                respiratory_rate: Some(15.1),
                ..WearableSleepScore::default()
            }),
        };

        let m = CategoryMetrics::from_wearable(&record);
        assert_eq!(m.onset_hour, Some(2));
        assert_eq!(m.wake_ups, 1);
        assert_eq!(
            infer_category(&m, &CategoryRules::default()),
            DreamCategory::Career
        );
    }
}
