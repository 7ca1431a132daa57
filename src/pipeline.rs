//! Pipeline orchestration
//!
//! This module provides the public API for Dream Flux.
//! It takes raw JSON through adaptation and normalization to canonical
//! sleep sessions.

use crate::adapters::{LocalSessionAdapter, SleepPayloadAdapter, SleepRecordBatch, WhoopAdapter};
use crate::category::{infer_category, CategoryMetrics};
use crate::config::{CategoryRules, NormalizerConfig};
use crate::demo::demo_sleep_sessions;
use crate::error::NormalizeError;
use crate::normalizer::SleepNormalizer;
use crate::types::{CanonicalSleepSession, DreamCategory, RawSleepRecord};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::warn;

/// Convert a raw WHOOP sleep payload to canonical session JSON.
///
/// # Arguments
/// * `raw_json` - WHOOP sleep record, array of records, or collection page
///
/// # Returns
/// One JSON document per normalized session. Records that cannot be
/// normalized (unscored, bad timestamps) are logged and left out.
///
/// # Example
/// ```ignore
/// let sessions = whoop_to_sleep_sessions(whoop_json)?;
/// ```
pub fn whoop_to_sleep_sessions(raw_json: String) -> Result<Vec<String>, NormalizeError> {
    let outcome = SleepProcessor::new().process_whoop(&raw_json)?;
    outcome
        .sessions
        .iter()
        .map(|session| serde_json::to_string(session).map_err(NormalizeError::from))
        .collect()
}

/// Normalize a single tagged record (`{"kind": "dense" | "sparse", "record": {...}}`)
/// to canonical session JSON. Record-level failures are returned as errors.
pub fn normalize_record_json(raw_json: String) -> Result<String, NormalizeError> {
    let record: RawSleepRecord = serde_json::from_str(&raw_json)?;
    let session = SleepProcessor::new().process_record(record)?;
    Ok(serde_json::to_string(&session)?)
}

/// Infer the dream category of a single tagged record with the default rules
pub fn record_category(raw_json: String) -> Result<DreamCategory, NormalizeError> {
    let record: RawSleepRecord = serde_json::from_str(&raw_json)?;
    Ok(record_category_with_rules(&record, &CategoryRules::default()))
}

/// Dense records are judged by their session proxies, sparse records by the
/// wearable's own scores
pub fn record_category_with_rules(record: &RawSleepRecord, rules: &CategoryRules) -> DreamCategory {
    let metrics = match record {
        RawSleepRecord::Dense(session) => CategoryMetrics::from_session(session),
        RawSleepRecord::Sparse(record) => CategoryMetrics::from_wearable(record),
    };
    infer_category(&metrics, rules)
}

/// Why a record was left out of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Unscored,
    IncompleteSummary,
    InvalidTimestamp,
    InvalidSession,
}

/// A record that could not be normalized
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    pub id: String,
    pub reason: SkipReason,
    pub message: String,
}

/// Result of normalizing one page of records
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    /// Normalized sessions, in input order
    pub sessions: Vec<CanonicalSleepSession>,
    pub skipped: Vec<SkippedRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

impl BatchOutcome {
    /// Records exist but none has been scored yet
    pub fn all_unscored(&self) -> bool {
        self.sessions.is_empty()
            && !self.skipped.is_empty()
            && self
                .skipped
                .iter()
                .all(|skipped| skipped.reason == SkipReason::Unscored)
    }

    pub fn to_json(&self) -> Result<String, NormalizeError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Stateful processor owning configuration and a random source.
///
/// Use [`SleepProcessor::with_seed`] when output must be reproducible.
pub struct SleepProcessor {
    normalizer: SleepNormalizer,
    rng: StdRng,
}

impl Default for SleepProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl SleepProcessor {
    /// Create a processor with default settings and a fresh random seed
    pub fn new() -> Self {
        Self::with_config_and_seed(NormalizerConfig::default(), None)
    }

    /// Create a processor whose synthetic timings are reproducible
    pub fn with_seed(seed: u64) -> Self {
        Self::with_config_and_seed(NormalizerConfig::default(), Some(seed))
    }

    pub fn with_config(config: NormalizerConfig) -> Self {
        Self::with_config_and_seed(config, None)
    }

    pub fn with_config_and_seed(config: NormalizerConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            normalizer: SleepNormalizer::new(config),
            rng,
        }
    }

    pub fn normalizer(&self) -> &SleepNormalizer {
        &self.normalizer
    }

    /// Dream category under this processor's rules
    pub fn infer_category(&self, record: &RawSleepRecord) -> DreamCategory {
        record_category_with_rules(record, &self.normalizer.config().category)
    }

    /// Normalize one record. Record-level failures are returned as errors.
    pub fn process_record(
        &mut self,
        record: RawSleepRecord,
    ) -> Result<CanonicalSleepSession, NormalizeError> {
        self.normalizer.normalize(record, &mut self.rng)
    }

    /// Normalize a page, collecting recoverable failures as skipped records
    pub fn process_batch(&mut self, batch: SleepRecordBatch) -> Result<BatchOutcome, NormalizeError> {
        let mut outcome = BatchOutcome {
            next_token: batch.next_token,
            ..BatchOutcome::default()
        };

        for record in batch.records {
            let id = record.id().to_string();
            match self.process_record(record) {
                Ok(session) => outcome.sessions.push(session),
                Err(e) => {
                    let Some(reason) = skip_reason(&e) else {
                        return Err(e);
                    };
                    warn!(id = %id, reason = ?reason, "Skipping sleep record: {}", e);
                    outcome.skipped.push(SkippedRecord {
                        id,
                        reason,
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(outcome)
    }

    /// Normalize a WHOOP sleep payload
    pub fn process_whoop(&mut self, raw_json: &str) -> Result<BatchOutcome, NormalizeError> {
        self.process_with_adapter(&WhoopAdapter, raw_json)
    }

    /// Normalize locally stored canonical sessions
    pub fn process_local(&mut self, raw_json: &str) -> Result<BatchOutcome, NormalizeError> {
        self.process_with_adapter(&LocalSessionAdapter, raw_json)
    }

    /// Normalize the built-in demo nights
    pub fn demo_sessions(&mut self) -> Result<Vec<CanonicalSleepSession>, NormalizeError> {
        demo_sleep_sessions(&self.normalizer, &mut self.rng)
    }

    fn process_with_adapter(
        &mut self,
        adapter: &dyn SleepPayloadAdapter,
        raw_json: &str,
    ) -> Result<BatchOutcome, NormalizeError> {
        let batch = adapter.parse(raw_json)?;
        self.process_batch(batch)
    }
}

fn skip_reason(error: &NormalizeError) -> Option<SkipReason> {
    match error {
        NormalizeError::UnscoredSleepData { .. } => Some(SkipReason::Unscored),
        NormalizeError::IncompleteSleepData { .. } => Some(SkipReason::IncompleteSummary),
        NormalizeError::InvalidTimestamp(_) => Some(SkipReason::InvalidTimestamp),
        NormalizeError::InvalidSession(_) => Some(SkipReason::InvalidSession),
        _ => None,
    }
}
