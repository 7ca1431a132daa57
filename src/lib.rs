//! Dream Flux - Sleep data normalization for dream generation
//!
//! Dream Flux turns wearable sleep records into canonical sleep sessions
//! through a small pipeline: vendor adaptation → normalization (stage
//! layout, REM cycle synthesis, quality and heart-rate heuristics) →
//! category inference.
//!
//! ## Modules
//!
//! - **Normalization**: Map sparse WHOOP records, or pass through dense local sessions
//! - **REM synthesis**: Lay out plausible REM cycles from aggregate totals
//! - **Categories**: Pick a dream category from sleep metrics

pub mod adapters;
pub mod category;
pub mod config;
pub mod demo;
pub mod error;
pub mod normalizer;
pub mod pipeline;
pub mod rem;
pub mod stages;
pub mod time;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use category::{infer_category, CategoryMetrics};
pub use config::NormalizerConfig;
pub use error::NormalizeError;
pub use normalizer::SleepNormalizer;
pub use pipeline::{whoop_to_sleep_sessions, BatchOutcome, SleepProcessor};
pub use rem::RemCycleSynthesizer;
pub use types::{CanonicalSleepSession, DreamCategory, RawSleepRecord, RawWearableSleepRecord};

/// Dream Flux version
pub const DREAM_FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "dream-flux";
