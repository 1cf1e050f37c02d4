//! Extraction Engine - locating, decoding and validating policy settings
//!
//! Settings are described by loose hints; documents come in many shapes. The
//! engine bridges the two:
//! - An ordered cascade of lookup strategies with per-strategy confidence
//! - Symbolic value decoding through the symbol resolver
//! - Operator-based validation into compliance records
//! - Per-setting statistics and an offline path learning loop
//! - Bounded-concurrency batch evaluation with cancellation
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                  BatchEvaluator                   │
//! │        (documents × settings, buffer_unordered)   │
//! └──────────────────────┬────────────────────────────┘
//!                        ▼
//! ┌───────────────────────────────────────────────────┐
//! │                 ExtractionEngine                  │
//! │  StrategyCascade → SymbolDecoder → Validator      │
//! │                        │                          │
//! │                        ▼                          │
//! │                 StatisticsStore                   │
//! └──────────────────────┬────────────────────────────┘
//!                        │ samples
//!                        ▼
//! ┌───────────────────────────────────────────────────┐
//! │    PathLearner → LearnedPathTable → promote()     │
//! └───────────────────────────────────────────────────┘
//! ```

pub mod batch;
pub mod config;
pub mod engine;
pub mod learning;
pub mod stats;
pub mod strategy;
pub mod types;

// Re-export main types for convenience
pub use batch::{BatchEvaluator, BatchReport, CancellationFlag};
pub use config::EngineConfig;
pub use engine::ExtractionEngine;
pub use learning::{
    ConfidenceTier, HintField, HintProposal, LearnedPathEntry, LearnedPathTable, LearningReport,
    PathLearner,
};
pub use stats::{ExtractionOutcome, InMemoryStatisticsStore, StatisticsStore, StatsError};
pub use strategy::{ExtractionStrategy, Located, StrategyCascade};
pub use types::*;
