#![forbid(unsafe_code)]

//! Core domain model and dosage decision engine for Glyco.
//!
//! This crate provides:
//! - Domain types (dosage rules, formulas, severity tiers, recommendations)
//! - Restricted formula evaluator
//! - Rule matcher and status classifier
//! - Recommendation selector with formula fallback
//! - Configuration, reading log and statistics
//!
//! The decision engine (`formula`, `rules`, `status`, `engine`) is pure:
//! no I/O, no shared state, safe to call from any thread.

pub mod types;
pub mod error;
pub mod formula;
pub mod rules;
pub mod status;
pub mod engine;
pub mod config;
pub mod logging;
pub mod readings;
pub mod stats;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use formula::{evaluate, validate, Formula, FormulaError};
pub use rules::{default_rules, match_rule};
pub use status::classify;
pub use engine::{recommend, Decision, Route};
pub use config::{Config, DosageConfig};
pub use readings::{GlucoseReading, JsonlSink, ReadingSink};
pub use stats::ReadingStats;
