//! Validation Engine
//!
//! Whole-protocol checks that report every failing line.

pub mod engine;

pub use engine::{Diagnostic, Severity, ValidationResult, validate_protocol};
