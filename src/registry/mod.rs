//! Operation Registry
//!
//! Declares which operations exist, what data types they consume and
//! produce, and the parameter schemas of pluggable algorithms.

pub mod registry;
pub mod schema;

pub use registry::OperationRegistry;
pub use schema::{AlgorithmDef, AlgorithmKind, Direction, OperationDef, ParameterDef, ParameterType};
