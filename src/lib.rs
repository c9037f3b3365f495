//! Protocol Script Front End
//!
//! Parser, type checker and macro engine for line-oriented pipeline
//! protocols.
//!
//! This library provides:
//! - A protocol driver with incremental, line-by-line parsing
//! - One grammar per operation keyword, with canonical rendering
//! - Compound `where` conditions normalised to an OR of ANDs
//! - Macro expansion including list macros
//! - A TOML operation registry and whole-protocol validation

pub mod condition;
pub mod config;
pub mod context;
pub mod error;
pub mod macros;
pub mod operations;
pub mod params;
pub mod protocol;
pub mod registry;
pub mod task;
pub mod types;
pub mod validation;

// Re-exports for clean public API
pub use condition::{Condition, ConditionFamily, parse_condition};
pub use config::Config;
pub use context::{DataLookup, NoData, ParsingContext};
pub use error::{ErrorKind, ParseError, ParseResult};
pub use macros::{Macro, MacroSet};
pub use params::{ParameterSettings, ParameterValue};
pub use protocol::{Protocol, Statement};
pub use registry::OperationRegistry;
pub use task::{CompoundTask, ConditionalTask, OperationTask, Task};
pub use types::{DataType, NamingRules, TypeTable};
pub use validation::{Diagnostic, Severity, ValidationResult, validate_protocol};
