//! Parameter settings
//!
//! Algorithm, analysis and data-format blocks (`{name=value, ...}`) are
//! parsed against the parameter schema declared in the operation registry.

pub mod grammar;
pub mod value;

pub use grammar::{ParameterFilter, TypeContext, parse_settings, render_settings, split_top_level};
pub use value::{ParameterSettings, ParameterValue};
