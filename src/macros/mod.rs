//! Macro Engine
//!
//! Named textual substitutions applied to a line before it is parsed. A
//! macro is either verbatim text or a list that fans one line out into one
//! line per value.

pub mod expand;
pub mod set;

pub use expand::{MAX_EXPANDED_LINES, MAX_EXPANSION_PASSES, contains_macro, expand};
pub use set::{MAX_LIST_VALUES, Macro, MacroSet, MacroValue};
