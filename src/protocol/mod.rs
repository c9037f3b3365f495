//! Protocol driver
//!
//! Reads protocol lines in order, expands macros, builds flow-control
//! blocks and hands operation lines to their parsers.

pub mod driver;
pub mod flow;
pub mod statement;

pub use driver::{Protocol, render_task};
pub use flow::FlowBuilder;
pub use statement::{FlowKind, LineKind, Statement, classify, parse_display, preprocess};
