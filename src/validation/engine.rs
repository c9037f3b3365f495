//! Validation Engine
//!
//! Checks every line of a protocol and collects diagnostics instead of
//! stopping at the first error.

use std::fmt;

use serde::Serialize;

use crate::protocol::flow::{after_else, never_closed, without_if};
use crate::protocol::{FlowKind, Protocol, Statement};
use crate::types::TypeTable;

/// Severity of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// A diagnostic message for a validation issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
    pub severity: Severity,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: [{}] {}", self.line, self.severity, self.message)
    }
}

/// Result of validating a protocol
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, line: usize, message: String) {
        self.diagnostics.push(Diagnostic {
            line,
            message,
            severity: Severity::Error,
        });
    }

    pub fn add_warning(&mut self, line: usize, message: String) {
        self.diagnostics.push(Diagnostic {
            line,
            message,
            severity: Severity::Warning,
        });
    }

    pub fn is_valid(&self) -> bool {
        !self
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }
}

/// Open `if` block as seen by the validator
struct OpenIf {
    line: usize,
    has_else: bool,
}

/// Validate an entire protocol
///
/// Every line is parsed in order against the types left by the lines
/// before it. A failing line is reported and skipped. Flow-control
/// structure is checked even when an `if` condition itself fails.
pub fn validate_protocol(protocol: &mut Protocol<'_>) -> ValidationResult {
    let mut result = ValidationResult::new();
    let mut open: Vec<OpenIf> = Vec::new();
    protocol.reset();

    for n in 1..=protocol.line_count() {
        let before = protocol.types().clone();
        match protocol.parse_statement(n) {
            Ok(Statement::Blank) => {}
            Ok(Statement::Flow { kind, .. }) => check_flow(&mut open, kind, n, &mut result),
            Ok(Statement::Task(_)) => check_types(&before, protocol.types(), n, &mut result),
            Err(err) => {
                result.add_error(err.line.unwrap_or(n), err.plain_message());
                if let Some(kind) = protocol.flow_kind(n) {
                    check_flow(&mut open, kind, n, &mut result);
                }
            }
        }
    }
    for block in open {
        result.add_error(block.line, never_closed(block.line).message);
    }

    result.diagnostics.sort_by_key(|d| d.line);
    log::debug!(
        "Validated {} lines: {} errors, {} warnings",
        protocol.line_count(),
        result.errors().count(),
        result.warnings().count()
    );
    result
}

fn check_flow(open: &mut Vec<OpenIf>, kind: FlowKind, line: usize, result: &mut ValidationResult) {
    match kind {
        FlowKind::If => open.push(OpenIf {
            line,
            has_else: false,
        }),
        FlowKind::ElseIf | FlowKind::Else => match open.last_mut() {
            None => result.add_error(line, without_if(kind, line).message),
            Some(block) if block.has_else => {
                result.add_error(line, after_else(kind, block.line, line).message)
            }
            Some(block) => block.has_else = kind == FlowKind::Else,
        },
        FlowKind::EndIf => {
            if open.pop().is_none() {
                result.add_error(line, without_if(kind, line).message);
            }
        }
    }
}

fn check_types(before: &TypeTable, after: &TypeTable, line: usize, result: &mut ValidationResult) {
    for (name, ty) in after.iter() {
        match before.get(name) {
            Some(old) if old != ty => result.add_warning(
                line,
                format!("'{}' was a {} and is overwritten with a {}", name, old, ty),
            ),
            None if ty.is_feature_dataset() && !after.sequences_loaded() => result.add_warning(
                line,
                format!(
                    "'{}' ({}) is created before any sequences have been loaded",
                    name, ty
                ),
            ),
            _ => {}
        }
    }
}
