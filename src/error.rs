//! Parse errors
//!
//! One error type for the whole front end. The `kind` separates user
//! scripting mistakes from registry/configuration bugs.

use serde::Serialize;
use thiserror::Error;

/// Category of a parse failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No grammar matched the line or clause
    Syntax,
    /// Unknown operand, wrong operand type, missing or misplaced clause
    Semantic,
    /// The driver recognised a keyword that has no registered parser
    Internal,
    /// Macro expansion did not settle within the pass limit
    MacroOverflow,
}

/// Error raised while parsing a protocol line
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{}", render(.line, .kind, .message))]
pub struct ParseError {
    pub message: String,
    pub line: Option<usize>,
    pub kind: ErrorKind,
}

fn render(line: &Option<usize>, kind: &ErrorKind, message: &str) -> String {
    let message = match kind {
        ErrorKind::Internal => format!("SYSTEM ERROR: {}", message),
        _ => message.to_string(),
    };
    match line {
        Some(line) => format!("line {}: {}", line, message),
        None => message,
    }
}

impl ParseError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            kind,
        }
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, message)
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Semantic, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Attach a line number unless an inner catch point already did
    pub fn at_line(mut self, line: usize) -> Self {
        if self.line.is_none() {
            self.line = Some(line);
        }
        self
    }

    pub fn is_internal(&self) -> bool {
        self.kind == ErrorKind::Internal
    }

    /// The message as displayed, without the line prefix
    pub fn plain_message(&self) -> String {
        render(&None, &self.kind, &self.message)
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_line() {
        let err = ParseError::syntax("Unrecognized clause 'foo'").at_line(7);
        assert_eq!(err.to_string(), "line 7: Unrecognized clause 'foo'");
    }

    #[test]
    fn test_innermost_line_wins() {
        let err = ParseError::semantic("Unknown data object 'X'")
            .at_line(3)
            .at_line(9);
        assert_eq!(err.line, Some(3));
    }

    #[test]
    fn test_internal_is_flagged() {
        let err = ParseError::internal("No parser registered for 'frobnicate'");
        assert!(err.is_internal());
        assert!(err.to_string().starts_with("SYSTEM ERROR"));
    }
}
