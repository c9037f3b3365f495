//! Line classification
//!
//! A preprocessed line is empty, a display directive, a flow-control
//! statement or an operation.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::condition::Condition;
use crate::error::{ParseError, ParseResult};
use crate::task::{DisplayPrefix, DisplaySetting, Task};

static DISPLAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<prefix>[@$!])\s*(?P<setting>[A-Za-z][\w-]*)\s*\((?P<target>[^)]*)\)\s*(?:=\s*(?P<value>.*?))?\s*$",
    )
    .unwrap()
});
static ELSE_IF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^else\s+if(?:\s+(?P<condition>.*))?$").unwrap());
static IF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^if(?:\s+(?P<condition>.*))?$").unwrap());
static ELSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^else$").unwrap());
static END_IF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^end\s*if$").unwrap());

pub const COMMENT_PREFIX: char = '#';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    If,
    ElseIf,
    Else,
    EndIf,
}

impl FlowKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            FlowKind::If => "if",
            FlowKind::ElseIf => "else if",
            FlowKind::Else => "else",
            FlowKind::EndIf => "end if",
        }
    }

    pub fn takes_condition(&self) -> bool {
        matches!(self, FlowKind::If | FlowKind::ElseIf)
    }
}

/// Shape of a preprocessed line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'l> {
    Empty,
    Display(&'l str),
    Flow {
        kind: FlowKind,
        condition: Option<&'l str>,
    },
    Operation(&'l str),
}

/// A parsed line
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Blank,
    Flow {
        kind: FlowKind,
        condition: Option<Condition>,
    },
    Task(Task),
}

/// Trim a raw line; comment lines become empty
pub fn preprocess(line: &str) -> &str {
    let line = line.trim();
    if line.starts_with(COMMENT_PREFIX) {
        ""
    } else {
        line
    }
}

pub fn classify(line: &str) -> LineKind<'_> {
    let line = preprocess(line);
    if line.is_empty() {
        return LineKind::Empty;
    }
    if line.starts_with(['@', '$', '!']) {
        return LineKind::Display(line);
    }
    // `else if` must be tried before `if`
    if let Some(caps) = ELSE_IF_RE.captures(line) {
        return LineKind::Flow {
            kind: FlowKind::ElseIf,
            condition: condition_of(&caps),
        };
    }
    if let Some(caps) = IF_RE.captures(line) {
        return LineKind::Flow {
            kind: FlowKind::If,
            condition: condition_of(&caps),
        };
    }
    if ELSE_RE.is_match(line) {
        return LineKind::Flow {
            kind: FlowKind::Else,
            condition: None,
        };
    }
    if END_IF_RE.is_match(line) {
        return LineKind::Flow {
            kind: FlowKind::EndIf,
            condition: None,
        };
    }
    LineKind::Operation(line)
}

fn condition_of<'l>(caps: &Captures<'l>) -> Option<&'l str> {
    caps.name("condition")
        .map(|m| m.as_str().trim())
        .filter(|c| !c.is_empty())
}

/// Parse `@setting(target)`, `$setting(target)=value` or `!setting(target)=value`
pub fn parse_display(line: &str) -> ParseResult<DisplaySetting> {
    let caps = DISPLAY_RE.captures(line.trim()).ok_or_else(|| {
        ParseError::syntax(format!(
            "Malformed display setting '{}'. Expected: $setting(target)=value",
            line.trim()
        ))
    })?;
    let prefix = caps["prefix"]
        .chars()
        .next()
        .and_then(DisplayPrefix::from_char)
        .ok_or_else(|| ParseError::internal("Display prefix matched but not recognised"))?;
    let setting = DisplaySetting::new(
        prefix,
        &caps["setting"],
        caps["target"].trim(),
        caps.name("value").map(|m| m.as_str()),
    );
    if setting.is_macro() {
        if setting.target.is_empty() {
            return Err(ParseError::syntax("A macro definition needs a name"));
        }
        if setting.value.is_none() {
            return Err(ParseError::syntax(format!(
                "Macro '{}' has no definition",
                setting.target
            )));
        }
    }
    Ok(setting)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_comments() {
        assert_eq!(preprocess("   # note"), "");
        assert_eq!(preprocess("  X = copy Y  "), "X = copy Y");
        assert_eq!(classify("#"), LineKind::Empty);
    }

    #[test]
    fn test_classify_flow() {
        assert_eq!(
            classify("if Count > 3"),
            LineKind::Flow {
                kind: FlowKind::If,
                condition: Some("Count > 3")
            }
        );
        assert_eq!(
            classify("Else If  X = 2"),
            LineKind::Flow {
                kind: FlowKind::ElseIf,
                condition: Some("X = 2")
            }
        );
        assert_eq!(
            classify("else"),
            LineKind::Flow {
                kind: FlowKind::Else,
                condition: None
            }
        );
        assert_eq!(
            classify("endif"),
            LineKind::Flow {
                kind: FlowKind::EndIf,
                condition: None
            }
        );
        assert_eq!(
            classify("if"),
            LineKind::Flow {
                kind: FlowKind::If,
                condition: None
            }
        );
    }

    #[test]
    fn test_classify_operation_with_if_prefix() {
        assert_eq!(
            classify("iffy = copy X"),
            LineKind::Operation("iffy = copy X")
        );
    }

    #[test]
    fn test_parse_display() {
        let setting = parse_display("$macro(SAMPLE) = [1,2,3]").unwrap();
        assert!(setting.is_macro());
        assert_eq!(setting.target, "SAMPLE");
        assert_eq!(setting.value.as_deref(), Some("[1,2,3]"));
        assert!(!setting.force);

        let setting = parse_display("!color(Genes)=red").unwrap();
        assert!(setting.force);
        assert_eq!(setting.to_string(), "!color(Genes)=red");

        let setting = parse_display("@show(Genes)").unwrap();
        assert_eq!(setting.prefix, DisplayPrefix::Session);
        assert!(setting.value.is_none());
    }

    #[test]
    fn test_parse_display_errors() {
        assert!(parse_display("$color Genes").is_err());
        assert!(parse_display("$macro(X)").is_err());
        assert!(parse_display("$macro()=1").is_err());
    }
}
