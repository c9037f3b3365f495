//! Macro expansion
//!
//! Every pass substitutes each macro (in definition order) wherever its name
//! occurs. Passes repeat until no macro name is left or the pass limit is
//! reached. Text inserted from an escaped definition is fenced off with
//! marker characters so later passes leave it alone; the markers are
//! stripped from the final lines.
//!
//! A line using two different list macros grows to the product of their
//! sizes: the first list fans the line out, then every copy is fanned out
//! again by the second.

use std::sync::LazyLock;

use regex::Regex;

use super::set::{MacroSet, MacroValue};
use crate::error::{ErrorKind, ParseError, ParseResult};

/// Upper bound on substitution passes; the cycle guard
pub const MAX_EXPANSION_PASSES: usize = 20;

/// Upper bound on the lines one protocol line may expand into
pub const MAX_EXPANDED_LINES: usize = 10_000;

const FENCE_OPEN: char = '\u{2}';
const FENCE_CLOSE: char = '\u{3}';

static DEFINITION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*[$!]\s*macro\s*\([^)]*\)\s*=").unwrap());

/// Byte offset where the scannable part of a line starts
///
/// For a macro definition line only the definition is scanned, otherwise
/// the defined name would always match itself.
fn scan_start(line: &str) -> usize {
    DEFINITION_RE.find(line).map(|m| m.end()).unwrap_or(0)
}

/// Byte ranges of `text` outside fenced spans
fn open_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    for (idx, ch) in text.char_indices() {
        match ch {
            FENCE_OPEN => {
                if depth == 0 && idx > start {
                    spans.push((start, idx));
                }
                depth += 1;
            }
            FENCE_CLOSE if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    start = idx + ch.len_utf8();
                }
            }
            _ => {}
        }
    }
    if depth == 0 && start < text.len() {
        spans.push((start, text.len()));
    }
    spans
}

fn occurs(line: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let offset = scan_start(line);
    let body = &line[offset..];
    open_spans(body)
        .into_iter()
        .any(|(start, end)| body[start..end].contains(name))
}

/// Replace every unfenced occurrence of `name` in the scannable part of `line`
fn substitute(line: &str, name: &str, value: &str) -> String {
    let offset = scan_start(line);
    let (head, body) = line.split_at(offset);
    let mut result = String::with_capacity(line.len() + value.len());
    result.push_str(head);

    let mut copied = 0;
    for (start, end) in open_spans(body) {
        result.push_str(&body[copied..start]);
        result.push_str(&body[start..end].replace(name, value));
        copied = end;
    }
    result.push_str(&body[copied..]);
    result
}

/// Whether any macro name occurs in the line
pub fn contains_macro(line: &str, macros: &MacroSet) -> bool {
    macros.iter().any(|m| occurs(line, &m.name))
}

/// Expand all macros in a line, possibly into several lines
pub fn expand(line: &str, macros: &MacroSet) -> ParseResult<Vec<String>> {
    let mut lines = vec![line.to_string()];

    for pass in 0..MAX_EXPANSION_PASSES {
        if !lines.iter().any(|l| contains_macro(l, macros)) {
            log::trace!("Macro expansion settled after {} passes", pass);
            return Ok(lines.into_iter().map(|l| unfence(&l)).collect());
        }
        lines = expand_pass(lines, macros)?;
    }

    if lines.iter().any(|l| contains_macro(l, macros)) {
        return Err(ParseError::new(
            ErrorKind::MacroOverflow,
            format!(
                "Macro nesting too deep (more than {} expansion passes). Check for macros that refer to themselves",
                MAX_EXPANSION_PASSES
            ),
        ));
    }
    Ok(lines.into_iter().map(|l| unfence(&l)).collect())
}

fn expand_pass(mut lines: Vec<String>, macros: &MacroSet) -> ParseResult<Vec<String>> {
    for m in macros.iter() {
        if !lines.iter().any(|l| occurs(l, &m.name)) {
            continue;
        }
        lines = match m.value()? {
            MacroValue::Verbatim { text, escaped } => {
                let text = if escaped {
                    format!("{}{}{}", FENCE_OPEN, text, FENCE_CLOSE)
                } else {
                    text
                };
                lines
                    .into_iter()
                    .map(|l| {
                        if occurs(&l, &m.name) {
                            substitute(&l, &m.name, &text)
                        } else {
                            l
                        }
                    })
                    .collect()
            }
            MacroValue::List(values) => {
                let mut fanned = Vec::new();
                for l in lines {
                    if occurs(&l, &m.name) {
                        if fanned.len() + values.len() > MAX_EXPANDED_LINES {
                            return Err(ParseError::new(
                                ErrorKind::MacroOverflow,
                                format!(
                                    "Macro nesting too deep: list macro '{}' expands the line into more than {} lines",
                                    m.name, MAX_EXPANDED_LINES
                                ),
                            ));
                        }
                        fanned.extend(values.iter().map(|v| substitute(&l, &m.name, v)));
                    } else {
                        fanned.push(l);
                    }
                }
                fanned
            }
        };
    }
    Ok(lines)
}

fn unfence(line: &str) -> String {
    line.chars()
        .filter(|c| *c != FENCE_OPEN && *c != FENCE_CLOSE)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(defs: &[(&str, &str)]) -> MacroSet {
        let mut set = MacroSet::new();
        for (name, def) in defs {
            set.define(name, def, false);
        }
        set
    }

    #[test]
    fn test_verbatim_substitution() {
        let macros = set(&[("@WIDTH", "\\25")]);
        let lines = expand("X = extend Y by @WIDTH", &macros).unwrap();
        assert_eq!(lines, ["X = extend Y by 25"]);
    }

    #[test]
    fn test_list_fan_out_preserves_order() {
        let macros = set(&[("@N", "[3:1]")]);
        let lines = expand("T@N = copy S@N", &macros).unwrap();
        assert_eq!(lines, ["T3 = copy S3", "T2 = copy S2", "T1 = copy S1"]);
    }

    #[test]
    fn test_two_lists_multiply() {
        let macros = set(&[("@A", "[x,y]"), ("@B", "3")]);
        let lines = expand("T = copy @A@B", &macros).unwrap();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "T = copy x1");
        assert_eq!(lines[5], "T = copy y3");
    }

    #[test]
    fn test_nested_macros() {
        let macros = set(&[("@OUTER", "extend @INNER"), ("@INNER", "Genes")]);
        let lines = expand("X = @OUTER by 10", &macros).unwrap();
        assert_eq!(lines, ["X = extend Genes by 10"]);
    }

    #[test]
    fn test_cycle_guard() {
        let macros = set(&[("@LOOP", "a @LOOP")]);
        let err = expand("@LOOP", &macros).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MacroOverflow);
        assert!(err.message.contains("too deep"));
    }

    #[test]
    fn test_self_referencing_list_stops_growing() {
        let macros = set(&[("@L", "[@L,@L,@L,@L]")]);
        let err = expand("x @L", &macros).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MacroOverflow);
        assert!(err.message.contains("too deep"));
    }

    #[test]
    fn test_huge_count_overflows() {
        let macros = set(&[("@N", "4000000000")]);
        let err = expand("T@N = copy S", &macros).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MacroOverflow);
    }

    #[test]
    fn test_transitive_cycle_guard() {
        let macros = set(&[("@P", "@Q"), ("@Q", "@P")]);
        assert!(expand("x @P", &macros).is_err());
    }

    #[test]
    fn test_escaped_text_is_not_reexpanded() {
        let macros = set(&[("@SELF", "\\keep @SELF")]);
        let lines = expand("say @SELF", &macros).unwrap();
        assert_eq!(lines, ["say keep @SELF"]);
    }

    #[test]
    fn test_definition_line_scans_only_definition() {
        let macros = set(&[("@W", "\\5")]);
        assert!(!contains_macro("$macro(@W)=10", &macros));
        assert!(contains_macro("$macro(@X)=@W", &macros));
        let lines = expand("$macro(@W)=@W", &macros).unwrap();
        assert_eq!(lines, ["$macro(@W)=5"]);
    }
}
