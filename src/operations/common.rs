//! Shared operation grammar
//!
//! Every operation line has the shape
//!
//! ```text
//! [target = | [t1,t2] = ] keyword <body> [where <cond>] [within[...]] [in collection <C>]
//! ```
//!
//! [`split_line`] takes off the target prefix and keyword, [`split_clauses`]
//! the trailing clauses. Operation modules only match their own body.

use std::sync::LazyLock;

use regex::Regex;

use crate::condition::{
    Condition, ConditionFamily, Operand, WithinCondition, parse_condition, parse_within,
    validate_references,
};
use crate::context::ParsingContext;
use crate::error::{ParseError, ParseResult};
use crate::params::TypeContext;
use crate::registry::OperationDef;
use crate::task::OperationTask;
use crate::types::{DEFAULT_SEQUENCE_COLLECTION, DataType, TypeTable};

static LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(?:(?P<targets>\[[^\]]*\]|[^\s=\[\]"{}]+)\s*=\s*)?(?P<keyword>[A-Za-z_]+)(?:\s+(?P<rest>.*))?$"#,
    )
    .unwrap()
});
static COLLECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s+in\s+collection\s+(?P<name>[^\s"{}\[\]]+)\s*$"#).unwrap()
});
static WITHIN_TAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+(?P<clause>within\s*\[[^\]]*\])\s*$").unwrap());
static WHERE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(?:^|\s)where(?:\s|$)").unwrap());
static STRAY_COLLECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|\s)in\s+collection(?:\s|$)").unwrap());
static STRAY_WITHIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|\s)within\s*\[").unwrap());

/// Mutable state an operation parser works against
pub struct ParseEnv<'a, 'b> {
    pub cx: ParsingContext<'a>,
    pub types: &'b mut TypeTable,
    pub line: Option<usize>,
}

impl<'a, 'b> ParseEnv<'a, 'b> {
    pub fn new(cx: ParsingContext<'a>, types: &'b mut TypeTable, line: Option<usize>) -> Self {
        Self { cx, types, line }
    }

    /// Type of a name: protocol objects first, then the engine's data
    pub fn resolve(&self, name: &str) -> Option<DataType> {
        self.types
            .get(name)
            .or_else(|| self.cx.lookup.data_type(name))
    }

    pub fn require(&self, name: &str) -> ParseResult<DataType> {
        self.resolve(name)
            .ok_or_else(|| ParseError::semantic(format!("Unknown data object '{}'", name)))
    }

    /// Resolve a source operand and check the operation accepts its type
    pub fn require_source(&self, op: &OperationDef, name: &str) -> ParseResult<DataType> {
        let ty = self.require(name)?;
        if !op.accepts(ty) {
            return Err(ParseError::semantic(format!(
                "The '{}' operation can not be applied to '{}' ({})",
                op.name, name, ty
            )));
        }
        Ok(ty)
    }

    /// A numeric operand: a literal or the name of numeric data
    pub fn require_numeric(&self, operand: &Operand, what: &str) -> ParseResult<()> {
        match operand {
            Operand::Number(_) => Ok(()),
            Operand::Text(text) => Err(ParseError::semantic(format!(
                "Expected a number for {} but found \"{}\"",
                what, text
            ))),
            Operand::Reference(name) => {
                let ty = self.require(name)?;
                if ty.is_numeric() || ty == DataType::NumericDataset {
                    Ok(())
                } else {
                    Err(ParseError::semantic(format!(
                        "'{}' ({}) can not be used as {}",
                        name, ty, what
                    )))
                }
            }
        }
    }

    /// Record a new or changed data object
    ///
    /// Creating a sequence also creates the default sequence collection.
    pub fn register(&mut self, name: &str, data_type: DataType) -> ParseResult<()> {
        self.types.register(name, Some(data_type), self.cx.naming)?;
        if data_type == DataType::Sequence && !self.types.contains(DEFAULT_SEQUENCE_COLLECTION) {
            self.types.register(
                DEFAULT_SEQUENCE_COLLECTION,
                Some(DataType::SequenceCollection),
                self.cx.naming,
            )?;
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> ParseResult<()> {
        self.types.register(name, None, self.cx.naming)
    }

    pub fn operation(&self, keyword: &str) -> ParseResult<&'a OperationDef> {
        let registry = self.cx.registry;
        registry
            .operation(keyword)
            .ok_or_else(|| ParseError::syntax(format!("Unknown operation '{}'", keyword)))
    }

    pub fn type_context(&self) -> TypeContext<'_> {
        TypeContext::Protocol(self.types)
    }

    /// Parse a `where` condition and check the names it uses
    pub fn parse_where(&self, text: &str, family: ConditionFamily) -> ParseResult<Condition> {
        let condition = parse_condition(text, family)?;
        let resolve = |name: &str| self.resolve(name);
        validate_references(&condition, &resolve)?;
        Ok(condition)
    }
}

/// Target prefix and keyword of an operation line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineParts<'l> {
    pub targets: Vec<String>,
    pub bracketed: bool,
    pub keyword: String,
    pub rest: &'l str,
}

impl LineParts<'_> {
    /// The single target, if one was given
    pub fn single_target(&self) -> ParseResult<Option<String>> {
        if self.targets.len() > 1 {
            return Err(ParseError::semantic(format!(
                "The '{}' operation produces one result but {} target names were given",
                self.keyword,
                self.targets.len()
            )));
        }
        Ok(self.targets.first().cloned())
    }

    pub fn required_target(&self) -> ParseResult<String> {
        self.single_target()?.ok_or_else(|| {
            ParseError::semantic(format!(
                "The '{}' operation needs a target name ('<name> = {} ...')",
                self.keyword, self.keyword
            ))
        })
    }

    pub fn no_target(&self) -> ParseResult<()> {
        if self.targets.is_empty() {
            Ok(())
        } else {
            Err(ParseError::syntax(format!(
                "The '{}' operation does not take a target name",
                self.keyword
            )))
        }
    }
}

/// Split a line into target prefix, keyword and the rest
pub fn split_line(line: &str) -> ParseResult<LineParts<'_>> {
    let line = line.trim();
    let caps = LINE_RE
        .captures(line)
        .ok_or_else(|| ParseError::syntax(format!("Unrecognized statement '{}'", line)))?;

    let (targets, bracketed) = match caps.name("targets") {
        Some(m) => {
            let text = m.as_str();
            match text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
                Some(inner) => {
                    let names: Vec<String> =
                        inner.split(',').map(|n| n.trim().to_string()).collect();
                    if names.iter().any(|n| n.is_empty()) {
                        return Err(ParseError::syntax(format!(
                            "Empty target name in '{}'",
                            text
                        )));
                    }
                    (names, true)
                }
                None => (vec![text.to_string()], false),
            }
        }
        None => (Vec::new(), false),
    };

    Ok(LineParts {
        targets,
        bracketed,
        keyword: caps["keyword"].to_ascii_lowercase(),
        rest: caps.name("rest").map(|m| m.as_str().trim()).unwrap_or(""),
    })
}

/// Operation body with its trailing clauses taken off
#[derive(Debug, Clone, PartialEq)]
pub struct Clauses {
    pub body: String,
    pub condition: Option<String>,
    pub within: Option<WithinCondition>,
    pub collection: Option<String>,
}

/// Replace quoted, braced and parenthesised text with filler of the same byte length
fn mask_nested(text: &str) -> String {
    let mut masked = String::with_capacity(text.len());
    let mut in_quote = false;
    let mut depth = 0usize;
    for ch in text.chars() {
        let hidden = in_quote || depth > 0;
        match ch {
            '"' if depth == 0 => in_quote = !in_quote,
            '{' | '(' if !in_quote => depth += 1,
            '}' | ')' if !in_quote => depth = depth.saturating_sub(1),
            _ => {}
        }
        if hidden || in_quote || depth > 0 {
            masked.extend(std::iter::repeat_n('_', ch.len_utf8()));
        } else {
            masked.push(ch);
        }
    }
    masked
}

/// Take trailing `where`, `within[...]` and `in collection` clauses off `rest`
///
/// The clauses must appear in that order.
pub fn split_clauses(rest: &str) -> ParseResult<Clauses> {
    let mut body = rest.trim_end();
    let mut clauses = Clauses {
        body: String::new(),
        condition: None,
        within: None,
        collection: None,
    };

    let masked = mask_nested(body);
    if let Some(caps) = COLLECTION_RE.captures(&masked) {
        let (whole, name) = (caps.get(0), caps.name("name"));
        if let (Some(whole), Some(name)) = (whole, name) {
            clauses.collection = Some(body[name.range()].to_string());
            body = &body[..whole.start()];
        }
    }

    let masked = mask_nested(body);
    if let Some(caps) = WITHIN_TAIL_RE.captures(&masked) {
        let (whole, clause) = (caps.get(0), caps.name("clause"));
        if let (Some(whole), Some(clause)) = (whole, clause) {
            clauses.within = Some(parse_within(&body[clause.range()])?);
            body = &body[..whole.start()];
        }
    }

    let masked = mask_nested(body);
    if let Some(m) = WHERE_RE.find(&masked) {
        let condition = body[m.end()..].trim();
        if condition.is_empty() {
            return Err(ParseError::syntax("Missing condition after 'where'"));
        }
        clauses.condition = Some(condition.to_string());
        body = &body[..m.start()];
    }

    let masked = mask_nested(body) + " " + &mask_nested(clauses.condition.as_deref().unwrap_or(""));
    if STRAY_COLLECTION_RE.is_match(&masked) {
        return Err(ParseError::syntax(
            "'in collection' must be the last clause on the line",
        ));
    }
    if STRAY_WITHIN_RE.is_match(&masked) {
        return Err(ParseError::syntax(
            "'within' must come after 'where' and before 'in collection'",
        ));
    }

    clauses.body = body.trim().to_string();
    Ok(clauses)
}

/// Reject clauses the operation does not support and resolve the rest into the task
///
/// `family` selects the `where` grammar; `None` means the source type admits
/// no condition even if the operation does for other types.
pub fn apply_clauses(
    task: &mut OperationTask,
    op: &OperationDef,
    clauses: &Clauses,
    family: Option<ConditionFamily>,
    env: &ParseEnv<'_, '_>,
) -> ParseResult<()> {
    if let Some(text) = &clauses.condition {
        let family = match family {
            Some(family) if op.supports_where => family,
            _ => {
                return Err(ParseError::semantic(format!(
                    "A 'where' clause is not allowed here for the '{}' operation",
                    op.name
                )));
            }
        };
        task.condition = Some(env.parse_where(text, family)?);
    }
    if let Some(within) = &clauses.within {
        if !op.supports_within {
            return Err(ParseError::semantic(format!(
                "The '{}' operation does not take a 'within' clause",
                op.name
            )));
        }
        task.within = Some(within.clone());
    }
    if let Some(collection) = &clauses.collection {
        if !op.supports_collection {
            return Err(ParseError::semantic(format!(
                "The '{}' operation does not take an 'in collection' clause",
                op.name
            )));
        }
        let ty = env.require(collection)?;
        if ty != DataType::SequenceCollection {
            return Err(ParseError::semantic(format!(
                "'{}' is a {}, expected a Sequence Collection",
                collection, ty
            )));
        }
        task.collection = Some(collection.clone());
    }
    Ok(())
}

/// Condition grammar for filters on a feature dataset
pub fn family_for(ty: DataType) -> Option<ConditionFamily> {
    match ty {
        DataType::RegionDataset => Some(ConditionFamily::Region),
        DataType::NumericDataset | DataType::DnaSequenceDataset => Some(ConditionFamily::Position),
        _ => None,
    }
}

/// Canonical text of an operation line
pub fn render_line(task: &OperationTask, with_targets: bool, body: &str) -> String {
    let mut line = String::new();
    if with_targets {
        match task.targets.as_slice() {
            [] => {}
            [single] => {
                line.push_str(single);
                line.push_str(" = ");
            }
            many => {
                line.push('[');
                line.push_str(&many.join(","));
                line.push_str("] = ");
            }
        }
    }
    line.push_str(&task.operation);
    if !body.is_empty() {
        line.push(' ');
        line.push_str(body);
    }
    if let Some(condition) = &task.condition {
        line.push_str(" where ");
        line.push_str(&condition.to_string());
    }
    if let Some(within) = &task.within {
        line.push(' ');
        line.push_str(&within.to_string());
    }
    if let Some(collection) = &task.collection {
        line.push_str(" in collection ");
        line.push_str(collection);
    }
    line
}

/// Missing mandatory field while rendering a task
pub fn incomplete(task: &OperationTask, field: &str) -> ParseError {
    ParseError::internal(format!(
        "Can not render '{}' task without {}",
        task.operation, field
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_line_with_target() {
        let parts = split_line("Wide = extend Genes by 100").unwrap();
        assert_eq!(parts.targets, ["Wide"]);
        assert!(!parts.bracketed);
        assert_eq!(parts.keyword, "extend");
        assert_eq!(parts.rest, "Genes by 100");
    }

    #[test]
    fn test_split_line_bracketed_targets() {
        let parts = split_line("[Sites, Motifs] = discover motifs in DNA with MEME").unwrap();
        assert_eq!(parts.targets, ["Sites", "Motifs"]);
        assert!(parts.bracketed);
        assert!(split_line("[A,] = discover motifs in DNA with MEME").is_err());
    }

    #[test]
    fn test_split_line_without_target() {
        let parts = split_line("delete A, B").unwrap();
        assert!(parts.targets.is_empty());
        assert_eq!(parts.keyword, "delete");
        // '=' inside a settings block is not a target
        let parts = split_line("search DNA with X {a=1}").unwrap();
        assert!(parts.targets.is_empty());
        assert_eq!(parts.keyword, "search");
    }

    #[test]
    fn test_split_clauses_in_order() {
        let clauses = split_clauses(
            "Genes by 10 where region's type equals \"in collection\" within[chr1:1-10] in collection Set1",
        )
        .unwrap();
        assert_eq!(clauses.body, "Genes by 10");
        assert_eq!(
            clauses.condition.as_deref(),
            Some("region's type equals \"in collection\"")
        );
        assert_eq!(clauses.within.unwrap().ranges.len(), 1);
        assert_eq!(clauses.collection.as_deref(), Some("Set1"));
    }

    #[test]
    fn test_split_clauses_rejects_misplaced_collection() {
        let err = split_clauses("Genes in collection Set1 where region's score > 2").unwrap_err();
        assert!(err.message.contains("last clause"));
        assert!(split_clauses("DNA with random within[chr1] where inside Genes").is_err());
    }

    #[test]
    fn test_split_clauses_ignores_braces() {
        let clauses = split_clauses("DNA with SimpleScanner {Label=\"x where y\"}").unwrap();
        assert_eq!(clauses.body, "DNA with SimpleScanner {Label=\"x where y\"}");
        assert!(clauses.condition.is_none());
    }

    #[test]
    fn test_split_clauses_ignores_parentheses() {
        let clauses = split_clauses("Text Variable(see where it goes)").unwrap();
        assert_eq!(clauses.body, "Text Variable(see where it goes)");
        assert!(clauses.condition.is_none());

        let clauses =
            split_clauses("Genes where (region's score > 2 or region's length < 5) in collection Set1")
                .unwrap();
        assert_eq!(
            clauses.condition.as_deref(),
            Some("(region's score > 2 or region's length < 5)")
        );
        assert_eq!(clauses.collection.as_deref(), Some("Set1"));
    }

    #[test]
    fn test_empty_where() {
        assert!(split_clauses("Genes where ").is_err());
        assert!(split_clauses("Genes where  in collection C").is_err());
    }
}
