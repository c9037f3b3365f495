//! Operation parsers
//!
//! One parser per operation keyword. Parsers are looked up in a static
//! table; the registry says which keywords exist and what they accept,
//! the parser knows the line grammar.

pub mod algorithms;
pub mod arithmetic;
pub mod common;
pub mod data;
pub mod features;

use crate::context::ParsingContext;
use crate::error::{ParseError, ParseResult};
use crate::task::OperationTask;

pub use common::{Clauses, LineParts, ParseEnv, split_clauses, split_line};

/// Grammar of one operation keyword
pub trait OperationParser: Sync {
    /// Keyword handled by this parser
    fn keyword(&self) -> &'static str;

    /// Parse a full (macro-expanded) line, updating the type table
    fn parse(&self, line: &str, env: &mut ParseEnv<'_, '_>) -> ParseResult<OperationTask>;

    /// Canonical text for a task produced by [`OperationParser::parse`]
    fn render(&self, task: &OperationTask, cx: &ParsingContext<'_>) -> ParseResult<String>;
}

static PARSERS: &[&dyn OperationParser] = &[
    &data::NewParser,
    &data::CopyParser,
    &data::RenameParser,
    &data::DeleteParser,
    &features::ExtendParser,
    &features::MaskParser,
    &features::FilterParser,
    &features::ConvertParser,
    &features::CountParser,
    &features::CombineParser::REGIONS,
    &features::CombineParser::NUMERIC,
    &arithmetic::ArithmeticParser::INCREMENT,
    &arithmetic::ArithmeticParser::DECREMENT,
    &arithmetic::ArithmeticParser::MULTIPLY,
    &arithmetic::ArithmeticParser::DIVIDE,
    &arithmetic::ArithmeticParser::SET,
    &arithmetic::TransformParser,
    &algorithms::SearchParser,
    &algorithms::DiscoverParser,
    &algorithms::AnalyzeParser,
    &algorithms::OutputParser,
];

/// Parser for an operation keyword
pub fn parser_for(keyword: &str) -> Option<&'static dyn OperationParser> {
    PARSERS
        .iter()
        .copied()
        .find(|p| p.keyword().eq_ignore_ascii_case(keyword))
}

/// Keywords that have a parser
pub fn keywords() -> impl Iterator<Item = &'static str> {
    PARSERS.iter().map(|p| p.keyword())
}

/// Parse one operation line with the parser its keyword selects
///
/// A keyword the registry knows but no parser handles is an internal error,
/// not a scripting mistake.
pub fn parse_operation(line: &str, env: &mut ParseEnv<'_, '_>) -> ParseResult<OperationTask> {
    let parts = split_line(line)?;
    env.operation(&parts.keyword)?;
    let parser = parser_for(&parts.keyword).ok_or_else(|| {
        ParseError::internal(format!(
            "No parser registered for operation '{}'",
            parts.keyword
        ))
    })?;
    let mut task = parser.parse(line, env)?;
    task.line = env.line;
    Ok(task)
}

/// Canonical line for an operation task
pub fn render_operation(task: &OperationTask, cx: &ParsingContext<'_>) -> ParseResult<String> {
    let parser = parser_for(&task.operation).ok_or_else(|| {
        ParseError::internal(format!(
            "No parser registered for operation '{}'",
            task.operation
        ))
    })?;
    parser.render(task, cx)
}


#[cfg(test)]
mod tests {
    use super::fixture::Fixture;
    use super::*;
    use crate::error::ErrorKind;
    use crate::registry::OperationRegistry;
    use crate::types::DataType;

    #[test]
    fn test_every_builtin_operation_has_a_parser() {
        let registry = OperationRegistry::builtin();
        for name in registry.operation_names() {
            assert!(parser_for(name).is_some(), "no parser for '{}'", name);
        }
    }

    #[test]
    fn test_keywords_are_unique() {
        let mut all: Vec<_> = keywords().collect();
        let count = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), count);
    }

    #[test]
    fn test_unknown_keyword_is_a_syntax_error() {
        let mut fixture = Fixture::new(&[]);
        let err = fixture.parse("X = frobnicate Y").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
        assert!(err.message.contains("frobnicate"));
    }

    #[test]
    fn test_registry_keyword_without_parser_is_internal() {
        let mut fixture = Fixture::new(&[("Genes", DataType::RegionDataset)]);
        fixture
            .registry
            .add_toml(
                r#"
                [registry]
                name = "plugin"

                [[operations]]
                name = "smooth"
                "#,
            )
            .unwrap();
        let err = fixture.parse("X = smooth Genes").unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn test_line_number_is_recorded() {
        let mut fixture = Fixture::new(&[("Genes", DataType::RegionDataset)]);
        let task = fixture.parse("Copy1 = copy Genes").unwrap();
        assert_eq!(task.line, Some(1));
    }
}
