//! Feature dataset operations
//!
//! `extend`, `mask`, `filter`, `convert`, `count`, `combine_regions` and
//! `combine_numeric`.

use std::sync::LazyLock;

use regex::Regex;

use super::OperationParser;
use super::common::{
    ParseEnv, apply_clauses, family_for, incomplete, render_line, split_clauses, split_line,
};
use crate::condition::{ConditionFamily, Operand};
use crate::context::ParsingContext;
use crate::error::{ParseError, ParseResult};
use crate::task::{OperationTask, Value};
use crate::types::DataType;

pub const DIRECTION: &str = "direction";
pub const AMOUNT: &str = "amount";
pub const DOWNSTREAM_AMOUNT: &str = "downstream amount";
pub const MASK: &str = "mask";
pub const LETTER: &str = "letter";
pub const CONVERT_TO: &str = "to";
pub const VALUE: &str = "value";
pub const SOURCES: &str = "sources";
pub const METHOD: &str = "method";

static EXTEND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?P<source>[^\s,]+)\s+(?:(?P<direction>upstream|downstream)\s+)?by\s+(?P<amount>[^\s,]+)(?:\s*,\s*(?P<second>[^\s,]+))?$",
    )
    .unwrap()
});
static MASK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^(?P<source>[^\s,]+)\s+with\s+(?:"(?P<letter>[^"]*)"|(?P<mode>\S+))$"#)
        .unwrap()
});
static SOURCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<source>[^\s,]+)$").unwrap());
static CONVERT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?P<source>[^\s,]+)\s+to\s+(?P<to>numeric|region)(?:\s+with\s+value\s+(?P<value>\S+))?$",
    )
    .unwrap()
});
static COMBINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<sources>[^{}]+?)(?:\s+using\s+(?P<method>\S+))?$").unwrap()
});

const MASK_MODES: &[&str] = &["lowercase", "uppercase", "random"];

fn body_error(keyword: &str, body: &str, usage: &str) -> ParseError {
    ParseError::syntax(format!(
        "Unable to parse '{}' arguments '{}'. Expected: {}",
        keyword, body, usage
    ))
}

/// Target for an in-place operation: the given name or the source itself
fn in_place_target(
    parts: &super::LineParts<'_>,
    source: &str,
) -> ParseResult<String> {
    Ok(parts.single_target()?.unwrap_or_else(|| source.to_string()))
}

fn source_of<'t>(task: &'t OperationTask) -> ParseResult<&'t str> {
    task.source.as_deref().ok_or_else(|| incomplete(task, "a source"))
}

/// `[T =] extend <source> [upstream|downstream] by <n>[,<m>]`
///
/// With two amounts the first extends upstream and the second downstream.
pub struct ExtendParser;

impl OperationParser for ExtendParser {
    fn keyword(&self) -> &'static str {
        "extend"
    }

    fn parse(&self, line: &str, env: &mut ParseEnv<'_, '_>) -> ParseResult<OperationTask> {
        let parts = split_line(line)?;
        let op = env.operation(self.keyword())?;
        let clauses = split_clauses(parts.rest)?;
        let caps = EXTEND_RE.captures(&clauses.body).ok_or_else(|| {
            body_error(
                "extend",
                &clauses.body,
                "<source> [upstream|downstream] by <amount>[,<amount>]",
            )
        })?;
        let source = &caps["source"];
        let source_type = env.require_source(op, source)?;
        let target = in_place_target(&parts, source)?;

        let mut task = OperationTask::new(self.keyword());
        task.source = Some(source.to_string());
        task.targets.push(target.clone());

        let amount = Operand::parse(&caps["amount"]);
        env.require_numeric(&amount, "the extension amount")?;
        task.set(AMOUNT, Value::Operand(amount));
        if let Some(second) = caps.name("second") {
            if caps.name("direction").is_some() {
                return Err(ParseError::syntax(
                    "A direction can only be combined with a single amount",
                ));
            }
            let second = Operand::parse(second.as_str());
            env.require_numeric(&second, "the downstream extension amount")?;
            task.set(DOWNSTREAM_AMOUNT, Value::Operand(second));
        }
        if let Some(direction) = caps.name("direction") {
            task.set(DIRECTION, Value::Text(direction.as_str().to_ascii_lowercase()));
        }

        let family = (source_type == DataType::RegionDataset).then_some(ConditionFamily::Region);
        apply_clauses(&mut task, op, &clauses, family, env)?;
        env.register(&target, source_type)?;
        Ok(task)
    }

    fn render(&self, task: &OperationTask, _cx: &ParsingContext<'_>) -> ParseResult<String> {
        let source = source_of(task)?;
        let amount = task.operand(AMOUNT).ok_or_else(|| incomplete(task, "an amount"))?;
        let mut body = source.to_string();
        if let Some(direction) = task.text(DIRECTION) {
            body.push(' ');
            body.push_str(direction);
        }
        body.push_str(&format!(" by {}", amount));
        if let Some(second) = task.operand(DOWNSTREAM_AMOUNT) {
            body.push_str(&format!(",{}", second));
        }
        Ok(render_line(task, true, &body))
    }
}

/// `[T =] mask <dna> with <"letter"|lowercase|uppercase|random>`
pub struct MaskParser;

impl OperationParser for MaskParser {
    fn keyword(&self) -> &'static str {
        "mask"
    }

    fn parse(&self, line: &str, env: &mut ParseEnv<'_, '_>) -> ParseResult<OperationTask> {
        let parts = split_line(line)?;
        let op = env.operation(self.keyword())?;
        let clauses = split_clauses(parts.rest)?;
        let caps = MASK_RE.captures(&clauses.body).ok_or_else(|| {
            body_error(
                "mask",
                &clauses.body,
                "<DNA track> with <\"letter\"|lowercase|uppercase|random>",
            )
        })?;
        let source = &caps["source"];
        let source_type = env.require_source(op, source)?;
        let target = in_place_target(&parts, source)?;

        let mut task = OperationTask::new(self.keyword());
        task.source = Some(source.to_string());
        task.targets.push(target.clone());

        match (caps.name("letter"), caps.name("mode")) {
            (Some(letter), _) => {
                if letter.as_str().chars().count() != 1 {
                    return Err(ParseError::semantic(format!(
                        "Masking letter must be a single character but got \"{}\"",
                        letter.as_str()
                    )));
                }
                task.set(LETTER, Value::Text(letter.as_str().to_string()));
            }
            (None, Some(mode)) => {
                let mode = MASK_MODES
                    .iter()
                    .find(|m| m.eq_ignore_ascii_case(mode.as_str()))
                    .ok_or_else(|| {
                        ParseError::semantic(format!(
                            "Unknown masking mode '{}'. Use a quoted letter or one of: {}",
                            mode.as_str(),
                            MASK_MODES.join(", ")
                        ))
                    })?;
                task.set(MASK, Value::Text(mode.to_string()));
            }
            (None, None) => return Err(body_error("mask", &clauses.body, "a masking mode")),
        }

        apply_clauses(&mut task, op, &clauses, Some(ConditionFamily::Position), env)?;
        env.register(&target, source_type)?;
        Ok(task)
    }

    fn render(&self, task: &OperationTask, _cx: &ParsingContext<'_>) -> ParseResult<String> {
        let source = source_of(task)?;
        let with = match (task.text(LETTER), task.text(MASK)) {
            (Some(letter), _) => format!("\"{}\"", letter),
            (None, Some(mode)) => mode.to_string(),
            (None, None) => return Err(incomplete(task, "a masking mode")),
        };
        Ok(render_line(task, true, &format!("{} with {}", source, with)))
    }
}

/// `[T =] filter <regions> where <region condition>`
pub struct FilterParser;

impl OperationParser for FilterParser {
    fn keyword(&self) -> &'static str {
        "filter"
    }

    fn parse(&self, line: &str, env: &mut ParseEnv<'_, '_>) -> ParseResult<OperationTask> {
        let parts = split_line(line)?;
        let op = env.operation(self.keyword())?;
        let clauses = split_clauses(parts.rest)?;
        let caps = SOURCE_RE
            .captures(&clauses.body)
            .ok_or_else(|| body_error("filter", &clauses.body, "<Region Dataset> where <condition>"))?;
        if clauses.condition.is_none() {
            return Err(ParseError::semantic(
                "The 'filter' operation requires a 'where' clause",
            ));
        }
        let source = &caps["source"];
        let source_type = env.require_source(op, source)?;
        let target = in_place_target(&parts, source)?;

        let mut task = OperationTask::new(self.keyword());
        task.source = Some(source.to_string());
        task.targets.push(target.clone());
        apply_clauses(&mut task, op, &clauses, Some(ConditionFamily::Region), env)?;
        env.register(&target, source_type)?;
        Ok(task)
    }

    fn render(&self, task: &OperationTask, _cx: &ParsingContext<'_>) -> ParseResult<String> {
        if task.condition.is_none() {
            return Err(incomplete(task, "a condition"));
        }
        Ok(render_line(task, true, source_of(task)?))
    }
}

/// `[T =] convert <source> to numeric|region [with value <v>]`
pub struct ConvertParser;

impl OperationParser for ConvertParser {
    fn keyword(&self) -> &'static str {
        "convert"
    }

    fn parse(&self, line: &str, env: &mut ParseEnv<'_, '_>) -> ParseResult<OperationTask> {
        let parts = split_line(line)?;
        let op = env.operation(self.keyword())?;
        let clauses = split_clauses(parts.rest)?;
        let caps = CONVERT_RE.captures(&clauses.body).ok_or_else(|| {
            body_error(
                "convert",
                &clauses.body,
                "<source> to numeric|region [with value <value>]",
            )
        })?;
        let source = &caps["source"];
        let source_type = env.require_source(op, source)?;
        let to = caps["to"].to_ascii_lowercase();
        let result_type = if to == "numeric" {
            DataType::NumericDataset
        } else {
            DataType::RegionDataset
        };
        if result_type == source_type {
            return Err(ParseError::semantic(format!(
                "'{}' is already a {}",
                source, source_type
            )));
        }
        let target = in_place_target(&parts, source)?;

        let mut task = OperationTask::new(self.keyword());
        task.source = Some(source.to_string());
        task.targets.push(target.clone());
        task.set(CONVERT_TO, Value::Text(to));
        if let Some(value) = caps.name("value") {
            if result_type != DataType::NumericDataset {
                return Err(ParseError::syntax(
                    "'with value' is only used when converting to numeric",
                ));
            }
            let value = Operand::parse(value.as_str());
            if let Operand::Reference(name) = &value {
                // region properties like 'score' are allowed as well as numeric data
                if env.resolve(name).is_some() {
                    env.require_numeric(&value, "the converted value")?;
                }
            }
            task.set(VALUE, Value::Operand(value));
        }

        apply_clauses(&mut task, op, &clauses, family_for(source_type), env)?;
        env.register(&target, result_type)?;
        Ok(task)
    }

    fn render(&self, task: &OperationTask, _cx: &ParsingContext<'_>) -> ParseResult<String> {
        let source = source_of(task)?;
        let to = task.text(CONVERT_TO).ok_or_else(|| incomplete(task, "a result kind"))?;
        let mut body = format!("{} to {}", source, to);
        if let Some(value) = task.operand(VALUE) {
            body.push_str(&format!(" with value {}", value));
        }
        Ok(render_line(task, true, &body))
    }
}

/// `T = count <regions>`
pub struct CountParser;

impl OperationParser for CountParser {
    fn keyword(&self) -> &'static str {
        "count"
    }

    fn parse(&self, line: &str, env: &mut ParseEnv<'_, '_>) -> ParseResult<OperationTask> {
        let parts = split_line(line)?;
        let op = env.operation(self.keyword())?;
        let target = parts.required_target()?;
        let clauses = split_clauses(parts.rest)?;
        let caps = SOURCE_RE
            .captures(&clauses.body)
            .ok_or_else(|| body_error("count", &clauses.body, "<Region Dataset>"))?;
        let source = &caps["source"];
        let source_type = env.require_source(op, source)?;

        let mut task = OperationTask::new(self.keyword());
        task.source = Some(source.to_string());
        task.targets.push(target.clone());
        apply_clauses(&mut task, op, &clauses, Some(ConditionFamily::Region), env)?;
        env.register(&target, op.result_type(source_type))?;
        Ok(task)
    }

    fn render(&self, task: &OperationTask, _cx: &ParsingContext<'_>) -> ParseResult<String> {
        Ok(render_line(task, true, source_of(task)?))
    }
}

/// `T = combine_regions A, B[, ...] [using <method>]` and the numeric variant
pub struct CombineParser {
    keyword: &'static str,
    methods: &'static [&'static str],
}

impl CombineParser {
    pub const REGIONS: CombineParser = CombineParser {
        keyword: "combine_regions",
        methods: &["union", "intersection"],
    };
    pub const NUMERIC: CombineParser = CombineParser {
        keyword: "combine_numeric",
        methods: &["sum", "average", "minimum", "maximum", "product"],
    };
}

impl OperationParser for CombineParser {
    fn keyword(&self) -> &'static str {
        self.keyword
    }

    fn parse(&self, line: &str, env: &mut ParseEnv<'_, '_>) -> ParseResult<OperationTask> {
        let parts = split_line(line)?;
        let op = env.operation(self.keyword)?;
        let target = parts.required_target()?;
        let clauses = split_clauses(parts.rest)?;
        let caps = COMBINE_RE.captures(&clauses.body).ok_or_else(|| {
            body_error(
                self.keyword,
                &clauses.body,
                "<source>, <source>[, ...] [using <method>]",
            )
        })?;

        let sources: Vec<String> = caps["sources"]
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();
        if sources.len() < 2 || sources.iter().any(|s| s.is_empty() || s.contains(char::is_whitespace)) {
            return Err(body_error(
                self.keyword,
                &clauses.body,
                "at least two comma-separated sources",
            ));
        }
        for source in &sources {
            env.require_source(op, source)?;
        }

        let mut task = OperationTask::new(self.keyword);
        task.source = sources.first().cloned();
        task.targets.push(target.clone());
        task.set(SOURCES, Value::Names(sources.clone()));
        if let Some(method) = caps.name("method") {
            let method = self
                .methods
                .iter()
                .find(|m| m.eq_ignore_ascii_case(method.as_str()))
                .ok_or_else(|| {
                    ParseError::semantic(format!(
                        "Unknown method '{}' for '{}'. Use one of: {}",
                        method.as_str(),
                        self.keyword,
                        self.methods.join(", ")
                    ))
                })?;
            task.set(METHOD, Value::Text(method.to_string()));
        }

        apply_clauses(&mut task, op, &clauses, None, env)?;
        let result_type = op
            .output_type
            .ok_or_else(|| ParseError::internal(format!("'{}' has no output type", op.name)))?;
        env.register(&target, result_type)?;
        Ok(task)
    }

    fn render(&self, task: &OperationTask, _cx: &ParsingContext<'_>) -> ParseResult<String> {
        let sources = task.names(SOURCES).ok_or_else(|| incomplete(task, "sources"))?;
        let mut body = sources.join(", ");
        if let Some(method) = task.text(METHOD) {
            body.push_str(&format!(" using {}", method));
        }
        Ok(render_line(task, true, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixture::Fixture;
    use super::*;
    use crate::condition::Condition;

    fn fixture() -> Fixture {
        Fixture::new(&[
            ("AllSequences", DataType::SequenceCollection),
            ("Genes", DataType::RegionDataset),
            ("Repeats", DataType::RegionDataset),
            ("Conservation", DataType::NumericDataset),
            ("Phylo", DataType::NumericDataset),
            ("DNA", DataType::DnaSequenceDataset),
            ("Width", DataType::NumericVariable),
            ("Label", DataType::TextVariable),
            ("Promoters", DataType::SequenceCollection),
        ])
    }

    #[test]
    fn test_extend_in_place() {
        let mut fixture = fixture();
        let (task, rendered) = fixture.round_trip("extend Genes by 100");
        assert_eq!(task.targets, ["Genes"]);
        assert_eq!(rendered, "Genes = extend Genes by 100");
    }

    #[test]
    fn test_extend_with_direction_condition_and_collection() {
        let mut fixture = fixture();
        let (task, rendered) = fixture.round_trip(
            "Wide = extend Genes upstream by Width where region's score > 2 in collection Promoters",
        );
        assert_eq!(task.text(DIRECTION), Some("upstream"));
        assert_eq!(task.operand(AMOUNT), Some(&Operand::Reference("Width".into())));
        assert!(matches!(task.condition, Some(Condition::Region(_))));
        assert_eq!(task.collection.as_deref(), Some("Promoters"));
        assert_eq!(
            rendered,
            "Wide = extend Genes upstream by Width where region's score > 2 in collection Promoters"
        );
        assert_eq!(fixture.types.get("Wide"), Some(DataType::RegionDataset));
    }

    #[test]
    fn test_extend_two_amounts() {
        let mut fixture = fixture();
        let (task, _) = fixture.round_trip("Wide = extend Genes by 10, 20");
        assert_eq!(task.operand(DOWNSTREAM_AMOUNT), Some(&Operand::Number(20.0)));
        assert!(fixture.parse("Wide = extend Genes upstream by 10,20").is_err());
    }

    #[test]
    fn test_extend_rejects_wrong_types() {
        let mut fixture = fixture();
        let err = fixture.parse("X = extend Conservation by 10").unwrap_err();
        assert!(err.message.contains("Conservation"));
        assert!(fixture.parse("X = extend Genes by Label").is_err());
        assert!(fixture.parse("X = extend Genes by 10 in collection Genes").is_err());
    }

    #[test]
    fn test_mask_letter_and_mode() {
        let mut fixture = fixture();
        let (task, rendered) = fixture.round_trip("mask DNA with \"N\" where inside Repeats");
        assert_eq!(task.text(LETTER), Some("N"));
        assert_eq!(rendered, "DNA = mask DNA with \"N\" where inside Repeats");

        let (task, _) =
            fixture.round_trip("Soft = mask DNA with LOWERCASE within[chr1:1-500,chr2]");
        assert_eq!(task.text(MASK), Some("lowercase"));
        assert_eq!(task.within.as_ref().map(|w| w.ranges.len()), Some(2));

        assert!(fixture.parse("mask DNA with \"NN\"").is_err());
        assert!(fixture.parse("mask DNA with purple").is_err());
        assert!(fixture.parse("mask Genes with random").is_err());
    }

    #[test]
    fn test_filter_requires_condition() {
        let mut fixture = fixture();
        let (task, rendered) = fixture.round_trip(
            "Strong = filter Genes where region's score >= 5 or region overlaps Repeats",
        );
        assert!(matches!(task.condition, Some(Condition::Boolean { .. })));
        assert_eq!(
            rendered,
            "Strong = filter Genes where region's score >= 5 or region overlaps Repeats"
        );
        let err = fixture.parse("filter Genes").unwrap_err();
        assert!(err.message.contains("where"));
        assert!(fixture.parse("filter Genes where region overlaps Conservation").is_err());
    }

    #[test]
    fn test_convert_changes_type() {
        let mut fixture = fixture();
        let (task, _) = fixture.round_trip("Scores = convert Genes to numeric with value score");
        assert_eq!(task.operand(VALUE), Some(&Operand::Reference("score".into())));
        assert_eq!(fixture.types.get("Scores"), Some(DataType::NumericDataset));

        fixture.round_trip("Peaks = convert Conservation to region where Conservation > 0.5");
        assert_eq!(fixture.types.get("Peaks"), Some(DataType::RegionDataset));

        assert!(fixture.parse("X = convert Genes to region").is_err());
        assert!(fixture.parse("X = convert Conservation to region with value 1").is_err());
    }

    #[test]
    fn test_count_produces_numeric_map() {
        let mut fixture = fixture();
        let (task, _) = fixture.round_trip("Hits = count Genes where region's length > 100");
        assert_eq!(task.source.as_deref(), Some("Genes"));
        assert_eq!(fixture.types.get("Hits"), Some(DataType::SequenceNumericMap));
        assert!(fixture.parse("count Genes").is_err());
    }

    #[test]
    fn test_combine() {
        let mut fixture = fixture();
        let (task, rendered) = fixture.round_trip("All = combine_regions Genes,Repeats using UNION");
        assert_eq!(task.names(SOURCES).map(<[String]>::len), Some(2));
        assert_eq!(rendered, "All = combine_regions Genes, Repeats using union");

        fixture.round_trip("Mean = combine_numeric Conservation, Phylo using average");
        assert_eq!(fixture.types.get("Mean"), Some(DataType::NumericDataset));

        assert!(fixture.parse("X = combine_regions Genes").is_err());
        assert!(fixture.parse("X = combine_regions Genes, Conservation").is_err());
        assert!(fixture.parse("X = combine_numeric Conservation, Phylo using median").is_err());
    }
}
