//! Data object management: `new`, `copy`, `rename`, `delete`

use std::sync::LazyLock;

use regex::Regex;

use super::OperationParser;
use super::common::{ParseEnv, apply_clauses, incomplete, render_line, split_clauses, split_line};
use crate::context::ParsingContext;
use crate::error::{ParseError, ParseResult};
use crate::task::{OperationTask, Value};
use crate::types::DataType;

pub const TYPE: &str = "type";
pub const ARGUMENTS: &str = "arguments";

static NEW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<type>[A-Za-z][A-Za-z ]*?)\s*(?:\((?P<args>.*)\))?$").unwrap()
});
static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?P<name>[^\s,]+)$").unwrap());
static RENAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<old>[^\s,]+)\s+to\s+(?P<new>[^\s,]+)$").unwrap()
});

fn body_error(keyword: &str, body: &str, usage: &str) -> ParseError {
    ParseError::syntax(format!(
        "Unable to parse '{}' arguments '{}'. Expected: {}",
        keyword, body, usage
    ))
}

/// `T = new <Type>[(<arguments>)]`
pub struct NewParser;

impl OperationParser for NewParser {
    fn keyword(&self) -> &'static str {
        "new"
    }

    fn parse(&self, line: &str, env: &mut ParseEnv<'_, '_>) -> ParseResult<OperationTask> {
        let parts = split_line(line)?;
        let op = env.operation(self.keyword())?;
        let target = parts.required_target()?;
        let clauses = split_clauses(parts.rest)?;
        let caps = NEW_RE
            .captures(&clauses.body)
            .ok_or_else(|| body_error("new", &clauses.body, "<Type>[(<arguments>)]"))?;

        let data_type: DataType = caps["type"].parse().map_err(ParseError::semantic)?;
        if matches!(data_type, DataType::OutputData | DataType::Analysis) {
            return Err(ParseError::semantic(format!(
                "Objects of type {} are created by operations, not with 'new'",
                data_type
            )));
        }

        let mut task = OperationTask::new(self.keyword());
        task.targets.push(target.clone());
        task.set(TYPE, Value::DataType(data_type));
        if let Some(args) = caps.name("args") {
            task.set(ARGUMENTS, Value::Text(args.as_str().trim().to_string()));
        }
        apply_clauses(&mut task, op, &clauses, None, env)?;
        env.register(&target, data_type)?;
        Ok(task)
    }

    fn render(&self, task: &OperationTask, _cx: &ParsingContext<'_>) -> ParseResult<String> {
        let data_type = task.data_type(TYPE).ok_or_else(|| incomplete(task, "a type"))?;
        let body = match task.text(ARGUMENTS) {
            Some(args) => format!("{}({})", data_type, args),
            None => data_type.to_string(),
        };
        Ok(render_line(task, true, &body))
    }
}

/// `T = copy <source>`
pub struct CopyParser;

impl OperationParser for CopyParser {
    fn keyword(&self) -> &'static str {
        "copy"
    }

    fn parse(&self, line: &str, env: &mut ParseEnv<'_, '_>) -> ParseResult<OperationTask> {
        let parts = split_line(line)?;
        let op = env.operation(self.keyword())?;
        let target = parts.required_target()?;
        let clauses = split_clauses(parts.rest)?;
        let caps = NAME_RE
            .captures(&clauses.body)
            .ok_or_else(|| body_error("copy", &clauses.body, "<source>"))?;
        let source = &caps["name"];
        let data_type = env.require_source(op, source)?;

        let mut task = OperationTask::new(self.keyword());
        task.source = Some(source.to_string());
        task.targets.push(target.clone());
        apply_clauses(&mut task, op, &clauses, None, env)?;
        env.register(&target, data_type)?;
        Ok(task)
    }

    fn render(&self, task: &OperationTask, _cx: &ParsingContext<'_>) -> ParseResult<String> {
        let source = task.source.as_deref().ok_or_else(|| incomplete(task, "a source"))?;
        Ok(render_line(task, true, source))
    }
}

/// `rename <old> to <new>`
pub struct RenameParser;

impl OperationParser for RenameParser {
    fn keyword(&self) -> &'static str {
        "rename"
    }

    fn parse(&self, line: &str, env: &mut ParseEnv<'_, '_>) -> ParseResult<OperationTask> {
        let parts = split_line(line)?;
        let op = env.operation(self.keyword())?;
        parts.no_target()?;
        let clauses = split_clauses(parts.rest)?;
        let caps = RENAME_RE
            .captures(&clauses.body)
            .ok_or_else(|| body_error("rename", &clauses.body, "<old name> to <new name>"))?;
        let (old, new) = (&caps["old"], &caps["new"]);
        let data_type = env.require(old)?;
        if old != new && env.resolve(new).is_some() {
            return Err(ParseError::semantic(format!(
                "Can not rename '{}' to '{}' since '{}' already exists",
                old, new, new
            )));
        }

        let mut task = OperationTask::new(self.keyword());
        task.source = Some(old.to_string());
        task.targets.push(new.to_string());
        apply_clauses(&mut task, op, &clauses, None, env)?;
        env.register(new, data_type)?;
        if old != new {
            env.remove(old)?;
        }
        Ok(task)
    }

    fn render(&self, task: &OperationTask, _cx: &ParsingContext<'_>) -> ParseResult<String> {
        let old = task.source.as_deref().ok_or_else(|| incomplete(task, "a source"))?;
        let new = task.targets.first().ok_or_else(|| incomplete(task, "a new name"))?;
        Ok(render_line(task, false, &format!("{} to {}", old, new)))
    }
}

/// `delete <name>[, <name>...]`
pub struct DeleteParser;

impl OperationParser for DeleteParser {
    fn keyword(&self) -> &'static str {
        "delete"
    }

    fn parse(&self, line: &str, env: &mut ParseEnv<'_, '_>) -> ParseResult<OperationTask> {
        let parts = split_line(line)?;
        let op = env.operation(self.keyword())?;
        parts.no_target()?;
        let clauses = split_clauses(parts.rest)?;

        let mut task = OperationTask::new(self.keyword());
        for name in clauses.body.split(',').map(str::trim) {
            if !NAME_RE.is_match(name) {
                return Err(body_error("delete", &clauses.body, "<name>[, <name>...]"));
            }
            env.require(name)?;
            if task.targets.iter().any(|t| t == name) {
                return Err(ParseError::semantic(format!(
                    "'{}' is listed more than once",
                    name
                )));
            }
            task.targets.push(name.to_string());
        }
        apply_clauses(&mut task, op, &clauses, None, env)?;
        for name in &task.targets {
            env.remove(name)?;
        }
        Ok(task)
    }

    fn render(&self, task: &OperationTask, _cx: &ParsingContext<'_>) -> ParseResult<String> {
        if task.targets.is_empty() {
            return Err(incomplete(task, "names to delete"));
        }
        Ok(render_line(task, false, &task.targets.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixture::Fixture;
    use super::*;

    #[test]
    fn test_new_registers_type() {
        let mut fixture = Fixture::new(&[]);
        let (task, rendered) = fixture.round_trip("Cutoff = new Numeric Variable(0.5)");
        assert_eq!(task.data_type(TYPE), Some(DataType::NumericVariable));
        assert_eq!(task.text(ARGUMENTS), Some("0.5"));
        assert_eq!(rendered, "Cutoff = new Numeric Variable(0.5)");
        assert_eq!(fixture.types.get("Cutoff"), Some(DataType::NumericVariable));
    }

    #[test]
    fn test_new_sequence_loads_default_collection() {
        let mut fixture = Fixture::new(&[]);
        fixture.parse("ENSG0001.2 = new Sequence(chr1:100-200)").unwrap();
        assert_eq!(fixture.types.get("ENSG0001.2"), Some(DataType::Sequence));
        assert!(fixture.types.sequences_loaded());
    }

    #[test]
    fn test_new_arguments_may_contain_clause_words() {
        let mut fixture = Fixture::new(&[]);
        let (task, rendered) = fixture.round_trip("Note = new Text Variable(see where it goes)");
        assert_eq!(task.text(ARGUMENTS), Some("see where it goes"));
        assert_eq!(rendered, "Note = new Text Variable(see where it goes)");
    }

    #[test]
    fn test_new_rejects_bad_input() {
        let mut fixture = Fixture::new(&[]);
        assert!(fixture.parse("X = new Gadget").is_err());
        assert!(fixture.parse("new Numeric Variable").is_err());
        assert!(fixture.parse("1X = new Numeric Variable").is_err());
        assert!(fixture.parse("X = new Analysis").is_err());
        assert!(fixture.types.is_empty());
    }

    #[test]
    fn test_copy() {
        let mut fixture = Fixture::new(&[("Genes", DataType::RegionDataset)]);
        let (task, _) = fixture.round_trip("Backup = copy Genes");
        assert_eq!(task.source.as_deref(), Some("Genes"));
        assert_eq!(fixture.types.get("Backup"), Some(DataType::RegionDataset));
        assert!(fixture.parse("B = copy Missing").is_err());
    }

    #[test]
    fn test_rename_moves_type() {
        let mut fixture = Fixture::new(&[("Genes", DataType::RegionDataset)]);
        let (_, rendered) = fixture.round_trip("rename Genes to Promoters");
        assert_eq!(rendered, "rename Genes to Promoters");
        assert_eq!(fixture.types.get("Genes"), None);
        assert_eq!(fixture.types.get("Promoters"), Some(DataType::RegionDataset));
    }

    #[test]
    fn test_rename_refuses_existing_target() {
        let mut fixture = Fixture::new(&[
            ("A", DataType::RegionDataset),
            ("B", DataType::NumericDataset),
        ]);
        assert!(fixture.parse("rename A to B").is_err());
        assert!(fixture.parse("X = rename A to C").is_err());
    }

    #[test]
    fn test_delete_several() {
        let mut fixture = Fixture::new(&[
            ("A", DataType::RegionDataset),
            ("B", DataType::NumericDataset),
        ]);
        let (task, rendered) = fixture.round_trip("delete A,B");
        assert_eq!(task.targets, ["A", "B"]);
        assert_eq!(rendered, "delete A, B");
        assert!(fixture.types.is_empty());
    }

    #[test]
    fn test_delete_unknown_or_duplicate() {
        let mut fixture = Fixture::new(&[("A", DataType::RegionDataset)]);
        assert!(fixture.parse("delete A, Z").is_err());
        assert!(fixture.parse("delete A, A").is_err());
        assert!(fixture.parse("delete A where region's score > 1").is_err());
    }
}
