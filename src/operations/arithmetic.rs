//! Arithmetic on numeric data: `increment`, `decrement`, `multiply`,
//! `divide`, `set` and `transform`

use std::sync::LazyLock;

use regex::Regex;

use super::OperationParser;
use super::common::{
    LineParts, ParseEnv, apply_clauses, family_for, incomplete, render_line, split_clauses,
    split_line,
};
use crate::condition::Operand;
use crate::context::ParsingContext;
use crate::error::{ParseError, ParseResult};
use crate::registry::AlgorithmKind;
use crate::task::{OperationTask, Value};

pub const VALUE: &str = "value";
pub const FUNCTION: &str = "function";
pub const ARGUMENT: &str = "argument";

static ARITHMETIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<source>[^\s,]+)\s+(?P<prep>by|to)\s+(?P<value>[^\s,]+)$").unwrap()
});
static TRANSFORM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<source>[^\s,]+)\s+with\s+(?P<function>[^\s,]+)(?:\s+by\s+(?P<argument>[^\s,]+))?$")
        .unwrap()
});

fn target_for(parts: &LineParts<'_>, source: &str) -> ParseResult<String> {
    Ok(parts.single_target()?.unwrap_or_else(|| source.to_string()))
}

/// `[T =] <op> <source> by|to <number|data>`
pub struct ArithmeticParser {
    keyword: &'static str,
    preposition: &'static str,
}

impl ArithmeticParser {
    pub const INCREMENT: ArithmeticParser = ArithmeticParser {
        keyword: "increment",
        preposition: "by",
    };
    pub const DECREMENT: ArithmeticParser = ArithmeticParser {
        keyword: "decrement",
        preposition: "by",
    };
    pub const MULTIPLY: ArithmeticParser = ArithmeticParser {
        keyword: "multiply",
        preposition: "by",
    };
    pub const DIVIDE: ArithmeticParser = ArithmeticParser {
        keyword: "divide",
        preposition: "by",
    };
    pub const SET: ArithmeticParser = ArithmeticParser {
        keyword: "set",
        preposition: "to",
    };
}

impl OperationParser for ArithmeticParser {
    fn keyword(&self) -> &'static str {
        self.keyword
    }

    fn parse(&self, line: &str, env: &mut ParseEnv<'_, '_>) -> ParseResult<OperationTask> {
        let parts = split_line(line)?;
        let op = env.operation(self.keyword)?;
        let clauses = split_clauses(parts.rest)?;
        let caps = ARITHMETIC_RE
            .captures(&clauses.body)
            .filter(|caps| caps["prep"].eq_ignore_ascii_case(self.preposition))
            .ok_or_else(|| {
                ParseError::syntax(format!(
                    "Unable to parse '{}' arguments '{}'. Expected: <source> {} <value>",
                    self.keyword, clauses.body, self.preposition
                ))
            })?;
        let source = &caps["source"];
        let source_type = env.require_source(op, source)?;
        let target = target_for(&parts, source)?;

        let value = Operand::parse(&caps["value"]);
        env.require_numeric(&value, "the operand")?;
        if self.keyword == "divide" && value == Operand::Number(0.0) {
            return Err(ParseError::semantic("Division by zero"));
        }

        let mut task = OperationTask::new(self.keyword);
        task.source = Some(source.to_string());
        task.targets.push(target.clone());
        task.set(VALUE, Value::Operand(value));
        apply_clauses(&mut task, op, &clauses, family_for(source_type), env)?;
        env.register(&target, source_type)?;
        Ok(task)
    }

    fn render(&self, task: &OperationTask, _cx: &ParsingContext<'_>) -> ParseResult<String> {
        let source = task.source.as_deref().ok_or_else(|| incomplete(task, "a source"))?;
        let value = task.operand(VALUE).ok_or_else(|| incomplete(task, "a value"))?;
        Ok(render_line(
            task,
            true,
            &format!("{} {} {}", source, self.preposition, value),
        ))
    }
}

/// `[T =] transform <source> with <function> [by <argument>]`
///
/// Functions come from the registry's transform algorithms, which also say
/// whether an argument is expected.
pub struct TransformParser;

impl OperationParser for TransformParser {
    fn keyword(&self) -> &'static str {
        "transform"
    }

    fn parse(&self, line: &str, env: &mut ParseEnv<'_, '_>) -> ParseResult<OperationTask> {
        let parts = split_line(line)?;
        let op = env.operation(self.keyword())?;
        let clauses = split_clauses(parts.rest)?;
        let caps = TRANSFORM_RE.captures(&clauses.body).ok_or_else(|| {
            ParseError::syntax(format!(
                "Unable to parse 'transform' arguments '{}'. Expected: <source> with <function> [by <argument>]",
                clauses.body
            ))
        })?;
        let source = &caps["source"];
        let source_type = env.require_source(op, source)?;
        let target = target_for(&parts, source)?;

        let registry = env.cx.registry;
        let function = registry
            .algorithm_names(AlgorithmKind::Transform)
            .into_iter()
            .find(|name| name.eq_ignore_ascii_case(&caps["function"]))
            .and_then(|name| registry.algorithm(name))
            .ok_or_else(|| {
                ParseError::semantic(format!(
                    "Unknown transform function '{}'. Known functions: {}",
                    &caps["function"],
                    registry.algorithm_names(AlgorithmKind::Transform).join(", ")
                ))
            })?;

        let mut task = OperationTask::new(self.keyword());
        task.source = Some(source.to_string());
        task.targets.push(target.clone());
        task.set(FUNCTION, Value::Text(function.name.clone()));
        match (function.takes_argument, caps.name("argument")) {
            (true, Some(argument)) => {
                let argument = Operand::parse(argument.as_str());
                env.require_numeric(&argument, "the function argument")?;
                task.set(ARGUMENT, Value::Operand(argument));
            }
            (true, None) => {
                return Err(ParseError::semantic(format!(
                    "Function '{}' needs an argument ('by <value>')",
                    function.name
                )));
            }
            (false, Some(_)) => {
                return Err(ParseError::semantic(format!(
                    "Function '{}' does not take an argument",
                    function.name
                )));
            }
            (false, None) => {}
        }

        apply_clauses(&mut task, op, &clauses, family_for(source_type), env)?;
        env.register(&target, source_type)?;
        Ok(task)
    }

    fn render(&self, task: &OperationTask, _cx: &ParsingContext<'_>) -> ParseResult<String> {
        let source = task.source.as_deref().ok_or_else(|| incomplete(task, "a source"))?;
        let function = task.text(FUNCTION).ok_or_else(|| incomplete(task, "a function"))?;
        let mut body = format!("{} with {}", source, function);
        if let Some(argument) = task.operand(ARGUMENT) {
            body.push_str(&format!(" by {}", argument));
        }
        Ok(render_line(task, true, &body))
    }
}
