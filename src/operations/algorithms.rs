//! Operations backed by registry algorithms: `search`, `discover`,
//! `analyze` and `output`
//!
//! Each takes an optional `{...}` settings block checked against the
//! algorithm's parameters.

use std::sync::LazyLock;

use regex::Regex;

use super::OperationParser;
use super::common::{ParseEnv, apply_clauses, incomplete, render_line, split_clauses, split_line};
use crate::context::ParsingContext;
use crate::error::{ParseError, ParseResult};
use crate::params::{ParameterFilter, ParameterSettings, parse_settings, render_settings};
use crate::registry::{AlgorithmDef, AlgorithmKind, OperationRegistry};
use crate::task::{OperationTask, Value};

pub const ALGORITHM: &str = "algorithm";
pub const SETTINGS: &str = "settings";

static SEARCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?P<source>[^\s,]+)\s+with\s+(?P<algorithm>[^{}]+?)\s*(?:\{(?P<settings>.*)\})?$",
    )
    .unwrap()
});
static DISCOVER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^motifs\s+in\s+(?P<source>[^\s,]+)\s+with\s+(?P<algorithm>[^{}]+?)\s*(?:\{(?P<settings>.*)\})?$",
    )
    .unwrap()
});
static ANALYZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<algorithm>[^{}]+?)\s*(?:\{(?P<settings>.*)\})?$").unwrap()
});
static OUTPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?P<source>[^\s,]+)\s+in\s+(?P<algorithm>\S+)\s+format\s*(?:\{(?P<settings>.*)\})?$",
    )
    .unwrap()
});

fn kind_label(kind: AlgorithmKind) -> &'static str {
    match kind {
        AlgorithmKind::MotifScanning => "motif scanning algorithm",
        AlgorithmKind::MotifDiscovery => "motif discovery algorithm",
        AlgorithmKind::Analysis => "analysis",
        AlgorithmKind::DataFormat => "data format",
        AlgorithmKind::Transform => "transform function",
    }
}

/// Case-insensitive algorithm lookup within one family
fn find_algorithm<'r>(
    registry: &'r OperationRegistry,
    name: &str,
    kind: AlgorithmKind,
) -> ParseResult<&'r AlgorithmDef> {
    let name = name.trim();
    registry
        .algorithm_names(kind)
        .into_iter()
        .find(|known| known.eq_ignore_ascii_case(name))
        .and_then(|known| registry.algorithm_of_kind(known, kind))
        .ok_or_else(|| {
            let known = registry.algorithm_names(kind);
            let mut message = format!("Unknown {} '{}'", kind_label(kind), name);
            if !known.is_empty() {
                message.push_str(&format!(". Known: {}", known.join(", ")));
            }
            ParseError::semantic(message)
        })
}

/// Parse the optional settings block and store algorithm name plus settings
fn attach_algorithm(
    task: &mut OperationTask,
    algorithm: &AlgorithmDef,
    settings: Option<&str>,
    env: &ParseEnv<'_, '_>,
) -> ParseResult<ParameterSettings> {
    let settings = parse_settings(
        settings.unwrap_or(""),
        &algorithm.parameters,
        env.type_context(),
    )?;
    task.set(ALGORITHM, Value::Text(algorithm.name.clone()));
    task.set(SETTINGS, Value::Settings(settings.clone()));
    Ok(settings)
}

/// `with <algorithm> {settings}` text of a task
fn render_algorithm(
    task: &OperationTask,
    cx: &ParsingContext<'_>,
    kind: AlgorithmKind,
    filter: ParameterFilter,
) -> ParseResult<(String, String)> {
    let name = task.text(ALGORITHM).ok_or_else(|| incomplete(task, "an algorithm"))?;
    let algorithm = cx.registry.algorithm_of_kind(name, kind).ok_or_else(|| {
        ParseError::internal(format!("Algorithm '{}' is not in the registry", name))
    })?;
    let block = match task.settings(SETTINGS) {
        Some(settings) => render_settings(&algorithm.parameters, settings, filter),
        None => String::new(),
    };
    let block = if block.is_empty() {
        block
    } else {
        format!(" {{{}}}", block)
    };
    Ok((algorithm.name.clone(), block))
}

/// `T = search <dna> with <algorithm> [{settings}]`
pub struct SearchParser;

impl OperationParser for SearchParser {
    fn keyword(&self) -> &'static str {
        "search"
    }

    fn parse(&self, line: &str, env: &mut ParseEnv<'_, '_>) -> ParseResult<OperationTask> {
        let parts = split_line(line)?;
        let op = env.operation(self.keyword())?;
        let target = parts.required_target()?;
        let clauses = split_clauses(parts.rest)?;
        let caps = SEARCH_RE.captures(&clauses.body).ok_or_else(|| {
            ParseError::syntax(format!(
                "Unable to parse 'search' arguments '{}'. Expected: <DNA track> with <algorithm> [{{settings}}]",
                clauses.body
            ))
        })?;
        let source = &caps["source"];
        let source_type = env.require_source(op, source)?;
        let algorithm = find_algorithm(env.cx.registry, &caps["algorithm"], AlgorithmKind::MotifScanning)?;

        let mut task = OperationTask::new(self.keyword());
        task.source = Some(source.to_string());
        task.targets.push(target.clone());
        attach_algorithm(
            &mut task,
            algorithm,
            caps.name("settings").map(|m| m.as_str()),
            env,
        )?;
        apply_clauses(&mut task, op, &clauses, None, env)?;
        env.register(&target, op.result_type(source_type))?;
        Ok(task)
    }

    fn render(&self, task: &OperationTask, cx: &ParsingContext<'_>) -> ParseResult<String> {
        let source = task.source.as_deref().ok_or_else(|| incomplete(task, "a source"))?;
        let (name, block) =
            render_algorithm(task, cx, AlgorithmKind::MotifScanning, ParameterFilter::All)?;
        Ok(render_line(task, true, &format!("{} with {}{}", source, name, block)))
    }
}

/// `[T1,T2,...] = discover motifs in <dna> with <algorithm> [{settings}]`
///
/// The number of target names must equal the number of results the
/// algorithm declares; each target gets the type of its result.
pub struct DiscoverParser;

impl OperationParser for DiscoverParser {
    fn keyword(&self) -> &'static str {
        "discover"
    }

    fn parse(&self, line: &str, env: &mut ParseEnv<'_, '_>) -> ParseResult<OperationTask> {
        let parts = split_line(line)?;
        let op = env.operation(self.keyword())?;
        let clauses = split_clauses(parts.rest)?;
        let caps = DISCOVER_RE.captures(&clauses.body).ok_or_else(|| {
            ParseError::syntax(format!(
                "Unable to parse 'discover' arguments '{}'. Expected: motifs in <DNA track> with <algorithm> [{{settings}}]",
                clauses.body
            ))
        })?;
        let source = &caps["source"];
        env.require_source(op, source)?;
        let algorithm =
            find_algorithm(env.cx.registry, &caps["algorithm"], AlgorithmKind::MotifDiscovery)?;

        if parts.targets.len() != algorithm.results.len() {
            return Err(ParseError::semantic(format!(
                "The '{}' algorithm returns {} results: expected exactly {} result names but got {}",
                algorithm.name,
                algorithm.results.len(),
                algorithm.results.len(),
                parts.targets.len()
            )));
        }

        let mut task = OperationTask::new(self.keyword());
        task.source = Some(source.to_string());
        task.targets = parts.targets.clone();
        attach_algorithm(
            &mut task,
            algorithm,
            caps.name("settings").map(|m| m.as_str()),
            env,
        )?;
        apply_clauses(&mut task, op, &clauses, None, env)?;
        for (target, result_type) in parts.targets.iter().zip(&algorithm.results) {
            env.register(target, *result_type)?;
        }
        Ok(task)
    }

    fn render(&self, task: &OperationTask, cx: &ParsingContext<'_>) -> ParseResult<String> {
        let source = task.source.as_deref().ok_or_else(|| incomplete(task, "a source"))?;
        let (name, block) =
            render_algorithm(task, cx, AlgorithmKind::MotifDiscovery, ParameterFilter::All)?;
        Ok(render_line(
            task,
            true,
            &format!("motifs in {} with {}{}", source, name, block),
        ))
    }
}

/// `T = analyze <analysis> [{settings}]`
pub struct AnalyzeParser;

impl OperationParser for AnalyzeParser {
    fn keyword(&self) -> &'static str {
        "analyze"
    }

    fn parse(&self, line: &str, env: &mut ParseEnv<'_, '_>) -> ParseResult<OperationTask> {
        let parts = split_line(line)?;
        let op = env.operation(self.keyword())?;
        let target = parts.required_target()?;
        let clauses = split_clauses(parts.rest)?;
        let caps = ANALYZE_RE.captures(&clauses.body).ok_or_else(|| {
            ParseError::syntax(format!(
                "Unable to parse 'analyze' arguments '{}'. Expected: <analysis> [{{settings}}]",
                clauses.body
            ))
        })?;
        let algorithm = find_algorithm(env.cx.registry, &caps["algorithm"], AlgorithmKind::Analysis)?;

        let mut task = OperationTask::new(self.keyword());
        task.targets.push(target.clone());
        attach_algorithm(
            &mut task,
            algorithm,
            caps.name("settings").map(|m| m.as_str()),
            env,
        )?;
        apply_clauses(&mut task, op, &clauses, None, env)?;
        let result_type = op
            .output_type
            .ok_or_else(|| ParseError::internal("'analyze' has no output type"))?;
        env.register(&target, result_type)?;
        Ok(task)
    }

    fn render(&self, task: &OperationTask, cx: &ParsingContext<'_>) -> ParseResult<String> {
        let (name, block) =
            render_algorithm(task, cx, AlgorithmKind::Analysis, ParameterFilter::All)?;
        Ok(render_line(task, true, &format!("{}{}", name, block)))
    }
}

/// `T = output <source> in <format> format [{settings}]`
///
/// Only output-side format settings are written back.
pub struct OutputParser;

impl OperationParser for OutputParser {
    fn keyword(&self) -> &'static str {
        "output"
    }

    fn parse(&self, line: &str, env: &mut ParseEnv<'_, '_>) -> ParseResult<OperationTask> {
        let parts = split_line(line)?;
        let op = env.operation(self.keyword())?;
        let target = parts.required_target()?;
        let clauses = split_clauses(parts.rest)?;
        let caps = OUTPUT_RE.captures(&clauses.body).ok_or_else(|| {
            ParseError::syntax(format!(
                "Unable to parse 'output' arguments '{}'. Expected: <source> in <format> format [{{settings}}]",
                clauses.body
            ))
        })?;
        let source = &caps["source"];
        let source_type = env.require_source(op, source)?;
        let algorithm = find_algorithm(env.cx.registry, &caps["algorithm"], AlgorithmKind::DataFormat)?;

        let mut task = OperationTask::new(self.keyword());
        task.source = Some(source.to_string());
        task.targets.push(target.clone());
        attach_algorithm(
            &mut task,
            algorithm,
            caps.name("settings").map(|m| m.as_str()),
            env,
        )?;
        apply_clauses(&mut task, op, &clauses, None, env)?;
        env.register(&target, op.result_type(source_type))?;
        Ok(task)
    }

    fn render(&self, task: &OperationTask, cx: &ParsingContext<'_>) -> ParseResult<String> {
        let source = task.source.as_deref().ok_or_else(|| incomplete(task, "a source"))?;
        let (name, block) =
            render_algorithm(task, cx, AlgorithmKind::DataFormat, ParameterFilter::Output)?;
        Ok(render_line(
            task,
            true,
            &format!("{} in {} format{}", source, name, block),
        ))
    }
}
