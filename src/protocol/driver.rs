//! Protocol driver
//!
//! Owns the protocol lines, the type table and the macro set. Lines are
//! numbered from 1 in every method.

use super::flow::FlowBuilder;
use super::statement::{FlowKind, LineKind, Statement, classify, parse_display, preprocess};
use crate::condition::{Condition, ConditionFamily, parse_condition, validate_references};
use crate::context::ParsingContext;
use crate::error::{ParseError, ParseResult};
use crate::macros::{MacroSet, expand};
use crate::operations::{ParseEnv, parse_operation, render_operation};
use crate::task::{CompoundTask, Task};
use crate::types::TypeTable;

pub struct Protocol<'a> {
    lines: Vec<String>,
    cx: ParsingContext<'a>,
    types: TypeTable,
    macros: MacroSet,
}

impl<'a> Protocol<'a> {
    pub fn new(cx: ParsingContext<'a>) -> Self {
        Self {
            lines: Vec::new(),
            cx,
            types: TypeTable::new(),
            macros: MacroSet::new(),
        }
    }

    pub fn with_text(cx: ParsingContext<'a>, text: &str) -> Self {
        let mut protocol = Self::new(cx);
        protocol.set_text(text);
        protocol
    }

    // ---------------------------------------------------------------- lines

    pub fn set_text(&mut self, text: &str) {
        self.lines = text.lines().map(str::to_string).collect();
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line(&self, n: usize) -> Option<&str> {
        n.checked_sub(1)
            .and_then(|index| self.lines.get(index))
            .map(String::as_str)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Insert a line so that it becomes line `n`; `n` may be one past the end
    pub fn insert_line(&mut self, n: usize, text: &str) -> ParseResult<()> {
        if n == 0 || n > self.lines.len() + 1 {
            return Err(self.out_of_range(n));
        }
        self.lines.insert(n - 1, text.to_string());
        Ok(())
    }

    /// Replace line `n`, returning the previous text
    pub fn replace_line(&mut self, n: usize, text: &str) -> ParseResult<String> {
        self.check_line(n)?;
        Ok(std::mem::replace(&mut self.lines[n - 1], text.to_string()))
    }

    pub fn remove_line(&mut self, n: usize) -> ParseResult<String> {
        self.check_line(n)?;
        Ok(self.lines.remove(n - 1))
    }

    fn out_of_range(&self, n: usize) -> ParseError {
        ParseError::semantic(format!(
            "Line {} is outside the protocol ({} lines)",
            n,
            self.lines.len()
        ))
    }

    fn check_line(&self, n: usize) -> ParseResult<&str> {
        self.line(n).ok_or_else(|| self.out_of_range(n))
    }

    // ---------------------------------------------------------------- state

    pub fn context(&self) -> ParsingContext<'a> {
        self.cx
    }

    /// Types as left by the last parse
    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn macros(&self) -> &MacroSet {
        &self.macros
    }

    /// Clear the type table and collect macro definitions from every line
    pub fn reset(&mut self) {
        self.types.clear();
        self.collect_macros();
    }

    fn collect_macros(&mut self) {
        self.macros.clear();
        for line in &self.lines {
            let LineKind::Display(text) = classify(line) else {
                continue;
            };
            let Ok(setting) = parse_display(text) else {
                continue;
            };
            if let (true, Some(value)) = (setting.is_macro(), &setting.value) {
                self.macros.define(&setting.target, value, setting.force);
            }
        }
        log::debug!("Collected {} macro definitions", self.macros.len());
    }

    /// Flow-control keyword of line `n`, judged on its raw text
    pub fn flow_kind(&self, n: usize) -> Option<FlowKind> {
        match classify(self.line(n)?) {
            LineKind::Flow { kind, .. } => Some(kind),
            _ => None,
        }
    }

    // ---------------------------------------------------------------- parsing

    /// Parse line `n` against the current types and macros
    ///
    /// Operation lines update the type table. A line that expands to several
    /// lines through a list macro becomes a compound task. A failing line
    /// leaves the type table as it was before the line.
    pub fn parse_statement(&mut self, n: usize) -> ParseResult<Statement> {
        let before = self.types.clone();
        let result = self.parse_line_statement(n);
        if result.is_err() {
            self.types = before;
        }
        result
    }

    fn parse_line_statement(&mut self, n: usize) -> ParseResult<Statement> {
        let raw = self.check_line(n)?.to_string();
        let text = preprocess(&raw);
        match classify(text) {
            LineKind::Empty => return Ok(Statement::Blank),
            // Directives are taken literally so macro definitions keep their text
            LineKind::Display(text) => {
                let setting = parse_display(text).map_err(|e| e.at_line(n))?;
                return Ok(Statement::Task(Task::Display(setting)));
            }
            _ => {}
        }

        let expanded = expand(text, &self.macros).map_err(|e| e.at_line(n))?;
        let mut lines: Vec<&str> = expanded
            .iter()
            .map(|l| preprocess(l))
            .filter(|l| !l.is_empty())
            .collect();
        if expanded.len() > 1 {
            log::trace!("Line {} expanded to {} lines", n, expanded.len());
        }

        match lines.len() {
            0 => Ok(Statement::Blank),
            1 => self.parse_expanded(lines.remove(0), n).map_err(|e| e.at_line(n)),
            _ => {
                let mut block = CompoundTask::new();
                for line in lines {
                    match self.parse_expanded(line, n).map_err(|e| e.at_line(n))? {
                        Statement::Task(task) => block.push(task),
                        Statement::Flow { kind, .. } => {
                            return Err(ParseError::syntax(format!(
                                "'{}' can not be produced by a list macro",
                                kind.keyword()
                            ))
                            .at_line(n));
                        }
                        Statement::Blank => {}
                    }
                }
                Ok(Statement::Task(Task::Compound(block)))
            }
        }
    }

    /// One macro-free line
    fn parse_expanded(&mut self, line: &str, n: usize) -> ParseResult<Statement> {
        let statement = match classify(line) {
            LineKind::Empty => Statement::Blank,
            LineKind::Display(text) => Statement::Task(Task::Display(parse_display(text)?)),
            LineKind::Flow { kind, condition } => Statement::Flow {
                kind,
                condition: self.flow_condition(kind, condition)?,
            },
            LineKind::Operation(text) => {
                let mut env = ParseEnv::new(self.cx, &mut self.types, Some(n));
                Statement::Task(Task::Operation(parse_operation(text, &mut env)?))
            }
        };
        Ok(statement)
    }

    fn flow_condition(&self, kind: FlowKind, text: Option<&str>) -> ParseResult<Option<Condition>> {
        if !kind.takes_condition() {
            return Ok(None);
        }
        let text = text.ok_or_else(|| {
            ParseError::syntax(format!("Missing condition after '{}'", kind.keyword()))
        })?;
        let condition = parse_condition(text, ConditionFamily::Basic)?;
        let resolve = |name: &str| self.types.get(name).or_else(|| self.cx.lookup.data_type(name));
        validate_references(&condition, &resolve)?;
        Ok(Some(condition))
    }

    /// Parse lines `1..=through` for their effect on the type table only
    ///
    /// Errors are logged and skipped; a line that fails here may already be
    /// fixed by the time it is parsed for real.
    fn replay(&mut self, through: usize) {
        for n in 1..=through.min(self.lines.len()) {
            if let Err(err) = self.parse_statement(n) {
                log::debug!("Skipping failed line while rebuilding types: {}", err);
            }
        }
    }

    pub fn parse_whole_protocol(&mut self) -> ParseResult<CompoundTask> {
        if self.lines.is_empty() {
            self.reset();
            return Ok(CompoundTask::new());
        }
        self.parse_range(1, self.lines.len())
    }

    /// Parse lines `start..=end` into a task tree
    ///
    /// Lines before `start` are replayed first so the range sees the types
    /// they create. Flow-control blocks must be complete within the range.
    pub fn parse_range(&mut self, start: usize, end: usize) -> ParseResult<CompoundTask> {
        if start == 0 || start > end || end > self.lines.len() {
            return Err(ParseError::semantic(format!(
                "Invalid line range {}-{} for a protocol of {} lines",
                start,
                end,
                self.lines.len()
            )));
        }
        self.reset();
        self.replay(start - 1);

        let mut flow = FlowBuilder::new();
        for n in start..=end {
            match self.parse_statement(n)? {
                Statement::Blank => {}
                Statement::Flow { kind, condition } => flow.apply(kind, condition, n)?,
                Statement::Task(task) => flow.push(task),
            }
        }
        let script = flow.finish()?;
        log::debug!(
            "Parsed lines {}-{} into {} tasks ({} operations)",
            start,
            end,
            script.len(),
            script.operation_count()
        );
        Ok(script)
    }

    /// Parse the single command on line `n`
    ///
    /// With `clear_type_table` the types are rebuilt from lines `1..n` first.
    /// Without it the current types are used as they are, which suits
    /// callers stepping through consecutive lines. Macros are always
    /// collected again from the whole text. Blank and flow-control lines
    /// give `None`.
    pub fn parse_single_command(
        &mut self,
        n: usize,
        clear_type_table: bool,
    ) -> ParseResult<Option<Task>> {
        self.check_line(n)?;
        if clear_type_table {
            self.reset();
            self.replay(n - 1);
        } else {
            self.collect_macros();
        }
        match self.parse_statement(n)? {
            Statement::Task(task) => Ok(Some(task)),
            Statement::Blank | Statement::Flow { .. } => Ok(None),
        }
    }

    /// Types after lines `1..=n` have been executed; `0` gives an empty table
    pub fn type_state_at_line(&mut self, n: usize) -> TypeTable {
        self.reset();
        self.replay(n);
        self.types.clone()
    }

    /// Canonical protocol text for a task
    pub fn render(&self, task: &Task) -> ParseResult<String> {
        render_task(task, &self.cx)
    }
}

impl std::fmt::Debug for Protocol<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Protocol")
            .field("lines", &self.lines.len())
            .field("types", &self.types.len())
            .field("macros", &self.macros.len())
            .finish()
    }
}

/// Canonical text for any task; blocks become several lines
pub fn render_task(task: &Task, cx: &ParsingContext<'_>) -> ParseResult<String> {
    let mut lines = Vec::new();
    render_into(task, cx, &mut lines)?;
    Ok(lines.join("\n"))
}

fn render_into(task: &Task, cx: &ParsingContext<'_>, out: &mut Vec<String>) -> ParseResult<()> {
    match task {
        Task::Operation(operation) => out.push(render_operation(operation, cx)?),
        Task::Display(setting) => out.push(setting.to_string()),
        Task::Compound(block) => {
            for task in &block.tasks {
                render_into(task, cx, out)?;
            }
        }
        Task::Conditional(conditional) => {
            for (index, branch) in conditional.branches.iter().enumerate() {
                out.push(match (&branch.condition, index) {
                    (Some(condition), 0) => format!("if {}", condition),
                    (Some(condition), _) => format!("else if {}", condition),
                    (None, _) => "else".to_string(),
                });
                for task in &branch.block.tasks {
                    render_into(task, cx, out)?;
                }
            }
            out.push("end if".to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoData;
    use crate::registry::OperationRegistry;
    use crate::types::{DataType, NamingRules};

    struct Setup {
        registry: OperationRegistry,
        naming: NamingRules,
    }

    impl Setup {
        fn new() -> Self {
            let registry = OperationRegistry::builtin();
            let naming = registry.naming_rules();
            Self { registry, naming }
        }

        fn protocol(&self, text: &str) -> Protocol<'_> {
            Protocol::with_text(
                ParsingContext::new(&self.registry, &NoData, &self.naming),
                text,
            )
        }
    }

    #[test]
    fn test_edit_api() {
        let setup = Setup::new();
        let mut protocol = setup.protocol("A = new Numeric Variable(1)\nB = copy A");
        assert_eq!(protocol.line_count(), 2);
        assert_eq!(protocol.line(1), Some("A = new Numeric Variable(1)"));
        assert_eq!(protocol.line(0), None);

        protocol.insert_line(3, "delete B").unwrap();
        assert_eq!(protocol.line(3), Some("delete B"));
        let old = protocol.replace_line(2, "C = copy A").unwrap();
        assert_eq!(old, "B = copy A");
        assert_eq!(protocol.remove_line(1).unwrap(), "A = new Numeric Variable(1)");
        assert_eq!(protocol.lines(), ["C = copy A", "delete B"]);

        assert!(protocol.insert_line(0, "x").is_err());
        assert!(protocol.insert_line(4, "x").is_err());
        assert!(protocol.remove_line(3).is_err());
    }

    #[test]
    fn test_whole_protocol_with_comments() {
        let setup = Setup::new();
        let mut protocol = setup.protocol(
            "# set up\nGenes = new Region Dataset\n\nBackup = copy Genes\n@show(Backup)",
        );
        let script = protocol.parse_whole_protocol().unwrap();
        assert_eq!(script.len(), 3);
        assert_eq!(script.operation_count(), 2);
        let Task::Operation(copy) = &script.tasks[1] else {
            panic!("expected an operation");
        };
        assert_eq!(copy.line, Some(4));
        assert_eq!(protocol.types().get("Backup"), Some(DataType::RegionDataset));
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let setup = Setup::new();
        let mut protocol = setup.protocol("Genes = new Region Dataset\nX = copy Missing");
        let err = protocol.parse_whole_protocol().unwrap_err();
        assert_eq!(err.line, Some(2));
        assert!(err.to_string().starts_with("line 2: "));
    }

    #[test]
    fn test_flow_condition_must_reference_known_data() {
        let setup = Setup::new();
        let mut protocol = setup.protocol("if Total > 2\nend if");
        assert_eq!(protocol.parse_whole_protocol().unwrap_err().line, Some(1));

        let mut protocol =
            setup.protocol("Total = new Numeric Variable(3)\nif Total > 2\n@show(Total)\nend if");
        let script = protocol.parse_whole_protocol().unwrap();
        assert!(matches!(script.tasks[1], Task::Conditional(_)));
    }

    #[test]
    fn test_list_macro_fans_out_into_compound() {
        let setup = Setup::new();
        let mut protocol = setup.protocol(
            "$macro(SUFFIX)=[1:3]\nGenes = new Region Dataset\nCopySUFFIX = copy Genes",
        );
        let script = protocol.parse_whole_protocol().unwrap();
        let Task::Compound(block) = &script.tasks[2] else {
            panic!("expected a compound task");
        };
        assert_eq!(block.len(), 3);
        for name in ["Copy1", "Copy2", "Copy3"] {
            assert_eq!(protocol.types().get(name), Some(DataType::RegionDataset));
        }
    }

    #[test]
    fn test_macro_defined_after_use_is_known() {
        let setup = Setup::new();
        let mut protocol =
            setup.protocol("Genes = new Region Dataset\nTWIN = copy Genes\n$macro(TWIN)=Other");
        protocol.parse_whole_protocol().unwrap();
        assert_eq!(protocol.types().get("Other"), Some(DataType::RegionDataset));
    }

    #[test]
    fn test_list_macro_can_not_produce_flow_control() {
        let setup = Setup::new();
        let mut protocol = setup.protocol("$macro(KW)=[if N > 1,end if]\nKW");
        let err = protocol.parse_whole_protocol().unwrap_err();
        assert_eq!(err.line, Some(2));
    }

    #[test]
    fn test_parse_range_replays_earlier_lines() {
        let setup = Setup::new();
        let mut protocol = setup.protocol(
            "Genes = new Region Dataset\nthis line is broken\nBackup = copy Genes",
        );
        let script = protocol.parse_range(3, 3).unwrap();
        assert_eq!(script.len(), 1);
        assert!(protocol.parse_range(2, 1).is_err());
        assert!(protocol.parse_range(1, 4).is_err());
    }

    #[test]
    fn test_single_command() {
        let setup = Setup::new();
        let mut protocol =
            setup.protocol("Genes = new Region Dataset\nif Genes equals Genes\nBackup = copy Genes\n");
        let task = protocol.parse_single_command(3, true).unwrap();
        assert!(matches!(task, Some(Task::Operation(_))));
        assert_eq!(protocol.parse_single_command(2, true).unwrap(), None);

        // without replay the types from the previous call are reused
        let mut fresh = setup.protocol("Genes = new Region Dataset\nBackup = copy Genes");
        assert!(fresh.parse_single_command(2, false).is_err());
        fresh.parse_single_command(1, false).unwrap();
        assert!(fresh.parse_single_command(2, false).is_ok());
    }

    #[test]
    fn test_failed_line_leaves_no_types_behind() {
        let setup = Setup::new();
        let mut protocol = setup
            .protocol("DNA = new DNA Sequence Dataset\n[Good,1bad] = discover motifs in DNA with MEME");
        let err = protocol.parse_whole_protocol().unwrap_err();
        assert_eq!(err.line, Some(2));
        assert_eq!(protocol.types().get("Good"), None);
        assert_eq!(protocol.types().get("DNA"), Some(DataType::DnaSequenceDataset));

        let types = protocol.type_state_at_line(2);
        assert_eq!(types.get("Good"), None);
        assert_eq!(types.len(), 1);
    }

    #[test]
    fn test_single_command_without_replay_sees_macros() {
        let setup = Setup::new();
        let mut protocol = setup.protocol("$macro(KIND)=Region Dataset\nGenes = new KIND");
        let task = protocol.parse_single_command(2, false).unwrap();
        assert!(matches!(task, Some(Task::Operation(_))));
        assert_eq!(protocol.types().get("Genes"), Some(DataType::RegionDataset));

        // an edited definition is picked up without a replay
        protocol.replace_line(1, "$macro(KIND)=Numeric Dataset").unwrap();
        protocol.parse_single_command(2, false).unwrap();
        assert_eq!(protocol.types().get("Genes"), Some(DataType::NumericDataset));
    }

    #[test]
    fn test_render_conditional() {
        let setup = Setup::new();
        let text = "N = new Numeric Variable(2)\nif N > 1\nN = increment N by 1\nelse if N < 0\nN = set N to 0\nelse\n@show(N)\nend if";
        let mut protocol = setup.protocol(text);
        let script = protocol.parse_whole_protocol().unwrap();
        let rendered = protocol.render(&Task::Compound(script)).unwrap();
        assert_eq!(rendered, text);
    }
}
