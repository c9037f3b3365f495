//! Flow-control block builder
//!
//! Keeps a stack of open `if` blocks. Tasks go to the innermost open
//! branch, or to the top-level script when no block is open.

use super::statement::FlowKind;
use crate::condition::Condition;
use crate::error::{ParseError, ParseResult};
use crate::task::{CompoundTask, ConditionalTask, Task};

pub(crate) fn without_if(kind: FlowKind, line: usize) -> ParseError {
    ParseError::syntax(format!("'{}' without a matching 'if'", kind.keyword())).at_line(line)
}

pub(crate) fn after_else(kind: FlowKind, if_line: usize, line: usize) -> ParseError {
    ParseError::syntax(format!(
        "'{}' after 'else' in the 'if' block opened on line {}",
        kind.keyword(),
        if_line
    ))
    .at_line(line)
}

pub(crate) fn never_closed(if_line: usize) -> ParseError {
    ParseError::syntax(format!(
        "The 'if' on line {} is never closed with 'end if'",
        if_line
    ))
    .at_line(if_line)
}

#[derive(Debug)]
struct OpenBlock {
    task: ConditionalTask,
    line: usize,
}

#[derive(Debug, Default)]
pub struct FlowBuilder {
    script: CompoundTask,
    open: Vec<OpenBlock>,
}

impl FlowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `if` blocks currently open
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn push(&mut self, task: Task) {
        match self.open.last_mut().and_then(|b| b.task.current_block()) {
            Some(block) => block.push(task),
            None => self.script.push(task),
        }
    }

    /// Apply one flow-control statement
    ///
    /// `condition` is required for `if` and `else if` and ignored otherwise.
    pub fn apply(
        &mut self,
        kind: FlowKind,
        condition: Option<Condition>,
        line: usize,
    ) -> ParseResult<()> {
        match kind {
            FlowKind::If => {
                let condition = condition.ok_or_else(|| missing_condition(kind, line))?;
                let mut task = ConditionalTask::default();
                task.add_branch(Some(condition), line)?;
                self.open.push(OpenBlock { task, line });
                Ok(())
            }
            FlowKind::ElseIf | FlowKind::Else => {
                let block = self.open.last_mut().ok_or_else(|| without_if(kind, line))?;
                if block.task.has_else() {
                    return Err(after_else(kind, block.line, line));
                }
                let condition = match kind {
                    FlowKind::ElseIf => Some(condition.ok_or_else(|| missing_condition(kind, line))?),
                    _ => None,
                };
                block.task.add_branch(condition, line)
            }
            FlowKind::EndIf => {
                let block = self.open.pop().ok_or_else(|| without_if(kind, line))?;
                log::trace!(
                    "Closed 'if' from line {} with {} branches on line {}",
                    block.line,
                    block.task.branches.len(),
                    line
                );
                self.push(Task::Conditional(block.task));
                Ok(())
            }
        }
    }

    /// The finished script; fails if an `if` is still open
    pub fn finish(self) -> ParseResult<CompoundTask> {
        match self.open.last() {
            Some(block) => Err(never_closed(block.line)),
            None => Ok(self.script),
        }
    }
}

fn missing_condition(kind: FlowKind, line: usize) -> ParseError {
    ParseError::syntax(format!("Missing condition after '{}'", kind.keyword())).at_line(line)
}
