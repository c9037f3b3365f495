//! Task tree
//!
//! The result of parsing a protocol. Every task has exactly one owner:
//! conditionals own their branches, branches own their blocks.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::condition::{Condition, Operand, WithinCondition};
use crate::error::{ParseError, ParseResult};
use crate::params::ParameterSettings;
use crate::types::DataType;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Task {
    Operation(OperationTask),
    Compound(CompoundTask),
    Conditional(ConditionalTask),
    Display(DisplaySetting),
}

impl Task {
    /// Number of operation tasks in this subtree
    pub fn operation_count(&self) -> usize {
        match self {
            Task::Operation(_) => 1,
            Task::Compound(block) => block.operation_count(),
            Task::Conditional(cond) => cond
                .branches
                .iter()
                .map(|b| b.block.operation_count())
                .sum(),
            Task::Display(_) => 0,
        }
    }
}

/// Type-tagged value in an operation's parameter map
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Text(String),
    Operand(Operand),
    DataType(DataType),
    Names(Vec<String>),
    Settings(ParameterSettings),
}

/// One parsed operation line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationTask {
    pub operation: String,
    pub source: Option<String>,
    pub targets: Vec<String>,
    pub parameters: BTreeMap<String, Value>,
    pub condition: Option<Condition>,
    pub within: Option<WithinCondition>,
    pub collection: Option<String>,
    pub line: Option<usize>,
}

impl OperationTask {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            source: None,
            targets: Vec::new(),
            parameters: BTreeMap::new(),
            condition: None,
            within: None,
            collection: None,
            line: None,
        }
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.parameters.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(Value::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn operand(&self, key: &str) -> Option<&Operand> {
        match self.get(key) {
            Some(Value::Operand(operand)) => Some(operand),
            _ => None,
        }
    }

    pub fn data_type(&self, key: &str) -> Option<DataType> {
        match self.get(key) {
            Some(Value::DataType(ty)) => Some(*ty),
            _ => None,
        }
    }

    pub fn names(&self, key: &str) -> Option<&[String]> {
        match self.get(key) {
            Some(Value::Names(names)) => Some(names),
            _ => None,
        }
    }

    pub fn settings(&self, key: &str) -> Option<&ParameterSettings> {
        match self.get(key) {
            Some(Value::Settings(settings)) => Some(settings),
            _ => None,
        }
    }

    /// The first target, or the source for in-place operations
    pub fn target(&self) -> Option<&str> {
        self.targets.first().map(String::as_str).or(self.source.as_deref())
    }

    /// Equal apart from the line number
    pub fn same_as(&self, other: &OperationTask) -> bool {
        OperationTask {
            line: other.line,
            ..self.clone()
        } == *other
    }
}

/// An ordered block of tasks
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompoundTask {
    pub tasks: Vec<Task>,
}

impl CompoundTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: Task) {
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn operation_count(&self) -> usize {
        self.tasks.iter().map(Task::operation_count).sum()
    }
}

/// One `if`/`else if`/`else` arm
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Branch {
    /// `None` for the final `else`
    pub condition: Option<Condition>,
    pub block: CompoundTask,
    pub line: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConditionalTask {
    pub branches: Vec<Branch>,
}

impl ConditionalTask {
    /// Append a branch
    ///
    /// A branch without condition must be the last one; nothing may follow it.
    pub fn add_branch(&mut self, condition: Option<Condition>, line: usize) -> ParseResult<()> {
        if let Some(last) = self.branches.last() {
            if last.condition.is_none() {
                return Err(ParseError::syntax(format!(
                    "Unexpected branch after 'else' on line {}",
                    last.line
                ))
                .at_line(line));
            }
        }
        self.branches.push(Branch {
            condition,
            block: CompoundTask::new(),
            line,
        });
        Ok(())
    }

    pub fn has_else(&self) -> bool {
        self.branches.last().is_some_and(|b| b.condition.is_none())
    }

    /// Block receiving tasks, i.e. the last opened branch
    pub fn current_block(&mut self) -> Option<&mut CompoundTask> {
        self.branches.last_mut().map(|b| &mut b.block)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DisplayPrefix {
    /// `@`
    Session,
    /// `$`
    Set,
    /// `!`
    Force,
}

impl DisplayPrefix {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '@' => Some(DisplayPrefix::Session),
            '$' => Some(DisplayPrefix::Set),
            '!' => Some(DisplayPrefix::Force),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            DisplayPrefix::Session => '@',
            DisplayPrefix::Set => '$',
            DisplayPrefix::Force => '!',
        }
    }
}

/// `$setting(target) = value` style directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplaySetting {
    pub prefix: DisplayPrefix,
    pub setting: String,
    pub target: String,
    pub value: Option<String>,
    pub force: bool,
}

impl DisplaySetting {
    pub fn new(prefix: DisplayPrefix, setting: &str, target: &str, value: Option<&str>) -> Self {
        Self {
            prefix,
            setting: setting.to_string(),
            target: target.to_string(),
            value: value.map(str::to_string),
            force: prefix == DisplayPrefix::Force,
        }
    }

    pub fn is_macro(&self) -> bool {
        self.setting.eq_ignore_ascii_case("macro")
    }
}

impl fmt::Display for DisplaySetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}({})", self.prefix.as_char(), self.setting, self.target)?;
        if let Some(value) = &self.value {
            write!(f, "={}", value)?;
        }
        Ok(())
    }
}
