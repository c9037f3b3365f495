//! Macro definitions
//!
//! Definition syntax:
//! - `text`         verbatim substitution
//! - `\text`        verbatim, escape stripped (also protects the result from re-expansion)
//! - `[a,b,3:5]`    list of values; `a:b` integer ranges count up or down
//! - `N`            the list `1..N`
//! - `a:b`          a bare range

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{ErrorKind, ParseError, ParseResult};

pub const ESCAPE: char = '\\';

/// Upper bound on the values a single list macro may hold
pub const MAX_LIST_VALUES: usize = 10_000;

static RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(-?\d+)\s*:\s*(-?\d+)\s*$").unwrap());
static COUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Macro {
    pub name: String,
    pub definition: String,
}

/// What a macro substitutes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroValue {
    Verbatim { text: String, escaped: bool },
    List(Vec<String>),
}

impl Macro {
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
        }
    }

    pub fn is_list(&self) -> bool {
        let def = self.definition.trim();
        if def.starts_with(ESCAPE) {
            return false;
        }
        (def.starts_with('[') && def.ends_with(']'))
            || RANGE_RE.is_match(def)
            || COUNT_RE.is_match(def)
    }

    pub fn value(&self) -> ParseResult<MacroValue> {
        let def = self.definition.trim();
        if let Some(stripped) = def.strip_prefix(ESCAPE) {
            return Ok(MacroValue::Verbatim {
                text: stripped.to_string(),
                escaped: true,
            });
        }
        if !self.is_list() {
            return Ok(MacroValue::Verbatim {
                text: def.to_string(),
                escaped: false,
            });
        }

        let values = if let Some(inner) = def.strip_prefix('[').and_then(|d| d.strip_suffix(']')) {
            let mut values = Vec::new();
            for item in inner.split(',') {
                match expand_range(item)? {
                    Some(range) => values.extend(range),
                    None => values.push(item.trim().to_string()),
                }
                if values.len() > MAX_LIST_VALUES {
                    return Err(too_many_values(&self.name));
                }
            }
            values
        } else if let Some(range) = expand_range(def)? {
            range
        } else {
            // COUNT_RE matched
            let count: u64 = def.parse().map_err(|_| {
                ParseError::semantic(format!("Invalid count '{}' in macro '{}'", def, self.name))
            })?;
            if count > MAX_LIST_VALUES as u64 {
                return Err(too_many_values(&self.name));
            }
            (1..=count).map(|i| i.to_string()).collect()
        };

        if values.is_empty() || values.iter().any(|v| v.is_empty()) {
            return Err(ParseError::semantic(format!(
                "List macro '{}' has an empty value",
                self.name
            )));
        }
        Ok(MacroValue::List(values))
    }
}

fn too_many_values(name: &str) -> ParseError {
    ParseError::new(
        ErrorKind::MacroOverflow,
        format!(
            "Macro nesting too deep: list macro '{}' has more than {} values",
            name, MAX_LIST_VALUES
        ),
    )
}

/// Expand `a:b` into the integers from a to b inclusive, in either direction
fn expand_range(text: &str) -> ParseResult<Option<Vec<String>>> {
    let Some(caps) = RANGE_RE.captures(text) else {
        return Ok(None);
    };
    let bound = |i: usize| -> ParseResult<i64> {
        caps[i]
            .parse()
            .map_err(|_| ParseError::semantic(format!("Invalid range bound in '{}'", text.trim())))
    };
    let (from, to) = (bound(1)?, bound(2)?);
    if from.abs_diff(to) >= MAX_LIST_VALUES as u64 {
        return Err(ParseError::new(
            ErrorKind::MacroOverflow,
            format!(
                "Macro nesting too deep: range '{}' has more than {} values",
                text.trim(),
                MAX_LIST_VALUES
            ),
        ));
    }
    let values = if from <= to {
        (from..=to).map(|i| i.to_string()).collect()
    } else {
        (to..=from).rev().map(|i| i.to_string()).collect()
    };
    Ok(Some(values))
}

/// Ordered macro definitions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MacroSet {
    macros: Vec<Macro>,
}

impl MacroSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define or redefine a macro
    ///
    /// A plain redefinition keeps the macro's position. A forced one moves it
    /// to the end, so it is substituted after every other macro.
    pub fn define(&mut self, name: &str, definition: &str, force: bool) {
        let position = self.macros.iter().position(|m| m.name == name);
        match (position, force) {
            (Some(index), false) => self.macros[index].definition = definition.to_string(),
            (Some(index), true) => {
                self.macros.remove(index);
                self.macros.push(Macro::new(name, definition));
            }
            (None, _) => self.macros.push(Macro::new(name, definition)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.macros.iter().find(|m| m.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Macro> {
        self.macros.iter()
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    pub fn clear(&mut self) {
        self.macros.clear();
    }
}
