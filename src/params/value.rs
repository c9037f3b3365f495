//! Resolved parameter values

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// A coerced parameter value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
    /// Name of a data object
    Data(String),
}

impl ParameterValue {
    pub fn as_data(&self) -> Option<&str> {
        match self {
            ParameterValue::Data(name) => Some(name),
            _ => None,
        }
    }

    /// Same value as written in protocol text, for default comparisons
    pub fn matches_text(&self, text: &str) -> bool {
        match self {
            ParameterValue::Bool(b) => text.eq_ignore_ascii_case(if *b { "true" } else { "false" }),
            ParameterValue::Int(i) => text.trim().parse::<i64>() == Ok(*i),
            ParameterValue::Double(d) => text.trim().parse::<f64>() == Ok(*d),
            ParameterValue::Text(t) => t == text,
            ParameterValue::Data(name) => name == text,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Bool(b) => write!(f, "{}", b),
            ParameterValue::Int(i) => write!(f, "{}", i),
            ParameterValue::Double(d) => write!(f, "{}", d),
            ParameterValue::Text(t) => write!(f, "\"{}\"", t),
            ParameterValue::Data(name) => f.write_str(name),
        }
    }
}

/// Parameter name to value, keyed by the schema's spelling of the name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParameterSettings {
    values: BTreeMap<String, ParameterValue>,
}

impl ParameterSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: ParameterValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name).or_else(|| {
            self.values
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value)
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Names of data objects referenced by any parameter
    pub fn data_references(&self) -> Vec<&str> {
        self.values.values().filter_map(ParameterValue::as_data).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_text_only() {
        assert_eq!(ParameterValue::Text("a,b".into()).to_string(), "\"a,b\"");
        assert_eq!(ParameterValue::Data("Motifs".into()).to_string(), "Motifs");
        assert_eq!(ParameterValue::Double(0.5).to_string(), "0.5");
        assert_eq!(ParameterValue::Bool(true).to_string(), "true");
    }

    #[test]
    fn test_get_is_case_insensitive() {
        let mut settings = ParameterSettings::new();
        settings.set("Threshold", ParameterValue::Double(0.9));
        assert_eq!(settings.get("threshold"), Some(&ParameterValue::Double(0.9)));
        assert!(!settings.contains("Pseudo"));
    }

    #[test]
    fn test_matches_default_text() {
        assert!(ParameterValue::Double(0.95).matches_text("0.95"));
        assert!(ParameterValue::Int(8).matches_text("8"));
        assert!(ParameterValue::Bool(false).matches_text("False"));
        assert!(!ParameterValue::Text("zoops".into()).matches_text("oops"));
    }
}
