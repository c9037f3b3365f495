//! Object naming rules
//!
//! Sequences follow a looser rule than other data objects since their
//! names usually come from external annotation (e.g. `ENSG00000139618.2`).

use std::collections::HashSet;

use super::DataType;

/// Words that can never name a data object
const CLAUSE_KEYWORDS: &[&str] = &[
    "where",
    "in",
    "with",
    "to",
    "by",
    "and",
    "or",
    "not",
    "if",
    "else",
    "end",
    "within",
    "collection",
    "region",
    "inside",
    "true",
    "false",
];

/// Validators for data object names
#[derive(Debug, Clone)]
pub struct NamingRules {
    reserved: HashSet<String>,
}

impl Default for NamingRules {
    fn default() -> Self {
        Self::new()
    }
}

impl NamingRules {
    pub fn new() -> Self {
        Self {
            reserved: CLAUSE_KEYWORDS.iter().map(|w| w.to_string()).collect(),
        }
    }

    /// Rules that additionally reserve the given words (usually operation names)
    pub fn with_reserved<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rules = Self::new();
        for word in words {
            rules.reserve(word.as_ref());
        }
        rules
    }

    pub fn reserve(&mut self, word: &str) {
        self.reserved.insert(word.to_lowercase());
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved.contains(&name.to_lowercase())
    }

    /// Check a name for an object of the given type
    pub fn check(&self, name: &str, data_type: Option<DataType>) -> Result<(), String> {
        match data_type {
            Some(DataType::Sequence) => self.check_sequence_name(name),
            _ => self.check_data_name(name),
        }
    }

    pub fn check_data_name(&self, name: &str) -> Result<(), String> {
        let mut chars = name.chars();
        match chars.next() {
            None => return Err("Name can not be empty".to_string()),
            Some(c) if !c.is_ascii_alphabetic() => {
                return Err(format!("Name '{}' must start with a letter", name));
            }
            Some(_) => {}
        }
        if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
            return Err(format!(
                "Name '{}' contains illegal character '{}'. Only letters, digits and underscores are allowed",
                name, bad
            ));
        }
        self.check_not_reserved(name)
    }

    pub fn check_sequence_name(&self, name: &str) -> Result<(), String> {
        if name.is_empty() {
            return Err("Sequence name can not be empty".to_string());
        }
        if let Some(bad) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(format!(
                "Sequence name '{}' contains illegal character '{}'",
                name, bad
            ));
        }
        self.check_not_reserved(name)
    }

    fn check_not_reserved(&self, name: &str) -> Result<(), String> {
        if self.is_reserved(name) {
            Err(format!("'{}' is a reserved word and can not be used as a name", name))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_names() {
        let rules = NamingRules::new();
        assert!(rules.check_data_name("TFBS_2").is_ok());
        assert!(rules.check_data_name("2TFBS").is_err());
        assert!(rules.check_data_name("TF-BS").is_err());
        assert!(rules.check_data_name("").is_err());
    }

    #[test]
    fn test_sequence_names_allow_dots_and_dashes() {
        let rules = NamingRules::new();
        assert!(rules.check_sequence_name("ENSG0001-2.1").is_ok());
        assert!(rules.check_sequence_name("chr 1").is_err());
    }

    #[test]
    fn test_reserved_words_case_insensitive() {
        let rules = NamingRules::with_reserved(["extend"]);
        assert!(rules.check_data_name("Extend").is_err());
        assert!(rules.check_data_name("WHERE").is_err());
        assert!(rules.check(&"Seq1".to_string(), Some(DataType::Sequence)).is_ok());
    }
}
