//! Type Table
//!
//! Running symbol table from data object name to declared type, rebuilt
//! by replaying protocol lines in order.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{DataType, NamingRules};
use crate::error::{ParseError, ParseResult};

/// Name of the collection that implicitly holds every loaded sequence
pub const DEFAULT_SEQUENCE_COLLECTION: &str = "AllSequences";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeTable {
    entries: BTreeMap<String, DataType>,
    sequences_loaded: bool,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` with `data_type`, or remove it when `data_type` is `None`
    ///
    /// Later registrations overwrite earlier ones.
    pub fn register(
        &mut self,
        name: &str,
        data_type: Option<DataType>,
        rules: &NamingRules,
    ) -> ParseResult<()> {
        let Some(data_type) = data_type else {
            self.entries.remove(name);
            return Ok(());
        };
        rules.check(name, Some(data_type)).map_err(|reason| {
            ParseError::semantic(format!("Invalid name '{}': {}", name, reason))
        })?;
        if name == DEFAULT_SEQUENCE_COLLECTION {
            self.sequences_loaded = true;
        }
        self.entries.insert(name.to_string(), data_type);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<DataType> {
        self.entries.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn of_type(&self, data_type: DataType) -> Vec<String> {
        self.of_types(&[data_type])
    }

    pub fn of_types(&self, types: &[DataType]) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, ty)| types.contains(ty))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Whether the default sequence collection has ever been registered
    pub fn sequences_loaded(&self) -> bool {
        self.sequences_loaded
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.sequences_loaded = false;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, DataType)> {
        self.entries.iter().map(|(name, ty)| (name.as_str(), *ty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_overwrite() {
        let rules = NamingRules::new();
        let mut table = TypeTable::new();
        table
            .register("X", Some(DataType::RegionDataset), &rules)
            .unwrap();
        table
            .register("X", Some(DataType::NumericDataset), &rules)
            .unwrap();
        assert_eq!(table.get("X"), Some(DataType::NumericDataset));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_none_removes_entry() {
        let rules = NamingRules::new();
        let mut table = TypeTable::new();
        table
            .register("X", Some(DataType::NumericVariable), &rules)
            .unwrap();
        table.register("X", None, &rules).unwrap();
        assert_eq!(table.get("X"), None);
    }

    #[test]
    fn test_invalid_name_rejected() {
        let rules = NamingRules::new();
        let mut table = TypeTable::new();
        let err = table
            .register("1abc", Some(DataType::TextVariable), &rules)
            .unwrap_err();
        assert!(err.message.contains("1abc"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_sequences_loaded_flag_survives_until_clear() {
        let rules = NamingRules::new();
        let mut table = TypeTable::new();
        assert!(!table.sequences_loaded());
        table
            .register(
                DEFAULT_SEQUENCE_COLLECTION,
                Some(DataType::SequenceCollection),
                &rules,
            )
            .unwrap();
        table
            .register(DEFAULT_SEQUENCE_COLLECTION, None, &rules)
            .unwrap();
        assert!(table.sequences_loaded());
        table.clear();
        assert!(!table.sequences_loaded());
    }

    #[test]
    fn test_of_types_scan() {
        let rules = NamingRules::new();
        let mut table = TypeTable::new();
        table.register("A", Some(DataType::RegionDataset), &rules).unwrap();
        table.register("B", Some(DataType::NumericDataset), &rules).unwrap();
        table.register("C", Some(DataType::RegionDataset), &rules).unwrap();
        assert_eq!(table.of_type(DataType::RegionDataset), vec!["A", "C"]);
        assert_eq!(
            table.of_types(&[DataType::RegionDataset, DataType::NumericDataset]).len(),
            3
        );
    }
}
