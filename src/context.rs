//! Parsing context
//!
//! Read-only bundle of the collaborators every parse call consults: the
//! operation registry, a lookup for data objects the engine already holds,
//! and the naming rules.

use std::collections::HashMap;

use crate::registry::OperationRegistry;
use crate::types::{DataType, NamingRules, TypeTable};

/// Resolves names of data objects that exist outside the protocol text
pub trait DataLookup {
    fn data_type(&self, name: &str) -> Option<DataType>;
}

/// Lookup that knows nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoData;

impl DataLookup for NoData {
    fn data_type(&self, _name: &str) -> Option<DataType> {
        None
    }
}

impl DataLookup for HashMap<String, DataType> {
    fn data_type(&self, name: &str) -> Option<DataType> {
        self.get(name).copied()
    }
}

impl DataLookup for TypeTable {
    fn data_type(&self, name: &str) -> Option<DataType> {
        self.get(name)
    }
}

#[derive(Clone, Copy)]
pub struct ParsingContext<'a> {
    pub registry: &'a OperationRegistry,
    pub lookup: &'a dyn DataLookup,
    pub naming: &'a NamingRules,
}

impl<'a> ParsingContext<'a> {
    pub fn new(
        registry: &'a OperationRegistry,
        lookup: &'a dyn DataLookup,
        naming: &'a NamingRules,
    ) -> Self {
        Self {
            registry,
            lookup,
            naming,
        }
    }
}

impl std::fmt::Debug for ParsingContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsingContext")
            .field("registry", &self.registry.sources())
            .finish_non_exhaustive()
    }
}
