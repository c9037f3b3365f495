//! Registry Schema Types
//!
//! Operation, algorithm and parameter definitions as they appear in
//! registry TOML files.

use serde::Deserialize;
use std::collections::HashMap;

use crate::types::DataType;

/// Root registry file structure (matches TOML)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RegistryFile {
    pub registry: RegistryMeta,
    #[serde(default)]
    pub operations: Vec<OperationDef>,
    #[serde(default)]
    pub algorithms: Vec<AlgorithmDef>,
}

/// Registry file metadata
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RegistryMeta {
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
}

/// Runtime view of one registry file (optimized for lookups)
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrySource {
    pub name: String,
    pub version: Option<String>,
    pub operations: HashMap<String, OperationDef>,
    pub algorithms: HashMap<String, AlgorithmDef>,
}

/// A pipeline operation keyword and what it consumes/produces
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OperationDef {
    pub name: String,
    pub description: Option<String>,
    /// Types accepted as the main operand
    #[serde(default)]
    pub source_types: Vec<DataType>,
    /// Result type; `None` means the result has the type of the source
    pub output_type: Option<DataType>,
    #[serde(default)]
    pub supports_where: bool,
    #[serde(default)]
    pub supports_within: bool,
    #[serde(default)]
    pub supports_collection: bool,
    /// Algorithm family looked up for `with <algorithm>` clauses
    pub algorithm_kind: Option<AlgorithmKind>,
}

/// Families of pluggable algorithms
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    MotifScanning,
    MotifDiscovery,
    Analysis,
    DataFormat,
    Transform,
}

/// An algorithm (scanner, discovery tool, analysis, output format, transform)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AlgorithmDef {
    pub name: String,
    pub kind: AlgorithmKind,
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,
    /// Result types in target order, for multi-result operations
    #[serde(default)]
    pub results: Vec<DataType>,
    /// Transforms only: whether `by <argument>` is required
    #[serde(default)]
    pub takes_argument: bool,
}

/// Parameter definition inside an algorithm schema
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ParameterDef {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(default)]
    pub required: bool,
    pub description: Option<String>,
    /// Default value in protocol syntax
    pub default: Option<String>,
    pub allowed_values: Option<Vec<String>>,
    /// Data types a reference may resolve to
    pub data_types: Option<Vec<DataType>>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub advanced: bool,
    #[serde(default)]
    pub secret: bool,
    #[serde(default)]
    pub direction: Direction,
}

/// Parameter data types
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    Bool,
    Int,
    Double,
    String,
    Data,
}

/// Whether a parameter configures input handling, output handling or both
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Both,
    Input,
    Output,
}

impl From<RegistryFile> for RegistrySource {
    fn from(file: RegistryFile) -> Self {
        let operations = file
            .operations
            .into_iter()
            .map(|op| (op.name.clone(), op))
            .collect();
        let algorithms = file
            .algorithms
            .into_iter()
            .map(|alg| (alg.name.clone(), alg))
            .collect();

        Self {
            name: file.registry.name,
            version: file.registry.version,
            operations,
            algorithms,
        }
    }
}

impl OperationDef {
    /// Check whether a source of the given type is acceptable
    pub fn accepts(&self, data_type: DataType) -> bool {
        self.source_types.is_empty() || self.source_types.contains(&data_type)
    }

    /// Result type for a given source type
    pub fn result_type(&self, source: DataType) -> DataType {
        self.output_type.unwrap_or(source)
    }
}

impl AlgorithmDef {
    /// Find parameter by name (case-insensitive)
    pub fn find_parameter(&self, name: &str) -> Option<&ParameterDef> {
        self.parameters
            .iter()
            .find(|param| param.name.eq_ignore_ascii_case(name))
    }

    /// Get required parameters
    pub fn required_parameters(&self) -> Vec<&ParameterDef> {
        self.parameters.iter().filter(|p| p.required).collect()
    }
}

impl ParameterDef {
    /// Whether a data reference of the given type may stand in for this parameter
    pub fn accepts_reference(&self, data_type: DataType) -> bool {
        match &self.data_types {
            Some(types) => types.contains(&data_type),
            None => match self.param_type {
                ParameterType::Int | ParameterType::Double => data_type == DataType::NumericVariable,
                ParameterType::String => data_type == DataType::TextVariable,
                ParameterType::Data | ParameterType::Bool => false,
            },
        }
    }

    /// Whether a value appears in the allowed set (case-insensitive)
    pub fn allows(&self, value: &str) -> bool {
        self.allowed_values
            .as_ref()
            .map(|values| values.iter().any(|v| v.eq_ignore_ascii_case(value)))
            .unwrap_or(true)
    }
}
