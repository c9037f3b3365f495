//! Operation Registry
//!
//! In-memory registry of operations and algorithms. Built-in definitions are
//! embedded in the binary; user registry files override them by name.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

use super::schema::{AlgorithmDef, AlgorithmKind, OperationDef, RegistryFile, RegistrySource};
use crate::config::Config;
use crate::types::NamingRules;

/// Merged operation and algorithm definitions from all registry sources
#[derive(Debug, Clone)]
pub struct OperationRegistry {
    operations: HashMap<String, OperationDef>,
    algorithms: HashMap<String, AlgorithmDef>,
    sources: Vec<String>,
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            operations: HashMap::new(),
            algorithms: HashMap::new(),
            sources: Vec::new(),
        }
    }

    /// Registry holding only the embedded built-in definitions
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.add_embedded_builtin();
        registry
    }

    /// Built-in definitions overridden by every registry file in the configured directories
    pub fn load(config: &Config) -> Result<Self> {
        let mut registry = Self::builtin();
        for dir in &config.registry_dirs {
            registry.load_directory(dir)?;
        }
        log::debug!(
            "Loaded {} operations and {} algorithms from {} sources",
            registry.operations.len(),
            registry.algorithms.len(),
            registry.sources.len()
        );
        Ok(registry)
    }

    /// Merge a registry source, replacing definitions with the same name
    pub fn add_source(&mut self, source: RegistrySource) {
        self.operations.extend(source.operations);
        self.algorithms.extend(source.algorithms);
        self.sources.push(source.name);
    }

    /// Parse registry TOML and merge it
    pub fn add_toml(&mut self, content: &str) -> Result<()> {
        let file: RegistryFile =
            toml::from_str(content).context("Failed to parse registry TOML")?;
        self.add_source(RegistrySource::from(file));
        Ok(())
    }

    /// Load every `*.toml` file in a directory, in file name order
    ///
    /// Missing directories are ignored. Files that fail to parse are skipped
    /// with a warning so one broken file does not hide the others.
    pub fn load_directory(&mut self, dir: &Path) -> Result<()> {
        if !dir.exists() {
            return Ok(());
        }

        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read registry directory: {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("toml"))
            .collect();
        paths.sort();

        for path in paths {
            if let Err(e) = self.load_file(&path) {
                log::warn!("Failed to load registry file {}: {:#}", path.display(), e);
            }
        }

        Ok(())
    }

    fn load_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read registry file: {}", path.display()))?;
        self.add_toml(&content)
            .with_context(|| format!("Invalid registry file: {}", path.display()))
    }

    fn add_embedded_builtin(&mut self) {
        let embedded_toml = include_str!("../../resources/operations/builtin.toml");

        if let Err(e) = self.add_toml(embedded_toml) {
            log::warn!(
                "Failed to parse embedded operation registry: {:#}. Using minimal fallback.",
                e
            );
            self.add_minimal_builtin();
        }
    }

    /// Data object operations only, used if the embedded registry is unreadable
    fn add_minimal_builtin(&mut self) {
        for name in ["new", "copy", "rename", "delete"] {
            self.operations.insert(
                name.to_string(),
                OperationDef {
                    name: name.to_string(),
                    description: None,
                    source_types: Vec::new(),
                    output_type: None,
                    supports_where: false,
                    supports_within: false,
                    supports_collection: false,
                    algorithm_kind: None,
                },
            );
        }
        self.sources.push("minimal-fallback".to_string());
    }

    pub fn operation(&self, name: &str) -> Option<&OperationDef> {
        self.operations.get(name)
    }

    pub fn algorithm(&self, name: &str) -> Option<&AlgorithmDef> {
        self.algorithms.get(name)
    }

    /// Algorithm lookup restricted to one family
    pub fn algorithm_of_kind(&self, name: &str, kind: AlgorithmKind) -> Option<&AlgorithmDef> {
        self.algorithm(name).filter(|alg| alg.kind == kind)
    }

    /// Sorted algorithm names of one family
    pub fn algorithm_names(&self, kind: AlgorithmKind) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .algorithms
            .values()
            .filter(|alg| alg.kind == kind)
            .map(|alg| alg.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Sorted operation names
    pub fn operation_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Naming rules that reserve every operation keyword
    pub fn naming_rules(&self) -> NamingRules {
        NamingRules::with_reserved(self.operations.keys())
    }
}
