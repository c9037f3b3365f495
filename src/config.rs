//! Configuration management for the protocol checker.
//!
//! Handles:
//! - Command-line argument parsing
//! - Registry directory configuration

use anyhow::{Result, bail};
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for `protocheck`
#[derive(Debug, Parser)]
#[command(name = "protocheck")]
#[command(about = "Parse and validate pipeline protocol scripts")]
#[command(version)]
pub struct Args {
    /// Protocol file to check
    pub file: PathBuf,

    /// Additional directory searched for operation registry files
    #[arg(long, help = "Directory containing registry TOML files")]
    pub registry_dir: Option<PathBuf>,

    /// Parse only this line (1-based) and print its canonical form
    #[arg(long)]
    pub line: Option<usize>,

    /// Print the type table as it stands after this line (1-based)
    #[arg(long)]
    pub types_at: Option<usize>,

    /// Emit diagnostics as JSON
    #[arg(long)]
    pub json: bool,

    /// Log level
    #[arg(
        long,
        default_value = "warn",
        help = "Log level (trace, debug, info, warn, error)"
    )]
    pub log_level: String,
}

/// Combined configuration from all sources
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Protocol file to check
    pub file: PathBuf,
    /// Registry directories, lowest priority first
    pub registry_dirs: Vec<PathBuf>,
    pub line: Option<usize>,
    pub types_at: Option<usize>,
    pub json: bool,
    pub log_level: String,
}

impl Config {
    /// Create configuration from command-line arguments
    pub fn from_args_and_env() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Create configuration from explicit arguments (useful for testing)
    pub fn from_args(args: Args) -> Result<Self> {
        if args.line == Some(0) || args.types_at == Some(0) {
            bail!("Line numbers start at 1");
        }

        let mut registry_dirs = Vec::new();

        // User-global directory first so an explicit directory wins
        if let Some(config_dir) = dirs::config_dir() {
            registry_dirs.push(config_dir.join("protoscript").join("operations"));
        }

        if let Some(custom_dir) = args.registry_dir {
            registry_dirs.push(custom_dir);
        }

        Ok(Config {
            file: args.file,
            registry_dirs,
            line: args.line,
            types_at: args.types_at,
            json: args.json,
            log_level: args.log_level,
        })
    }

    /// Configuration that only uses the given registry directories
    pub fn with_registry_dirs(registry_dirs: Vec<PathBuf>) -> Self {
        Config {
            registry_dirs,
            log_level: "warn".to_string(),
            ..Default::default()
        }
    }
}
