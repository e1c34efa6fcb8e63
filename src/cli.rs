use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::{self, ConfigManager, Mode, SystemEnvProvider};
use crate::logging::LogFormat;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only the failures
    Quiet,
    /// Summary plus failures
    #[default]
    Normal,
    /// Every file, with error causes
    Verbose,
}

/// Report format on stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

/// Staged XML validation: encoding, syntax, schema and rules
#[derive(Parser, Debug, Clone)]
#[command(name = "xml-verdict")]
#[command(about = "Check XML files through staged validation and report how far each got")]
#[command(version)]
pub struct Cli {
    /// Files or directories to check
    #[arg(required = true, help = "Files or directories to validate")]
    pub paths: Vec<PathBuf>,

    /// Use the [test] section of the config
    #[arg(short = 't', long = "test")]
    pub test: bool,

    /// Config file (TOML or JSON)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// File extensions to process (comma-separated)
    #[arg(
        short = 'e',
        long = "extensions",
        default_value = "xml",
        help = "File extensions to process (e.g., 'xml,cmdi')"
    )]
    pub extensions: String,

    /// Descend into subdirectories
    #[arg(short = 'r', long = "recursive")]
    pub recursive: bool,

    /// Include file patterns (glob syntax)
    #[arg(long = "include", action = clap::ArgAction::Append)]
    pub include_patterns: Vec<String>,

    /// Exclude file patterns (glob syntax)
    #[arg(long = "exclude", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Number of files checked concurrently
    #[arg(short = 'j', long = "threads")]
    pub threads: Option<usize>,

    /// Report format
    #[arg(short = 'f', long = "format", value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", help = "Enable verbose output")]
    pub verbose: bool,

    /// Enable quiet mode (failures only)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Quiet mode",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Diagnostic log format on stderr
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn get_extensions(&self) -> Vec<String> {
        self.extensions
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(missing) = self.paths.iter().find(|path| !path.exists()) {
            return Err(format!("Path does not exist: {}", missing.display()));
        }
        if let Some(threads) = self.threads
            && threads == 0
        {
            return Err("Number of threads must be greater than 0".to_string());
        }
        if self.get_extensions().is_empty() {
            return Err("At least one file extension is required".to_string());
        }
        Ok(())
    }

    pub fn get_thread_count(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get)
    }

    /// Only a directory's immediate children unless `--recursive`
    pub fn max_depth(&self) -> Option<usize> {
        if self.recursive { None } else { Some(0) }
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    /// `--test`, then `XML_VERDICT_MODE`, then live.
    pub fn mode(&self) -> config::Result<Mode> {
        ConfigManager::resolve_mode_with(&SystemEnvProvider, self.test)
    }
}
