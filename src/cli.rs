use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::structural::RootPath;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show failures
    Quiet,
    #[default]
    Normal,
    /// Show every rejected document with its reasons
    Verbose,
    /// Also show schema sets and cache statistics
    Debug,
}

impl VerbosityLevel {
    /// `verbose` is the number of `-v` flags; two or more select `Debug`.
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => VerbosityLevel::Quiet,
            (false, 0) => VerbosityLevel::Normal,
            (false, 1) => VerbosityLevel::Verbose,
            (false, _) => VerbosityLevel::Debug,
        }
    }

    /// Default `tracing` filter directive for this level.
    pub fn log_directive(&self) -> &'static str {
        match self {
            VerbosityLevel::Quiet => "error",
            VerbosityLevel::Normal => "warn",
            VerbosityLevel::Verbose => "info",
            VerbosityLevel::Debug => "debug",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report
    Human,
    /// Aggregated results as JSON
    Json,
    /// Summary counts only
    Summary,
}

/// Schema-driven XML validation
#[derive(Parser, Debug, Clone)]
#[command(name = "xsdgate")]
#[command(about = "Validate XML documents against cached, compiled XML Schema sets")]
#[command(version)]
pub struct Cli {
    /// Directory or file to validate
    pub path: PathBuf,

    /// Schema document of the static schema set (repeatable, order kept)
    #[arg(short = 's', long = "schema", action = clap::ArgAction::Append)]
    pub schemas: Vec<PathBuf>,

    /// Schema document for a namespace, as NAMESPACE=LOCATION (repeatable)
    #[arg(
        long = "schema-location",
        value_name = "NAMESPACE=LOCATION",
        value_parser = parse_schema_location,
        action = clap::ArgAction::Append
    )]
    pub schema_locations: Vec<(String, String)>,

    /// Required root path such as 'Envelope/Body' (repeatable)
    #[arg(short = 'r', long = "root", action = clap::ArgAction::Append)]
    pub root_paths: Vec<RootPath>,

    /// Do not warn about namespaces the schema set does not declare
    #[arg(long = "ignore-unknown-namespaces")]
    pub ignore_unknown_namespaces: bool,

    /// Also report schema component constraint violations
    #[arg(long = "full-checking")]
    pub full_checking: bool,

    /// Distinct unknown namespaces reported before suppressing the rest
    #[arg(long = "max-namespace-warnings")]
    pub max_namespace_warnings: Option<usize>,

    /// Number of documents validated concurrently
    #[arg(short = 't', long = "threads")]
    pub threads: Option<usize>,

    /// Per-document timeout in seconds
    #[arg(long = "timeout")]
    pub timeout: Option<u64>,

    #[arg(short = 'f', long = "format", value_enum)]
    pub output_format: Option<OutputFormat>,

    /// Show every document; repeat for debug output
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only report failures
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,

    /// File extensions to process (e.g. 'xml,cmdi')
    #[arg(short = 'e', long = "extensions")]
    pub extensions: Option<String>,

    /// Include file patterns (glob syntax)
    #[arg(long = "include", action = clap::ArgAction::Append)]
    pub include_patterns: Vec<String>,

    /// Exclude file patterns (glob syntax)
    #[arg(long = "exclude", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Stop validating once a document fails
    #[arg(long = "fail-fast")]
    pub fail_fast: bool,

    #[arg(long = "progress")]
    pub progress: bool,

    /// Configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Maximum number of compiled schema sets kept in memory
    #[arg(long = "cache-entries")]
    pub cache_entries: Option<u64>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn get_extensions(&self) -> Option<Vec<String>> {
        self.extensions.as_ref().map(|extensions| split_list(extensions))
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.path.exists() {
            return Err(format!("Path does not exist: {}", self.path.display()));
        }
        if let Some(threads) = self.threads
            && threads == 0
        {
            return Err("Number of threads must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Progress is shown when asked for, or by default on an interactive
    /// terminal.
    pub fn wants_progress(&self) -> bool {
        self.progress || (atty::is(atty::Stream::Stderr) && !self.quiet)
    }
}

pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_schema_location(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((namespace, location)) if !namespace.trim().is_empty() && !location.trim().is_empty() => {
            Ok((namespace.trim().to_string(), location.trim().to_string()))
        }
        _ => Err(format!("expected NAMESPACE=LOCATION, got '{value}'")),
    }
}
