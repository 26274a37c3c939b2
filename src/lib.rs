//! # xsdgate Library
//!
//! A schema-driven XML validation engine. XML Schema sets are compiled once
//! into immutable grammar bundles, cached by schema set identity and shared
//! by any number of concurrent streaming validation sessions.

pub mod cache;
pub mod chars;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod content_model;
pub mod datatypes;
pub mod diagnostics;
pub mod error;
pub mod error_reporter;
pub mod file_discovery;
pub mod grammar;
pub mod output;
pub mod pattern;
pub mod provider;
pub mod session;
pub mod structural;
pub mod symbols;
pub mod validator;

pub use cache::{GrammarCache, GrammarCacheStats};
pub use cli::{Cli, OutputFormat, VerbosityLevel};
pub use compiler::{GrammarCompiler, XsdGrammarCompiler};
pub use config::{Config, ConfigError, ConfigManager};
pub use diagnostics::{DiagnosticsCollector, Location, Reason, Severity, ValidationReport};
pub use error::{SchemaError, SchemaResult, ValidationError};
pub use error_reporter::ErrorReporter;
pub use file_discovery::{DiscoveryStats, FileDiscovery};
pub use grammar::{GrammarBundle, SchemaSetIdentity};
pub use output::Output;
pub use provider::{
    ContextSchemaProvider, SchemaLocationProvider, SchemaProvider, SchemaSource,
    StaticSchemaProvider,
};
pub use session::{ValidationOptions, ValidationSession};
pub use structural::{RootPath, RootPathError, StructuralContentHandler};
pub use validator::{
    DOCUMENT_PATH_PROPERTY, FileValidationResult, OutcomeKind, PerformanceMetrics,
    ProgressCallback, ValidationConfig, ValidationContext, ValidationEngine, ValidationOutcome,
    ValidationPhase, ValidationProgress, ValidationResults, ValidationStatus, XmlValidator,
};
