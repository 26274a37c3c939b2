use std::path::Path;

use crate::cli::VerbosityLevel;
use crate::config::ConfigError;
use crate::error::{SchemaError, ValidationError};

/// Writes engine and configuration errors to stderr with configurable
/// verbosity.
pub struct ErrorReporter {
    verbosity: VerbosityLevel,
    show_timestamps: bool,
}

impl ErrorReporter {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_timestamps: false,
        }
    }

    pub fn with_timestamps(mut self, show_timestamps: bool) -> Self {
        self.show_timestamps = show_timestamps;
        self
    }

    pub fn report_validation_error(&self, error: &ValidationError) {
        if let Some(formatted) = self.format_validation_error(error) {
            eprintln!("{formatted}");
        }
    }

    pub fn report_config_error(&self, error: &ConfigError) {
        eprintln!("{}", self.format_config_error(error));
    }

    /// `None` when the verbosity level hides the error.
    pub fn format_validation_error(&self, error: &ValidationError) -> Option<String> {
        match self.verbosity {
            VerbosityLevel::Quiet => self
                .is_critical_error(error)
                .then(|| self.format_error_brief(error)),
            VerbosityLevel::Normal => Some(self.format_error_normal(error)),
            VerbosityLevel::Verbose => Some(self.format_error_verbose(error)),
            VerbosityLevel::Debug => Some(self.format_error_debug(error)),
        }
    }

    pub fn format_config_error(&self, error: &ConfigError) -> String {
        match self.verbosity {
            VerbosityLevel::Quiet => format!("Config error: {error}"),
            VerbosityLevel::Normal | VerbosityLevel::Verbose => {
                format!("Configuration Error: {error}\n{}", config_help(error))
            }
            VerbosityLevel::Debug => format!(
                "Configuration Error: {error}\nDebug: {error:?}\n{}",
                config_help(error)
            ),
        }
    }

    /// Single-line progress that rewrites itself in place.
    pub fn report_progress(&self, current: usize, total: usize, current_file: Option<&Path>) {
        if self.verbosity == VerbosityLevel::Quiet || total == 0 {
            return;
        }

        let percentage = (current as f64 / total as f64 * 100.0) as u32;
        match (self.verbosity, current_file) {
            (VerbosityLevel::Verbose | VerbosityLevel::Debug, Some(file)) => eprint!(
                "\rProgress: {current}/{total} ({percentage}%) - {}",
                file.display()
            ),
            _ => eprint!("\rProgress: {current}/{total} ({percentage}%)"),
        }

        if current == total {
            eprintln!();
        }
    }

    /// Errors that stop the whole run rather than a single document.
    fn is_critical_error(&self, error: &ValidationError) -> bool {
        matches!(
            error,
            ValidationError::Config(_)
                | ValidationError::Schema(_)
                | ValidationError::Concurrency { .. }
        )
    }

    fn format_error_brief(&self, error: &ValidationError) -> String {
        match error {
            ValidationError::Rejected { kind, .. } => format!("REJECTED ({kind})"),
            ValidationError::Schema(SchemaError::SourceNotFound { system_id }) => {
                format!("SCHEMA NOT FOUND: {system_id}")
            }
            _ => format!("ERROR: {error}"),
        }
    }

    fn format_error_normal(&self, error: &ValidationError) -> String {
        let timestamp = if self.show_timestamps {
            format!("[{}] ", chrono::Utc::now().format("%H:%M:%S"))
        } else {
            String::new()
        };

        format!("{timestamp}{error}")
    }

    fn format_error_verbose(&self, error: &ValidationError) -> String {
        let mut output = self.format_error_normal(error);

        match error {
            ValidationError::Schema(schema_error) => {
                output.push_str("\nSuggestion: ");
                output.push_str(schema_help(schema_error));
            }
            ValidationError::Rejected { reasons, .. } => {
                for reason in reasons {
                    output.push_str(&format!("\n    {reason}"));
                }
            }
            ValidationError::FileSystemTraversal { path, .. } => {
                output.push_str(&format!(
                    "\nSuggestion: Check that {} exists and is readable",
                    path.display()
                ));
            }
            _ => {}
        }

        output
    }

    fn format_error_debug(&self, error: &ValidationError) -> String {
        let mut output = self.format_error_verbose(error);
        output.push_str(&format!("\nDebug Info: {error:?}"));

        output.push_str("\nError Chain:");
        let mut current_error: &dyn std::error::Error = error;
        let mut level = 0;
        while let Some(source) = current_error.source() {
            output.push_str(&format!("\n  {}: {}", level + 1, source));
            current_error = source;
            level += 1;
        }

        output
    }
}

fn schema_help(error: &SchemaError) -> &'static str {
    match error {
        SchemaError::SourceNotFound { .. } | SchemaError::Unreadable { .. } => {
            "Check the configured schema paths and the documents' xsi:schemaLocation hints"
        }
        SchemaError::Malformed { .. }
        | SchemaError::InvalidPattern { .. }
        | SchemaError::Unsupported { .. } => "Fix the schema document and run again",
        SchemaError::UnresolvedReference { .. } => {
            "Add the schema declaring the referenced component to the schema set"
        }
        SchemaError::NoSources { .. } => {
            "Configure a schema set with --schema or add xsi:schemaLocation hints to the documents"
        }
    }
}

fn config_help(error: &ConfigError) -> &'static str {
    match error {
        ConfigError::Io(_) => "Check that the configuration file exists and is readable",
        ConfigError::TomlParsing(_) | ConfigError::JsonParsing(_) => {
            "Check the configuration file syntax (TOML/JSON format expected)"
        }
        ConfigError::UnsupportedFormat(_) => "Use a .toml or .json configuration file",
        ConfigError::Environment(_) => "Fix or unset the offending XSDGATE_* variable",
        ConfigError::Validation(_) => "Adjust the value in the file, environment or flags",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{Reason, Severity};
    use crate::validator::OutcomeKind;

    fn rejected() -> ValidationError {
        ValidationError::Rejected {
            kind: OutcomeKind::NotValid,
            summary: "Document is not valid".to_string(),
            reasons: vec![
                Reason::new(Severity::Error, "cvc-type.3.1.3: bad value")
                    .with_xpath(Some("/Order/Id".to_string())),
            ],
        }
    }

    #[test]
    fn test_quiet_hides_document_rejections() {
        let reporter = ErrorReporter::new(VerbosityLevel::Quiet);
        assert!(reporter.format_validation_error(&rejected()).is_none());

        let schema = ValidationError::Schema(SchemaError::SourceNotFound {
            system_id: "order.xsd".to_string(),
        });
        assert_eq!(
            reporter.format_validation_error(&schema).unwrap(),
            "SCHEMA NOT FOUND: order.xsd"
        );
    }

    #[test]
    fn test_verbose_lists_reasons() {
        let reporter = ErrorReporter::new(VerbosityLevel::Verbose);
        let formatted = reporter.format_validation_error(&rejected()).unwrap();
        assert!(formatted.starts_with("Document rejected (not-valid)"));
        assert!(formatted.contains("cvc-type.3.1.3: bad value [/Order/Id]"));
    }

    #[test]
    fn test_schema_errors_carry_suggestions() {
        let reporter = ErrorReporter::new(VerbosityLevel::Verbose);
        let error = ValidationError::Schema(SchemaError::NoSources {
            identity: "hints".to_string(),
        });
        let formatted = reporter.format_validation_error(&error).unwrap();
        assert!(formatted.contains("Suggestion: Configure a schema set"));
    }

    #[test]
    fn test_debug_includes_error_chain() {
        let reporter = ErrorReporter::new(VerbosityLevel::Debug);
        let error = ValidationError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let formatted = reporter.format_validation_error(&error).unwrap();
        assert!(formatted.contains("Debug Info:"));
        assert!(formatted.contains("Error Chain:"));
    }

    #[test]
    fn test_config_error_help() {
        let reporter = ErrorReporter::new(VerbosityLevel::Normal);
        let formatted =
            reporter.format_config_error(&ConfigError::Validation("threads".to_string()));
        assert!(formatted.starts_with("Configuration Error:"));
        assert!(formatted.contains("Adjust the value"));
    }
}
