//! Formatting of batch results for the terminal.

use std::time::Duration;

use crate::cache::GrammarCacheStats;
use crate::cli::{OutputFormat, VerbosityLevel};
use crate::validator::{FileValidationResult, PerformanceMetrics, ValidationResults, ValidationStatus};

pub struct Output {
    verbosity: VerbosityLevel,
    show_colors: bool,
}

impl Output {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    pub fn with_colors(mut self, show_colors: bool) -> Self {
        self.show_colors = show_colors;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{color}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    pub fn render(
        &self,
        results: &ValidationResults,
        format: OutputFormat,
    ) -> serde_json::Result<String> {
        match format {
            OutputFormat::Human => Ok(self.format_results(results)),
            OutputFormat::Summary => Ok(self.format_summary(results)),
            OutputFormat::Json => serde_json::to_string_pretty(results),
        }
    }

    pub fn format_results(&self, results: &ValidationResults) -> String {
        let mut output = String::new();

        match self.verbosity {
            VerbosityLevel::Quiet => {
                for file_result in results.file_results.iter().filter(|r| is_failure(r)) {
                    output.push_str(&self.format_file_result(file_result));
                    output.push('\n');
                }
            }
            VerbosityLevel::Normal | VerbosityLevel::Verbose | VerbosityLevel::Debug => {
                for file_result in &results.file_results {
                    if self.verbosity >= VerbosityLevel::Verbose || !file_result.status.is_valid() {
                        output.push_str(&self.format_file_result(file_result));
                        output.push('\n');
                    }
                }
                if !results.file_results.is_empty() {
                    output.push('\n');
                }
                output.push_str(&self.format_summary(results));

                if self.verbosity == VerbosityLevel::Debug {
                    output.push_str(&self.format_debug_info(results));
                }
            }
        }

        output
    }

    pub fn format_file_result(&self, result: &FileValidationResult) -> String {
        let path_display = result.path.display();
        let duration_str = format_duration(result.duration);

        match &result.status {
            ValidationStatus::Valid => format!(
                "{}  {} ({})",
                self.colorize("✓ VALID", "32"),
                path_display,
                duration_str
            ),
            ValidationStatus::Invalid { kind, reason_count } => {
                let mut output = format!(
                    "{}  {} ({}) - {} reason{}",
                    self.colorize(&format!("✗ {}", kind.as_str().to_uppercase()), "31"),
                    path_display,
                    duration_str,
                    reason_count,
                    if *reason_count == 1 { "" } else { "s" }
                );
                if self.verbosity > VerbosityLevel::Quiet {
                    for reason in &result.reasons {
                        output.push_str(&format!("\n    {reason}"));
                    }
                }
                output
            }
            ValidationStatus::Error { message } => format!(
                "{}  {} ({}) - {}",
                self.colorize("⚠ ERROR", "33"),
                path_display,
                duration_str,
                message
            ),
            ValidationStatus::Skipped { reason } => format!(
                "{}  {} ({}) - {}",
                self.colorize("- SKIPPED", "36"),
                path_display,
                duration_str,
                reason
            ),
        }
    }

    pub fn format_summary(&self, results: &ValidationResults) -> String {
        let mut output = String::new();
        output.push_str("Validation Summary:\n");
        output.push_str(&format!("  Total files: {}\n", results.total_files));
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Valid:", "32"),
            results.valid_files
        ));

        for (label, count) in [
            ("Not valid:", results.not_valid_files),
            ("Illegal root:", results.illegal_root_files),
            ("Parser errors:", results.parser_error_files),
        ] {
            if count > 0 {
                output.push_str(&format!("  {} {}\n", self.colorize(label, "31"), count));
            }
        }
        if results.error_files > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Errors:", "33"),
                results.error_files
            ));
        }
        if results.skipped_files > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Skipped:", "36"),
                results.skipped_files
            ));
        }

        output.push_str(&format!("  Success rate: {:.1}%\n", results.success_rate()));
        output.push_str(&format!(
            "  Duration: {}\n",
            format_duration(results.performance_metrics.total_duration)
        ));

        if self.verbosity >= VerbosityLevel::Verbose {
            output.push_str(&self.format_performance_metrics(&results.performance_metrics));
        }

        output
    }

    fn format_performance_metrics(&self, metrics: &PerformanceMetrics) -> String {
        let mut output = String::new();
        output.push_str("\nPerformance Metrics:\n");
        output.push_str(&format!(
            "  Throughput: {:.1} files/sec\n",
            metrics.throughput_files_per_second
        ));
        output.push_str(&format!(
            "  Concurrent validations: {}\n",
            metrics.concurrent_validations
        ));
        output.push_str(&format!(
            "  Discovery: {}\n",
            format_duration(metrics.discovery_duration)
        ));

        if self.verbosity == VerbosityLevel::Debug {
            output.push_str(&format_cache_stats(&metrics.grammar_cache));
        }
        output
    }

    fn format_debug_info(&self, results: &ValidationResults) -> String {
        let mut output = String::new();
        output.push_str("\nDebug Information:\n");
        output.push_str(&format!(
            "  Schema sets used: {}\n",
            results.schema_sets_used.len()
        ));
        for (i, schema_set) in results.schema_sets_used.iter().enumerate() {
            output.push_str(&format!("    {}: {}\n", i + 1, schema_set));
        }
        output
    }
}

fn is_failure(result: &FileValidationResult) -> bool {
    result.status.is_invalid() || result.status.is_error()
}

fn format_cache_stats(stats: &GrammarCacheStats) -> String {
    format!(
        "  Grammar cache: {} compiled, {} failed, {} cached, hit rate {:.1}%\n",
        stats.compilations,
        stats.failures,
        stats.entries,
        stats.hit_rate() * 100.0
    )
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{total_secs:.2}s")
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{mins}m{secs:.1}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{Reason, Severity, ValidationReport};
    use crate::validator::{OutcomeKind, ValidationOutcome};
    use std::path::PathBuf;

    fn create_test_results() -> ValidationResults {
        ValidationResults::aggregate(vec![
            FileValidationResult::from_outcome(
                PathBuf::from("good.xml"),
                "order.xsd".to_string(),
                ValidationOutcome::new(
                    OutcomeKind::Valid,
                    ValidationReport::new("Document is valid", Vec::new()),
                ),
                Duration::from_millis(3),
            ),
            FileValidationResult::from_outcome(
                PathBuf::from("bad.xml"),
                "order.xsd".to_string(),
                ValidationOutcome::new(
                    OutcomeKind::NotValid,
                    ValidationReport::new(
                        "Document is not valid",
                        vec![Reason::new(Severity::Error, "cvc-type.3.1.3: bad Id")
                            .with_xpath(Some("/Order/Id".to_string()))],
                    ),
                ),
                Duration::from_millis(4),
            ),
        ])
    }

    #[test]
    fn test_output_summary() {
        let output = Output::new(VerbosityLevel::Normal).with_colors(false);
        let formatted = output.format_results(&create_test_results());

        assert!(formatted.contains("Validation Summary:"));
        assert!(formatted.contains("Not valid: 1"));
        assert!(formatted.contains("✗ NOT-VALID  bad.xml"));
        assert!(formatted.contains("cvc-type.3.1.3: bad Id [/Order/Id]"));
        assert!(!formatted.contains("good.xml"));
    }

    #[test]
    fn test_quiet_lists_failures_only() {
        let output = Output::new(VerbosityLevel::Quiet).with_colors(false);
        let formatted = output.format_results(&create_test_results());
        assert_eq!(formatted.lines().count(), 1);
        assert!(formatted.starts_with("✗ NOT-VALID  bad.xml"));
    }

    #[test]
    fn test_json_rendering() {
        let output = Output::new(VerbosityLevel::Normal);
        let json = output
            .render(&create_test_results(), OutputFormat::Json)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["total_files"], 2);
        assert_eq!(value["not_valid_files"], 1);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30.0s");
    }
}
