//! Validator façade and the concurrent batch driver.
//!
//! [`XmlValidator`] ties a [`SchemaProvider`] to a shared [`GrammarCache`] and
//! runs one [`ValidationSession`](crate::session::ValidationSession) per
//! document. [`ValidationEngine`] fans many files out over tokio tasks:
//! - **Async I/O**: file discovery and document reads
//! - **Blocking pool**: grammar compilation and the streaming session
//! - **Bounded concurrency**: a semaphore caps in-flight documents

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{GrammarCache, GrammarCacheStats};
use crate::compiler::GrammarCompiler;
use crate::diagnostics::{Reason, ValidationReport};
use crate::error::{Result, SchemaError, SchemaResult, ValidationError};
use crate::file_discovery::FileDiscovery;
use crate::grammar::GrammarBundle;
use crate::provider::SchemaProvider;
use crate::session::{self, ValidationOptions};
use crate::structural::RootPath;

/// Context property holding the path of the document being validated.
pub const DOCUMENT_PATH_PROPERTY: &str = "xsdgate.document.path";

/// The four verdicts a validation pass can reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeKind {
    Valid,
    ParserError,
    IllegalRoot,
    NotValid,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Valid => "valid",
            OutcomeKind::ParserError => "parser-error",
            OutcomeKind::IllegalRoot => "illegal-root",
            OutcomeKind::NotValid => "not-valid",
        }
    }

    /// Process exit status used by the command line driver.
    pub fn exit_code(&self) -> i32 {
        match self {
            OutcomeKind::Valid => 0,
            OutcomeKind::NotValid => 1,
            OutcomeKind::IllegalRoot => 2,
            OutcomeKind::ParserError => 3,
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict of one validation pass together with its report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum ValidationOutcome {
    Valid(ValidationReport),
    ParserError(ValidationReport),
    IllegalRoot(ValidationReport),
    NotValid(ValidationReport),
}

impl ValidationOutcome {
    pub fn new(kind: OutcomeKind, report: ValidationReport) -> Self {
        match kind {
            OutcomeKind::Valid => ValidationOutcome::Valid(report),
            OutcomeKind::ParserError => ValidationOutcome::ParserError(report),
            OutcomeKind::IllegalRoot => ValidationOutcome::IllegalRoot(report),
            OutcomeKind::NotValid => ValidationOutcome::NotValid(report),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            ValidationOutcome::Valid(_) => OutcomeKind::Valid,
            ValidationOutcome::ParserError(_) => OutcomeKind::ParserError,
            ValidationOutcome::IllegalRoot(_) => OutcomeKind::IllegalRoot,
            ValidationOutcome::NotValid(_) => OutcomeKind::NotValid,
        }
    }

    pub fn report(&self) -> &ValidationReport {
        match self {
            ValidationOutcome::Valid(report)
            | ValidationOutcome::ParserError(report)
            | ValidationOutcome::IllegalRoot(report)
            | ValidationOutcome::NotValid(report) => report,
        }
    }

    pub fn into_report(self) -> ValidationReport {
        match self {
            ValidationOutcome::Valid(report)
            | ValidationOutcome::ParserError(report)
            | ValidationOutcome::IllegalRoot(report)
            | ValidationOutcome::NotValid(report) => report,
        }
    }

    pub fn reasons(&self) -> &[Reason] {
        &self.report().reasons
    }

    pub fn summary(&self) -> &str {
        &self.report().summary
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid(_))
    }

    /// Turn anything but `Valid` into [`ValidationError::Rejected`], for
    /// callers that want a hard failure.
    pub fn into_result(self) -> Result<ValidationReport> {
        let kind = self.kind();
        let report = self.into_report();
        if kind == OutcomeKind::Valid {
            Ok(report)
        } else {
            Err(ValidationError::Rejected {
                kind,
                summary: report.summary,
                reasons: report.reasons,
            })
        }
    }
}

/// Per-document inputs and outputs of [`XmlValidator::validate`].
///
/// Named properties feed dynamic providers; the optional option overrides
/// replace the validator defaults for this document only; the two sinks name
/// properties that receive the plain-text and XML reason reports.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    properties: HashMap<String, String>,
    root_paths: Option<Vec<RootPath>>,
    ignore_unknown_namespaces: Option<bool>,
    full_schema_checking: Option<bool>,
    reasons_sink: Option<String>,
    xml_reasons_sink: Option<String>,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_property(name, value);
        self
    }

    pub fn with_document_path(self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_string_lossy().into_owned();
        self.with_property(DOCUMENT_PATH_PROPERTY, path)
    }

    pub fn with_root_paths(mut self, root_paths: Vec<RootPath>) -> Self {
        self.root_paths = Some(root_paths);
        self
    }

    pub fn with_ignore_unknown_namespaces(mut self, ignore: bool) -> Self {
        self.ignore_unknown_namespaces = Some(ignore);
        self
    }

    pub fn with_full_schema_checking(mut self, enabled: bool) -> Self {
        self.full_schema_checking = Some(enabled);
        self
    }

    pub fn with_reasons_sink(mut self, property: impl Into<String>) -> Self {
        self.reasons_sink = Some(property.into());
        self
    }

    pub fn with_xml_reasons_sink(mut self, property: impl Into<String>) -> Self {
        self.xml_reasons_sink = Some(property.into());
        self
    }

    /// `defaults` with this context's overrides applied.
    pub fn effective_options(&self, defaults: &ValidationOptions) -> ValidationOptions {
        let mut options = defaults.clone();
        if let Some(root_paths) = &self.root_paths {
            options.root_paths = root_paths.clone();
        }
        if let Some(ignore) = self.ignore_unknown_namespaces {
            options.ignore_unknown_namespaces = ignore;
        }
        if let Some(enabled) = self.full_schema_checking {
            options.full_schema_checking = enabled;
        }
        options
    }

    fn write_sinks(&mut self, outcome: &ValidationOutcome) {
        if let Some(sink) = self.reasons_sink.clone() {
            self.set_property(sink, outcome.report().to_plain_text());
        }
        if let Some(sink) = self.xml_reasons_sink.clone() {
            self.set_property(sink, outcome.report().to_xml());
        }
    }
}

/// Validates documents against schema sets chosen by a [`SchemaProvider`].
///
/// Compiled grammars live in the shared [`GrammarCache`], so one validator can
/// be used from any number of threads.
pub struct XmlValidator {
    provider: Arc<dyn SchemaProvider>,
    cache: Arc<GrammarCache>,
    options: ValidationOptions,
}

impl XmlValidator {
    pub fn new(
        provider: Arc<dyn SchemaProvider>,
        cache: Arc<GrammarCache>,
        options: ValidationOptions,
    ) -> Self {
        Self {
            provider,
            cache,
            options,
        }
    }

    /// Validator with its own unbounded cache.
    pub fn with_compiler(
        provider: Arc<dyn SchemaProvider>,
        compiler: Arc<dyn GrammarCompiler>,
        options: ValidationOptions,
    ) -> Self {
        Self::new(provider, Arc::new(GrammarCache::new(compiler, None)), options)
    }

    /// Compile the provider's static schema set up front so that schema
    /// errors surface at startup. Providers without one are left alone.
    pub fn configure(&self) -> SchemaResult<Option<Arc<GrammarBundle>>> {
        let Some(identity) = self.provider.schema_set_identity() else {
            debug!("schema set is chosen per document, nothing to precompile");
            return Ok(None);
        };
        let bundle = self
            .cache
            .get_or_compile_with(&identity, || self.provider.schema_sources())?;
        info!(identity = %identity, "validator configured");
        Ok(Some(bundle))
    }

    /// Bundle for `input`: the static schema set when the provider has one,
    /// otherwise the one the provider picks for this document.
    pub fn resolve_bundle(
        &self,
        input: &[u8],
        context: &ValidationContext,
    ) -> SchemaResult<Arc<GrammarBundle>> {
        match self.provider.schema_set_identity() {
            Some(identity) => self
                .cache
                .get_or_compile_with(&identity, || self.provider.schema_sources()),
            None => {
                let identity = self.provider.schema_set_identity_for(input, context)?;
                self.cache.get_or_compile_with(&identity, || {
                    self.provider.schema_sources_for(input, context)
                })
            }
        }
    }

    /// Run a session over `input` against an already resolved bundle and
    /// write the context sinks.
    pub fn validate_against(
        &self,
        bundle: &GrammarBundle,
        input: &[u8],
        context: &mut ValidationContext,
    ) -> ValidationOutcome {
        let options = context.effective_options(&self.options);
        let outcome = session::validate(bundle, input, &options);
        context.write_sinks(&outcome);
        outcome
    }

    pub fn validate(
        &self,
        input: &[u8],
        context: &mut ValidationContext,
    ) -> Result<ValidationOutcome> {
        let bundle = self.resolve_bundle(input, context)?;
        Ok(self.validate_against(&bundle, input, context))
    }

    pub fn cache(&self) -> &Arc<GrammarCache> {
        &self.cache
    }

    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }
}

/// Batch driver configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationConfig {
    /// Number of documents validated at the same time
    pub max_concurrent_validations: usize,
    /// Per-document timeout
    pub validation_timeout: Duration,
    /// Skip remaining documents once one is not valid
    pub fail_fast: bool,
    /// Show progress indicators
    pub show_progress: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_concurrent_validations: num_cpus::get(),
            validation_timeout: Duration::from_secs(30),
            fail_fast: false,
            show_progress: false,
        }
    }
}

/// Status of a single file in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    Valid,
    /// The document was checked and rejected
    Invalid { kind: OutcomeKind, reason_count: usize },
    /// The document could not be checked
    Error { message: String },
    /// No schema set applies to the document, or fail-fast stopped the batch
    Skipped { reason: String },
}

impl ValidationStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationStatus::Valid)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, ValidationStatus::Invalid { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ValidationStatus::Error { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ValidationStatus::Skipped { .. })
    }

    pub fn outcome_kind(&self) -> Option<OutcomeKind> {
        match self {
            ValidationStatus::Valid => Some(OutcomeKind::Valid),
            ValidationStatus::Invalid { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Result of validating a single file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileValidationResult {
    pub path: PathBuf,
    pub status: ValidationStatus,
    /// Identity of the schema set the file was checked against
    pub schema_set: Option<String>,
    pub duration: Duration,
    pub reasons: Vec<Reason>,
    /// Error or skip explanation
    pub details: Option<String>,
}

impl FileValidationResult {
    pub fn from_outcome(
        path: PathBuf,
        schema_set: String,
        outcome: ValidationOutcome,
        duration: Duration,
    ) -> Self {
        let kind = outcome.kind();
        let reasons = outcome.into_report().reasons;
        let status = match kind {
            OutcomeKind::Valid => ValidationStatus::Valid,
            kind => ValidationStatus::Invalid {
                kind,
                reason_count: reasons.len(),
            },
        };
        Self {
            path,
            status,
            schema_set: Some(schema_set),
            duration,
            reasons,
            details: None,
        }
    }

    pub fn error(path: PathBuf, error: ValidationError, duration: Duration) -> Self {
        Self {
            path,
            status: ValidationStatus::Error {
                message: error.to_string(),
            },
            schema_set: None,
            duration,
            reasons: Vec::new(),
            details: Some(error.to_string()),
        }
    }

    pub fn skipped(path: PathBuf, reason: String, duration: Duration) -> Self {
        Self {
            path,
            status: ValidationStatus::Skipped {
                reason: reason.clone(),
            },
            schema_set: None,
            duration,
            reasons: Vec::new(),
            details: Some(reason),
        }
    }
}

/// Progress update for a batch
#[derive(Debug, Clone)]
pub struct ValidationProgress {
    pub current_file: Option<PathBuf>,
    pub completed: usize,
    pub total: usize,
    pub phase: ValidationPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationPhase {
    Discovery,
    Validation,
    Aggregation,
    Complete,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_duration: Duration,
    pub discovery_duration: Duration,
    pub validation_duration: Duration,
    pub average_time_per_file: Duration,
    pub throughput_files_per_second: f64,
    pub concurrent_validations: usize,
    pub grammar_cache: GrammarCacheStats,
}

/// Aggregated results of a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResults {
    pub total_files: usize,
    pub valid_files: usize,
    /// Checked and rejected, any outcome kind
    pub invalid_files: usize,
    pub parser_error_files: usize,
    pub illegal_root_files: usize,
    pub not_valid_files: usize,
    pub error_files: usize,
    pub skipped_files: usize,
    pub total_duration: Duration,
    pub average_duration: Duration,
    pub file_results: Vec<FileValidationResult>,
    pub schema_sets_used: Vec<String>,
    pub performance_metrics: PerformanceMetrics,
}

impl ValidationResults {
    pub fn aggregate(file_results: Vec<FileValidationResult>) -> Self {
        let total_files = file_results.len();
        let mut results = Self {
            total_files,
            valid_files: 0,
            invalid_files: 0,
            parser_error_files: 0,
            illegal_root_files: 0,
            not_valid_files: 0,
            error_files: 0,
            skipped_files: 0,
            total_duration: Duration::ZERO,
            average_duration: Duration::ZERO,
            file_results: Vec::new(),
            schema_sets_used: Vec::new(),
            performance_metrics: PerformanceMetrics::default(),
        };
        let mut schema_sets = BTreeSet::new();

        for result in &file_results {
            match &result.status {
                ValidationStatus::Valid => results.valid_files += 1,
                ValidationStatus::Invalid { kind, .. } => {
                    results.invalid_files += 1;
                    match kind {
                        OutcomeKind::ParserError => results.parser_error_files += 1,
                        OutcomeKind::IllegalRoot => results.illegal_root_files += 1,
                        OutcomeKind::NotValid => results.not_valid_files += 1,
                        OutcomeKind::Valid => {}
                    }
                }
                ValidationStatus::Error { .. } => results.error_files += 1,
                ValidationStatus::Skipped { .. } => results.skipped_files += 1,
            }
            results.total_duration += result.duration;
            if let Some(schema_set) = &result.schema_set {
                schema_sets.insert(schema_set.clone());
            }
        }

        if total_files > 0 {
            results.average_duration = results.total_duration / total_files as u32;
        }
        results.performance_metrics = PerformanceMetrics {
            total_duration: results.total_duration,
            validation_duration: results.total_duration,
            average_time_per_file: results.average_duration,
            throughput_files_per_second: throughput(total_files, results.total_duration),
            concurrent_validations: 1,
            ..PerformanceMetrics::default()
        };
        results.schema_sets_used = schema_sets.into_iter().collect();
        results.file_results = file_results;
        results
    }

    pub fn with_metrics(
        file_results: Vec<FileValidationResult>,
        performance_metrics: PerformanceMetrics,
    ) -> Self {
        let mut results = Self::aggregate(file_results);
        results.performance_metrics = performance_metrics;
        results
    }

    pub fn all_valid(&self) -> bool {
        self.valid_files == self.total_files && self.total_files > 0
    }

    pub fn has_errors(&self) -> bool {
        self.error_files > 0 || self.invalid_files > 0
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.valid_files as f64 / self.total_files as f64) * 100.0
        }
    }

    /// Exit status of the most severe outcome in the batch. Errors count as
    /// parser errors; skipped files do not count.
    pub fn exit_code(&self) -> i32 {
        self.file_results
            .iter()
            .map(|result| match &result.status {
                ValidationStatus::Error { .. } => OutcomeKind::ParserError.exit_code(),
                status => status.outcome_kind().map_or(0, |kind| kind.exit_code()),
            })
            .max()
            .unwrap_or(0)
    }
}

fn throughput(files: usize, elapsed: Duration) -> f64 {
    if elapsed.as_secs_f64() > 0.0 {
        files as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    }
}

pub type ProgressCallback = Arc<dyn Fn(ValidationProgress) + Send + Sync>;

const FAIL_FAST_REASON: &str = "Skipped after an earlier document failed (fail-fast)";

/// Validates many files concurrently with one shared [`XmlValidator`].
///
/// Each file is read asynchronously and validated on the blocking pool under
/// a semaphore permit and a per-file timeout. A timed out session keeps
/// running on its blocking thread until it finishes; only its result is
/// dropped.
pub struct ValidationEngine {
    validator: Arc<XmlValidator>,
    config: ValidationConfig,
}

impl ValidationEngine {
    pub fn new(validator: Arc<XmlValidator>, config: ValidationConfig) -> Self {
        Self { validator, config }
    }

    pub async fn validate_path(
        &self,
        path: &Path,
        file_discovery: &FileDiscovery,
    ) -> Result<ValidationResults> {
        self.validate_path_with_progress(path, file_discovery, None)
            .await
    }

    pub async fn validate_path_with_progress(
        &self,
        path: &Path,
        file_discovery: &FileDiscovery,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<ValidationResults> {
        let workflow_start = Instant::now();
        let mut performance_metrics = PerformanceMetrics {
            concurrent_validations: self.config.max_concurrent_validations,
            ..PerformanceMetrics::default()
        };

        let discovery_start = Instant::now();
        if let Some(ref callback) = progress_callback {
            callback(ValidationProgress {
                current_file: None,
                completed: 0,
                total: 0,
                phase: ValidationPhase::Discovery,
            });
        }
        let files = file_discovery.discover_files(path).await?;
        performance_metrics.discovery_duration = discovery_start.elapsed();
        debug!(path = %path.display(), files = files.len(), "discovery finished");

        let validation_start = Instant::now();
        let results = self
            .validate_files_with_progress(files, progress_callback.clone())
            .await?;
        performance_metrics.validation_duration = validation_start.elapsed();

        if let Some(ref callback) = progress_callback {
            callback(ValidationProgress {
                current_file: None,
                completed: results.len(),
                total: results.len(),
                phase: ValidationPhase::Aggregation,
            });
        }

        performance_metrics.grammar_cache = self.validator.cache().stats();
        performance_metrics.total_duration = workflow_start.elapsed();
        if !results.is_empty() {
            performance_metrics.average_time_per_file =
                performance_metrics.validation_duration / results.len() as u32;
        }
        performance_metrics.throughput_files_per_second =
            throughput(results.len(), performance_metrics.total_duration);

        let final_results = ValidationResults::with_metrics(results, performance_metrics);
        info!(
            files = final_results.total_files,
            valid = final_results.valid_files,
            invalid = final_results.invalid_files,
            errors = final_results.error_files,
            skipped = final_results.skipped_files,
            "batch finished"
        );

        if let Some(ref callback) = progress_callback {
            callback(ValidationProgress {
                current_file: None,
                completed: final_results.total_files,
                total: final_results.total_files,
                phase: ValidationPhase::Complete,
            });
        }

        Ok(final_results)
    }

    pub async fn validate_files(&self, files: Vec<PathBuf>) -> Result<Vec<FileValidationResult>> {
        self.validate_files_with_progress(files, None).await
    }

    pub async fn validate_files_with_progress(
        &self,
        files: Vec<PathBuf>,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<Vec<FileValidationResult>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let total_files = files.len();
        let completed = Arc::new(AtomicUsize::new(0));
        let stop = Arc::new(AtomicBool::new(false));
        let semaphore = Arc::new(tokio::sync::Semaphore::new(
            self.config.max_concurrent_validations.max(1),
        ));

        let validation_tasks: Vec<_> = files
            .into_iter()
            .map(|file_path| {
                let validator = Arc::clone(&self.validator);
                let semaphore = Arc::clone(&semaphore);
                let completed = Arc::clone(&completed);
                let stop = Arc::clone(&stop);
                let progress_callback = progress_callback.clone();
                let timeout = self.config.validation_timeout;
                let fail_fast = self.config.fail_fast;

                tokio::spawn(async move {
                    let _permit = semaphore.acquire().await.map_err(|_| {
                        ValidationError::Concurrency {
                            details: "Failed to acquire validation semaphore".to_string(),
                        }
                    })?;

                    let result = if stop.load(Ordering::SeqCst) {
                        FileValidationResult::skipped(
                            file_path.clone(),
                            FAIL_FAST_REASON.to_string(),
                            Duration::ZERO,
                        )
                    } else {
                        match tokio::time::timeout(
                            timeout,
                            Self::validate_single_file_internal(file_path.clone(), validator),
                        )
                        .await
                        {
                            Ok(result) => result,
                            Err(_) => FileValidationResult::error(
                                file_path.clone(),
                                ValidationError::Concurrency {
                                    details: format!("Validation timeout after {timeout:?}"),
                                },
                                timeout,
                            ),
                        }
                    };

                    if fail_fast && (result.status.is_invalid() || result.status.is_error()) {
                        stop.store(true, Ordering::SeqCst);
                    }

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(ref callback) = progress_callback {
                        callback(ValidationProgress {
                            current_file: Some(file_path),
                            completed: done,
                            total: total_files,
                            phase: ValidationPhase::Validation,
                        });
                    }

                    Ok::<FileValidationResult, ValidationError>(result)
                })
            })
            .collect();

        let task_results =
            try_join_all(validation_tasks)
                .await
                .map_err(|e| ValidationError::Concurrency {
                    details: format!("Task join error: {e}"),
                })?;

        task_results.into_iter().collect()
    }

    async fn validate_single_file_internal(
        file_path: PathBuf,
        validator: Arc<XmlValidator>,
    ) -> FileValidationResult {
        let start_time = Instant::now();

        let input = match tokio::fs::read(&file_path).await {
            Ok(input) => input,
            Err(e) => {
                return FileValidationResult::error(file_path, e.into(), start_time.elapsed());
            }
        };

        let document_path = file_path.clone();
        let session = tokio::task::spawn_blocking(move || {
            let mut context = ValidationContext::default().with_document_path(&document_path);
            let bundle = validator.resolve_bundle(&input, &context)?;
            let outcome = validator.validate_against(&bundle, &input, &mut context);
            Ok::<_, SchemaError>((bundle.identity.to_string(), outcome))
        })
        .await;

        let duration = start_time.elapsed();
        match session {
            Ok(Ok((schema_set, outcome))) => {
                debug!(
                    path = %file_path.display(),
                    outcome = %outcome.kind(),
                    reasons = outcome.reasons().len(),
                    "document validated"
                );
                FileValidationResult::from_outcome(file_path, schema_set, outcome, duration)
            }
            Ok(Err(SchemaError::NoSources { identity })) => FileValidationResult::skipped(
                file_path,
                format!("No schema set applies: {identity}"),
                duration,
            ),
            Ok(Err(e)) => {
                warn!(path = %file_path.display(), error = %e, "schema set unavailable");
                FileValidationResult::error(file_path, e.into(), duration)
            }
            Err(e) => FileValidationResult::error(
                file_path,
                ValidationError::Concurrency {
                    details: format!("Join error: {e}"),
                },
                duration,
            ),
        }
    }

    pub async fn validate_single_file(&self, file_path: &Path) -> FileValidationResult {
        Self::validate_single_file_internal(file_path.to_path_buf(), Arc::clone(&self.validator))
            .await
    }

    pub fn validator(&self) -> &Arc<XmlValidator> {
        &self.validator
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }
}
