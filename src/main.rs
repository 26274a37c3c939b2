use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use xsdgate::config::Config;
use xsdgate::{
    Cli, ConfigManager, ErrorReporter, FileDiscovery, GrammarCache, Output, OutputFormat,
    ProgressCallback, SchemaLocationProvider, SchemaProvider, StaticSchemaProvider,
    ValidationConfig, ValidationEngine, ValidationError, ValidationPhase, VerbosityLevel,
    XmlValidator, XsdGrammarCompiler,
};

/// Exit status for runs that never got to validate a document.
const EXIT_FAILURE: u8 = 4;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    if let Err(message) = cli.validate() {
        eprintln!("Error: {message}");
        return ExitCode::from(EXIT_FAILURE);
    }

    let startup_reporter = ErrorReporter::new(VerbosityLevel::from_flags(cli.verbose, cli.quiet));
    let config = match ConfigManager::load_config(&cli).await {
        Ok(config) => config,
        Err(error) => {
            startup_reporter.report_config_error(&error);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let verbosity = if cli.verbose >= 2 {
        VerbosityLevel::Debug
    } else {
        VerbosityLevel::from_flags(u8::from(config.output.verbose), config.output.quiet)
    };
    init_tracing(verbosity);

    match run(&cli, &config, verbosity).await {
        Ok(code) => code,
        Err(error) => {
            let reporter = ErrorReporter::new(verbosity);
            match error.downcast_ref::<ValidationError>() {
                Some(validation_error) => reporter.report_validation_error(validation_error),
                None => eprintln!("Error: {error:#}"),
            }
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn init_tracing(verbosity: VerbosityLevel) {
    let filter = EnvFilter::try_from_env("XSDGATE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: &Cli, config: &Config, verbosity: VerbosityLevel) -> Result<ExitCode> {
    let provider: Arc<dyn SchemaProvider> = if config.schemas.is_empty() {
        debug!("no static schema set configured, using schemaLocation hints");
        Arc::new(SchemaLocationProvider::new())
    } else {
        Arc::new(
            StaticSchemaProvider::new(&config.schemas.files, &config.schemas.location_pairs())
                .map_err(ValidationError::from)?,
        )
    };

    let cache = Arc::new(GrammarCache::new(
        Arc::new(XsdGrammarCompiler::new()),
        config.cache.max_entries,
    ));
    let validator = XmlValidator::new(provider, cache, ConfigManager::validation_options(config));
    if let Some(bundle) = validator.configure().map_err(ValidationError::from)? {
        info!(schema_set = %bundle.identity, "static schema set compiled");
    }

    let file_discovery = FileDiscovery::new()
        .with_extensions(config.files.extensions.clone())
        .with_include_patterns(config.files.include_patterns.clone())?
        .with_exclude_patterns(config.files.exclude_patterns.clone())?;

    let show_progress = config.validation.show_progress || cli.wants_progress();
    let engine = ValidationEngine::new(
        Arc::new(validator),
        ValidationConfig {
            max_concurrent_validations: ConfigManager::get_thread_count(config),
            validation_timeout: ConfigManager::get_timeout_duration(config),
            fail_fast: config.validation.fail_fast,
            show_progress,
        },
    );

    let progress_callback: Option<ProgressCallback> = show_progress.then(|| {
        let reporter = ErrorReporter::new(verbosity);
        Arc::new(move |progress: xsdgate::ValidationProgress| {
            if progress.phase == ValidationPhase::Validation {
                reporter.report_progress(
                    progress.completed,
                    progress.total,
                    progress.current_file.as_deref(),
                );
            }
        }) as ProgressCallback
    });

    let results = engine
        .validate_path_with_progress(&cli.path, &file_discovery, progress_callback)
        .await?;

    let format = OutputFormat::from(config.output.format);
    let rendered = Output::new(verbosity)
        .render(&results, format)
        .context("Failed to render validation results")?;
    println!("{rendered}");

    let code = u8::try_from(results.exit_code()).unwrap_or(EXIT_FAILURE);
    Ok(ExitCode::from(code))
}
