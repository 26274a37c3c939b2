use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::{Cli, OutputFormat, split_list};
use crate::session::{DEFAULT_MAX_NAMESPACE_WARNINGS, ValidationOptions};
use crate::structural::{RootPath, RootPathError};

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub validation: ValidationConfig,
    pub cache: CacheConfig,
    pub schemas: SchemaConfig,
    pub output: OutputConfig,
    pub files: FileConfig,
}

/// Validation-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Number of documents validated concurrently
    pub threads: Option<usize>,
    pub fail_fast: bool,
    pub show_progress: bool,
    /// Required root paths, e.g. "Envelope/Body"
    pub root_paths: Vec<RootPath>,
    pub ignore_unknown_namespaces: bool,
    pub full_schema_checking: bool,
    pub max_namespace_warnings: usize,
    /// Per-document timeout
    pub timeout_seconds: u64,
}

/// Grammar cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of compiled schema sets; unbounded when absent
    pub max_entries: Option<u64>,
}

/// Static schema set. When empty, each document names its own schemas
/// through `xsi:schemaLocation` hints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SchemaConfig {
    /// Schema documents in compilation order
    pub files: Vec<PathBuf>,
    pub locations: Vec<SchemaLocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaLocation {
    pub namespace: String,
    pub location: String,
}

impl SchemaConfig {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.locations.is_empty()
    }

    pub fn location_pairs(&self) -> Vec<(String, String)> {
        self.locations
            .iter()
            .map(|entry| (entry.namespace.clone(), entry.location.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormatConfig,
    pub verbose: bool,
    /// Quiet mode (failures only)
    pub quiet: bool,
}

/// File processing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub extensions: Vec<String>,
    /// Include patterns (glob syntax)
    pub include_patterns: Vec<String>,
    /// Exclude patterns (glob syntax)
    pub exclude_patterns: Vec<String>,
}

/// Output format configuration (serializable version of CLI OutputFormat)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormatConfig {
    #[default]
    Human,
    Json,
    Summary,
}

impl FromStr for OutputFormatConfig {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "human" => Ok(OutputFormatConfig::Human),
            "json" => Ok(OutputFormatConfig::Json),
            "summary" => Ok(OutputFormatConfig::Summary),
            other => Err(format!("unknown output format '{other}'")),
        }
    }
}

impl From<OutputFormat> for OutputFormatConfig {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputFormatConfig::Human,
            OutputFormat::Json => OutputFormatConfig::Json,
            OutputFormat::Summary => OutputFormatConfig::Summary,
        }
    }
}

impl From<OutputFormatConfig> for OutputFormat {
    fn from(format: OutputFormatConfig) -> Self {
        match format {
            OutputFormatConfig::Human => OutputFormat::Human,
            OutputFormatConfig::Json => OutputFormat::Json,
            OutputFormatConfig::Summary => OutputFormat::Summary,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            threads: None,
            fail_fast: false,
            show_progress: false,
            root_paths: Vec::new(),
            ignore_unknown_namespaces: false,
            full_schema_checking: false,
            max_namespace_warnings: DEFAULT_MAX_NAMESPACE_WARNINGS,
            timeout_seconds: 30,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormatConfig::Human,
            verbose: false,
            quiet: false,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["xml".to_string()],
            include_patterns: vec![],
            exclude_patterns: vec![],
        }
    }
}

const CONFIG_NAMES: [&str; 4] = [
    "xsdgate.toml",
    "xsdgate.json",
    ".xsdgate.toml",
    ".xsdgate.json",
];

/// Loads and merges configuration: defaults, then a configuration file, then
/// `XSDGATE_*` environment variables, then command line flags.
pub struct ConfigManager;

impl ConfigManager {
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        Self::load_config_with(&SystemEnvProvider, cli).await
    }

    pub async fn load_config_with(env: &impl EnvProvider, cli: &Cli) -> Result<Config> {
        let mut config = Config::default();

        if let Some(config_path) = &cli.config {
            let file_config = Self::load_from_file(config_path).await?;
            config = Self::merge_configs(config, file_config);
        } else if let Some(found_config) = Self::find_config_file().await? {
            config = Self::merge_configs(config, found_config);
        }

        config = Self::apply_environment_overrides_with(env, config)?;
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => match toml::from_str::<Config>(&content) {
                Ok(config) => Ok(config),
                Err(_) => Ok(serde_json::from_str(&content)?),
            },
        }
    }

    /// Current directory first, then the user configuration directory.
    pub async fn find_config_file() -> Result<Option<Config>> {
        for name in CONFIG_NAMES {
            let path = PathBuf::from(name);
            if path.exists() {
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("xsdgate");
            for name in CONFIG_NAMES {
                let path = app_config_dir.join(name);
                if path.exists() {
                    return Ok(Some(Self::load_from_file(&path).await?));
                }
            }
        }

        Ok(None)
    }

    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(threads) = parse_env(env, "XSDGATE_THREADS")? {
            config.validation.threads = Some(threads);
        }
        if let Some(fail_fast) = parse_env(env, "XSDGATE_FAIL_FAST")? {
            config.validation.fail_fast = fail_fast;
        }
        if let Some(timeout) = parse_env(env, "XSDGATE_TIMEOUT")? {
            config.validation.timeout_seconds = timeout;
        }
        if let Some(root_paths) = env.get("XSDGATE_ROOT_PATHS") {
            config.validation.root_paths = split_list(&root_paths)
                .iter()
                .map(|path| path.parse::<RootPath>())
                .collect::<std::result::Result<Vec<_>, RootPathError>>()
                .map_err(|e| {
                    ConfigError::Environment(format!("Invalid XSDGATE_ROOT_PATHS value: {e}"))
                })?;
        }
        if let Some(ignore) = parse_env(env, "XSDGATE_IGNORE_UNKNOWN_NAMESPACES")? {
            config.validation.ignore_unknown_namespaces = ignore;
        }
        if let Some(full) = parse_env(env, "XSDGATE_FULL_SCHEMA_CHECKING")? {
            config.validation.full_schema_checking = full;
        }
        if let Some(cap) = parse_env(env, "XSDGATE_MAX_NAMESPACE_WARNINGS")? {
            config.validation.max_namespace_warnings = cap;
        }

        if let Some(max_entries) = parse_env(env, "XSDGATE_CACHE_ENTRIES")? {
            config.cache.max_entries = Some(max_entries);
        }

        if let Some(schemas) = env.get("XSDGATE_SCHEMAS") {
            config.schemas.files = split_list(&schemas).into_iter().map(PathBuf::from).collect();
        }

        if let Some(verbose) = parse_env(env, "XSDGATE_VERBOSE")? {
            config.output.verbose = verbose;
        }
        if let Some(quiet) = parse_env(env, "XSDGATE_QUIET")? {
            config.output.quiet = quiet;
        }
        if let Some(format) = parse_env(env, "XSDGATE_FORMAT")? {
            config.output.format = format;
        }

        if let Some(extensions) = env.get("XSDGATE_EXTENSIONS") {
            config.files.extensions = split_list(&extensions);
        }

        Ok(config)
    }

    /// Flags given on the command line win; absent flags keep the
    /// configured value.
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if cli.threads.is_some() {
            config.validation.threads = cli.threads;
        }
        config.validation.fail_fast |= cli.fail_fast;
        config.validation.show_progress |= cli.progress;
        if !cli.root_paths.is_empty() {
            config.validation.root_paths = cli.root_paths.clone();
        }
        config.validation.ignore_unknown_namespaces |= cli.ignore_unknown_namespaces;
        config.validation.full_schema_checking |= cli.full_checking;
        if let Some(cap) = cli.max_namespace_warnings {
            config.validation.max_namespace_warnings = cap;
        }
        if let Some(timeout) = cli.timeout {
            config.validation.timeout_seconds = timeout;
        }

        if cli.cache_entries.is_some() {
            config.cache.max_entries = cli.cache_entries;
        }

        if !cli.schemas.is_empty() {
            config.schemas.files = cli.schemas.clone();
        }
        if !cli.schema_locations.is_empty() {
            config.schemas.locations = cli
                .schema_locations
                .iter()
                .map(|(namespace, location)| SchemaLocation {
                    namespace: namespace.clone(),
                    location: location.clone(),
                })
                .collect();
        }

        if let Some(format) = cli.output_format {
            config.output.format = format.into();
        }
        if cli.verbose > 0 {
            config.output.verbose = true;
            config.output.quiet = false;
        }
        if cli.quiet {
            config.output.quiet = true;
            config.output.verbose = false;
        }

        if let Some(extensions) = cli.get_extensions() {
            config.files.extensions = extensions;
        }
        if !cli.include_patterns.is_empty() {
            config.files.include_patterns = cli.include_patterns.clone();
        }
        if !cli.exclude_patterns.is_empty() {
            config.files.exclude_patterns = cli.exclude_patterns.clone();
        }

        config
    }

    /// Merge two configurations (second takes precedence for non-None values)
    pub fn merge_configs(mut base: Config, override_config: Config) -> Config {
        if override_config.validation.threads.is_some() {
            base.validation.threads = override_config.validation.threads;
        }
        base.validation.fail_fast = override_config.validation.fail_fast;
        base.validation.show_progress = override_config.validation.show_progress;
        if !override_config.validation.root_paths.is_empty() {
            base.validation.root_paths = override_config.validation.root_paths;
        }
        base.validation.ignore_unknown_namespaces =
            override_config.validation.ignore_unknown_namespaces;
        base.validation.full_schema_checking = override_config.validation.full_schema_checking;
        base.validation.max_namespace_warnings = override_config.validation.max_namespace_warnings;
        base.validation.timeout_seconds = override_config.validation.timeout_seconds;

        if override_config.cache.max_entries.is_some() {
            base.cache.max_entries = override_config.cache.max_entries;
        }

        if !override_config.schemas.is_empty() {
            base.schemas = override_config.schemas;
        }

        base.output = override_config.output;

        if !override_config.files.extensions.is_empty() {
            base.files.extensions = override_config.files.extensions;
        }
        if !override_config.files.include_patterns.is_empty() {
            base.files.include_patterns = override_config.files.include_patterns;
        }
        if !override_config.files.exclude_patterns.is_empty() {
            base.files.exclude_patterns = override_config.files.exclude_patterns;
        }

        base
    }

    pub fn validate_config(config: &Config) -> Result<()> {
        if let Some(threads) = config.validation.threads {
            if threads == 0 {
                return Err(ConfigError::Validation(
                    "Number of threads must be greater than 0".to_string(),
                ));
            }
            if threads > 1000 {
                return Err(ConfigError::Validation(
                    "Number of threads cannot exceed 1000".to_string(),
                ));
            }
        }

        if config.validation.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if config.validation.max_namespace_warnings == 0 {
            return Err(ConfigError::Validation(
                "Namespace warning cap must be at least 1".to_string(),
            ));
        }

        if config.cache.max_entries == Some(0) {
            return Err(ConfigError::Validation(
                "Cache must hold at least one schema set".to_string(),
            ));
        }

        for entry in &config.schemas.locations {
            if entry.namespace.trim().is_empty() || entry.location.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Schema location needs both a namespace and a location: {entry:?}"
                )));
            }
        }

        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        if config.files.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "At least one file extension must be specified".to_string(),
            ));
        }

        for ext in &config.files.extensions {
            if ext.contains('/') || ext.contains('\\') || ext.contains('.') {
                return Err(ConfigError::Validation(format!(
                    "Invalid file extension: {ext}"
                )));
            }
        }

        Ok(())
    }

    pub fn get_thread_count(config: &Config) -> usize {
        config.validation.threads.unwrap_or_else(num_cpus::get)
    }

    pub fn get_timeout_duration(config: &Config) -> Duration {
        Duration::from_secs(config.validation.timeout_seconds)
    }

    /// Session defaults derived from the validation section.
    pub fn validation_options(config: &Config) -> ValidationOptions {
        ValidationOptions {
            root_paths: config.validation.root_paths.clone(),
            ignore_unknown_namespaces: config.validation.ignore_unknown_namespaces,
            full_schema_checking: config.validation.full_schema_checking,
            max_namespace_warnings: config.validation.max_namespace_warnings,
        }
    }
}

fn parse_env<T: FromStr>(env: &impl EnvProvider, key: &str) -> Result<Option<T>> {
    match env.get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Environment(format!("Invalid {key} value: {value}"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    /// Mock environment variable provider for testing
    #[derive(Default)]
    struct MockEnvProvider {
        vars: HashMap<String, String>,
    }

    impl MockEnvProvider {
        fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
            self.vars.insert(key.into(), value.into());
        }
    }

    impl EnvProvider for MockEnvProvider {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).cloned()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.validation.threads, None);
        assert!(!config.validation.fail_fast);
        assert!(config.validation.root_paths.is_empty());
        assert_eq!(config.validation.max_namespace_warnings, 100);
        assert_eq!(config.validation.timeout_seconds, 30);
        assert_eq!(config.cache.max_entries, None);
        assert!(config.schemas.is_empty());
        assert_eq!(config.output.format, OutputFormatConfig::Human);
        assert_eq!(config.files.extensions, vec!["xml"]);
        assert!(ConfigManager::validate_config(&config).is_ok());
    }

    #[tokio::test]
    async fn test_load_toml_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("xsdgate.toml");
        let toml_content = r#"
[validation]
threads = 8
fail_fast = true
root_paths = ["Envelope/Header", "Envelope/Body"]
ignore_unknown_namespaces = true
max_namespace_warnings = 10

[cache]
max_entries = 64

[schemas]
files = ["envelope.xsd", "body.xsd"]

[[schemas.locations]]
namespace = "urn:common"
location = "common.xsd"

[output]
format = "json"

[files]
extensions = ["xml", "cmdi"]
exclude_patterns = ["**/tmp/**"]
"#;
        fs::write(&config_path, toml_content).unwrap();

        let config = ConfigManager::load_from_file(&config_path).await.unwrap();

        assert_eq!(config.validation.threads, Some(8));
        assert!(config.validation.fail_fast);
        assert_eq!(config.validation.root_paths.len(), 2);
        assert_eq!(config.validation.root_paths[1].to_string(), "Envelope/Body");
        assert!(config.validation.ignore_unknown_namespaces);
        assert!(!config.validation.full_schema_checking);
        assert_eq!(config.validation.max_namespace_warnings, 10);
        assert_eq!(config.validation.timeout_seconds, 30);
        assert_eq!(config.cache.max_entries, Some(64));
        assert_eq!(
            config.schemas.files,
            vec![PathBuf::from("envelope.xsd"), PathBuf::from("body.xsd")]
        );
        assert_eq!(
            config.schemas.location_pairs(),
            vec![("urn:common".to_string(), "common.xsd".to_string())]
        );
        assert_eq!(config.output.format, OutputFormatConfig::Json);
        assert_eq!(config.files.extensions, vec!["xml", "cmdi"]);
    }

    #[tokio::test]
    async fn test_load_json_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("xsdgate.json");
        let json_content = r#"{
  "validation": { "full_schema_checking": true, "timeout_seconds": 5 },
  "output": { "format": "summary", "quiet": true }
}"#;
        fs::write(&config_path, json_content).unwrap();

        let config = ConfigManager::load_from_file(&config_path).await.unwrap();
        assert!(config.validation.full_schema_checking);
        assert_eq!(config.validation.timeout_seconds, 5);
        assert_eq!(config.output.format, OutputFormatConfig::Summary);
        assert!(config.output.quiet);
        assert_eq!(config.files.extensions, vec!["xml"]);
    }

    #[tokio::test]
    async fn test_unsupported_file_format() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "validation: {}").unwrap();

        let result = ConfigManager::load_from_file(&config_path).await;
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[tokio::test]
    async fn test_invalid_root_path_in_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("xsdgate.toml");
        fs::write(&config_path, "[validation]\nroot_paths = [\"Envelope//Body\"]\n").unwrap();

        let result = ConfigManager::load_from_file(&config_path).await;
        assert!(matches!(result, Err(ConfigError::TomlParsing(_))));
    }

    #[test]
    fn test_environment_overrides() {
        let mut env = MockEnvProvider::default();
        env.set("XSDGATE_THREADS", "16");
        env.set("XSDGATE_FAIL_FAST", "true");
        env.set("XSDGATE_ROOT_PATHS", "Order, Envelope/Body");
        env.set("XSDGATE_MAX_NAMESPACE_WARNINGS", "7");
        env.set("XSDGATE_CACHE_ENTRIES", "32");
        env.set("XSDGATE_SCHEMAS", "a.xsd,b.xsd");
        env.set("XSDGATE_FORMAT", "JSON");
        env.set("XSDGATE_EXTENSIONS", "xml,cmdi");

        let config =
            ConfigManager::apply_environment_overrides_with(&env, Config::default()).unwrap();

        assert_eq!(config.validation.threads, Some(16));
        assert!(config.validation.fail_fast);
        assert_eq!(config.validation.root_paths.len(), 2);
        assert_eq!(config.validation.max_namespace_warnings, 7);
        assert_eq!(config.cache.max_entries, Some(32));
        assert_eq!(config.schemas.files.len(), 2);
        assert_eq!(config.output.format, OutputFormatConfig::Json);
        assert_eq!(config.files.extensions, vec!["xml", "cmdi"]);
    }

    #[test]
    fn test_invalid_environment_values() {
        for (key, value) in [
            ("XSDGATE_THREADS", "many"),
            ("XSDGATE_FAIL_FAST", "yes please"),
            ("XSDGATE_ROOT_PATHS", "Envelope//Body"),
            ("XSDGATE_FORMAT", "xml"),
        ] {
            let mut env = MockEnvProvider::default();
            env.set(key, value);
            let result = ConfigManager::apply_environment_overrides_with(&env, Config::default());
            assert!(
                matches!(result, Err(ConfigError::Environment(_))),
                "{key}={value} should be rejected"
            );
        }
    }

    #[test]
    fn test_merge_with_cli_keeps_unset_values() {
        let mut config = Config::default();
        config.validation.threads = Some(4);
        config.validation.fail_fast = true;
        config.validation.timeout_seconds = 90;
        config.schemas.files = vec![PathBuf::from("from-file.xsd")];

        let cli = Cli::try_parse_from(["xsdgate", "docs"]).unwrap();
        let merged = ConfigManager::merge_with_cli(config.clone(), &cli);
        assert_eq!(merged, config);
    }

    #[test]
    fn test_merge_with_cli_overrides() {
        let cli = Cli::try_parse_from([
            "xsdgate",
            "--threads",
            "12",
            "--verbose",
            "--timeout",
            "90",
            "--schema",
            "order.xsd",
            "--root",
            "Order",
            "--full-checking",
            "--cache-entries",
            "3",
            "--extensions",
            "xml,xsd",
            "--format",
            "summary",
            "docs",
        ])
        .unwrap();

        let config = ConfigManager::merge_with_cli(Config::default(), &cli);

        assert_eq!(config.validation.threads, Some(12));
        assert!(config.output.verbose);
        assert_eq!(config.validation.timeout_seconds, 90);
        assert_eq!(config.schemas.files, vec![PathBuf::from("order.xsd")]);
        assert_eq!(config.validation.root_paths[0].to_string(), "Order");
        assert!(config.validation.full_schema_checking);
        assert_eq!(config.cache.max_entries, Some(3));
        assert_eq!(config.files.extensions, vec!["xml", "xsd"]);
        assert_eq!(config.output.format, OutputFormatConfig::Summary);
    }

    #[test]
    fn test_merge_configs() {
        let mut base = Config::default();
        base.validation.threads = Some(4);
        base.cache.max_entries = Some(10);
        base.schemas.files = vec![PathBuf::from("base.xsd")];

        let mut override_config = Config::default();
        override_config.validation.threads = Some(8);
        override_config.validation.max_namespace_warnings = 3;

        let merged = ConfigManager::merge_configs(base, override_config);

        assert_eq!(merged.validation.threads, Some(8));
        assert_eq!(merged.validation.max_namespace_warnings, 3);
        assert_eq!(merged.cache.max_entries, Some(10));
        assert_eq!(merged.schemas.files, vec![PathBuf::from("base.xsd")]);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(ConfigManager::validate_config(&config).is_ok());

        config.validation.threads = Some(0);
        assert!(ConfigManager::validate_config(&config).is_err());
        config.validation.threads = Some(1001);
        assert!(ConfigManager::validate_config(&config).is_err());
        config.validation.threads = Some(4);

        config.validation.max_namespace_warnings = 0;
        assert!(ConfigManager::validate_config(&config).is_err());
        config.validation.max_namespace_warnings = 100;

        config.validation.timeout_seconds = 0;
        assert!(ConfigManager::validate_config(&config).is_err());
        config.validation.timeout_seconds = 30;

        config.cache.max_entries = Some(0);
        assert!(ConfigManager::validate_config(&config).is_err());
        config.cache.max_entries = None;

        config.output.verbose = true;
        config.output.quiet = true;
        assert!(ConfigManager::validate_config(&config).is_err());
        config.output.quiet = false;

        config.files.extensions = vec![];
        assert!(ConfigManager::validate_config(&config).is_err());
        config.files.extensions = vec!["invalid/ext".to_string()];
        assert!(ConfigManager::validate_config(&config).is_err());
    }

    #[test]
    fn test_utility_functions() {
        let mut config = Config::default();
        assert!(ConfigManager::get_thread_count(&config) >= 1);
        assert_eq!(
            ConfigManager::get_timeout_duration(&config),
            Duration::from_secs(30)
        );

        config.validation.root_paths = vec!["Order".parse().unwrap()];
        config.validation.ignore_unknown_namespaces = true;
        let options = ConfigManager::validation_options(&config);
        assert_eq!(options.root_paths.len(), 1);
        assert!(options.ignore_unknown_namespaces);
        assert_eq!(options.max_namespace_warnings, 100);
    }

    #[tokio::test]
    async fn test_load_config_precedence() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        fs::write(
            &config_path,
            "[validation]\nthreads = 6\nfail_fast = true\ntimeout_seconds = 45\n",
        )
        .unwrap();

        let mut env = MockEnvProvider::default();
        env.set("XSDGATE_TIMEOUT", "50");

        let cli = Cli::try_parse_from([
            "xsdgate",
            "--config",
            config_path.to_str().unwrap(),
            "--threads",
            "8",
            temp_dir.path().to_str().unwrap(),
        ])
        .unwrap();
        let config = ConfigManager::load_config_with(&env, &cli).await.unwrap();

        assert_eq!(config.validation.threads, Some(8));
        assert!(config.validation.fail_fast);
        assert_eq!(config.validation.timeout_seconds, 50);
    }
}
