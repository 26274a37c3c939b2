use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use ignore::overrides::{Override, OverrideBuilder};
use tracing::warn;

use crate::error::{Result, ValidationError};

/// Finds the documents of a batch.
///
/// Directories are walked with `ignore` on the blocking pool. Include and
/// exclude patterns use gitignore glob syntax relative to the walked root.
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    /// File extensions to include (e.g., ["xml"])
    extensions: Vec<String>,
    include_patterns: Vec<String>,
    exclude_patterns: Vec<String>,
    /// Maximum depth below the root directory (None = unlimited)
    max_depth: Option<usize>,
    follow_symlinks: bool,
}

impl FileDiscovery {
    pub fn new() -> Self {
        Self {
            extensions: vec!["xml".to_string()],
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            max_depth: None,
            follow_symlinks: false,
        }
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions
            .into_iter()
            .map(|extension| extension.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    /// Only files matching at least one pattern are kept.
    pub fn with_include_patterns(mut self, patterns: Vec<String>) -> Result<Self> {
        build_overrides(Path::new("."), &patterns, &[])?;
        self.include_patterns = patterns;
        Ok(self)
    }

    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Result<Self> {
        build_overrides(Path::new("."), &[], &patterns)?;
        self.exclude_patterns = patterns;
        Ok(self)
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Matching files under `path` (or `path` itself when it is a file),
    /// sorted.
    pub async fn discover_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        Ok(self.discover(path).await?.0)
    }

    pub async fn get_discovery_stats(&self, root: &Path) -> Result<DiscoveryStats> {
        let (files, errors) = self.discover(root).await?;
        Ok(DiscoveryStats {
            files_found: files.len(),
            errors,
        })
    }

    async fn discover(&self, path: &Path) -> Result<(Vec<PathBuf>, usize)> {
        let metadata = tokio::fs::metadata(path).await?;

        if metadata.is_file() {
            let files = if self.should_process(path) {
                vec![path.to_path_buf()]
            } else {
                Vec::new()
            };
            return Ok((files, 0));
        }

        let discovery = self.clone();
        let root = path.to_path_buf();
        tokio::task::spawn_blocking(move || discovery.walk(&root))
            .await
            .map_err(|e| ValidationError::Concurrency {
                details: format!("File discovery task failed: {e}"),
            })?
    }

    fn walk(&self, root: &Path) -> Result<(Vec<PathBuf>, usize)> {
        let overrides = build_overrides(root, &self.include_patterns, &self.exclude_patterns)?;

        let mut builder = WalkBuilder::new(root);
        builder
            .standard_filters(false)
            .follow_links(self.follow_symlinks)
            .overrides(overrides.clone())
            .max_depth(self.max_depth.map(|depth| depth + 1));

        let mut files = Vec::new();
        let mut errors = 0;
        for entry in builder.build() {
            match entry {
                Ok(entry) => {
                    let is_file = entry.file_type().is_some_and(|kind| kind.is_file());
                    if is_file && self.accepts(entry.path(), &overrides) {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => {
                    errors += 1;
                    warn!(root = %root.display(), error = %e, "skipping unreadable entry");
                }
            }
        }

        files.sort();
        Ok((files, errors))
    }

    /// Whether a single file passes the extension and pattern filters.
    pub fn should_process(&self, path: &Path) -> bool {
        match build_overrides(Path::new("."), &self.include_patterns, &self.exclude_patterns) {
            Ok(overrides) => self.accepts(path, &overrides),
            Err(_) => false,
        }
    }

    fn accepts(&self, path: &Path, overrides: &Override) -> bool {
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        if !self.extensions.contains(&extension.to_lowercase()) {
            return false;
        }
        !overrides.matched(path, false).is_ignore()
    }
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

/// Includes become whitelist globs and excludes negated globs; the later
/// excludes win over includes.
fn build_overrides(root: &Path, includes: &[String], excludes: &[String]) -> Result<Override> {
    let mut builder = OverrideBuilder::new(root);
    for pattern in includes {
        builder.add(pattern).map_err(|e| {
            ValidationError::Config(format!("Invalid glob pattern '{pattern}': {e}"))
        })?;
    }
    for pattern in excludes {
        builder.add(&format!("!{pattern}")).map_err(|e| {
            ValidationError::Config(format!("Invalid glob pattern '{pattern}': {e}"))
        })?;
    }
    builder
        .build()
        .map_err(|e| ValidationError::Config(format!("Failed to build glob set: {e}")))
}

#[derive(Debug, Default, Clone)]
pub struct DiscoveryStats {
    pub files_found: usize,
    pub errors: usize,
}
