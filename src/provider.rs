//! Where schema sets come from.
//!
//! A [`SchemaProvider`] names the schema set a document is validated against
//! (its [`SchemaSetIdentity`]) and hands out the [`SchemaSource`]s to compile
//! when that identity is not cached yet.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::error::{SchemaError, SchemaResult};
use crate::grammar::SchemaSetIdentity;
use crate::validator::{DOCUMENT_PATH_PROPERTY, ValidationContext};

/// One schema document: an optional namespace hint, the system id used to
/// resolve relative `include`/`import` locations, and optionally its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSource {
    pub namespace: Option<String>,
    pub system_id: String,
    content: Option<Arc<str>>,
}

impl SchemaSource {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            namespace: None,
            system_id: path.as_ref().to_string_lossy().into_owned(),
            content: None,
        }
    }

    pub fn from_string(system_id: impl Into<String>, content: impl Into<Arc<str>>) -> Self {
        Self {
            namespace: None,
            system_id: system_id.into(),
            content: Some(content.into()),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Content of the source, reading it from disk when it was built from a
    /// path.
    pub fn load(&self) -> SchemaResult<Arc<str>> {
        if let Some(content) = &self.content {
            return Ok(Arc::clone(content));
        }

        let location = self
            .system_id
            .strip_prefix("file://")
            .unwrap_or(&self.system_id);
        if location.contains("://") {
            return Err(SchemaError::Unsupported {
                system_id: self.system_id.clone(),
                details: "remote schema retrieval is not supported".to_string(),
            });
        }

        std::fs::read_to_string(location)
            .map(Arc::from)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => SchemaError::SourceNotFound {
                    system_id: self.system_id.clone(),
                },
                io::ErrorKind::InvalidData => SchemaError::Unreadable {
                    system_id: self.system_id.clone(),
                    details: "schema content is not valid UTF-8".to_string(),
                },
                _ => SchemaError::Unreadable {
                    system_id: self.system_id.clone(),
                    details: e.to_string(),
                },
            })
    }
}

/// Supplies schema sets. Static providers know their identity up front and
/// get compiled when the validator is configured; dynamic ones pick a set per
/// document.
#[cfg_attr(test, mockall::automock)]
pub trait SchemaProvider: Send + Sync {
    /// Identity known without looking at any document.
    fn schema_set_identity(&self) -> Option<SchemaSetIdentity>;

    /// Sources of the static identity.
    fn schema_sources(&self) -> SchemaResult<Vec<SchemaSource>>;

    fn schema_set_identity_for(
        &self,
        input: &[u8],
        context: &ValidationContext,
    ) -> SchemaResult<SchemaSetIdentity>;

    fn schema_sources_for(
        &self,
        input: &[u8],
        context: &ValidationContext,
    ) -> SchemaResult<Vec<SchemaSource>>;
}

/// Fixed, ordered schema files plus explicit namespace/location pairs.
#[derive(Debug, Clone)]
pub struct StaticSchemaProvider {
    identity: SchemaSetIdentity,
    sources: Vec<SchemaSource>,
}

impl StaticSchemaProvider {
    pub fn new(files: &[PathBuf], locations: &[(String, String)]) -> SchemaResult<Self> {
        let mut sources: Vec<SchemaSource> = files.iter().map(SchemaSource::from_path).collect();
        sources.extend(
            locations
                .iter()
                .map(|(namespace, location)| SchemaSource::from_path(location).with_namespace(namespace)),
        );
        Self::from_sources(sources)
    }

    /// The identity is derived from the system ids and namespaces, in order.
    pub fn from_sources(sources: Vec<SchemaSource>) -> SchemaResult<Self> {
        let identity = identity_of(&sources);
        if sources.is_empty() {
            return Err(SchemaError::NoSources {
                identity: identity.to_string(),
            });
        }
        Ok(Self { identity, sources })
    }

    pub fn identity(&self) -> &SchemaSetIdentity {
        &self.identity
    }
}

impl SchemaProvider for StaticSchemaProvider {
    fn schema_set_identity(&self) -> Option<SchemaSetIdentity> {
        Some(self.identity.clone())
    }

    fn schema_sources(&self) -> SchemaResult<Vec<SchemaSource>> {
        Ok(self.sources.clone())
    }

    fn schema_set_identity_for(
        &self,
        _input: &[u8],
        _context: &ValidationContext,
    ) -> SchemaResult<SchemaSetIdentity> {
        Ok(self.identity.clone())
    }

    fn schema_sources_for(
        &self,
        _input: &[u8],
        _context: &ValidationContext,
    ) -> SchemaResult<Vec<SchemaSource>> {
        Ok(self.sources.clone())
    }
}

/// Reads a comma separated list of schema locations from a named context
/// property.
#[derive(Debug, Clone)]
pub struct ContextSchemaProvider {
    property: String,
    base_dir: Option<PathBuf>,
}

impl ContextSchemaProvider {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            base_dir: None,
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    fn locations(&self, context: &ValidationContext) -> SchemaResult<Vec<String>> {
        let value = context.property(&self.property).unwrap_or_default();
        let locations: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|location| !location.is_empty())
            .map(|location| resolve_against(self.base_dir.as_deref(), location))
            .collect();
        if locations.is_empty() {
            return Err(SchemaError::NoSources {
                identity: format!("context property '{}'", self.property),
            });
        }
        Ok(locations)
    }
}

impl SchemaProvider for ContextSchemaProvider {
    fn schema_set_identity(&self) -> Option<SchemaSetIdentity> {
        None
    }

    fn schema_sources(&self) -> SchemaResult<Vec<SchemaSource>> {
        Err(SchemaError::NoSources {
            identity: format!("context property '{}'", self.property),
        })
    }

    fn schema_set_identity_for(
        &self,
        _input: &[u8],
        context: &ValidationContext,
    ) -> SchemaResult<SchemaSetIdentity> {
        Ok(SchemaSetIdentity::new(self.locations(context)?.join(",")))
    }

    fn schema_sources_for(
        &self,
        _input: &[u8],
        context: &ValidationContext,
    ) -> SchemaResult<Vec<SchemaSource>> {
        Ok(self
            .locations(context)?
            .iter()
            .map(SchemaSource::from_path)
            .collect())
    }
}

static SCHEMA_LOCATION_REGEX: OnceLock<Regex> = OnceLock::new();
static NO_NAMESPACE_REGEX: OnceLock<Regex> = OnceLock::new();

fn schema_location_regex() -> &'static Regex {
    SCHEMA_LOCATION_REGEX.get_or_init(|| {
        Regex::new(r#"[\w.-]+:schemaLocation\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("Failed to compile schemaLocation regex")
    })
}

fn no_namespace_regex() -> &'static Regex {
    NO_NAMESPACE_REGEX.get_or_init(|| {
        Regex::new(r#"[\w.-]+:noNamespaceSchemaLocation\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("Failed to compile noNamespaceSchemaLocation regex")
    })
}

/// Only the prolog and the root start tag are scanned for hints.
const HINT_SCAN_LIMIT: usize = 16 * 1024;

/// Picks the schema set from the document's `xsi:schemaLocation` and
/// `xsi:noNamespaceSchemaLocation` hints.
#[derive(Debug, Clone, Default)]
pub struct SchemaLocationProvider {
    base_dir: Option<PathBuf>,
}

impl SchemaLocationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative hints are resolved against this directory, normally the one
    /// holding the validated document.
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// `(namespace, location)` pairs in document order; the empty namespace
    /// stands for `noNamespaceSchemaLocation`.
    pub fn extract_hints(&self, input: &[u8]) -> Vec<(String, String)> {
        let head = &input[..input.len().min(HINT_SCAN_LIMIT)];
        let head = String::from_utf8_lossy(head);
        let root_tag = root_start_tag(&head);

        let mut hints = Vec::new();
        for caps in schema_location_regex().captures_iter(root_tag) {
            let value = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            let tokens: Vec<&str> = value.split_whitespace().collect();
            for pair in tokens.chunks_exact(2) {
                hints.push((pair[0].to_string(), pair[1].to_string()));
            }
        }
        for caps in no_namespace_regex().captures_iter(root_tag) {
            if let Some(location) = caps.get(1).or_else(|| caps.get(2)) {
                let location = location.as_str().trim();
                if !location.is_empty() {
                    hints.push((String::new(), location.to_string()));
                }
            }
        }
        hints
    }

    /// Hints resolve against the directory of the document named by
    /// [`DOCUMENT_PATH_PROPERTY`], falling back to the configured base.
    fn hinted_sources(
        &self,
        input: &[u8],
        context: &ValidationContext,
    ) -> SchemaResult<Vec<SchemaSource>> {
        let document_dir = context
            .property(DOCUMENT_PATH_PROPERTY)
            .map(Path::new)
            .and_then(Path::parent)
            .filter(|dir| !dir.as_os_str().is_empty());
        let base_dir = document_dir.or(self.base_dir.as_deref());

        let sources: Vec<SchemaSource> = self
            .extract_hints(input)
            .into_iter()
            .map(|(namespace, location)| {
                let source = SchemaSource::from_path(resolve_against(base_dir, &location));
                if namespace.is_empty() {
                    source
                } else {
                    source.with_namespace(namespace)
                }
            })
            .collect();
        if sources.is_empty() {
            return Err(SchemaError::NoSources {
                identity: "document without schema location hints".to_string(),
            });
        }
        Ok(sources)
    }
}

impl SchemaProvider for SchemaLocationProvider {
    fn schema_set_identity(&self) -> Option<SchemaSetIdentity> {
        None
    }

    fn schema_sources(&self) -> SchemaResult<Vec<SchemaSource>> {
        Err(SchemaError::NoSources {
            identity: "schema location hints".to_string(),
        })
    }

    fn schema_set_identity_for(
        &self,
        input: &[u8],
        context: &ValidationContext,
    ) -> SchemaResult<SchemaSetIdentity> {
        Ok(identity_of(&self.hinted_sources(input, context)?))
    }

    fn schema_sources_for(
        &self,
        input: &[u8],
        context: &ValidationContext,
    ) -> SchemaResult<Vec<SchemaSource>> {
        self.hinted_sources(input, context)
    }
}

/// Text of the first start tag that is not part of the prolog.
fn root_start_tag(head: &str) -> &str {
    let mut rest = head;
    let mut offset = 0;
    while let Some(open) = rest.find('<') {
        let tail = &rest[open..];
        let skip_to = if tail.starts_with("<?") {
            tail.find("?>").map(|end| end + 2)
        } else if tail.starts_with("<!--") {
            tail.find("-->").map(|end| end + 3)
        } else if tail.starts_with("<!") {
            tail.find('>').map(|end| end + 1)
        } else {
            let end = tail.find('>').map_or(tail.len(), |end| end + 1);
            let start = offset + open;
            return &head[start..start + end];
        };
        match skip_to {
            Some(skip) => {
                offset += open + skip;
                rest = &head[offset..];
            }
            None => break,
        }
    }
    ""
}

fn resolve_against(base_dir: Option<&Path>, location: &str) -> String {
    if location.contains("://") || Path::new(location).is_absolute() {
        return location.to_string();
    }
    match base_dir {
        Some(base) => base.join(location).to_string_lossy().into_owned(),
        None => location.to_string(),
    }
}

fn identity_of(sources: &[SchemaSource]) -> SchemaSetIdentity {
    let parts: Vec<String> = sources
        .iter()
        .map(|source| match &source.namespace {
            Some(namespace) => format!("{namespace}={}", source.system_id),
            None => source.system_id.clone(),
        })
        .collect();
    SchemaSetIdentity::new(parts.join(";"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    const INSTANCE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- order export -->
<ex:Order xmlns:ex="urn:ex"
          xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
          xsi:schemaLocation="urn:ex order.xsd  urn:common common.xsd">
  <ex:Id>1</ex:Id>
</ex:Order>"#;

    #[test]
    fn test_source_from_string_loads_without_io() {
        let source = SchemaSource::from_string("inline.xsd", "<xs:schema/>");
        assert_eq!(&*source.load().unwrap(), "<xs:schema/>");
        assert_eq!(source.content(), Some("<xs:schema/>"));
    }

    #[test]
    fn test_source_from_path_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "<xs:schema/>").unwrap();
        file.flush().unwrap();

        let source = SchemaSource::from_path(file.path());
        assert!(source.content().is_none());
        assert_eq!(&*source.load().unwrap(), "<xs:schema/>");
    }

    #[test]
    fn test_missing_source_is_not_found() {
        let source = SchemaSource::from_path("/nonexistent/schema.xsd");
        assert_eq!(
            source.load().unwrap_err(),
            SchemaError::SourceNotFound {
                system_id: "/nonexistent/schema.xsd".to_string()
            }
        );
    }

    #[test]
    fn test_remote_source_is_unsupported() {
        let source = SchemaSource::from_path("https://example.com/schema.xsd");
        assert!(matches!(source.load(), Err(SchemaError::Unsupported { .. })));
    }

    #[test]
    fn test_static_provider_identity() {
        let provider = StaticSchemaProvider::new(
            &[PathBuf::from("order.xsd")],
            &[("urn:common".to_string(), "common.xsd".to_string())],
        )
        .unwrap();
        assert_eq!(
            provider.schema_set_identity().unwrap().as_str(),
            "order.xsd;urn:common=common.xsd"
        );
        let sources = provider.schema_sources().unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].namespace.as_deref(), Some("urn:common"));

        let context = ValidationContext::default();
        assert_eq!(
            provider.schema_set_identity_for(b"<a/>", &context).unwrap(),
            provider.schema_set_identity().unwrap()
        );
    }

    #[test]
    fn test_static_provider_requires_sources() {
        assert!(matches!(
            StaticSchemaProvider::new(&[], &[]),
            Err(SchemaError::NoSources { .. })
        ));
    }

    #[test]
    fn test_context_provider_reads_property() {
        let provider = ContextSchemaProvider::new("schema").with_base_dir("/schemas");
        let mut context = ValidationContext::default();
        context.set_property("schema", "order.xsd, common.xsd");

        let identity = provider.schema_set_identity_for(b"", &context).unwrap();
        assert_eq!(identity.as_str(), "/schemas/order.xsd,/schemas/common.xsd");
        let sources = provider.schema_sources_for(b"", &context).unwrap();
        assert_eq!(sources.len(), 2);
        assert!(provider.schema_set_identity().is_none());

        let empty = ValidationContext::default();
        assert!(provider.schema_sources_for(b"", &empty).is_err());
    }

    #[test]
    fn test_extract_hints() {
        let provider = SchemaLocationProvider::new();
        let hints = provider.extract_hints(INSTANCE.as_bytes());
        assert_eq!(
            hints,
            vec![
                ("urn:ex".to_string(), "order.xsd".to_string()),
                ("urn:common".to_string(), "common.xsd".to_string()),
            ]
        );
    }

    #[test]
    fn test_extract_no_namespace_hint() {
        let provider = SchemaLocationProvider::new();
        let xml = r#"<root xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:noNamespaceSchemaLocation='plain.xsd'><x/></root>"#;
        assert_eq!(
            provider.extract_hints(xml.as_bytes()),
            vec![(String::new(), "plain.xsd".to_string())]
        );
    }

    #[test]
    fn test_hints_below_root_are_ignored() {
        let provider = SchemaLocationProvider::new();
        let xml = r#"<root><child xsi:noNamespaceSchemaLocation="child.xsd"/></root>"#;
        assert!(provider.extract_hints(xml.as_bytes()).is_empty());
        assert!(provider
            .schema_sources_for(xml.as_bytes(), &ValidationContext::default())
            .is_err());
    }

    #[test]
    fn test_location_provider_resolves_relative_hints() {
        let dir = TempDir::new().unwrap();
        let provider = SchemaLocationProvider::new().with_base_dir(dir.path());
        let sources = provider
            .schema_sources_for(INSTANCE.as_bytes(), &ValidationContext::default())
            .unwrap();
        assert_eq!(sources[0].namespace.as_deref(), Some("urn:ex"));
        assert_eq!(
            PathBuf::from(&sources[0].system_id),
            dir.path().join("order.xsd")
        );

        let identity = provider
            .schema_set_identity_for(INSTANCE.as_bytes(), &ValidationContext::default())
            .unwrap();
        assert!(identity.as_str().starts_with("urn:ex="));
    }

    #[test]
    fn test_location_provider_prefers_document_directory() {
        let provider = SchemaLocationProvider::new().with_base_dir("/etc/schemas");
        let mut context = ValidationContext::default();
        context.set_property(DOCUMENT_PATH_PROPERTY, "/data/in/order.xml");

        let sources = provider
            .schema_sources_for(INSTANCE.as_bytes(), &context)
            .unwrap();
        assert_eq!(
            PathBuf::from(&sources[1].system_id),
            PathBuf::from("/data/in/common.xsd")
        );
    }
}
