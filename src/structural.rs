//! Element-nesting invariants layered on top of grammar validation: root-path
//! cardinality and unknown-namespace detection.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chars::is_ncname;
use crate::diagnostics::{DiagnosticsCollector, Location};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RootPathError {
    #[error("root path must name at least one element")]
    Empty,

    #[error("invalid root path '{path}': segments must not be empty")]
    EmptySegment { path: String },

    #[error("invalid root path '{path}': '{segment}' is not an element name")]
    InvalidName { path: String, segment: String },
}

/// Local names of elements from the document root, e.g. `Envelope/Body`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RootPath(Vec<String>);

impl RootPath {
    pub fn new<I, S>(segments: I) -> Result<Self, RootPathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(RootPathError::Empty);
        }
        let path = || segments.join("/");
        for segment in &segments {
            if segment.trim().is_empty() {
                return Err(RootPathError::EmptySegment { path: path() });
            }
            if !is_ncname(segment) {
                return Err(RootPathError::InvalidName {
                    path: path(),
                    segment: segment.clone(),
                });
            }
        }
        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for RootPath {
    type Err = RootPathError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim().trim_start_matches('/');
        if trimmed.is_empty() {
            return Err(RootPathError::Empty);
        }
        RootPath::new(trimmed.split('/').map(str::trim))
    }
}

impl TryFrom<String> for RootPath {
    type Error = RootPathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RootPath> for String {
    fn from(path: RootPath) -> Self {
        path.to_string()
    }
}

impl fmt::Display for RootPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    AwaitingDocument,
    InDocument,
    DocumentEnded,
}

pub const UNKNOWN_NAMESPACES_SUPPRESSED: &str =
    "Too many unknown namespaces, further warnings suppressed";

pub struct StructuralContentHandler<'b> {
    root_paths: &'b [RootPath],
    observed: Vec<bool>,
    valid_namespaces: &'b HashSet<String>,
    check_namespaces: bool,
    max_namespace_warnings: usize,
    reported_namespaces: HashSet<String>,
    namespace_warnings: usize,
    namespaces_capped: bool,
    root_violations: usize,
    path: Vec<String>,
    state: HandlerState,
}

impl<'b> StructuralContentHandler<'b> {
    pub fn new(
        root_paths: &'b [RootPath],
        valid_namespaces: &'b HashSet<String>,
        ignore_unknown_namespaces: bool,
        max_namespace_warnings: usize,
    ) -> Self {
        Self {
            root_paths,
            observed: vec![false; root_paths.len()],
            valid_namespaces,
            check_namespaces: !ignore_unknown_namespaces,
            max_namespace_warnings,
            reported_namespaces: HashSet::new(),
            namespace_warnings: 0,
            namespaces_capped: false,
            root_violations: 0,
            path: Vec::new(),
            state: HandlerState::AwaitingDocument,
        }
    }

    pub fn state(&self) -> HandlerState {
        self.state
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn xpath(&self) -> String {
        format!("/{}", self.path.join("/"))
    }

    pub fn has_root_violations(&self) -> bool {
        self.root_violations > 0
    }

    pub fn start_element(
        &mut self,
        namespace: &str,
        local: &str,
        location: Option<Location>,
        diagnostics: &mut DiagnosticsCollector,
    ) {
        self.state = HandlerState::InDocument;
        self.path.push(local.to_string());
        self.check_root_paths(local, location, diagnostics);
        if self.check_namespaces && !self.namespaces_capped {
            self.check_namespace(namespace, local, location, diagnostics);
        }
    }

    pub fn end_element(&mut self) {
        self.path.pop();
    }

    pub fn end_document(&mut self, diagnostics: &mut DiagnosticsCollector) {
        for (root_path, observed) in self.root_paths.iter().zip(&self.observed) {
            if !observed {
                self.root_violations += 1;
                diagnostics.error(format!("Element(s) '{root_path}' not found"), None, None);
            }
        }
        self.state = HandlerState::DocumentEnded;
    }

    /// Root paths of the current depth whose ancestors match the open path
    /// are candidates; the new element must be one of them, and each may be
    /// seen once.
    fn check_root_paths(
        &mut self,
        local: &str,
        location: Option<Location>,
        diagnostics: &mut DiagnosticsCollector,
    ) {
        let depth = self.path.len();
        let ancestors = &self.path[..depth - 1];
        let candidates: Vec<usize> = self
            .root_paths
            .iter()
            .enumerate()
            .filter(|(_, root_path)| {
                root_path.len() == depth && root_path.segments()[..depth - 1] == *ancestors
            })
            .map(|(index, _)| index)
            .collect();
        if candidates.is_empty() {
            return;
        }

        let xpath = Some(self.xpath());
        let mut matched = false;
        for &index in &candidates {
            let root_path = &self.root_paths[index];
            if root_path.segments()[depth - 1] != local {
                continue;
            }
            matched = true;
            if self.observed[index] {
                self.root_violations += 1;
                diagnostics.error(
                    format!("Element(s) '{root_path}' should occur only once"),
                    location,
                    xpath.clone(),
                );
            } else {
                self.observed[index] = true;
            }
        }

        if !matched {
            let expected: Vec<&str> = candidates
                .iter()
                .map(|index| self.root_paths[*index].segments()[depth - 1].as_str())
                .collect();
            self.root_violations += 1;
            diagnostics.error(
                format!(
                    "Illegal element '{}'. Element(s) '{}' expected.",
                    local,
                    expected.join(", ")
                ),
                location,
                xpath,
            );
        }
    }

    fn check_namespace(
        &mut self,
        namespace: &str,
        local: &str,
        location: Option<Location>,
        diagnostics: &mut DiagnosticsCollector,
    ) {
        if self.valid_namespaces.contains(namespace) {
            return;
        }
        if !self.reported_namespaces.insert(namespace.to_string()) {
            return;
        }
        if self.namespace_warnings >= self.max_namespace_warnings {
            self.namespaces_capped = true;
            diagnostics.warning(UNKNOWN_NAMESPACES_SUPPRESSED, location, Some(self.xpath()));
            return;
        }
        self.namespace_warnings += 1;
        let message = if namespace.is_empty() {
            format!("Element '{local}' has no namespace, but no schema without a target namespace is loaded")
        } else {
            format!("Unknown namespace '{namespace}' on element '{local}'")
        };
        diagnostics.warning(message, location, Some(self.xpath()));
    }
}
