//! One streaming validation pass.
//!
//! A [`ValidationSession`] borrows a sealed [`GrammarBundle`], tokenizes the
//! input with a namespace-aware reader and checks every element against the
//! grammar pool while the [`StructuralContentHandler`] tracks root paths and
//! unknown namespaces. Everything it finds goes to a [`DiagnosticsCollector`];
//! the verdict is decided once the document ends.

use std::collections::HashSet;
use std::io::{self, BufRead, BufReader, Read};
use std::sync::Arc;

use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{QName as XmlName, ResolveResult};
use tracing::{debug, debug_span};
use uuid::Uuid;

use crate::chars::{first_illegal_char, is_qname};
use crate::content_model::{ElementTerm, Matched, ModelState};
use crate::datatypes::SimpleType;
use crate::diagnostics::{DiagnosticsCollector, Location, ValidationReport};
use crate::grammar::{
    AttributeDecl, ComplexType, ComponentLookup, ContentType, ElementDecl, GrammarBundle,
    GrammarPool, ProcessContents, TypeDefinition, XSI_NAMESPACE,
};
use crate::structural::{RootPath, StructuralContentHandler};
use crate::symbols::{ShadowSymbolTable, Symbol};
use crate::validator::{OutcomeKind, ValidationOutcome};

pub const DEFAULT_MAX_NAMESPACE_WARNINGS: usize = 100;

/// Per-validation switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOptions {
    pub root_paths: Vec<RootPath>,
    pub ignore_unknown_namespaces: bool,
    /// Also report schema-component constraint violations (particle
    /// attribution, element consistency, restriction checks) of the types in
    /// use.
    pub full_schema_checking: bool,
    pub max_namespace_warnings: usize,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            root_paths: Vec::new(),
            ignore_unknown_namespaces: false,
            full_schema_checking: false,
            max_namespace_warnings: DEFAULT_MAX_NAMESPACE_WARNINGS,
        }
    }
}

/// Validate `input` against `bundle`.
pub fn validate<R: Read>(
    bundle: &GrammarBundle,
    input: R,
    options: &ValidationOptions,
) -> ValidationOutcome {
    ValidationSession::new(bundle, options).run(input)
}

/// Byte reader that remembers where lines start so event offsets can be
/// turned into line and column numbers.
struct LineTrackingReader<R> {
    inner: R,
    consumed: u64,
    newlines: Vec<u64>,
}

impl<R: BufRead> LineTrackingReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            consumed: 0,
            newlines: Vec::new(),
        }
    }

    fn location_at(&self, offset: u64) -> Location {
        let line = self.newlines.partition_point(|&newline| newline < offset);
        let line_start = match line {
            0 => 0,
            _ => self.newlines[line - 1] + 1,
        };
        Location {
            line: line as u64 + 1,
            column: offset.saturating_sub(line_start) + 1,
        }
    }
}

impl<R: BufRead> Read for LineTrackingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let count = available.len().min(buf.len());
        buf[..count].copy_from_slice(&available[..count]);
        self.consume(count);
        Ok(count)
    }
}

impl<R: BufRead> BufRead for LineTrackingReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        if let Ok(buffer) = self.inner.fill_buf() {
            let end = amt.min(buffer.len());
            for (index, byte) in buffer[..end].iter().enumerate() {
                if *byte == b'\n' {
                    self.newlines.push(self.consumed + index as u64);
                }
            }
        }
        self.consumed += amt as u64;
        self.inner.consume(amt);
    }
}

type InstanceReader<R> = NsReader<LineTrackingReader<BufReader<R>>>;

fn position<R: Read>(reader: &InstanceReader<R>) -> Location {
    reader.get_ref().location_at(reader.buffer_position() as u64)
}

/// Marker for a fatal parser error that has already been recorded.
struct NotWellFormed;

#[derive(Debug)]
struct InstanceAttribute {
    namespace: String,
    local: String,
    value: String,
}

#[derive(Debug)]
struct XsiType {
    raw: String,
    /// `None` when the prefix of the value is not bound.
    name: Option<(String, String)>,
}

#[derive(Debug)]
struct StartTag {
    namespace: String,
    local: String,
    attributes: Vec<InstanceAttribute>,
    xsi_type: Option<XsiType>,
}

impl StartTag {
    fn attribute(&self, namespace: &str, local: &str) -> Option<&InstanceAttribute> {
        self.attributes
            .iter()
            .find(|attribute| attribute.namespace == namespace && attribute.local == local)
    }
}

/// Where a diagnostic is reported.
struct Site {
    location: Location,
    xpath: String,
}

impl Site {
    fn report(&self, diagnostics: &mut DiagnosticsCollector, message: String) {
        diagnostics.error(message, Some(self.location), Some(self.xpath.clone()));
    }
}

enum Resolution {
    Declared(Arc<ElementDecl>),
    /// Validate against a global declaration if one exists.
    Lax,
    Skip,
}

enum FrameKind {
    Skip,
    Lax,
    Complex {
        ty: Arc<ComplexType>,
        state: ModelState,
        decl: Arc<ElementDecl>,
    },
    Simple {
        ty: Arc<SimpleType>,
        decl: Arc<ElementDecl>,
    },
}

struct Frame {
    local: Symbol,
    kind: FrameKind,
    text: String,
    nil: bool,
    text_reported: bool,
}

impl Frame {
    fn new(local: Symbol, kind: FrameKind) -> Self {
        Self {
            local,
            kind,
            text: String::new(),
            nil: false,
            text_reported: false,
        }
    }
}

fn is_xml_whitespace(text: &str) -> bool {
    text.bytes()
        .all(|byte| matches!(byte, b' ' | b'\t' | b'\r' | b'\n'))
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn quoted(namespace: &str, local: &str) -> String {
    if namespace.is_empty() {
        local.to_string()
    } else {
        format!("\"{namespace}\":{local}")
    }
}

fn lax_lookup(pool: &GrammarPool, namespace: &str, local: &str) -> Resolution {
    match pool.element(namespace, local) {
        Some(decl) => Resolution::Declared(Arc::clone(decl)),
        None => Resolution::Lax,
    }
}

pub struct ValidationSession<'b> {
    id: Uuid,
    bundle: &'b GrammarBundle,
    options: &'b ValidationOptions,
    symbols: ShadowSymbolTable,
    structural: StructuralContentHandler<'b>,
    diagnostics: DiagnosticsCollector,
    frames: Vec<Frame>,
    /// Complex types whose constraint violations were already reported.
    checked_types: HashSet<usize>,
}

impl<'b> ValidationSession<'b> {
    pub fn new(bundle: &'b GrammarBundle, options: &'b ValidationOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            bundle,
            options,
            symbols: ShadowSymbolTable::new(Arc::clone(&bundle.symbols)),
            structural: StructuralContentHandler::new(
                &options.root_paths,
                &bundle.valid_namespaces,
                options.ignore_unknown_namespaces,
                options.max_namespace_warnings,
            ),
            diagnostics: DiagnosticsCollector::new(),
            frames: Vec::new(),
            checked_types: HashSet::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Consume the session, validating `input` to the end or to the first
    /// well-formedness error.
    pub fn run<R: Read>(mut self, input: R) -> ValidationOutcome {
        let span = debug_span!("session", id = %self.id, identity = %self.bundle.identity);
        let _entered = span.enter();

        let mut reader = NsReader::from_reader(LineTrackingReader::new(BufReader::new(input)));
        reader.config_mut().expand_empty_elements = true;

        let well_formed = self.parse(&mut reader).is_ok();
        if well_formed {
            self.structural.end_document(&mut self.diagnostics);
        }
        self.finish(well_formed)
    }

    fn fatal(&mut self, message: impl Into<String>, location: Location) -> NotWellFormed {
        let xpath = (self.structural.depth() > 0).then(|| self.structural.xpath());
        self.diagnostics.fatal(message, Some(location), xpath);
        NotWellFormed
    }

    fn parse<R: Read>(&mut self, reader: &mut InstanceReader<R>) -> Result<(), NotWellFormed> {
        let mut buf = Vec::new();
        let mut depth = 0usize;
        let mut seen_root = false;
        let mut at_start = true;

        loop {
            let event = match reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(e) => {
                    let location = position(reader);
                    return Err(self.fatal(e.to_string(), location));
                }
            };
            let location = position(reader);
            let was_at_start = at_start;
            at_start = at_start && matches!(&event, Event::Text(text) if text.is_empty());

            match event {
                Event::Decl(_) if !was_at_start => {
                    return Err(self.fatal(
                        "The processing instruction target matching \"[xX][mM][lL]\" is not allowed.",
                        location,
                    ));
                }
                Event::PI(pi) if pi.target().eq_ignore_ascii_case(b"xml") => {
                    return Err(self.fatal(
                        "The processing instruction target matching \"[xX][mM][lL]\" is not allowed.",
                        location,
                    ));
                }
                Event::Start(start) => {
                    if seen_root && depth == 0 {
                        return Err(self.fatal(
                            "The markup in the document following the root element must be well-formed.",
                            location,
                        ));
                    }
                    seen_root = true;
                    depth += 1;
                    let tag = self.read_start_tag(reader, &start, location)?;
                    self.start_element(tag, location);
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    self.end_element(location);
                }
                Event::Text(text) => {
                    if text.windows(3).any(|window| window == b"]]>") {
                        return Err(self.fatal(
                            "The character sequence \"]]>\" must not appear in content unless used to mark the end of a CDATA section.",
                            location,
                        ));
                    }
                    let content = text
                        .unescape()
                        .map_err(|e| self.fatal(e.to_string(), location))?;
                    if let Some(c) = first_illegal_char(&content) {
                        let section = if depth > 0 { "element content" } else { "prolog" };
                        return Err(self.fatal(
                            format!(
                                "An invalid XML character (Unicode: 0x{:x}) was found in the {section} of the document.",
                                c as u32
                            ),
                            location,
                        ));
                    }
                    if depth > 0 {
                        self.characters(&content, location);
                    } else if !is_xml_whitespace(&content) {
                        let message = if seen_root {
                            "Content is not allowed in trailing section."
                        } else {
                            "Content is not allowed in prolog."
                        };
                        return Err(self.fatal(message, location));
                    }
                }
                Event::CData(data) => {
                    if depth == 0 {
                        return Err(self.fatal("CDATA is not allowed outside the root element.", location));
                    }
                    let content = String::from_utf8_lossy(&data);
                    if let Some(c) = first_illegal_char(&content) {
                        return Err(self.fatal(
                            format!(
                                "An invalid XML character (Unicode: 0x{:x}) was found in the CDATA section.",
                                c as u32
                            ),
                            location,
                        ));
                    }
                    self.characters(&content, location);
                }
                Event::Comment(comment) => {
                    if let Some(c) = first_illegal_char(&String::from_utf8_lossy(&comment)) {
                        return Err(self.fatal(
                            format!(
                                "An invalid XML character (Unicode: 0x{:x}) was found in the comment.",
                                c as u32
                            ),
                            location,
                        ));
                    }
                }
                Event::Eof => {
                    if depth > 0 {
                        return Err(self.fatal(
                            "XML document structures must start and end within the same entity.",
                            location,
                        ));
                    }
                    if !seen_root {
                        return Err(self.fatal("Premature end of file.", location));
                    }
                    return Ok(());
                }
                _ => {}
            }
            buf.clear();
        }
    }

    fn read_start_tag<R: Read>(
        &mut self,
        reader: &InstanceReader<R>,
        start: &BytesStart<'_>,
        location: Location,
    ) -> Result<StartTag, NotWellFormed> {
        let element_name = lossy(start.name().as_ref());
        if !is_qname(&element_name) {
            return Err(self.fatal(
                format!("Element type \"{element_name}\" is not a legal XML name."),
                location,
            ));
        }
        let (resolved, local) = reader.resolve_element(start.name());
        let namespace = match resolved {
            ResolveResult::Bound(namespace) => lossy(namespace.as_ref()),
            ResolveResult::Unbound => String::new(),
            ResolveResult::Unknown(prefix) => {
                return Err(self.fatal(
                    format!(
                        "The prefix \"{}\" for element \"{}\" is not bound.",
                        lossy(&prefix),
                        element_name
                    ),
                    location,
                ));
            }
        };
        let local = lossy(local.as_ref());

        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| self.fatal(e.to_string(), location))?;
            let key = attribute.key.as_ref();
            if !is_qname(&lossy(key)) {
                return Err(self.fatal(
                    format!(
                        "Attribute name \"{}\" associated with an element type \"{}\" is not a legal XML name.",
                        lossy(key),
                        element_name
                    ),
                    location,
                ));
            }
            if key == b"xmlns" || key.starts_with(b"xmlns:") {
                continue;
            }
            let (resolved, attribute_local) = reader.resolve_attribute(attribute.key);
            let attribute_namespace = match resolved {
                ResolveResult::Bound(namespace) => lossy(namespace.as_ref()),
                ResolveResult::Unbound => String::new(),
                ResolveResult::Unknown(prefix) => {
                    return Err(self.fatal(
                        format!(
                            "The prefix \"{}\" for attribute \"{}\" associated with an element type \"{}\" is not bound.",
                            lossy(&prefix),
                            lossy(key),
                            element_name
                        ),
                        location,
                    ));
                }
            };
            let value = attribute
                .unescape_value()
                .map_err(|e| self.fatal(e.to_string(), location))?
                .into_owned();
            if let Some(c) = first_illegal_char(&value) {
                return Err(self.fatal(
                    format!(
                        "An invalid XML character (Unicode: 0x{:x}) was found in the value of attribute \"{}\" and element is \"{}\".",
                        c as u32,
                        lossy(key),
                        element_name
                    ),
                    location,
                ));
            }
            attributes.push(InstanceAttribute {
                namespace: attribute_namespace,
                local: lossy(attribute_local.as_ref()),
                value,
            });
        }

        let xsi_type = attributes
            .iter()
            .find(|attribute| attribute.namespace == XSI_NAMESPACE && attribute.local == "type")
            .map(|attribute| {
                let raw = attribute.value.trim().to_string();
                let (resolved, type_local) = reader.resolve_element(XmlName(raw.as_bytes()));
                let type_namespace = match resolved {
                    ResolveResult::Bound(namespace) => Some(lossy(namespace.as_ref())),
                    ResolveResult::Unbound => Some(String::new()),
                    ResolveResult::Unknown(_) => None,
                };
                let name = type_namespace.map(|namespace| (namespace, lossy(type_local.as_ref())));
                XsiType { raw, name }
            });

        Ok(StartTag {
            namespace,
            local,
            attributes,
            xsi_type,
        })
    }

    fn start_element(&mut self, tag: StartTag, location: Location) {
        let namespace = self.symbols.intern(&tag.namespace);
        let local = self.symbols.intern(&tag.local);

        self.structural
            .start_element(&namespace, &local, Some(location), &mut self.diagnostics);
        let site = Site {
            location,
            xpath: self.structural.xpath(),
        };

        let resolution = self.resolve_child(&namespace, &local, &site);
        let frame = self.open_frame(resolution, local, &tag, &site);
        self.frames.push(frame);
    }

    /// Find the declaration governing a new element from its parent's state.
    fn resolve_child(&mut self, namespace: &str, local: &str, site: &Site) -> Resolution {
        let bundle = self.bundle;
        let pool: &GrammarPool = &bundle.pool;
        let diagnostics = &mut self.diagnostics;

        let Some(parent) = self.frames.last_mut() else {
            return match pool.element(namespace, local) {
                Some(decl) => Resolution::Declared(Arc::clone(decl)),
                None => {
                    site.report(
                        diagnostics,
                        format!("cvc-elt.1.a: Cannot find the declaration of element '{local}'."),
                    );
                    Resolution::Lax
                }
            };
        };

        if parent.nil {
            site.report(
                diagnostics,
                format!(
                    "cvc-elt.3.2.1: Element '{}' cannot have character or element information [children], because 'xsi:nil' is specified.",
                    parent.local
                ),
            );
            return Resolution::Skip;
        }

        let parent_name = Arc::clone(&parent.local);
        match &mut parent.kind {
            FrameKind::Skip => Resolution::Skip,
            FrameKind::Lax => lax_lookup(pool, namespace, local),
            FrameKind::Simple { .. } => {
                site.report(
                    diagnostics,
                    format!(
                        "cvc-type.3.1.2: Element '{parent_name}' is a simple type, so it must have no element information item [children]."
                    ),
                );
                Resolution::Skip
            }
            FrameKind::Complex { ty, state, .. } => match &ty.content {
                ContentType::Empty => {
                    site.report(
                        diagnostics,
                        format!(
                            "cvc-complex-type.2.1: Element '{parent_name}' must have no character or element information item [children], because the type's content type is empty."
                        ),
                    );
                    Resolution::Skip
                }
                ContentType::Simple(_) => {
                    site.report(
                        diagnostics,
                        format!(
                            "cvc-complex-type.2.2: Element '{parent_name}' must have no element [children], and the value must be valid."
                        ),
                    );
                    Resolution::Skip
                }
                ContentType::ElementOnly(model) | ContentType::Mixed(model) => {
                    match model.step(state, namespace, local) {
                        Some(Matched::Element(ElementTerm::Local(decl))) => {
                            Resolution::Declared(Arc::clone(decl))
                        }
                        Some(Matched::Element(ElementTerm::Global(name))) => {
                            match pool.element(&name.namespace, &name.local) {
                                Some(decl) => Resolution::Declared(Arc::clone(decl)),
                                None => {
                                    site.report(
                                        diagnostics,
                                        format!(
                                            "cvc-elt.1.a: Cannot find the declaration of element '{local}'."
                                        ),
                                    );
                                    Resolution::Lax
                                }
                            }
                        }
                        Some(Matched::Wildcard(wildcard)) => match wildcard.process {
                            ProcessContents::Skip => Resolution::Skip,
                            ProcessContents::Lax => lax_lookup(pool, namespace, local),
                            ProcessContents::Strict => match pool.element(namespace, local) {
                                Some(decl) => Resolution::Declared(Arc::clone(decl)),
                                None => {
                                    site.report(
                                        diagnostics,
                                        format!(
                                            "cvc-complex-type.2.4.c: The matching wildcard is strict, but no declaration can be found for element '{local}'."
                                        ),
                                    );
                                    Resolution::Lax
                                }
                            },
                        },
                        None => {
                            let expected = model.expected(state);
                            let found = quoted(namespace, local);
                            let message = if expected.is_empty() {
                                format!(
                                    "cvc-complex-type.2.4.d: Invalid content was found starting with element '{found}'. No child element is expected at this point."
                                )
                            } else {
                                format!(
                                    "cvc-complex-type.2.4.a: Invalid content was found starting with element '{found}'. One of '{{{}}}' is expected.",
                                    expected.join(", ")
                                )
                            };
                            site.report(diagnostics, message);
                            lax_lookup(pool, namespace, local)
                        }
                    }
                }
            },
        }
    }

    fn open_frame(
        &mut self,
        resolution: Resolution,
        local: Symbol,
        tag: &StartTag,
        site: &Site,
    ) -> Frame {
        let bundle = self.bundle;
        let pool: &GrammarPool = &bundle.pool;

        let decl = match resolution {
            Resolution::Skip => return Frame::new(local, FrameKind::Skip),
            Resolution::Lax => return Frame::new(local, FrameKind::Lax),
            Resolution::Declared(decl) => decl,
        };

        if decl.is_abstract {
            site.report(
                &mut self.diagnostics,
                format!(
                    "cvc-elt.2: The value of {{abstract}} in the element declaration for '{local}' must be false."
                ),
            );
        }

        let Some(mut definition) = pool.resolve_type(&decl.type_ref) else {
            site.report(
                &mut self.diagnostics,
                format!("cvc-type.1: The type definition specified for element '{local}' cannot be found."),
            );
            return Frame::new(local, FrameKind::Lax);
        };

        if let Some(xsi_type) = &tag.xsi_type {
            let candidate = xsi_type
                .name
                .as_ref()
                .and_then(|(namespace, name)| pool.type_definition(namespace, name));
            match candidate {
                Some(candidate) if pool.is_derived_from(&candidate, &definition) => {
                    definition = candidate;
                }
                Some(_) => site.report(
                    &mut self.diagnostics,
                    format!(
                        "cvc-elt.4.3: Type '{}' is not validly derived from the type definition, '{}', of element '{local}'.",
                        xsi_type.raw,
                        definition.display_name()
                    ),
                ),
                None => site.report(
                    &mut self.diagnostics,
                    format!(
                        "cvc-elt.4.2: Cannot resolve '{}' to a type definition for element '{local}'.",
                        xsi_type.raw
                    ),
                ),
            }
        }

        let nil = self.check_nil(&decl, tag, site);
        let kind = match definition {
            TypeDefinition::Complex(ty) => {
                if ty.is_abstract {
                    site.report(
                        &mut self.diagnostics,
                        format!("cvc-type.2: The type definition cannot be abstract for element {local}."),
                    );
                }
                if self.options.full_schema_checking {
                    self.report_constraint_violations(&ty, site);
                }
                self.check_attributes(&ty, &local, tag, site);
                let state = match &ty.content {
                    ContentType::ElementOnly(model) | ContentType::Mixed(model) => model.start(),
                    ContentType::Empty | ContentType::Simple(_) => ModelState::Empty,
                };
                FrameKind::Complex { ty, state, decl }
            }
            TypeDefinition::Simple(ty) => {
                self.check_simple_type_attributes(&local, tag, site);
                FrameKind::Simple { ty, decl }
            }
        };

        let mut frame = Frame::new(local, kind);
        frame.nil = nil;
        frame
    }

    fn check_nil(&mut self, decl: &ElementDecl, tag: &StartTag, site: &Site) -> bool {
        let Some(attribute) = tag.attribute(XSI_NAMESPACE, "nil") else {
            return false;
        };
        let local = &decl.name.local;
        let nil = match attribute.value.trim() {
            "true" | "1" => true,
            "false" | "0" => false,
            other => {
                site.report(
                    &mut self.diagnostics,
                    format!("cvc-datatype-valid.1.2.1: '{other}' is not a valid value for 'boolean'."),
                );
                return false;
            }
        };
        if !decl.nillable {
            site.report(
                &mut self.diagnostics,
                format!(
                    "cvc-elt.3.1: Attribute 'http://www.w3.org/2001/XMLSchema-instance,nil' must not appear on element '{local}', because the {{nillable}} property of '{local}' is false."
                ),
            );
            return false;
        }
        if nil && decl.fixed.is_some() {
            site.report(
                &mut self.diagnostics,
                format!(
                    "cvc-elt.3.2.2: There must be no fixed {{value constraint}} for element '{local}', because 'xsi:nil' is specified."
                ),
            );
        }
        nil
    }

    fn report_constraint_violations(&mut self, ty: &Arc<ComplexType>, site: &Site) {
        if ty.constraint_violations.is_empty()
            || !self.checked_types.insert(Arc::as_ptr(ty) as usize)
        {
            return;
        }
        for violation in &ty.constraint_violations {
            site.report(&mut self.diagnostics, violation.clone());
        }
    }

    fn check_attributes(&mut self, ty: &ComplexType, element: &str, tag: &StartTag, site: &Site) {
        let bundle = self.bundle;
        let pool: &GrammarPool = &bundle.pool;

        for attribute in &tag.attributes {
            if attribute.namespace == XSI_NAMESPACE {
                continue;
            }
            if let Some(attribute_use) = ty.find_attribute(&attribute.namespace, &attribute.local) {
                self.check_attribute_value(&attribute_use.decl, attribute, element, site);
                continue;
            }
            match &ty.attribute_wildcard {
                Some(wildcard) if wildcard.allows(&attribute.namespace) => {
                    if wildcard.process == ProcessContents::Skip {
                        continue;
                    }
                    match pool.attribute(&attribute.namespace, &attribute.local) {
                        Some(decl) => self.check_attribute_value(decl, attribute, element, site),
                        None if wildcard.process == ProcessContents::Strict => site.report(
                            &mut self.diagnostics,
                            format!(
                                "cvc-complex-type.3.2.2: Attribute '{}' is not allowed to appear in element '{element}'.",
                                attribute.local
                            ),
                        ),
                        None => {}
                    }
                }
                _ => site.report(
                    &mut self.diagnostics,
                    format!(
                        "cvc-complex-type.3.2.2: Attribute '{}' is not allowed to appear in element '{element}'.",
                        attribute.local
                    ),
                ),
            }
        }

        for attribute_use in ty.attributes.iter().filter(|attribute_use| attribute_use.required) {
            let name = &attribute_use.decl.name;
            let present = tag
                .attributes
                .iter()
                .any(|attribute| name.matches(&attribute.namespace, &attribute.local));
            if !present {
                site.report(
                    &mut self.diagnostics,
                    format!(
                        "cvc-complex-type.4: Attribute '{}' must appear on element '{element}'.",
                        name.local
                    ),
                );
            }
        }
    }

    fn check_attribute_value(
        &mut self,
        decl: &AttributeDecl,
        attribute: &InstanceAttribute,
        element: &str,
        site: &Site,
    ) {
        match decl.simple_type.validate(&attribute.value) {
            Ok(normalized) => {
                if let Some(fixed) = &decl.fixed {
                    if normalized != decl.simple_type.whitespace.apply(fixed) {
                        site.report(
                            &mut self.diagnostics,
                            format!(
                                "cvc-attribute.4: The value '{}' of attribute '{}' on element '{element}' is not valid with respect to its fixed {{value constraint}}. The attribute must have a value of '{fixed}'.",
                                attribute.value, attribute.local
                            ),
                        );
                    }
                }
            }
            Err(message) => {
                site.report(&mut self.diagnostics, message);
                site.report(
                    &mut self.diagnostics,
                    format!(
                        "cvc-attribute.3: The value '{}' of attribute '{}' on element '{element}' is not valid with respect to its type, '{}'.",
                        attribute.value,
                        attribute.local,
                        decl.simple_type.display_name()
                    ),
                );
            }
        }
    }

    fn check_simple_type_attributes(&mut self, element: &str, tag: &StartTag, site: &Site) {
        for attribute in tag
            .attributes
            .iter()
            .filter(|attribute| attribute.namespace != XSI_NAMESPACE)
        {
            site.report(
                &mut self.diagnostics,
                format!(
                    "cvc-type.3.1.1: Element '{element}' is a simple type, so it cannot have attributes, excepting those whose namespace name is identical to 'http://www.w3.org/2001/XMLSchema-instance' and whose [local name] is one of 'type', 'nil', 'schemaLocation' or 'noNamespaceSchemaLocation'. However, the attribute, '{}' was found.",
                    attribute.local
                ),
            );
        }
    }

    fn characters(&mut self, text: &str, location: Location) {
        let Some(frame) = self.frames.last_mut() else {
            return;
        };
        let significant = !is_xml_whitespace(text);

        if frame.nil {
            if significant && !frame.text_reported {
                frame.text_reported = true;
                let site = Site {
                    location,
                    xpath: self.structural.xpath(),
                };
                site.report(
                    &mut self.diagnostics,
                    format!(
                        "cvc-elt.3.2.1: Element '{}' cannot have character or element information [children], because 'xsi:nil' is specified.",
                        frame.local
                    ),
                );
            }
            return;
        }

        let message = match &frame.kind {
            FrameKind::Skip | FrameKind::Lax => None,
            FrameKind::Simple { .. } => {
                frame.text.push_str(text);
                None
            }
            FrameKind::Complex { ty, .. } => match &ty.content {
                ContentType::Simple(_) => {
                    frame.text.push_str(text);
                    None
                }
                ContentType::Mixed(_) => None,
                ContentType::Empty => Some(format!(
                    "cvc-complex-type.2.1: Element '{}' must have no character or element information item [children], because the type's content type is empty.",
                    frame.local
                )),
                ContentType::ElementOnly(_) => Some(format!(
                    "cvc-complex-type.2.3: Element '{}' cannot have character [children], because the type's content type is element-only.",
                    frame.local
                )),
            },
        };

        if let Some(message) = message {
            if significant && !frame.text_reported {
                frame.text_reported = true;
                let site = Site {
                    location,
                    xpath: self.structural.xpath(),
                };
                site.report(&mut self.diagnostics, message);
            }
        }
    }

    fn end_element(&mut self, location: Location) {
        let site = Site {
            location,
            xpath: self.structural.xpath(),
        };
        if let Some(frame) = self.frames.pop() {
            self.close_frame(frame, &site);
        }
        self.structural.end_element();
    }

    fn close_frame(&mut self, frame: Frame, site: &Site) {
        if frame.nil {
            return;
        }
        match frame.kind {
            FrameKind::Skip | FrameKind::Lax => {}
            FrameKind::Complex { ty, state, decl } => match &ty.content {
                ContentType::ElementOnly(model) | ContentType::Mixed(model) => {
                    if !model.is_accepting(&state) {
                        let expected = model.expected(&state);
                        let message = if expected.is_empty() {
                            format!(
                                "cvc-complex-type.2.4.b: The content of element '{}' is not complete.",
                                frame.local
                            )
                        } else {
                            format!(
                                "cvc-complex-type.2.4.b: The content of element '{}' is not complete. One of '{{{}}}' is expected.",
                                frame.local,
                                expected.join(", ")
                            )
                        };
                        site.report(&mut self.diagnostics, message);
                    }
                }
                ContentType::Simple(simple) => {
                    self.check_element_value(simple, &frame.text, &decl, &frame.local, site);
                }
                ContentType::Empty => {}
            },
            FrameKind::Simple { ty, decl } => {
                self.check_element_value(&ty, &frame.text, &decl, &frame.local, site);
            }
        }
    }

    fn check_element_value(
        &mut self,
        ty: &SimpleType,
        text: &str,
        decl: &ElementDecl,
        local: &str,
        site: &Site,
    ) {
        let value = if text.is_empty() {
            decl.default
                .as_deref()
                .or(decl.fixed.as_deref())
                .unwrap_or_default()
        } else {
            text
        };

        match ty.validate(value) {
            Ok(normalized) => {
                if let Some(fixed) = &decl.fixed {
                    if normalized != ty.whitespace.apply(fixed) {
                        site.report(
                            &mut self.diagnostics,
                            format!(
                                "cvc-elt.5.2.2.2.2: The value '{}' of element '{local}' does not match the {{value constraint}} value '{fixed}'.",
                                normalized
                            ),
                        );
                    }
                }
            }
            Err(message) => {
                site.report(&mut self.diagnostics, message);
                site.report(
                    &mut self.diagnostics,
                    format!(
                        "cvc-type.3.1.3: The value '{}' of element '{local}' is not valid.",
                        value.trim()
                    ),
                );
            }
        }
    }

    fn finish(self, well_formed: bool) -> ValidationOutcome {
        let kind = if !well_formed {
            OutcomeKind::ParserError
        } else if self.structural.has_root_violations() {
            OutcomeKind::IllegalRoot
        } else if !self.diagnostics.is_clean() {
            OutcomeKind::NotValid
        } else {
            OutcomeKind::Valid
        };

        let summary = match kind {
            OutcomeKind::Valid => "Document is valid".to_string(),
            OutcomeKind::ParserError => "Document is not well-formed".to_string(),
            OutcomeKind::IllegalRoot => {
                "Document does not match the configured root elements".to_string()
            }
            OutcomeKind::NotValid => format!(
                "Document is not valid against schema set '{}'",
                self.bundle.identity
            ),
        };

        debug!(
            outcome = %kind,
            reasons = self.diagnostics.reasons().len(),
            overlay_symbols = self.symbols.overlay_len(),
            "validation finished"
        );
        ValidationOutcome::new(kind, ValidationReport::new(summary, self.diagnostics.into_reasons()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{GrammarCompiler, XsdGrammarCompiler};
    use crate::diagnostics::Severity;
    use crate::grammar::SchemaSetIdentity;
    use crate::provider::SchemaSource;

    const ORDER_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           targetNamespace="urn:ex" xmlns="urn:ex" elementFormDefault="qualified">
  <xs:element name="Order">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Id" type="xs:integer"/>
        <xs:element name="Note" type="xs:string" minOccurs="0" nillable="true"/>
        <xs:element name="Item" type="Item" minOccurs="0" maxOccurs="unbounded"/>
      </xs:sequence>
      <xs:attribute name="status" type="Status" use="required"/>
      <xs:attribute name="version" type="xs:string" fixed="1.0"/>
    </xs:complexType>
  </xs:element>
  <xs:complexType name="Item">
    <xs:simpleContent>
      <xs:extension base="xs:decimal">
        <xs:attribute name="sku" type="xs:token"/>
      </xs:extension>
    </xs:simpleContent>
  </xs:complexType>
  <xs:complexType name="SpecialItem">
    <xs:simpleContent>
      <xs:extension base="Item">
        <xs:attribute name="rush" type="xs:boolean"/>
      </xs:extension>
    </xs:simpleContent>
  </xs:complexType>
  <xs:simpleType name="Status">
    <xs:restriction base="xs:string">
      <xs:enumeration value="open"/>
      <xs:enumeration value="closed"/>
    </xs:restriction>
  </xs:simpleType>
</xs:schema>"#;

    fn bundle() -> GrammarBundle {
        XsdGrammarCompiler::new()
            .compile(
                &SchemaSetIdentity::new("order"),
                &[SchemaSource::from_string("order.xsd", ORDER_XSD)],
            )
            .unwrap()
    }

    fn run(xml: &str) -> ValidationOutcome {
        validate(&bundle(), xml.as_bytes(), &ValidationOptions::default())
    }

    fn messages(outcome: &ValidationOutcome) -> Vec<String> {
        outcome
            .reasons()
            .iter()
            .map(|reason| reason.message.clone())
            .collect()
    }

    #[test]
    fn test_valid_document() {
        let outcome = run(
            r#"<Order xmlns="urn:ex" status="open"><Id>42</Id><Item sku="A-1">9.99</Item></Order>"#,
        );
        assert_eq!(outcome.kind(), OutcomeKind::Valid, "{:?}", messages(&outcome));
        assert!(outcome.reasons().is_empty());
    }

    #[test]
    fn test_invalid_simple_value_reports_xpath() {
        let outcome = run(
            "<Order xmlns=\"urn:ex\" status=\"open\">\n  <Id>abc</Id>\n</Order>",
        );
        assert_eq!(outcome.kind(), OutcomeKind::NotValid);
        let reason = &outcome.reasons()[0];
        assert_eq!(
            reason.message,
            "cvc-datatype-valid.1.2.1: 'abc' is not a valid value for 'integer'."
        );
        assert_eq!(reason.xpath.as_deref(), Some("/Order/Id"));
        assert_eq!(reason.location.map(|location| location.line), Some(2));
        assert_eq!(reason.severity, Severity::Error);
    }

    #[test]
    fn test_unexpected_child() {
        let outcome = run(r#"<Order xmlns="urn:ex" status="open"><Item>1</Item></Order>"#);
        assert_eq!(outcome.kind(), OutcomeKind::NotValid);
        assert_eq!(
            messages(&outcome)[0],
            "cvc-complex-type.2.4.a: Invalid content was found starting with element '\"urn:ex\":Item'. One of '{\"urn:ex\":Id}' is expected."
        );
    }

    #[test]
    fn test_incomplete_content() {
        let outcome = run(r#"<Order xmlns="urn:ex" status="open"></Order>"#);
        assert_eq!(
            messages(&outcome),
            vec![
                "cvc-complex-type.2.4.b: The content of element 'Order' is not complete. One of '{\"urn:ex\":Id}' is expected."
            ]
        );
    }

    #[test]
    fn test_attribute_checks() {
        let outcome = run(r#"<Order xmlns="urn:ex" status="pending" version="2.0" extra="x"><Id>1</Id></Order>"#);
        let msgs = messages(&outcome);
        assert!(msgs.iter().any(|m| m.starts_with("cvc-enumeration-valid")));
        assert!(msgs.iter().any(|m| m.starts_with("cvc-attribute.3:")));
        assert!(msgs.iter().any(|m| m.starts_with("cvc-attribute.4:")));
        assert!(msgs.iter().any(|m| m
            == "cvc-complex-type.3.2.2: Attribute 'extra' is not allowed to appear in element 'Order'."));

        let outcome = run(r#"<Order xmlns="urn:ex"><Id>1</Id></Order>"#);
        assert_eq!(
            messages(&outcome),
            vec!["cvc-complex-type.4: Attribute 'status' must appear on element 'Order'."]
        );
    }

    #[test]
    fn test_undeclared_root() {
        let outcome = run(r#"<Invoice xmlns="urn:ex"><Id>1</Id></Invoice>"#);
        assert_eq!(outcome.kind(), OutcomeKind::NotValid);
        assert_eq!(
            messages(&outcome),
            vec!["cvc-elt.1.a: Cannot find the declaration of element 'Invoice'."]
        );
    }

    #[test]
    fn test_nil() {
        let outcome = run(
            r#"<Order xmlns="urn:ex" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" status="open"><Id>1</Id><Note xsi:nil="true"/></Order>"#,
        );
        assert_eq!(outcome.kind(), OutcomeKind::Valid, "{:?}", messages(&outcome));

        let outcome = run(
            r#"<Order xmlns="urn:ex" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" status="open"><Id xsi:nil="true"/></Order>"#,
        );
        assert!(messages(&outcome)[0].starts_with("cvc-elt.3.1:"));
    }

    #[test]
    fn test_xsi_type() {
        let outcome = run(
            r#"<Order xmlns="urn:ex" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" status="open"><Id>1</Id><Item xsi:type="SpecialItem" rush="true">5</Item></Order>"#,
        );
        assert_eq!(outcome.kind(), OutcomeKind::Valid, "{:?}", messages(&outcome));

        let outcome = run(
            r#"<Order xmlns="urn:ex" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" status="open"><Id>1</Id><Item xsi:type="Missing">5</Item></Order>"#,
        );
        assert_eq!(
            messages(&outcome),
            vec!["cvc-elt.4.2: Cannot resolve 'Missing' to a type definition for element 'Item'."]
        );
    }

    #[test]
    fn test_text_in_element_only_content() {
        let outcome = run(r#"<Order xmlns="urn:ex" status="open">stray<Id>1</Id></Order>"#);
        assert_eq!(
            messages(&outcome),
            vec!["cvc-complex-type.2.3: Element 'Order' cannot have character [children], because the type's content type is element-only."]
        );
    }

    #[test]
    fn test_not_well_formed() {
        let outcome = run(r#"<Order xmlns="urn:ex" status="open"><Id>1</Order>"#);
        assert_eq!(outcome.kind(), OutcomeKind::ParserError);
        assert_eq!(outcome.reasons().len(), 1);
        assert_eq!(outcome.reasons()[0].severity, Severity::Fatal);

        let outcome = run("");
        assert_eq!(outcome.kind(), OutcomeKind::ParserError);
    }

    #[test]
    fn test_well_formedness_takes_precedence_over_root_paths() {
        let options = ValidationOptions {
            root_paths: vec!["Invoice".parse().unwrap()],
            ..ValidationOptions::default()
        };
        let outcome = validate(
            &bundle(),
            r#"<Order xmlns="urn:ex" status="open"><Id>1</Id>"#.as_bytes(),
            &options,
        );
        assert_eq!(outcome.kind(), OutcomeKind::ParserError);
    }

    #[test]
    fn test_line_tracking_reader() {
        let mut reader = LineTrackingReader::new(BufReader::new("ab\ncd\n\nef".as_bytes()));
        let mut content = String::new();
        reader.read_to_string(&mut content).unwrap();
        assert_eq!(reader.location_at(0), Location { line: 1, column: 1 });
        assert_eq!(reader.location_at(4), Location { line: 2, column: 2 });
        assert_eq!(reader.location_at(7), Location { line: 4, column: 1 });
    }
}
