//! Schema compilation.
//!
//! [`XsdGrammarCompiler`] turns an ordered list of [`SchemaSource`]s into a
//! sealed [`GrammarBundle`]. Sources are compiled one at a time in soft passes;
//! a source whose references point at components nobody has compiled yet is
//! deferred to the next pass. Once a pass makes no progress, the leftovers are
//! compiled together in one hard pass where every error is fatal.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use roxmltree::{Document, Node, ParsingOptions};
use tracing::{debug, info, warn};

use crate::content_model::{ContentModel, ElementTerm, ModelError, Particle, Term};
use crate::datatypes::{Builtin, Facet, PatternFacet, SimpleType, WhiteSpace};
use crate::error::{SchemaError, SchemaResult};
use crate::grammar::{
    builtin_type, AttributeDecl, AttributeGroup, AttributeUse, ComplexType, ComponentLookup,
    ContentType, Derivation, ElementDecl, Grammar, GrammarBundle, GrammarPoolBuilder,
    NamespaceConstraint, ProcessContents, QName, SchemaSetIdentity, TypeDefinition, TypeRef,
    Wildcard, XML_NAMESPACE, XS_NAMESPACE,
};
use crate::provider::SchemaSource;
use crate::symbols::SymbolTableBuilder;

/// Compiles schema sets into grammar bundles.
pub trait GrammarCompiler: Send + Sync {
    fn compile(
        &self,
        identity: &SchemaSetIdentity,
        sources: &[SchemaSource],
    ) -> SchemaResult<GrammarBundle>;
}

/// Native compiler for the supported XML Schema 1.0 subset.
#[derive(Debug, Clone)]
pub struct XsdGrammarCompiler {
    /// Load `include`/`import` locations that are not part of the source set
    /// from disk, relative to the referencing schema.
    discover_locations: bool,
}

impl Default for XsdGrammarCompiler {
    fn default() -> Self {
        Self {
            discover_locations: true,
        }
    }
}

impl XsdGrammarCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_location_discovery(mut self, enabled: bool) -> Self {
        self.discover_locations = enabled;
        self
    }
}

#[derive(Debug, Clone)]
struct LoadedSource {
    system_id: String,
    content: Arc<str>,
}

impl GrammarCompiler for XsdGrammarCompiler {
    fn compile(
        &self,
        identity: &SchemaSetIdentity,
        sources: &[SchemaSource],
    ) -> SchemaResult<GrammarBundle> {
        if sources.is_empty() {
            return Err(SchemaError::NoSources {
                identity: identity.to_string(),
            });
        }

        let loaded = sources
            .iter()
            .map(|source| -> SchemaResult<LoadedSource> {
                Ok(LoadedSource {
                    system_id: source.system_id.clone(),
                    content: source.load()?,
                })
            })
            .collect::<SchemaResult<Vec<_>>>()?;

        let catalog: HashMap<String, Arc<str>> = loaded
            .iter()
            .map(|source| (normalize_location(&source.system_id), Arc::clone(&source.content)))
            .collect();

        let mut symbols = SymbolTableBuilder::new();
        let mut pool = GrammarPoolBuilder::new();
        let mut valid_namespaces: HashSet<String> = HashSet::new();
        let mut remaining = loaded;
        let mut pass = 0usize;

        loop {
            pass += 1;
            let mut changed = false;
            let mut deferred = Vec::new();

            for source in remaining {
                let unit = std::slice::from_ref(&source);
                match self.compile_unit(unit, &catalog, &mut symbols, &pool) {
                    Ok(grammars) => {
                        debug!(identity = %identity, pass, system_id = %source.system_id, "schema compiled");
                        register(grammars, &mut pool, &mut valid_namespaces);
                        changed = true;
                    }
                    Err(e) if e.is_deferrable() => {
                        debug!(identity = %identity, pass, system_id = %source.system_id, error = %e, "schema deferred");
                        deferred.push(source);
                    }
                    Err(e) => return Err(e),
                }
            }

            remaining = deferred;
            if remaining.is_empty() || !changed {
                break;
            }
        }

        if !remaining.is_empty() {
            debug!(
                identity = %identity,
                leftovers = remaining.len(),
                "compiling remaining schemas in final pass"
            );
            let grammars = self.compile_unit(&remaining, &catalog, &mut symbols, &pool)?;
            register(grammars, &mut pool, &mut valid_namespaces);
        }

        info!(
            identity = %identity,
            sources = sources.len(),
            grammars = pool.len(),
            passes = pass,
            "schema set compiled"
        );

        Ok(GrammarBundle {
            identity: identity.clone(),
            symbols: Arc::new(symbols.freeze()),
            pool: Arc::new(pool.seal()),
            valid_namespaces,
        })
    }
}

fn register(
    grammars: Vec<Grammar>,
    pool: &mut GrammarPoolBuilder,
    valid_namespaces: &mut HashSet<String>,
) {
    let namespaces: Vec<String> = grammars
        .iter()
        .map(|grammar| grammar.target_namespace.to_string())
        .collect();
    for grammar in grammars {
        pool.insert(grammar);
    }
    for namespace in namespaces {
        valid_namespaces.extend(pool.transitive_namespaces(&namespace));
    }
}

/// One schema document of a compilation unit, with the namespace it
/// contributes to.
struct UnitText {
    system_id: String,
    content: Arc<str>,
    /// Target namespace imposed by the including schema on a document without
    /// its own `targetNamespace`.
    chameleon_namespace: Option<String>,
}

impl XsdGrammarCompiler {
    fn compile_unit(
        &self,
        sources: &[LoadedSource],
        catalog: &HashMap<String, Arc<str>>,
        symbols: &mut SymbolTableBuilder,
        pool: &GrammarPoolBuilder,
    ) -> SchemaResult<Vec<Grammar>> {
        let texts = self.collect_documents(sources, catalog, pool)?;

        let documents = texts
            .iter()
            .map(|text| parse_schema(&text.system_id, &text.content))
            .collect::<SchemaResult<Vec<_>>>()?;

        let mut docs = Vec::with_capacity(documents.len());
        for (text, document) in texts.iter().zip(&documents) {
            docs.push(SchemaDoc::new(text, document)?);
        }

        UnitCompiler::new(docs, pool, symbols).compile_all()
    }

    /// Expand the unit with its includes and with imports that can only be
    /// found on disk.
    fn collect_documents(
        &self,
        sources: &[LoadedSource],
        catalog: &HashMap<String, Arc<str>>,
        pool: &GrammarPoolBuilder,
    ) -> SchemaResult<Vec<UnitText>> {
        let mut texts: Vec<UnitText> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: Vec<UnitText> = sources
            .iter()
            .rev()
            .map(|source| UnitText {
                system_id: source.system_id.clone(),
                content: Arc::clone(&source.content),
                chameleon_namespace: None,
            })
            .collect();

        while let Some(text) = queue.pop() {
            if !seen.insert(normalize_location(&text.system_id)) {
                continue;
            }
            queue.extend(self.referenced_documents(&text, catalog, pool)?);
            texts.push(text);
        }
        Ok(texts)
    }

    fn referenced_documents(
        &self,
        text: &UnitText,
        catalog: &HashMap<String, Arc<str>>,
        pool: &GrammarPoolBuilder,
    ) -> SchemaResult<Vec<UnitText>> {
        let document = parse_schema(&text.system_id, &text.content)?;
        let root = document.root_element();
        let target_namespace = root
            .attribute("targetNamespace")
            .map(str::to_string)
            .or_else(|| text.chameleon_namespace.clone())
            .unwrap_or_default();

        let mut referenced = Vec::new();
        for child in xs_children(root) {
            let Some(location) = child.attribute("schemaLocation") else {
                continue;
            };
            let resolved = resolve_location(&text.system_id, location);
            match child.tag_name().name() {
                "include" => {
                    let content = catalog
                        .get(&resolved)
                        .cloned()
                        .or_else(|| self.read_local(&resolved))
                        .ok_or_else(|| SchemaError::SourceNotFound {
                            system_id: resolved.clone(),
                        })?;
                    referenced.push(UnitText {
                        system_id: resolved,
                        content,
                        chameleon_namespace: Some(target_namespace.clone()),
                    });
                }
                "import" => {
                    let namespace = child.attribute("namespace").unwrap_or_default();
                    if pool.contains_namespace(namespace) || catalog.contains_key(&resolved) {
                        continue;
                    }
                    if let Some(content) = self.read_local(&resolved) {
                        debug!(system_id = %resolved, "discovered imported schema");
                        referenced.push(UnitText {
                            system_id: resolved,
                            content,
                            chameleon_namespace: None,
                        });
                    }
                }
                "redefine" => {
                    warn!(system_id = %text.system_id, location, "xs:redefine is not supported and is ignored");
                }
                _ => {}
            }
        }
        Ok(referenced)
    }

    fn read_local(&self, location: &str) -> Option<Arc<str>> {
        if !self.discover_locations || location.contains("://") {
            return None;
        }
        std::fs::read_to_string(location).ok().map(Arc::from)
    }
}

fn parse_schema<'input>(system_id: &str, content: &'input str) -> SchemaResult<Document<'input>> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let document =
        Document::parse_with_options(content, options).map_err(|e| SchemaError::Malformed {
            system_id: system_id.to_string(),
            details: e.to_string(),
        })?;
    let root = document.root_element();
    if root.tag_name().namespace() != Some(XS_NAMESPACE) || root.tag_name().name() != "schema" {
        return Err(SchemaError::Malformed {
            system_id: system_id.to_string(),
            details: format!(
                "root element must be xs:schema, found '{}'",
                root.tag_name().name()
            ),
        });
    }
    Ok(document)
}

/// Lexically normalize a schema location so equivalent relative paths match.
pub(crate) fn normalize_location(location: &str) -> String {
    if location.contains("://") {
        return location.to_string();
    }
    let mut normalized = PathBuf::new();
    for component in Path::new(location).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(normalized.components().next_back(), Some(Component::Normal(_)))
                    && normalized.pop();
                if !popped {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized.to_string_lossy().into_owned()
}

/// Resolve `location` against the system id of the referencing schema.
pub(crate) fn resolve_location(base: &str, location: &str) -> String {
    if location.contains("://") || Path::new(location).is_absolute() {
        return normalize_location(location);
    }
    if base.contains("://") {
        return match base.rfind('/') {
            Some(slash) => format!("{}/{}", &base[..slash], location),
            None => location.to_string(),
        };
    }
    let joined = Path::new(base)
        .parent()
        .map(|parent| parent.join(location))
        .unwrap_or_else(|| PathBuf::from(location));
    normalize_location(&joined.to_string_lossy())
}

fn xs_children<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|child| {
        child.is_element()
            && child.tag_name().namespace() == Some(XS_NAMESPACE)
            && child.tag_name().name() != "annotation"
    })
}

fn xs_child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    xs_children(node).find(|child| child.tag_name().name() == name)
}

fn bool_attribute(node: Node<'_, '_>, name: &str) -> bool {
    matches!(node.attribute(name), Some("true") | Some("1"))
}

fn line_of(node: Node<'_, '_>) -> u32 {
    node.document().text_pos_at(node.range().start).row
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Kind {
    Element,
    Type,
    Attribute,
    Group,
    AttributeGroup,
}

type ComponentKey = (Kind, String, String);
type NameKey = (String, String);

struct SchemaDoc<'a, 'input> {
    system_id: &'a str,
    root: Node<'a, 'input>,
    target_namespace: String,
    chameleon: bool,
    elements_qualified: bool,
    attributes_qualified: bool,
}

impl<'a, 'input> SchemaDoc<'a, 'input> {
    fn new(text: &'a UnitText, document: &'a Document<'input>) -> SchemaResult<Self> {
        let root = document.root_element();
        let own_namespace = root.attribute("targetNamespace");
        if own_namespace == Some("") {
            return Err(SchemaError::Malformed {
                system_id: text.system_id.clone(),
                details: "targetNamespace must not be empty".to_string(),
            });
        }
        let chameleon = own_namespace.is_none() && text.chameleon_namespace.is_some();
        let target_namespace = own_namespace
            .map(str::to_string)
            .or_else(|| text.chameleon_namespace.clone())
            .unwrap_or_default();

        Ok(Self {
            system_id: &text.system_id,
            root,
            target_namespace,
            chameleon,
            elements_qualified: root.attribute("elementFormDefault") == Some("qualified"),
            attributes_qualified: root.attribute("attributeFormDefault") == Some("qualified"),
        })
    }
}

#[derive(Default)]
struct AttributeSet {
    uses: Vec<AttributeUse>,
    wildcard: Option<Wildcard>,
}

impl AttributeSet {
    fn inherited(base: &ComplexType) -> Self {
        Self {
            uses: base.attributes.clone(),
            wildcard: base.attribute_wildcard.clone(),
        }
    }

    fn upsert(&mut self, attribute: AttributeUse) {
        match self
            .uses
            .iter_mut()
            .find(|existing| existing.decl.name == attribute.decl.name)
        {
            Some(existing) => *existing = attribute,
            None => self.uses.push(attribute),
        }
    }

    fn remove(&mut self, name: &QName) {
        self.uses.retain(|existing| &existing.decl.name != name);
    }
}

/// Compiles the global components of one unit of schema documents. References
/// resolve against the unit first, then against the grammars compiled so far.
struct UnitCompiler<'a, 'input> {
    docs: Vec<SchemaDoc<'a, 'input>>,
    index: HashMap<ComponentKey, (usize, Node<'a, 'input>)>,
    pool: &'a GrammarPoolBuilder,
    symbols: &'a mut SymbolTableBuilder,
    simple_types: HashMap<NameKey, Arc<SimpleType>>,
    complex_types: HashMap<NameKey, Arc<ComplexType>>,
    groups: HashMap<NameKey, Arc<Particle>>,
    attribute_groups: HashMap<NameKey, Arc<AttributeGroup>>,
    attributes: HashMap<NameKey, Arc<AttributeDecl>>,
    in_progress: HashSet<ComponentKey>,
}

impl<'a, 'input> UnitCompiler<'a, 'input> {
    fn new(
        docs: Vec<SchemaDoc<'a, 'input>>,
        pool: &'a GrammarPoolBuilder,
        symbols: &'a mut SymbolTableBuilder,
    ) -> Self {
        let mut index = HashMap::new();
        for (ctx, doc) in docs.iter().enumerate() {
            for child in xs_children(doc.root) {
                let kind = match child.tag_name().name() {
                    "element" => Kind::Element,
                    "simpleType" | "complexType" => Kind::Type,
                    "attribute" => Kind::Attribute,
                    "group" => Kind::Group,
                    "attributeGroup" => Kind::AttributeGroup,
                    _ => continue,
                };
                if let Some(name) = child.attribute("name") {
                    index
                        .entry((kind, doc.target_namespace.clone(), name.to_string()))
                        .or_insert((ctx, child));
                }
            }
        }

        Self {
            docs,
            index,
            pool,
            symbols,
            simple_types: HashMap::new(),
            complex_types: HashMap::new(),
            groups: HashMap::new(),
            attribute_groups: HashMap::new(),
            attributes: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    fn compile_all(mut self) -> SchemaResult<Vec<Grammar>> {
        let mut grammars: Vec<Grammar> = Vec::new();

        for ctx in 0..self.docs.len() {
            let namespace = self.docs[ctx].target_namespace.clone();
            let slot = match grammars
                .iter()
                .position(|grammar| *grammar.target_namespace == *namespace)
            {
                Some(slot) => {
                    let system_id = self.docs[ctx].system_id.to_string();
                    if !grammars[slot].system_ids.contains(&system_id) {
                        grammars[slot].system_ids.push(system_id);
                    }
                    slot
                }
                None => {
                    let target = self.symbols.intern(&namespace);
                    grammars.push(Grammar::new(target, self.docs[ctx].system_id));
                    grammars.len() - 1
                }
            };

            let root = self.docs[ctx].root;
            for child in xs_children(root) {
                let kind = child.tag_name().name();
                if kind == "import" {
                    let imported = self.symbols.intern(child.attribute("namespace").unwrap_or_default());
                    if !grammars[slot].imports.contains(&imported) {
                        grammars[slot].imports.push(imported);
                    }
                    continue;
                }
                let Some(local) = child.attribute("name") else {
                    continue;
                };
                let key = (namespace.clone(), local.to_string());
                let symbol = self.symbols.intern(local);
                let grammar_has = |grammar: &Grammar| match kind {
                    "element" => grammar.elements.contains_key(local),
                    "simpleType" | "complexType" => grammar.types.contains_key(local),
                    "attribute" => grammar.attributes.contains_key(local),
                    "group" => grammar.groups.contains_key(local),
                    "attributeGroup" => grammar.attribute_groups.contains_key(local),
                    _ => true,
                };
                if grammar_has(&grammars[slot]) {
                    continue;
                }

                match kind {
                    "element" => {
                        let decl = self.element_decl(ctx, child, true)?;
                        grammars[slot].elements.insert(symbol, Arc::new(decl));
                    }
                    "simpleType" => {
                        let simple = self.simple_type_by_name(ctx, child, &key.0, &key.1)?;
                        grammars[slot]
                            .types
                            .insert(symbol, TypeDefinition::Simple(simple));
                    }
                    "complexType" => {
                        let complex = self.complex_type_by_name(ctx, child, &key.0, &key.1)?;
                        grammars[slot]
                            .types
                            .insert(symbol, TypeDefinition::Complex(complex));
                    }
                    "attribute" => {
                        let decl = self.global_attribute(ctx, child, &key.0, &key.1)?;
                        grammars[slot].attributes.insert(symbol, decl);
                    }
                    "group" => {
                        let group = self.group_by_name(ctx, child, &key.0, &key.1)?;
                        grammars[slot].groups.insert(symbol, group);
                    }
                    "attributeGroup" => {
                        let group = self.attribute_group_by_name(ctx, child, &key.0, &key.1)?;
                        grammars[slot].attribute_groups.insert(symbol, group);
                    }
                    _ => {}
                }
            }
        }
        Ok(grammars)
    }

    fn qname(&mut self, namespace: &str, local: &str) -> QName {
        QName::new(self.symbols.intern(namespace), self.symbols.intern(local))
    }

    fn malformed(&self, ctx: usize, node: Node<'_, '_>, details: impl Into<String>) -> SchemaError {
        SchemaError::Malformed {
            system_id: self.docs[ctx].system_id.to_string(),
            details: format!("line {}: {}", line_of(node), details.into()),
        }
    }

    fn unsupported(&self, ctx: usize, node: Node<'_, '_>, details: impl Into<String>) -> SchemaError {
        SchemaError::Unsupported {
            system_id: self.docs[ctx].system_id.to_string(),
            details: format!("line {}: {}", line_of(node), details.into()),
        }
    }

    fn unresolved(
        &self,
        ctx: usize,
        node: Node<'_, '_>,
        what: &str,
        namespace: &str,
        local: &str,
    ) -> SchemaError {
        let name = if namespace.is_empty() {
            local.to_string()
        } else {
            format!("{{{namespace}}}{local}")
        };
        SchemaError::UnresolvedReference {
            system_id: self.docs[ctx].system_id.to_string(),
            details: format!(
                "line {}: src-resolve: Cannot resolve the name '{}' to a(n) '{}' component.",
                line_of(node),
                name,
                what
            ),
        }
    }

    /// Resolve a QName-valued attribute against the namespace bindings in
    /// scope at `node`.
    fn resolve_qname(&self, ctx: usize, node: Node<'_, '_>, value: &str) -> SchemaResult<NameKey> {
        let value = value.trim();
        let (prefix, local) = match value.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, value),
        };
        let namespace = match node.lookup_namespace_uri(prefix) {
            Some(namespace) => namespace.to_string(),
            None if prefix.is_some() => {
                return Err(self.malformed(
                    ctx,
                    node,
                    format!("undeclared namespace prefix in '{value}'"),
                ));
            }
            None => String::new(),
        };
        let namespace = if namespace.is_empty() && self.docs[ctx].chameleon {
            self.docs[ctx].target_namespace.clone()
        } else {
            namespace
        };
        Ok((namespace, local.to_string()))
    }

    fn reference(&self, ctx: usize, node: Node<'_, '_>, attribute: &str) -> SchemaResult<NameKey> {
        let value = node
            .attribute(attribute)
            .ok_or_else(|| self.malformed(ctx, node, format!("missing '{attribute}' attribute")))?;
        self.resolve_qname(ctx, node, value)
    }

    fn occurs(&self, ctx: usize, node: Node<'_, '_>) -> SchemaResult<(u32, Option<u32>)> {
        let parse = |value: &str| {
            value
                .trim()
                .parse::<u32>()
                .map_err(|_| self.malformed(ctx, node, format!("invalid occurrence value '{value}'")))
        };
        let min = node.attribute("minOccurs").map(parse).transpose()?.unwrap_or(1);
        let max = match node.attribute("maxOccurs").map(str::trim) {
            None => Some(1),
            Some("unbounded") => None,
            Some(value) => Some(parse(value)?),
        };
        if max.is_some_and(|max| max < min) {
            return Err(self.malformed(
                ctx,
                node,
                "p-props-correct.2.1: minOccurs must not be greater than maxOccurs",
            ));
        }
        Ok((min, max))
    }

    fn wildcard(&mut self, ctx: usize, node: Node<'_, '_>) -> Wildcard {
        let target = self.docs[ctx].target_namespace.clone();
        let constraint = match node.attribute("namespace").map(str::trim).unwrap_or("##any") {
            "##any" => NamespaceConstraint::Any,
            "##other" => NamespaceConstraint::Other(self.symbols.intern(&target)),
            list => NamespaceConstraint::List(
                list.split_ascii_whitespace()
                    .map(|token| match token {
                        "##targetNamespace" => self.symbols.intern(&target),
                        "##local" => self.symbols.intern(""),
                        other => self.symbols.intern(other),
                    })
                    .collect(),
            ),
        };
        let process = match node.attribute("processContents") {
            Some("lax") => ProcessContents::Lax,
            Some("skip") => ProcessContents::Skip,
            _ => ProcessContents::Strict,
        };
        Wildcard {
            constraint,
            process,
        }
    }

    fn element_decl(&mut self, ctx: usize, node: Node<'a, 'input>, global: bool) -> SchemaResult<ElementDecl> {
        let local = node
            .attribute("name")
            .ok_or_else(|| self.malformed(ctx, node, "element requires a 'name' or 'ref'"))?;
        let qualified = match node.attribute("form") {
            Some(form) => form == "qualified",
            None => self.docs[ctx].elements_qualified,
        };
        let namespace = if global || qualified {
            self.docs[ctx].target_namespace.clone()
        } else {
            String::new()
        };

        let type_ref = if let Some(type_name) = node.attribute("type") {
            let (type_ns, type_local) = self.resolve_qname(ctx, node, type_name)?;
            self.type_ref(ctx, node, &type_ns, &type_local)?
        } else if let Some(complex) = xs_child(node, "complexType") {
            TypeRef::Inline(TypeDefinition::Complex(Arc::new(self.complex_type(ctx, complex, None)?)))
        } else if let Some(simple) = xs_child(node, "simpleType") {
            TypeRef::Inline(TypeDefinition::Simple(Arc::new(self.simple_type(ctx, simple, None)?)))
        } else {
            TypeRef::Inline(TypeDefinition::Complex(ComplexType::any_type()))
        };

        Ok(ElementDecl {
            name: self.qname(&namespace, local),
            type_ref,
            nillable: bool_attribute(node, "nillable"),
            default: node.attribute("default").map(str::to_string),
            fixed: node.attribute("fixed").map(str::to_string),
            is_abstract: bool_attribute(node, "abstract"),
        })
    }

    /// Reference to a named type. Only existence is checked; named types are
    /// looked up in the pool when an element is validated.
    fn type_ref(&mut self, ctx: usize, node: Node<'_, '_>, namespace: &str, local: &str) -> SchemaResult<TypeRef> {
        if namespace == XS_NAMESPACE {
            return builtin_type(local)
                .map(TypeRef::Inline)
                .ok_or_else(|| self.malformed(ctx, node, format!("unknown built-in type 'xs:{local}'")));
        }
        let known = self
            .index
            .contains_key(&(Kind::Type, namespace.to_string(), local.to_string()))
            || self.pool.type_definition(namespace, local).is_some();
        if !known {
            return Err(self.unresolved(ctx, node, "type definition", namespace, local));
        }
        Ok(TypeRef::Named(self.qname(namespace, local)))
    }

    fn type_definition_by_name(
        &mut self,
        ctx: usize,
        node: Node<'_, '_>,
        namespace: &str,
        local: &str,
    ) -> SchemaResult<TypeDefinition> {
        if namespace == XS_NAMESPACE {
            return builtin_type(local)
                .ok_or_else(|| self.malformed(ctx, node, format!("unknown built-in type 'xs:{local}'")));
        }
        let key = (Kind::Type, namespace.to_string(), local.to_string());
        if let Some(&(_, definition)) = self.index.get(&key) {
            return if definition.tag_name().name() == "complexType" {
                Ok(TypeDefinition::Complex(self.complex_type_by_name(ctx, node, namespace, local)?))
            } else {
                Ok(TypeDefinition::Simple(self.simple_type_by_name(ctx, node, namespace, local)?))
            };
        }
        self.pool
            .type_definition(namespace, local)
            .ok_or_else(|| self.unresolved(ctx, node, "type definition", namespace, local))
    }

    fn enter(&mut self, ctx: usize, node: Node<'_, '_>, key: &ComponentKey) -> SchemaResult<()> {
        if !self.in_progress.insert(key.clone()) {
            return Err(self.malformed(
                ctx,
                node,
                format!("circular definition of '{}'", key.2),
            ));
        }
        Ok(())
    }

    fn simple_type_by_name(
        &mut self,
        ctx: usize,
        node: Node<'_, '_>,
        namespace: &str,
        local: &str,
    ) -> SchemaResult<Arc<SimpleType>> {
        if namespace == XS_NAMESPACE {
            return match builtin_type(local) {
                Some(TypeDefinition::Simple(simple)) => Ok(simple),
                Some(TypeDefinition::Complex(_)) => Err(self.malformed(ctx, node, "xs:anyType is not a simple type")),
                None => Err(self.malformed(ctx, node, format!("unknown built-in type 'xs:{local}'"))),
            };
        }
        let name_key = (namespace.to_string(), local.to_string());
        if let Some(simple) = self.simple_types.get(&name_key) {
            return Ok(Arc::clone(simple));
        }
        let key = (Kind::Type, namespace.to_string(), local.to_string());
        if let Some(&(def_ctx, definition)) = self.index.get(&key) {
            if definition.tag_name().name() != "simpleType" {
                return Err(self.malformed(ctx, node, format!("'{local}' is not a simple type")));
            }
            self.enter(def_ctx, definition, &key)?;
            let simple = Arc::new(self.simple_type(def_ctx, definition, Some(local.to_string()))?);
            self.in_progress.remove(&key);
            self.simple_types.insert(name_key, Arc::clone(&simple));
            return Ok(simple);
        }
        match self.pool.type_definition(namespace, local) {
            Some(TypeDefinition::Simple(simple)) => Ok(simple),
            Some(TypeDefinition::Complex(complex)) => match &complex.content {
                ContentType::Simple(simple) => Ok(Arc::clone(simple)),
                _ => Err(self.malformed(ctx, node, format!("'{local}' is not a simple type"))),
            },
            None => Err(self.unresolved(ctx, node, "simpleType definition", namespace, local)),
        }
    }

    fn complex_type_by_name(
        &mut self,
        ctx: usize,
        node: Node<'_, '_>,
        namespace: &str,
        local: &str,
    ) -> SchemaResult<Arc<ComplexType>> {
        if namespace == XS_NAMESPACE {
            return match builtin_type(local) {
                Some(TypeDefinition::Complex(complex)) => Ok(complex),
                _ => Err(self.malformed(ctx, node, format!("'xs:{local}' is not a complex type"))),
            };
        }
        let name_key = (namespace.to_string(), local.to_string());
        if let Some(complex) = self.complex_types.get(&name_key) {
            return Ok(Arc::clone(complex));
        }
        let key = (Kind::Type, namespace.to_string(), local.to_string());
        if let Some(&(def_ctx, definition)) = self.index.get(&key) {
            if definition.tag_name().name() != "complexType" {
                return Err(self.malformed(ctx, node, format!("'{local}' is not a complex type")));
            }
            self.enter(def_ctx, definition, &key)?;
            let name = self.qname(namespace, local);
            let complex = Arc::new(self.complex_type(def_ctx, definition, Some(name))?);
            self.in_progress.remove(&key);
            self.complex_types.insert(name_key, Arc::clone(&complex));
            return Ok(complex);
        }
        match self.pool.type_definition(namespace, local) {
            Some(TypeDefinition::Complex(complex)) => Ok(complex),
            Some(TypeDefinition::Simple(_)) => {
                Err(self.malformed(ctx, node, format!("'{local}' is not a complex type")))
            }
            None => Err(self.unresolved(ctx, node, "type definition", namespace, local)),
        }
    }

    fn simple_type(&mut self, ctx: usize, node: Node<'a, 'input>, name: Option<String>) -> SchemaResult<SimpleType> {
        if let Some(restriction) = xs_child(node, "restriction") {
            let base = self.restriction_base(ctx, restriction)?;
            let (whitespace, facets) = self.facets(ctx, restriction)?;
            return Ok(SimpleType::restrict(&base, name, whitespace, facets));
        }
        if let Some(list) = xs_child(node, "list") {
            let item = if let Some(item_type) = list.attribute("itemType") {
                let (ns, local) = self.resolve_qname(ctx, list, item_type)?;
                self.simple_type_by_name(ctx, list, &ns, &local)?
            } else if let Some(inline) = xs_child(list, "simpleType") {
                Arc::new(self.simple_type(ctx, inline, None)?)
            } else {
                return Err(self.malformed(ctx, list, "xs:list requires an item type"));
            };
            return Ok(SimpleType::list_of(name, item));
        }
        if let Some(union) = xs_child(node, "union") {
            let mut members = Vec::new();
            if let Some(member_types) = union.attribute("memberTypes") {
                for member in member_types.split_ascii_whitespace() {
                    let (ns, local) = self.resolve_qname(ctx, union, member)?;
                    members.push(self.simple_type_by_name(ctx, union, &ns, &local)?);
                }
            }
            for inline in xs_children(union).filter(|child| child.tag_name().name() == "simpleType") {
                members.push(Arc::new(self.simple_type(ctx, inline, None)?));
            }
            if members.is_empty() {
                return Err(self.malformed(ctx, union, "xs:union requires member types"));
            }
            return Ok(SimpleType::union_of(name, members));
        }
        Err(self.malformed(ctx, node, "simpleType requires restriction, list or union"))
    }

    fn restriction_base(&mut self, ctx: usize, restriction: Node<'a, 'input>) -> SchemaResult<Arc<SimpleType>> {
        if let Some(base) = restriction.attribute("base") {
            let (ns, local) = self.resolve_qname(ctx, restriction, base)?;
            self.simple_type_by_name(ctx, restriction, &ns, &local)
        } else if let Some(inline) = xs_child(restriction, "simpleType") {
            Ok(Arc::new(self.simple_type(ctx, inline, None)?))
        } else {
            Err(self.malformed(ctx, restriction, "restriction requires a base type"))
        }
    }

    fn facets(&mut self, ctx: usize, restriction: Node<'_, '_>) -> SchemaResult<(Option<WhiteSpace>, Vec<Facet>)> {
        let mut whitespace = None;
        let mut facets = Vec::new();
        let mut enumeration = Vec::new();
        let mut patterns = Vec::new();

        for child in xs_children(restriction) {
            let facet_name = child.tag_name().name();
            let Some(value) = child.attribute("value") else {
                continue;
            };
            let count = |value: &str| {
                value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| self.malformed(ctx, child, format!("invalid {facet_name} value '{value}'")))
            };
            match facet_name {
                "enumeration" => enumeration.push(value.to_string()),
                "pattern" => patterns.push(value.to_string()),
                "length" => facets.push(Facet::Length(count(value)?)),
                "minLength" => facets.push(Facet::MinLength(count(value)?)),
                "maxLength" => facets.push(Facet::MaxLength(count(value)?)),
                "totalDigits" => facets.push(Facet::TotalDigits(count(value)?)),
                "fractionDigits" => facets.push(Facet::FractionDigits(count(value)?)),
                "minInclusive" => facets.push(Facet::MinInclusive(value.trim().to_string())),
                "maxInclusive" => facets.push(Facet::MaxInclusive(value.trim().to_string())),
                "minExclusive" => facets.push(Facet::MinExclusive(value.trim().to_string())),
                "maxExclusive" => facets.push(Facet::MaxExclusive(value.trim().to_string())),
                "whiteSpace" => {
                    whitespace = Some(WhiteSpace::from_facet_value(value.trim()).ok_or_else(|| {
                        self.malformed(ctx, child, format!("invalid whiteSpace value '{value}'"))
                    })?);
                }
                other => debug!(facet = other, "ignoring unsupported facet"),
            }
        }

        if !patterns.is_empty() {
            let facet = PatternFacet::compile(patterns).map_err(|(pattern, details)| {
                SchemaError::InvalidPattern {
                    system_id: self.docs[ctx].system_id.to_string(),
                    pattern,
                    details,
                }
            })?;
            facets.push(Facet::Pattern(facet));
        }
        if !enumeration.is_empty() {
            facets.push(Facet::Enumeration(enumeration));
        }
        Ok((whitespace, facets))
    }

    fn complex_type(
        &mut self,
        ctx: usize,
        node: Node<'a, 'input>,
        name: Option<QName>,
    ) -> SchemaResult<ComplexType> {
        let type_name = name
            .as_ref()
            .map(|name| name.local.to_string())
            .unwrap_or_else(|| "#AnonType".to_string());
        let mut mixed = bool_attribute(node, "mixed");
        let mut base = None;
        let mut particle: Option<Particle> = None;
        let mut attributes = AttributeSet::default();
        let mut simple_content: Option<Arc<SimpleType>> = None;
        let mut restricted_from: Option<Arc<ComplexType>> = None;

        if let Some(content) = xs_child(node, "simpleContent") {
            let (derivation, method) = derivation_of(content)
                .ok_or_else(|| self.malformed(ctx, content, "simpleContent requires extension or restriction"))?;
            let (base_ns, base_local) = self.reference(ctx, derivation, "base")?;
            let base_definition = self.type_definition_by_name(ctx, derivation, &base_ns, &base_local)?;
            let base_simple = match &base_definition {
                TypeDefinition::Simple(simple) => Arc::clone(simple),
                TypeDefinition::Complex(complex) => {
                    attributes = AttributeSet::inherited(complex);
                    match &complex.content {
                        ContentType::Simple(simple) => Arc::clone(simple),
                        _ => {
                            return Err(self.malformed(
                                ctx,
                                derivation,
                                format!("base type '{base_local}' of simpleContent does not have simple content"),
                            ));
                        }
                    }
                }
            };
            simple_content = Some(match method {
                Derivation::Extension => base_simple,
                Derivation::Restriction => {
                    let (whitespace, facets) = self.facets(ctx, derivation)?;
                    Arc::new(SimpleType::restrict(&base_simple, Some(type_name.clone()), whitespace, facets))
                }
            });
            self.attributes(ctx, derivation, &mut attributes)?;
            base = Some((self.qname(&base_ns, &base_local), method));
        } else if let Some(content) = xs_child(node, "complexContent") {
            if content.attribute("mixed").is_some() {
                mixed = bool_attribute(content, "mixed");
            }
            let (derivation, method) = derivation_of(content)
                .ok_or_else(|| self.malformed(ctx, content, "complexContent requires extension or restriction"))?;
            let (base_ns, base_local) = self.reference(ctx, derivation, "base")?;
            let base_type = self.complex_type_by_name(ctx, derivation, &base_ns, &base_local)?;
            let own = self.content_particle(ctx, derivation)?;
            attributes = AttributeSet::inherited(&base_type);
            particle = match method {
                Derivation::Extension => match (base_type.particle.as_deref().cloned(), own) {
                    (None, own) => own,
                    (Some(inherited), None) => Some(inherited),
                    (Some(inherited), Some(own)) => {
                        Some(Particle::once(Term::Sequence(vec![inherited, own])))
                    }
                },
                Derivation::Restriction => {
                    restricted_from = Some(Arc::clone(&base_type));
                    own
                }
            };
            self.attributes(ctx, derivation, &mut attributes)?;
            base = Some((self.qname(&base_ns, &base_local), method));
        } else {
            particle = self.content_particle(ctx, node)?;
            self.attributes(ctx, node, &mut attributes)?;
        }

        let mut constraint_violations = Vec::new();
        let content = if let Some(simple) = simple_content {
            ContentType::Simple(simple)
        } else {
            match &particle {
                None if mixed => ContentType::Mixed(Arc::new(ContentModel::empty())),
                None => ContentType::Empty,
                Some(particle) => {
                    let model = ContentModel::build(particle).map_err(|error| match error {
                        ModelError::Invalid(details) => {
                            self.malformed(ctx, node, format!("{type_name}: {details}"))
                        }
                        ModelError::TooLarge => self.unsupported(ctx, node, format!("{type_name}: {error}")),
                    })?;
                    constraint_violations.extend(model.unique_attribution_violation());
                    constraint_violations.extend(model.element_consistency_violation(&type_name));
                    if let Some(violation) = restricted_from
                        .as_deref()
                        .and_then(|base_type| restriction_violation(&type_name, &model, base_type))
                    {
                        constraint_violations.push(violation);
                    }
                    if mixed {
                        ContentType::Mixed(Arc::new(model))
                    } else {
                        ContentType::ElementOnly(Arc::new(model))
                    }
                }
            }
        };

        Ok(ComplexType {
            name,
            base,
            is_abstract: bool_attribute(node, "abstract"),
            particle: particle.map(Arc::new),
            mixed,
            content,
            attributes: attributes.uses,
            attribute_wildcard: attributes.wildcard,
            constraint_violations,
        })
    }

    fn content_particle(&mut self, ctx: usize, node: Node<'a, 'input>) -> SchemaResult<Option<Particle>> {
        match xs_children(node).find(|child| {
            matches!(child.tag_name().name(), "group" | "all" | "choice" | "sequence")
        }) {
            Some(child) => self.particle(ctx, child),
            None => Ok(None),
        }
    }

    fn particle(&mut self, ctx: usize, node: Node<'a, 'input>) -> SchemaResult<Option<Particle>> {
        let (min, max) = self.occurs(ctx, node)?;
        let term = match node.tag_name().name() {
            "element" => match node.attribute("ref") {
                Some(reference) => {
                    let (ns, local) = self.resolve_qname(ctx, node, reference)?;
                    let known = self
                        .index
                        .contains_key(&(Kind::Element, ns.clone(), local.clone()))
                        || self.pool.element(&ns, &local).is_some();
                    if !known {
                        return Err(self.unresolved(ctx, node, "element declaration", &ns, &local));
                    }
                    Term::Element(ElementTerm::Global(self.qname(&ns, &local)))
                }
                None => {
                    let decl = self.element_decl(ctx, node, false)?;
                    Term::Element(ElementTerm::Local(Arc::new(decl)))
                }
            },
            "any" => Term::Wildcard(self.wildcard(ctx, node)),
            "group" => {
                let (ns, local) = self.reference(ctx, node, "ref")?;
                let group = self.group_by_name(ctx, node, &ns, &local)?;
                return Ok(Some(Particle::new(group.term.clone(), min, max)));
            }
            "sequence" => Term::Sequence(self.child_particles(ctx, node)?),
            "choice" => Term::Choice(self.child_particles(ctx, node)?),
            "all" => Term::All(self.child_particles(ctx, node)?),
            _ => return Ok(None),
        };
        Ok(Some(Particle::new(term, min, max)))
    }

    fn child_particles(&mut self, ctx: usize, node: Node<'a, 'input>) -> SchemaResult<Vec<Particle>> {
        let mut particles = Vec::new();
        for child in xs_children(node) {
            if let Some(particle) = self.particle(ctx, child)? {
                particles.push(particle);
            }
        }
        Ok(particles)
    }

    fn group_by_name(
        &mut self,
        ctx: usize,
        node: Node<'_, '_>,
        namespace: &str,
        local: &str,
    ) -> SchemaResult<Arc<Particle>> {
        let name_key = (namespace.to_string(), local.to_string());
        if let Some(group) = self.groups.get(&name_key) {
            return Ok(Arc::clone(group));
        }
        let key = (Kind::Group, namespace.to_string(), local.to_string());
        if let Some(&(def_ctx, definition)) = self.index.get(&key) {
            self.enter(def_ctx, definition, &key)?;
            let model_group = xs_children(definition)
                .find(|child| matches!(child.tag_name().name(), "all" | "choice" | "sequence"))
                .ok_or_else(|| self.malformed(def_ctx, definition, format!("group '{local}' has no model group")))?;
            let term = match model_group.tag_name().name() {
                "sequence" => Term::Sequence(self.child_particles(def_ctx, model_group)?),
                "choice" => Term::Choice(self.child_particles(def_ctx, model_group)?),
                _ => Term::All(self.child_particles(def_ctx, model_group)?),
            };
            self.in_progress.remove(&key);
            let group = Arc::new(Particle::once(term));
            self.groups.insert(name_key, Arc::clone(&group));
            return Ok(group);
        }
        self.pool
            .group(namespace, local)
            .cloned()
            .ok_or_else(|| self.unresolved(ctx, node, "group", namespace, local))
    }

    fn attributes(&mut self, ctx: usize, parent: Node<'a, 'input>, set: &mut AttributeSet) -> SchemaResult<()> {
        for child in xs_children(parent) {
            match child.tag_name().name() {
                "attribute" => {
                    let usage = child.attribute("use").unwrap_or("optional");
                    let decl = self.attribute_use(ctx, child)?;
                    if usage == "prohibited" {
                        set.remove(&decl.name);
                    } else {
                        set.upsert(AttributeUse {
                            decl,
                            required: usage == "required",
                        });
                    }
                }
                "attributeGroup" => {
                    let (ns, local) = self.reference(ctx, child, "ref")?;
                    let group = self.attribute_group_by_name(ctx, child, &ns, &local)?;
                    for attribute in &group.attributes {
                        set.upsert(attribute.clone());
                    }
                    if set.wildcard.is_none() {
                        set.wildcard = group.wildcard.clone();
                    }
                }
                "anyAttribute" => set.wildcard = Some(self.wildcard(ctx, child)),
                _ => {}
            }
        }
        Ok(())
    }

    fn attribute_use(&mut self, ctx: usize, node: Node<'a, 'input>) -> SchemaResult<Arc<AttributeDecl>> {
        if let Some(reference) = node.attribute("ref") {
            let (ns, local) = self.resolve_qname(ctx, node, reference)?;
            let global = self.global_attribute(ctx, node, &ns, &local)?;
            if node.attribute("default").is_none() && node.attribute("fixed").is_none() {
                return Ok(global);
            }
            let mut decl = (*global).clone();
            decl.default = node.attribute("default").map(str::to_string);
            decl.fixed = node.attribute("fixed").map(str::to_string);
            return Ok(Arc::new(decl));
        }
        Ok(Arc::new(self.attribute_decl(ctx, node, false)?))
    }

    fn attribute_decl(&mut self, ctx: usize, node: Node<'a, 'input>, global: bool) -> SchemaResult<AttributeDecl> {
        let local = node
            .attribute("name")
            .ok_or_else(|| self.malformed(ctx, node, "attribute requires a 'name' or 'ref'"))?;
        let qualified = match node.attribute("form") {
            Some(form) => form == "qualified",
            None => self.docs[ctx].attributes_qualified,
        };
        let namespace = if global || qualified {
            self.docs[ctx].target_namespace.clone()
        } else {
            String::new()
        };
        let simple_type = if let Some(type_name) = node.attribute("type") {
            let (ns, type_local) = self.resolve_qname(ctx, node, type_name)?;
            self.simple_type_by_name(ctx, node, &ns, &type_local)?
        } else if let Some(inline) = xs_child(node, "simpleType") {
            Arc::new(self.simple_type(ctx, inline, None)?)
        } else {
            Arc::new(SimpleType::builtin(Builtin::AnySimpleType))
        };

        Ok(AttributeDecl {
            name: self.qname(&namespace, local),
            simple_type,
            default: node.attribute("default").map(str::to_string),
            fixed: node.attribute("fixed").map(str::to_string),
        })
    }

    fn global_attribute(
        &mut self,
        ctx: usize,
        node: Node<'_, '_>,
        namespace: &str,
        local: &str,
    ) -> SchemaResult<Arc<AttributeDecl>> {
        if namespace == XML_NAMESPACE {
            return Ok(Arc::new(AttributeDecl {
                name: self.qname(namespace, local),
                simple_type: Arc::new(SimpleType::builtin(Builtin::String)),
                default: None,
                fixed: None,
            }));
        }
        let name_key = (namespace.to_string(), local.to_string());
        if let Some(decl) = self.attributes.get(&name_key) {
            return Ok(Arc::clone(decl));
        }
        let key = (Kind::Attribute, namespace.to_string(), local.to_string());
        if let Some(&(def_ctx, definition)) = self.index.get(&key) {
            let decl = Arc::new(self.attribute_decl(def_ctx, definition, true)?);
            self.attributes.insert(name_key, Arc::clone(&decl));
            return Ok(decl);
        }
        self.pool
            .attribute(namespace, local)
            .cloned()
            .ok_or_else(|| self.unresolved(ctx, node, "attribute declaration", namespace, local))
    }

    fn attribute_group_by_name(
        &mut self,
        ctx: usize,
        node: Node<'_, '_>,
        namespace: &str,
        local: &str,
    ) -> SchemaResult<Arc<AttributeGroup>> {
        let name_key = (namespace.to_string(), local.to_string());
        if let Some(group) = self.attribute_groups.get(&name_key) {
            return Ok(Arc::clone(group));
        }
        let key = (Kind::AttributeGroup, namespace.to_string(), local.to_string());
        if let Some(&(def_ctx, definition)) = self.index.get(&key) {
            self.enter(def_ctx, definition, &key)?;
            let mut set = AttributeSet::default();
            self.attributes(def_ctx, definition, &mut set)?;
            self.in_progress.remove(&key);
            let group = Arc::new(AttributeGroup {
                attributes: set.uses,
                wildcard: set.wildcard,
            });
            self.attribute_groups.insert(name_key, Arc::clone(&group));
            return Ok(group);
        }
        self.pool
            .attribute_group(namespace, local)
            .cloned()
            .ok_or_else(|| self.unresolved(ctx, node, "attributeGroup", namespace, local))
    }
}

fn derivation_of<'a, 'input>(content: Node<'a, 'input>) -> Option<(Node<'a, 'input>, Derivation)> {
    xs_child(content, "extension")
        .map(|node| (node, Derivation::Extension))
        .or_else(|| xs_child(content, "restriction").map(|node| (node, Derivation::Restriction)))
}

/// Simplified particle-restriction check: every element the restriction
/// allows must be admitted by the base content model.
fn restriction_violation(type_name: &str, model: &ContentModel, base: &ComplexType) -> Option<String> {
    let base_model = match &base.content {
        ContentType::ElementOnly(model) | ContentType::Mixed(model) => model,
        _ => {
            return (!model.element_names().is_empty()).then(|| {
                format!(
                    "derivation-ok-restriction.5.4.2: Error for type '{type_name}'. The particle of the type is not a valid restriction of the particle of the base."
                )
            });
        }
    };
    model
        .element_names()
        .iter()
        .any(|name| !base_model.admits(name))
        .then(|| {
            format!(
                "derivation-ok-restriction.5.4.2: Error for type '{type_name}'. The particle of the type is not a valid restriction of the particle of the base."
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::NO_NAMESPACE;

    const ORDER_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
            xmlns:tns="urn:ex" targetNamespace="urn:ex" elementFormDefault="qualified">
        <xs:element name="Order" type="tns:OrderType"/>
        <xs:complexType name="OrderType">
            <xs:sequence>
                <xs:element name="Id" type="xs:int"/>
                <xs:element name="Note" type="xs:string" minOccurs="0"/>
            </xs:sequence>
            <xs:attribute name="version" type="xs:string" use="required"/>
        </xs:complexType>
    </xs:schema>"#;

    fn compile(sources: Vec<SchemaSource>) -> SchemaResult<GrammarBundle> {
        XsdGrammarCompiler::new()
            .with_location_discovery(false)
            .compile(&SchemaSetIdentity::new("test"), &sources)
    }

    #[test]
    fn test_compile_single_schema() {
        let bundle = compile(vec![SchemaSource::from_string("order.xsd", ORDER_XSD)]).unwrap();
        assert!(bundle.is_valid_namespace("urn:ex"));
        assert!(!bundle.is_valid_namespace(NO_NAMESPACE));

        let order = bundle.pool.element("urn:ex", "Order").unwrap();
        let Some(TypeDefinition::Complex(order_type)) = bundle.pool.resolve_type(&order.type_ref) else {
            panic!("expected complex type");
        };
        assert_eq!(order_type.attributes.len(), 1);
        assert!(order_type.attributes[0].required);
        assert!(bundle.symbols.contains("Order"));
    }

    #[test]
    fn test_no_namespace_schema_registers_marker() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:element name="root" type="xs:string"/>
        </xs:schema>"#;
        let bundle = compile(vec![SchemaSource::from_string("root.xsd", xsd)]).unwrap();
        assert!(bundle.is_valid_namespace(NO_NAMESPACE));
        assert!(bundle.pool.element("", "root").is_some());
    }

    #[test]
    fn test_dependency_is_deferred_until_available() {
        let common = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                targetNamespace="urn:common">
            <xs:simpleType name="Code">
                <xs:restriction base="xs:string"><xs:length value="3"/></xs:restriction>
            </xs:simpleType>
        </xs:schema>"#;
        let main = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                xmlns:c="urn:common" targetNamespace="urn:main">
            <xs:import namespace="urn:common"/>
            <xs:element name="Code" type="c:Code"/>
        </xs:schema>"#;

        let bundle = compile(vec![
            SchemaSource::from_string("main.xsd", main),
            SchemaSource::from_string("common.xsd", common),
        ])
        .unwrap();
        assert!(bundle.is_valid_namespace("urn:main"));
        assert!(bundle.is_valid_namespace("urn:common"));
    }

    #[test]
    fn test_mutual_references_compile_in_final_pass() {
        let a = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                xmlns:b="urn:b" targetNamespace="urn:a">
            <xs:import namespace="urn:b"/>
            <xs:element name="A" type="b:BType"/>
            <xs:complexType name="AType"><xs:sequence/></xs:complexType>
        </xs:schema>"#;
        let b = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                xmlns:a="urn:a" targetNamespace="urn:b">
            <xs:import namespace="urn:a"/>
            <xs:complexType name="BType">
                <xs:complexContent><xs:extension base="a:AType"/></xs:complexContent>
            </xs:complexType>
        </xs:schema>"#;

        let bundle = compile(vec![
            SchemaSource::from_string("a.xsd", a),
            SchemaSource::from_string("b.xsd", b),
        ])
        .unwrap();
        assert!(bundle.pool.element("urn:a", "A").is_some());
        assert!(bundle.pool.type_definition("urn:b", "BType").is_some());
    }

    #[test]
    fn test_unresolved_reference_is_fatal_after_stabilization() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                xmlns:m="urn:missing" targetNamespace="urn:ex">
            <xs:element name="X" type="m:Nothing"/>
        </xs:schema>"#;
        let err = compile(vec![SchemaSource::from_string("broken.xsd", xsd)]).unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvedReference { .. }));
        assert_eq!(err.system_id(), Some("broken.xsd"));
    }

    #[test]
    fn test_malformed_schema_names_source() {
        let err = compile(vec![SchemaSource::from_string("bad.xsd", "<xs:schema")]).unwrap_err();
        assert!(matches!(err, SchemaError::Malformed { .. }));
        assert!(err.to_string().contains("bad.xsd"));

        let err = compile(vec![SchemaSource::from_string("notxsd.xsd", "<root/>")]).unwrap_err();
        assert!(err.to_string().contains("xs:schema"));
    }

    #[test]
    fn test_no_sources() {
        let err = compile(Vec::new()).unwrap_err();
        assert!(matches!(err, SchemaError::NoSources { .. }));
    }

    #[test]
    fn test_include_from_source_set() {
        let main = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                xmlns:t="urn:t" targetNamespace="urn:t">
            <xs:include schemaLocation="types.xsd"/>
            <xs:element name="Root" type="t:RootType"/>
        </xs:schema>"#;
        let types = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:complexType name="RootType"><xs:sequence/></xs:complexType>
        </xs:schema>"#;

        let bundle = compile(vec![
            SchemaSource::from_string("schemas/main.xsd", main),
            SchemaSource::from_string("schemas/types.xsd", types),
        ])
        .unwrap();
        assert!(bundle.pool.type_definition("urn:t", "RootType").is_some());
    }

    #[test]
    fn test_invalid_pattern_reported() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:simpleType name="P">
                <xs:restriction base="xs:string"><xs:pattern value="[a-"/></xs:restriction>
            </xs:simpleType>
        </xs:schema>"#;
        let err = compile(vec![SchemaSource::from_string("p.xsd", xsd)]).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidPattern { .. }));
    }

    #[test]
    fn test_upa_violation_recorded() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:complexType name="Ambiguous">
                <xs:sequence>
                    <xs:element name="a" type="xs:string" minOccurs="0"/>
                    <xs:element name="a" type="xs:string"/>
                </xs:sequence>
            </xs:complexType>
        </xs:schema>"#;
        let bundle = compile(vec![SchemaSource::from_string("upa.xsd", xsd)]).unwrap();
        let Some(TypeDefinition::Complex(ambiguous)) = bundle.pool.type_definition("", "Ambiguous") else {
            panic!("expected complex type");
        };
        assert_eq!(ambiguous.constraint_violations.len(), 1);
    }

    #[test]
    fn test_unexpandable_occurrences_are_refused() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:complexType name="Grid">
                <xs:sequence maxOccurs="1000">
                    <xs:element name="cell" type="xs:string" maxOccurs="1000"/>
                </xs:sequence>
            </xs:complexType>
        </xs:schema>"#;
        let err = compile(vec![SchemaSource::from_string("grid.xsd", xsd)]).unwrap_err();
        assert!(matches!(err, SchemaError::Unsupported { ref system_id, .. } if system_id == "grid.xsd"));
        assert!(err.to_string().contains("Grid"));
    }

    #[test]
    fn test_resolve_location() {
        assert_eq!(resolve_location("schemas/main.xsd", "types.xsd"), "schemas/types.xsd");
        assert_eq!(resolve_location("schemas/main.xsd", "../common/c.xsd"), "common/c.xsd");
        assert_eq!(resolve_location("main.xsd", "./b.xsd"), "b.xsd");
        assert_eq!(
            resolve_location("http://example.com/s/main.xsd", "b.xsd"),
            "http://example.com/s/b.xsd"
        );
    }
}
