//! Compiled schema components and the sealed grammar pool.
//!
//! A [`Grammar`] holds the global components of one target namespace. Grammars
//! are collected in a [`GrammarPoolBuilder`] while a schema set compiles and
//! sealed into an immutable [`GrammarPool`]. The pool, the frozen symbol table
//! and the set of valid namespaces form a [`GrammarBundle`], the unit the
//! grammar cache hands out.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::content_model::{ContentModel, Particle};
use crate::datatypes::{Builtin, SimpleType};
use crate::symbols::{Symbol, SymbolTable};

pub const XS_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Marker registered in the valid namespaces for schemas without a target
/// namespace.
pub const NO_NAMESPACE: &str = "";

/// Opaque key of a combination of schema sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaSetIdentity(String);

impl SchemaSetIdentity {
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaSetIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SchemaSetIdentity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Namespace-qualified name. An empty namespace means "no namespace".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub namespace: Symbol,
    pub local: Symbol,
}

impl QName {
    pub fn new(namespace: Symbol, local: Symbol) -> Self {
        Self { namespace, local }
    }

    pub fn matches(&self, namespace: &str, local: &str) -> bool {
        &*self.namespace == namespace && &*self.local == local
    }

    /// Quoted form used in content-model messages: `"urn:ex":Id` or `Id`.
    pub fn quoted(&self) -> String {
        if self.namespace.is_empty() {
            self.local.to_string()
        } else {
            format!("\"{}\":{}", self.namespace, self.local)
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

/// Reference from a declaration to its type.
#[derive(Debug, Clone)]
pub enum TypeRef {
    /// Global type resolved through the pool when used.
    Named(QName),
    Inline(TypeDefinition),
}

#[derive(Debug, Clone)]
pub enum TypeDefinition {
    Simple(Arc<SimpleType>),
    Complex(Arc<ComplexType>),
}

impl TypeDefinition {
    pub fn display_name(&self) -> String {
        match self {
            TypeDefinition::Simple(simple) => simple.display_name().to_string(),
            TypeDefinition::Complex(complex) => complex
                .name
                .as_ref()
                .map(|name| name.local.to_string())
                .unwrap_or_else(|| "#AnonType".to_string()),
        }
    }

    pub fn name(&self) -> Option<QName> {
        match self {
            TypeDefinition::Simple(_) => None,
            TypeDefinition::Complex(complex) => complex.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    Extension,
    Restriction,
}

#[derive(Debug, Clone)]
pub enum ContentType {
    Empty,
    Simple(Arc<SimpleType>),
    ElementOnly(Arc<ContentModel>),
    Mixed(Arc<ContentModel>),
}

#[derive(Debug, Clone)]
pub struct ComplexType {
    pub name: Option<QName>,
    /// Base type name and derivation method, for `xsi:type` checks.
    pub base: Option<(QName, Derivation)>,
    pub is_abstract: bool,
    /// Source particle, kept so other types can extend this one.
    pub particle: Option<Arc<Particle>>,
    pub mixed: bool,
    pub content: ContentType,
    pub attributes: Vec<AttributeUse>,
    pub attribute_wildcard: Option<Wildcard>,
    /// Schema-component constraint violations found at compile time. Reported
    /// only when full schema checking is requested.
    pub constraint_violations: Vec<String>,
}

impl ComplexType {
    /// `xs:anyType`: mixed content of anything, any attribute, all lax.
    pub fn any_type() -> Arc<ComplexType> {
        static ANY_TYPE: OnceLock<Arc<ComplexType>> = OnceLock::new();
        Arc::clone(ANY_TYPE.get_or_init(|| {
            let wildcard = Wildcard {
                constraint: NamespaceConstraint::Any,
                process: ProcessContents::Lax,
            };
            let particle = Particle::unbounded_wildcard(wildcard.clone());
            let model = ContentModel::build(&particle).unwrap_or_else(|_| ContentModel::empty());
            Arc::new(ComplexType {
                name: None,
                base: None,
                is_abstract: false,
                particle: Some(Arc::new(particle)),
                mixed: true,
                content: ContentType::Mixed(Arc::new(model)),
                attributes: Vec::new(),
                attribute_wildcard: Some(wildcard),
                constraint_violations: Vec::new(),
            })
        }))
    }

    pub fn find_attribute(&self, namespace: &str, local: &str) -> Option<&AttributeUse> {
        self.attributes
            .iter()
            .find(|attribute| attribute.decl.name.matches(namespace, local))
    }
}

#[derive(Debug, Clone)]
pub struct ElementDecl {
    pub name: QName,
    pub type_ref: TypeRef,
    pub nillable: bool,
    pub default: Option<String>,
    pub fixed: Option<String>,
    pub is_abstract: bool,
}

#[derive(Debug, Clone)]
pub struct AttributeDecl {
    pub name: QName,
    pub simple_type: Arc<SimpleType>,
    pub default: Option<String>,
    pub fixed: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AttributeUse {
    pub decl: Arc<AttributeDecl>,
    pub required: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AttributeGroup {
    pub attributes: Vec<AttributeUse>,
    pub wildcard: Option<Wildcard>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceConstraint {
    Any,
    /// `##other`: any namespace except the target namespace and no namespace.
    Other(Symbol),
    /// Explicit list; the empty symbol stands for `##local`.
    List(Vec<Symbol>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessContents {
    Strict,
    Lax,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wildcard {
    pub constraint: NamespaceConstraint,
    pub process: ProcessContents,
}

impl Wildcard {
    pub fn allows(&self, namespace: &str) -> bool {
        match &self.constraint {
            NamespaceConstraint::Any => true,
            NamespaceConstraint::Other(target) => {
                !namespace.is_empty() && namespace != &**target
            }
            NamespaceConstraint::List(allowed) => {
                allowed.iter().any(|candidate| &**candidate == namespace)
            }
        }
    }

    /// Whether two wildcards admit at least one common namespace.
    pub fn overlaps(&self, other: &Wildcard) -> bool {
        match (&self.constraint, &other.constraint) {
            (NamespaceConstraint::Any, _) | (_, NamespaceConstraint::Any) => true,
            (NamespaceConstraint::Other(_), NamespaceConstraint::Other(_)) => true,
            (NamespaceConstraint::List(list), _) => list.iter().any(|ns| other.allows(ns)),
            (_, NamespaceConstraint::List(list)) => list.iter().any(|ns| self.allows(ns)),
        }
    }

    pub fn describe(&self) -> String {
        match &self.constraint {
            NamespaceConstraint::Any => "WC[##any]".to_string(),
            NamespaceConstraint::Other(target) => format!("WC[##other:\"{target}\"]"),
            NamespaceConstraint::List(list) => {
                let names: Vec<String> = list
                    .iter()
                    .map(|ns| {
                        if ns.is_empty() {
                            "\"\"".to_string()
                        } else {
                            format!("\"{ns}\"")
                        }
                    })
                    .collect();
                format!("WC[{}]", names.join(","))
            }
        }
    }
}

/// Global components of one target namespace.
#[derive(Debug, Clone)]
pub struct Grammar {
    pub target_namespace: Symbol,
    /// System ids of the schema documents merged into this grammar.
    pub system_ids: Vec<String>,
    /// Namespaces imported directly by this grammar's documents.
    pub imports: Vec<Symbol>,
    pub elements: HashMap<Symbol, Arc<ElementDecl>>,
    pub types: HashMap<Symbol, TypeDefinition>,
    pub attributes: HashMap<Symbol, Arc<AttributeDecl>>,
    pub groups: HashMap<Symbol, Arc<Particle>>,
    pub attribute_groups: HashMap<Symbol, Arc<AttributeGroup>>,
}

impl Grammar {
    pub fn new(target_namespace: Symbol, system_id: impl Into<String>) -> Self {
        Self {
            target_namespace,
            system_ids: vec![system_id.into()],
            imports: Vec::new(),
            elements: HashMap::new(),
            types: HashMap::new(),
            attributes: HashMap::new(),
            groups: HashMap::new(),
            attribute_groups: HashMap::new(),
        }
    }

    /// Add the components of `other` that this grammar does not define yet.
    pub fn merge(&mut self, other: Grammar) {
        for system_id in other.system_ids {
            if !self.system_ids.contains(&system_id) {
                self.system_ids.push(system_id);
            }
        }
        for import in other.imports {
            if !self.imports.contains(&import) {
                self.imports.push(import);
            }
        }
        for (name, decl) in other.elements {
            self.elements.entry(name).or_insert(decl);
        }
        for (name, definition) in other.types {
            self.types.entry(name).or_insert(definition);
        }
        for (name, decl) in other.attributes {
            self.attributes.entry(name).or_insert(decl);
        }
        for (name, group) in other.groups {
            self.groups.entry(name).or_insert(group);
        }
        for (name, group) in other.attribute_groups {
            self.attribute_groups.entry(name).or_insert(group);
        }
    }
}

/// Lookup of global components by namespace and local name.
pub trait ComponentLookup {
    fn grammar(&self, namespace: &str) -> Option<&Grammar>;

    fn element(&self, namespace: &str, local: &str) -> Option<&Arc<ElementDecl>> {
        self.grammar(namespace)?.elements.get(local)
    }

    fn type_definition(&self, namespace: &str, local: &str) -> Option<TypeDefinition> {
        if namespace == XS_NAMESPACE {
            return builtin_type(local);
        }
        self.grammar(namespace)?.types.get(local).cloned()
    }

    fn attribute(&self, namespace: &str, local: &str) -> Option<&Arc<AttributeDecl>> {
        self.grammar(namespace)?.attributes.get(local)
    }

    fn group(&self, namespace: &str, local: &str) -> Option<&Arc<Particle>> {
        self.grammar(namespace)?.groups.get(local)
    }

    fn attribute_group(&self, namespace: &str, local: &str) -> Option<&Arc<AttributeGroup>> {
        self.grammar(namespace)?.attribute_groups.get(local)
    }
}

/// Built-in type of the XML Schema namespace by local name.
pub fn builtin_type(local: &str) -> Option<TypeDefinition> {
    if local == "anyType" {
        return Some(TypeDefinition::Complex(ComplexType::any_type()));
    }
    if let Some(builtin) = Builtin::from_local_name(local) {
        return Some(TypeDefinition::Simple(Arc::new(SimpleType::builtin(builtin))));
    }
    Builtin::list_item_for(local)
        .map(|item| TypeDefinition::Simple(Arc::new(SimpleType::builtin_list(local, item))))
}

/// Mutable pool used while a schema set compiles.
#[derive(Debug, Default)]
pub struct GrammarPoolBuilder {
    grammars: HashMap<Symbol, Grammar>,
}

impl GrammarPoolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a grammar; grammars of the same namespace are merged, first
    /// definition wins.
    pub fn insert(&mut self, grammar: Grammar) {
        match self.grammars.get_mut(&grammar.target_namespace) {
            Some(existing) => existing.merge(grammar),
            None => {
                self.grammars
                    .insert(Arc::clone(&grammar.target_namespace), grammar);
            }
        }
    }

    pub fn contains_namespace(&self, namespace: &str) -> bool {
        self.grammars.contains_key(namespace)
    }

    /// Namespaces reachable from `namespace` through imports, itself included.
    pub fn transitive_namespaces(&self, namespace: &str) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut stack = vec![namespace.to_string()];
        let mut ordered = Vec::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(grammar) = self.grammars.get(current.as_str()) {
                for import in &grammar.imports {
                    stack.push(import.to_string());
                }
            }
            ordered.push(current);
        }
        ordered
    }

    pub fn len(&self) -> usize {
        self.grammars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grammars.is_empty()
    }

    pub fn seal(self) -> GrammarPool {
        GrammarPool {
            grammars: self
                .grammars
                .into_iter()
                .map(|(namespace, grammar)| (namespace, Arc::new(grammar)))
                .collect(),
        }
    }
}

impl ComponentLookup for GrammarPoolBuilder {
    fn grammar(&self, namespace: &str) -> Option<&Grammar> {
        self.grammars.get(namespace)
    }
}

/// Sealed, immutable pool of grammars.
#[derive(Debug, Default)]
pub struct GrammarPool {
    grammars: HashMap<Symbol, Arc<Grammar>>,
}

impl GrammarPool {
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.grammars.keys().map(|namespace| &**namespace)
    }

    pub fn len(&self) -> usize {
        self.grammars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grammars.is_empty()
    }

    /// Resolve a type reference to its definition.
    pub fn resolve_type(&self, type_ref: &TypeRef) -> Option<TypeDefinition> {
        match type_ref {
            TypeRef::Inline(definition) => Some(definition.clone()),
            TypeRef::Named(name) => self.type_definition(&name.namespace, &name.local),
        }
    }

    /// Whether the named type `derived` is `base` or derives from it.
    pub fn is_derived_from(&self, derived: &TypeDefinition, base: &TypeDefinition) -> bool {
        match (derived, base) {
            (_, TypeDefinition::Complex(base)) if Arc::ptr_eq(base, &ComplexType::any_type()) => {
                true
            }
            (TypeDefinition::Simple(derived), TypeDefinition::Simple(base)) => {
                base.primitive() == Some(Builtin::AnySimpleType)
                    || (derived.name.is_some() && derived.name == base.name)
                    || (derived.primitive().is_some() && derived.primitive() == base.primitive())
            }
            (TypeDefinition::Complex(derived), TypeDefinition::Complex(base)) => {
                let mut current = Some(Arc::clone(derived));
                let mut hops = 0;
                while let Some(candidate) = current {
                    if Arc::ptr_eq(&candidate, base)
                        || (candidate.name.is_some() && candidate.name == base.name)
                    {
                        return true;
                    }
                    hops += 1;
                    if hops > 64 {
                        return false;
                    }
                    current = candidate.base.as_ref().and_then(|(name, _)| {
                        match self.type_definition(&name.namespace, &name.local) {
                            Some(TypeDefinition::Complex(parent)) => Some(parent),
                            _ => None,
                        }
                    });
                }
                false
            }
            (TypeDefinition::Complex(derived), TypeDefinition::Simple(base)) => {
                matches!(&derived.content, ContentType::Simple(simple) if simple.primitive() == base.primitive())
            }
            _ => false,
        }
    }
}

impl ComponentLookup for GrammarPool {
    fn grammar(&self, namespace: &str) -> Option<&Grammar> {
        self.grammars.get(namespace).map(|grammar| &**grammar)
    }
}

/// Sealed result of compiling one schema set.
#[derive(Debug)]
pub struct GrammarBundle {
    pub identity: SchemaSetIdentity,
    pub symbols: Arc<SymbolTable>,
    pub pool: Arc<GrammarPool>,
    /// Namespaces documents may use; [`NO_NAMESPACE`] marks "no namespace".
    pub valid_namespaces: HashSet<String>,
}

impl GrammarBundle {
    pub fn is_valid_namespace(&self, namespace: &str) -> bool {
        self.valid_namespaces.contains(namespace)
    }
}
