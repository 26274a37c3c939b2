//! Content models of complex types.
//!
//! The particle tree of a complex type is compiled into a Thompson automaton
//! whose transitions carry element or wildcard labels. Validation keeps the
//! epsilon-closed set of active states, so ambiguous models still validate
//! and expected-element lists fall out of the active transitions. `xs:all`
//! groups get a dedicated matcher.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use thiserror::Error;

use crate::grammar::{ElementDecl, QName, TypeRef, Wildcard};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("{0}")]
    Invalid(String),

    #[error(
        "content model needs more than {} automaton states to honour its occurrence bounds",
        MAX_STATES
    )]
    TooLarge,
}

/// Finite occurrence bounds are expanded into exact copies of the term. A
/// model needing more automaton states than this is refused.
pub const MAX_STATES: usize = 200_000;
const MAX_UPA_SUBSETS: usize = 512;

/// Element term of a particle
#[derive(Debug, Clone)]
pub enum ElementTerm {
    Local(Arc<ElementDecl>),
    /// `ref` to a global element, looked up in the pool when matched.
    Global(QName),
}

impl ElementTerm {
    pub fn name(&self) -> &QName {
        match self {
            ElementTerm::Local(decl) => &decl.name,
            ElementTerm::Global(name) => name,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Term {
    Element(ElementTerm),
    Wildcard(Wildcard),
    Sequence(Vec<Particle>),
    Choice(Vec<Particle>),
    All(Vec<Particle>),
}

/// A term with occurrence bounds; `max == None` is unbounded.
#[derive(Debug, Clone)]
pub struct Particle {
    pub min: u32,
    pub max: Option<u32>,
    pub term: Term,
}

impl Particle {
    pub fn new(term: Term, min: u32, max: Option<u32>) -> Self {
        Self { min, max, term }
    }

    pub fn once(term: Term) -> Self {
        Self::new(term, 1, Some(1))
    }

    pub fn unbounded_wildcard(wildcard: Wildcard) -> Self {
        Self::new(Term::Wildcard(wildcard), 0, None)
    }

    /// Whether the particle can match an empty sequence of elements.
    pub fn is_emptiable(&self) -> bool {
        if self.min == 0 {
            return true;
        }
        match &self.term {
            Term::Element(_) | Term::Wildcard(_) => false,
            Term::Sequence(children) | Term::All(children) => {
                children.iter().all(Particle::is_emptiable)
            }
            Term::Choice(children) => children.iter().any(Particle::is_emptiable),
        }
    }
}

/// What an instance element matched.
#[derive(Debug, Clone, Copy)]
pub enum Matched<'a> {
    Element(&'a ElementTerm),
    Wildcard(&'a Wildcard),
}

#[derive(Debug, Clone)]
enum Label {
    Element(ElementTerm),
    Wildcard(Wildcard),
}

impl Label {
    fn accepts(&self, namespace: &str, local: &str) -> bool {
        match self {
            Label::Element(term) => term.name().matches(namespace, local),
            Label::Wildcard(wildcard) => wildcard.allows(namespace),
        }
    }

    fn overlaps(&self, other: &Label) -> bool {
        match (self, other) {
            (Label::Element(a), Label::Element(b)) => a.name() == b.name(),
            (Label::Element(e), Label::Wildcard(w)) | (Label::Wildcard(w), Label::Element(e)) => {
                w.allows(&e.name().namespace)
            }
            (Label::Wildcard(a), Label::Wildcard(b)) => a.overlaps(b),
        }
    }

    fn describe(&self) -> String {
        match self {
            Label::Element(term) => term.name().quoted(),
            Label::Wildcard(wildcard) => wildcard.describe(),
        }
    }

    fn as_matched(&self) -> Matched<'_> {
        match self {
            Label::Element(term) => Matched::Element(term),
            Label::Wildcard(wildcard) => Matched::Wildcard(wildcard),
        }
    }
}

#[derive(Debug, Default)]
struct Nfa {
    labels: Vec<Label>,
    /// Labelled transitions per state: (label index, target state).
    transitions: Vec<Vec<(usize, usize)>>,
    epsilons: Vec<Vec<usize>>,
    start: usize,
    accept: usize,
}

impl Nfa {
    fn new_state(&mut self) -> Result<usize, ModelError> {
        if self.transitions.len() >= MAX_STATES {
            return Err(ModelError::TooLarge);
        }
        self.transitions.push(Vec::new());
        self.epsilons.push(Vec::new());
        Ok(self.transitions.len() - 1)
    }

    fn epsilon(&mut self, from: usize, to: usize) {
        self.epsilons[from].push(to);
    }

    fn fragment(&mut self, particle: &Particle) -> Result<(usize, usize), ModelError> {
        let (min, max) = (particle.min, particle.max);
        if let Some(max) = max
            && max < min
        {
            return Err(ModelError::Invalid(format!(
                "maxOccurs ({max}) is less than minOccurs ({min})"
            )));
        }

        let start = self.new_state()?;
        if max == Some(0) {
            return Ok((start, start));
        }

        let mut current = start;
        for _ in 0..min {
            let (entry, exit) = self.term(&particle.term)?;
            self.epsilon(current, entry);
            current = exit;
        }

        match max {
            None => {
                let hub = self.new_state()?;
                let (entry, exit) = self.term(&particle.term)?;
                self.epsilon(current, hub);
                self.epsilon(hub, entry);
                self.epsilon(exit, hub);
                current = hub;
            }
            Some(max) => {
                // Optional copies are nested so that copy n+1 is only reachable
                // after copy n; skipping one skips the rest.
                let end = self.new_state()?;
                for _ in min..max {
                    self.epsilon(current, end);
                    let (entry, exit) = self.term(&particle.term)?;
                    self.epsilon(current, entry);
                    current = exit;
                }
                self.epsilon(current, end);
                current = end;
            }
        }
        Ok((start, current))
    }

    fn term(&mut self, term: &Term) -> Result<(usize, usize), ModelError> {
        match term {
            Term::Element(element) => self.labelled(Label::Element(element.clone())),
            Term::Wildcard(wildcard) => self.labelled(Label::Wildcard(wildcard.clone())),
            Term::Sequence(children) => {
                let start = self.new_state()?;
                let mut current = start;
                for child in children {
                    let (entry, exit) = self.fragment(child)?;
                    self.epsilon(current, entry);
                    current = exit;
                }
                Ok((start, current))
            }
            Term::Choice(children) => {
                let start = self.new_state()?;
                let end = self.new_state()?;
                for child in children {
                    let (entry, exit) = self.fragment(child)?;
                    self.epsilon(start, entry);
                    self.epsilon(exit, end);
                }
                Ok((start, end))
            }
            Term::All(_) => Err(ModelError::Invalid(
                "xs:all may only appear as the entire content model".to_string(),
            )),
        }
    }

    fn labelled(&mut self, label: Label) -> Result<(usize, usize), ModelError> {
        let start = self.new_state()?;
        let end = self.new_state()?;
        self.labels.push(label);
        self.transitions[start].push((self.labels.len() - 1, end));
        Ok((start, end))
    }

    fn closure(&self, seeds: impl IntoIterator<Item = usize>) -> Vec<usize> {
        let mut seen = vec![false; self.epsilons.len()];
        let mut stack: Vec<usize> = seeds.into_iter().collect();
        let mut closed = Vec::new();
        while let Some(state) = stack.pop() {
            if std::mem::replace(&mut seen[state], true) {
                continue;
            }
            closed.push(state);
            stack.extend(self.epsilons[state].iter().copied());
        }
        closed.sort_unstable();
        closed
    }

    fn outgoing<'a>(&'a self, states: &'a [usize]) -> impl Iterator<Item = (usize, usize)> + 'a {
        states
            .iter()
            .flat_map(move |state| self.transitions[*state].iter().copied())
    }

    fn step(&self, states: &mut Vec<usize>, namespace: &str, local: &str) -> Option<usize> {
        let mut chosen: Option<usize> = None;
        let mut targets = Vec::new();
        for (label, target) in self.outgoing(states) {
            if !self.labels[label].accepts(namespace, local) {
                continue;
            }
            targets.push(target);
            chosen = Some(match chosen {
                None => label,
                Some(current) => self.prefer(current, label),
            });
        }
        let chosen = chosen?;
        *states = self.closure(targets);
        Some(chosen)
    }

    /// Element declarations win over wildcards, then the earlier particle.
    fn prefer(&self, a: usize, b: usize) -> usize {
        match (&self.labels[a], &self.labels[b]) {
            (Label::Wildcard(_), Label::Element(_)) => b,
            (Label::Element(_), Label::Wildcard(_)) => a,
            _ => a.min(b),
        }
    }

    fn expected(&self, states: &[usize]) -> Vec<String> {
        let mut labels: Vec<usize> = self.outgoing(states).map(|(label, _)| label).collect();
        labels.sort_unstable();
        let mut seen = HashSet::new();
        labels
            .into_iter()
            .map(|label| self.labels[label].describe())
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }

    fn unique_attribution_violation(&self) -> Option<String> {
        let initial = self.closure([self.start]);
        let mut visited: HashSet<Vec<usize>> = HashSet::new();
        let mut queue = VecDeque::from([initial]);

        while let Some(states) = queue.pop_front() {
            if visited.len() >= MAX_UPA_SUBSETS {
                break;
            }
            if !visited.insert(states.clone()) {
                continue;
            }
            let mut labels: Vec<usize> = self.outgoing(&states).map(|(label, _)| label).collect();
            labels.sort_unstable();
            labels.dedup();

            for (i, a) in labels.iter().enumerate() {
                for b in &labels[i + 1..] {
                    if self.labels[*a].overlaps(&self.labels[*b]) {
                        return Some(format!(
                            "cos-nonambig: {} and {} (or elements from their substitution group) violate \"Unique Particle Attribution\". During validation against this schema, ambiguity would be created for those two particles.",
                            self.labels[*a].describe(),
                            self.labels[*b].describe()
                        ));
                    }
                }
            }

            for label in &labels {
                let targets = self
                    .outgoing(&states)
                    .filter(|(other, _)| self.labels[*label].overlaps(&self.labels[*other]))
                    .map(|(_, target)| target);
                let next = self.closure(targets);
                if !visited.contains(&next) {
                    queue.push_back(next);
                }
            }
        }
        None
    }
}

#[derive(Debug)]
struct AllModel {
    members: Vec<(Label, bool)>,
    emptiable: bool,
}

/// Compiled content model of a complex type.
#[derive(Debug)]
pub struct ContentModel {
    kind: ModelKind,
}

#[derive(Debug)]
enum ModelKind {
    Empty,
    Automaton(Nfa),
    All(AllModel),
}

/// Per-element matching state, owned by the validation session.
#[derive(Debug, Clone)]
pub enum ModelState {
    Empty,
    Automaton(Vec<usize>),
    All(Vec<bool>),
}

impl ContentModel {
    /// A model that admits no child elements.
    pub fn empty() -> Self {
        Self {
            kind: ModelKind::Empty,
        }
    }

    pub fn build(particle: &Particle) -> Result<Self, ModelError> {
        if let Term::All(children) = &particle.term {
            if particle.max.is_none_or(|max| max > 1) {
                return Err(ModelError::Invalid(
                    "xs:all must have maxOccurs of 1".to_string(),
                ));
            }
            let mut members = Vec::with_capacity(children.len());
            for child in children {
                let Term::Element(element) = &child.term else {
                    return Err(ModelError::Invalid(
                        "xs:all may only contain element particles".to_string(),
                    ));
                };
                if child.max.is_none_or(|max| max > 1) {
                    return Err(ModelError::Invalid(format!(
                        "element '{}' in xs:all must have maxOccurs of 0 or 1",
                        element.name().local
                    )));
                }
                if child.max != Some(0) {
                    members.push((Label::Element(element.clone()), child.min > 0));
                }
            }
            return Ok(Self {
                kind: ModelKind::All(AllModel {
                    members,
                    emptiable: particle.min == 0,
                }),
            });
        }

        let mut nfa = Nfa::default();
        let (start, accept) = nfa.fragment(particle)?;
        nfa.start = start;
        nfa.accept = accept;
        Ok(Self {
            kind: ModelKind::Automaton(nfa),
        })
    }

    pub fn start(&self) -> ModelState {
        match &self.kind {
            ModelKind::Empty => ModelState::Empty,
            ModelKind::Automaton(nfa) => ModelState::Automaton(nfa.closure([nfa.start])),
            ModelKind::All(all) => ModelState::All(vec![false; all.members.len()]),
        }
    }

    /// Advance `state` over a child element. Returns `None`, leaving the state
    /// untouched, when the element is not allowed here.
    pub fn step<'a>(
        &'a self,
        state: &mut ModelState,
        namespace: &str,
        local: &str,
    ) -> Option<Matched<'a>> {
        match (&self.kind, state) {
            (ModelKind::Automaton(nfa), ModelState::Automaton(states)) => nfa
                .step(states, namespace, local)
                .map(|label| nfa.labels[label].as_matched()),
            (ModelKind::All(all), ModelState::All(seen)) => {
                let index = all
                    .members
                    .iter()
                    .enumerate()
                    .position(|(i, (label, _))| !seen[i] && label.accepts(namespace, local))?;
                seen[index] = true;
                Some(all.members[index].0.as_matched())
            }
            _ => None,
        }
    }

    pub fn is_accepting(&self, state: &ModelState) -> bool {
        match (&self.kind, state) {
            (ModelKind::Automaton(nfa), ModelState::Automaton(states)) => {
                states.binary_search(&nfa.accept).is_ok()
            }
            (ModelKind::All(all), ModelState::All(seen)) => {
                let none_seen = seen.iter().all(|seen| !seen);
                (none_seen && all.emptiable)
                    || all
                        .members
                        .iter()
                        .zip(seen)
                        .all(|((_, required), seen)| !required || *seen)
            }
            _ => true,
        }
    }

    /// Names of the elements allowed next, in model order.
    pub fn expected(&self, state: &ModelState) -> Vec<String> {
        match (&self.kind, state) {
            (ModelKind::Automaton(nfa), ModelState::Automaton(states)) => nfa.expected(states),
            (ModelKind::All(all), ModelState::All(seen)) => all
                .members
                .iter()
                .zip(seen)
                .filter(|(_, seen)| !**seen)
                .map(|((label, _), _)| label.describe())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Whether `name` is admitted by some particle of the model.
    pub fn admits(&self, name: &QName) -> bool {
        self.labels()
            .any(|label| label.accepts(&name.namespace, &name.local))
    }

    /// Names of all element particles of the model.
    pub fn element_names(&self) -> Vec<QName> {
        let mut names: Vec<QName> = Vec::new();
        for label in self.labels() {
            if let Label::Element(term) = label {
                if !names.contains(term.name()) {
                    names.push(term.name().clone());
                }
            }
        }
        names
    }

    /// Unique Particle Attribution check. Large models are only explored up to
    /// a bounded number of determinized states.
    pub fn unique_attribution_violation(&self) -> Option<String> {
        match &self.kind {
            ModelKind::Automaton(nfa) => nfa.unique_attribution_violation(),
            ModelKind::All(all) => {
                for (i, (a, _)) in all.members.iter().enumerate() {
                    for (b, _) in &all.members[i + 1..] {
                        if a.overlaps(b) {
                            return Some(format!(
                                "cos-nonambig: {} and {} (or elements from their substitution group) violate \"Unique Particle Attribution\". During validation against this schema, ambiguity would be created for those two particles.",
                                a.describe(),
                                b.describe()
                            ));
                        }
                    }
                }
                None
            }
            ModelKind::Empty => None,
        }
    }

    /// Element Declarations Consistent: local elements sharing a name must
    /// share a type.
    pub fn element_consistency_violation(&self, type_name: &str) -> Option<String> {
        let locals: Vec<&Arc<ElementDecl>> = self
            .labels()
            .filter_map(|label| match label {
                Label::Element(ElementTerm::Local(decl)) => Some(decl),
                _ => None,
            })
            .collect();

        for (i, a) in locals.iter().enumerate() {
            for b in &locals[i + 1..] {
                if a.name == b.name && !same_type(&a.type_ref, &b.type_ref) {
                    return Some(format!(
                        "cos-element-consistent: Error for type '{}'. Multiple elements with name '{}', with different types, appear in the model group.",
                        type_name, a.name.local
                    ));
                }
            }
        }
        None
    }

    fn labels(&self) -> Box<dyn Iterator<Item = &Label> + '_> {
        match &self.kind {
            ModelKind::Empty => Box::new(std::iter::empty()),
            ModelKind::Automaton(nfa) => Box::new(nfa.labels.iter()),
            ModelKind::All(all) => Box::new(all.members.iter().map(|(label, _)| label)),
        }
    }
}

fn same_type(a: &TypeRef, b: &TypeRef) -> bool {
    use crate::grammar::TypeDefinition;
    match (a, b) {
        (TypeRef::Named(a), TypeRef::Named(b)) => a == b,
        (TypeRef::Inline(TypeDefinition::Simple(a)), TypeRef::Inline(TypeDefinition::Simple(b))) => {
            Arc::ptr_eq(a, b) || (a.name.is_some() && a.name == b.name)
        }
        (
            TypeRef::Inline(TypeDefinition::Complex(a)),
            TypeRef::Inline(TypeDefinition::Complex(b)),
        ) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{NamespaceConstraint, ProcessContents, XS_NAMESPACE};

    fn qname(ns: &str, local: &str) -> QName {
        QName::new(Arc::from(ns), Arc::from(local))
    }

    fn element(local: &str, min: u32, max: Option<u32>) -> Particle {
        Particle::new(
            Term::Element(ElementTerm::Global(qname("urn:ex", local))),
            min,
            max,
        )
    }

    fn local_element(local: &str, type_local: &str) -> Particle {
        let decl = ElementDecl {
            name: qname("", local),
            type_ref: TypeRef::Named(qname(XS_NAMESPACE, type_local)),
            nillable: false,
            default: None,
            fixed: None,
            is_abstract: false,
        };
        Particle::once(Term::Element(ElementTerm::Local(Arc::new(decl))))
    }

    fn run(model: &ContentModel, names: &[&str]) -> Result<bool, String> {
        let mut state = model.start();
        for name in names {
            if model.step(&mut state, "urn:ex", name).is_none() {
                return Err(name.to_string());
            }
        }
        Ok(model.is_accepting(&state))
    }

    #[test]
    fn test_sequence_with_occurrences() {
        let particle = Particle::once(Term::Sequence(vec![
            element("Id", 1, Some(1)),
            element("Line", 1, Some(3)),
            element("Note", 0, None),
        ]));
        let model = ContentModel::build(&particle).unwrap();

        assert_eq!(run(&model, &["Id", "Line"]), Ok(true));
        assert_eq!(run(&model, &["Id", "Line", "Line", "Line", "Note", "Note"]), Ok(true));
        assert_eq!(run(&model, &["Id"]), Ok(false));
        assert_eq!(run(&model, &["Line"]), Err("Line".to_string()));
        assert_eq!(
            run(&model, &["Id", "Line", "Line", "Line", "Line"]),
            Err("Line".to_string())
        );
    }

    #[test]
    fn test_choice_and_expected_names() {
        let particle = Particle::once(Term::Choice(vec![
            element("Id", 1, Some(1)),
            element("Ref", 1, Some(1)),
        ]));
        let model = ContentModel::build(&particle).unwrap();
        let state = model.start();
        assert_eq!(
            model.expected(&state),
            vec!["\"urn:ex\":Id".to_string(), "\"urn:ex\":Ref".to_string()]
        );
        assert_eq!(run(&model, &["Ref"]), Ok(true));
        assert_eq!(run(&model, &["Id", "Ref"]), Err("Ref".to_string()));
    }

    #[test]
    fn test_wildcard_match() {
        let wildcard = Wildcard {
            constraint: NamespaceConstraint::Other(Arc::from("urn:ex")),
            process: ProcessContents::Skip,
        };
        let particle = Particle::once(Term::Sequence(vec![
            element("Id", 1, Some(1)),
            Particle::unbounded_wildcard(wildcard),
        ]));
        let model = ContentModel::build(&particle).unwrap();
        let mut state = model.start();
        assert!(matches!(
            model.step(&mut state, "urn:ex", "Id"),
            Some(Matched::Element(_))
        ));
        assert!(matches!(
            model.step(&mut state, "urn:ext", "Anything"),
            Some(Matched::Wildcard(_))
        ));
        assert!(model.step(&mut state, "urn:ex", "Id").is_none());
        assert!(model.is_accepting(&state));
    }

    #[test]
    fn test_all_group() {
        let particle = Particle::once(Term::All(vec![
            element("A", 1, Some(1)),
            element("B", 0, Some(1)),
        ]));
        let model = ContentModel::build(&particle).unwrap();
        assert_eq!(run(&model, &["B", "A"]), Ok(true));
        assert_eq!(run(&model, &["A"]), Ok(true));
        assert_eq!(run(&model, &["B"]), Ok(false));
        assert_eq!(run(&model, &["A", "A"]), Err("A".to_string()));
    }

    #[test]
    fn test_nested_all_rejected() {
        let particle = Particle::once(Term::Sequence(vec![Particle::once(Term::All(vec![]))]));
        assert!(ContentModel::build(&particle).is_err());
    }

    #[test]
    fn test_large_max_occurs_is_enforced() {
        let particle = Particle::once(Term::Sequence(vec![element("Item", 0, Some(300))]));
        let model = ContentModel::build(&particle).unwrap();
        assert_eq!(run(&model, &vec!["Item"; 300]), Ok(true));
        assert_eq!(run(&model, &vec!["Item"; 301]), Err("Item".to_string()));
        assert!(model.unique_attribution_violation().is_none());
    }

    #[test]
    fn test_large_min_occurs_is_enforced() {
        let particle = element("Item", 300, Some(300));
        let model = ContentModel::build(&particle).unwrap();
        assert_eq!(run(&model, &vec!["Item"; 299]), Ok(false));
        assert_eq!(run(&model, &vec!["Item"; 300]), Ok(true));

        let particle = element("Item", 300, None);
        let model = ContentModel::build(&particle).unwrap();
        assert_eq!(run(&model, &vec!["Item"; 299]), Ok(false));
        assert_eq!(run(&model, &vec!["Item"; 5000]), Ok(true));
    }

    #[test]
    fn test_oversized_model_is_refused() {
        let inner = Particle::once(Term::Sequence(vec![element("Item", 0, Some(1000))]));
        let particle = Particle::new(Term::Sequence(vec![inner]), 0, Some(1000));
        assert_eq!(ContentModel::build(&particle).unwrap_err(), ModelError::TooLarge);
    }

    #[test]
    fn test_inverted_bounds_are_refused() {
        let particle = element("Item", 3, Some(2));
        assert!(matches!(
            ContentModel::build(&particle),
            Err(ModelError::Invalid(_))
        ));
    }

    #[test]
    fn test_unique_particle_attribution() {
        let ambiguous = Particle::once(Term::Sequence(vec![
            element("A", 0, Some(1)),
            element("A", 1, Some(1)),
        ]));
        let model = ContentModel::build(&ambiguous).unwrap();
        let violation = model.unique_attribution_violation().unwrap();
        assert!(violation.starts_with("cos-nonambig"));

        let deterministic = Particle::once(Term::Sequence(vec![
            element("A", 1, Some(2)),
            element("B", 0, Some(1)),
        ]));
        let model = ContentModel::build(&deterministic).unwrap();
        assert!(model.unique_attribution_violation().is_none());
    }

    #[test]
    fn test_element_consistency() {
        let particle = Particle::once(Term::Choice(vec![
            local_element("Value", "string"),
            local_element("Value", "int"),
        ]));
        let model = ContentModel::build(&particle).unwrap();
        let violation = model.element_consistency_violation("ValueType").unwrap();
        assert!(violation.contains("Multiple elements with name 'Value'"));
    }

    #[test]
    fn test_empty_model() {
        let model = ContentModel::empty();
        let mut state = model.start();
        assert!(model.is_accepting(&state));
        assert!(model.step(&mut state, "urn:ex", "Id").is_none());
    }
}
