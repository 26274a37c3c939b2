mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use common::{COMMON_XSD, ORDER_XSD, VALID_ORDER, compile, order_sources};
use xsdgate::session::validate;
use xsdgate::{
    GrammarBundle, GrammarCache, GrammarCompiler, OutcomeKind, SchemaError, SchemaResult,
    SchemaSetIdentity, SchemaSource, ValidationOptions, XsdGrammarCompiler,
};

/// Counts compilations and delegates to the real compiler.
struct CountingCompiler {
    calls: AtomicUsize,
    inner: XsdGrammarCompiler,
}

impl CountingCompiler {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            inner: XsdGrammarCompiler::new().with_location_discovery(false),
        }
    }
}

impl GrammarCompiler for CountingCompiler {
    fn compile(
        &self,
        identity: &SchemaSetIdentity,
        sources: &[SchemaSource],
    ) -> SchemaResult<GrammarBundle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Widen the window in which concurrent callers race for the entry.
        std::thread::sleep(std::time::Duration::from_millis(20));
        self.inner.compile(identity, sources)
    }
}

#[test]
fn test_concurrent_callers_share_one_bundle() {
    let compiler = Arc::new(CountingCompiler::new());
    let cache = GrammarCache::new(compiler.clone(), None);
    let identity = SchemaSetIdentity::new("order");
    let sources = order_sources();

    let bundles: Vec<Arc<GrammarBundle>> = (0..16)
        .into_par_iter()
        .map(|_| cache.get_or_compile(&identity, &sources).unwrap())
        .collect();

    assert_eq!(compiler.calls.load(Ordering::SeqCst), 1);
    for bundle in &bundles {
        assert!(Arc::ptr_eq(bundle, &bundles[0]));
    }

    let stats = cache.stats();
    assert_eq!(stats.compilations, 1);
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.hits + stats.misses, 16);
}

#[test]
fn test_distinct_identities_compile_separately() {
    let compiler = Arc::new(CountingCompiler::new());
    let cache = GrammarCache::new(compiler.clone(), None);

    let first = cache
        .get_or_compile(&SchemaSetIdentity::new("a"), &order_sources())
        .unwrap();
    let second = cache
        .get_or_compile(&SchemaSetIdentity::new("b"), &order_sources())
        .unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(compiler.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_failed_compilation_is_not_cached() {
    let compiler = Arc::new(CountingCompiler::new());
    let cache = GrammarCache::new(compiler.clone(), None);
    let identity = SchemaSetIdentity::new("broken");
    let sources = vec![SchemaSource::from_string("broken.xsd", "<xs:schema")];

    let err = cache.get_or_compile(&identity, &sources).unwrap_err();
    assert!(matches!(err, SchemaError::Malformed { .. }));
    assert!(!cache.contains(&identity));

    cache.get_or_compile(&identity, &sources).unwrap_err();
    assert_eq!(compiler.calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.stats().failures, 2);
}

#[test]
fn test_source_order_does_not_change_the_grammar() {
    let forward = compile(
        "forward",
        &[
            SchemaSource::from_string("order.xsd", ORDER_XSD),
            SchemaSource::from_string("common.xsd", COMMON_XSD),
        ],
    )
    .unwrap();
    let reversed = compile(
        "reversed",
        &[
            SchemaSource::from_string("common.xsd", COMMON_XSD),
            SchemaSource::from_string("order.xsd", ORDER_XSD),
        ],
    )
    .unwrap();

    assert_eq!(forward.valid_namespaces, reversed.valid_namespaces);

    let options = ValidationOptions::default();
    for document in [
        VALID_ORDER,
        r#"<Order xmlns="urn:ex"><Id>1</Id><Currency>EURO</Currency></Order>"#,
    ] {
        let a = validate(&forward, document.as_bytes(), &options);
        let b = validate(&reversed, document.as_bytes(), &options);
        assert_eq!(a.kind(), b.kind());
        assert_eq!(a.reasons(), b.reasons());
    }
    assert_eq!(
        validate(&forward, VALID_ORDER.as_bytes(), &options).kind(),
        OutcomeKind::Valid
    );
}

#[test]
fn test_bounded_cache_evicts() {
    let compiler = Arc::new(CountingCompiler::new());
    let cache = GrammarCache::new(compiler.clone(), Some(1));

    for name in ["a", "b", "c"] {
        cache
            .get_or_compile(&SchemaSetIdentity::new(name), &order_sources())
            .unwrap();
    }
    assert!(cache.stats().entries <= 1);
}
