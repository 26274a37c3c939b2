use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::compiler::GrammarCompiler;
use crate::error::SchemaResult;
use crate::grammar::{GrammarBundle, SchemaSetIdentity};
use crate::provider::SchemaSource;

/// Counters of a [`GrammarCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub compilations: u64,
    pub failures: u64,
    pub entries: u64,
}

impl GrammarCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

/// Compiled grammar bundles keyed by schema set identity.
///
/// Backed by `moka`, so concurrent first requests for one identity wait for a
/// single compilation and all receive the same `Arc`. Failed compilations are
/// not cached. Without `max_entries` the cache never evicts.
pub struct GrammarCache {
    cache: Cache<SchemaSetIdentity, Arc<GrammarBundle>>,
    compiler: Arc<dyn GrammarCompiler>,
    hits: AtomicU64,
    misses: AtomicU64,
    compilations: AtomicU64,
    failures: AtomicU64,
}

impl GrammarCache {
    pub fn new(compiler: Arc<dyn GrammarCompiler>, max_entries: Option<u64>) -> Self {
        let cache = match max_entries {
            Some(max_entries) => Cache::builder().max_capacity(max_entries).build(),
            None => Cache::builder().build(),
        };

        Self {
            cache,
            compiler,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            compilations: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn get(&self, identity: &SchemaSetIdentity) -> Option<Arc<GrammarBundle>> {
        self.cache.get(identity)
    }

    pub fn contains(&self, identity: &SchemaSetIdentity) -> bool {
        self.cache.contains_key(identity)
    }

    pub fn get_or_compile(
        &self,
        identity: &SchemaSetIdentity,
        sources: &[SchemaSource],
    ) -> SchemaResult<Arc<GrammarBundle>> {
        self.get_or_compile_with(identity, || Ok(sources.to_vec()))
    }

    /// Like [`get_or_compile`](Self::get_or_compile), but the sources are
    /// only produced when the identity has to be compiled.
    pub fn get_or_compile_with<F>(
        &self,
        identity: &SchemaSetIdentity,
        sources: F,
    ) -> SchemaResult<Arc<GrammarBundle>>
    where
        F: FnOnce() -> SchemaResult<Vec<SchemaSource>>,
    {
        if let Some(bundle) = self.cache.get(identity) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(identity = %identity, "grammar cache hit");
            return Ok(bundle);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        self.cache
            .try_get_with(identity.clone(), || -> SchemaResult<Arc<GrammarBundle>> {
                let started = Instant::now();
                self.compilations.fetch_add(1, Ordering::Relaxed);
                let bundle = self.compiler.compile(identity, &sources()?)?;
                info!(
                    identity = %identity,
                    grammars = bundle.pool.len(),
                    namespaces = bundle.valid_namespaces.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "schema set compiled"
                );
                Ok(Arc::new(bundle))
            })
            .map_err(|e| {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(identity = %identity, error = %e, "schema set compilation failed");
                (*e).clone()
            })
    }

    pub fn stats(&self) -> GrammarCacheStats {
        self.cache.run_pending_tasks();
        GrammarCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            compilations: self.compilations.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            entries: self.cache.entry_count(),
        }
    }
}
