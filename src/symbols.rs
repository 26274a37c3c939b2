//! String interning for grammar and instance names.
//!
//! A [`SymbolTableBuilder`] collects names while schemas compile and is frozen
//! into a [`SymbolTable`] that is shared read-only by every session validating
//! against the same bundle. Sessions intern through a [`ShadowSymbolTable`],
//! which reads through to the shared table and keeps anything new private.

use std::collections::HashSet;
use std::sync::Arc;

/// An interned string. Cloning is a reference-count bump.
pub type Symbol = Arc<str>;

/// Mutable interning table used during compilation.
#[derive(Debug, Default)]
pub struct SymbolTableBuilder {
    symbols: HashSet<Symbol>,
}

impl SymbolTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `value`, returning the canonical symbol.
    pub fn intern(&mut self, value: &str) -> Symbol {
        if let Some(existing) = self.symbols.get(value) {
            return Arc::clone(existing);
        }
        let symbol: Symbol = Arc::from(value);
        self.symbols.insert(Arc::clone(&symbol));
        symbol
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Seal the table. No further symbols can be added to the result.
    pub fn freeze(self) -> SymbolTable {
        SymbolTable {
            symbols: self.symbols,
        }
    }
}

/// Immutable interning table shared across threads.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: HashSet<Symbol>,
}

impl SymbolTable {
    pub fn get(&self, value: &str) -> Option<&Symbol> {
        self.symbols.get(value)
    }

    pub fn contains(&self, value: &str) -> bool {
        self.symbols.contains(value)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Per-session overlay over a shared [`SymbolTable`].
///
/// Lookups consult the shared table first; symbols it does not know are
/// interned into the private overlay and never reach the shared table.
#[derive(Debug)]
pub struct ShadowSymbolTable {
    shared: Arc<SymbolTable>,
    overlay: HashSet<Symbol>,
}

impl ShadowSymbolTable {
    pub fn new(shared: Arc<SymbolTable>) -> Self {
        Self {
            shared,
            overlay: HashSet::new(),
        }
    }

    pub fn intern(&mut self, value: &str) -> Symbol {
        if let Some(symbol) = self.shared.get(value) {
            return Arc::clone(symbol);
        }
        if let Some(symbol) = self.overlay.get(value) {
            return Arc::clone(symbol);
        }
        let symbol: Symbol = Arc::from(value);
        self.overlay.insert(Arc::clone(&symbol));
        symbol
    }

    /// Number of symbols this session added on top of the shared table.
    pub fn overlay_len(&self) -> usize {
        self.overlay.len()
    }

    pub fn shared(&self) -> &Arc<SymbolTable> {
        &self.shared
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_interns_once() {
        let mut builder = SymbolTableBuilder::new();
        let a = builder.intern("Envelope");
        let b = builder.intern("Envelope");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_shadow_reads_through_to_shared() {
        let mut builder = SymbolTableBuilder::new();
        let shared_sym = builder.intern("Order");
        let shared = Arc::new(builder.freeze());

        let mut shadow = ShadowSymbolTable::new(Arc::clone(&shared));
        let found = shadow.intern("Order");
        assert!(Arc::ptr_eq(&found, &shared_sym));
        assert_eq!(shadow.overlay_len(), 0);
    }

    #[test]
    fn test_shadow_writes_stay_private() {
        let shared = Arc::new(SymbolTableBuilder::new().freeze());
        let mut shadow = ShadowSymbolTable::new(Arc::clone(&shared));

        let first = shadow.intern("Unknown");
        let second = shadow.intern("Unknown");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(shadow.overlay_len(), 1);
        assert!(!shared.contains("Unknown"));
    }
}
