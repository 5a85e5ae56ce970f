//! Binding resolved entry-point units to invocable functions
//!
//! The loader only produces bytes. Turning a unit into something callable is
//! the job of a [`Linker`]; the stock implementation is a registry of Rust
//! functions keyed by symbol name, filled in by the embedding binary.

use std::collections::HashMap;
use std::sync::Arc;

use nestload_engine::{CompositeLoader, ResolvedUnit};

use crate::error::RuntimeError;

/// Everything an entry function receives when it is called.
pub struct Invocation<'a> {
    /// The entry-point symbol
    pub symbol: &'a str,
    /// The unit the symbol resolved to
    pub unit: &'a ResolvedUnit,
    /// Program arguments, unchanged from the command line
    pub args: &'a [String],
    /// Loader for resolving further symbols at run time
    pub loader: &'a Arc<CompositeLoader>,
}

/// An invocable entry point. Returns the process exit code.
pub type EntryFn = Arc<dyn Fn(Invocation<'_>) -> i32 + Send + Sync>;

/// Binds a resolved entry-point unit to an invocable function.
pub trait Linker: Send + Sync {
    /// Link `unit`, or fail with [`RuntimeError::EntryPointShape`].
    fn link(&self, unit: &ResolvedUnit) -> Result<EntryFn, RuntimeError>;
}

/// Registry of entry functions keyed by symbol name.
#[derive(Clone, Default)]
pub struct EntryPointRegistry {
    entries: HashMap<String, EntryFn>,
}

impl EntryPointRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry function for a symbol
    pub fn register(
        &mut self,
        symbol: &str,
        entry: impl Fn(Invocation<'_>) -> i32 + Send + Sync + 'static,
    ) {
        self.entries.insert(symbol.to_string(), Arc::new(entry));
    }

    /// Get the entry function for a symbol
    pub fn get(&self, symbol: &str) -> Option<EntryFn> {
        self.entries.get(symbol).cloned()
    }

    /// Check if a symbol is registered
    pub fn contains(&self, symbol: &str) -> bool {
        self.entries.contains_key(symbol)
    }

    /// Number of registered entry points
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered symbols, sorted.
    pub fn symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        symbols.sort_unstable();
        symbols
    }
}

impl std::fmt::Debug for EntryPointRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryPointRegistry")
            .field("symbols", &self.symbols())
            .finish()
    }
}

impl Linker for EntryPointRegistry {
    fn link(&self, unit: &ResolvedUnit) -> Result<EntryFn, RuntimeError> {
        let shape = |reason: &str| RuntimeError::EntryPointShape {
            symbol: unit.symbol.clone(),
            reason: reason.to_string(),
        };

        if unit.bytes.is_empty() {
            return Err(shape("unit is empty"));
        }
        self.get(&unit.symbol)
            .ok_or_else(|| shape("no entry function is registered for this symbol"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(symbol: &str, bytes: &[u8]) -> ResolvedUnit {
        ResolvedUnit {
            symbol: symbol.to_string(),
            source_index: 0,
            source: "BOOT-INF/classes/".to_string(),
            entry_name: format!("{}.class", symbol.replace('.', "/")),
            bytes: Arc::from(bytes),
        }
    }

    #[test]
    fn test_registry_basics() {
        let mut registry = EntryPointRegistry::new();
        assert!(registry.is_empty());

        registry.register("app.Main", |_| 0);
        registry.register("app.Other", |_| 3);

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("app.Main"));
        assert!(!registry.contains("app.Missing"));
        assert_eq!(registry.symbols(), vec!["app.Main", "app.Other"]);
    }

    #[test]
    fn test_link_registered_symbol() {
        let mut registry = EntryPointRegistry::new();
        registry.register("app.Main", |_| 0);

        assert!(registry.link(&unit("app.Main", b"MAIN")).is_ok());
    }

    #[test]
    fn test_link_unregistered_symbol() {
        let registry = EntryPointRegistry::new();
        let err = registry.link(&unit("app.Main", b"MAIN")).err().unwrap();
        assert!(matches!(err, RuntimeError::EntryPointShape { ref symbol, .. } if symbol == "app.Main"));
        assert_eq!(err.exit_code(), 70);
    }

    #[test]
    fn test_link_empty_unit() {
        let mut registry = EntryPointRegistry::new();
        registry.register("app.Main", |_| 0);

        let err = registry.link(&unit("app.Main", b"")).err().unwrap();
        assert!(err.to_string().contains("unit is empty"));
    }
}
