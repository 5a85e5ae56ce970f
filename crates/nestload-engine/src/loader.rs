//! Composite loader
//!
//! Resolves fully-qualified symbol names against an ordered [`SourceList`].
//! A symbol maps to one entry name (`app.Main` → `app/Main.class`) and the
//! first source that holds that entry wins.
//!
//! Three caches sit in front of the sources, all concurrent maps:
//! - resolved units by symbol,
//! - per-source sets of entry names known to be absent,
//! - symbols that missed every source, so a repeated miss costs one lookup.
//!
//! The two negative caches can be turned off; results are the same either way.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tracing::{debug, trace};

use crate::error::{EngineError, EngineResult};
use crate::resolve::SourceList;

/// Which sources are consulted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precedence {
    /// Application root, then dependencies in discovery order
    #[default]
    ApplicationFirst,
    /// Dependencies in discovery order, then the application root
    DependenciesFirst,
}

/// Mapping from symbol names to entry names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitNaming {
    suffix: String,
}

impl UnitNaming {
    /// Dots become slashes and `suffix` is appended.
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    /// The suffix appended to every unit path.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Entry name for `symbol`, or `None` if it is not a well-formed name.
    pub fn entry_name(&self, symbol: &str) -> Option<String> {
        if symbol.is_empty() || symbol.contains('/') || symbol.contains('\\') {
            return None;
        }
        if symbol.split('.').any(|segment| segment.is_empty()) {
            return None;
        }
        Some(format!("{}{}", symbol.replace('.', "/"), self.suffix))
    }
}

impl Default for UnitNaming {
    fn default() -> Self {
        Self::new(".class")
    }
}

/// Loader tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Source search order
    pub precedence: Precedence,
    /// Symbol → entry name mapping
    pub naming: UnitNaming,
    /// Remember misses
    pub negative_cache: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            precedence: Precedence::ApplicationFirst,
            naming: UnitNaming::default(),
            negative_cache: true,
        }
    }
}

/// A symbol and the bytes that define it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUnit {
    /// Fully-qualified symbol name
    pub symbol: String,
    /// Index of the source in the source list
    pub source_index: usize,
    /// Name of the source (root prefix or nested entry name)
    pub source: String,
    /// Entry name inside the source
    pub entry_name: String,
    /// Unit bytes
    pub bytes: Arc<[u8]>,
}

/// Snapshot of loader counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Resolutions served from the resolved-unit cache
    pub cache_hits: u64,
    /// Misses served from the missing-symbol cache
    pub negative_hits: u64,
    /// Reads attempted against sources
    pub source_lookups: u64,
    /// Symbols resolved by reading a source
    pub loaded: u64,
    /// Symbols that were not found after searching every source
    pub misses: u64,
}

#[derive(Default)]
struct Counters {
    cache_hits: AtomicU64,
    negative_hits: AtomicU64,
    source_lookups: AtomicU64,
    loaded: AtomicU64,
    misses: AtomicU64,
}

/// Symbol loader over an ordered source list.
///
/// `Send + Sync`: share it as `Arc<CompositeLoader>` with the running program.
pub struct CompositeLoader {
    sources: SourceList,
    order: Vec<usize>,
    options: LoaderOptions,
    resolved: DashMap<String, Arc<ResolvedUnit>>,
    absent: Vec<DashSet<String>>,
    missing: DashSet<String>,
    counters: Counters,
}

impl std::fmt::Debug for CompositeLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeLoader")
            .field("sources", &self.sources.len())
            .field("options", &self.options)
            .field("resolved", &self.resolved.len())
            .finish()
    }
}

impl CompositeLoader {
    /// Create a loader with default options.
    pub fn new(sources: SourceList) -> Self {
        Self::with_options(sources, LoaderOptions::default())
    }

    /// Create a loader with explicit options.
    pub fn with_options(sources: SourceList, options: LoaderOptions) -> Self {
        let count = sources.len();
        let order = match options.precedence {
            Precedence::ApplicationFirst => (0..count).collect(),
            Precedence::DependenciesFirst => (1..count).chain(std::iter::once(0)).collect(),
        };
        let absent = (0..count).map(|_| DashSet::new()).collect();

        Self {
            sources,
            order,
            options,
            resolved: DashMap::new(),
            absent,
            missing: DashSet::new(),
            counters: Counters::default(),
        }
    }

    /// The sources this loader searches.
    pub fn sources(&self) -> &SourceList {
        &self.sources
    }

    /// The options in effect.
    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Source indices in the order they are searched.
    pub fn search_order(&self) -> &[usize] {
        &self.order
    }

    /// Resolve a symbol to its unit bytes.
    ///
    /// Returns [`EngineError::SymbolNotFound`] if no source defines it. A
    /// nested archive that turns out to be corrupt while searching is reported
    /// as [`EngineError::CorruptArchive`], not skipped.
    pub fn resolve_symbol(&self, symbol: &str) -> EngineResult<Arc<ResolvedUnit>> {
        if let Some(unit) = self.resolved.get(symbol) {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(unit.value()));
        }

        if self.options.negative_cache && self.missing.contains(symbol) {
            self.counters.negative_hits.fetch_add(1, Ordering::Relaxed);
            return Err(self.not_found(symbol));
        }

        let Some(entry_name) = self.options.naming.entry_name(symbol) else {
            debug!(symbol, "Malformed symbol name");
            return Err(self.not_found(symbol));
        };

        match self.search_sources(&entry_name)? {
            Some((index, bytes)) => {
                let source = self.sources.get(index).map(|s| s.name().to_string());
                let unit = Arc::new(ResolvedUnit {
                    symbol: symbol.to_string(),
                    source_index: index,
                    source: source.unwrap_or_default(),
                    entry_name,
                    bytes: bytes.into(),
                });
                debug!(symbol, source = %unit.source, size = unit.bytes.len(), "Loaded unit");
                self.counters.loaded.fetch_add(1, Ordering::Relaxed);

                let cached = self
                    .resolved
                    .entry(symbol.to_string())
                    .or_insert(unit)
                    .value()
                    .clone();
                Ok(cached)
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                if self.options.negative_cache {
                    self.missing.insert(symbol.to_string());
                }
                debug!(symbol, "Symbol not found");
                Err(self.not_found(symbol))
            }
        }
    }

    /// Read a resource by entry path (e.g. `config/app.properties`) using
    /// the same search order as symbols. Resources are not cached.
    pub fn read_resource(&self, path: &str) -> EngineResult<Option<(usize, Vec<u8>)>> {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return Ok(None);
        }
        self.search_sources(path)
    }

    /// Current counter values.
    pub fn stats(&self) -> LoaderStats {
        LoaderStats {
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            negative_hits: self.counters.negative_hits.load(Ordering::Relaxed),
            source_lookups: self.counters.source_lookups.load(Ordering::Relaxed),
            loaded: self.counters.loaded.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
        }
    }

    fn search_sources(&self, entry_name: &str) -> EngineResult<Option<(usize, Vec<u8>)>> {
        for &index in &self.order {
            if self.options.negative_cache && self.absent[index].contains(entry_name) {
                continue;
            }
            let Some(source) = self.sources.get(index) else {
                continue;
            };

            self.counters.source_lookups.fetch_add(1, Ordering::Relaxed);
            trace!(entry = entry_name, source = %source.name(), "Searching source");

            match source.read(entry_name)? {
                Some(bytes) => return Ok(Some((index, bytes))),
                None => {
                    if self.options.negative_cache {
                        self.absent[index].insert(entry_name.to_string());
                    }
                }
            }
        }
        Ok(None)
    }

    fn not_found(&self, symbol: &str) -> EngineError {
        EngineError::SymbolNotFound {
            symbol: symbol.to_string(),
            searched: self.sources.len(),
        }
    }
}
