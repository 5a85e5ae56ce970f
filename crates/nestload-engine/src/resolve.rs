//! Nested archive resolution
//!
//! Turns a classified container index into the ordered list of code sources
//! that symbol lookup walks: the application root first, then every nested
//! dependency archive in index order. Nested archives are not opened here;
//! each one carries a deferred-open cell that [`CodeSource::open`] fills on
//! first use, so startup costs one pass over the index and nothing more.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, info};

use crate::archive::{Archive, Entry};
use crate::classify::{Classification, Classifier};
use crate::error::{EngineError, EngineResult};

/// What a code source is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// A directory prefix inside the container
    ApplicationRoot {
        /// The prefix, with trailing `/`
        prefix: String,
    },
    /// A zip archive stored as an entry of the container
    Nested {
        /// The container entry holding the archive
        entry: Entry,
    },
}

/// One place symbols can be loaded from.
pub struct CodeSource {
    kind: SourceKind,
    container: Arc<dyn Archive>,
    nested: OnceCell<Arc<dyn Archive>>,
}

impl fmt::Debug for CodeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeSource")
            .field("name", &self.name())
            .field("open", &self.is_open())
            .finish()
    }
}

impl CodeSource {
    fn application_root(container: Arc<dyn Archive>, prefix: String) -> Self {
        Self {
            kind: SourceKind::ApplicationRoot { prefix },
            container,
            nested: OnceCell::new(),
        }
    }

    fn nested(container: Arc<dyn Archive>, entry: Entry) -> Self {
        Self {
            kind: SourceKind::Nested { entry },
            container,
            nested: OnceCell::new(),
        }
    }

    /// What this source is.
    pub fn kind(&self) -> &SourceKind {
        &self.kind
    }

    /// The root prefix or the nested entry name.
    pub fn name(&self) -> &str {
        match &self.kind {
            SourceKind::ApplicationRoot { prefix } => prefix,
            SourceKind::Nested { entry } => &entry.name,
        }
    }

    /// Whether this is the application root.
    pub fn is_application_root(&self) -> bool {
        matches!(self.kind, SourceKind::ApplicationRoot { .. })
    }

    /// Whether the backing archive has been opened yet.
    ///
    /// The application root lives in the already-open container and always
    /// reports `true`.
    pub fn is_open(&self) -> bool {
        match self.kind {
            SourceKind::ApplicationRoot { .. } => true,
            SourceKind::Nested { .. } => self.nested.get().is_some(),
        }
    }

    /// Open the archive behind this source, once.
    ///
    /// For a nested dependency the first call indexes the nested zip (and
    /// validates it); later calls return the cached handle. Concurrent first
    /// calls open it exactly once.
    pub fn open(&self) -> EngineResult<&Arc<dyn Archive>> {
        match &self.kind {
            SourceKind::ApplicationRoot { .. } => Ok(&self.container),
            SourceKind::Nested { entry } => self.nested.get_or_try_init(|| {
                debug!(source = %entry.name, "Opening nested archive");
                self.container.open_nested(entry)
            }),
        }
    }

    /// Read `path` (relative to this source) if present.
    pub fn read(&self, path: &str) -> EngineResult<Option<Vec<u8>>> {
        match &self.kind {
            SourceKind::ApplicationRoot { prefix } => {
                self.container.read_named(&format!("{}{}", prefix, path))
            }
            SourceKind::Nested { .. } => self.open()?.read_named(path),
        }
    }

    /// Whether `path` exists in this source. Opens nested archives.
    pub fn contains(&self, path: &str) -> EngineResult<bool> {
        let found = match &self.kind {
            SourceKind::ApplicationRoot { prefix } => {
                self.container.find(&format!("{}{}", prefix, path))
            }
            SourceKind::Nested { .. } => self.open()?.find(path),
        };
        Ok(found.is_some_and(|e| !e.is_dir))
    }
}

/// Ordered, immutable list of code sources.
#[derive(Debug)]
pub struct SourceList {
    container: Arc<dyn Archive>,
    sources: Vec<CodeSource>,
}

impl SourceList {
    /// The container these sources were discovered in.
    pub fn container(&self) -> &Arc<dyn Archive> {
        &self.container
    }

    /// Sources in search order.
    pub fn iter(&self) -> impl Iterator<Item = &CodeSource> {
        self.sources.iter()
    }

    /// Source at `index`.
    pub fn get(&self, index: usize) -> Option<&CodeSource> {
        self.sources.get(index)
    }

    /// Number of sources, application root included.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Always false for a resolved list; it holds at least the root.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// The application root (always index 0).
    pub fn application_root(&self) -> &CodeSource {
        &self.sources[0]
    }

    /// Nested dependencies, in discovery order.
    pub fn dependencies(&self) -> &[CodeSource] {
        &self.sources[1..]
    }

    /// Source names in order; handy for comparing two launches.
    pub fn names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }
}

/// Build the ordered source list for a container.
///
/// The first `ApplicationRoot` entry wins; later duplicates are ignored. Fails
/// with [`EngineError::NoApplicationRoot`] when there is none.
pub fn resolve_sources(
    container: Arc<dyn Archive>,
    classifier: &Classifier,
) -> EngineResult<SourceList> {
    let mut root: Option<CodeSource> = None;
    let mut dependencies = Vec::new();

    for entry in container.entries() {
        match classifier.classify(entry) {
            Classification::ApplicationRoot => {
                if root.is_some() {
                    debug!(entry = %entry.name, "Ignoring duplicate application root");
                    continue;
                }
                root = Some(CodeSource::application_root(
                    Arc::clone(&container),
                    entry.name.clone(),
                ));
            }
            Classification::NestedDependency => {
                dependencies.push(CodeSource::nested(Arc::clone(&container), entry.clone()));
            }
            Classification::Ignore => {}
        }
    }

    let root = root.ok_or_else(|| EngineError::NoApplicationRoot {
        archive: container.location().to_string(),
        prefix: classifier.layout().classes.clone(),
    })?;

    let mut sources = Vec::with_capacity(dependencies.len() + 1);
    sources.push(root);
    sources.extend(dependencies);

    info!(
        archive = %container.location(),
        sources = sources.len(),
        "Resolved code sources"
    );

    Ok(SourceList { container, sources })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::Compression;
    use crate::classify::Layout;

    /// Index-only archive; nested opens are counted and always fail.
    #[derive(Debug)]
    struct FakeArchive {
        entries: Vec<Entry>,
        opens: std::sync::atomic::AtomicUsize,
    }

    impl FakeArchive {
        fn new(names: &[&str]) -> Arc<Self> {
            let entries = names
                .iter()
                .map(|name| Entry {
                    name: name.to_string(),
                    is_dir: name.ends_with('/'),
                    header_offset: 0,
                    data_offset: 0,
                    compressed_size: 0,
                    size: 0,
                    compression: Compression::Stored,
                    crc32: None,
                })
                .collect();
            Arc::new(Self {
                entries,
                opens: Default::default(),
            })
        }
    }

    impl Archive for FakeArchive {
        fn location(&self) -> &str {
            "fake.jar"
        }
        fn entries(&self) -> &[Entry] {
            &self.entries
        }
        fn find(&self, name: &str) -> Option<&Entry> {
            self.entries.iter().find(|e| e.name == name)
        }
        fn read_entry(&self, _entry: &Entry) -> EngineResult<Vec<u8>> {
            Ok(Vec::new())
        }
        fn open_nested(&self, entry: &Entry) -> EngineResult<Arc<dyn Archive>> {
            self.opens.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(EngineError::corrupt(&entry.name, "fake"))
        }
    }

    fn resolve(names: &[&str]) -> EngineResult<SourceList> {
        resolve_sources(FakeArchive::new(names), &Classifier::new(Layout::jar()))
    }

    #[test]
    fn test_empty_container_has_no_root() {
        let err = resolve(&[]).unwrap_err();
        assert!(matches!(err, EngineError::NoApplicationRoot { .. }));
    }

    #[test]
    fn test_dependencies_without_root_fail() {
        let err = resolve(&["BOOT-INF/lib/a.jar"]).unwrap_err();
        match err {
            EngineError::NoApplicationRoot { prefix, archive } => {
                assert_eq!(prefix, "BOOT-INF/classes/");
                assert_eq!(archive, "fake.jar");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_root_first_then_scan_order() {
        let list = resolve(&[
            "BOOT-INF/lib/z.jar",
            "META-INF/MANIFEST.MF",
            "BOOT-INF/classes/",
            "BOOT-INF/lib/a.jar",
            "BOOT-INF/lib/m.jar",
        ])
        .unwrap();
        assert_eq!(
            list.names(),
            vec![
                "BOOT-INF/classes/",
                "BOOT-INF/lib/z.jar",
                "BOOT-INF/lib/a.jar",
                "BOOT-INF/lib/m.jar",
            ]
        );
        assert!(list.application_root().is_application_root());
        assert_eq!(list.dependencies().len(), 3);
    }

    #[test]
    fn test_reordered_scan_reorders_output() {
        let forward = resolve(&["BOOT-INF/classes/", "BOOT-INF/lib/a.jar", "BOOT-INF/lib/b.jar"])
            .unwrap();
        let reverse = resolve(&["BOOT-INF/classes/", "BOOT-INF/lib/b.jar", "BOOT-INF/lib/a.jar"])
            .unwrap();
        assert_eq!(forward.names()[1..], ["BOOT-INF/lib/a.jar", "BOOT-INF/lib/b.jar"]);
        assert_eq!(reverse.names()[1..], ["BOOT-INF/lib/b.jar", "BOOT-INF/lib/a.jar"]);
    }

    #[test]
    fn test_duplicate_root_is_deduplicated() {
        let list = resolve(&["BOOT-INF/classes/", "BOOT-INF/classes/", "BOOT-INF/lib/a.jar"])
            .unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_empty_root_is_enough() {
        let list = resolve(&["BOOT-INF/classes/"]).unwrap();
        assert_eq!(list.len(), 1);
        assert!(list.dependencies().is_empty());
    }

    #[test]
    fn test_source_kind_and_contains() {
        let list = resolve(&[
            "BOOT-INF/classes/",
            "BOOT-INF/classes/app/",
            "BOOT-INF/classes/app/Main.class",
            "BOOT-INF/lib/a.jar",
        ])
        .unwrap();

        let root = list.application_root();
        assert_eq!(
            root.kind(),
            &SourceKind::ApplicationRoot {
                prefix: "BOOT-INF/classes/".to_string()
            }
        );
        assert!(root.contains("app/Main.class").unwrap());
        assert!(!root.contains("app/").unwrap());
        assert!(!root.contains("app/Other.class").unwrap());

        let dep = &list.dependencies()[0];
        match dep.kind() {
            SourceKind::Nested { entry } => assert_eq!(entry.name, "BOOT-INF/lib/a.jar"),
            other => panic!("unexpected kind: {:?}", other),
        }
        // Looking inside a nested source opens it.
        assert!(matches!(
            dep.contains("x.class"),
            Err(EngineError::CorruptArchive { .. })
        ));
    }

    #[test]
    fn test_nested_sources_open_lazily() {
        let archive = FakeArchive::new(&["BOOT-INF/classes/", "BOOT-INF/lib/broken.jar"]);
        let list = resolve_sources(archive.clone(), &Classifier::new(Layout::jar())).unwrap();

        // Resolution itself never touches nested bytes.
        assert_eq!(archive.opens.load(std::sync::atomic::Ordering::SeqCst), 0);
        let dep = &list.dependencies()[0];
        assert!(!dep.is_open());

        // Validation happens on first access.
        assert!(matches!(dep.open(), Err(EngineError::CorruptArchive { .. })));
        assert_eq!(archive.opens.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
