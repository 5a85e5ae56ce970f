//! Exploded containers
//!
//! An already-unpacked container directory, read through the same [`Archive`]
//! trait as a zip. Entry names are relative, slash-separated, and directories
//! carry a trailing `/`, exactly as they would inside the zip. The walk is
//! sorted by file name so the index order is stable between runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;
use walkdir::WalkDir;

use super::container::ZipContainer;
use super::{Archive, Compression, Entry};
use crate::error::{EngineError, EngineResult};

/// A container directory on disk.
#[derive(Debug)]
pub struct ExplodedArchive {
    root: PathBuf,
    location: String,
    entries: Vec<Entry>,
    by_name: FxHashMap<String, usize>,
}

impl ExplodedArchive {
    /// Walk `root` and index every file and directory below it.
    pub fn open(root: &Path) -> EngineResult<Self> {
        let mut entries = Vec::new();
        for item in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let item = item.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                EngineError::io(path, e.into())
            })?;

            let relative = match item.path().strip_prefix(root) {
                Ok(rel) => rel,
                Err(_) => continue,
            };
            let mut name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let is_dir = item.file_type().is_dir();
            let size = if is_dir {
                0
            } else {
                item.metadata()
                    .map_err(|e| EngineError::io(item.path(), e.into()))?
                    .len()
            };
            if is_dir {
                name.push('/');
            }

            entries.push(Entry {
                name,
                is_dir,
                header_offset: 0,
                data_offset: 0,
                compressed_size: size,
                size,
                compression: Compression::Stored,
                crc32: None,
            });
        }

        let mut by_name = FxHashMap::default();
        for (i, entry) in entries.iter().enumerate() {
            by_name.entry(entry.name.clone()).or_insert(i);
        }

        let location = root.display().to_string();
        debug!(archive = %location, entries = entries.len(), "Indexed exploded archive");

        Ok(Self {
            root: root.to_path_buf(),
            location,
            entries,
            by_name,
        })
    }

    /// Root directory of the container.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, entry: &Entry) -> PathBuf {
        let mut path = self.root.clone();
        for part in entry.name.split('/').filter(|p| !p.is_empty()) {
            path.push(part);
        }
        path
    }
}

impl Archive for ExplodedArchive {
    fn location(&self) -> &str {
        &self.location
    }

    fn entries(&self) -> &[Entry] {
        &self.entries
    }

    fn find(&self, name: &str) -> Option<&Entry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    fn read_entry(&self, entry: &Entry) -> EngineResult<Vec<u8>> {
        if entry.is_dir {
            return Ok(Vec::new());
        }
        let path = self.path_of(entry);
        std::fs::read(&path).map_err(|e| EngineError::io(path, e))
    }

    fn open_nested(&self, entry: &Entry) -> EngineResult<Arc<dyn Archive>> {
        if entry.is_dir {
            return Err(EngineError::corrupt(
                format!("{}/{}", self.location, entry.name),
                "entry is a directory",
            ));
        }
        Ok(Arc::new(ZipContainer::open(&self.path_of(entry))?))
    }
}
