//! Archive reader
//!
//! Random-access view over a container without extracting it:
//! - **storage**: positional byte windows over a file or a buffer
//! - **container**: zip containers, including zips nested inside other zips
//! - **exploded**: an already-unpacked container directory
//!
//! Every archive exposes the same [`Archive`] trait, so the resolver and the
//! loader never care which kind they are reading.

pub mod container;
pub mod exploded;
pub mod storage;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};

pub use container::ZipContainer;
pub use exploded::ExplodedArchive;
pub use storage::{RegionReader, Storage};

/// How an entry's bytes are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compression {
    /// Bytes stored as-is
    Stored,
    /// Raw deflate stream
    Deflated,
    /// Any other method; reading it fails
    Other(String),
}

/// A record in an archive index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Slash-separated path; directories end with `/`
    pub name: String,
    /// Whether this is a directory entry
    pub is_dir: bool,
    /// Offset of the local file header
    pub header_offset: u64,
    /// Offset of the first data byte
    pub data_offset: u64,
    /// Length of the stored (possibly compressed) data
    pub compressed_size: u64,
    /// Length once decompressed
    pub size: u64,
    /// Compression method
    pub compression: Compression,
    /// Expected CRC-32 of the decompressed bytes, when the format records one
    pub crc32: Option<u32>,
}

/// Random-access archive.
///
/// Implementations are immutable once opened and safe to share across
/// threads.
pub trait Archive: Send + Sync + fmt::Debug {
    /// Human-readable location, e.g. `app.jar` or `app.jar!/BOOT-INF/lib/a.jar`.
    fn location(&self) -> &str;

    /// All entries in index order.
    fn entries(&self) -> &[Entry];

    /// Look up an entry by exact name. The first entry with a name wins.
    fn find(&self, name: &str) -> Option<&Entry>;

    /// Read and decompress the bytes of an entry.
    fn read_entry(&self, entry: &Entry) -> EngineResult<Vec<u8>>;

    /// Open an entry whose bytes are themselves a zip archive.
    fn open_nested(&self, entry: &Entry) -> EngineResult<Arc<dyn Archive>>;

    /// Read an entry by name, or `None` when it does not exist.
    fn read_named(&self, name: &str) -> EngineResult<Option<Vec<u8>>> {
        match self.find(name) {
            Some(entry) if !entry.is_dir => self.read_entry(entry).map(Some),
            _ => Ok(None),
        }
    }
}

/// Open a container: a directory is treated as exploded, anything else as zip.
pub fn open_container(path: &Path) -> EngineResult<Arc<dyn Archive>> {
    let metadata = std::fs::metadata(path).map_err(|e| EngineError::io(path, e))?;
    if metadata.is_dir() {
        Ok(Arc::new(ExplodedArchive::open(path)?))
    } else {
        Ok(Arc::new(ZipContainer::open(path)?))
    }
}
