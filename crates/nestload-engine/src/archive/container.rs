//! Zip containers
//!
//! The central directory is parsed once with the `zip` crate when the archive
//! is opened. After that, entry reads never go back through `zip`: each entry
//! records where its data starts, and reads are positional on the shared
//! [`Storage`]. Opening a stored nested entry just narrows the storage window,
//! so `outer.jar!/BOOT-INF/lib/inner.jar` is read in place.

use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::DeflateDecoder;
use rustc_hash::FxHashMap;
use tracing::debug;

use super::storage::Storage;
use super::{Archive, Compression, Entry};
use crate::error::{EngineError, EngineResult};

/// Signature of a zip local file header.
const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;

/// Fixed part of a local file header, before the name and extra field.
const LOCAL_HEADER_LEN: usize = 30;

/// A zip archive backed by a file, a window of a file, or a buffer.
pub struct ZipContainer {
    location: String,
    /// File on disk holding the bytes, for I/O error reporting.
    path: PathBuf,
    storage: Storage,
    entries: Vec<Entry>,
    by_name: FxHashMap<String, usize>,
}

impl fmt::Debug for ZipContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipContainer")
            .field("location", &self.location)
            .field("storage", &self.storage)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl ZipContainer {
    /// Open a zip file and build its entry index.
    pub fn open(path: &Path) -> EngineResult<Self> {
        let storage = Storage::open(path).map_err(|e| EngineError::io(path, e))?;
        Self::from_storage(storage, path.display().to_string(), path.to_path_buf())
    }

    /// Index a zip that lives in `storage`.
    ///
    /// `path` names the file on disk the storage ultimately reads from.
    pub fn from_storage(storage: Storage, location: String, path: PathBuf) -> EngineResult<Self> {
        let entries = index_entries(&storage, &location)?;

        let mut by_name = FxHashMap::default();
        for (i, entry) in entries.iter().enumerate() {
            by_name.entry(entry.name.clone()).or_insert(i);
        }

        debug!(
            archive = %location,
            entries = entries.len(),
            in_memory = storage.is_memory(),
            "Indexed zip archive"
        );

        Ok(Self {
            location,
            path,
            storage,
            entries,
            by_name,
        })
    }

    /// The byte window this archive reads from.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Open a nested zip entry as its own container.
    ///
    /// A stored entry becomes a window over this container's storage; a
    /// compressed one is inflated into memory first.
    pub fn open_nested_zip(&self, entry: &Entry) -> EngineResult<ZipContainer> {
        let location = format!("{}!/{}", self.location, entry.name);
        if entry.is_dir {
            return Err(EngineError::corrupt(location, "entry is a directory"));
        }

        let storage = match entry.compression {
            Compression::Stored => {
                if entry.size != entry.compressed_size {
                    return Err(EngineError::corrupt(
                        location,
                        "stored entry has mismatched sizes",
                    ));
                }
                self.storage
                    .slice(entry.data_offset, entry.compressed_size)
                    .ok_or_else(|| {
                        EngineError::corrupt(&location, "entry data extends past end of parent")
                    })?
            }
            _ => {
                // Compressed bytes cannot be addressed in place.
                debug!(
                    archive = %location,
                    size = entry.size,
                    "Inflating compressed nested archive into memory"
                );
                Storage::from_vec(self.read_entry(entry)?)
            }
        };

        ZipContainer::from_storage(storage, location, self.path.clone())
    }

    fn read_error(&self, entry: &Entry, err: io::Error) -> EngineError {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            EngineError::corrupt(
                &self.location,
                format!("{}: data extends past end of archive", entry.name),
            )
        } else {
            EngineError::io(&self.path, err)
        }
    }
}

impl Archive for ZipContainer {
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

        let raw = self
            .storage
            .read_vec(entry.data_offset, entry.compressed_size)
            .map_err(|e| self.read_error(entry, e))?;

        let bytes = match &entry.compression {
            Compression::Stored => raw,
            Compression::Deflated => inflate(&raw, entry.size).map_err(|e| {
                EngineError::corrupt(&self.location, format!("{}: {}", entry.name, e))
            })?,
            Compression::Other(method) => {
                return Err(EngineError::corrupt(
                    &self.location,
                    format!("{}: unsupported compression method {}", entry.name, method),
                ))
            }
        };

        if bytes.len() as u64 != entry.size {
            return Err(EngineError::corrupt(
                &self.location,
                format!(
                    "{}: expected {} bytes, got {}",
                    entry.name,
                    entry.size,
                    bytes.len()
                ),
            ));
        }

        if let Some(expected) = entry.crc32 {
            let actual = crc32fast::hash(&bytes);
            if actual != expected {
                return Err(EngineError::corrupt(
                    &self.location,
                    format!(
                        "{}: crc mismatch (expected {:08x}, got {:08x})",
                        entry.name, expected, actual
                    ),
                ));
            }
        }

        Ok(bytes)
    }

    fn open_nested(&self, entry: &Entry) -> EngineResult<Arc<dyn Archive>> {
        Ok(Arc::new(self.open_nested_zip(entry)?))
    }
}

/// Walk the central directory and resolve each entry's data offset.
fn index_entries(storage: &Storage, location: &str) -> EngineResult<Vec<Entry>> {
    let mut archive = zip::ZipArchive::new(storage.reader())
        .map_err(|e| EngineError::corrupt(location, e.to_string()))?;

    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive
            .by_index_raw(i)
            .map_err(|e| EngineError::corrupt(location, format!("entry #{}: {}", i, e)))?;

        let compression = match file.compression() {
            zip::CompressionMethod::Stored => Compression::Stored,
            zip::CompressionMethod::Deflated => Compression::Deflated,
            other => Compression::Other(format!("{:?}", other)),
        };

        entries.push(Entry {
            name: file.name().to_string(),
            is_dir: file.is_dir(),
            header_offset: file.header_start(),
            data_offset: 0,
            compressed_size: file.compressed_size(),
            size: file.size(),
            compression,
            crc32: Some(file.crc32()),
        });
    }

    for entry in &mut entries {
        entry.data_offset = data_offset(storage, entry).map_err(|reason| {
            EngineError::corrupt(location, format!("{}: {}", entry.name, reason))
        })?;
        if !storage.contains_range(entry.data_offset, entry.compressed_size) {
            return Err(EngineError::corrupt(
                location,
                format!(
                    "{}: {} bytes of data at offset {} extend past end of archive ({} bytes)",
                    entry.name,
                    entry.compressed_size,
                    entry.data_offset,
                    storage.len()
                ),
            ));
        }
    }

    Ok(entries)
}

/// Offset of the first data byte, read from the local file header.
fn data_offset(storage: &Storage, entry: &Entry) -> Result<u64, String> {
    let mut header = [0u8; LOCAL_HEADER_LEN];
    storage
        .read_exact_at(entry.header_offset, &mut header)
        .map_err(|e| format!("unreadable local header: {}", e))?;

    let signature = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    if signature != LOCAL_HEADER_SIGNATURE {
        return Err(format!(
            "bad local header signature {:08x} at offset {}",
            signature, entry.header_offset
        ));
    }

    let name_len = u16::from_le_bytes([header[26], header[27]]) as u64;
    let extra_len = u16::from_le_bytes([header[28], header[29]]) as u64;
    Ok(entry.header_offset + LOCAL_HEADER_LEN as u64 + name_len + extra_len)
}

/// Inflate a raw deflate stream, refusing to produce more than `expected` bytes.
fn inflate(raw: &[u8], expected: u64) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected.min(64 * 1024 * 1024) as usize);
    DeflateDecoder::new(raw)
        .take(expected.saturating_add(1))
        .read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn build_zip(files: &[(&str, &[u8], zip::CompressionMethod)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data, method) in files {
            let options = SimpleFileOptions::default().compression_method(*method);
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    /// Offset of the first central-directory header.
    fn central_header(zip: &[u8]) -> usize {
        zip.windows(4)
            .position(|w| w == [0x50, 0x4b, 0x01, 0x02])
            .unwrap()
    }

    fn patch_u16(zip: &mut [u8], at: usize, value: u16) {
        zip[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn patch_u32(zip: &mut [u8], at: usize, value: u32) {
        zip[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn try_open_memory(bytes: Vec<u8>) -> EngineResult<ZipContainer> {
        ZipContainer::from_storage(Storage::from_vec(bytes), "test.zip".into(), PathBuf::new())
    }

    fn open_memory(bytes: Vec<u8>) -> ZipContainer {
        try_open_memory(bytes).unwrap()
    }

    #[test]
    fn test_index_preserves_order_and_flags() {
        let zip = build_zip(&[
            ("b/", b"", zip::CompressionMethod::Stored),
            ("b/z.txt", b"zz", zip::CompressionMethod::Deflated),
            ("a.txt", b"aa", zip::CompressionMethod::Stored),
        ]);
        let archive = open_memory(zip);

        let names: Vec<&str> = archive.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b/", "b/z.txt", "a.txt"]);
        assert!(archive.entries()[0].is_dir);
        assert_eq!(archive.entries()[1].compression, Compression::Deflated);
        assert_eq!(archive.entries()[2].compression, Compression::Stored);
    }

    #[test]
    fn test_read_stored_and_deflated() {
        let text = b"hello hello hello hello hello hello".to_vec();
        let zip = build_zip(&[
            ("stored.txt", &text, zip::CompressionMethod::Stored),
            ("deflated.txt", &text, zip::CompressionMethod::Deflated),
        ]);
        let archive = open_memory(zip);

        assert_eq!(archive.read_named("stored.txt").unwrap().unwrap(), text);
        assert_eq!(archive.read_named("deflated.txt").unwrap().unwrap(), text);
        assert!(archive.read_named("missing.txt").unwrap().is_none());
    }

    #[test]
    fn test_stored_data_offset_points_at_bytes() {
        let zip = build_zip(&[("x.bin", b"PAYLOAD", zip::CompressionMethod::Stored)]);
        let archive = open_memory(zip.clone());
        let entry = archive.find("x.bin").unwrap();
        let start = entry.data_offset as usize;
        assert_eq!(&zip[start..start + 7], b"PAYLOAD");
    }

    #[test]
    fn test_crc_mismatch_is_corrupt() {
        let zip = build_zip(&[("x.bin", b"PAYLOAD", zip::CompressionMethod::Stored)]);
        let archive = open_memory(zip);
        let mut entry = archive.find("x.bin").unwrap().clone();
        entry.crc32 = Some(0);
        let err = archive.read_entry(&entry).unwrap_err();
        assert!(matches!(err, EngineError::CorruptArchive { .. }));
        assert!(err.to_string().contains("crc mismatch"));
    }

    #[test]
    fn test_not_a_zip_is_corrupt() {
        let result = ZipContainer::from_storage(
            Storage::from_vec(b"definitely not a zip".to_vec()),
            "junk.zip".into(),
            PathBuf::new(),
        );
        assert!(matches!(result, Err(EngineError::CorruptArchive { .. })));
    }

    #[test]
    fn test_forged_entry_size_is_corrupt_at_open() {
        let mut zip = build_zip(&[("x.bin", b"PAYLOAD", zip::CompressionMethod::Stored)]);
        let cd = central_header(&zip);
        patch_u32(&mut zip, cd + 20, 0x7fff_fff0);
        patch_u32(&mut zip, cd + 24, 0x7fff_fff0);

        let err = try_open_memory(zip).unwrap_err();
        assert!(matches!(err, EngineError::CorruptArchive { .. }));
    }

    #[test]
    fn test_entry_past_end_is_corrupt_on_read() {
        let zip = build_zip(&[("x.bin", b"PAYLOAD", zip::CompressionMethod::Stored)]);
        let archive = open_memory(zip);
        let mut entry = archive.find("x.bin").unwrap().clone();
        entry.compressed_size = 0x7fff_fff0;
        entry.size = 0x7fff_fff0;

        let err = archive.read_entry(&entry).unwrap_err();
        assert!(matches!(err, EngineError::CorruptArchive { .. }));
        assert!(err.to_string().contains("past end of archive"));
    }

    #[test]
    fn test_unsupported_compression_method_is_corrupt() {
        let mut zip = build_zip(&[("x.bin", b"PAYLOAD", zip::CompressionMethod::Stored)]);
        // Method 14 (LZMA) is not readable here.
        patch_u16(&mut zip, 8, 14);
        let cd = central_header(&zip);
        patch_u16(&mut zip, cd + 10, 14);

        let archive = open_memory(zip);
        let entry = archive.find("x.bin").unwrap().clone();
        assert!(matches!(entry.compression, Compression::Other(_)));

        let err = archive.read_entry(&entry).unwrap_err();
        assert!(matches!(err, EngineError::CorruptArchive { .. }));
        assert!(err.to_string().contains("unsupported compression method"));
    }

    #[test]
    fn test_bad_local_header_signature_is_corrupt() {
        let mut zip = build_zip(&[("x.bin", b"PAYLOAD", zip::CompressionMethod::Stored)]);
        patch_u32(&mut zip, 0, 0xdead_beef);

        let err = try_open_memory(zip).unwrap_err();
        assert!(matches!(err, EngineError::CorruptArchive { .. }));
    }

    #[test]
    fn test_data_offset_rejects_bad_signature() {
        let zip = build_zip(&[("x.bin", b"PAYLOAD", zip::CompressionMethod::Stored)]);
        let archive = open_memory(zip.clone());
        let entry = archive.find("x.bin").unwrap().clone();

        let mut patched = zip;
        patch_u32(&mut patched, 0, 0xdead_beef);
        let reason = data_offset(&Storage::from_vec(patched), &entry).unwrap_err();
        assert!(reason.contains("bad local header signature"));
    }

    #[test]
    fn test_missing_file_is_io() {
        let err = ZipContainer::open(Path::new("/nonexistent/container.jar")).unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
    }

    #[test]
    fn test_open_stored_nested_in_place() {
        let inner = build_zip(&[("lib/Helper.class", b"HELPER", zip::CompressionMethod::Deflated)]);
        let outer = build_zip(&[("LIB/inner.jar", &inner, zip::CompressionMethod::Stored)]);
        let archive = open_memory(outer);

        let entry = archive.find("LIB/inner.jar").unwrap().clone();
        let nested = archive.open_nested(&entry).unwrap();
        assert_eq!(nested.location(), "test.zip!/LIB/inner.jar");
        assert_eq!(nested.read_named("lib/Helper.class").unwrap().unwrap(), b"HELPER");
    }

    #[test]
    fn test_stored_nested_is_a_window_not_a_copy() {
        let inner = build_zip(&[("x.class", b"X", zip::CompressionMethod::Stored)]);
        let outer = build_zip(&[("LIB/inner.jar", &inner, zip::CompressionMethod::Stored)]);
        let archive = open_memory(outer);

        let entry = archive.find("LIB/inner.jar").unwrap().clone();
        let nested = archive.open_nested_zip(&entry).unwrap();
        assert_eq!(nested.storage().base(), entry.data_offset);
        assert_eq!(nested.storage().len(), inner.len() as u64);
    }

    #[test]
    fn test_open_deflated_nested() {
        let inner = build_zip(&[("lib/Helper.class", b"HELPER", zip::CompressionMethod::Stored)]);
        let outer = build_zip(&[("LIB/inner.jar", &inner, zip::CompressionMethod::Deflated)]);
        let archive = open_memory(outer);

        let entry = archive.find("LIB/inner.jar").unwrap().clone();
        let nested = archive.open_nested(&entry).unwrap();
        assert_eq!(nested.read_named("lib/Helper.class").unwrap().unwrap(), b"HELPER");
    }

    #[test]
    fn test_nested_garbage_is_corrupt_on_open() {
        let outer = build_zip(&[("LIB/bad.jar", b"not a zip", zip::CompressionMethod::Stored)]);
        let archive = open_memory(outer);
        let entry = archive.find("LIB/bad.jar").unwrap().clone();
        let err = archive.open_nested(&entry).unwrap_err();
        match err {
            EngineError::CorruptArchive { archive, .. } => {
                assert_eq!(archive, "test.zip!/LIB/bad.jar");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
