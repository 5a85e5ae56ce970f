//! Positional storage behind an archive
//!
//! A [`Storage`] is a window `[base, base + len)` over either a shared file
//! handle or an in-memory buffer. Windows are cheap to clone and to narrow,
//! which is what lets a nested archive be addressed inside its parent without
//! being copied anywhere.
//!
//! All reads are positional (`pread` on unix, `seek_read` on windows), so any
//! number of threads can read through clones of the same storage without a
//! lock.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
enum Backing {
    File(Arc<File>),
    Memory(Arc<[u8]>),
}

/// A readable byte window over a file or a buffer.
#[derive(Clone)]
pub struct Storage {
    backing: Backing,
    base: u64,
    len: u64,
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.backing {
            Backing::File(_) => "file",
            Backing::Memory(_) => "memory",
        };
        f.debug_struct("Storage")
            .field("backing", &kind)
            .field("base", &self.base)
            .field("len", &self.len)
            .finish()
    }
}

impl Storage {
    /// Open a file and cover its whole length.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            backing: Backing::File(Arc::new(file)),
            base: 0,
            len,
        })
    }

    /// Wrap an owned buffer.
    pub fn from_vec(data: Vec<u8>) -> Self {
        let len = data.len() as u64;
        Self {
            backing: Backing::Memory(data.into()),
            base: 0,
            len,
        }
    }

    /// Length of the window in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Check if the window is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Absolute offset of this window within its backing file or buffer.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Whether the bytes live in memory rather than in a file.
    pub fn is_memory(&self) -> bool {
        matches!(self.backing, Backing::Memory(_))
    }

    /// Narrow to `[offset, offset + len)` relative to this window.
    ///
    /// Returns `None` when the range does not fit.
    pub fn slice(&self, offset: u64, len: u64) -> Option<Storage> {
        let end = offset.checked_add(len)?;
        if end > self.len {
            return None;
        }
        Some(Storage {
            backing: self.backing.clone(),
            base: self.base + offset,
            len,
        })
    }

    /// Fill `buf` from `offset` (relative to this window).
    ///
    /// Reads past the end of the window fail with `UnexpectedEof`.
    pub fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.check_range(offset, buf.len() as u64)?;

        match &self.backing {
            Backing::Memory(data) => {
                let start = (self.base + offset) as usize;
                buf.copy_from_slice(&data[start..start + buf.len()]);
                Ok(())
            }
            Backing::File(file) => {
                read_fully(|chunk, at| pread(file, chunk, at), self.base + offset, buf)
            }
        }
    }

    /// Read `len` bytes starting at `offset` into a new buffer.
    ///
    /// The range is checked before anything is allocated.
    pub fn read_vec(&self, offset: u64, len: u64) -> io::Result<Vec<u8>> {
        self.check_range(offset, len)?;
        let mut buf = vec![0u8; len as usize];
        self.read_exact_at(offset, &mut buf)?;
        Ok(buf)
    }

    /// Whether `[offset, offset + len)` lies inside this window.
    pub fn contains_range(&self, offset: u64, len: u64) -> bool {
        offset
            .checked_add(len)
            .is_some_and(|end| end <= self.len)
    }

    fn check_range(&self, offset: u64, len: u64) -> io::Result<()> {
        if self.contains_range(offset, len) {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of region",
            ))
        }
    }

    /// A `Read + Seek` cursor over this window, starting at 0.
    pub fn reader(&self) -> RegionReader {
        RegionReader {
            storage: self.clone(),
            pos: 0,
        }
    }
}

/// Positional read loop over `read(chunk, offset)`.
///
/// An interrupted read is retried once; a second interruption is reported.
fn read_fully(
    mut read: impl FnMut(&mut [u8], u64) -> io::Result<usize>,
    offset: u64,
    buf: &mut [u8],
) -> io::Result<()> {
    let mut done = 0usize;
    let mut retried = false;
    while done < buf.len() {
        match read(&mut buf[done..], offset + done as u64) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "unexpected end of file",
                ))
            }
            Ok(n) => done += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted && !retried => retried = true,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(unix)]
fn pread(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn pread(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

/// Sequential cursor over a [`Storage`] window.
///
/// Used to hand a window to the `zip` crate, which wants `Read + Seek`.
#[derive(Debug, Clone)]
pub struct RegionReader {
    storage: Storage,
    pos: u64,
}

impl Read for RegionReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.storage.len.saturating_sub(self.pos);
        let n = (buf.len() as u64).min(remaining) as usize;
        if n == 0 {
            return Ok(0);
        }
        self.storage.read_exact_at(self.pos, &mut buf[..n])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for RegionReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(delta) => self.storage.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        match target {
            Some(t) => {
                self.pos = t;
                Ok(t)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_memory_slice_reads_window() {
        let storage = Storage::from_vec(b"0123456789".to_vec());
        let window = storage.slice(2, 5).unwrap();
        assert_eq!(window.base(), 2);
        assert_eq!(window.len(), 5);
        assert_eq!(window.read_vec(0, 5).unwrap(), b"23456");

        let inner = window.slice(1, 2).unwrap();
        assert_eq!(inner.base(), 3);
        assert_eq!(inner.read_vec(0, 2).unwrap(), b"34");
    }

    #[test]
    fn test_slice_out_of_range() {
        let storage = Storage::from_vec(vec![0u8; 4]);
        assert!(storage.slice(2, 3).is_none());
        assert!(storage.slice(u64::MAX, 2).is_none());
        assert!(storage.slice(4, 0).is_some());
    }

    #[test]
    fn test_read_past_end_is_eof() {
        let storage = Storage::from_vec(vec![1, 2, 3]);
        let mut buf = [0u8; 4];
        let err = storage.read_exact_at(0, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_oversized_read_fails_before_allocating() {
        let storage = Storage::from_vec(vec![0u8; 16]);
        let err = storage.read_vec(8, 0x7fff_fff0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(storage.read_vec(u64::MAX, 2).is_err());
        assert!(!storage.contains_range(8, 9));
        assert!(storage.contains_range(8, 8));
    }

    #[test]
    fn test_interrupted_read_is_retried_once() {
        let mut calls = 0;
        let mut buf = [0u8; 4];
        read_fully(
            |chunk, at| {
                calls += 1;
                if calls == 1 {
                    return Err(io::Error::from(io::ErrorKind::Interrupted));
                }
                assert_eq!(at, 100);
                chunk.copy_from_slice(b"data");
                Ok(chunk.len())
            },
            100,
            &mut buf,
        )
        .unwrap();
        assert_eq!(calls, 2);
        assert_eq!(&buf, b"data");
    }

    #[test]
    fn test_second_interruption_is_reported() {
        let mut calls = 0;
        let mut buf = [0u8; 4];
        let err = read_fully(
            |_, _| {
                calls += 1;
                Err(io::Error::from(io::ErrorKind::Interrupted))
            },
            0,
            &mut buf,
        )
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_short_reads_continue_and_zero_is_eof() {
        let source = b"abcdef";
        let mut buf = [0u8; 6];
        read_fully(
            |chunk, at| {
                let at = at as usize;
                let n = chunk.len().min(2);
                chunk[..n].copy_from_slice(&source[at..at + n]);
                Ok(n)
            },
            0,
            &mut buf,
        )
        .unwrap();
        assert_eq!(&buf, source);

        let err = read_fully(|_, _| Ok(0), 0, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_file_window() {
        let mut temp = tempfile::NamedTempFile::new().unwrap();
        temp.write_all(b"header|payload|trailer").unwrap();
        temp.flush().unwrap();

        let storage = Storage::open(temp.path()).unwrap();
        assert!(!storage.is_memory());
        let payload = storage.slice(7, 7).unwrap();
        assert_eq!(payload.read_vec(0, 7).unwrap(), b"payload");
    }

    #[test]
    fn test_region_reader_seek_and_read() {
        let storage = Storage::from_vec(b"abcdefgh".to_vec()).slice(2, 4).unwrap();
        let mut reader = storage.reader();

        let mut all = Vec::new();
        reader.read_to_end(&mut all).unwrap();
        assert_eq!(all, b"cdef");

        assert_eq!(reader.seek(SeekFrom::End(-1)).unwrap(), 3);
        let mut one = [0u8; 1];
        reader.read_exact(&mut one).unwrap();
        assert_eq!(&one, b"f");

        assert!(reader.seek(SeekFrom::Current(-10)).is_err());
    }
}
