//! Engine error types.

use std::path::PathBuf;

/// Errors raised while indexing containers or resolving symbols.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The container (or an exploded file) could not be read
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Entry bytes do not parse as what the index claims
    #[error("corrupt archive {archive}: {reason}")]
    CorruptArchive {
        /// Human-readable location of the archive (path, or `outer!/inner`)
        archive: String,
        /// What went wrong
        reason: String,
    },

    /// The classifier found no application-root directory entry
    #[error("no application root `{prefix}` in {archive}")]
    NoApplicationRoot {
        /// Archive location
        archive: String,
        /// The application-root prefix that was searched for
        prefix: String,
    },

    /// A symbol could not be found in any code source
    #[error("symbol `{symbol}` not found in {searched} code source(s)")]
    SymbolNotFound {
        /// The fully-qualified symbol name
        symbol: String,
        /// Number of code sources that were searched
        searched: usize,
    },
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(archive: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::CorruptArchive {
            archive: archive.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;
