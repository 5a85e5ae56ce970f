//! Runtime error types.

use nestload_engine::EngineError;

use crate::config::ConfigError;

/// Errors that can stop a launch.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Archive, resolution, or symbol lookup failure
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The container declares no entry point
    #[error("no entry point declared in {archive}: {reason}")]
    MissingMetadata {
        /// Archive location
        archive: String,
        /// What was missing
        reason: String,
    },

    /// The entry-point symbol resolved but cannot be invoked
    #[error("`{symbol}` cannot be used as an entry point: {reason}")]
    EntryPointShape {
        /// The entry-point symbol
        symbol: String,
        /// Why it is not invocable
        reason: String,
    },

    /// Launcher configuration could not be loaded or is invalid
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl RuntimeError {
    /// Process exit code for this failure.
    ///
    /// Each cause gets its own code so scripts can tell them apart.
    pub fn exit_code(&self) -> i32 {
        match self {
            RuntimeError::Engine(EngineError::CorruptArchive { .. }) => 65,
            RuntimeError::Engine(EngineError::Io { .. }) => 66,
            RuntimeError::Engine(EngineError::NoApplicationRoot { .. }) => 67,
            RuntimeError::MissingMetadata { .. } => 68,
            RuntimeError::Engine(EngineError::SymbolNotFound { .. }) => 69,
            RuntimeError::EntryPointShape { .. } => 70,
            RuntimeError::Config(_) => 78,
        }
    }

    /// Short machine-readable name of the cause, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeError::Engine(EngineError::CorruptArchive { .. }) => "corrupt-archive",
            RuntimeError::Engine(EngineError::Io { .. }) => "io",
            RuntimeError::Engine(EngineError::NoApplicationRoot { .. }) => "no-application-root",
            RuntimeError::MissingMetadata { .. } => "missing-metadata",
            RuntimeError::Engine(EngineError::SymbolNotFound { .. }) => "symbol-not-found",
            RuntimeError::EntryPointShape { .. } => "entry-point-shape",
            RuntimeError::Config(_) => "config",
        }
    }
}
