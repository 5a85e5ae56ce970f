//! Launcher: container → sources → entry point → invocation

use std::path::Path;
use std::sync::Arc;

use nestload_engine::{
    open_container, resolve_sources, Archive, Classifier, CompositeLoader, ResolvedUnit,
    SourceList,
};
use tracing::{debug, error, info};

use crate::config::LauncherConfig;
use crate::error::RuntimeError;
use crate::linker::{Invocation, Linker};
use crate::manifest::EntryPointDescriptor;

/// A container that is ready to run: sources resolved and the entry-point
/// unit loaded, but nothing invoked yet.
#[derive(Debug)]
pub struct PreparedLaunch {
    /// The top-level container
    pub container: Arc<dyn Archive>,
    /// Loader over the container's source list
    pub loader: Arc<CompositeLoader>,
    /// The entry point that will be invoked
    pub entry_point: EntryPointDescriptor,
    /// The entry-point unit
    pub unit: Arc<ResolvedUnit>,
}

/// Launches containers with one layout and one linker.
pub struct Launcher {
    config: LauncherConfig,
    classifier: Classifier,
    linker: Arc<dyn Linker>,
}

impl std::fmt::Debug for Launcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Launcher")
            .field("config", &self.config)
            .field("classifier", &self.classifier)
            .finish_non_exhaustive()
    }
}

impl Launcher {
    /// Create a launcher. Fails if the configuration is invalid.
    pub fn new(config: LauncherConfig, linker: impl Linker + 'static) -> Result<Self, RuntimeError> {
        config.validate()?;
        let classifier = Classifier::new(config.layout()?);
        Ok(Self {
            config,
            classifier,
            linker: Arc::new(linker),
        })
    }

    /// The configuration this launcher was built with.
    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// The classifier derived from the configured layout.
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Open the container and resolve its ordered source list.
    pub fn sources(&self, path: &Path) -> Result<SourceList, RuntimeError> {
        let container = open_container(path)?;
        Ok(resolve_sources(container, &self.classifier)?)
    }

    /// Open the container and build a loader over its sources.
    pub fn loader(&self, path: &Path) -> Result<Arc<CompositeLoader>, RuntimeError> {
        let sources = self.sources(path)?;
        Ok(Arc::new(CompositeLoader::with_options(
            sources,
            self.config.loader_options(),
        )))
    }

    /// Run every launch step except the invocation.
    pub fn prepare(&self, path: &Path) -> Result<PreparedLaunch, RuntimeError> {
        let loader = self.loader(path)?;
        let container = Arc::clone(loader.sources().container());

        let entry_point = match &self.config.main {
            Some(symbol) => EntryPointDescriptor::overridden(symbol.trim()),
            None => {
                EntryPointDescriptor::from_container(container.as_ref(), &self.config.entry_point_key)?
            }
        };
        debug!(symbol = %entry_point.symbol, origin = ?entry_point.origin, "Entry point selected");

        let unit = loader.resolve_symbol(&entry_point.symbol)?;

        Ok(PreparedLaunch {
            container,
            loader,
            entry_point,
            unit,
        })
    }

    /// Launch the container at `path`, passing `args` to the entry point
    /// unchanged. Returns the entry point's exit code.
    pub fn launch(&self, path: &Path, args: Vec<String>) -> Result<i32, RuntimeError> {
        info!(container = %path.display(), "Launching");

        let result = self.prepare(path).and_then(|prepared| {
            let entry = self.linker.link(&prepared.unit)?;
            Ok((prepared, entry))
        });

        let (prepared, entry) = match result {
            Ok(ready) => ready,
            Err(err) => {
                error!(
                    container = %path.display(),
                    kind = err.kind(),
                    exit_code = err.exit_code(),
                    "Launch failed: {}",
                    err
                );
                return Err(err);
            }
        };

        info!(
            symbol = %prepared.entry_point.symbol,
            source = %prepared.unit.source,
            sources = prepared.loader.sources().len(),
            "Invoking entry point"
        );

        let code = entry(Invocation {
            symbol: &prepared.entry_point.symbol,
            unit: &prepared.unit,
            args: &args,
            loader: &prepared.loader,
        });

        debug!(exit_code = code, stats = ?prepared.loader.stats(), "Entry point returned");
        Ok(code)
    }
}
