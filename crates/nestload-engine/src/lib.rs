//! Nestload Engine
//!
//! Runs code straight out of a container archive whose dependencies are
//! themselves archives nested inside it, without extracting anything:
//! - **Archive**: random-access zip reader with in-place nested opening (`archive` module)
//! - **Classifier**: application root / nested dependency / ignore (`classify` module)
//! - **Resolver**: ordered, lazily-opened code sources (`resolve` module)
//! - **Loader**: symbol resolution across the sources with caching (`loader` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use nestload_engine::{open_container, resolve_sources, Classifier, CompositeLoader, Layout};
//!
//! let container = open_container("app.jar".as_ref())?;
//! let sources = resolve_sources(container, &Classifier::new(Layout::jar()))?;
//! let loader = CompositeLoader::new(sources);
//! let unit = loader.resolve_symbol("com.example.Main")?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod archive;
pub mod classify;
pub mod error;
pub mod loader;
pub mod resolve;

pub use archive::{open_container, Archive, Compression, Entry, ExplodedArchive, ZipContainer};
pub use classify::{Classification, Classifier, Layout};
pub use error::{EngineError, EngineResult};
pub use loader::{
    CompositeLoader, LoaderOptions, LoaderStats, Precedence, ResolvedUnit, UnitNaming,
};
pub use resolve::{resolve_sources, CodeSource, SourceKind, SourceList};
