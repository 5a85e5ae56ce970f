//! Nestload Runtime
//!
//! Drives a launch on top of `nestload-engine`: reads launcher configuration,
//! the container manifest's entry-point attribute, and links the resolved
//! entry-point unit to a registered Rust function before invoking it.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod launcher;
pub mod linker;
pub mod manifest;

pub use config::{ConfigError, CustomLayout, LauncherConfig, LayoutKind, PrecedenceSetting};
pub use error::RuntimeError;
pub use launcher::{Launcher, PreparedLaunch};
pub use linker::{EntryFn, EntryPointRegistry, Invocation, Linker};
pub use manifest::{
    EntryPointDescriptor, EntryPointOrigin, Manifest, DEFAULT_ENTRY_POINT_KEY, MANIFEST_PATH,
};
