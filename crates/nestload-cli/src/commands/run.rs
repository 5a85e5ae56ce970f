//! `nestload run`: launch a container's entry point.

use std::path::Path;

use nestload_runtime::{EntryPointRegistry, LauncherConfig, Launcher};

/// Diagnostic entry point built into the stock binary.
pub const ECHO_SYMBOL: &str = "nestload.Echo";

/// Entry points this binary can link.
pub fn builtin_registry() -> EntryPointRegistry {
    let mut registry = EntryPointRegistry::new();
    registry.register(ECHO_SYMBOL, |inv| {
        println!("{}", inv.args.join(" "));
        0
    });
    registry
}

pub fn execute(container: &Path, config: LauncherConfig, args: Vec<String>) -> anyhow::Result<i32> {
    let launcher = Launcher::new(config, builtin_registry())?;
    Ok(launcher.launch(container, args)?)
}
