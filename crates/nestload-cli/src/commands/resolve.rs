//! `nestload resolve`: find which source defines a symbol.

use std::path::Path;

use nestload_runtime::{Launcher, RuntimeError};

use crate::output::StyledOutput;

pub fn execute(
    container: &Path,
    symbol: &str,
    launcher: &Launcher,
    out: &mut StyledOutput,
) -> anyhow::Result<i32> {
    let loader = launcher.loader(container)?;
    let unit = loader.resolve_symbol(symbol).map_err(RuntimeError::from)?;

    out.bold(&unit.symbol);
    out.plain(" -> ");
    out.info(&format!("{}!/{}", unit.source, unit.entry_name));
    out.dim(&format!(" ({} bytes, source #{})", unit.bytes.len(), unit.source_index));
    out.newline();
    out.flush();
    Ok(0)
}
