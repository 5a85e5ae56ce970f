//! `nestload sources`: print the ordered source list.

use std::path::Path;

use nestload_engine::{Compression, SourceKind};
use nestload_runtime::Launcher;

use crate::output::StyledOutput;

pub fn execute(container: &Path, launcher: &Launcher, out: &mut StyledOutput) -> anyhow::Result<i32> {
    let sources = launcher.sources(container)?;

    for (index, source) in sources.iter().enumerate() {
        out.dim(&format!("{:>3}  ", index));
        match source.kind() {
            SourceKind::ApplicationRoot { .. } => {
                out.success("root    ");
                out.dim(&format!("{:<9}{:>10}  ", "-", "-"));
            }
            SourceKind::Nested { entry } => {
                out.info("nested  ");
                let method = match &entry.compression {
                    Compression::Stored => "stored",
                    Compression::Deflated => "deflated",
                    Compression::Other(_) => "other",
                };
                out.dim(&format!("{:<9}{:>10}  ", method, entry.size));
            }
        }
        out.plain(source.name());
        out.newline();
    }
    out.flush();
    Ok(0)
}
