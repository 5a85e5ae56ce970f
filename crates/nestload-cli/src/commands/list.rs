//! `nestload list`: print index entries with their classification.

use std::path::Path;

use nestload_engine::{open_container, Classification, Classifier};
use nestload_runtime::RuntimeError;

use crate::output::StyledOutput;

fn label(class: Classification) -> &'static str {
    match class {
        Classification::ApplicationRoot => "root",
        Classification::NestedDependency => "nested",
        Classification::Ignore => "-",
    }
}

pub fn execute(container: &Path, classifier: &Classifier, out: &mut StyledOutput) -> anyhow::Result<i32> {
    let archive = open_container(container).map_err(RuntimeError::from)?;

    for entry in archive.entries() {
        let class = classifier.classify(entry);
        let tag = format!("{:<7}", label(class));
        match class {
            Classification::ApplicationRoot => out.success(&tag),
            Classification::NestedDependency => out.info(&tag),
            Classification::Ignore => out.dim(&tag),
        }
        out.plain(&format!("{:>10}  {}", entry.size, entry.name));
        out.newline();
    }
    out.flush();
    Ok(0)
}
