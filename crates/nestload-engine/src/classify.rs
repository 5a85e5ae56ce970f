//! Entry classification
//!
//! Maps each index entry to the role it plays in the launch: the application
//! root directory, a nested dependency archive, or nothing. The prefixes come
//! from a [`Layout`] passed in at construction, so several launcher layouts
//! can coexist in one process.

use crate::archive::Entry;

/// Directory prefixes that define a container layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Exact name of the application-root directory entry, e.g. `BOOT-INF/classes/`
    pub classes: String,
    /// Prefixes under which nested dependency archives live
    pub lib: Vec<String>,
}

impl Layout {
    /// Create a layout from explicit prefixes.
    pub fn new(classes: impl Into<String>, lib: Vec<String>) -> Self {
        Self {
            classes: classes.into(),
            lib,
        }
    }

    /// Executable jar layout.
    pub fn jar() -> Self {
        Self::new("BOOT-INF/classes/", vec!["BOOT-INF/lib/".to_string()])
    }

    /// Web archive layout; provided libraries are searched after regular ones.
    pub fn war() -> Self {
        Self::new(
            "WEB-INF/classes/",
            vec!["WEB-INF/lib/".to_string(), "WEB-INF/lib-provided/".to_string()],
        )
    }

    /// Check that every prefix names a directory.
    pub fn validate(&self) -> Result<(), String> {
        let all = std::iter::once(&self.classes).chain(self.lib.iter());
        for prefix in all {
            if prefix.is_empty() {
                return Err("layout prefixes must not be empty".to_string());
            }
            if !prefix.ends_with('/') {
                return Err(format!("layout prefix `{}` must end with `/`", prefix));
            }
            if prefix.starts_with('/') {
                return Err(format!("layout prefix `{}` must be relative", prefix));
            }
        }
        if self.lib.is_empty() {
            return Err("layout needs at least one dependency prefix".to_string());
        }
        Ok(())
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::jar()
    }
}

/// Role of an entry in the launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The application-root directory
    ApplicationRoot,
    /// A nested dependency archive
    NestedDependency,
    /// Anything else
    Ignore,
}

/// Pure entry classifier bound to one layout.
#[derive(Debug, Clone)]
pub struct Classifier {
    layout: Layout,
}

impl Classifier {
    /// Create a classifier for a layout.
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// The layout this classifier applies.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Classify one entry. Nested archives are not opened here.
    pub fn classify(&self, entry: &Entry) -> Classification {
        if entry.is_dir {
            if entry.name == self.layout.classes {
                return Classification::ApplicationRoot;
            }
            return Classification::Ignore;
        }
        if self
            .layout
            .lib
            .iter()
            .any(|prefix| entry.name.len() > prefix.len() && entry.name.starts_with(prefix.as_str()))
        {
            return Classification::NestedDependency;
        }
        Classification::Ignore
    }
}
