//! Container manifest (META-INF/MANIFEST.MF)
//!
//! Only the main section is read. Syntax is the usual jar manifest one:
//! `Key: Value` lines, a line starting with a single space continues the
//! previous value, and the first blank line ends the main section. Attribute
//! names compare case-insensitively.

use nestload_engine::Archive;
use tracing::debug;

use crate::error::RuntimeError;

/// Where the manifest lives inside a container.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Attribute naming the entry-point symbol unless configured otherwise.
pub const DEFAULT_ENTRY_POINT_KEY: &str = "Start-Class";

/// Main-section attributes of a manifest, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    attributes: Vec<(String, String)>,
}

impl Manifest {
    /// Parse manifest text. Malformed lines are skipped.
    pub fn parse(text: &str) -> Self {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut attributes: Vec<(String, String)> = Vec::new();

        for raw in text.split('\n') {
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            if line.is_empty() {
                break;
            }
            if let Some(rest) = line.strip_prefix(' ') {
                if let Some((_, value)) = attributes.last_mut() {
                    value.push_str(rest);
                }
                continue;
            }
            match line.split_once(':') {
                Some((key, value)) if !key.trim().is_empty() => {
                    let value = value.strip_prefix(' ').unwrap_or(value);
                    attributes.push((key.trim().to_string(), value.to_string()));
                }
                _ => debug!(line, "Skipping malformed manifest line"),
            }
        }

        Self { attributes }
    }

    /// Read the manifest from a container, if it has one.
    pub fn from_archive(archive: &dyn Archive) -> Result<Option<Self>, RuntimeError> {
        let bytes = archive.read_named(MANIFEST_PATH)?;
        Ok(bytes.map(|b| Self::parse(&String::from_utf8_lossy(&b))))
    }

    /// Value of an attribute; the first occurrence wins.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// All attributes in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check if there are no attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Where the entry-point symbol came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPointOrigin {
    /// A manifest attribute
    Manifest {
        /// The attribute name
        key: String,
    },
    /// Configuration or command line
    Override,
}

/// The single symbol a launch starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPointDescriptor {
    /// Fully-qualified symbol name
    pub symbol: String,
    /// Where it was declared
    pub origin: EntryPointOrigin,
}

impl EntryPointDescriptor {
    /// Read the entry point declared under `key` in the container manifest.
    pub fn from_container(archive: &dyn Archive, key: &str) -> Result<Self, RuntimeError> {
        let missing = |reason: String| RuntimeError::MissingMetadata {
            archive: archive.location().to_string(),
            reason,
        };

        let manifest = Manifest::from_archive(archive)?
            .ok_or_else(|| missing(format!("no {}", MANIFEST_PATH)))?;

        let symbol = manifest
            .get(key)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing(format!("manifest has no `{}` attribute", key)))?;

        Ok(Self {
            symbol: symbol.to_string(),
            origin: EntryPointOrigin::Manifest {
                key: key.to_string(),
            },
        })
    }

    /// An entry point supplied from outside the container.
    pub fn overridden(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            origin: EntryPointOrigin::Override,
        }
    }
}
