//! Launcher configuration (nestload.toml)
//!
//! Every key is optional; an empty file gives the executable-jar layout with
//! the application root searched first.
//!
//! ```toml
//! layout = "custom"
//! main = "app.Main"
//! entry-point-key = "Start-Class"
//! precedence = "application-first"
//! unit-suffix = ".class"
//! negative-cache = true
//!
//! [custom-layout]
//! classes = "APP/"
//! lib = ["LIB/"]
//! ```

use std::path::Path;

use nestload_engine::{Layout, LoaderOptions, Precedence, UnitNaming};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::manifest::DEFAULT_ENTRY_POINT_KEY;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("{0}")]
    ValidationError(String),
}

/// Built-in or custom container layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutKind {
    /// `BOOT-INF/classes/` + `BOOT-INF/lib/`
    #[default]
    Jar,
    /// `WEB-INF/classes/` + `WEB-INF/lib/`, `WEB-INF/lib-provided/`
    War,
    /// Taken from `[custom-layout]`
    Custom,
}

/// Prefixes for `layout = "custom"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomLayout {
    /// Application-root directory entry
    pub classes: String,
    /// Dependency prefixes
    #[serde(default)]
    pub lib: Vec<String>,
}

/// Search order between the application root and the dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrecedenceSetting {
    /// Application root wins over dependencies
    #[default]
    ApplicationFirst,
    /// Dependencies win over the application root
    DependenciesFirst,
}

impl From<PrecedenceSetting> for Precedence {
    fn from(setting: PrecedenceSetting) -> Self {
        match setting {
            PrecedenceSetting::ApplicationFirst => Precedence::ApplicationFirst,
            PrecedenceSetting::DependenciesFirst => Precedence::DependenciesFirst,
        }
    }
}

/// Launcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LauncherConfig {
    /// Container layout
    #[serde(default)]
    pub layout: LayoutKind,

    /// Entry point to use instead of the manifest's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,

    /// Manifest attribute naming the entry point
    #[serde(default = "default_entry_point_key")]
    pub entry_point_key: String,

    /// Source search order
    #[serde(default)]
    pub precedence: PrecedenceSetting,

    /// Suffix appended to unit paths
    #[serde(default = "default_unit_suffix")]
    pub unit_suffix: String,

    /// Remember failed lookups
    #[serde(default = "default_true")]
    pub negative_cache: bool,

    /// Prefixes when `layout = "custom"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_layout: Option<CustomLayout>,
}

fn default_entry_point_key() -> String {
    DEFAULT_ENTRY_POINT_KEY.to_string()
}

fn default_unit_suffix() -> String {
    ".class".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            layout: LayoutKind::default(),
            main: None,
            entry_point_key: default_entry_point_key(),
            precedence: PrecedenceSetting::default(),
            unit_suffix: default_unit_suffix(),
            negative_cache: true,
            custom_layout: None,
        }
    }
}

impl LauncherConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: LauncherConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entry_point_key.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "entry-point-key cannot be empty".to_string(),
            ));
        }
        if let Some(main) = &self.main {
            if main.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "main cannot be empty".to_string(),
                ));
            }
        }
        if self.layout != LayoutKind::Custom && self.custom_layout.is_some() {
            return Err(ConfigError::ValidationError(
                "[custom-layout] is only used with layout = \"custom\"".to_string(),
            ));
        }
        self.layout()?
            .validate()
            .map_err(ConfigError::ValidationError)
    }

    /// The layout prefixes this configuration selects.
    pub fn layout(&self) -> Result<Layout, ConfigError> {
        match self.layout {
            LayoutKind::Jar => Ok(Layout::jar()),
            LayoutKind::War => Ok(Layout::war()),
            LayoutKind::Custom => {
                let custom = self.custom_layout.as_ref().ok_or_else(|| {
                    ConfigError::ValidationError(
                        "layout = \"custom\" requires a [custom-layout] table".to_string(),
                    )
                })?;
                Ok(Layout::new(custom.classes.clone(), custom.lib.clone()))
            }
        }
    }

    /// Loader options derived from this configuration.
    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            precedence: self.precedence.into(),
            naming: UnitNaming::new(self.unit_suffix.clone()),
            negative_cache: self.negative_cache,
        }
    }
}
