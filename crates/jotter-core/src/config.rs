//! Session configuration: debounce window and the contents of new notes.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::ConfigError;
use crate::types::{Category, NoteFields, first_category};

/// Field values a freshly created note starts with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteDefaults {
    pub title: String,
    pub content: String,
    /// Used when the store lists no categories, and for loaded notes that
    /// have none.
    pub category: SmolStr,
}

impl Default for NoteDefaults {
    fn default() -> Self {
        Self {
            title: "Note Title".to_owned(),
            content: "Pour your heart out...".to_owned(),
            category: SmolStr::new_static("Random Thoughts"),
        }
    }
}

impl NoteDefaults {
    /// Fields for a new note: the first listed category wins, the configured
    /// category otherwise.
    pub fn fields_for(&self, categories: &[Category]) -> NoteFields {
        let category = first_category(categories).unwrap_or(&self.category).clone();
        NoteFields {
            title: self.title.clone(),
            content: self.content.clone(),
            category,
        }
    }
}

/// Configuration for one editing session.
///
/// Loadable from TOML:
///
/// ```toml
/// debounce_ms = 500
///
/// [defaults]
/// title = "Untitled"
/// category = "School"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Quiescence window before an edit is sent to the store.
    pub debounce_ms: u64,
    pub defaults: NoteDefaults,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce_ms: Self::DEFAULT_DEBOUNCE_MS,
            defaults: NoteDefaults::default(),
        }
    }
}

impl SessionConfig {
    pub const DEFAULT_DEBOUNCE_MS: u64 = 350;

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Defaults overlaid with environment variables.
    ///
    /// Optional env vars:
    /// - `JOTTER_DEBOUNCE_MS`: debounce window in milliseconds (default: 350)
    /// - `JOTTER_DEFAULT_TITLE`: title of new notes
    /// - `JOTTER_DEFAULT_CONTENT`: body of new notes
    /// - `JOTTER_DEFAULT_CATEGORY`: fallback category
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    /// Overlay environment variables on top of `self`.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_vars(|var| std::env::var(var).ok())
    }

    /// Overlay values from `lookup` (same keys as [`SessionConfig::from_env`]).
    pub fn apply_vars(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(raw) = lookup("JOTTER_DEBOUNCE_MS") {
            self.debounce_ms = raw.trim().parse().map_err(|e| ConfigError::Invalid {
                field: "JOTTER_DEBOUNCE_MS",
                message: format!("{raw:?}: {e}"),
            })?;
        }
        if let Some(title) = lookup("JOTTER_DEFAULT_TITLE") {
            self.defaults.title = title;
        }
        if let Some(content) = lookup("JOTTER_DEFAULT_CONTENT") {
            self.defaults.content = content;
        }
        if let Some(category) = lookup("JOTTER_DEFAULT_CATEGORY") {
            self.defaults.category = category.into();
        }
        self.validate()?;
        Ok(self)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(source).map_err(|source| ConfigError::Parse { source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.defaults.category.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "defaults.category",
                message: "the fallback category must not be empty".into(),
            });
        }
        Ok(())
    }
}
