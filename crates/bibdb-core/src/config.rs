//! Configuration for bibdb
//!
//! Read from `~/.config/bibdb/config.toml` (or the platform equivalent):
//!
//! ```toml
//! uniquify_keys = true
//! make_backup = true
//!
//! [sort]
//! crossref_first = false
//! keys = [["author", "editor"], ["year"], ["title"]]
//!
//! [timestamp]
//! enabled = true
//! field = "timestamp"
//! format = "%Y-%m-%d"
//!
//! [entry_types.article]
//! required = ["author", "title", "journal", "year"]
//! optional = ["volume", "pages"]
//! ```
//!
//! An `entry_types` table replaces the builtin type list entirely.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::database::DuplicatePolicy;
use crate::entry_types::EntryTypeTable;
use crate::error::{BibDbError, Result};
use crate::sort::SortPolicy;

/// Settings that apply to every database of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BibDbConfig {
    /// Known entry types and their fields
    pub entry_types: EntryTypeTable,
    /// Rename duplicate keys on load/merge instead of skipping the record
    pub uniquify_keys: bool,
    /// Entry order used when saving
    pub sort: SortConfig,
    /// Timestamp added to entries merged or imported into a database
    pub timestamp: TimestampConfig,
    /// Copy the previous file before the first save
    pub make_backup: bool,
    /// Appended to the file name to form the backup name
    pub backup_suffix: String,
}

impl Default for BibDbConfig {
    fn default() -> Self {
        Self {
            entry_types: EntryTypeTable::standard(),
            uniquify_keys: false,
            sort: SortConfig::default(),
            timestamp: TimestampConfig::default(),
            make_backup: true,
            backup_suffix: "~".to_string(),
        }
    }
}

/// Sort settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    /// Entries with a `crossref` field come first
    pub crossref_first: bool,
    /// Sort levels; each level lists candidate fields, first non-empty wins
    pub keys: Vec<Vec<String>>,
}

/// Timestamp settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimestampConfig {
    pub enabled: bool,
    pub field: String,
    /// chrono strftime format
    pub format: String,
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            field: "timestamp".to_string(),
            format: "%a %b %e %T %Y".to_string(),
        }
    }
}

impl TimestampConfig {
    /// Current local time in the configured format.
    ///
    /// Falls back to RFC 2822 if the format string is invalid.
    pub fn now(&self) -> String {
        let now = chrono::Local::now();
        let mut out = String::new();
        if write!(out, "{}", now.format(&self.format)).is_err() {
            tracing::warn!(format = %self.format, "Invalid timestamp format, using RFC 2822");
            return now.to_rfc2822();
        }
        out
    }
}

impl BibDbConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| BibDbError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&contents)
            .map_err(|e| BibDbError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: BibDbConfig =
            toml::from_str(contents).map_err(|e| BibDbError::Config(e.to_string()))?;
        config.entry_types = config.entry_types.normalize();
        config.sort.keys = config
            .sort
            .keys
            .into_iter()
            .map(|level| level.into_iter().map(|f| f.to_lowercase()).collect())
            .collect();
        config.timestamp.field = config.timestamp.field.to_lowercase();
        Ok(config)
    }

    /// Load from the standard location, or defaults if there is no file.
    pub fn load_standard() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => {
                let config = Self::load(&path)?;
                tracing::info!("Loaded config from {}", path.display());
                Ok(config)
            }
            _ => {
                tracing::debug!("No config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Path of the standard config file.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("bibdb").join("config.toml"))
    }

    /// Duplicate-key policy for load, merge and import.
    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        if self.uniquify_keys {
            DuplicatePolicy::Uniquify
        } else {
            DuplicatePolicy::Reject
        }
    }

    pub fn sort_policy(&self) -> SortPolicy {
        SortPolicy::from_config(&self.sort)
    }

    /// Timestamp settings if the feature is enabled.
    pub fn active_timestamp(&self) -> Option<&TimestampConfig> {
        self.timestamp.enabled.then_some(&self.timestamp)
    }

    /// Path of the backup copy for a database file.
    pub fn backup_path(&self, file: &Path) -> PathBuf {
        let mut name = file.as_os_str().to_owned();
        name.push(&self.backup_suffix);
        PathBuf::from(name)
    }
}
