//! In-memory BibTeX database
//!
//! One `Database` corresponds to one `.bib` file. It holds the entries, the
//! `@STRING` macros in file order, the preamble, and the session state that
//! goes with a file: filter, visible key list, marks and current entry.
//!
//! Invariants maintained by every operation:
//! - `current_key`, if set, names an existing entry
//! - every marked key names an existing entry
//! - the visible list is ascending and holds exactly the entries that pass
//!   the filter (all entries when there is none)

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use crate::config::{BibDbConfig, TimestampConfig};
use crate::entry::{Entry, CROSSREF_FIELD, TYPE_FIELD};
use crate::entry_types::EntryTypeTable;
use crate::error::{BibDbError, Result};
use crate::filter::{CompiledFilter, FilterExpr};
use crate::formatter::format_database;
use crate::parser::{parse_into, LoadOptions, LoadSummary};
use crate::sort::SortPolicy;
use crate::uniquify::uniquify_key;
use crate::value::{is_name_char, FieldValue};

/// What to do when an inserted key already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Leave the existing entry and fail
    Reject,
    /// Store under the key plus the first free letter suffix
    Uniquify,
    /// Replace the existing entry
    Overwrite,
}

/// A field value looked up for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLookup {
    pub value: FieldValue,
    /// Key of the cross-referenced entry the value came from, if inherited
    pub inherited_from: Option<String>,
}

impl FieldLookup {
    pub fn is_inherited(&self) -> bool {
        self.inherited_from.is_some()
    }
}

/// True if `key` can be written as a BibTeX entry key.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(is_name_char)
}

/// Add the timestamp field unless the entry already has one.
pub(crate) fn stamp_entry(entry: &mut Entry, timestamp: &TimestampConfig) {
    if !entry.has_field(&timestamp.field) {
        entry.set_field(&timestamp.field, FieldValue::braced(&timestamp.now()));
    }
}

#[derive(Debug, Default)]
pub struct Database {
    file_path: Option<PathBuf>,
    entries: BTreeMap<String, Entry>,
    strings: IndexMap<String, String>,
    preamble: Option<String>,
    filter: Option<FilterExpr>,
    compiled: Option<CompiledFilter>,
    visible: Vec<String>,
    marked: BTreeSet<String>,
    current_key: Option<String>,
    modified: bool,
    needs_backup: bool,
}

impl Database {
    /// An empty database not yet associated with a file
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty database that will be saved to `path`
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Open a file. A file that does not exist yields an empty database.
    pub fn open(path: impl AsRef<Path>, config: &BibDbConfig) -> Result<(Self, LoadSummary)> {
        let path = path.as_ref();
        let mut db = Self::with_path(path);
        let summary = if path.exists() {
            let text = std::fs::read_to_string(path)?;
            let summary = db.load_text(&text, &LoadOptions::from_config(config));
            db.needs_backup = true;
            summary
        } else {
            tracing::info!("{} does not exist, starting an empty database", path.display());
            LoadSummary::default()
        };
        db.modified = false;
        tracing::info!(
            entries = summary.entries,
            strings = summary.strings,
            "Loaded {}",
            path.display()
        );
        Ok((db, summary))
    }

    /// Build an unsaved, unmodified database from BibTeX text.
    pub fn from_bibtex(text: &str, config: &BibDbConfig) -> (Self, LoadSummary) {
        let mut db = Self::new();
        let summary = db.load_text(text, &LoadOptions::from_config(config));
        db.modified = false;
        (db, summary)
    }

    /// Parse BibTeX text into this database.
    pub fn load_text(&mut self, text: &str, options: &LoadOptions<'_>) -> LoadSummary {
        let summary = parse_into(self, text, options);
        if self.current_key.is_none() {
            self.current_key = self.visible.first().cloned();
        }
        summary
    }

    /// Discard the contents and read the file again.
    pub fn reload(&mut self, config: &BibDbConfig) -> Result<LoadSummary> {
        let path = self.file_path.clone().ok_or(BibDbError::NoFilePath)?;
        let text = std::fs::read_to_string(&path)?;
        let filter = self.filter.take();
        *self = Self::with_path(path);
        let summary = self.load_text(&text, &LoadOptions::from_config(config));
        self.set_filter(filter);
        self.needs_backup = true;
        self.modified = false;
        Ok(summary)
    }

    /// Add the records of another file, with timestamps if enabled.
    pub fn merge_file(&mut self, path: impl AsRef<Path>, config: &BibDbConfig) -> Result<LoadSummary> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let summary = self.load_text(&text, &LoadOptions::for_merge(config));
        tracing::info!(
            entries = summary.entries,
            "Merged {}",
            path.as_ref().display()
        );
        Ok(summary)
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn needs_backup(&self) -> bool {
        self.needs_backup
    }

    // ===== Entries =====

    /// All entries in ascending key order, ignoring the filter.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get_entry(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// Store an entry under the given duplicate policy and return its key.
    pub fn set_entry(&mut self, mut entry: Entry, policy: DuplicatePolicy) -> Result<String> {
        if !is_valid_key(&entry.key) {
            return Err(BibDbError::InvalidKey(entry.key));
        }
        if let Some((_, value)) = entry.fields().find(|(_, value)| !value.is_valid()) {
            return Err(BibDbError::InvalidValue(value.raw_text().to_string()));
        }
        if self.entries.contains_key(&entry.key) {
            match policy {
                DuplicatePolicy::Reject => return Err(BibDbError::DuplicateKey(entry.key)),
                DuplicatePolicy::Uniquify => {
                    let key = uniquify_key(&entry.key, |k| self.entries.contains_key(k));
                    tracing::info!(from = %entry.key, to = %key, "Renamed duplicate key");
                    entry.key = key;
                }
                DuplicatePolicy::Overwrite => {}
            }
        }
        let key = entry.key.clone();
        self.entries.insert(key.clone(), entry);
        self.refresh_visibility(&key);
        self.modified = true;
        Ok(key)
    }

    /// Validate the type, add a timestamp if configured, then store.
    pub fn add_entry(
        &mut self,
        mut entry: Entry,
        policy: DuplicatePolicy,
        config: &BibDbConfig,
    ) -> Result<String> {
        if !config.entry_types.is_known(&entry.entry_type) {
            return Err(BibDbError::UnknownEntryType(entry.entry_type));
        }
        if let Some(timestamp) = config.active_timestamp() {
            stamp_entry(&mut entry, timestamp);
        }
        self.set_entry(entry, policy)
    }

    pub fn remove_entry(&mut self, key: &str) -> Result<Entry> {
        let entry = self
            .entries
            .remove(key)
            .ok_or_else(|| BibDbError::NoSuchKey(key.to_string()))?;
        self.marked.remove(key);
        let index = self.visible.binary_search_by(|k| k.as_str().cmp(key));
        if let Ok(index) = index {
            self.visible.remove(index);
        }
        if self.current_key.as_deref() == Some(key) {
            self.current_key = match index {
                Ok(i) => self.visible.get(i).or_else(|| self.visible.last()).cloned(),
                Err(_) => self.visible.first().cloned(),
            };
        }
        self.modified = true;
        Ok(entry)
    }

    /// Change an entry's key, carrying marks, the current pointer and any
    /// `crossref` fields that name it.
    pub fn rename_entry(&mut self, old: &str, new: &str) -> Result<()> {
        if !is_valid_key(new) {
            return Err(BibDbError::InvalidKey(new.to_string()));
        }
        if self.entries.contains_key(new) {
            return Err(BibDbError::DuplicateKey(new.to_string()));
        }
        let was_marked = self.marked.contains(old);
        let was_current = self.current_key.as_deref() == Some(old);
        let mut entry = self.remove_entry(old)?;
        entry.key = new.to_string();
        self.set_entry(entry, DuplicatePolicy::Reject)?;

        let referrers: Vec<String> = self
            .entries
            .values()
            .filter(|e| e.crossref() == Some(old))
            .map(|e| e.key.clone())
            .collect();
        for key in referrers {
            if let Some(e) = self.entries.get_mut(&key) {
                e.set_field(CROSSREF_FIELD, FieldValue::braced(new));
            }
        }
        if was_marked {
            self.marked.insert(new.to_string());
        }
        if was_current {
            self.current_key = Some(new.to_string());
        }
        Ok(())
    }

    /// Set one field of an entry. Returns the previous value.
    pub fn set_field(&mut self, key: &str, name: &str, value: FieldValue) -> Result<Option<FieldValue>> {
        if name.eq_ignore_ascii_case(TYPE_FIELD) {
            return Err(BibDbError::ReadOnlyField(name.to_string()));
        }
        if !value.is_valid() {
            return Err(BibDbError::InvalidValue(value.raw_text().to_string()));
        }
        let entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| BibDbError::NoSuchKey(key.to_string()))?;
        let previous = entry.set_field(name, value);
        self.refresh_visibility(key);
        self.modified = true;
        Ok(previous)
    }

    pub fn remove_field(&mut self, key: &str, name: &str) -> Result<Option<FieldValue>> {
        if name.eq_ignore_ascii_case(TYPE_FIELD) {
            return Err(BibDbError::ReadOnlyField(name.to_string()));
        }
        let entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| BibDbError::NoSuchKey(key.to_string()))?;
        let previous = entry.remove_field(name);
        if previous.is_some() {
            self.refresh_visibility(key);
            self.modified = true;
        }
        Ok(previous)
    }

    pub fn set_entry_type(&mut self, key: &str, entry_type: &str, types: &EntryTypeTable) -> Result<()> {
        if !types.is_known(entry_type) {
            return Err(BibDbError::UnknownEntryType(entry_type.to_string()));
        }
        let entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| BibDbError::NoSuchKey(key.to_string()))?;
        entry.entry_type = entry_type.to_lowercase();
        self.refresh_visibility(key);
        self.modified = true;
        Ok(())
    }

    /// Look up a field, inheriting through `crossref` if it is absent.
    ///
    /// `=type=` yields the entry type as a bare value.
    pub fn get_field(&self, key: &str, name: &str) -> Option<FieldLookup> {
        let entry = self.entries.get(key)?;
        if name.eq_ignore_ascii_case(TYPE_FIELD) {
            return Some(FieldLookup {
                value: FieldValue::unbraced(&entry.entry_type),
                inherited_from: None,
            });
        }
        if let Some(value) = entry.field(name) {
            return Some(FieldLookup {
                value: value.clone(),
                inherited_from: None,
            });
        }
        let parent_key = entry.crossref()?;
        let parent = self.entries.get(parent_key)?;
        parent.field(name).map(|value| FieldLookup {
            value: value.clone(),
            inherited_from: Some(parent.key.clone()),
        })
    }

    /// Field text with macros and concatenations expanded at call time.
    pub fn resolved_field(&self, key: &str, name: &str) -> Option<String> {
        self.get_field(key, name)
            .map(|lookup| lookup.value.resolve(&self.strings))
    }

    // ===== Strings and preamble =====

    pub fn strings(&self) -> &IndexMap<String, String> {
        &self.strings
    }

    /// Define a string macro; `text` is raw BibTeX value text.
    pub fn set_string(&mut self, abbr: &str, text: &str, overwrite: bool) -> Result<()> {
        if !is_valid_key(abbr) {
            return Err(BibDbError::InvalidKey(abbr.to_string()));
        }
        if !FieldValue::from_raw(text).is_valid() {
            return Err(BibDbError::InvalidValue(text.to_string()));
        }
        if self.strings.contains_key(abbr) && !overwrite {
            return Err(BibDbError::DuplicateString(abbr.to_string()));
        }
        self.strings.insert(abbr.to_string(), text.to_string());
        self.modified = true;
        Ok(())
    }

    /// Raw macro text, or its content without outer delimiters.
    pub fn get_string(&self, abbr: &str, resolve_braces: bool) -> Option<String> {
        let text = self.strings.get(abbr)?;
        if resolve_braces {
            Some(FieldValue::from_raw(text.as_str()).content().to_string())
        } else {
            Some(text.clone())
        }
    }

    pub fn remove_string(&mut self, abbr: &str) -> Result<String> {
        let text = self
            .strings
            .shift_remove(abbr)
            .ok_or_else(|| BibDbError::NoSuchString(abbr.to_string()))?;
        self.modified = true;
        Ok(text)
    }

    pub fn preamble(&self) -> Option<&str> {
        self.preamble.as_deref()
    }

    /// Set the preamble, or append to it with BibTeX `#` concatenation.
    pub fn set_preamble(&mut self, text: &str, append: bool) {
        self.preamble = match self.preamble.take() {
            Some(existing) if append => Some(format!("{}\n# {}", existing, text)),
            _ => Some(text.to_string()),
        };
        self.modified = true;
    }

    pub fn remove_preamble(&mut self) -> Option<String> {
        let previous = self.preamble.take();
        if previous.is_some() {
            self.modified = true;
        }
        previous
    }

    // ===== Filter and visible keys =====

    pub fn filter(&self) -> Option<&FilterExpr> {
        self.filter.as_ref()
    }

    /// Replace the filter and rebuild the visible key list.
    pub fn set_filter(&mut self, filter: Option<FilterExpr>) {
        self.compiled = filter.as_ref().map(CompiledFilter::compile);
        self.filter = filter;
        self.visible = self
            .entries
            .values()
            .filter(|e| self.compiled.as_ref().map_or(true, |f| f.matches(e)))
            .map(|e| e.key.clone())
            .collect();
        let current_visible = self
            .current_key
            .as_ref()
            .is_some_and(|k| self.visible.binary_search(k).is_ok());
        if !current_visible && !self.visible.is_empty() {
            self.current_key = self.visible.first().cloned();
        }
        tracing::debug!(visible = self.visible.len(), "Applied filter");
    }

    /// Keys that pass the filter, ascending.
    pub fn list_keys(&self) -> &[String] {
        &self.visible
    }

    fn refresh_visibility(&mut self, key: &str) {
        let visible = match (self.entries.get(key), &self.compiled) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(entry), Some(filter)) => filter.matches(entry),
        };
        match (self.visible.binary_search_by(|k| k.as_str().cmp(key)), visible) {
            (Err(index), true) => self.visible.insert(index, key.to_string()),
            (Ok(index), false) => {
                self.visible.remove(index);
            }
            _ => {}
        }
    }

    // ===== Marks =====

    pub fn mark(&mut self, key: &str) -> Result<()> {
        if !self.entries.contains_key(key) {
            return Err(BibDbError::NoSuchKey(key.to_string()));
        }
        self.marked.insert(key.to_string());
        Ok(())
    }

    pub fn unmark(&mut self, key: &str) -> bool {
        self.marked.remove(key)
    }

    /// Flip the mark of an entry; returns whether it is now marked.
    pub fn toggle_mark(&mut self, key: &str) -> Result<bool> {
        if self.marked.remove(key) {
            Ok(false)
        } else {
            self.mark(key)?;
            Ok(true)
        }
    }

    /// Mark every visible entry.
    pub fn mark_all(&mut self) {
        self.marked.extend(self.visible.iter().cloned());
    }

    pub fn unmark_all(&mut self) {
        self.marked.clear();
    }

    pub fn is_marked(&self, key: &str) -> bool {
        self.marked.contains(key)
    }

    /// Marked keys, ascending.
    pub fn marked_keys(&self) -> impl Iterator<Item = &str> {
        self.marked.iter().map(String::as_str)
    }

    // ===== Current entry =====

    pub fn current_key(&self) -> Option<&str> {
        self.current_key.as_deref()
    }

    pub fn current_entry(&self) -> Option<&Entry> {
        self.current_key.as_deref().and_then(|k| self.entries.get(k))
    }

    pub fn set_current_key(&mut self, key: &str) -> Result<()> {
        if !self.entries.contains_key(key) {
            tracing::warn!(key, "Cannot make a missing entry current");
            return Err(BibDbError::NoSuchKey(key.to_string()));
        }
        self.current_key = Some(key.to_string());
        Ok(())
    }

    // ===== Output =====

    /// Serialize the whole database.
    pub fn to_bibtex(&self, policy: &SortPolicy) -> String {
        format_database(self, policy)
    }

    /// Write the database to its file, backing up the old file first if this
    /// is the first save since it was opened.
    pub fn save(&mut self, config: &BibDbConfig) -> Result<()> {
        let path = self.file_path.clone().ok_or(BibDbError::NoFilePath)?;
        let mut backed_up = false;
        if self.needs_backup && config.make_backup && path.exists() {
            let backup = config.backup_path(&path);
            if let Err(e) = std::fs::copy(&path, &backup) {
                tracing::warn!("Could not back up {} to {}: {}", path.display(), backup.display(), e);
                return Err(e.into());
            }
            backed_up = true;
        }

        let text = self.to_bibtex(&config.sort_policy());
        if let Err(e) = std::fs::write(&path, text) {
            tracing::error!("Could not write {}: {}", path.display(), e);
            return Err(e.into());
        }
        if backed_up {
            tracing::debug!("Backed up previous version of {}", path.display());
        }
        self.needs_backup = false;
        self.modified = false;
        tracing::info!(entries = self.entries.len(), "Saved {}", path.display());
        Ok(())
    }

    /// Save under a new file name, which becomes the database's file.
    pub fn save_as(&mut self, path: impl Into<PathBuf>, config: &BibDbConfig) -> Result<()> {
        let path = path.into();
        let previous = self.file_path.replace(path.clone());
        let previous_backup = self.needs_backup;
        self.needs_backup = path.exists();
        let result = self.save(config);
        if result.is_err() {
            self.file_path = previous;
            self.needs_backup = previous_backup;
        }
        result
    }
}
