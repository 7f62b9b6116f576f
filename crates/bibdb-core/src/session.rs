//! Open databases of one session
//!
//! Databases live in an arena and are addressed by [`DatabaseHandle`]. A
//! closed database leaves an empty slot, so handles of the other databases
//! stay valid.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::BibDbConfig;
use crate::database::{stamp_entry, Database};
use crate::entry::Entry;
use crate::error::{BibDbError, Result};
use crate::formatter::format_entries;
use crate::parser::LoadSummary;

/// Opaque reference to a database of a [`Session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatabaseHandle(usize);

impl DatabaseHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for DatabaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where exported entries go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportTarget {
    /// Another open database; duplicate keys follow the configured policy
    Database(DatabaseHandle),
    /// Appended to a `.bib` file, which is created if missing
    File(PathBuf),
}

#[derive(Debug, Default)]
pub struct Session {
    config: BibDbConfig,
    databases: Vec<Option<Database>>,
    active: Option<DatabaseHandle>,
}

impl Session {
    pub fn new(config: BibDbConfig) -> Self {
        Self {
            config,
            databases: Vec::new(),
            active: None,
        }
    }

    pub fn config(&self) -> &BibDbConfig {
        &self.config
    }

    /// Open a file and make it active. A file that is already open is only
    /// made active, with an empty summary.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<(DatabaseHandle, LoadSummary)> {
        if let Some(handle) = self.find_by_path(path.as_ref()) {
            tracing::info!("{} is already open as {}", path.as_ref().display(), handle);
            self.active = Some(handle);
            return Ok((handle, LoadSummary::default()));
        }
        let (db, summary) = Database::open(path, &self.config)?;
        Ok((self.insert(db), summary))
    }

    /// Add an empty database and make it active.
    pub fn create(&mut self, path: Option<PathBuf>) -> DatabaseHandle {
        let db = match path {
            Some(path) => Database::with_path(path),
            None => Database::new(),
        };
        self.insert(db)
    }

    fn insert(&mut self, db: Database) -> DatabaseHandle {
        let handle = DatabaseHandle(self.databases.len());
        self.databases.push(Some(db));
        self.active = Some(handle);
        handle
    }

    /// Remove a database from the session. If it was active, the nearest
    /// open database before it (or else after it) becomes active.
    pub fn close(&mut self, handle: DatabaseHandle) -> Result<Database> {
        let db = self
            .databases
            .get_mut(handle.0)
            .and_then(Option::take)
            .ok_or(BibDbError::NoSuchDatabase(handle.0))?;
        if db.is_modified() {
            tracing::warn!("Closing {} with unsaved changes", handle);
        }
        if self.active == Some(handle) {
            self.active = self
                .handles()
                .filter(|h| *h < handle)
                .last()
                .or_else(|| self.handles().next());
        }
        Ok(db)
    }

    pub fn get(&self, handle: DatabaseHandle) -> Result<&Database> {
        self.databases
            .get(handle.0)
            .and_then(Option::as_ref)
            .ok_or(BibDbError::NoSuchDatabase(handle.0))
    }

    pub fn get_mut(&mut self, handle: DatabaseHandle) -> Result<&mut Database> {
        self.databases
            .get_mut(handle.0)
            .and_then(Option::as_mut)
            .ok_or(BibDbError::NoSuchDatabase(handle.0))
    }

    pub fn active(&self) -> Option<DatabaseHandle> {
        self.active
    }

    pub fn active_database(&self) -> Option<&Database> {
        self.active.and_then(|h| self.get(h).ok())
    }

    pub fn set_active(&mut self, handle: DatabaseHandle) -> Result<()> {
        self.get(handle)?;
        self.active = Some(handle);
        Ok(())
    }

    /// Handles of all open databases, in opening order.
    pub fn handles(&self) -> impl Iterator<Item = DatabaseHandle> + '_ {
        self.databases
            .iter()
            .enumerate()
            .filter(|(_, db)| db.is_some())
            .map(|(i, _)| DatabaseHandle(i))
    }

    pub fn find_by_path(&self, path: &Path) -> Option<DatabaseHandle> {
        let wanted = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.handles().find(|h| {
            self.get(*h)
                .ok()
                .and_then(Database::file_path)
                .map(|p| p.canonicalize().unwrap_or_else(|_| p.to_path_buf()))
                .is_some_and(|p| p == wanted)
        })
    }

    pub fn save(&mut self, handle: DatabaseHandle) -> Result<()> {
        let config = &self.config;
        let db = self
            .databases
            .get_mut(handle.0)
            .and_then(Option::as_mut)
            .ok_or(BibDbError::NoSuchDatabase(handle.0))?;
        db.save(config)
    }

    /// Copy entries of `from` to a target. String definitions are not copied.
    ///
    /// Returns the number of entries exported. Entries rejected as duplicates
    /// by the target are skipped with a warning.
    pub fn export(
        &mut self,
        from: DatabaseHandle,
        keys: impl IntoIterator<Item = impl AsRef<str>>,
        target: &ExportTarget,
    ) -> Result<usize> {
        let source = self.get(from)?;
        let entries = keys
            .into_iter()
            .map(|key| {
                let key = key.as_ref();
                source
                    .get_entry(key)
                    .cloned()
                    .ok_or_else(|| BibDbError::NoSuchKey(key.to_string()))
            })
            .collect::<Result<Vec<Entry>>>()?;

        match target {
            ExportTarget::File(path) => {
                export_to_file(&entries, path)?;
                Ok(entries.len())
            }
            ExportTarget::Database(handle) => {
                let policy = self.config.duplicate_policy();
                let timestamp = self.config.active_timestamp().cloned();
                let db = self.get_mut(*handle)?;
                let mut count = 0;
                for mut entry in entries {
                    if let Some(timestamp) = &timestamp {
                        stamp_entry(&mut entry, timestamp);
                    }
                    let key = entry.key.clone();
                    match db.set_entry(entry, policy) {
                        Ok(_) => count += 1,
                        Err(e) => tracing::warn!(key = %key, "Not exported: {}", e),
                    }
                }
                Ok(count)
            }
        }
    }
}

fn export_to_file(entries: &[Entry], path: &Path) -> Result<()> {
    let has_content = std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if has_content {
        file.write_all(b"\n")?;
    }
    file.write_all(format_entries(entries).as_bytes())?;
    tracing::info!(entries = entries.len(), "Exported to {}", path.display());
    Ok(())
}
