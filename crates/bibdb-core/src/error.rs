//! Error types for bibdb-core

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, BibDbError>;

/// Main error type for store, filter and file operations
#[derive(Error, Debug)]
pub enum BibDbError {
    /// An entry with this key already exists and the policy forbids replacing it
    #[error("Entry key already exists: {0}")]
    DuplicateKey(String),

    /// No entry with this key
    #[error("No entry with key: {0}")]
    NoSuchKey(String),

    /// A string abbreviation is already defined
    #[error("String abbreviation already defined: {0}")]
    DuplicateString(String),

    /// No string abbreviation with this name
    #[error("No string abbreviation: {0}")]
    NoSuchString(String),

    /// Attempt to edit a pseudo-field such as `=type=`
    #[error("Field is not editable: {0}")]
    ReadOnlyField(String),

    /// A value that would not serialize to valid BibTeX
    #[error("Invalid field value: {0}")]
    InvalidValue(String),

    /// Entry type missing from the configured type table
    #[error("Unknown entry type: {0}")]
    UnknownEntryType(String),

    /// Key containing characters BibTeX does not allow
    #[error("Invalid entry key: {0:?}")]
    InvalidKey(String),

    /// Filter text that does not parse
    #[error("Invalid filter: {0}")]
    FilterParse(String),

    /// Handle that does not refer to an open database
    #[error("No open database with handle {0}")]
    NoSuchDatabase(usize),

    /// Database has never been associated with a file
    #[error("Database has no file name")]
    NoFilePath,

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Severity of a problem found while reading a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// A recoverable problem tied to a line of the input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub line: usize,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}: {}", self.line, self.severity, self.message)
    }
}
