//! BibTeX reader
//!
//! The reader is best effort: a malformed record is reported and skipped, and
//! scanning resumes at the next `@` that starts a line. Every problem is
//! recorded as a [`Diagnostic`] in the returned [`LoadSummary`] and logged.
//!
//! Handles:
//! - `@string` definitions (first definition of an abbreviation wins)
//! - `@preamble` blocks, accumulated with `#`
//! - `@comment` blocks, skipped
//! - entries of every type in the configured type table
//! - records delimited by `{...}` or `(...)`
//! - field values in braces, quotes, bare, or `#`-concatenated

use nom::{
    bytes::complete::take_while1,
    character::complete::{char, multispace0, one_of},
    combinator::rest,
    sequence::{delimited, preceded, separated_pair},
    IResult,
};
use serde::Serialize;

use crate::config::{BibDbConfig, TimestampConfig};
use crate::database::{is_valid_key, stamp_entry, Database, DuplicatePolicy};
use crate::delimiter::Scanner;
use crate::entry::Entry;
use crate::entry_types::EntryTypeTable;
use crate::error::{BibDbError, Diagnostic, Severity};
use crate::value::{is_name_char, is_valid_raw, split_top_level, FieldValue};

/// Settings for one load, merge or import
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions<'a> {
    pub entry_types: &'a EntryTypeTable,
    pub policy: DuplicatePolicy,
    /// Added to every stored entry that lacks the field
    pub timestamp: Option<&'a TimestampConfig>,
}

impl<'a> LoadOptions<'a> {
    /// Options for opening a file: configured duplicate policy, no timestamps.
    pub fn from_config(config: &'a BibDbConfig) -> Self {
        Self {
            entry_types: &config.entry_types,
            policy: config.duplicate_policy(),
            timestamp: None,
        }
    }

    /// Options for merging or importing into an existing database.
    pub fn for_merge(config: &'a BibDbConfig) -> Self {
        Self {
            timestamp: config.active_timestamp(),
            ..Self::from_config(config)
        }
    }
}

/// What a load stored, and what went wrong along the way
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub entries: usize,
    pub strings: usize,
    pub preamble: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl LoadSummary {
    /// `(entries, strings, preamble found)`
    pub fn counts(&self) -> (usize, usize, bool) {
        (self.entries, self.strings, self.preamble)
    }

    /// Highest severity among the diagnostics, `None` for a clean load.
    pub fn worst_severity(&self) -> Option<Severity> {
        self.diagnostics.iter().map(|d| d.severity).max()
    }

    pub fn has_errors(&self) -> bool {
        self.worst_severity() == Some(Severity::Error)
    }
}

/// Parse whitespace around a parser
fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Characters allowed in a record type after `@`.
fn is_type_char(c: char) -> bool {
    !c.is_whitespace() && !"\"@\\&$#%',={}()".contains(c)
}

fn record_type(input: &str) -> IResult<&str, &str> {
    preceded(multispace0, take_while1(is_type_char))(input)
}

fn record_open(input: &str) -> IResult<&str, char> {
    preceded(multispace0, one_of("{("))(input)
}

/// `name = value`, with the value returned untrimmed.
fn assignment(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(ws(take_while1(is_name_char)), char('='), rest)(input)
}

/// Byte offset of the next `@` at the start of a line, at or after `from`.
fn next_record_start(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    (from..bytes.len()).find(|&pos| bytes[pos] == b'@' && (pos == 0 || bytes[pos - 1] == b'\n'))
}

/// Parse `text` into `db`, which may already hold records.
pub(crate) fn parse_into(db: &mut Database, text: &str, options: &LoadOptions<'_>) -> LoadSummary {
    let mut reader = Reader {
        db,
        options,
        scanner: Scanner::new(text),
        summary: LoadSummary::default(),
    };
    reader.run();
    let Reader {
        scanner,
        mut summary,
        ..
    } = reader;
    summary.diagnostics = scanner.into_diagnostics();
    summary
}

struct Reader<'a, 'o> {
    db: &'a mut Database,
    options: &'a LoadOptions<'o>,
    scanner: Scanner<'a>,
    summary: LoadSummary,
}

/// What a record header introduces
enum RecordKind {
    String,
    Preamble,
    Comment,
    Entry(String),
}

impl<'a, 'o> Reader<'a, 'o> {
    fn run(&mut self) {
        let text = self.scanner.text();
        while let Some(at) = next_record_start(text, self.scanner.pos()) {
            self.scanner.set_pos(at + 1);
            self.read_record(at);
        }
    }

    fn read_record(&mut self, at: usize) {
        let text = self.scanner.text();
        let line = self.scanner.line();

        let (after_type, name) = match record_type(&text[at + 1..]) {
            Ok(parsed) => parsed,
            Err(_) => {
                self.scanner
                    .report(Severity::Error, "Malformed record: expected a type after '@'");
                return;
            }
        };
        let kind = match name.to_lowercase().as_str() {
            "string" => RecordKind::String,
            "preamble" => RecordKind::Preamble,
            "comment" => RecordKind::Comment,
            other => RecordKind::Entry(other.to_string()),
        };

        let open = match record_open(after_type) {
            Ok((after_open, _)) => text.len() - after_open.len() - 1,
            Err(_) => {
                if matches!(kind, RecordKind::Comment) {
                    self.scanner.report(Severity::Info, "Skipped @comment");
                } else {
                    self.scanner.report(
                        Severity::Error,
                        format!("Malformed record: expected '{{' or '(' after @{}", name),
                    );
                }
                return;
            }
        };

        self.scanner.set_pos(open);
        if !self.scanner.match_paren_or_brace(text.len()) {
            return;
        }
        let close = self.scanner.pos();
        let body = &text[open + 1..close];
        self.scanner.set_pos(close + 1);

        match kind {
            RecordKind::String => self.read_string(body, line),
            RecordKind::Preamble => self.read_preamble(body),
            RecordKind::Comment => {
                self.scanner.report_at(line, Severity::Info, "Skipped @comment");
            }
            RecordKind::Entry(entry_type) => {
                if self.options.entry_types.is_known(&entry_type) {
                    self.read_entry(&entry_type, body, line);
                } else {
                    self.scanner.report_at(
                        line,
                        Severity::Warning,
                        format!("Unknown entry type: {}", entry_type),
                    );
                }
            }
        }
    }

    fn read_string(&mut self, body: &str, line: usize) {
        let body = body.trim().trim_end_matches(',');
        let (abbr, value) = match assignment(body) {
            Ok((_, (abbr, value))) => (abbr, value.trim()),
            Err(_) => {
                self.scanner
                    .report_at(line, Severity::Error, "Malformed @string definition");
                return;
            }
        };
        if self.db.strings().contains_key(abbr) {
            self.scanner.report_at(
                line,
                Severity::Warning,
                format!("Duplicate @string abbreviation: {}", abbr),
            );
            return;
        }
        match self.db.set_string(abbr, value, false) {
            Ok(()) => self.summary.strings += 1,
            Err(e) => self.scanner.report_at(line, Severity::Warning, e.to_string()),
        }
    }

    fn read_preamble(&mut self, body: &str) {
        let append = self.db.preamble().is_some();
        self.db.set_preamble(body.trim(), append);
        self.summary.preamble = true;
    }

    fn read_entry(&mut self, entry_type: &str, body: &str, line: usize) {
        let mut parts = split_top_level(body, b',').into_iter();
        let key = parts.next().unwrap_or_default().trim();
        if !is_valid_key(key) {
            self.scanner.report_at(
                line,
                Severity::Error,
                format!("Invalid or missing key in @{} record: {:?}", entry_type, key),
            );
            return;
        }

        let mut entry = Entry::new(key, entry_type);
        for part in parts.map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = match assignment(part) {
                Ok((_, (name, value))) => (name, value.trim()),
                Err(_) => {
                    self.scanner.report_at(
                        line,
                        Severity::Warning,
                        format!("{}: malformed field {:?}", key, part),
                    );
                    continue;
                }
            };
            if !is_valid_raw(value) {
                self.scanner.report_at(
                    line,
                    Severity::Warning,
                    format!("{}: invalid value for field {}", key, name),
                );
            } else if entry.has_field(name) {
                self.scanner.report_at(
                    line,
                    Severity::Warning,
                    format!("{}: duplicate field {}, keeping the first", key, name),
                );
            } else {
                entry.set_field(name, FieldValue::from_raw(value));
            }
        }

        if let Some(timestamp) = self.options.timestamp {
            stamp_entry(&mut entry, timestamp);
        }
        match self.db.set_entry(entry, self.options.policy) {
            Ok(stored) => {
                if stored != key {
                    self.scanner.report_at(
                        line,
                        Severity::Info,
                        format!("Duplicate key {} stored as {}", key, stored),
                    );
                }
                self.summary.entries += 1;
            }
            Err(BibDbError::DuplicateKey(_)) => self.scanner.report_at(
                line,
                Severity::Warning,
                format!("Duplicate key {}, record skipped", key),
            ),
            Err(e) => self.scanner.report_at(line, Severity::Warning, e.to_string()),
        }
    }
}
