//! BibTeX database engine
//!
//! Reads `.bib` files into in-memory databases, lets callers query and edit
//! them, and writes them back as canonical BibTeX.
//!
//! Features:
//! - Fault-tolerant reader that skips malformed records and reports them
//! - Lossless field values (brace/quote style, `#` concatenation, macros)
//! - Duplicate-key policies with letter-suffix uniquification
//! - Boolean filter language over field contents
//! - Configurable sort order, timestamps and backups
//! - Several databases per session, addressed by handle

pub mod config;
mod database;
mod delimiter;
pub mod entry;
pub mod entry_types;
pub mod error;
pub mod filter;
pub mod formatter;
mod macros;
pub mod parser;
mod session;
pub mod sort;
mod uniquify;
mod value;

pub use config::{BibDbConfig, SortConfig, TimestampConfig};
pub use database::{is_valid_key, Database, DuplicatePolicy, FieldLookup};
pub use delimiter::Scanner;
pub use entry::{Entry, CROSSREF_FIELD, TYPE_FIELD};
pub use entry_types::{EntryTypeSpec, EntryTypeTable};
pub use error::{BibDbError, Diagnostic, Result, Severity};
pub use filter::{parse_filter, CompiledFilter, FilterExpr};
pub use formatter::{format_database, format_entries, format_entry};
pub use macros::{expand_builtin_macro, is_builtin_macro};
pub use parser::{LoadOptions, LoadSummary};
pub use session::{DatabaseHandle, ExportTarget, Session};
pub use sort::{sorted_entries, SortPolicy};
pub use uniquify::{suffix as uniquify_suffix, uniquify_key};
pub use value::FieldValue;
