//! Entry ordering for serialization
//!
//! Exactly one policy applies, checked in this order: crossref-first, then
//! explicit sort levels, then plain key order.

use std::cmp::Ordering;

use crate::config::SortConfig;
use crate::database::Database;
use crate::entry::Entry;

/// How entries are ordered when a database is written
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SortPolicy {
    /// Entries with a non-empty `crossref` first, each group by key
    CrossrefFirst,
    /// Level-by-level comparison; each level lists candidate fields
    Fields(Vec<Vec<String>>),
    /// Lexicographic key order
    #[default]
    Key,
}

impl SortPolicy {
    pub fn from_config(config: &SortConfig) -> Self {
        if config.crossref_first {
            SortPolicy::CrossrefFirst
        } else if !config.keys.is_empty() {
            SortPolicy::Fields(config.keys.clone())
        } else {
            SortPolicy::Key
        }
    }

    /// Compare two entries of `db` under this policy.
    pub fn compare(&self, db: &Database, a: &Entry, b: &Entry) -> Ordering {
        match self {
            SortPolicy::CrossrefFirst => {
                let rank = |e: &Entry| if e.crossref().is_some() { 0 } else { 1 };
                rank(a).cmp(&rank(b)).then_with(|| a.key.cmp(&b.key))
            }
            SortPolicy::Fields(levels) => levels
                .iter()
                .map(|level| sort_string(db, a, level).cmp(&sort_string(db, b, level)))
                .find(|ord| ord.is_ne())
                .unwrap_or_else(|| a.key.cmp(&b.key)),
            SortPolicy::Key => a.key.cmp(&b.key),
        }
    }
}

/// Value of the first field in `level` that is non-empty on the entry.
fn sort_string(db: &Database, entry: &Entry, level: &[String]) -> String {
    level
        .iter()
        .filter_map(|field| entry.field(field))
        .map(|value| value.resolve(db.strings()))
        .find(|text| !text.trim().is_empty())
        .unwrap_or_default()
}

/// All entries of `db` in the order given by `policy`.
pub fn sorted_entries<'a>(db: &'a Database, policy: &SortPolicy) -> Vec<&'a Entry> {
    let mut entries: Vec<&Entry> = db.entries().collect();
    entries.sort_by(|a, b| policy.compare(db, a, b));
    entries
}
