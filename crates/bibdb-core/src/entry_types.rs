//! Entry type table
//!
//! Maps each known entry type to its required and optional fields. Records
//! whose type is not in the table are skipped when a file is read.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entry::Entry;

/// Fields of one entry type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryTypeSpec {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
}

impl EntryTypeSpec {
    pub fn new(required: &[&str], optional: &[&str]) -> Self {
        Self {
            required: required.iter().map(|s| s.to_string()).collect(),
            optional: optional.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Known entry types, keyed by lowercase type name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryTypeTable {
    types: BTreeMap<String, EntryTypeSpec>,
}

impl EntryTypeTable {
    /// A table with no types at all.
    pub fn empty() -> Self {
        Self {
            types: BTreeMap::new(),
        }
    }

    /// Standard BibTeX types plus `online`, `software` and `dataset`.
    pub fn standard() -> Self {
        let mut table = Self::empty();
        let common = ["note", "crossref", "keywords", "doi", "url"];
        let with_common = |extra: &[&'static str]| -> Vec<&'static str> {
            extra.iter().chain(common.iter()).copied().collect()
        };

        table.insert(
            "article",
            EntryTypeSpec::new(
                &["author", "title", "journal", "year"],
                &with_common(&["volume", "number", "pages", "month"]),
            ),
        );
        table.insert(
            "book",
            EntryTypeSpec::new(
                &["author", "title", "publisher", "year"],
                &with_common(&["editor", "volume", "number", "series", "address", "edition", "month"]),
            ),
        );
        table.insert(
            "booklet",
            EntryTypeSpec::new(
                &["title"],
                &with_common(&["author", "howpublished", "address", "month", "year"]),
            ),
        );
        table.insert(
            "inbook",
            EntryTypeSpec::new(
                &["author", "title", "chapter", "publisher", "year"],
                &with_common(&["editor", "volume", "number", "series", "type", "address", "edition", "month", "pages"]),
            ),
        );
        table.insert(
            "incollection",
            EntryTypeSpec::new(
                &["author", "title", "booktitle", "publisher", "year"],
                &with_common(&["editor", "volume", "number", "series", "type", "chapter", "pages", "address", "edition", "month"]),
            ),
        );
        let inproceedings = EntryTypeSpec::new(
            &["author", "title", "booktitle", "year"],
            &with_common(&["editor", "volume", "number", "series", "pages", "address", "month", "organization", "publisher"]),
        );
        table.insert("conference", inproceedings.clone());
        table.insert("inproceedings", inproceedings);
        table.insert(
            "manual",
            EntryTypeSpec::new(
                &["title"],
                &with_common(&["author", "organization", "address", "edition", "month", "year"]),
            ),
        );
        let thesis = EntryTypeSpec::new(
            &["author", "title", "school", "year"],
            &with_common(&["type", "address", "month"]),
        );
        table.insert("mastersthesis", thesis.clone());
        table.insert("phdthesis", thesis);
        table.insert(
            "misc",
            EntryTypeSpec::new(
                &[],
                &with_common(&["author", "title", "howpublished", "month", "year"]),
            ),
        );
        table.insert(
            "proceedings",
            EntryTypeSpec::new(
                &["title", "year"],
                &with_common(&["editor", "volume", "number", "series", "address", "month", "organization", "publisher"]),
            ),
        );
        table.insert(
            "techreport",
            EntryTypeSpec::new(
                &["author", "title", "institution", "year"],
                &with_common(&["type", "number", "address", "month"]),
            ),
        );
        table.insert(
            "unpublished",
            EntryTypeSpec::new(&["author", "title", "note"], &["month", "year", "crossref", "keywords", "doi", "url"]),
        );
        table.insert(
            "online",
            EntryTypeSpec::new(&["title", "url"], &with_common(&["author", "year", "urldate"])),
        );
        table.insert(
            "software",
            EntryTypeSpec::new(&["title"], &with_common(&["author", "version", "year", "publisher"])),
        );
        table.insert(
            "dataset",
            EntryTypeSpec::new(&["title"], &with_common(&["author", "version", "year", "publisher"])),
        );
        table
    }

    pub fn insert(&mut self, name: &str, spec: EntryTypeSpec) {
        self.types.insert(name.to_lowercase(), spec);
    }

    /// Lowercase all type and field names, e.g. after reading a config file.
    pub fn normalize(self) -> Self {
        let types = self
            .types
            .into_iter()
            .map(|(name, spec)| {
                let lower = |v: Vec<String>| v.into_iter().map(|f| f.to_lowercase()).collect();
                (
                    name.to_lowercase(),
                    EntryTypeSpec {
                        required: lower(spec.required),
                        optional: lower(spec.optional),
                    },
                )
            })
            .collect();
        Self { types }
    }

    pub fn is_known(&self, entry_type: &str) -> bool {
        self.types.contains_key(&entry_type.to_lowercase())
    }

    pub fn get(&self, entry_type: &str) -> Option<&EntryTypeSpec> {
        self.types.get(&entry_type.to_lowercase())
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn required_fields(&self, entry_type: &str) -> &[String] {
        self.get(entry_type)
            .map(|spec| spec.required.as_slice())
            .unwrap_or(&[])
    }

    pub fn optional_fields(&self, entry_type: &str) -> &[String] {
        self.get(entry_type)
            .map(|spec| spec.optional.as_slice())
            .unwrap_or(&[])
    }

    /// Required, then optional, then any other fields present on the entry.
    pub fn all_fields(&self, entry: &Entry) -> Vec<String> {
        let mut fields: Vec<String> = self
            .required_fields(&entry.entry_type)
            .iter()
            .chain(self.optional_fields(&entry.entry_type))
            .cloned()
            .collect();
        for name in entry.field_names() {
            if !fields.iter().any(|f| f == name) {
                fields.push(name.to_string());
            }
        }
        fields
    }

    /// Required fields that are absent or empty.
    pub fn missing_required<'a>(&'a self, entry: &Entry) -> Vec<&'a str> {
        self.required_fields(&entry.entry_type)
            .iter()
            .filter(|f| entry.field(f).map_or(true, |v| v.is_empty()))
            .map(String::as_str)
            .collect()
    }
}

impl Default for EntryTypeTable {
    fn default() -> Self {
        Self::standard()
    }
}
