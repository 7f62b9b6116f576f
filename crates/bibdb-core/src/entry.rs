//! BibTeX entry data structures

use indexmap::IndexMap;
use crate::value::FieldValue;

/// Pseudo-field holding the entry type. Never stored among the fields.
pub const TYPE_FIELD: &str = "=type=";

/// Field naming the entry that missing fields are inherited from.
pub const CROSSREF_FIELD: &str = "crossref";

/// A parsed BibTeX entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub entry_type: String,
    fields: IndexMap<String, FieldValue>,
}

impl Entry {
    /// Create a new entry; the type is lowercased.
    pub fn new(key: impl Into<String>, entry_type: &str) -> Self {
        Self {
            key: key.into(),
            entry_type: entry_type.to_lowercase(),
            fields: IndexMap::new(),
        }
    }

    /// Add or replace a field. Names are lowercased; `=type=` is ignored.
    pub fn set_field(&mut self, name: &str, value: FieldValue) -> Option<FieldValue> {
        let name = name.to_lowercase();
        if name == TYPE_FIELD {
            return None;
        }
        self.fields.insert(name, value)
    }

    /// Add a braced literal field.
    pub fn add_field(&mut self, name: &str, text: &str) {
        self.set_field(name, FieldValue::braced(text));
    }

    pub fn remove_field(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.shift_remove(&name.to_lowercase())
    }

    /// Get a field value by name (case-insensitive)
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(&name.to_lowercase())
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(&name.to_lowercase())
    }

    /// Fields in file order, without the `=type=` pseudo-field.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Text of a field for searching: the entry type for `=type=`,
    /// otherwise the value without outer delimiters.
    pub fn field_text(&self, name: &str) -> Option<&str> {
        if name.eq_ignore_ascii_case(TYPE_FIELD) {
            return Some(&self.entry_type);
        }
        self.field(name).map(FieldValue::content)
    }

    /// The key named in a non-empty `crossref` field.
    pub fn crossref(&self) -> Option<&str> {
        self.field(CROSSREF_FIELD)
            .map(|v| v.content().trim())
            .filter(|k| !k.is_empty())
    }
}
