//! BibTeX writer
//!
//! Output layout: the preamble, then `@STRING` definitions in the order they
//! were defined, then entries in the order of the sort policy. Records are
//! separated by one blank line and fields are indented with a tab.

use crate::database::Database;
use crate::entry::Entry;
use crate::sort::{sorted_entries, SortPolicy};

/// Format a single entry, ending with a newline.
pub fn format_entry(entry: &Entry) -> String {
    let mut result = String::new();

    result.push('@');
    result.push_str(&entry.entry_type);
    result.push('{');
    result.push_str(&entry.key);
    result.push(',');
    result.push('\n');

    let fields: Vec<String> = entry
        .fields()
        .map(|(name, value)| format!("\t{} = {}", name, value.raw_text()))
        .collect();
    if !fields.is_empty() {
        result.push_str(&fields.join(",\n"));
        result.push('\n');
    }

    result.push_str("}\n");
    result
}

pub fn format_string_definition(abbr: &str, raw: &str) -> String {
    format!("@STRING{{{} = {}}}\n", abbr, raw)
}

pub fn format_preamble(text: &str) -> String {
    format!("@PREAMBLE{{{}}}\n", text)
}

/// Format a list of entries without preamble or strings.
pub fn format_entries<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> String {
    entries
        .into_iter()
        .map(format_entry)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format a whole database.
pub fn format_database(db: &Database, policy: &SortPolicy) -> String {
    let mut records = Vec::new();
    if let Some(preamble) = db.preamble() {
        records.push(format_preamble(preamble));
    }
    records.extend(
        db.strings()
            .iter()
            .map(|(abbr, raw)| format_string_definition(abbr, raw)),
    );
    records.extend(sorted_entries(db, policy).into_iter().map(format_entry));
    records.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BibDbConfig;
    use crate::database::DuplicatePolicy;
    use crate::value::FieldValue;

    #[test]
    fn test_format_entry_layout() {
        let mut entry = Entry::new("doe2020", "article");
        entry.add_field("author", "Doe, J.");
        entry.set_field("year", FieldValue::unbraced("2020"));
        entry.set_field("journal", FieldValue::unbraced("acm"));

        assert_eq!(
            format_entry(&entry),
            "@article{doe2020,\n\tauthor = {Doe, J.},\n\tyear = 2020,\n\tjournal = acm\n}\n"
        );
    }

    #[test]
    fn test_format_entry_without_fields() {
        assert_eq!(format_entry(&Entry::new("k", "misc")), "@misc{k,\n}\n");
    }

    #[test]
    fn test_quotes_and_concatenation_preserved() {
        let mut entry = Entry::new("k", "book");
        entry.set_field("title", FieldValue::from_raw("\"Quoted\""));
        entry.set_field("note", FieldValue::from_raw("jan # { 1st}"));
        let text = format_entry(&entry);
        assert!(text.contains("\ttitle = \"Quoted\",\n"));
        assert!(text.contains("\tnote = jan # { 1st}\n"));
    }

    #[test]
    fn test_format_database_order() {
        let mut db = Database::new();
        db.set_preamble("{\\def\\x{X}}", false);
        db.set_string("zz", "{Last}", false).unwrap();
        db.set_string("aa", "{First}", false).unwrap();
        db.set_entry(Entry::new("b2020", "misc"), DuplicatePolicy::Reject)
            .unwrap();
        db.set_entry(Entry::new("a2019", "misc"), DuplicatePolicy::Reject)
            .unwrap();

        let text = format_database(&db, &SortPolicy::Key);
        assert_eq!(
            text,
            "@PREAMBLE{{\\def\\x{X}}}\n\n@STRING{zz = {Last}}\n\n@STRING{aa = {First}}\n\n@misc{a2019,\n}\n\n@misc{b2020,\n}\n"
        );
    }

    #[test]
    fn test_output_parses_back() {
        let mut db = Database::new();
        db.set_string("acm", "{ACM}", false).unwrap();
        let mut entry = Entry::new("k", "inproceedings");
        entry.add_field("title", "Nested {Braces} and, commas");
        entry.set_field("booktitle", FieldValue::from_raw("\"Proc. \" # acm"));
        entry.add_field("abstract", "Line one\nline two");
        db.set_entry(entry, DuplicatePolicy::Reject).unwrap();

        let text = format_database(&db, &SortPolicy::Key);
        let (parsed, summary) = Database::from_bibtex(&text, &BibDbConfig::default());
        assert!(summary.diagnostics.is_empty());
        assert_eq!(parsed.get_entry("k"), db.get_entry("k"));
        assert_eq!(parsed.strings(), db.strings());
    }
}
