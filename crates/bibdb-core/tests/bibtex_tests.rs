//! Reader and writer integration tests

mod common;

use bibdb_core::{
    BibDbConfig, Database, DuplicatePolicy, Entry, FieldValue, Severity, SortPolicy,
};
use common::fixtures::load_bibtex_fixture;
use proptest::prelude::*;
use rstest::rstest;

fn load(text: &str) -> (Database, bibdb_core::LoadSummary) {
    Database::from_bibtex(text, &BibDbConfig::default())
}

// === Fixtures ===

#[test]
fn test_simple_fixture() {
    let (db, summary) = load(&load_bibtex_fixture("simple.bib"));

    assert_eq!(summary.counts(), (3, 2, true));
    assert!(summary.diagnostics.is_empty());
    assert_eq!(db.list_keys(), &["knuth1974", "lamport1994", "tarjan1975"]);
    assert_eq!(db.current_key(), Some("knuth1974"));
    assert!(!db.is_modified());

    let knuth = db.get_entry("knuth1974").unwrap();
    assert_eq!(knuth.field("year").map(FieldValue::raw_text), Some("1974"));
    assert!(!knuth.field("month").unwrap().is_braced());
    assert_eq!(db.resolved_field("knuth1974", "month").as_deref(), Some("December"));

    assert_eq!(
        db.resolved_field("tarjan1975", "journal").as_deref(),
        Some("Journal of the Association for Computing Machinery")
    );
    assert!(db
        .get_entry("tarjan1975")
        .unwrap()
        .field("abstract")
        .unwrap()
        .is_multiline());
    assert_eq!(
        db.get_entry("lamport1994").unwrap().field_text("title"),
        Some("{\\LaTeX}: A Document Preparation System")
    );
}

#[test]
fn test_mixed_fixture_loads_valid_records() {
    let (db, summary) = load(&load_bibtex_fixture("mixed.bib"));

    assert_eq!(summary.counts(), (3, 1, false));
    assert_eq!(db.list_keys(), &["good1", "good2", "good3"]);
    assert_eq!(summary.worst_severity(), Some(Severity::Error));

    assert_eq!(
        db.get_entry("good1").unwrap().field_text("title"),
        Some("A Valid Entry (with an unbalanced paren")
    );
    assert_eq!(
        db.get_entry("good2").unwrap().field_text("note"),
        Some("Stray ) paren")
    );
    assert_eq!(db.get_string("dup", true).as_deref(), Some("first"));

    let lines: Vec<(usize, Severity)> = summary
        .diagnostics
        .iter()
        .map(|d| (d.line, d.severity))
        .collect();
    assert!(lines.contains(&(8, Severity::Error)));
    assert!(lines.contains(&(12, Severity::Warning)));
    assert!(summary
        .diagnostics
        .iter()
        .any(|d| d.message.contains("webpage")));
    assert!(summary
        .diagnostics
        .iter()
        .any(|d| d.message.contains("good1") && d.severity == Severity::Warning));
}

// === Round trip ===

#[rstest]
#[case("simple.bib")]
#[case("crossref.bib")]
fn test_fixture_round_trip(#[case] name: &str) {
    let (db, _) = load(&load_bibtex_fixture(name));
    let text = db.to_bibtex(&SortPolicy::Key);
    let (again, summary) = load(&text);

    assert!(summary.diagnostics.is_empty());
    assert_eq!(again.list_keys(), db.list_keys());
    for entry in db.entries() {
        assert_eq!(again.get_entry(&entry.key), Some(entry));
    }
    assert_eq!(again.strings(), db.strings());
    assert_eq!(again.preamble(), db.preamble());
    assert_eq!(again.to_bibtex(&SortPolicy::Key), text);
}

#[test]
fn test_serialized_layout() {
    let text = "@article{doe2020,\n author={Doe, J.},\n title={A Study},\n year={2020}\n}\n@string{acm = {Association for Computing Machinery}}\n";
    let (db, _) = load(text);
    assert_eq!(
        db.to_bibtex(&SortPolicy::Key),
        "@STRING{acm = {Association for Computing Machinery}}\n\n\
         @article{doe2020,\n\tauthor = {Doe, J.},\n\ttitle = {A Study},\n\tyear = {2020}\n}\n"
    );
}

// === Sorting ===

#[test]
fn test_crossref_first_order() {
    let (db, _) = load(&load_bibtex_fixture("crossref.bib"));
    let keys: Vec<&str> = bibdb_core::sorted_entries(&db, &SortPolicy::CrossrefFirst)
        .into_iter()
        .map(|e| e.key.as_str())
        .collect();
    assert_eq!(keys, vec!["jones2020", "smith2020", "adams2019", "conf2020"]);
}

#[test]
fn test_configured_sort_levels() {
    let config = BibDbConfig::from_toml(
        r#"
[sort]
keys = [["year"], ["author", "editor"]]
"#,
    )
    .unwrap();
    let (db, _) = load(&load_bibtex_fixture("crossref.bib"));
    let keys: Vec<&str> = bibdb_core::sorted_entries(&db, &config.sort_policy())
        .into_iter()
        .map(|e| e.key.as_str())
        .collect();
    // smith2020 has no own year and sorts first with an empty level value
    assert_eq!(keys, vec!["smith2020", "adams2019", "conf2020", "jones2020"]);
}

// === Properties ===

fn entry_strategy() -> impl Strategy<Value = (String, Vec<(String, String)>)> {
    (
        prop::sample::select(vec!["article", "book", "misc", "techreport", "online"]),
        proptest::collection::vec(("[a-z]{1,10}", "[A-Za-z0-9 ,.:;()-]{0,30}"), 0..6),
    )
        .prop_map(|(entry_type, fields)| (entry_type.to_string(), fields))
}

proptest! {
    #[test]
    fn prop_round_trip(
        records in proptest::collection::btree_map("[a-z]{1,8}[0-9]{0,4}", entry_strategy(), 0..8),
        macros in proptest::collection::btree_map("[a-z]{3,8}", "[A-Za-z ]{1,20}", 0..4),
    ) {
        let mut db = Database::new();
        for (abbr, text) in &macros {
            db.set_string(abbr, &format!("{{{}}}", text), false).unwrap();
        }
        for (key, (entry_type, fields)) in &records {
            let mut entry = Entry::new(key.as_str(), entry_type);
            for (name, text) in fields {
                entry.add_field(name, text);
            }
            db.set_entry(entry, DuplicatePolicy::Reject).unwrap();
        }

        let (parsed, summary) = load(&db.to_bibtex(&SortPolicy::Key));
        prop_assert!(summary.diagnostics.is_empty());
        prop_assert_eq!(parsed.entry_count(), db.entry_count());
        for entry in db.entries() {
            prop_assert_eq!(parsed.get_entry(&entry.key), Some(entry));
        }
        prop_assert_eq!(parsed.strings(), db.strings());
    }
}
