//! Builtin string macros
//!
//! Standard BibTeX styles predefine three-letter month abbreviations. They
//! apply to unbraced references only when the database has no `@STRING` of
//! the same name.

use lazy_static::lazy_static;
use std::collections::HashMap;

lazy_static! {
    /// Month abbreviations and their expansions.
    static ref MONTHS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("jan", "January");
        m.insert("feb", "February");
        m.insert("mar", "March");
        m.insert("apr", "April");
        m.insert("may", "May");
        m.insert("jun", "June");
        m.insert("jul", "July");
        m.insert("aug", "August");
        m.insert("sep", "September");
        m.insert("oct", "October");
        m.insert("nov", "November");
        m.insert("dec", "December");
        m
    };
}

/// Expand a builtin macro name (case-insensitive)
pub fn expand_builtin_macro(name: &str) -> Option<&'static str> {
    MONTHS.get(name.trim().to_lowercase().as_str()).copied()
}

/// Check if a name is a builtin macro
pub fn is_builtin_macro(name: &str) -> bool {
    expand_builtin_macro(name).is_some()
}
