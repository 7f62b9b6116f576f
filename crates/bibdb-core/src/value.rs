//! Field values
//!
//! A value keeps the text exactly as it appeared between `=` and the next
//! top-level comma, delimiters and `#` concatenations included. Macro
//! references are expanded only when a value is resolved, so editing an
//! `@STRING` later shows up in every entry that refers to it.

use indexmap::IndexMap;

use crate::delimiter::{find_brace_close, find_quote_close};
use crate::macros::expand_builtin_macro;

/// Guard against `@STRING` definitions that refer to each other in a cycle.
const MAX_MACRO_DEPTH: usize = 16;

/// The value of a single field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue {
    raw: String,
    braced: bool,
}

impl FieldValue {
    /// Wrap raw BibTeX value text, e.g. `{Doe, J.}`, `"x" # acm` or `2020`.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let braced = is_single_literal(&raw);
        Self { raw, braced }
    }

    /// A literal value, written between braces.
    pub fn braced(text: &str) -> Self {
        Self {
            raw: format!("{{{}}}", text),
            braced: true,
        }
    }

    /// A bare value: a number, a macro reference or a `#` concatenation.
    pub fn unbraced(text: &str) -> Self {
        Self::from_raw(text.trim())
    }

    /// The value as it is written to the file.
    pub fn raw_text(&self) -> &str {
        &self.raw
    }

    /// True if the whole value is one `{...}` or `"..."` literal.
    pub fn is_braced(&self) -> bool {
        self.braced
    }

    /// The text without its outer delimiters (raw text for bare values).
    pub fn content(&self) -> &str {
        if self.braced {
            &self.raw[1..self.raw.len() - 1]
        } else {
            &self.raw
        }
    }

    pub fn is_multiline(&self) -> bool {
        self.content().contains('\n')
    }

    pub fn is_empty(&self) -> bool {
        self.content().trim().is_empty()
    }

    /// True if the value serializes to syntactically valid BibTeX.
    pub fn is_valid(&self) -> bool {
        is_valid_raw(&self.raw)
    }

    /// Expand concatenations and macro references against a string table.
    pub fn resolve(&self, strings: &IndexMap<String, String>) -> String {
        resolve_raw(&self.raw, strings, 0)
    }
}

/// Split at `sep` bytes that are outside braces and quotes.
pub(crate) fn split_top_level(text: &str, sep: u8) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut start = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 1,
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b'"' if depth == 0 => in_quote = !in_quote,
            b if b == sep && depth == 0 && !in_quote => {
                parts.push(&text[start..pos]);
                start = pos + 1;
            }
            _ => {}
        }
        pos += 1;
    }
    parts.push(&text[start.min(text.len())..]);
    parts
}

/// True if `text` is exactly one brace- or quote-delimited literal.
pub(crate) fn is_single_literal(text: &str) -> bool {
    let bytes = text.as_bytes();
    let close = match bytes.first() {
        Some(b'{') => find_brace_close(bytes, 0, bytes.len()),
        Some(b'"') => find_quote_close(bytes, 0, bytes.len()),
        _ => None,
    };
    close == Some(bytes.len().wrapping_sub(1)) && bytes.len() >= 2
}

/// Characters allowed in bare tokens, field names and macro names.
pub(crate) fn is_name_char(c: char) -> bool {
    !c.is_whitespace() && !"\"#%'(),={}@\\".contains(c)
}

fn braces_balanced(text: &str) -> bool {
    let mut depth = 0i64;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

pub(crate) fn is_valid_raw(raw: &str) -> bool {
    let raw = raw.trim();
    if raw.is_empty() {
        return false;
    }
    split_top_level(raw, b'#').into_iter().all(|part| {
        let part = part.trim();
        if is_single_literal(part) {
            braces_balanced(&part[1..part.len() - 1])
        } else {
            !part.is_empty() && part.chars().all(is_name_char)
        }
    })
}

fn lookup_macro<'a>(strings: &'a IndexMap<String, String>, name: &str) -> Option<&'a str> {
    strings
        .get(name)
        .or_else(|| {
            strings
                .iter()
                .find(|(abbr, _)| abbr.eq_ignore_ascii_case(name))
                .map(|(_, text)| text)
        })
        .map(String::as_str)
}

fn resolve_raw(raw: &str, strings: &IndexMap<String, String>, depth: usize) -> String {
    let mut result = String::new();
    for part in split_top_level(raw.trim(), b'#') {
        let part = part.trim();
        if is_single_literal(part) {
            result.push_str(&part[1..part.len() - 1]);
        } else if part.chars().all(|c| c.is_ascii_digit()) {
            result.push_str(part);
        } else if let Some(text) = lookup_macro(strings, part).filter(|_| depth < MAX_MACRO_DEPTH)
        {
            result.push_str(&resolve_raw(text, strings, depth + 1));
        } else if let Some(month) = expand_builtin_macro(part) {
            result.push_str(month);
        } else {
            result.push_str(part);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_braced_detection() {
        assert!(FieldValue::from_raw("{Doe, J.}").is_braced());
        assert!(FieldValue::from_raw("\"A Study\"").is_braced());
        assert!(!FieldValue::from_raw("2020").is_braced());
        assert!(!FieldValue::from_raw("acm").is_braced());
        assert!(!FieldValue::from_raw("{a} # {b}").is_braced());
    }

    #[test]
    fn test_content_and_multiline() {
        let v = FieldValue::from_raw("{first\nsecond}");
        assert_eq!(v.content(), "first\nsecond");
        assert!(v.is_multiline());
        assert!(!FieldValue::braced("one line").is_multiline());
    }

    #[test]
    fn test_split_ignores_nested_commas() {
        let parts = split_top_level("a = {x, y}, b = \"p, q\", c = 3", b',');
        assert_eq!(parts, vec!["a = {x, y}", " b = \"p, q\"", " c = 3"]);
    }

    #[test]
    fn test_resolve_concatenation_and_macros() {
        let strings = table(&[("acm", "{Association for Computing Machinery}")]);
        let v = FieldValue::from_raw("\"Proc. of the \" # acm");
        assert_eq!(
            v.resolve(&strings),
            "Proc. of the Association for Computing Machinery"
        );
    }

    #[test]
    fn test_resolve_is_lazy() {
        let v = FieldValue::from_raw("acm");
        let mut strings = table(&[("acm", "{ACM}")]);
        assert_eq!(v.resolve(&strings), "ACM");
        strings.insert("acm".to_string(), "{Association}".to_string());
        assert_eq!(v.resolve(&strings), "Association");
    }

    #[test]
    fn test_resolve_builtin_month_and_unknown() {
        let strings = IndexMap::new();
        assert_eq!(FieldValue::from_raw("oct").resolve(&strings), "October");
        assert_eq!(FieldValue::from_raw("nosuch").resolve(&strings), "nosuch");
    }

    #[test]
    fn test_resolve_cycle_terminates() {
        let strings = table(&[("a", "b"), ("b", "a")]);
        let resolved = FieldValue::from_raw("a").resolve(&strings);
        assert!(resolved == "a" || resolved == "b");
    }

    #[test]
    fn test_validity() {
        assert!(FieldValue::from_raw("{a {b} c}").is_valid());
        assert!(FieldValue::from_raw("jan # \" 1st\"").is_valid());
        assert!(!FieldValue::braced("unbalanced {").is_valid());
        assert!(!FieldValue::from_raw("two words").is_valid());
        assert!(!FieldValue::from_raw("").is_valid());
    }
}
