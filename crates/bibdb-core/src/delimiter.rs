//! Delimiter matching for braces, quotes and parentheses
//!
//! All delimiters are ASCII, so the scanners work on bytes and every index
//! they return is a valid `str` slice boundary.
//!
//! Parentheses are special: BibTeX allows unbalanced parentheses inside field
//! text, so a `(` that opens a whole record is closed by the last `)` before
//! the next line starting with `@` (or the end of the text), not by counting.

use crate::error::{Diagnostic, Severity};

/// Find the `}` matching the `{` at `open`, searching below `limit`.
///
/// A backslash escapes the following character.
pub(crate) fn find_brace_close(bytes: &[u8], open: usize, limit: usize) -> Option<usize> {
    let limit = limit.min(bytes.len());
    if bytes.get(open) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut pos = open;
    while pos < limit {
        match bytes[pos] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos);
                }
            }
            b'\\' => pos += 1,
            _ => {}
        }
        pos += 1;
    }
    None
}

/// Find the `"` closing the quote at `open`. Quotes preceded by a backslash
/// do not terminate.
pub(crate) fn find_quote_close(bytes: &[u8], open: usize, limit: usize) -> Option<usize> {
    let limit = limit.min(bytes.len());
    if bytes.get(open) != Some(&b'"') {
        return None;
    }

    (open + 1..limit).find(|&pos| bytes[pos] == b'"' && bytes[pos - 1] != b'\\')
}

/// Find the `)` closing a record opened with `(` at `open`.
///
/// The record ends at the last `)` before the next line beginning with `@`,
/// or before `limit`. Text after that `)` is free text between records.
pub(crate) fn find_paren_close(bytes: &[u8], open: usize, limit: usize) -> Option<usize> {
    let limit = limit.min(bytes.len());
    if bytes.get(open) != Some(&b'(') {
        return None;
    }

    let boundary = (open + 1..limit)
        .find(|&pos| bytes[pos] == b'@' && bytes[pos - 1] == b'\n')
        .unwrap_or(limit);

    bytes[open + 1..boundary]
        .iter()
        .rposition(|&b| b == b')')
        .map(|offset| open + 1 + offset)
}

/// Which matcher a failure came from, for the log message.
#[derive(Debug, Clone, Copy)]
enum Delimiter {
    Brace,
    Quote,
    Paren,
}

impl Delimiter {
    fn describe(self) -> &'static str {
        match self {
            Delimiter::Brace => "Unbalanced braces",
            Delimiter::Quote => "Unmatched quote",
            Delimiter::Paren => "Unbalanced parentheses",
        }
    }
}

/// A cursor over the text being parsed, collecting diagnostics as it goes.
#[derive(Debug)]
pub struct Scanner<'a> {
    text: &'a str,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.text.len());
    }

    /// Character under the cursor, if any.
    pub fn current(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    /// 1-based line number of the cursor.
    pub fn line(&self) -> usize {
        line_at(self.text, self.pos)
    }

    /// Record a diagnostic at the cursor's line and forward it to the log.
    pub fn report(&mut self, severity: Severity, message: impl Into<String>) {
        let line = self.line();
        self.report_at(line, severity, message);
    }

    /// Record a diagnostic at an explicit line.
    pub fn report_at(&mut self, line: usize, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Info => tracing::info!(line, "{}", message),
            Severity::Warning => tracing::warn!(line, "{}", message),
            Severity::Error => tracing::error!(line, "{}", message),
        }
        self.diagnostics.push(Diagnostic {
            line,
            severity,
            message,
        });
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Move the cursor from a `{` to its matching `}`.
    pub fn match_brace(&mut self, limit: usize) -> bool {
        let found = find_brace_close(self.text.as_bytes(), self.pos, limit);
        self.finish(found, Delimiter::Brace)
    }

    /// Move the cursor from a `"` to its closing quote.
    pub fn match_quote(&mut self, limit: usize) -> bool {
        let found = find_quote_close(self.text.as_bytes(), self.pos, limit);
        self.finish(found, Delimiter::Quote)
    }

    /// Move the cursor from a record-opening `(` to its closing `)`.
    pub fn match_paren(&mut self, limit: usize) -> bool {
        let found = find_paren_close(self.text.as_bytes(), self.pos, limit);
        self.finish(found, Delimiter::Paren)
    }

    /// Brace or quote, whichever is under the cursor.
    pub fn match_delim(&mut self, limit: usize) -> bool {
        match self.current() {
            Some(b'"') => self.match_quote(limit),
            _ => self.match_brace(limit),
        }
    }

    /// Parenthesis or brace, whichever opens the record under the cursor.
    pub fn match_paren_or_brace(&mut self, limit: usize) -> bool {
        match self.current() {
            Some(b'(') => self.match_paren(limit),
            _ => self.match_brace(limit),
        }
    }

    fn finish(&mut self, found: Option<usize>, delimiter: Delimiter) -> bool {
        match found {
            Some(close) => {
                self.pos = close;
                true
            }
            None => {
                self.report(Severity::Warning, delimiter.describe());
                self.set_pos(self.pos + 1);
                false
            }
        }
    }
}

/// 1-based line number of a byte offset.
pub(crate) fn line_at(text: &str, pos: usize) -> usize {
    let end = pos.min(text.len());
    text.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brace_full_span() {
        let text = "{a {b} c}";
        let mut s = Scanner::new(text);
        assert!(s.match_brace(text.len()));
        assert_eq!(s.pos(), text.len() - 1);
        assert!(s.diagnostics().is_empty());
    }

    #[test]
    fn test_brace_unbalanced_reports_once() {
        let text = "{a {b c}";
        let mut s = Scanner::new(text);
        assert!(!s.match_brace(text.len()));
        assert_eq!(s.pos(), 1);
        assert_eq!(s.diagnostics().len(), 1);
        assert_eq!(s.diagnostics()[0].line, 1);
    }

    #[test]
    fn test_brace_respects_limit() {
        let text = "{abc} tail";
        assert_eq!(find_brace_close(text.as_bytes(), 0, 3), None);
        assert_eq!(find_brace_close(text.as_bytes(), 0, text.len()), Some(4));
    }

    #[test]
    fn test_escaped_brace_is_skipped() {
        let text = r"{a \} b}";
        assert_eq!(find_brace_close(text.as_bytes(), 0, text.len()), Some(7));
    }

    #[test]
    fn test_quote_skips_escaped_quote() {
        let text = r#""a \" b" rest"#;
        let mut s = Scanner::new(text);
        assert!(s.match_quote(text.len()));
        assert_eq!(s.pos(), 7);
    }

    #[test]
    fn test_unmatched_quote() {
        let text = "\"never closed";
        let mut s = Scanner::new(text);
        assert!(!s.match_delim(text.len()));
        assert_eq!(s.pos(), 1);
        assert_eq!(s.diagnostics().len(), 1);
    }

    #[test]
    fn test_paren_tolerates_unbalanced_inner_parens() {
        let text = "(key, title = {1) first}, note = {(a}\n)\n@article{next,}";
        let close = find_paren_close(text.as_bytes(), 0, text.len()).unwrap();
        assert_eq!(&text[close..close + 1], ")");
        assert_eq!(close, text.find("\n)\n").unwrap() + 1);
    }

    #[test]
    fn test_paren_at_end_of_text() {
        let text = "(key, year = 2020)  \n";
        assert_eq!(find_paren_close(text.as_bytes(), 0, text.len()), Some(17));
    }

    #[test]
    fn test_paren_followed_by_free_text() {
        let text = "(k1, note = {x})\nSome free text.\n@misc{k2,}";
        assert_eq!(find_paren_close(text.as_bytes(), 0, text.len()), Some(15));
    }

    #[test]
    fn test_paren_missing_close() {
        let text = "(key, year = 2020\n@book{b,}";
        let mut s = Scanner::new(text);
        assert!(!s.match_paren_or_brace(text.len()));
        assert_eq!(s.pos(), 1);
        assert_eq!(s.diagnostics()[0].severity, Severity::Warning);
    }

    #[test]
    fn test_failure_line_number() {
        let text = "\n\n{unclosed";
        let mut s = Scanner::new(text);
        s.set_pos(2);
        assert!(!s.match_brace(text.len()));
        assert_eq!(s.diagnostics()[0].line, 3);
    }
}
