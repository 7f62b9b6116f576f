//! Filter evaluation
//!
//! Patterns are compiled once per filter application, then the tree is
//! folded over each entry.

use regex::{Regex, RegexBuilder};

use super::ast::FilterExpr;
use crate::entry::Entry;

/// How a pattern is matched against field text
#[derive(Debug, Clone)]
enum Matcher {
    Regex(Regex),
    /// Fallback for patterns that are not valid regexes; stored lowercased
    Literal(String),
}

impl Matcher {
    fn new(pattern: &str) -> Self {
        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(regex) => Matcher::Regex(regex),
            Err(e) => {
                tracing::debug!(pattern, "Not a valid regex ({}), matching literally", e);
                Matcher::Literal(pattern.to_lowercase())
            }
        }
    }

    fn is_match(&self, text: &str) -> bool {
        match self {
            Matcher::Regex(regex) => regex.is_match(text),
            Matcher::Literal(needle) => text.to_lowercase().contains(needle.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Not(Box<Node>),
    Contains(Option<String>, Matcher),
}

/// A filter ready to be evaluated against many entries
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    root: Node,
}

impl CompiledFilter {
    pub fn compile(expr: &FilterExpr) -> Self {
        Self {
            root: compile_node(expr),
        }
    }

    /// Evaluate the filter for one entry
    pub fn matches(&self, entry: &Entry) -> bool {
        evaluate(&self.root, entry)
    }
}

fn compile_node(expr: &FilterExpr) -> Node {
    match expr {
        FilterExpr::And(l, r) => Node::And(Box::new(compile_node(l)), Box::new(compile_node(r))),
        FilterExpr::Or(l, r) => Node::Or(Box::new(compile_node(l)), Box::new(compile_node(r))),
        FilterExpr::Not(e) => Node::Not(Box::new(compile_node(e))),
        FilterExpr::Contains(field, pattern) => {
            Node::Contains(field.as_ref().map(|f| f.to_lowercase()), Matcher::new(pattern))
        }
    }
}

fn evaluate(node: &Node, entry: &Entry) -> bool {
    match node {
        Node::And(l, r) => evaluate(l, entry) && evaluate(r, entry),
        Node::Or(l, r) => evaluate(l, entry) || evaluate(r, entry),
        Node::Not(e) => !evaluate(e, entry),
        Node::Contains(Some(field), matcher) => entry
            .field_text(field)
            .map_or(false, |text| matcher.is_match(text)),
        Node::Contains(None, matcher) => entry
            .fields()
            .any(|(_, value)| matcher.is_match(value.content())),
    }
}

impl FilterExpr {
    /// Evaluate against one entry, compiling the patterns on the fly.
    pub fn matches(&self, entry: &Entry) -> bool {
        CompiledFilter::compile(self).matches(entry)
    }
}
