//! Abstract syntax tree for filter expressions

use std::fmt;

/// A boolean filter over entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterExpr {
    /// Logical AND of two expressions
    And(Box<FilterExpr>, Box<FilterExpr>),

    /// Logical OR of two expressions
    Or(Box<FilterExpr>, Box<FilterExpr>),

    /// Logical NOT of an expression
    Not(Box<FilterExpr>),

    /// Case-insensitive regex search in one field, or in any field if `None`
    Contains(Option<String>, String),
}

impl FilterExpr {
    /// Create an AND expression
    pub fn and(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::And(Box::new(left), Box::new(right))
    }

    /// Create an OR expression
    pub fn or(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Or(Box::new(left), Box::new(right))
    }

    /// Create a NOT expression
    #[allow(clippy::should_implement_trait)]
    pub fn not(expr: FilterExpr) -> Self {
        FilterExpr::Not(Box::new(expr))
    }

    /// Search a single field; the name is lowercased.
    pub fn contains(field: &str, pattern: &str) -> Self {
        FilterExpr::Contains(Some(field.to_lowercase()), pattern.to_string())
    }

    /// Search every field except `=type=`.
    pub fn any_field(pattern: &str) -> Self {
        FilterExpr::Contains(None, pattern.to_string())
    }

    /// Check if this is a leaf
    pub fn is_atomic(&self) -> bool {
        matches!(self, FilterExpr::Contains(..))
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in text.chars() {
        if c == '"' || c == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{}", c)?;
    }
    f.write_str("\"")
}

/// Renders in the syntax accepted by [`parse_filter`](super::parse_filter).
impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpr::And(l, r) => write!(f, "({} && {})", l, r),
            FilterExpr::Or(l, r) => write!(f, "({} || {})", l, r),
            FilterExpr::Not(e) => write!(f, "!{}", e),
            FilterExpr::Contains(field, pattern) => {
                if let Some(field) = field {
                    write!(f, "{}:", field)?;
                }
                write_quoted(f, pattern)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let expr = FilterExpr::and(
            FilterExpr::contains("Title", "deep"),
            FilterExpr::not(FilterExpr::any_field("survey")),
        );
        match &expr {
            FilterExpr::And(l, r) => {
                assert_eq!(
                    **l,
                    FilterExpr::Contains(Some("title".to_string()), "deep".to_string())
                );
                assert!(matches!(**r, FilterExpr::Not(_)));
            }
            _ => panic!("expected And"),
        }
        assert!(!expr.is_atomic());
    }

    #[test]
    fn test_display() {
        let expr = FilterExpr::or(
            FilterExpr::contains("author", "O\"Neil"),
            FilterExpr::not(FilterExpr::any_field("x")),
        );
        assert_eq!(expr.to_string(), r#"(author:"O\"Neil" || !"x")"#);
    }
}
