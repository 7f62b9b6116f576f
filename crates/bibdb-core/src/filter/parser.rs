//! Filter text parser using nom
//!
//! Grammar:
//! ```text
//! expr    := or_expr
//! or_expr := and_expr (('||' | '|') and_expr)*
//! and_expr:= unary (('&&' | '&') unary)*
//! unary   := '!' unary | '(' expr ')' | term
//! term    := [field ':'] pattern
//! pattern := '"' chars '"' | word
//! ```
//!
//! A term without a field, or with the field `any`, searches every field.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, multispace0},
    combinator::{map, opt},
    multi::many0,
    sequence::{delimited, preceded, terminated},
    IResult,
};

use super::ast::FilterExpr;
use crate::error::{BibDbError, Result};
use crate::value::is_name_char;

/// Parse a filter expression from a string
pub fn parse_filter(input: &str) -> Result<FilterExpr> {
    let input = input.trim();
    if input.is_empty() {
        return Err(BibDbError::FilterParse("empty filter".to_string()));
    }

    match expr(input) {
        Ok(("", result)) => Ok(result),
        Ok((remaining, _)) => Err(BibDbError::FilterParse(format!(
            "unexpected characters at end: '{}'",
            remaining
        ))),
        Err(e) => Err(BibDbError::FilterParse(format!("{:?}", e))),
    }
}

/// Parse whitespace
fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn expr(input: &str) -> IResult<&str, FilterExpr> {
    or_expr(input)
}

fn or_expr(input: &str) -> IResult<&str, FilterExpr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(ws(alt((tag("||"), tag("|")))), and_expr))(input)?;
    Ok((input, rest.into_iter().fold(first, FilterExpr::or)))
}

fn and_expr(input: &str) -> IResult<&str, FilterExpr> {
    let (input, first) = unary(input)?;
    let (input, rest) = many0(preceded(ws(alt((tag("&&"), tag("&")))), unary))(input)?;
    Ok((input, rest.into_iter().fold(first, FilterExpr::and)))
}

fn unary(input: &str) -> IResult<&str, FilterExpr> {
    ws(alt((
        map(preceded(char('!'), unary), FilterExpr::not),
        delimited(char('('), expr, char(')')),
        term,
    )))(input)
}

fn term(input: &str) -> IResult<&str, FilterExpr> {
    let (input, field) = opt(terminated(field_name, char(':')))(input)?;
    let (input, pattern) = pattern(input)?;
    let field = field
        .map(str::to_lowercase)
        .filter(|f| f != "any");
    Ok((input, FilterExpr::Contains(field, pattern)))
}

/// Any character a BibTeX field name may hold, plus `=` for `=type=`.
/// Operator characters and `:` end the name.
fn field_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c == '=' || (is_name_char(c) && !":!&|".contains(c)))(input)
}

fn pattern(input: &str) -> IResult<&str, String> {
    alt((
        quoted,
        map(
            take_while1(|c: char| !c.is_whitespace() && !"()!&|\"".contains(c)),
            str::to_string,
        ),
    ))(input)
}

/// A double-quoted string; backslash escapes the next character.
fn quoted(input: &str) -> IResult<&str, String> {
    let (rest, _) = char('"')(input)?;
    let mut out = String::new();
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((&rest[i + 1..], out)),
            '\\' => match chars.next() {
                Some((_, escaped)) => out.push(escaped),
                None => break,
            },
            c => out.push(c),
        }
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_field_term() {
        assert_eq!(
            parse_filter("title:deep").unwrap(),
            FilterExpr::contains("title", "deep")
        );
        assert_eq!(
            parse_filter("Title:\"deep learning\"").unwrap(),
            FilterExpr::contains("title", "deep learning")
        );
    }

    #[test]
    fn test_parse_any_field() {
        assert_eq!(parse_filter("neural").unwrap(), FilterExpr::any_field("neural"));
        assert_eq!(parse_filter("any:neural").unwrap(), FilterExpr::any_field("neural"));
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let parsed = parse_filter("a || b && !c").unwrap();
        let expected = FilterExpr::or(
            FilterExpr::any_field("a"),
            FilterExpr::and(
                FilterExpr::any_field("b"),
                FilterExpr::not(FilterExpr::any_field("c")),
            ),
        );
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_parentheses_and_single_char_operators() {
        let parsed = parse_filter("(author:knuth | author:lamport) & year:19").unwrap();
        let expected = FilterExpr::and(
            FilterExpr::or(
                FilterExpr::contains("author", "knuth"),
                FilterExpr::contains("author", "lamport"),
            ),
            FilterExpr::contains("year", "19"),
        );
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_type_pseudo_field() {
        assert_eq!(
            parse_filter("=type=:book").unwrap(),
            FilterExpr::contains("=type=", "book")
        );
    }

    #[test]
    fn test_display_round_trip() {
        let expr = FilterExpr::and(
            FilterExpr::not(FilterExpr::contains("title", "a \"quoted\" (word)")),
            FilterExpr::or(FilterExpr::any_field("x|y"), FilterExpr::contains("year", "20\\d\\d")),
        );
        assert_eq!(parse_filter(&expr.to_string()).unwrap(), expr);
    }

    #[rstest]
    #[case("date.added", "2020")]
    #[case("bdsk-url+1", "x")]
    #[case("=type=", "article")]
    fn test_punctuated_field_round_trip(#[case] field: &str, #[case] pattern: &str) {
        let expr = FilterExpr::contains(field, pattern);
        assert_eq!(parse_filter(&expr.to_string()).unwrap(), expr);
    }

    #[test]
    fn test_dotted_field_name() {
        assert_eq!(
            parse_filter("date.added:2020 && !x").unwrap(),
            FilterExpr::and(
                FilterExpr::contains("date.added", "2020"),
                FilterExpr::not(FilterExpr::any_field("x")),
            )
        );
    }

    #[test]
    fn test_errors() {
        assert!(matches!(parse_filter(""), Err(BibDbError::FilterParse(_))));
        assert!(parse_filter("title:deep &&").is_err());
        assert!(parse_filter("(title:deep").is_err());
        assert!(parse_filter("\"unterminated").is_err());
    }
}
