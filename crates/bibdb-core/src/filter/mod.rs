//! Boolean filters over entries
//!
//! A filter is a tree of `Contains(field, pattern)` leaves joined by
//! `And`, `Or` and `Not`. It can be built directly or parsed from text:
//!
//! ```ignore
//! use bibdb_core::filter::parse_filter;
//!
//! let expr = parse_filter("title:\"deep learning\" && !author:smith")?;
//! let expr = parse_filter("(year:2019 || year:2020) & =type=:article")?;
//! ```

pub mod ast;
pub mod eval;
pub mod parser;

pub use ast::FilterExpr;
pub use eval::CompiledFilter;
pub use parser::parse_filter;
