//! Markup parsing boundary.
//!
//! The compiler never tokenizes markup itself; it receives a tree from an
//! [`HtmlParser`] implementation.

pub mod ast;

pub use ast::*;

use crate::parse_util::ParseError;

pub trait HtmlParser {
    /// Parse `text`. Malformed input must be reported as a `ParseError`,
    /// never as a degraded tree.
    fn parse(&self, text: &str, source_name: &str) -> Result<Vec<Node>, ParseError>;
}
