//! Binding expressions.
//!
//! Expressions arrive already parsed, as part of the template AST; this
//! module only defines their shape and a serializer.

pub mod ast;

pub use ast::*;
