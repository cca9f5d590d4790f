//! Compiler Errors
//!
//! Every failure aborts the compilation of the enclosing component and is
//! surfaced to the caller. Errors are `Clone` because pending style and
//! template compilations are shared between callers.

use thiserror::Error;

use crate::parse_util::ParseError;
use crate::resource_loader::ResourceError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// Malformed template or style text.
    #[error("Template parse errors:\n{0}")]
    Parse(ParseError),

    /// The resource loader rejected a fetch.
    #[error("{message}")]
    ResourceLoad { url: String, message: String },

    /// A variable exports an alias no directive declares, or a component
    /// element has no component directive.
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    /// A node carries a projection index outside of its enclosing
    /// component's projection selectors.
    #[error("Invalid content projection: {0}")]
    InvalidProjection(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ParseError> for CompileError {
    fn from(err: ParseError) -> Self {
        CompileError::Parse(err)
    }
}

impl From<ResourceError> for CompileError {
    fn from(err: ResourceError) -> Self {
        CompileError::ResourceLoad {
            url: err.url,
            message: err.message,
        }
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
