//! Template parsing boundary.
//!
//! Binding parsing and directive matching are done by an external
//! [`TemplateParser`]; only the preparser used by template normalization
//! lives here.

pub mod template_preparser;

pub use template_preparser::{preparse_element, PreparsedElement, PreparsedElementType};

use std::rc::Rc;

use crate::directive_metadata::CompileDirectiveMetadata;
use crate::parse_util::ParseError;
use crate::template_ast::TemplateAst;

pub trait TemplateParser {
    /// Parse `template` and match `directives` against its elements.
    /// Directives on each node keep the order of `directives`.
    fn parse(
        &self,
        template: &str,
        directives: &[Rc<CompileDirectiveMetadata>],
        template_name: &str,
    ) -> Result<Vec<TemplateAst>, ParseError>;
}
