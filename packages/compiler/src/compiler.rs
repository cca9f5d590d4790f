//! Compiler Main Module
//!
//! Main compiler exports and re-exports

// Configuration
pub use crate::config::{ChangeDetectorGenConfig, CompilerConfig};

// Errors and source locations
pub use crate::error::{CompileError, Result};
pub use crate::parse_util::{
    ParseError, ParseErrorLevel, ParseLocation, ParseSourceFile, ParseSourceSpan,
};

// Metadata
pub use crate::core::{
    ChangeDetectionStrategy, LifecycleHooks, PropertyBindingType, ViewEncapsulation,
};
pub use crate::directive_metadata::{
    create_host_component_meta, CompileDirectiveMetadata, CompileTemplateMetadata,
    CompileTypeMetadata, DirectiveDeclaration,
};
pub use crate::selector::CssSelector;

// Parser boundaries
pub use crate::ml_parser::HtmlParser;
pub use crate::template_parser::TemplateParser;

// Resources
pub use crate::resource_loader::{
    FileResourceLoader, InMemoryResourceLoader, ResourceError, ResourceLoader,
};
pub use crate::url_resolver::{DefaultUrlResolver, UrlResolver};

// Output
pub use crate::source_module::{
    module_ref, SourceExpression, SourceExpressions, SourceModule, SourceWithImports,
};

// Compilers
pub use crate::change_detector_compiler::ChangeDetectionCompiler;
pub use crate::command_compiler::CommandCompiler;
pub use crate::style_compiler::StyleCompiler;
pub use crate::template_commands::{CompiledTemplate, CompiledTemplateData, TemplateCmd, TemplateHandle};
pub use crate::template_compiler::{
    DirectiveResolver, NormalizedComponentWithViewDirectives, TemplateCompiler,
};
pub use crate::template_normalizer::TemplateNormalizer;
