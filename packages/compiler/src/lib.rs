#![deny(clippy::all)]

//! Angular Template Compiler
//!
//! Compiles component metadata and templates into render command trees,
//! change detectors and style sheets, either as runtime values or as
//! generated JavaScript source modules.

// Core modules
pub mod config;
pub mod core;
pub mod error;
pub mod parse_util;
pub mod selector;
pub mod util;

// Resources and styles
pub mod resource_loader;
pub mod shadow_css;
pub mod source_module;
pub mod style_compiler;
pub mod style_url_resolver;
pub mod url_resolver;

// Parser boundaries
pub mod expression_parser;
pub mod ml_parser;
pub mod template_ast;
pub mod template_parser;

// Compilation modules
pub mod change_detection;
pub mod change_detector_compiler;
pub mod command_compiler;
pub mod compiler;
pub mod directive_metadata;
pub mod template_commands;
pub mod template_compiler;
pub mod template_normalizer;

pub use compiler::*;
