#![deny(clippy::all)]

/**
 * Template Compiler CLI
 *
 * Command line front end for the template compiler.
 */
pub use angular_template_compiler as compiler;

pub mod perform_compile;

/// CLI version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
