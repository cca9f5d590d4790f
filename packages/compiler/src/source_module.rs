//! Source Modules
//!
//! The codegen-mode output representation. Generated text refers to other
//! modules through symbolic `#MODULE[<id>]` markers; a later linking step
//! (see [`SourceModule::get_source_with_imports`]) turns them into imports.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static MODULE_REGEXP: Lazy<Regex> = Lazy::new(|| Regex::new(r"#MODULE\[([^\]]*)\]").unwrap());

/// Symbolic reference to a member of another module. Append the member
/// name directly: `format!("{}STYLES", module_ref("a/b"))`.
pub fn module_ref(module_id: &str) -> String {
    format!("#MODULE[{}]", module_id)
}

/// A generated module: its id and its source still containing module refs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceModule {
    pub module_id: Option<String>,
    pub source_with_module_refs: String,
}

impl SourceModule {
    pub fn new(module_id: Option<String>, source_with_module_refs: String) -> Self {
        SourceModule {
            module_id,
            source_with_module_refs,
        }
    }

    /// Replace every module ref with an import alias (`import0.`...).
    /// References to the module itself become unqualified.
    pub fn get_source_with_imports(&self) -> SourceWithImports {
        let mut module_aliases: HashMap<String, String> = HashMap::new();
        let mut imports: Vec<(String, String)> = Vec::new();

        let source = MODULE_REGEXP
            .replace_all(&self.source_with_module_refs, |caps: &regex::Captures| {
                let module_id = &caps[1];
                let alias = module_aliases
                    .entry(module_id.to_string())
                    .or_insert_with(|| {
                        if self.module_id.as_deref() == Some(module_id) {
                            String::new()
                        } else {
                            let alias = format!("import{}", imports.len());
                            imports.push((module_id.to_string(), alias.clone()));
                            alias
                        }
                    });
                if alias.is_empty() {
                    String::new()
                } else {
                    format!("{}.", alias)
                }
            })
            .into_owned();

        SourceWithImports { source, imports }
    }
}

/// An expression plus the declarations that must precede it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceExpression {
    pub declarations: Vec<String>,
    pub expression: String,
}

impl SourceExpression {
    pub fn new(declarations: Vec<String>, expression: String) -> Self {
        SourceExpression {
            declarations,
            expression,
        }
    }
}

/// Several expressions sharing one list of declarations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceExpressions {
    pub declarations: Vec<String>,
    pub expressions: Vec<String>,
}

impl SourceExpressions {
    pub fn new(declarations: Vec<String>, expressions: Vec<String>) -> Self {
        SourceExpressions {
            declarations,
            expressions,
        }
    }
}

/// Linked source: module refs replaced, plus `(module id, alias)` imports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceWithImports {
    pub source: String,
    pub imports: Vec<(String, String)>,
}
