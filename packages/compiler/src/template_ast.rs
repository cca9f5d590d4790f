//! Template AST
//!
//! The parsed, directive-matched form of a component template. Produced by
//! a [`TemplateParser`](crate::template_parser::TemplateParser) and consumed
//! read-only by the command and change detection compilers.

use std::rc::Rc;

use crate::core::PropertyBindingType;
use crate::directive_metadata::CompileDirectiveMetadata;
use crate::expression_parser::AstWithSource;
use crate::parse_util::ParseSourceSpan;

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateAst {
    Text(TextAst),
    BoundText(BoundTextAst),
    Element(ElementAst),
    EmbeddedTemplate(EmbeddedTemplateAst),
    NgContent(NgContentAst),
}

impl TemplateAst {
    pub fn visit<V: TemplateAstVisitor + ?Sized>(&self, visitor: &mut V) -> V::Output {
        match self {
            TemplateAst::Text(ast) => visitor.visit_text(ast),
            TemplateAst::BoundText(ast) => visitor.visit_bound_text(ast),
            TemplateAst::Element(ast) => visitor.visit_element(ast),
            TemplateAst::EmbeddedTemplate(ast) => visitor.visit_embedded_template(ast),
            TemplateAst::NgContent(ast) => visitor.visit_ng_content(ast),
        }
    }

    pub fn ng_content_index(&self) -> Option<usize> {
        match self {
            TemplateAst::Text(ast) => ast.ng_content_index,
            TemplateAst::BoundText(ast) => ast.ng_content_index,
            TemplateAst::Element(ast) => ast.ng_content_index,
            TemplateAst::EmbeddedTemplate(ast) => ast.ng_content_index,
            TemplateAst::NgContent(ast) => ast.ng_content_index,
        }
    }

    pub fn source_span(&self) -> &ParseSourceSpan {
        match self {
            TemplateAst::Text(ast) => &ast.source_span,
            TemplateAst::BoundText(ast) => &ast.source_span,
            TemplateAst::Element(ast) => &ast.source_span,
            TemplateAst::EmbeddedTemplate(ast) => &ast.source_span,
            TemplateAst::NgContent(ast) => &ast.source_span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextAst {
    pub value: String,
    pub ng_content_index: Option<usize>,
    pub source_span: ParseSourceSpan,
}

/// Text containing interpolations.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundTextAst {
    pub value: AstWithSource,
    pub ng_content_index: Option<usize>,
    pub source_span: ParseSourceSpan,
}

/// A plain attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrAst {
    pub name: String,
    pub value: String,
    pub source_span: ParseSourceSpan,
}

/// A binding to an element property, attribute, class or style.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundElementPropertyAst {
    pub name: String,
    pub binding_type: PropertyBindingType,
    pub value: AstWithSource,
    /// Style unit, e.g. `px` in `[style.width.px]`.
    pub unit: Option<String>,
    pub source_span: ParseSourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundEventAst {
    pub name: String,
    /// Global target such as `window` or `document`; `None` for the element.
    pub target: Option<String>,
    pub handler: AstWithSource,
    pub source_span: ParseSourceSpan,
}

impl BoundEventAst {
    pub fn full_name(&self) -> String {
        match &self.target {
            Some(target) => format!("{}:{}", target, self.name),
            None => self.name.clone(),
        }
    }
}

/// A local variable: `#name` or `#name="exportAs"`, or a template `var-`.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableAst {
    pub name: String,
    pub value: String,
    pub source_span: ParseSourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundDirectivePropertyAst {
    pub directive_name: String,
    pub template_name: String,
    pub value: AstWithSource,
    pub source_span: ParseSourceSpan,
}

/// A directive matched on an element or template.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveAst {
    pub directive: Rc<CompileDirectiveMetadata>,
    pub inputs: Vec<BoundDirectivePropertyAst>,
    pub host_properties: Vec<BoundElementPropertyAst>,
    pub host_events: Vec<BoundEventAst>,
    pub export_as_vars: Vec<VariableAst>,
    pub source_span: ParseSourceSpan,
}

impl DirectiveAst {
    pub fn new(directive: Rc<CompileDirectiveMetadata>, source_span: ParseSourceSpan) -> Self {
        DirectiveAst {
            directive,
            inputs: Vec::new(),
            host_properties: Vec::new(),
            host_events: Vec::new(),
            export_as_vars: Vec::new(),
            source_span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementAst {
    pub name: String,
    pub attrs: Vec<AttrAst>,
    pub inputs: Vec<BoundElementPropertyAst>,
    pub outputs: Vec<BoundEventAst>,
    pub export_as_vars: Vec<VariableAst>,
    pub directives: Vec<DirectiveAst>,
    pub children: Vec<TemplateAst>,
    pub ng_content_index: Option<usize>,
    pub source_span: ParseSourceSpan,
}

impl ElementAst {
    pub fn is_bound(&self) -> bool {
        !self.inputs.is_empty()
            || !self.outputs.is_empty()
            || !self.export_as_vars.is_empty()
            || !self.directives.is_empty()
    }

    /// The component directive matched on this element, if any.
    pub fn get_component(&self) -> Option<&Rc<CompileDirectiveMetadata>> {
        self.directives
            .iter()
            .map(|d| &d.directive)
            .find(|d| d.is_component)
    }
}

/// `<template>` element: a new binding scope.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedTemplateAst {
    pub attrs: Vec<AttrAst>,
    pub outputs: Vec<BoundEventAst>,
    pub vars: Vec<VariableAst>,
    pub directives: Vec<DirectiveAst>,
    pub children: Vec<TemplateAst>,
    pub ng_content_index: Option<usize>,
    pub source_span: ParseSourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NgContentAst {
    /// Position of this projection point among the component's selectors.
    pub index: usize,
    pub ng_content_index: Option<usize>,
    pub source_span: ParseSourceSpan,
}

pub trait TemplateAstVisitor {
    type Output;

    fn visit_text(&mut self, ast: &TextAst) -> Self::Output;
    fn visit_bound_text(&mut self, ast: &BoundTextAst) -> Self::Output;
    fn visit_element(&mut self, ast: &ElementAst) -> Self::Output;
    fn visit_embedded_template(&mut self, ast: &EmbeddedTemplateAst) -> Self::Output;
    fn visit_ng_content(&mut self, ast: &NgContentAst) -> Self::Output;
}

pub fn template_visit_all<V: TemplateAstVisitor + ?Sized>(
    visitor: &mut V,
    asts: &[TemplateAst],
) -> Vec<V::Output> {
    asts.iter().map(|ast| ast.visit(visitor)).collect()
}
