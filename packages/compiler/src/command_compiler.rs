//! Command Compiler
//!
//! Lowers a parsed template into its render command tree. One walk builds
//! a neutral plan in which nested component templates are still metadata
//! and change detector factories are still scope indices; the runtime and
//! codegen renderers then resolve both.

use indexmap::IndexMap;
use log::trace;
use std::rc::Rc;

use crate::change_detection::ChangeDetectorFactory;
use crate::core::ViewEncapsulation;
use crate::directive_metadata::{CompileDirectiveMetadata, CompileTypeMetadata};
use crate::error::{CompileError, Result};
use crate::source_module::{module_ref, SourceExpression};
use crate::style_compiler::{shim_content_attribute, shim_host_attribute};
use crate::template_ast::{
    template_visit_all, AttrAst, BoundEventAst, BoundTextAst, DirectiveAst, ElementAst,
    EmbeddedTemplateAst, NgContentAst, TemplateAst, TemplateAstVisitor, TextAst,
};
use crate::template_commands::{
    AttrList, BeginComponentCmd, BeginElementCmd, EmbeddedTemplateCmd, EventList, NgContentCmd,
    TemplateCmd, TemplateHandle, TextCmd, VariableSource,
};
use crate::util::escape_single_quote_string;

pub const TEMPLATE_COMMANDS_MODULE: &str = "angular2/src/core/compiler/template_commands";

/// Commands before nested templates and detector factories are resolved.
type PlanCmd = TemplateCmd<Rc<CompileDirectiveMetadata>, usize>;

#[derive(Debug, Clone, Copy, Default)]
pub struct CommandCompiler;

impl CommandCompiler {
    pub fn new() -> Self {
        CommandCompiler
    }

    /// `change_detector_factories` holds one factory per scope, the
    /// component view first. `component_template_factory` is called for
    /// every component element.
    pub fn compile_component_runtime(
        &self,
        component: &CompileDirectiveMetadata,
        template: &[TemplateAst],
        change_detector_factories: &[ChangeDetectorFactory],
        component_template_factory: &mut dyn FnMut(&CompileDirectiveMetadata) -> Result<TemplateHandle>,
    ) -> Result<Vec<TemplateCmd>> {
        let plan = build_plan(component, template, change_detector_factories.len())?;
        plan.into_iter()
            .map(|cmd| {
                cmd.try_map(
                    &mut |nested: Rc<CompileDirectiveMetadata>| component_template_factory(nested.as_ref()),
                    &mut |index: usize| {
                        change_detector_factories.get(index).cloned().ok_or_else(|| {
                            CompileError::Internal(format!("No change detector factory for scope {}", index))
                        })
                    },
                )
            })
            .collect()
    }

    /// Codegen counterpart of [`compile_component_runtime`]: the factories
    /// are source expressions, and the nested template factory returns an
    /// expression whose declarations are hoisted into the result.
    ///
    /// [`compile_component_runtime`]: CommandCompiler::compile_component_runtime
    pub fn compile_component_codegen(
        &self,
        component: &CompileDirectiveMetadata,
        template: &[TemplateAst],
        change_detector_factory_expressions: &[String],
        component_template_factory: &mut dyn FnMut(&CompileDirectiveMetadata) -> Result<SourceExpression>,
    ) -> Result<SourceExpression> {
        let plan = build_plan(component, template, change_detector_factory_expressions.len())?;
        let mut renderer = CodegenRenderer {
            factory_expressions: change_detector_factory_expressions,
            component_template_factory,
            declarations: Vec::new(),
        };
        let expression = renderer.render_all(&plan)?;
        Ok(SourceExpression::new(renderer.declarations, expression))
    }
}

fn build_plan(
    component: &CompileDirectiveMetadata,
    template: &[TemplateAst],
    factory_count: usize,
) -> Result<Vec<PlanCmd>> {
    let mut builder = CommandBuilder {
        component,
        encapsulation: component.component_template()?.encapsulation,
        commands: Vec::new(),
        next_change_detector_index: 1,
        parent_component: None,
    };
    template_visit_all(&mut builder, template)
        .into_iter()
        .collect::<Result<Vec<()>>>()?;

    let scope_count = builder.next_change_detector_index;
    if scope_count != factory_count {
        return Err(CompileError::Internal(format!(
            "{} has {} binding scope(s) but {} change detector factories were given",
            component.type_.name, scope_count, factory_count
        )));
    }
    trace!(
        "{}: {} command(s), {} scope(s)",
        component.type_.name,
        builder.commands.len(),
        scope_count
    );
    Ok(builder.commands)
}

struct CommandBuilder<'a> {
    component: &'a CompileDirectiveMetadata,
    encapsulation: ViewEncapsulation,
    commands: Vec<PlanCmd>,
    next_change_detector_index: usize,
    /// Component of the element whose direct children are being visited.
    parent_component: Option<Rc<CompileDirectiveMetadata>>,
}

impl CommandBuilder<'_> {
    fn check_ng_content_index(&self, ng_content_index: Option<usize>) -> Result<()> {
        let Some(index) = ng_content_index else {
            return Ok(());
        };
        let parent = self.parent_component.as_ref().ok_or_else(|| {
            CompileError::InvalidProjection(format!(
                "Node with ngContentIndex {} in {} is not a direct child of a component element",
                index, self.component.type_.name
            ))
        })?;
        let selectors = &parent.component_template()?.ng_content_selectors;
        if index >= selectors.len() {
            return Err(CompileError::InvalidProjection(format!(
                "ngContentIndex {} is out of range for {} with {} projection selector(s)",
                index,
                parent.type_.name,
                selectors.len()
            )));
        }
        Ok(())
    }

    fn visit_children(
        &mut self,
        children: &[TemplateAst],
        parent_component: Option<Rc<CompileDirectiveMetadata>>,
    ) -> Result<()> {
        let saved = std::mem::replace(&mut self.parent_component, parent_component);
        let result = template_visit_all(self, children)
            .into_iter()
            .collect::<Result<Vec<()>>>();
        self.parent_component = saved;
        result.map(|_| ())
    }

    fn read_attributes(&self, attrs: &[AttrAst], directives: &[DirectiveAst]) -> AttrList {
        let mut merged: IndexMap<&str, String> = IndexMap::new();
        for attr in attrs {
            merged.insert(&attr.name, attr.value.clone());
        }
        for directive in directives {
            for (name, value) in &directive.directive.host_attributes {
                let value = match merged.get(name.as_str()) {
                    Some(previous) => merge_attribute_value(name, previous, value),
                    None => value.clone(),
                };
                merged.insert(name, value);
            }
        }
        merged
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }
}

/// `class` and `style` values from several sources are combined; for any
/// other attribute the directive's value wins.
fn merge_attribute_value(name: &str, previous: &str, value: &str) -> String {
    match name {
        "class" => format!("{} {}", previous, value),
        "style" => format!("{};{}", previous, value),
        _ => value.to_string(),
    }
}

fn read_events(outputs: &[BoundEventAst], directives: &[DirectiveAst]) -> EventList {
    let mut seen: IndexMap<String, (Option<String>, String)> = IndexMap::new();
    let host_events = directives.iter().flat_map(|d| d.host_events.iter());
    for event in outputs.iter().chain(host_events) {
        seen.entry(event.full_name())
            .or_insert_with(|| (event.target.clone(), event.name.clone()));
    }
    seen.into_values().collect()
}

fn directive_types(directives: &[DirectiveAst]) -> Vec<CompileTypeMetadata> {
    directives
        .iter()
        .map(|d| d.directive.type_.clone())
        .collect()
}

fn contains_ng_content(asts: &[TemplateAst]) -> bool {
    asts.iter().any(|ast| match ast {
        TemplateAst::NgContent(_) => true,
        TemplateAst::Element(element) => contains_ng_content(&element.children),
        TemplateAst::EmbeddedTemplate(template) => contains_ng_content(&template.children),
        TemplateAst::Text(_) | TemplateAst::BoundText(_) => false,
    })
}

impl TemplateAstVisitor for CommandBuilder<'_> {
    type Output = Result<()>;

    fn visit_text(&mut self, ast: &TextAst) -> Result<()> {
        self.check_ng_content_index(ast.ng_content_index)?;
        self.commands.push(TemplateCmd::Text(TextCmd {
            value: Some(ast.value.clone()),
            is_bound: false,
            ng_content_index: ast.ng_content_index,
        }));
        Ok(())
    }

    fn visit_bound_text(&mut self, ast: &BoundTextAst) -> Result<()> {
        self.check_ng_content_index(ast.ng_content_index)?;
        self.commands.push(TemplateCmd::Text(TextCmd {
            value: None,
            is_bound: true,
            ng_content_index: ast.ng_content_index,
        }));
        Ok(())
    }

    fn visit_ng_content(&mut self, ast: &NgContentAst) -> Result<()> {
        self.check_ng_content_index(ast.ng_content_index)?;
        self.commands.push(TemplateCmd::NgContent(NgContentCmd {
            ng_content_index: ast.ng_content_index,
        }));
        Ok(())
    }

    fn visit_element(&mut self, ast: &ElementAst) -> Result<()> {
        self.check_ng_content_index(ast.ng_content_index)?;

        let component_index = ast.directives.iter().position(|d| d.directive.is_component);
        let component = component_index.map(|i| ast.directives[i].directive.clone());

        let mut variables = Vec::new();
        for var in &ast.export_as_vars {
            let source = if var.value.is_empty() {
                component_index.map_or(VariableSource::Implicit, VariableSource::Directive)
            } else {
                ast.directives
                    .iter()
                    .position(|d| d.directive.export_as.as_deref() == Some(var.value.as_str()))
                    .map(VariableSource::Directive)
                    .ok_or_else(|| {
                        CompileError::UnresolvedReference(format!(
                            "There is no directive with \"exportAs\" set to \"{}\" on <{}>",
                            var.value, ast.name
                        ))
                    })?
            };
            variables.push((var.name.clone(), source));
        }
        for (index, directive) in ast.directives.iter().enumerate() {
            variables.extend(
                directive
                    .export_as_vars
                    .iter()
                    .map(|var| (var.name.clone(), VariableSource::Directive(index))),
            );
        }

        let mut attrs = self.read_attributes(&ast.attrs, &ast.directives);
        let events = read_events(&ast.outputs, &ast.directives);
        let directives = directive_types(&ast.directives);

        match &component {
            Some(nested) => {
                let nested_template = nested.template.as_ref().ok_or_else(|| {
                    CompileError::UnresolvedReference(format!(
                        "Component {} matched on <{}> has no template",
                        nested.type_.name, ast.name
                    ))
                })?;
                if nested_template.encapsulation == ViewEncapsulation::Emulated {
                    attrs.push((shim_host_attribute(nested.type_.id), String::new()));
                }
                if self.encapsulation == ViewEncapsulation::Emulated {
                    attrs.push((shim_content_attribute(self.component.type_.id), String::new()));
                }
                self.commands.push(TemplateCmd::BeginComponent(BeginComponentCmd {
                    name: ast.name.clone(),
                    attrs,
                    events,
                    variables,
                    directives,
                    native_shadow: nested_template.encapsulation == ViewEncapsulation::Native,
                    ng_content_index: ast.ng_content_index,
                    template: nested.clone(),
                }));
                self.visit_children(&ast.children, Some(nested.clone()))?;
                self.commands.push(TemplateCmd::EndComponent);
            }
            None => {
                if self.encapsulation == ViewEncapsulation::Emulated {
                    attrs.push((shim_content_attribute(self.component.type_.id), String::new()));
                }
                self.commands.push(TemplateCmd::BeginElement(BeginElementCmd {
                    name: ast.name.clone(),
                    attrs,
                    events,
                    variables,
                    directives,
                    is_bound: ast.is_bound(),
                    ng_content_index: ast.ng_content_index,
                }));
                self.visit_children(&ast.children, None)?;
                self.commands.push(TemplateCmd::EndElement);
            }
        }
        Ok(())
    }

    fn visit_embedded_template(&mut self, ast: &EmbeddedTemplateAst) -> Result<()> {
        self.check_ng_content_index(ast.ng_content_index)?;
        let change_detector_factory = self.next_change_detector_index;
        self.next_change_detector_index += 1;

        let parent_commands = std::mem::take(&mut self.commands);
        let result = self.visit_children(&ast.children, None);
        let children = std::mem::replace(&mut self.commands, parent_commands);
        result?;

        let attrs = self.read_attributes(&ast.attrs, &ast.directives);
        self.commands
            .push(TemplateCmd::EmbeddedTemplate(EmbeddedTemplateCmd {
                attrs,
                variables: ast
                    .vars
                    .iter()
                    .map(|var| (var.name.clone(), var.value.clone()))
                    .collect(),
                directives: directive_types(&ast.directives),
                is_merged: contains_ng_content(&ast.children),
                ng_content_index: ast.ng_content_index,
                change_detector_factory,
                children,
            }));
        Ok(())
    }
}

struct CodegenRenderer<'a, 'f> {
    factory_expressions: &'a [String],
    component_template_factory: &'f mut dyn FnMut(&CompileDirectiveMetadata) -> Result<SourceExpression>,
    declarations: Vec<String>,
}

fn command_fn(name: &str) -> String {
    format!("{}{}", module_ref(TEMPLATE_COMMANDS_MODULE), name)
}

fn optional_index(index: Option<usize>) -> String {
    index.map_or_else(|| "null".to_string(), |i| i.to_string())
}

fn codegen_attrs(attrs: &AttrList) -> String {
    let items: Vec<String> = attrs
        .iter()
        .flat_map(|(name, value)| [escape_single_quote_string(name), escape_single_quote_string(value)])
        .collect();
    format!("[{}]", items.join(","))
}

fn codegen_events(events: &EventList) -> String {
    let items: Vec<String> = events
        .iter()
        .flat_map(|(target, name)| {
            [
                target
                    .as_deref()
                    .map_or_else(|| "null".to_string(), escape_single_quote_string),
                escape_single_quote_string(name),
            ]
        })
        .collect();
    format!("[{}]", items.join(","))
}

fn codegen_variables(variables: &[(String, VariableSource)]) -> String {
    let items: Vec<String> = variables
        .iter()
        .flat_map(|(name, source)| {
            let value = match source {
                VariableSource::Directive(index) => index.to_string(),
                other => escape_single_quote_string(&other.to_string()),
            };
            [escape_single_quote_string(name), value]
        })
        .collect();
    format!("[{}]", items.join(","))
}

fn codegen_directives(directives: &[CompileTypeMetadata]) -> String {
    let items: Vec<String> = directives
        .iter()
        .map(|d| format!("{}{}", module_ref(&d.module_id), d.name))
        .collect();
    format!("[{}]", items.join(","))
}

impl CodegenRenderer<'_, '_> {
    fn render_all(&mut self, cmds: &[PlanCmd]) -> Result<String> {
        let rendered = cmds
            .iter()
            .map(|cmd| self.render(cmd))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!("[{}]", rendered.join(",")))
    }

    fn render(&mut self, cmd: &PlanCmd) -> Result<String> {
        Ok(match cmd {
            TemplateCmd::Text(cmd) => format!(
                "{}({}, {}, {})",
                command_fn("text"),
                cmd.value
                    .as_deref()
                    .map_or_else(|| "null".to_string(), escape_single_quote_string),
                cmd.is_bound,
                optional_index(cmd.ng_content_index)
            ),
            TemplateCmd::NgContent(cmd) => format!(
                "{}({})",
                command_fn("ngContent"),
                optional_index(cmd.ng_content_index)
            ),
            TemplateCmd::BeginElement(cmd) => format!(
                "{}({}, {}, {}, {}, {}, {}, {})",
                command_fn("beginElement"),
                escape_single_quote_string(&cmd.name),
                codegen_attrs(&cmd.attrs),
                codegen_events(&cmd.events),
                codegen_variables(&cmd.variables),
                codegen_directives(&cmd.directives),
                cmd.is_bound,
                optional_index(cmd.ng_content_index)
            ),
            TemplateCmd::EndElement => format!("{}()", command_fn("endElement")),
            TemplateCmd::BeginComponent(cmd) => {
                let template = (self.component_template_factory)(&cmd.template)?;
                for declaration in template.declarations {
                    if !self.declarations.contains(&declaration) {
                        self.declarations.push(declaration);
                    }
                }
                format!(
                    "{}({}, {}, {}, {}, {}, {}, {}, {})",
                    command_fn("beginComponent"),
                    escape_single_quote_string(&cmd.name),
                    codegen_attrs(&cmd.attrs),
                    codegen_events(&cmd.events),
                    codegen_variables(&cmd.variables),
                    codegen_directives(&cmd.directives),
                    cmd.native_shadow,
                    optional_index(cmd.ng_content_index),
                    template.expression
                )
            }
            TemplateCmd::EndComponent => format!("{}()", command_fn("endComponent")),
            TemplateCmd::EmbeddedTemplate(cmd) => {
                let factory = self
                    .factory_expressions
                    .get(cmd.change_detector_factory)
                    .ok_or_else(|| {
                        CompileError::Internal(format!(
                            "No change detector factory for scope {}",
                            cmd.change_detector_factory
                        ))
                    })?
                    .clone();
                let variables: Vec<String> = cmd
                    .variables
                    .iter()
                    .flat_map(|(name, value)| {
                        [escape_single_quote_string(name), escape_single_quote_string(value)]
                    })
                    .collect();
                let children = self.render_all(&cmd.children)?;
                format!(
                    "{}({}, [{}], {}, {}, {}, {}, {})",
                    command_fn("embeddedTemplate"),
                    codegen_attrs(&cmd.attrs),
                    variables.join(","),
                    codegen_directives(&cmd.directives),
                    cmd.is_merged,
                    optional_index(cmd.ng_content_index),
                    factory,
                    children
                )
            }
        })
    }
}
