//! Change Definition Factory
//!
//! Walks a component template and derives one [`ChangeDetectorDefinition`]
//! per binding scope: the component view itself plus every embedded
//! template, numbered in pre-order.

use log::trace;

use super::definition::{
    BindingRecord, BindingTargetMode, ChangeDetectorDefinition, DirectiveIndex, DirectiveRecord,
    LifecycleEvent,
};
use crate::config::ChangeDetectorGenConfig;
use crate::core::{ChangeDetectionStrategy, LifecycleHooks, PropertyBindingType};
use crate::directive_metadata::CompileTypeMetadata;
use crate::template_ast::{
    template_visit_all, BoundElementPropertyAst, BoundTextAst, DirectiveAst, ElementAst,
    EmbeddedTemplateAst, NgContentAst, TemplateAst, TemplateAstVisitor, TextAst,
};

/// `cd<N>`.
pub fn change_detector_id(view_index: usize) -> String {
    format!("cd{}", view_index)
}

pub fn create_change_detector_definitions(
    component_type: &CompileTypeMetadata,
    component_strategy: ChangeDetectionStrategy,
    gen_config: ChangeDetectorGenConfig,
    parsed_template: &[TemplateAst],
) -> Vec<ChangeDetectorDefinition> {
    let mut scopes: Vec<Option<ScopeRecords>> = Vec::new();
    collect_scope(parsed_template, Vec::new(), component_strategy, &mut scopes);

    let definitions: Vec<ChangeDetectorDefinition> = scopes
        .into_iter()
        .flatten()
        .map(|scope| scope.into_definition(gen_config))
        .collect();
    trace!(
        "{}: {} change detector definition(s)",
        component_type.name,
        definitions.len()
    );
    definitions
}

#[derive(Debug)]
struct ScopeRecords {
    view_index: usize,
    strategy: ChangeDetectionStrategy,
    variable_names: Vec<String>,
    binding_records: Vec<BindingRecord>,
    event_records: Vec<BindingRecord>,
    directive_records: Vec<DirectiveRecord>,
}

impl ScopeRecords {
    fn into_definition(self, gen_config: ChangeDetectorGenConfig) -> ChangeDetectorDefinition {
        ChangeDetectorDefinition {
            id: change_detector_id(self.view_index),
            strategy: self.strategy,
            variable_names: self.variable_names,
            binding_records: self.binding_records,
            event_records: self.event_records,
            directive_records: self.directive_records,
            gen_config,
        }
    }
}

/// Reserves the scope's slot before visiting so that nested scopes are
/// numbered after their parent.
fn collect_scope(
    asts: &[TemplateAst],
    variable_names: Vec<String>,
    strategy: ChangeDetectionStrategy,
    scopes: &mut Vec<Option<ScopeRecords>>,
) {
    let view_index = scopes.len();
    scopes.push(None);

    let mut visitor = ProtoViewVisitor {
        scopes: &mut *scopes,
        node_count: 0,
        bound_element_count: 0,
        records: ScopeRecords {
            view_index,
            strategy,
            variable_names,
            binding_records: Vec::new(),
            event_records: Vec::new(),
            directive_records: Vec::new(),
        },
    };
    template_visit_all(&mut visitor, asts);
    let records = visitor.records;
    scopes[view_index] = Some(records);
}

struct ProtoViewVisitor<'a> {
    scopes: &'a mut Vec<Option<ScopeRecords>>,
    node_count: usize,
    bound_element_count: usize,
    records: ScopeRecords,
}

impl ProtoViewVisitor<'_> {
    fn current_bound_element(&self) -> usize {
        self.bound_element_count.saturating_sub(1)
    }

    fn visit_element_property(&mut self, ast: &BoundElementPropertyAst) {
        let element_index = self.current_bound_element();
        let record = match ast.binding_type {
            PropertyBindingType::Property => {
                BindingRecord::for_element_property(ast.value.clone(), element_index, &ast.name)
            }
            PropertyBindingType::Attribute => {
                BindingRecord::for_element_attribute(ast.value.clone(), element_index, &ast.name)
            }
            PropertyBindingType::Class => {
                BindingRecord::for_element_class(ast.value.clone(), element_index, &ast.name)
            }
            PropertyBindingType::Style => BindingRecord::for_element_style(
                ast.value.clone(),
                element_index,
                &ast.name,
                ast.unit.as_deref(),
            ),
        };
        self.records.binding_records.push(record);
    }

    fn visit_host_property(&mut self, ast: &BoundElementPropertyAst, directive_index: DirectiveIndex) {
        let mode = match ast.binding_type {
            PropertyBindingType::Property => BindingTargetMode::ElementProperty,
            PropertyBindingType::Attribute => BindingTargetMode::ElementAttribute,
            PropertyBindingType::Class => BindingTargetMode::ElementClass,
            PropertyBindingType::Style => BindingTargetMode::ElementStyle,
        };
        self.records.binding_records.push(BindingRecord::for_host_binding(
            mode,
            directive_index,
            ast.value.clone(),
            &ast.name,
            ast.unit.as_deref(),
        ));
    }

    fn visit_directive(&mut self, ast: &DirectiveAst, directive_index: DirectiveIndex) {
        let directive_record = DirectiveRecord {
            directive_index,
            lifecycle_hooks: ast.directive.lifecycle_hooks,
            change_detection: ast.directive.change_detection,
        };
        self.records.directive_records.push(directive_record.clone());

        for input in &ast.inputs {
            self.records.binding_records.push(BindingRecord::for_directive(
                input.value.clone(),
                &input.directive_name,
                &directive_record,
            ));
        }

        for (hook, event) in [
            (LifecycleHooks::ON_CHANGES, LifecycleEvent::OnChanges),
            (LifecycleHooks::ON_INIT, LifecycleEvent::OnInit),
            (LifecycleHooks::DO_CHECK, LifecycleEvent::DoCheck),
        ] {
            if directive_record.calls(hook) {
                self.records
                    .binding_records
                    .push(BindingRecord::lifecycle(event, &directive_record));
            }
        }

        for host_property in &ast.host_properties {
            self.visit_host_property(host_property, directive_index);
        }
        for host_event in &ast.host_events {
            self.records.event_records.push(BindingRecord::for_host_event(
                host_event.handler.clone(),
                &host_event.full_name(),
                &directive_record,
            ));
        }
        self.records
            .variable_names
            .extend(ast.export_as_vars.iter().map(|var| var.name.clone()));
    }
}

impl TemplateAstVisitor for ProtoViewVisitor<'_> {
    type Output = ();

    fn visit_text(&mut self, _ast: &TextAst) {
        self.node_count += 1;
    }

    fn visit_bound_text(&mut self, ast: &BoundTextAst) {
        let node_index = self.node_count;
        self.node_count += 1;
        self.records
            .binding_records
            .push(BindingRecord::for_text_node(ast.value.clone(), node_index));
    }

    fn visit_element(&mut self, ast: &ElementAst) {
        self.node_count += 1;
        if ast.is_bound() {
            self.bound_element_count += 1;
        }
        let element_index = self.current_bound_element();

        for input in &ast.inputs {
            self.visit_element_property(input);
        }
        for output in &ast.outputs {
            self.records.event_records.push(BindingRecord::for_event(
                output.handler.clone(),
                &output.full_name(),
                element_index,
            ));
        }
        self.records
            .variable_names
            .extend(ast.export_as_vars.iter().map(|var| var.name.clone()));
        for (i, directive) in ast.directives.iter().enumerate() {
            self.visit_directive(directive, DirectiveIndex::new(element_index, i));
        }
        template_visit_all(self, &ast.children);
    }

    fn visit_embedded_template(&mut self, ast: &EmbeddedTemplateAst) {
        self.node_count += 1;
        self.bound_element_count += 1;
        let element_index = self.current_bound_element();

        for output in &ast.outputs {
            self.records.event_records.push(BindingRecord::for_event(
                output.handler.clone(),
                &output.full_name(),
                element_index,
            ));
        }
        for (i, directive) in ast.directives.iter().enumerate() {
            self.visit_directive(directive, DirectiveIndex::new(element_index, i));
        }

        let mut child_variables = self.records.variable_names.clone();
        child_variables.extend(ast.vars.iter().map(|var| var.name.clone()));
        collect_scope(
            &ast.children,
            child_variables,
            ChangeDetectionStrategy::Default,
            self.scopes,
        );
    }

    fn visit_ng_content(&mut self, _ast: &NgContentAst) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive_metadata::{CompileDirectiveMetadata, DirectiveDeclaration};
    use crate::expression_parser::{Ast, AstWithSource};
    use crate::parse_util::ParseSourceSpan;
    use crate::template_ast::{BoundDirectivePropertyAst, VariableAst};
    use std::rc::Rc;

    fn span() -> ParseSourceSpan {
        ParseSourceSpan::synthetic("test")
    }

    fn element(children: Vec<TemplateAst>) -> ElementAst {
        ElementAst {
            name: "div".to_string(),
            attrs: vec![],
            inputs: vec![],
            outputs: vec![],
            export_as_vars: vec![],
            directives: vec![],
            children,
            ng_content_index: None,
            source_span: span(),
        }
    }

    fn bound_text(name: &str) -> TemplateAst {
        TemplateAst::BoundText(BoundTextAst {
            value: AstWithSource::from_ast(
                Ast::interpolation(vec!["", ""], vec![Ast::property(name)]),
                "test",
            ),
            ng_content_index: None,
            source_span: span(),
        })
    }

    fn template(vars: &[&str], children: Vec<TemplateAst>) -> TemplateAst {
        TemplateAst::EmbeddedTemplate(EmbeddedTemplateAst {
            attrs: vec![],
            outputs: vec![],
            vars: vars
                .iter()
                .map(|name| VariableAst {
                    name: name.to_string(),
                    value: String::new(),
                    source_span: span(),
                })
                .collect(),
            directives: vec![],
            children,
            ng_content_index: None,
            source_span: span(),
        })
    }

    fn definitions(asts: &[TemplateAst]) -> Vec<ChangeDetectorDefinition> {
        create_change_detector_definitions(
            &CompileTypeMetadata::new(1, "Comp", "some/module"),
            ChangeDetectionStrategy::OnPush,
            ChangeDetectorGenConfig::default(),
            asts,
        )
    }

    #[test]
    fn test_numbers_scopes_in_pre_order() {
        let asts = vec![
            template(&["a"], vec![template(&["b"], vec![])]),
            template(&[], vec![]),
        ];
        let defs = definitions(&asts);
        let ids: Vec<_> = defs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["cd0", "cd1", "cd2", "cd3"]);
        assert_eq!(defs[0].strategy, ChangeDetectionStrategy::OnPush);
        assert_eq!(defs[1].strategy, ChangeDetectionStrategy::Default);
        assert_eq!(defs[2].variable_names, vec!["a", "b"]);
    }

    #[test]
    fn test_text_node_indices_count_every_node() {
        let asts = vec![
            TemplateAst::Element(element(vec![bound_text("a")])),
            bound_text("b"),
        ];
        let defs = definitions(&asts);
        let indices: Vec<_> = defs[0]
            .binding_records
            .iter()
            .filter_map(|r| r.target())
            .map(|t| t.element_index)
            .collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn test_directive_inputs_then_lifecycle_then_host_properties() {
        let mut host = indexmap::IndexMap::new();
        host.insert("[title]".to_string(), "t".to_string());
        let directive = Rc::new(CompileDirectiveMetadata::create(
            CompileTypeMetadata::new(2, "Dir", "some/module"),
            DirectiveDeclaration {
                properties: vec!["value".to_string()],
                host,
                lifecycle_hooks: LifecycleHooks::ON_CHANGES | LifecycleHooks::DO_CHECK,
                ..Default::default()
            },
        ));
        let mut dir_ast = DirectiveAst::new(directive, span());
        dir_ast.inputs.push(BoundDirectivePropertyAst {
            directive_name: "value".to_string(),
            template_name: "value".to_string(),
            value: AstWithSource::from_ast(Ast::property("v"), "test"),
            source_span: span(),
        });
        dir_ast.host_properties.push(BoundElementPropertyAst {
            name: "title".to_string(),
            binding_type: PropertyBindingType::Property,
            value: AstWithSource::from_ast(Ast::property("t"), "test"),
            unit: None,
            source_span: span(),
        });
        let mut el = element(vec![]);
        el.directives.push(dir_ast);

        let defs = definitions(&[TemplateAst::Element(el)]);
        let kinds: Vec<String> = defs[0]
            .binding_records
            .iter()
            .map(|record| match record {
                BindingRecord::Binding { target, .. } => target.to_string(),
                BindingRecord::DirectiveLifecycle { event, .. } => format!("{:?}", event),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "directive[0].value",
                "OnChanges",
                "DoCheck",
                "elementProperty[0].title"
            ]
        );
        assert_eq!(
            defs[0].directive_records[0].directive_index,
            DirectiveIndex::new(0, 0)
        );
    }
}
