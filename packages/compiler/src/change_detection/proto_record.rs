//! Proto Records
//!
//! Flattens the expressions of a [`ChangeDetectorDefinition`] into a linear
//! list of evaluation steps. The runtime detector interprets the list; the
//! code generator emits one statement per step. Both therefore see the same
//! binding order.

use serde_json::Value;

use super::definition::{
    BindingRecord, BindingTarget, ChangeDetectorDefinition, DirectiveIndex, DirectiveRecord,
    ImplicitReceiver, LifecycleEvent,
};
use crate::expression_parser::{Ast, BinaryOperator};

/// Local holding the event object inside event handlers.
pub const EVENT_LOCAL: &str = "$event";

#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveOp {
    Binary(BinaryOperator),
    Not,
    Conditional,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordType {
    Const(Value),
    /// The directive instance a host binding reads from.
    DirectiveReceiver(DirectiveIndex),
    PropertyRead(String),
    Local(String),
    /// Generated detectors call the method on any receiver; the in-process
    /// detector only on the component or a directive and reports
    /// `MethodCallOnValue` otherwise.
    InvokeMethod(String),
    PrimitiveOp(PrimitiveOp),
    /// Literal strings around the argument values.
    Interpolate(Vec<String>),
    Pipe(String),
    DirectiveLifecycle(LifecycleEvent),
}

/// What a property read or method call is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordContext {
    /// The component instance.
    Component,
    /// The value of an earlier record.
    Record(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProtoRecord {
    pub mode: RecordType,
    pub context: RecordContext,
    /// Earlier records supplying the arguments.
    pub args: Vec<usize>,
    pub self_index: usize,
    /// Index into the definition's binding records.
    pub binding_index: usize,
    pub last_in_binding: bool,
    pub last_in_directive: bool,
}

impl ProtoRecord {
    pub fn is_lifecycle(&self) -> bool {
        matches!(self.mode, RecordType::DirectiveLifecycle(_))
    }
}

/// The records of one event handler.
#[derive(Debug, Clone, PartialEq)]
pub struct EventBinding {
    pub event_name: String,
    pub element_index: usize,
    pub records: Vec<ProtoRecord>,
}

/// The complete evaluation plan of a definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoRecordPlan {
    pub records: Vec<ProtoRecord>,
    pub event_bindings: Vec<EventBinding>,
}

impl ProtoRecordPlan {
    pub fn create(definition: &ChangeDetectorDefinition) -> Self {
        let mut builder = ProtoRecordBuilder::new(&definition.variable_names);
        for (binding_index, record) in definition.binding_records.iter().enumerate() {
            builder.add(record, binding_index);
        }
        let mut records = builder.records;
        mark_last_in_directive(&mut records, &definition.binding_records);

        let mut event_variables = vec![EVENT_LOCAL.to_string()];
        event_variables.extend(definition.variable_names.iter().cloned());
        let event_bindings = definition
            .event_records
            .iter()
            .enumerate()
            .filter_map(|(binding_index, record)| {
                let target = record.target()?;
                let mut builder = ProtoRecordBuilder::new(&event_variables);
                builder.add(record, binding_index);
                Some(EventBinding {
                    event_name: target.name.clone().unwrap_or_default(),
                    element_index: target.element_index,
                    records: builder.records,
                })
            })
            .collect();

        ProtoRecordPlan {
            records,
            event_bindings,
        }
    }

    /// Targets of the value-producing bindings, in evaluation order.
    pub fn binding_targets<'a>(
        &self,
        definition: &'a ChangeDetectorDefinition,
    ) -> Vec<&'a BindingTarget> {
        self.records
            .iter()
            .filter(|r| r.last_in_binding && !r.is_lifecycle())
            .filter_map(|r| definition.binding_records[r.binding_index].target())
            .collect()
    }
}

fn mark_last_in_directive(records: &mut [ProtoRecord], bindings: &[BindingRecord]) {
    let directive_of = |record: &ProtoRecord| {
        bindings[record.binding_index]
            .directive_record()
            .map(|d| d.directive_index)
    };
    for i in 0..records.len() {
        let current = directive_of(&records[i]);
        let next = records.get(i + 1).and_then(directive_of);
        records[i].last_in_directive = current.is_some() && current != next;
    }
}

struct ProtoRecordBuilder<'a> {
    variable_names: &'a [String],
    records: Vec<ProtoRecord>,
}

impl<'a> ProtoRecordBuilder<'a> {
    fn new(variable_names: &'a [String]) -> Self {
        ProtoRecordBuilder {
            variable_names,
            records: Vec::new(),
        }
    }

    fn add(&mut self, binding: &BindingRecord, binding_index: usize) {
        let first = self.records.len();
        match binding {
            BindingRecord::Binding {
                ast,
                implicit_receiver,
                ..
            } => {
                let receiver = match implicit_receiver {
                    ImplicitReceiver::Context => None,
                    ImplicitReceiver::Directive(index) => {
                        Some(self.push(RecordType::DirectiveReceiver(*index), RecordContext::Component, vec![], binding_index))
                    }
                };
                self.visit(&ast.ast, receiver, binding_index);
            }
            BindingRecord::DirectiveLifecycle { event, .. } => {
                self.push(
                    RecordType::DirectiveLifecycle(*event),
                    RecordContext::Component,
                    vec![],
                    binding_index,
                );
            }
        }
        if self.records.len() > first {
            if let Some(last) = self.records.last_mut() {
                last.last_in_binding = true;
            }
        }
    }

    fn push(
        &mut self,
        mode: RecordType,
        context: RecordContext,
        args: Vec<usize>,
        binding_index: usize,
    ) -> usize {
        let self_index = self.records.len();
        self.records.push(ProtoRecord {
            mode,
            context,
            args,
            self_index,
            binding_index,
            last_in_binding: false,
            last_in_directive: false,
        });
        self_index
    }

    /// Records the evaluation of `ast` and returns the index of its result.
    /// `receiver` is the record standing in for the implicit receiver.
    fn visit(&mut self, ast: &Ast, receiver: Option<usize>, binding_index: usize) -> usize {
        let implicit = receiver.map_or(RecordContext::Component, RecordContext::Record);
        match ast {
            Ast::ImplicitReceiver => match receiver {
                Some(index) => index,
                None => self.push(RecordType::Const(Value::Null), implicit, vec![], binding_index),
            },
            Ast::Literal(value) => {
                self.push(RecordType::Const(value.clone()), implicit, vec![], binding_index)
            }
            Ast::PropertyRead { receiver: target, name } => {
                if matches!(**target, Ast::ImplicitReceiver) {
                    if receiver.is_none() && self.variable_names.contains(name) {
                        return self.push(RecordType::Local(name.clone()), implicit, vec![], binding_index);
                    }
                    return self.push(RecordType::PropertyRead(name.clone()), implicit, vec![], binding_index);
                }
                let context = self.visit(target, receiver, binding_index);
                self.push(
                    RecordType::PropertyRead(name.clone()),
                    RecordContext::Record(context),
                    vec![],
                    binding_index,
                )
            }
            Ast::MethodCall {
                receiver: target,
                name,
                args,
            } => {
                let context = if matches!(**target, Ast::ImplicitReceiver) {
                    implicit
                } else {
                    RecordContext::Record(self.visit(target, receiver, binding_index))
                };
                let args = self.visit_all(args, receiver, binding_index);
                self.push(RecordType::InvokeMethod(name.clone()), context, args, binding_index)
            }
            Ast::Binary {
                operation,
                left,
                right,
            } => {
                let args = vec![
                    self.visit(left, receiver, binding_index),
                    self.visit(right, receiver, binding_index),
                ];
                self.push(
                    RecordType::PrimitiveOp(PrimitiveOp::Binary(*operation)),
                    implicit,
                    args,
                    binding_index,
                )
            }
            Ast::PrefixNot(exp) => {
                let args = vec![self.visit(exp, receiver, binding_index)];
                self.push(RecordType::PrimitiveOp(PrimitiveOp::Not), implicit, args, binding_index)
            }
            Ast::Conditional {
                condition,
                true_exp,
                false_exp,
            } => {
                let args = vec![
                    self.visit(condition, receiver, binding_index),
                    self.visit(true_exp, receiver, binding_index),
                    self.visit(false_exp, receiver, binding_index),
                ];
                self.push(
                    RecordType::PrimitiveOp(PrimitiveOp::Conditional),
                    implicit,
                    args,
                    binding_index,
                )
            }
            Ast::Interpolation {
                strings,
                expressions,
            } => {
                let args = self.visit_all(expressions, receiver, binding_index);
                self.push(RecordType::Interpolate(strings.clone()), implicit, args, binding_index)
            }
            Ast::Pipe { exp, name, args } => {
                let value = self.visit(exp, receiver, binding_index);
                let args = self.visit_all(args, receiver, binding_index);
                self.push(
                    RecordType::Pipe(name.clone()),
                    RecordContext::Record(value),
                    args,
                    binding_index,
                )
            }
        }
    }

    fn visit_all(&mut self, asts: &[Ast], receiver: Option<usize>, binding_index: usize) -> Vec<usize> {
        asts.iter()
            .map(|ast| self.visit(ast, receiver, binding_index))
            .collect()
    }
}

/// The directive record a lifecycle record belongs to.
pub fn lifecycle_directive<'a>(
    record: &ProtoRecord,
    definition: &'a ChangeDetectorDefinition,
) -> Option<&'a DirectiveRecord> {
    if record.is_lifecycle() {
        definition.binding_records[record.binding_index].directive_record()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChangeDetectorGenConfig;
    use crate::core::{ChangeDetectionStrategy, LifecycleHooks};
    use crate::expression_parser::AstWithSource;

    fn definition(variable_names: Vec<&str>, binding_records: Vec<BindingRecord>) -> ChangeDetectorDefinition {
        ChangeDetectorDefinition {
            id: "cd0".to_string(),
            strategy: ChangeDetectionStrategy::Default,
            variable_names: variable_names.into_iter().map(str::to_string).collect(),
            binding_records,
            event_records: vec![],
            directive_records: vec![],
            gen_config: ChangeDetectorGenConfig::default(),
        }
    }

    #[test]
    fn test_locals_are_read_from_locals() {
        let ast = AstWithSource::from_ast(
            Ast::binary(BinaryOperator::Plus, Ast::property("item"), Ast::property("a")),
            "test",
        );
        let def = definition(vec!["item"], vec![BindingRecord::for_text_node(ast, 0)]);
        let plan = ProtoRecordPlan::create(&def);
        let modes: Vec<_> = plan.records.iter().map(|r| r.mode.clone()).collect();
        assert_eq!(
            modes,
            vec![
                RecordType::Local("item".to_string()),
                RecordType::PropertyRead("a".to_string()),
                RecordType::PrimitiveOp(PrimitiveOp::Binary(BinaryOperator::Plus)),
            ]
        );
        assert_eq!(plan.records[2].args, vec![0, 1]);
        assert!(plan.records[2].last_in_binding);
        assert!(!plan.records[1].last_in_binding);
    }

    #[test]
    fn test_host_bindings_read_from_directive() {
        let index = DirectiveIndex::new(0, 1);
        let ast = AstWithSource::from_ast(Ast::property("title"), "test");
        let def = definition(
            vec![],
            vec![BindingRecord::for_host_binding(
                crate::change_detection::definition::BindingTargetMode::ElementProperty,
                index,
                ast,
                "title",
                None,
            )],
        );
        let plan = ProtoRecordPlan::create(&def);
        assert_eq!(plan.records[0].mode, RecordType::DirectiveReceiver(index));
        assert_eq!(plan.records[1].context, RecordContext::Record(0));
    }

    #[test]
    fn test_last_in_directive() {
        let dir = DirectiveRecord {
            directive_index: DirectiveIndex::new(0, 0),
            lifecycle_hooks: LifecycleHooks::DO_CHECK,
            change_detection: ChangeDetectionStrategy::Default,
        };
        let def = definition(
            vec![],
            vec![
                BindingRecord::for_directive(
                    AstWithSource::from_ast(Ast::property("a"), "test"),
                    "a",
                    &dir,
                ),
                BindingRecord::lifecycle(LifecycleEvent::DoCheck, &dir),
                BindingRecord::for_text_node(AstWithSource::from_ast(Ast::property("b"), "test"), 1),
            ],
        );
        let plan = ProtoRecordPlan::create(&def);
        let flags: Vec<_> = plan.records.iter().map(|r| r.last_in_directive).collect();
        assert_eq!(flags, vec![false, true, false]);
        assert_eq!(plan.binding_targets(&def).len(), 2);
    }
}
