//! Dynamic Change Detector
//!
//! Interprets a [`ProtoRecordPlan`] in process. This is the runtime-mode
//! counterpart of the generated detector classes.

use indexmap::IndexMap;
use log::trace;
use serde_json::{Number, Value};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

use super::definition::{
    BindingRecord, BindingTarget, BindingTargetMode, ChangeDetectorDefinition, DirectiveIndex,
    LifecycleEvent,
};
use super::proto_record::{
    lifecycle_directive, PrimitiveOp, ProtoRecord, ProtoRecordPlan, RecordContext, RecordType,
};
use crate::core::{ChangeDetectionStrategy, LifecycleHooks};
use crate::expression_parser::BinaryOperator;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChangeDetectionError {
    #[error("Expression '{expression}' has changed after it was checked. Previous value: '{previous}'. Current value: '{current}'")]
    ExpressionChangedAfterItHasBeenChecked {
        expression: String,
        previous: Value,
        current: Value,
    },
    #[error("Cannot find pipe '{0}'")]
    PipeNotFound(String),
    #[error("Attempt to use a dehydrated detector: {0}")]
    Dehydrated(String),
    /// Only the component and directives have callable methods here; a
    /// call on any other value (`a.b()`) cannot be evaluated in process.
    #[error("Cannot call method '{method}' on a plain value in {detector}")]
    MethodCallOnValue { method: String, detector: String },
}

/// The component instance bindings are evaluated against.
pub trait ComponentContext {
    fn read_property(&self, name: &str) -> Value;
    fn invoke_method(&self, name: &str, args: &[Value]) -> Value;
}

/// Plain data as a context: fields are readable, nothing is callable.
impl ComponentContext for Value {
    fn read_property(&self, name: &str) -> Value {
        self.get(name).cloned().unwrap_or(Value::Null)
    }

    fn invoke_method(&self, _name: &str, _args: &[Value]) -> Value {
        Value::Null
    }
}

/// Template-local variables, chained to the enclosing scope's.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Locals {
    parent: Option<Rc<Locals>>,
    values: IndexMap<String, Value>,
}

impl Locals {
    pub fn new(parent: Option<Rc<Locals>>, values: IndexMap<String, Value>) -> Self {
        Locals { parent, values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        match self.values.get(name) {
            Some(value) => Some(value),
            None => self.parent.as_ref().and_then(|p| p.get(name)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }
}

pub trait Pipe {
    fn transform(&self, value: &Value, args: &[Value]) -> Value;
}

/// Pipes available to a detector, by name.
#[derive(Clone, Default)]
pub struct Pipes {
    pipes: HashMap<String, Rc<dyn Pipe>>,
}

impl Pipes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, pipe: Rc<dyn Pipe>) {
        self.pipes.insert(name.into(), pipe);
    }

    pub fn get(&self, name: &str) -> Result<&Rc<dyn Pipe>, ChangeDetectionError> {
        self.pipes
            .get(name)
            .ok_or_else(|| ChangeDetectionError::PipeNotFound(name.to_string()))
    }
}

impl fmt::Debug for Pipes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.pipes.keys()).finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimpleChange {
    pub previous_value: Value,
    pub current_value: Value,
}

pub type SimpleChanges = IndexMap<String, SimpleChange>;

/// Receives the effects of change detection: element updates, directive
/// inputs and lifecycle calls. Owns the directive instances.
pub trait ChangeDispatcher {
    fn notify_on_binding(&mut self, target: &BindingTarget, value: &Value);

    /// Only called when binding update logging is enabled.
    fn log_binding_update(&mut self, _target: &BindingTarget, _value: &Value) {}

    fn set_directive_property(&mut self, directive: DirectiveIndex, name: &str, value: &Value);

    fn read_directive_property(&self, directive: DirectiveIndex, name: &str) -> Value;

    fn invoke_directive_method(&mut self, _directive: DirectiveIndex, _name: &str, _args: &[Value]) -> Value {
        Value::Null
    }

    fn call_lifecycle_hook(
        &mut self,
        directive: DirectiveIndex,
        event: LifecycleEvent,
        changes: Option<&SimpleChanges>,
    );

    fn notify_after_content_checked(&mut self) {}

    fn notify_after_view_checked(&mut self) {}
}

pub trait ChangeDetector {
    fn id(&self) -> &str;

    fn hydrate(&mut self, context: Rc<dyn ComponentContext>, locals: Option<Rc<Locals>>, pipes: Rc<Pipes>);

    fn dehydrate(&mut self);

    fn hydrated(&self) -> bool;

    fn detect_changes(&mut self) -> Result<(), ChangeDetectionError>;

    /// Re-evaluates every binding and fails on the first one whose value
    /// differs from the last detection. Nothing is dispatched.
    fn check_no_changes(&mut self) -> Result<(), ChangeDetectionError>;

    /// Runs the handlers bound to `event_name` on the element. Returns
    /// whether the default action should be prevented.
    fn handle_event(
        &mut self,
        event_name: &str,
        element_index: usize,
        locals: Locals,
    ) -> Result<bool, ChangeDetectionError>;

    /// Makes an OnPush detector run on the next detection.
    fn mark_for_check(&mut self);
}

type CreateDetector = dyn Fn(Box<dyn ChangeDispatcher>) -> Box<dyn ChangeDetector>;

/// Creates detectors of one scope.
#[derive(Clone)]
pub struct ChangeDetectorFactory {
    id: String,
    create: Rc<CreateDetector>,
}

impl ChangeDetectorFactory {
    pub fn new(
        id: impl Into<String>,
        create: impl Fn(Box<dyn ChangeDispatcher>) -> Box<dyn ChangeDetector> + 'static,
    ) -> Self {
        ChangeDetectorFactory {
            id: id.into(),
            create: Rc::new(create),
        }
    }

    /// A factory of interpreting detectors. The plan is built once and
    /// shared by every detector created.
    pub fn dynamic(definition: ChangeDetectorDefinition) -> Self {
        let plan = Rc::new(ProtoRecordPlan::create(&definition));
        let definition = Rc::new(definition);
        let id = definition.id.clone();
        ChangeDetectorFactory::new(id, move |dispatcher| {
            Box::new(DynamicChangeDetector::new(
                definition.clone(),
                plan.clone(),
                dispatcher,
            ))
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn create(&self, dispatcher: Box<dyn ChangeDispatcher>) -> Box<dyn ChangeDetector> {
        (self.create)(dispatcher)
    }
}

impl fmt::Debug for ChangeDetectorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeDetectorFactory")
            .field("id", &self.id)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetectorMode {
    CheckAlways,
    CheckOnce,
    Checked,
}

struct Hydration {
    context: Rc<dyn ComponentContext>,
    locals: Option<Rc<Locals>>,
    pipes: Rc<Pipes>,
}

pub struct DynamicChangeDetector {
    definition: Rc<ChangeDetectorDefinition>,
    plan: Rc<ProtoRecordPlan>,
    dispatcher: Box<dyn ChangeDispatcher>,
    hydration: Option<Hydration>,
    values: Vec<Value>,
    previous: Vec<Option<Value>>,
    changes: IndexMap<DirectiveIndex, SimpleChanges>,
    already_checked: bool,
    mode: DetectorMode,
}

impl DynamicChangeDetector {
    pub fn new(
        definition: Rc<ChangeDetectorDefinition>,
        plan: Rc<ProtoRecordPlan>,
        dispatcher: Box<dyn ChangeDispatcher>,
    ) -> Self {
        let record_count = plan.records.len();
        DynamicChangeDetector {
            definition,
            plan,
            dispatcher,
            hydration: None,
            values: vec![Value::Null; record_count],
            previous: vec![None; record_count],
            changes: IndexMap::new(),
            already_checked: false,
            mode: DetectorMode::CheckAlways,
        }
    }

    fn run(&mut self, throw_on_change: bool) -> Result<(), ChangeDetectionError> {
        if self.hydration.is_none() {
            return Err(ChangeDetectionError::Dehydrated(self.definition.id.clone()));
        }
        if self.mode == DetectorMode::Checked {
            return Ok(());
        }
        trace!("{}: detecting changes", self.definition.id);

        let plan = self.plan.clone();
        for record in &plan.records {
            if let RecordType::DirectiveLifecycle(event) = &record.mode {
                if !throw_on_change {
                    self.call_lifecycle(record, *event);
                }
            } else {
                let value = self.evaluate(record, &plan.records, None)?;
                self.values[record.self_index] = value;
                if record.last_in_binding {
                    self.check_binding(record, throw_on_change)?;
                }
            }
            if record.last_in_directive {
                if let Some(directive) = self.definition.binding_records[record.binding_index].directive_record() {
                    self.changes.shift_remove(&directive.directive_index);
                }
            }
        }

        if !throw_on_change {
            self.after_content_lifecycle();
            self.after_view_lifecycle();
            self.already_checked = true;
            if self.mode == DetectorMode::CheckOnce {
                self.mode = DetectorMode::Checked;
            }
        }
        Ok(())
    }

    fn check_binding(&mut self, record: &ProtoRecord, throw_on_change: bool) -> Result<(), ChangeDetectionError> {
        let current = self.values[record.self_index].clone();
        let previous = self.previous[record.self_index].clone();
        if previous.as_ref() == Some(&current) {
            return Ok(());
        }
        let binding = &self.definition.binding_records[record.binding_index];
        let BindingRecord::Binding {
            target,
            directive_record,
            ..
        } = binding
        else {
            return Ok(());
        };

        if throw_on_change {
            return Err(ChangeDetectionError::ExpressionChangedAfterItHasBeenChecked {
                expression: target.debug.clone(),
                previous: previous.unwrap_or(Value::Null),
                current,
            });
        }

        match (target.mode, directive_record) {
            (BindingTargetMode::Directive, Some(directive)) => {
                let name = target.name.as_deref().unwrap_or_default();
                self.dispatcher
                    .set_directive_property(directive.directive_index, name, &current);
                if directive.calls(LifecycleHooks::ON_CHANGES) {
                    self.changes
                        .entry(directive.directive_index)
                        .or_default()
                        .insert(
                            name.to_string(),
                            SimpleChange {
                                previous_value: previous.unwrap_or(Value::Null),
                                current_value: current.clone(),
                            },
                        );
                }
            }
            _ => self.dispatcher.notify_on_binding(target, &current),
        }
        if self.definition.gen_config.log_binding_update {
            self.dispatcher.log_binding_update(target, &current);
        }
        self.previous[record.self_index] = Some(current);
        Ok(())
    }

    fn call_lifecycle(&mut self, record: &ProtoRecord, event: LifecycleEvent) {
        let definition = self.definition.clone();
        let Some(directive) = lifecycle_directive(record, &definition) else {
            return;
        };
        let index = directive.directive_index;
        match event {
            LifecycleEvent::OnChanges => {
                if let Some(changes) = self.changes.shift_remove(&index) {
                    self.dispatcher
                        .call_lifecycle_hook(index, event, Some(&changes));
                }
            }
            LifecycleEvent::OnInit => {
                if !self.already_checked {
                    self.dispatcher.call_lifecycle_hook(index, event, None);
                }
            }
            _ => self.dispatcher.call_lifecycle_hook(index, event, None),
        }
    }

    fn after_content_lifecycle(&mut self) {
        self.after_lifecycle(
            (LifecycleHooks::AFTER_CONTENT_INIT, LifecycleEvent::AfterContentInit),
            (LifecycleHooks::AFTER_CONTENT_CHECKED, LifecycleEvent::AfterContentChecked),
        );
        self.dispatcher.notify_after_content_checked();
    }

    fn after_view_lifecycle(&mut self) {
        self.after_lifecycle(
            (LifecycleHooks::AFTER_VIEW_INIT, LifecycleEvent::AfterViewInit),
            (LifecycleHooks::AFTER_VIEW_CHECKED, LifecycleEvent::AfterViewChecked),
        );
        self.dispatcher.notify_after_view_checked();
    }

    /// Child directives first: reverse declaration order.
    fn after_lifecycle(
        &mut self,
        (init_hook, init_event): (LifecycleHooks, LifecycleEvent),
        (checked_hook, checked_event): (LifecycleHooks, LifecycleEvent),
    ) {
        let definition = self.definition.clone();
        for directive in definition.directive_records.iter().rev() {
            if directive.calls(init_hook) && !self.already_checked {
                self.dispatcher
                    .call_lifecycle_hook(directive.directive_index, init_event, None);
            }
            if directive.calls(checked_hook) {
                self.dispatcher
                    .call_lifecycle_hook(directive.directive_index, checked_event, None);
            }
        }
    }

    fn evaluate(
        &mut self,
        record: &ProtoRecord,
        records: &[ProtoRecord],
        event_values: Option<&[Value]>,
    ) -> Result<Value, ChangeDetectionError> {
        let values: &[Value] = event_values.unwrap_or(&self.values);
        let arg = |i: usize| values[records[i].self_index].clone();
        let args: Vec<Value> = record.args.iter().map(|&i| arg(i)).collect();
        let hydration = self
            .hydration
            .as_ref()
            .ok_or_else(|| ChangeDetectionError::Dehydrated(self.definition.id.clone()))?;

        let value = match &record.mode {
            RecordType::Const(value) => value.clone(),
            RecordType::DirectiveReceiver(index) => Value::String(index.name()),
            RecordType::Local(name) => hydration
                .locals
                .as_ref()
                .and_then(|locals| locals.get(name))
                .cloned()
                .unwrap_or(Value::Null),
            RecordType::PropertyRead(name) => match record.context {
                RecordContext::Component => hydration.context.read_property(name),
                RecordContext::Record(i) => match directive_receiver(&records[i]) {
                    Some(index) => self.dispatcher.read_directive_property(index, name),
                    None => arg(i).get(name).cloned().unwrap_or(Value::Null),
                },
            },
            RecordType::InvokeMethod(name) => match record.context {
                RecordContext::Component => hydration.context.invoke_method(name, &args),
                RecordContext::Record(i) => match directive_receiver(&records[i]) {
                    Some(index) => self.dispatcher.invoke_directive_method(index, name, &args),
                    None => {
                        return Err(ChangeDetectionError::MethodCallOnValue {
                            method: name.clone(),
                            detector: self.definition.id.clone(),
                        })
                    }
                },
            },
            RecordType::PrimitiveOp(op) => primitive_op(op, &args),
            RecordType::Interpolate(strings) => Value::String(interpolate(strings, &args)),
            RecordType::Pipe(name) => {
                let input = match record.context {
                    RecordContext::Record(i) => arg(i),
                    RecordContext::Component => Value::Null,
                };
                hydration.pipes.get(name)?.transform(&input, &args)
            }
            RecordType::DirectiveLifecycle(_) => Value::Null,
        };
        Ok(value)
    }

    fn evaluate_event(&mut self, records: &[ProtoRecord], event_locals: Locals) -> Result<Value, ChangeDetectionError> {
        let saved_locals = self.hydration.as_ref().and_then(|h| h.locals.clone());
        let locals = Locals::new(saved_locals.clone(), event_locals.values);
        if let Some(hydration) = self.hydration.as_mut() {
            hydration.locals = Some(Rc::new(locals));
        }

        let mut values = vec![Value::Null; records.len()];
        let mut result = Ok(Value::Null);
        for record in records {
            match self.evaluate(record, records, Some(&values)) {
                Ok(value) => values[record.self_index] = value,
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }

        if let Some(hydration) = self.hydration.as_mut() {
            hydration.locals = saved_locals;
        }
        result?;
        Ok(values.pop().unwrap_or(Value::Null))
    }
}

fn directive_receiver(record: &ProtoRecord) -> Option<DirectiveIndex> {
    match record.mode {
        RecordType::DirectiveReceiver(index) => Some(index),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::Number(Number::from(value as i64))
    } else {
        Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}

fn primitive_op(op: &PrimitiveOp, args: &[Value]) -> Value {
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Null);
    match op {
        PrimitiveOp::Not => Value::Bool(!is_truthy(&arg(0))),
        PrimitiveOp::Conditional => {
            if is_truthy(&arg(0)) {
                arg(1)
            } else {
                arg(2)
            }
        }
        PrimitiveOp::Binary(operation) => {
            let (left, right) = (arg(0), arg(1));
            match operation {
                BinaryOperator::Plus => match (left.as_f64(), right.as_f64()) {
                    (Some(l), Some(r)) => number(l + r),
                    _ => Value::String(format!("{}{}", stringify(&left), stringify(&right))),
                },
                BinaryOperator::Minus => match (left.as_f64(), right.as_f64()) {
                    (Some(l), Some(r)) => number(l - r),
                    _ => Value::Null,
                },
                BinaryOperator::Equals => Value::Bool(left == right),
                BinaryOperator::NotEquals => Value::Bool(left != right),
                BinaryOperator::And => {
                    if is_truthy(&left) {
                        right
                    } else {
                        left
                    }
                }
                BinaryOperator::Or => {
                    if is_truthy(&left) {
                        left
                    } else {
                        right
                    }
                }
            }
        }
    }
}

fn interpolate(strings: &[String], values: &[Value]) -> String {
    let mut result = String::new();
    for (i, s) in strings.iter().enumerate() {
        result.push_str(s);
        if let Some(value) = values.get(i) {
            result.push_str(&stringify(value));
        }
    }
    result
}

impl ChangeDetector for DynamicChangeDetector {
    fn id(&self) -> &str {
        &self.definition.id
    }

    fn hydrate(&mut self, context: Rc<dyn ComponentContext>, locals: Option<Rc<Locals>>, pipes: Rc<Pipes>) {
        self.hydration = Some(Hydration {
            context,
            locals,
            pipes,
        });
        self.mode = match self.definition.strategy {
            ChangeDetectionStrategy::Default => DetectorMode::CheckAlways,
            ChangeDetectionStrategy::OnPush => DetectorMode::CheckOnce,
        };
        self.already_checked = false;
    }

    fn dehydrate(&mut self) {
        self.hydration = None;
        self.values.iter_mut().for_each(|v| *v = Value::Null);
        self.previous.iter_mut().for_each(|v| *v = None);
        self.changes.clear();
    }

    fn hydrated(&self) -> bool {
        self.hydration.is_some()
    }

    fn detect_changes(&mut self) -> Result<(), ChangeDetectionError> {
        self.run(false)
    }

    fn check_no_changes(&mut self) -> Result<(), ChangeDetectionError> {
        self.run(true)
    }

    fn handle_event(
        &mut self,
        event_name: &str,
        element_index: usize,
        locals: Locals,
    ) -> Result<bool, ChangeDetectionError> {
        if self.hydration.is_none() {
            return Err(ChangeDetectionError::Dehydrated(self.definition.id.clone()));
        }
        let plan = self.plan.clone();
        let mut prevent_default = false;
        for binding in plan
            .event_bindings
            .iter()
            .filter(|b| b.event_name == event_name && b.element_index == element_index)
        {
            let result = self.evaluate_event(&binding.records, locals.clone())?;
            if result == Value::Bool(false) {
                prevent_default = true;
            }
        }
        Ok(prevent_default)
    }

    fn mark_for_check(&mut self) {
        if self.mode == DetectorMode::Checked {
            self.mode = DetectorMode::CheckOnce;
        }
    }
}
