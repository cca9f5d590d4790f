//! Change detector definitions: the bindings of one scope, before they
//! are compiled into a detector.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ChangeDetectorGenConfig;
use crate::core::{ChangeDetectionStrategy, LifecycleHooks};
use crate::expression_parser::AstWithSource;

/// A directive of a scope: the bound element it sits on and its position
/// among that element's directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectiveIndex {
    pub element_index: usize,
    pub directive_index: usize,
}

impl DirectiveIndex {
    pub fn new(element_index: usize, directive_index: usize) -> Self {
        DirectiveIndex {
            element_index,
            directive_index,
        }
    }

    /// Name used for the directive's slot in generated code.
    pub fn name(&self) -> String {
        format!("{}_{}", self.element_index, self.directive_index)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectiveRecord {
    pub directive_index: DirectiveIndex,
    pub lifecycle_hooks: LifecycleHooks,
    pub change_detection: ChangeDetectionStrategy,
}

impl DirectiveRecord {
    pub fn calls(&self, hook: LifecycleHooks) -> bool {
        self.lifecycle_hooks.contains(hook)
    }

    pub fn is_default_change_detection(&self) -> bool {
        self.change_detection.is_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingTargetMode {
    ElementProperty,
    ElementAttribute,
    ElementClass,
    ElementStyle,
    TextNode,
    Directive,
    Event,
    HostEvent,
}

impl BindingTargetMode {
    pub fn as_str(self) -> &'static str {
        match self {
            BindingTargetMode::ElementProperty => "elementProperty",
            BindingTargetMode::ElementAttribute => "elementAttribute",
            BindingTargetMode::ElementClass => "elementClass",
            BindingTargetMode::ElementStyle => "elementStyle",
            BindingTargetMode::TextNode => "textNode",
            BindingTargetMode::Directive => "directive",
            BindingTargetMode::Event => "event",
            BindingTargetMode::HostEvent => "hostEvent",
        }
    }
}

/// Where a binding's value goes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindingTarget {
    pub mode: BindingTargetMode,
    /// Bound element index; node index for text nodes.
    pub element_index: usize,
    pub name: Option<String>,
    pub unit: Option<String>,
    /// Source of the bound expression.
    pub debug: String,
}

impl fmt::Display for BindingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.mode.as_str(), self.element_index)?;
        if let Some(name) = &self.name {
            write!(f, ".{}", name)?;
        }
        if let Some(unit) = &self.unit {
            write!(f, ".{}", unit)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    OnChanges,
    OnInit,
    DoCheck,
    AfterContentInit,
    AfterContentChecked,
    AfterViewInit,
    AfterViewChecked,
}

impl LifecycleEvent {
    /// Method name on the directive instance.
    pub fn method_name(self) -> &'static str {
        match self {
            LifecycleEvent::OnChanges => "onChanges",
            LifecycleEvent::OnInit => "onInit",
            LifecycleEvent::DoCheck => "doCheck",
            LifecycleEvent::AfterContentInit => "afterContentInit",
            LifecycleEvent::AfterContentChecked => "afterContentChecked",
            LifecycleEvent::AfterViewInit => "afterViewInit",
            LifecycleEvent::AfterViewChecked => "afterViewChecked",
        }
    }
}

/// What a binding's expression is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImplicitReceiver {
    Context,
    Directive(DirectiveIndex),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BindingRecord {
    /// An expression whose changes are written to `target`.
    Binding {
        target: BindingTarget,
        implicit_receiver: ImplicitReceiver,
        ast: AstWithSource,
        /// Set for directive inputs.
        directive_record: Option<DirectiveRecord>,
    },
    /// A lifecycle call made while walking the bindings.
    DirectiveLifecycle {
        event: LifecycleEvent,
        directive_record: DirectiveRecord,
    },
}

impl BindingRecord {
    pub fn for_element_property(ast: AstWithSource, element_index: usize, name: &str) -> Self {
        Self::native(BindingTargetMode::ElementProperty, ast, element_index, Some(name), None, ImplicitReceiver::Context)
    }

    pub fn for_element_attribute(ast: AstWithSource, element_index: usize, name: &str) -> Self {
        Self::native(BindingTargetMode::ElementAttribute, ast, element_index, Some(name), None, ImplicitReceiver::Context)
    }

    pub fn for_element_class(ast: AstWithSource, element_index: usize, name: &str) -> Self {
        Self::native(BindingTargetMode::ElementClass, ast, element_index, Some(name), None, ImplicitReceiver::Context)
    }

    pub fn for_element_style(ast: AstWithSource, element_index: usize, name: &str, unit: Option<&str>) -> Self {
        Self::native(BindingTargetMode::ElementStyle, ast, element_index, Some(name), unit, ImplicitReceiver::Context)
    }

    pub fn for_host_binding(
        mode: BindingTargetMode,
        directive_index: DirectiveIndex,
        ast: AstWithSource,
        name: &str,
        unit: Option<&str>,
    ) -> Self {
        Self::native(
            mode,
            ast,
            directive_index.element_index,
            Some(name),
            unit,
            ImplicitReceiver::Directive(directive_index),
        )
    }

    pub fn for_text_node(ast: AstWithSource, node_index: usize) -> Self {
        Self::native(BindingTargetMode::TextNode, ast, node_index, None, None, ImplicitReceiver::Context)
    }

    pub fn for_directive(ast: AstWithSource, property_name: &str, directive_record: &DirectiveRecord) -> Self {
        let target = BindingTarget {
            mode: BindingTargetMode::Directive,
            element_index: directive_record.directive_index.element_index,
            name: Some(property_name.to_string()),
            unit: None,
            debug: ast.source.clone(),
        };
        BindingRecord::Binding {
            target,
            implicit_receiver: ImplicitReceiver::Context,
            ast,
            directive_record: Some(directive_record.clone()),
        }
    }

    pub fn for_event(ast: AstWithSource, event_name: &str, element_index: usize) -> Self {
        Self::native(BindingTargetMode::Event, ast, element_index, Some(event_name), None, ImplicitReceiver::Context)
    }

    pub fn for_host_event(ast: AstWithSource, event_name: &str, directive_record: &DirectiveRecord) -> Self {
        let directive_index = directive_record.directive_index;
        let target = BindingTarget {
            mode: BindingTargetMode::HostEvent,
            element_index: directive_index.element_index,
            name: Some(event_name.to_string()),
            unit: None,
            debug: ast.source.clone(),
        };
        BindingRecord::Binding {
            target,
            implicit_receiver: ImplicitReceiver::Directive(directive_index),
            ast,
            directive_record: Some(directive_record.clone()),
        }
    }

    pub fn lifecycle(event: LifecycleEvent, directive_record: &DirectiveRecord) -> Self {
        BindingRecord::DirectiveLifecycle {
            event,
            directive_record: directive_record.clone(),
        }
    }

    fn native(
        mode: BindingTargetMode,
        ast: AstWithSource,
        element_index: usize,
        name: Option<&str>,
        unit: Option<&str>,
        implicit_receiver: ImplicitReceiver,
    ) -> Self {
        let target = BindingTarget {
            mode,
            element_index,
            name: name.map(str::to_string),
            unit: unit.map(str::to_string),
            debug: ast.source.clone(),
        };
        BindingRecord::Binding {
            target,
            implicit_receiver,
            ast,
            directive_record: None,
        }
    }

    pub fn target(&self) -> Option<&BindingTarget> {
        match self {
            BindingRecord::Binding { target, .. } => Some(target),
            BindingRecord::DirectiveLifecycle { .. } => None,
        }
    }

    pub fn directive_record(&self) -> Option<&DirectiveRecord> {
        match self {
            BindingRecord::Binding {
                directive_record, ..
            } => directive_record.as_ref(),
            BindingRecord::DirectiveLifecycle {
                directive_record, ..
            } => Some(directive_record),
        }
    }
}

/// The bindings of one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeDetectorDefinition {
    /// `cd<N>`, N being the scope's pre-order position (root is 0).
    pub id: String,
    pub strategy: ChangeDetectionStrategy,
    /// Locals visible in this scope, including those of enclosing scopes.
    pub variable_names: Vec<String>,
    pub binding_records: Vec<BindingRecord>,
    pub event_records: Vec<BindingRecord>,
    pub directive_records: Vec<DirectiveRecord>,
    pub gen_config: ChangeDetectorGenConfig,
}
