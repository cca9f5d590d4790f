//! Change Detector Code Generation
//!
//! Renders a [`ProtoRecordPlan`] as the source of a detector class that
//! extends the runtime's `AbstractChangeDetector`.

use super::definition::{
    BindingRecord, BindingTarget, BindingTargetMode, ChangeDetectorDefinition, DirectiveRecord,
    LifecycleEvent,
};
use super::proto_record::{
    lifecycle_directive, PrimitiveOp, ProtoRecord, ProtoRecordPlan, RecordContext, RecordType,
};
use crate::core::LifecycleHooks;
use crate::source_module::module_ref;
use crate::util::{codegen_value_fn, escape_double_quote_string, sanitize_identifier};

pub const UTIL_MODULE: &str = "angular2/src/core/change_detection/change_detection_util";
pub const ABSTRACT_CHANGE_DETECTOR_MODULE: &str =
    "angular2/src/core/change_detection/abstract_change_detector";

fn util() -> String {
    format!("{}ChangeDetectionUtil", module_ref(UTIL_MODULE))
}

fn abstract_change_detector() -> String {
    format!(
        "{}AbstractChangeDetector",
        module_ref(ABSTRACT_CHANGE_DETECTOR_MODULE)
    )
}

/// Class name of the detector for scope `view_index` of a component.
pub fn change_detector_class_name(component_name: &str, view_index: usize) -> String {
    format!(
        "ChangeDetector_{}_{}",
        sanitize_identifier(component_name),
        view_index
    )
}

/// `function(dispatcher) { return new <class>(dispatcher); }`
pub fn change_detector_factory_expression(class_name: &str) -> String {
    codegen_value_fn(&["dispatcher"], &format!("new {}(dispatcher)", class_name))
}

fn string_literal(value: &str) -> String {
    escape_double_quote_string(value)
}

fn optional_literal(value: Option<&str>) -> String {
    value.map_or_else(|| "null".to_string(), string_literal)
}

fn binding_target_expression(target: &BindingTarget) -> String {
    format!(
        "{}.bindingTarget({}, {}, {}, {}, {})",
        util(),
        string_literal(target.mode.as_str()),
        target.element_index,
        optional_literal(target.name.as_deref()),
        optional_literal(target.unit.as_deref()),
        string_literal(&target.debug)
    )
}

/// Names of the locals and fields holding record values.
struct NameUtil<'a> {
    records: &'a [ProtoRecord],
    prefix: &'a str,
}

impl NameUtil<'_> {
    fn base_name(record: &ProtoRecord) -> String {
        let name = match &record.mode {
            RecordType::Const(_) => "literal",
            RecordType::DirectiveReceiver(_) => "directive",
            RecordType::PropertyRead(name)
            | RecordType::Local(name)
            | RecordType::InvokeMethod(name)
            | RecordType::Pipe(name) => name.as_str(),
            RecordType::PrimitiveOp(_) => "operation",
            RecordType::Interpolate(_) => "interpolate",
            RecordType::DirectiveLifecycle(_) => "lifecycle",
        };
        sanitize_identifier(name)
    }

    fn local(&self, index: usize) -> String {
        let record = &self.records[index];
        format!("l_{}{}{}", self.prefix, Self::base_name(record), record.self_index)
    }

    fn field(&self, index: usize) -> String {
        let record = &self.records[index];
        format!("this.{}{}", Self::base_name(record), record.self_index)
    }

    fn all_locals(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| !r.is_lifecycle())
            .map(|r| self.local(r.self_index))
            .collect()
    }
}

fn directive_field(directive: &DirectiveRecord) -> String {
    format!("this.directive_{}", directive.directive_index.name())
}

/// Generates the class of one definition.
pub struct ChangeDetectorJitGenerator<'a> {
    definition: &'a ChangeDetectorDefinition,
    plan: ProtoRecordPlan,
    class_name: String,
}

impl<'a> ChangeDetectorJitGenerator<'a> {
    pub fn new(definition: &'a ChangeDetectorDefinition, class_name: impl Into<String>) -> Self {
        ChangeDetectorJitGenerator {
            definition,
            plan: ProtoRecordPlan::create(definition),
            class_name: class_name.into(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn generate_source(&self) -> String {
        let name = &self.class_name;
        let base = abstract_change_detector();
        [
            format!(
                "var {name} = function {name}(dispatcher) {{\n  {base}.call(this, {id}, dispatcher, {count}, {name}.gen_propertyBindingTargets, {name}.gen_directiveIndices, {strategy});\n  this.dehydrateDirectives(false);\n}}",
                id = string_literal(&self.definition.id),
                count = self.plan.records.len(),
                strategy = string_literal(&format!("{:?}", self.definition.strategy)),
            ),
            format!("{name}.prototype = Object.create({base}.prototype);"),
            self.gen_detect_changes(),
            self.gen_handle_event(),
            self.gen_after_callbacks(
                "afterContentLifecycleCallbacksInternal",
                (LifecycleHooks::AFTER_CONTENT_INIT, LifecycleEvent::AfterContentInit),
                (LifecycleHooks::AFTER_CONTENT_CHECKED, LifecycleEvent::AfterContentChecked),
                "notifyAfterContentChecked",
            ),
            self.gen_after_callbacks(
                "afterViewLifecycleCallbacksInternal",
                (LifecycleHooks::AFTER_VIEW_INIT, LifecycleEvent::AfterViewInit),
                (LifecycleHooks::AFTER_VIEW_CHECKED, LifecycleEvent::AfterViewChecked),
                "notifyAfterViewChecked",
            ),
            self.gen_hydrate_directives(),
            self.gen_dehydrate_directives(),
            format!(
                "{name}.gen_propertyBindingTargets = [{}];",
                self.plan
                    .binding_targets(self.definition)
                    .into_iter()
                    .map(binding_target_expression)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            format!(
                "{name}.gen_directiveIndices = [{}];",
                self.definition
                    .directive_records
                    .iter()
                    .map(|d| format!(
                        "{}.directiveIndex({}, {})",
                        util(),
                        d.directive_index.element_index,
                        d.directive_index.directive_index
                    ))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        ]
        .join("\n\n")
    }

    fn gen_detect_changes(&self) -> String {
        let names = NameUtil {
            records: &self.plan.records,
            prefix: "",
        };
        let mut declarations = vec!["l_context = this.context".to_string(), "changes = null".to_string()];
        declarations.extend(names.all_locals());

        let mut body = Vec::new();
        let mut binding_target_index = 0;
        for record in &self.plan.records {
            if let RecordType::DirectiveLifecycle(event) = &record.mode {
                body.push(self.gen_lifecycle(record, *event));
            } else {
                body.push(format!(
                    "{} = {};",
                    names.local(record.self_index),
                    gen_record_expression(record, &names, "this.locals")
                ));
                if record.last_in_binding {
                    body.push(self.gen_change_check(record, &names, binding_target_index));
                    binding_target_index += 1;
                }
            }
            if record.last_in_directive {
                body.push("changes = null;".to_string());
            }
        }
        body.push("this.alreadyChecked = true;".to_string());

        let mut statements = body.join("\n");
        if self.definition.gen_config.gen_debug_info {
            statements = format!(
                "try {{\n{}\n}} catch (e) {{\nthis.throwDebugInfo(e, this.propertyBindingIndex);\nthrow e;\n}}",
                statements
            );
        }
        format!(
            "{}.prototype.detectChangesInRecordsInternal = function(throwOnChange) {{\nvar {};\n{}\n}}",
            self.class_name,
            declarations.join(", "),
            statements
        )
    }

    fn gen_change_check(&self, record: &ProtoRecord, names: &NameUtil<'_>, target_index: usize) -> String {
        let local = names.local(record.self_index);
        let field = names.field(record.self_index);
        let BindingRecord::Binding {
            target,
            directive_record,
            ..
        } = &self.definition.binding_records[record.binding_index]
        else {
            return String::new();
        };

        let mut update = vec![format!("this.propertyBindingIndex = {};", target_index)];
        match (target.mode, directive_record) {
            (BindingTargetMode::Directive, Some(directive)) => {
                let name = target.name.as_deref().unwrap_or_default();
                update.push(format!("{}.{} = {};", directive_field(directive), name, local));
                if directive.calls(LifecycleHooks::ON_CHANGES) {
                    update.push(format!(
                        "changes = {util}.addChange(changes, {}, {util}.simpleChange({}, {}));",
                        string_literal(name),
                        field,
                        local,
                        util = util()
                    ));
                }
            }
            _ => update.push(format!("this.notifyDispatcher({});", local)),
        }
        if self.definition.gen_config.log_binding_update {
            update.push(format!("this.logBindingUpdate({});", local));
        }
        update.push(format!("{} = {};", field, local));

        format!(
            "if ({}.looseNotIdentical({}, {})) {{\nif (throwOnChange) this.throwOnChangeError({}, {});\n{}\n}}",
            util(),
            local,
            field,
            field,
            local,
            update.join("\n")
        )
    }

    fn gen_lifecycle(&self, record: &ProtoRecord, event: LifecycleEvent) -> String {
        let Some(directive) = lifecycle_directive(record, self.definition) else {
            return String::new();
        };
        let directive = directive_field(directive);
        match event {
            LifecycleEvent::OnChanges => format!(
                "if (!throwOnChange && changes !== null) {}.{}(changes);",
                directive,
                event.method_name()
            ),
            LifecycleEvent::OnInit => format!(
                "if (!throwOnChange && !this.alreadyChecked) {}.{}();",
                directive,
                event.method_name()
            ),
            _ => format!("if (!throwOnChange) {}.{}();", directive, event.method_name()),
        }
    }

    fn gen_handle_event(&self) -> String {
        let handlers: Vec<String> = self
            .plan
            .event_bindings
            .iter()
            .map(|binding| {
                let names = NameUtil {
                    records: &binding.records,
                    prefix: "e_",
                };
                let statements: Vec<String> = binding
                    .records
                    .iter()
                    .map(|r| {
                        format!(
                            "var {} = {};",
                            names.local(r.self_index),
                            gen_record_expression(r, &names, "locals")
                        )
                    })
                    .collect();
                let result = binding
                    .records
                    .last()
                    .map(|r| format!("\nif ({} === false) {{ preventDefault = true; }}", names.local(r.self_index)))
                    .unwrap_or_default();
                format!(
                    "if (eventName === {} && elIndex === {}) {{\n{}{}\n}}",
                    string_literal(&binding.event_name),
                    binding.element_index,
                    statements.join("\n"),
                    result
                )
            })
            .collect();
        format!(
            "{}.prototype.handleEventInternal = function(eventName, elIndex, locals) {{\nvar l_context = this.context;\nvar preventDefault = false;\n{}\nreturn preventDefault;\n}}",
            self.class_name,
            handlers.join("\n")
        )
    }

    fn gen_after_callbacks(
        &self,
        method: &str,
        (init_hook, init_event): (LifecycleHooks, LifecycleEvent),
        (checked_hook, checked_event): (LifecycleHooks, LifecycleEvent),
        notify: &str,
    ) -> String {
        let mut statements = Vec::new();
        for directive in self.definition.directive_records.iter().rev() {
            let field = directive_field(directive);
            if directive.calls(init_hook) {
                statements.push(format!(
                    "if (!this.alreadyChecked) {}.{}();",
                    field,
                    init_event.method_name()
                ));
            }
            if directive.calls(checked_hook) {
                statements.push(format!("{}.{}();", field, checked_event.method_name()));
            }
        }
        statements.push(format!("this.dispatcher.{}();", notify));
        format!(
            "{}.prototype.{} = function() {{\n{}\n}}",
            self.class_name,
            method,
            statements.join("\n")
        )
    }

    fn gen_hydrate_directives(&self) -> String {
        let statements: Vec<String> = self
            .definition
            .directive_records
            .iter()
            .enumerate()
            .map(|(i, directive)| {
                format!(
                    "{} = directives.getDirectiveFor(this.directiveIndices[{}]);",
                    directive_field(directive),
                    i
                )
            })
            .collect();
        format!(
            "{}.prototype.hydrateDirectives = function(directives) {{\n{}\n}}",
            self.class_name,
            statements.join("\n")
        )
    }

    fn gen_dehydrate_directives(&self) -> String {
        let names = NameUtil {
            records: &self.plan.records,
            prefix: "",
        };
        let mut fields: Vec<String> = self
            .definition
            .directive_records
            .iter()
            .map(directive_field)
            .collect();
        fields.extend(
            self.plan
                .records
                .iter()
                .filter(|r| r.last_in_binding && !r.is_lifecycle())
                .map(|r| names.field(r.self_index)),
        );
        let reset = if fields.is_empty() {
            String::new()
        } else {
            format!("{} = {}.uninitialized;", fields.join(" = "), util())
        };
        format!(
            "{}.prototype.dehydrateDirectives = function(destroyPipes) {{\n{}\n}}",
            self.class_name, reset
        )
    }
}

fn gen_record_expression(record: &ProtoRecord, names: &NameUtil<'_>, locals: &str) -> String {
    let arg = |i: usize| names.local(record.args[i]);
    let args = || {
        (0..record.args.len())
            .map(arg)
            .collect::<Vec<_>>()
            .join(", ")
    };
    let receiver = match record.context {
        RecordContext::Component => "l_context".to_string(),
        RecordContext::Record(i) => names.local(i),
    };
    match &record.mode {
        RecordType::Const(value) => value.to_string(),
        RecordType::DirectiveReceiver(index) => format!("this.directive_{}", index.name()),
        RecordType::Local(name) => format!("{}.get({})", locals, string_literal(name)),
        RecordType::PropertyRead(name) => format!("{}.{}", receiver, name),
        RecordType::InvokeMethod(name) => format!("{}.{}({})", receiver, name, args()),
        RecordType::PrimitiveOp(PrimitiveOp::Not) => format!("!{}", arg(0)),
        RecordType::PrimitiveOp(PrimitiveOp::Conditional) => {
            format!("{} ? {} : {}", arg(0), arg(1), arg(2))
        }
        RecordType::PrimitiveOp(PrimitiveOp::Binary(operation)) => {
            format!("{} {} {}", arg(0), operation.as_str(), arg(1))
        }
        RecordType::Interpolate(strings) => {
            let mut parts = Vec::new();
            for (i, s) in strings.iter().enumerate() {
                parts.push(string_literal(s));
                if i < record.args.len() {
                    parts.push(format!("{}.s({})", util(), arg(i)));
                }
            }
            parts.join(" + ")
        }
        RecordType::Pipe(name) => format!(
            "this.pipes.get({}).transform({}, [{}])",
            string_literal(name),
            receiver,
            args()
        ),
        RecordType::DirectiveLifecycle(_) => "null".to_string(),
    }
}
