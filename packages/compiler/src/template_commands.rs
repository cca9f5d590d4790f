//! Template Commands
//!
//! The render command tree of a compiled template, and the compiled
//! template itself. Commands are generic over how a nested component
//! template and a change detector factory are referenced, so the same
//! tree shape serves the compiler's neutral plan and the runtime output.

use once_cell::unsync::OnceCell;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::change_detection::ChangeDetectorFactory;
use crate::directive_metadata::CompileTypeMetadata;
use crate::error::{CompileError, Result};

/// Reference to the compiled template of a component, by component id.
/// Resolved through a [`TemplateRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateHandle(pub i32);

/// Local variable value: `%implicit` (the element), a directive index, or
/// a named value of an embedded template's context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableSource {
    Implicit,
    Directive(usize),
    Name(String),
}

pub const IMPLICIT_TEMPLATE_VAR: &str = "%implicit";

impl fmt::Display for VariableSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableSource::Implicit => f.write_str(IMPLICIT_TEMPLATE_VAR),
            VariableSource::Directive(index) => write!(f, "{}", index),
            VariableSource::Name(name) => f.write_str(name),
        }
    }
}

pub type AttrList = SmallVec<[(String, String); 4]>;
/// `(global target, event name)`.
pub type EventList = SmallVec<[(Option<String>, String); 2]>;

#[derive(Debug, Clone, PartialEq)]
pub struct TextCmd {
    /// `None` for interpolated text, whose value comes from a binding.
    pub value: Option<String>,
    pub is_bound: bool,
    pub ng_content_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NgContentCmd {
    pub ng_content_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BeginElementCmd {
    pub name: String,
    pub attrs: AttrList,
    pub events: EventList,
    pub variables: Vec<(String, VariableSource)>,
    pub directives: Vec<CompileTypeMetadata>,
    pub is_bound: bool,
    pub ng_content_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BeginComponentCmd<C = TemplateHandle> {
    pub name: String,
    pub attrs: AttrList,
    pub events: EventList,
    pub variables: Vec<(String, VariableSource)>,
    pub directives: Vec<CompileTypeMetadata>,
    pub native_shadow: bool,
    pub ng_content_index: Option<usize>,
    pub template: C,
}

#[derive(Debug, Clone)]
pub struct EmbeddedTemplateCmd<C = TemplateHandle, F = ChangeDetectorFactory> {
    pub attrs: AttrList,
    pub variables: Vec<(String, String)>,
    pub directives: Vec<CompileTypeMetadata>,
    /// The template contains projection points and is merged into its
    /// parent view.
    pub is_merged: bool,
    pub ng_content_index: Option<usize>,
    pub change_detector_factory: F,
    pub children: Vec<TemplateCmd<C, F>>,
}

#[derive(Debug, Clone)]
pub enum TemplateCmd<C = TemplateHandle, F = ChangeDetectorFactory> {
    Text(TextCmd),
    NgContent(NgContentCmd),
    BeginElement(BeginElementCmd),
    EndElement,
    BeginComponent(BeginComponentCmd<C>),
    EndComponent,
    EmbeddedTemplate(EmbeddedTemplateCmd<C, F>),
}

impl<C, F> TemplateCmd<C, F> {
    /// Rebuilds the tree with the component and factory references mapped.
    pub fn try_map<C2, F2, E>(
        self,
        map_component: &mut impl FnMut(C) -> std::result::Result<C2, E>,
        map_factory: &mut impl FnMut(F) -> std::result::Result<F2, E>,
    ) -> std::result::Result<TemplateCmd<C2, F2>, E> {
        Ok(match self {
            TemplateCmd::Text(cmd) => TemplateCmd::Text(cmd),
            TemplateCmd::NgContent(cmd) => TemplateCmd::NgContent(cmd),
            TemplateCmd::BeginElement(cmd) => TemplateCmd::BeginElement(cmd),
            TemplateCmd::EndElement => TemplateCmd::EndElement,
            TemplateCmd::EndComponent => TemplateCmd::EndComponent,
            TemplateCmd::BeginComponent(cmd) => TemplateCmd::BeginComponent(BeginComponentCmd {
                name: cmd.name,
                attrs: cmd.attrs,
                events: cmd.events,
                variables: cmd.variables,
                directives: cmd.directives,
                native_shadow: cmd.native_shadow,
                ng_content_index: cmd.ng_content_index,
                template: map_component(cmd.template)?,
            }),
            TemplateCmd::EmbeddedTemplate(cmd) => {
                let children = cmd
                    .children
                    .into_iter()
                    .map(|child| child.try_map(&mut *map_component, &mut *map_factory))
                    .collect::<std::result::Result<Vec<_>, E>>()?;
                TemplateCmd::EmbeddedTemplate(EmbeddedTemplateCmd {
                    attrs: cmd.attrs,
                    variables: cmd.variables,
                    directives: cmd.directives,
                    is_merged: cmd.is_merged,
                    ng_content_index: cmd.ng_content_index,
                    change_detector_factory: map_factory(cmd.change_detector_factory)?,
                    children,
                })
            }
        })
    }
}

pub trait CommandVisitor<C = TemplateHandle, F = ChangeDetectorFactory> {
    fn visit_text(&mut self, cmd: &TextCmd);
    fn visit_ng_content(&mut self, cmd: &NgContentCmd);
    fn visit_begin_element(&mut self, cmd: &BeginElementCmd);
    fn visit_end_element(&mut self);
    fn visit_begin_component(&mut self, cmd: &BeginComponentCmd<C>);
    fn visit_end_component(&mut self);
    fn visit_embedded_template(&mut self, cmd: &EmbeddedTemplateCmd<C, F>);
}

pub fn visit_all_commands<C, F>(visitor: &mut dyn CommandVisitor<C, F>, cmds: &[TemplateCmd<C, F>]) {
    for cmd in cmds {
        match cmd {
            TemplateCmd::Text(cmd) => visitor.visit_text(cmd),
            TemplateCmd::NgContent(cmd) => visitor.visit_ng_content(cmd),
            TemplateCmd::BeginElement(cmd) => visitor.visit_begin_element(cmd),
            TemplateCmd::EndElement => visitor.visit_end_element(),
            TemplateCmd::BeginComponent(cmd) => visitor.visit_begin_component(cmd),
            TemplateCmd::EndComponent => visitor.visit_end_component(),
            TemplateCmd::EmbeddedTemplate(cmd) => visitor.visit_embedded_template(cmd),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledTemplateData {
    pub change_detector_factory: ChangeDetectorFactory,
    pub commands: Vec<TemplateCmd>,
    pub styles: Vec<String>,
}

/// The compiled template of one component. Created empty so recursive
/// references can point at it; its data is set exactly once.
#[derive(Debug)]
pub struct CompiledTemplate {
    pub id: i32,
    data: OnceCell<CompiledTemplateData>,
}

impl CompiledTemplate {
    pub fn new(id: i32) -> Self {
        CompiledTemplate {
            id,
            data: OnceCell::new(),
        }
    }

    pub fn handle(&self) -> TemplateHandle {
        TemplateHandle(self.id)
    }

    pub fn init(&self, data: CompiledTemplateData) -> Result<()> {
        self.data.set(data).map_err(|_| {
            CompileError::Internal(format!("Template {} was already compiled", self.id))
        })
    }

    pub fn data(&self) -> Option<&CompiledTemplateData> {
        self.data.get()
    }

    pub fn is_compiled(&self) -> bool {
        self.data.get().is_some()
    }
}

/// The compiled templates of one compilation unit.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: RefCell<HashMap<i32, Rc<CompiledTemplate>>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The template of `id`, created if absent. The flag tells whether it
    /// was created by this call.
    pub fn get_or_create(&self, id: i32) -> (Rc<CompiledTemplate>, bool) {
        let mut templates = self.templates.borrow_mut();
        if let Some(template) = templates.get(&id) {
            return (template.clone(), false);
        }
        let template = Rc::new(CompiledTemplate::new(id));
        templates.insert(id, template.clone());
        (template, true)
    }

    pub fn get(&self, handle: TemplateHandle) -> Option<Rc<CompiledTemplate>> {
        self.templates.borrow().get(&handle.0).cloned()
    }

    pub fn len(&self) -> usize {
        self.templates.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.templates.borrow_mut().clear();
    }
}
