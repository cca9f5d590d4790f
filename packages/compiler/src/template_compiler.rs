//! Template Compiler
//!
//! Orchestrates normalization, parsing and the style, command and change
//! detection compilers into one [`CompiledTemplate`] per component.
//! Compilations are memoized by component id; the template object is
//! registered before its children are compiled, so recursive component
//! graphs resolve to a handle instead of re-entering compilation.

use futures::future::{self, FutureExt, LocalBoxFuture, Shared};
use log::{debug, trace};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use crate::change_detector_compiler::ChangeDetectionCompiler;
use crate::command_compiler::{CommandCompiler, TEMPLATE_COMMANDS_MODULE};
use crate::config::CompilerConfig;
use crate::directive_metadata::{
    create_host_component_meta, CompileDirectiveMetadata, CompileTypeMetadata,
};
use crate::error::{CompileError, Result};
use crate::source_module::{module_ref, SourceExpression, SourceModule};
use crate::style_compiler::StyleCompiler;
use crate::template_commands::{
    CompiledTemplate, CompiledTemplateData, TemplateHandle, TemplateRegistry,
};
use crate::template_normalizer::TemplateNormalizer;
use crate::template_parser::TemplateParser;
use crate::util::{codegen_export_variable, codegen_value_fn};

/// Directive discovery: metadata by type id.
pub trait DirectiveResolver {
    fn get_metadata(&self, type_id: i32) -> Result<CompileDirectiveMetadata>;

    /// Directives usable in the template of the component `type_id`.
    fn get_view_directives_metadata(&self, type_id: i32) -> Result<Vec<CompileDirectiveMetadata>>;
}

/// A normalized component with the normalized directives of its view.
#[derive(Debug, Clone)]
pub struct NormalizedComponentWithViewDirectives {
    pub component: Rc<CompileDirectiveMetadata>,
    pub directives: Vec<Rc<CompileDirectiveMetadata>>,
}

type SharedTemplate = Shared<LocalBoxFuture<'static, Result<Rc<CompiledTemplate>>>>;

pub fn template_variable_name(type_: &CompileTypeMetadata) -> String {
    format!("{}Template", type_.name)
}

pub fn template_module_name(module_id: &str) -> String {
    format!("{}.template", module_id)
}

fn assert_component(meta: &CompileDirectiveMetadata) -> Result<()> {
    if meta.is_component {
        Ok(())
    } else {
        Err(CompileError::Internal(format!(
            "Could not compile '{}' because it is not a component.",
            meta.type_.name
        )))
    }
}

/// Cheap to clone; clones share all caches.
#[derive(Clone)]
pub struct TemplateCompiler {
    inner: Rc<TemplateCompilerInner>,
}

struct TemplateCompilerInner {
    resolver: Rc<dyn DirectiveResolver>,
    template_normalizer: TemplateNormalizer,
    template_parser: Rc<dyn TemplateParser>,
    style_compiler: StyleCompiler,
    command_compiler: CommandCompiler,
    cd_compiler: ChangeDetectionCompiler,
    registry: TemplateRegistry,
    done: RefCell<HashMap<i32, SharedTemplate>>,
    /// Component id -> ids of the nested templates its pending compilation
    /// waits for. Kept acyclic.
    awaiting: RefCell<HashMap<i32, Vec<i32>>>,
}

impl TemplateCompiler {
    pub fn new(
        resolver: Rc<dyn DirectiveResolver>,
        template_normalizer: TemplateNormalizer,
        template_parser: Rc<dyn TemplateParser>,
        style_compiler: StyleCompiler,
        config: &CompilerConfig,
    ) -> Self {
        TemplateCompiler {
            inner: Rc::new(TemplateCompilerInner {
                resolver,
                template_normalizer,
                template_parser,
                style_compiler,
                command_compiler: CommandCompiler::new(),
                cd_compiler: ChangeDetectionCompiler::new(config.change_detector_gen_config()),
                registry: TemplateRegistry::new(),
                done: RefCell::new(HashMap::new()),
                awaiting: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// Components get their template normalized; other directives are
    /// returned as they are.
    pub fn normalize_directive_metadata(
        &self,
        directive: &CompileDirectiveMetadata,
    ) -> LocalBoxFuture<'static, Result<CompileDirectiveMetadata>> {
        self.inner.normalize_directive_metadata(directive)
    }

    /// Compiles the synthetic host view of the component `type_id` and,
    /// through it, every component reachable from it.
    pub fn compile_host_component_runtime(
        &self,
        type_id: i32,
    ) -> LocalBoxFuture<'static, Result<Rc<CompiledTemplate>>> {
        match self.inner.compile_host_component_runtime(type_id) {
            Ok(done) => done.boxed_local(),
            Err(err) => future::ready(Err(err)).boxed_local(),
        }
    }

    /// The compiled template of `handle`, if it is part of this compiler's
    /// current compilation unit.
    pub fn compiled_template(&self, handle: TemplateHandle) -> Option<Rc<CompiledTemplate>> {
        self.inner.registry.get(handle)
    }

    pub fn clear_cache(&self) {
        debug!(
            "Clearing {} compiled template(s)",
            self.inner.registry.len()
        );
        self.inner.style_compiler.clear_cache();
        self.inner.registry.clear();
        self.inner.done.borrow_mut().clear();
        self.inner.awaiting.borrow_mut().clear();
    }

    /// One module, `<module_id>.template`, declaring `<Name>Template` for
    /// every component (and `Host<Name>Template` for dynamically loadable
    /// ones).
    pub fn compile_templates_codegen(
        &self,
        module_id: &str,
        components: &[NormalizedComponentWithViewDirectives],
    ) -> Result<SourceModule> {
        let mut declarations = Vec::new();
        let mut templates = Vec::new();
        for component_with_dirs in components {
            let component = &component_with_dirs.component;
            assert_component(component)?;
            let arguments = self.inner.process_template_codegen(
                component,
                &component_with_dirs.directives,
                &mut declarations,
            )?;
            templates.push((component.type_.clone(), arguments));

            if component.dynamic_loadable {
                let host_meta = Rc::new(create_host_component_meta(
                    &component.type_,
                    component.selector.as_deref().unwrap_or_default(),
                )?);
                let arguments = self.inner.process_template_codegen(
                    &host_meta,
                    std::slice::from_ref(component),
                    &mut declarations,
                )?;
                templates.push((host_meta.type_.clone(), arguments));
            }
        }

        let commands_module = module_ref(TEMPLATE_COMMANDS_MODULE);
        for (type_, arguments) in templates {
            let data_fn = codegen_value_fn(&[], &format!("[{}]", arguments.join(",")));
            declarations.push(format!(
                "{}new {}CompiledTemplate({},{});",
                codegen_export_variable(&template_variable_name(&type_)),
                commands_module,
                type_.id,
                data_fn
            ));
        }
        Ok(SourceModule::new(
            Some(template_module_name(module_id)),
            declarations.join("\n"),
        ))
    }

    pub fn compile_stylesheet_codegen(&self, module_id: &str, css_text: &str) -> [SourceModule; 2] {
        self.inner
            .style_compiler
            .compile_stylesheet_codegen(module_id, css_text)
    }

    pub fn serialize_directive_metadata(&self, meta: &CompileDirectiveMetadata) -> Result<String> {
        meta.to_json()
    }

    pub fn deserialize_directive_metadata(&self, json: &str) -> Result<CompileDirectiveMetadata> {
        CompileDirectiveMetadata::from_json(json)
    }
}

impl TemplateCompilerInner {
    fn normalize_directive_metadata(
        &self,
        directive: &CompileDirectiveMetadata,
    ) -> LocalBoxFuture<'static, Result<CompileDirectiveMetadata>> {
        if !directive.is_component {
            return future::ready(Ok(directive.clone())).boxed_local();
        }
        let template = match directive.component_template() {
            Ok(template) => template,
            Err(err) => return future::ready(Err(err)).boxed_local(),
        };
        let normalized = self
            .template_normalizer
            .normalize_template(&directive.type_, template);
        let directive = directive.clone();
        normalized
            .map(move |template| {
                template.map(|template| CompileDirectiveMetadata {
                    template: Some(template),
                    ..directive
                })
            })
            .boxed_local()
    }

    fn compile_host_component_runtime(self: &Rc<Self>, type_id: i32) -> Result<SharedTemplate> {
        let host_id = -type_id - 1;
        if let Some(done) = self.done.borrow().get(&host_id) {
            return Ok(done.clone());
        }
        let component = self.resolver.get_metadata(type_id)?;
        assert_component(&component)?;
        let host_meta = create_host_component_meta(
            &component.type_,
            component.selector.as_deref().unwrap_or_default(),
        )?;
        self.compile_component_runtime(Rc::new(host_meta), vec![component]);
        self.done.borrow().get(&host_id).cloned().ok_or_else(|| {
            CompileError::Internal(format!("Host template of {} was not scheduled", type_id))
        })
    }

    /// Registers the template of `component` and schedules its
    /// compilation. Returns the (possibly not yet compiled) template.
    fn compile_component_runtime(
        self: &Rc<Self>,
        component: Rc<CompileDirectiveMetadata>,
        view_directives: Vec<CompileDirectiveMetadata>,
    ) -> Rc<CompiledTemplate> {
        let id = component.type_.id;
        let (template, created) = self.registry.get_or_create(id);
        if !created {
            return template;
        }
        debug!("Compiling template of {}", component.type_.name);

        let styles = self.style_compiler.compile_component_runtime(&component);
        let normalized_directives = future::try_join_all(
            view_directives
                .iter()
                .map(|directive| self.normalize_directive_metadata(directive)),
        );
        let this: Weak<Self> = Rc::downgrade(self);
        let compiled = template.clone();

        let compile = async move {
            let (styles, directives) = future::try_join(styles, normalized_directives).await?;
            let this = this.upgrade().ok_or_else(|| {
                CompileError::Internal(format!("Template compiler dropped while compiling {}", id))
            })?;
            let directives: Vec<Rc<CompileDirectiveMetadata>> =
                directives.into_iter().map(Rc::new).collect();
            let template_text = component
                .component_template()?
                .template
                .clone()
                .unwrap_or_default();
            let parsed = this
                .template_parser
                .parse(&template_text, &directives, &component.type_.name)?;
            let cd_factories = this.cd_compiler.compile_component_runtime(
                &component.type_,
                component.change_detection,
                &parsed,
            );

            let mut children: Vec<SharedTemplate> = Vec::new();
            let commands = this.command_compiler.compile_component_runtime(
                &component,
                &parsed,
                &cd_factories,
                &mut |child: &CompileDirectiveMetadata| {
                    let child_id = child.type_.id;
                    let child_view_directives = this.resolver.get_view_directives_metadata(child_id)?;
                    let child_template =
                        this.compile_component_runtime(Rc::new(child.clone()), child_view_directives);
                    if let Some(child_done) = this.wait_for_child(id, child_id) {
                        children.push(child_done);
                    }
                    Ok(child_template.handle())
                },
            )?;

            let change_detector_factory = cd_factories.first().cloned().ok_or_else(|| {
                CompileError::Internal(format!("{} has no component change detector", component.type_.name))
            })?;
            compiled.init(CompiledTemplateData {
                change_detector_factory,
                commands,
                styles,
            })?;
            drop(this);

            future::try_join_all(children).await?;
            Ok(compiled)
        };
        let this: Weak<Self> = Rc::downgrade(self);
        let done = async move {
            let result = compile.await;
            if let Some(this) = this.upgrade() {
                this.awaiting.borrow_mut().remove(&id);
            }
            result
        }
        .boxed_local()
        .shared();

        self.done.borrow_mut().insert(id, done);
        template
    }

    /// The pending compilation of `child_id`, unless waiting for it from
    /// `parent_id` would close a cycle (recursive components, or two
    /// components compiled concurrently that use each other).
    fn wait_for_child(&self, parent_id: i32, child_id: i32) -> Option<SharedTemplate> {
        if self.awaits(child_id, parent_id) {
            trace!("Not waiting for recursive template {} in {}", child_id, parent_id);
            return None;
        }
        let child_done = self.done.borrow().get(&child_id).cloned()?;
        self.awaiting
            .borrow_mut()
            .entry(parent_id)
            .or_default()
            .push(child_id);
        Some(child_done)
    }

    /// Whether the compilation of `from` waits, directly or transitively,
    /// for the compilation of `target`.
    fn awaits(&self, from: i32, target: i32) -> bool {
        let awaiting = self.awaiting.borrow();
        let mut visited = HashSet::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if visited.insert(id) {
                stack.extend(awaiting.get(&id).into_iter().flatten().copied());
            }
        }
        false
    }

    /// Adds the declarations of one component's template to `declarations`
    /// and returns the arguments of its `CompiledTemplate`.
    fn process_template_codegen(
        &self,
        component: &CompileDirectiveMetadata,
        directives: &[Rc<CompileDirectiveMetadata>],
        declarations: &mut Vec<String>,
    ) -> Result<Vec<String>> {
        let style_expr = self.style_compiler.compile_component_codegen(component)?;
        let template_text = component
            .component_template()?
            .template
            .clone()
            .unwrap_or_default();
        let parsed = self
            .template_parser
            .parse(&template_text, directives, &component.type_.name)?;
        let cd_exprs = self.cd_compiler.compile_component_codegen(
            &component.type_,
            component.change_detection,
            &parsed,
        );
        let commands_expr = self.command_compiler.compile_component_codegen(
            component,
            &parsed,
            &cd_exprs.expressions,
            &mut codegen_component_template_factory,
        )?;

        declarations.extend(style_expr.declarations);
        declarations.extend(cd_exprs.declarations);
        declarations.extend(commands_expr.declarations);

        let root_factory = cd_exprs.expressions.first().cloned().ok_or_else(|| {
            CompileError::Internal(format!("{} has no component change detector", component.type_.name))
        })?;
        Ok(vec![root_factory, commands_expr.expression, style_expr.expression])
    }
}

/// Nested templates are referenced by their exported variable in the
/// template module of their own module id.
fn codegen_component_template_factory(nested: &CompileDirectiveMetadata) -> Result<SourceExpression> {
    Ok(SourceExpression::new(
        Vec::new(),
        format!(
            "{}{}",
            module_ref(&template_module_name(&nested.type_.module_id)),
            template_variable_name(&nested.type_)
        ),
    ))
}
