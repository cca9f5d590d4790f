//! Style Compiler
//!
//! Compiles component styles (runtime values or generated source) and
//! free-standing style sheets. Fetched style sheets are cached per
//! `(absolute url, shim)` pair; the cache holds the pending fetch itself so
//! simultaneous requests share one load. An entry holds a single sheet
//! (its text and its resolved imports); imports are flattened per request,
//! so entries never wait for each other.

use futures::future::{self, FutureExt, LocalBoxFuture, Shared};
use log::{debug, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::config::CompilerConfig;
use crate::core::ViewEncapsulation;
use crate::directive_metadata::CompileDirectiveMetadata;
use crate::error::{CompileError, Result};
use crate::resource_loader::ResourceLoader;
use crate::shadow_css::ShadowCss;
use crate::source_module::{module_ref, SourceExpression, SourceModule};
use crate::style_url_resolver::{resolve_style_urls, StyleWithImports};
use crate::url_resolver::UrlResolver;
use crate::util::{
    codegen_concat_array, codegen_export_variable, codegen_map_array, codegen_replace_all,
    escape_single_quote_string,
};

pub const COMPONENT_VARIABLE: &str = "%COMP%";
pub const HOST_ATTR: &str = "_nghost-%COMP%";
pub const CONTENT_ATTR: &str = "_ngcontent-%COMP%";

type SharedSheet = Shared<LocalBoxFuture<'static, Result<Rc<StyleWithImports>>>>;

pub fn shim_content_attribute(component_id: i32) -> String {
    CONTENT_ATTR.replace(COMPONENT_VARIABLE, &component_id.to_string())
}

pub fn shim_host_attribute(component_id: i32) -> String {
    HOST_ATTR.replace(COMPONENT_VARIABLE, &component_id.to_string())
}

fn style_cache_key(abs_url: &str, shim: bool) -> String {
    if shim {
        format!("{}.shim", abs_url)
    } else {
        abs_url.to_string()
    }
}

fn shim_module_id_if_needed(module_id: &str, shim: bool) -> String {
    style_cache_key(module_id, shim)
}

/// Cheap to clone; clones share the style cache.
#[derive(Clone)]
pub struct StyleCompiler {
    inner: Rc<StyleCompilerInner>,
}

struct StyleCompilerInner {
    loader: Rc<dyn ResourceLoader>,
    url_resolver: Rc<dyn UrlResolver>,
    shadow_css: ShadowCss,
    shim_enabled: bool,
    style_cache: RefCell<HashMap<String, SharedSheet>>,
}

impl StyleCompiler {
    pub fn new(loader: Rc<dyn ResourceLoader>, url_resolver: Rc<dyn UrlResolver>) -> Self {
        Self::with_config(loader, url_resolver, &CompilerConfig::default())
    }

    pub fn with_config(
        loader: Rc<dyn ResourceLoader>,
        url_resolver: Rc<dyn UrlResolver>,
        config: &CompilerConfig,
    ) -> Self {
        StyleCompiler {
            inner: Rc::new(StyleCompilerInner {
                loader,
                url_resolver,
                shadow_css: ShadowCss::new(),
                shim_enabled: config.style_shim,
                style_cache: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// Final style texts of a component, imports flattened after the
    /// importing sheet, with the component id substituted into the
    /// synthetic attribute names.
    pub fn compile_component_runtime(
        &self,
        component: &CompileDirectiveMetadata,
    ) -> LocalBoxFuture<'static, Result<Vec<String>>> {
        let template = match component.component_template() {
            Ok(template) => template,
            Err(err) => return future::ready(Err(err)).boxed_local(),
        };
        let shim = self.should_shim(template.encapsulation);
        let component_id = component.type_.id.to_string();
        let plain_styles = template
            .styles
            .iter()
            .map(|style| self.inner.shim_if_needed(style, shim))
            .collect();
        self.inner
            .load_styles(plain_styles, template.style_urls.clone(), shim, Rc::new(Vec::new()))
            .map(move |styles| {
                styles.map(|styles| {
                    styles
                        .into_iter()
                        .map(|style| style.replace(COMPONENT_VARIABLE, &component_id))
                        .collect()
                })
            })
            .boxed_local()
    }

    pub fn compile_component_codegen(
        &self,
        component: &CompileDirectiveMetadata,
    ) -> Result<SourceExpression> {
        let template = component.component_template()?;
        let shim = self.should_shim(template.encapsulation);
        let suffix = if shim {
            let component_id = component.type_.id.to_string();
            codegen_map_array(
                &["style"],
                &format!(
                    "style{}",
                    codegen_replace_all(COMPONENT_VARIABLE, &component_id)
                ),
            )
        } else {
            String::new()
        };
        Ok(self
            .inner
            .style_codegen(&template.styles, &template.style_urls, shim, &suffix))
    }

    /// The plain and the `.shim` module of a free-standing style sheet,
    /// each exporting `STYLES`.
    pub fn compile_stylesheet_codegen(&self, module_id: &str, css_text: &str) -> [SourceModule; 2] {
        let style_with_imports =
            resolve_style_urls(self.inner.url_resolver.as_ref(), module_id, css_text);
        let styles = [style_with_imports.style];
        [false, true].map(|shim| {
            let expression = self
                .inner
                .style_codegen(&styles, &style_with_imports.style_urls, shim, "");
            style_module(module_id, shim, &expression)
        })
    }

    pub fn clear_cache(&self) {
        let mut cache = self.inner.style_cache.borrow_mut();
        debug!("Clearing {} cached style sheet(s)", cache.len());
        cache.clear();
    }

    fn should_shim(&self, encapsulation: ViewEncapsulation) -> bool {
        self.inner.shim_enabled && encapsulation == ViewEncapsulation::Emulated
    }
}

impl StyleCompilerInner {
    /// `styles` (already shimmed when needed) followed by the flattened
    /// content of every sheet in `abs_urls`, in order. A sheet already on
    /// the import chain `importers` is skipped.
    fn load_styles(
        self: &Rc<Self>,
        styles: Vec<String>,
        abs_urls: Vec<String>,
        shim: bool,
        importers: Rc<Vec<String>>,
    ) -> LocalBoxFuture<'static, Result<Vec<String>>> {
        let nested: Vec<LocalBoxFuture<'static, Result<Vec<String>>>> = abs_urls
            .into_iter()
            .filter(|url| {
                let cyclic = importers.contains(url);
                if cyclic {
                    warn!("Ignoring cyclic style sheet import of {}", url);
                }
                !cyclic
            })
            .map(|url| self.load_sheet(url, shim, &importers))
            .collect();

        async move {
            let nested_styles = future::try_join_all(nested).await?;
            let mut result = styles;
            result.extend(nested_styles.into_iter().flatten());
            Ok(result)
        }
        .boxed_local()
    }

    /// One sheet followed by its flattened imports.
    fn load_sheet(
        self: &Rc<Self>,
        abs_url: String,
        shim: bool,
        importers: &Rc<Vec<String>>,
    ) -> LocalBoxFuture<'static, Result<Vec<String>>> {
        let sheet = self.fetch_sheet(&abs_url, shim);
        let mut chain = importers.as_ref().clone();
        chain.push(abs_url);
        let chain = Rc::new(chain);
        let this = self.clone();
        async move {
            let sheet = sheet.await?;
            this.load_styles(vec![sheet.style.clone()], sheet.style_urls.clone(), shim, chain)
                .await
        }
        .boxed_local()
    }

    /// The text and resolved imports of one sheet, from the cache or a new
    /// fetch.
    fn fetch_sheet(self: &Rc<Self>, abs_url: &str, shim: bool) -> SharedSheet {
        let cache_key = style_cache_key(abs_url, shim);
        if let Some(pending) = self.style_cache.borrow().get(&cache_key) {
            debug!("Style cache hit for {}", cache_key);
            return pending.clone();
        }

        debug!("Fetching style sheet {}", abs_url);
        let load = self.loader.get(abs_url);
        let url = abs_url.to_string();
        let this: Weak<Self> = Rc::downgrade(self);

        let pending = async move {
            let style = load.await?;
            let this = this.upgrade().ok_or_else(|| {
                CompileError::Internal(format!("Style compiler dropped while loading {}", url))
            })?;
            let style_with_imports = resolve_style_urls(this.url_resolver.as_ref(), &url, &style);
            Ok(Rc::new(StyleWithImports {
                style: this.shim_if_needed(&style_with_imports.style, shim),
                style_urls: style_with_imports.style_urls,
            }))
        }
        .boxed_local()
        .shared();

        self.style_cache
            .borrow_mut()
            .insert(cache_key, pending.clone());
        pending
    }

    fn style_codegen(
        &self,
        plain_styles: &[String],
        abs_urls: &[String],
        shim: bool,
        suffix: &str,
    ) -> SourceExpression {
        let inlined: Vec<String> = plain_styles
            .iter()
            .map(|style| escape_single_quote_string(&self.shim_if_needed(style, shim)))
            .collect();
        let mut expression = format!("([{}]", inlined.join(","));
        for url in abs_urls {
            let module_id = shim_module_id_if_needed(url, shim);
            expression.push_str(&codegen_concat_array(&format!(
                "{}STYLES",
                module_ref(&module_id)
            )));
        }
        expression.push(')');
        expression.push_str(suffix);
        SourceExpression::new(Vec::new(), expression)
    }

    fn shim_if_needed(&self, style: &str, shim: bool) -> String {
        if shim {
            self.shadow_css
                .shim_css_text(style, CONTENT_ATTR, HOST_ATTR)
        } else {
            style.to_string()
        }
    }
}

fn style_module(module_id: &str, shim: bool, expression: &SourceExpression) -> SourceModule {
    let source = format!(
        "{}\n{}{};\n",
        expression.declarations.join("\n"),
        codegen_export_variable("STYLES"),
        expression.expression
    );
    SourceModule::new(Some(shim_module_id_if_needed(module_id, shim)), source)
}
