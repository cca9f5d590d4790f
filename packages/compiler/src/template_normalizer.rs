//! Template Normalizer
//!
//! Resolves where a component's template and styles come from: loads an
//! external template, collects `<style>`, `<link rel="stylesheet">` and
//! `<ng-content>` found in the markup, and settles the effective view
//! encapsulation.

use futures::future::{self, FutureExt, LocalBoxFuture};
use log::{debug, trace};
use std::rc::Rc;

use crate::core::ViewEncapsulation;
use crate::directive_metadata::{CompileTemplateMetadata, CompileTypeMetadata};
use crate::error::{CompileError, Result};
use crate::ml_parser::{visit_all, Element, HtmlParser, Node, Visitor};
use crate::resource_loader::ResourceLoader;
use crate::style_url_resolver::resolve_style_urls;
use crate::template_parser::{preparse_element, PreparsedElementType};
use crate::url_resolver::UrlResolver;

#[derive(Clone)]
pub struct TemplateNormalizer {
    loader: Rc<dyn ResourceLoader>,
    url_resolver: Rc<dyn UrlResolver>,
    html_parser: Rc<dyn HtmlParser>,
}

impl TemplateNormalizer {
    pub fn new(
        loader: Rc<dyn ResourceLoader>,
        url_resolver: Rc<dyn UrlResolver>,
        html_parser: Rc<dyn HtmlParser>,
    ) -> Self {
        TemplateNormalizer {
            loader,
            url_resolver,
            html_parser,
        }
    }

    /// Inline templates resolve immediately; a `template_url` is resolved
    /// against the type's module id and fetched.
    pub fn normalize_template(
        &self,
        directive_type: &CompileTypeMetadata,
        template: &CompileTemplateMetadata,
    ) -> LocalBoxFuture<'static, Result<CompileTemplateMetadata>> {
        if let Some(inline) = &template.template {
            let result = self.normalize_loaded_template(
                directive_type,
                template,
                inline,
                &directive_type.module_id,
            );
            return future::ready(result).boxed_local();
        }

        let template_url = match &template.template_url {
            Some(url) => url,
            None => {
                return future::ready(Err(CompileError::Internal(format!(
                    "Component {} has neither a template nor a template url",
                    directive_type.name
                ))))
                .boxed_local()
            }
        };

        let source_abs_url = self
            .url_resolver
            .resolve(&directive_type.module_id, template_url);
        debug!("Loading template of {} from {}", directive_type.name, source_abs_url);

        let load = self.loader.get(&source_abs_url);
        let this = self.clone();
        let directive_type = directive_type.clone();
        let template = template.clone();
        async move {
            let content = load.await?;
            this.normalize_loaded_template(&directive_type, &template, &content, &source_abs_url)
        }
        .boxed_local()
    }

    pub fn normalize_loaded_template(
        &self,
        directive_type: &CompileTypeMetadata,
        template_meta: &CompileTemplateMetadata,
        template: &str,
        template_abs_url: &str,
    ) -> Result<CompileTemplateMetadata> {
        let nodes = self.html_parser.parse(template, &directive_type.name)?;
        let mut visitor = TemplatePreparseVisitor::default();
        visit_all(&mut visitor, &nodes);

        let mut all_style_abs_urls: Vec<String> = visitor
            .style_urls
            .iter()
            .map(|url| self.url_resolver.resolve(template_abs_url, url))
            .chain(
                template_meta
                    .style_urls
                    .iter()
                    .map(|url| self.url_resolver.resolve(&directive_type.module_id, url)),
            )
            .collect();

        let all_resolved_styles: Vec<String> = template_meta
            .styles
            .iter()
            .chain(visitor.styles.iter())
            .map(|style| {
                let style_with_imports =
                    resolve_style_urls(self.url_resolver.as_ref(), template_abs_url, style);
                all_style_abs_urls.extend(style_with_imports.style_urls);
                style_with_imports.style
            })
            .collect();

        let mut encapsulation = template_meta.encapsulation;
        if encapsulation == ViewEncapsulation::Emulated
            && all_resolved_styles.is_empty()
            && all_style_abs_urls.is_empty()
        {
            trace!(
                "{} has no styles, downgrading emulated encapsulation to none",
                directive_type.name
            );
            encapsulation = ViewEncapsulation::None;
        }

        Ok(CompileTemplateMetadata {
            encapsulation,
            template: Some(template.to_string()),
            template_url: Some(template_abs_url.to_string()),
            styles: all_resolved_styles,
            style_urls: all_style_abs_urls,
            ng_content_selectors: visitor.ng_content_selectors,
        })
    }
}

#[derive(Default)]
struct TemplatePreparseVisitor {
    ng_content_selectors: Vec<String>,
    styles: Vec<String>,
    style_urls: Vec<String>,
}

impl Visitor for TemplatePreparseVisitor {
    fn visit_element(&mut self, element: &Element) {
        let preparsed = preparse_element(element);
        match preparsed.element_type {
            PreparsedElementType::NgContent => {
                self.ng_content_selectors.push(preparsed.select_attr);
            }
            PreparsedElementType::Style => {
                let text_content: String = element
                    .children
                    .iter()
                    .filter_map(|child| match child {
                        Node::Text(text) => Some(text.value.as_str()),
                        _ => None,
                    })
                    .collect();
                self.styles.push(text_content);
            }
            PreparsedElementType::Stylesheet => {
                if let Some(href) = preparsed.href_attr {
                    self.style_urls.push(href);
                }
            }
            PreparsedElementType::Script | PreparsedElementType::Other => {}
        }
        if !preparsed.non_bindable {
            visit_all(self, &element.children);
        }
    }
}
