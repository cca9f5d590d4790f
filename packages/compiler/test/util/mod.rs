//! Shared test helpers: a small markup parser, a template parser that
//! understands the binding syntax used by these tests, a resource loader
//! whose responses are released explicitly, and a command humanizer.

#![allow(dead_code)]

use futures::channel::oneshot;
use futures::future::{FutureExt, LocalBoxFuture};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use angular_template_compiler::change_detection::{
    BindingTarget, ChangeDispatcher, DirectiveIndex, LifecycleEvent, SimpleChanges,
};
use angular_template_compiler::core::PropertyBindingType;
use angular_template_compiler::directive_metadata::{
    CompileDirectiveMetadata, CompileTemplateMetadata, CompileTypeMetadata, DirectiveDeclaration,
};
use angular_template_compiler::expression_parser::{Ast, AstWithSource, BinaryOperator};
use angular_template_compiler::ml_parser::{Attribute, Element, HtmlParser, Node, Text};
use angular_template_compiler::parse_util::{ParseError, ParseSourceSpan};
use angular_template_compiler::resource_loader::{ResourceError, ResourceLoader};
use angular_template_compiler::selector::CssSelector;
use angular_template_compiler::template_ast::{
    AttrAst, BoundDirectivePropertyAst, BoundElementPropertyAst, BoundEventAst, BoundTextAst,
    DirectiveAst, ElementAst, EmbeddedTemplateAst, NgContentAst, TemplateAst, TextAst, VariableAst,
};
use angular_template_compiler::template_commands::{
    visit_all_commands, BeginComponentCmd, BeginElementCmd, CommandVisitor, EmbeddedTemplateCmd,
    NgContentCmd, TemplateCmd, TextCmd,
};
use angular_template_compiler::template_parser::TemplateParser;
use angular_template_compiler::util::dash_case_to_camel_case;

pub fn span(source_name: &str) -> ParseSourceSpan {
    ParseSourceSpan::synthetic(source_name)
}

pub fn type_meta(id: i32, name: &str) -> CompileTypeMetadata {
    CompileTypeMetadata::new(id, name, format!("some/module/{}", name.to_lowercase()))
}

pub fn directive(id: i32, name: &str, declaration: DirectiveDeclaration) -> CompileDirectiveMetadata {
    CompileDirectiveMetadata::create(type_meta(id, name), declaration)
}

pub fn component(
    id: i32,
    name: &str,
    selector: &str,
    template: CompileTemplateMetadata,
) -> CompileDirectiveMetadata {
    directive(
        id,
        name,
        DirectiveDeclaration {
            is_component: true,
            selector: Some(selector.to_string()),
            template: Some(template),
            ..Default::default()
        },
    )
}

// ---------------------------------------------------------------------------
// Markup

const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "link", "meta"];

/// Elements, attributes, text and comments. No entities, no implicit
/// closing: anything unbalanced is an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct TestHtmlParser;

impl HtmlParser for TestHtmlParser {
    fn parse(&self, text: &str, source_name: &str) -> Result<Vec<Node>, ParseError> {
        MarkupScanner {
            input: text,
            pos: 0,
            source_name,
        }
        .parse()
    }
}

struct MarkupScanner<'a> {
    input: &'a str,
    pos: usize,
    source_name: &'a str,
}

impl MarkupScanner<'_> {
    fn rest(&self) -> &str {
        &self.input[self.pos..]
    }

    fn error(&self, msg: String) -> ParseError {
        ParseError::new(span(self.source_name), msg)
    }

    fn parse(mut self) -> Result<Vec<Node>, ParseError> {
        let mut roots: Vec<Node> = Vec::new();
        let mut open: Vec<Element> = Vec::new();

        while self.pos < self.input.len() {
            let node = if self.rest().starts_with("<!--") {
                let end = self
                    .rest()
                    .find("-->")
                    .ok_or_else(|| self.error("Unterminated comment".to_string()))?;
                let value = self.rest()[4..end].to_string();
                self.pos += end + 3;
                Node::Comment(angular_template_compiler::ml_parser::Comment {
                    value: Some(value),
                    source_span: span(self.source_name),
                })
            } else if self.rest().starts_with("</") {
                let end = self
                    .rest()
                    .find('>')
                    .ok_or_else(|| self.error("Unterminated closing tag".to_string()))?;
                let name = self.rest()[2..end].trim().to_string();
                self.pos += end + 1;
                let element = open
                    .pop()
                    .filter(|element| element.name == name)
                    .ok_or_else(|| self.error(format!("Unexpected closing tag \"{}\"", name)))?;
                Node::Element(element)
            } else if self.rest().starts_with('<') {
                let (element, self_closing) = self.scan_start_tag()?;
                if self_closing || VOID_ELEMENTS.contains(&element.name.as_str()) {
                    Node::Element(element)
                } else {
                    open.push(element);
                    continue;
                }
            } else {
                let end = self.rest().find('<').unwrap_or(self.rest().len());
                let value = self.rest()[..end].to_string();
                self.pos += end;
                Node::Text(Text::new(value, span(self.source_name)))
            };

            match open.last_mut() {
                Some(parent) => parent.children.push(node),
                None => roots.push(node),
            }
        }

        if let Some(unclosed) = open.last() {
            return Err(self.error(format!("Unclosed element \"{}\"", unclosed.name)));
        }
        Ok(roots)
    }

    fn scan_name(&mut self) -> String {
        let len = self
            .rest()
            .find(|c: char| c.is_whitespace() || c == '=' || c == '>' || c == '/')
            .unwrap_or(self.rest().len());
        let name = self.rest()[..len].to_string();
        self.pos += len;
        name
    }

    fn skip_whitespace(&mut self) {
        let len = self.rest().len() - self.rest().trim_start().len();
        self.pos += len;
    }

    fn scan_start_tag(&mut self) -> Result<(Element, bool), ParseError> {
        self.pos += 1;
        let name = self.scan_name();
        if name.is_empty() {
            return Err(self.error("Expected a tag name".to_string()));
        }
        let mut attrs = Vec::new();
        loop {
            self.skip_whitespace();
            if self.rest().starts_with("/>") {
                self.pos += 2;
                return Ok((Element::new(name, attrs, vec![], span(self.source_name)), true));
            }
            if self.rest().starts_with('>') {
                self.pos += 1;
                return Ok((Element::new(name, attrs, vec![], span(self.source_name)), false));
            }
            if self.rest().is_empty() {
                return Err(self.error(format!("Unterminated start tag \"{}\"", name)));
            }
            let attr_name = self.scan_name();
            if attr_name.is_empty() {
                return Err(self.error(format!("Malformed attribute in \"{}\"", name)));
            }
            let mut value = String::new();
            if self.rest().starts_with('=') {
                self.pos += 1;
                let quote = self
                    .rest()
                    .chars()
                    .next()
                    .filter(|c| *c == '"' || *c == '\'')
                    .ok_or_else(|| self.error(format!("Unquoted value of \"{}\"", attr_name)))?;
                let end = self.rest()[1..]
                    .find(quote)
                    .ok_or_else(|| self.error(format!("Unterminated value of \"{}\"", attr_name)))?;
                value = self.rest()[1..end + 1].to_string();
                self.pos += end + 2;
            }
            attrs.push(Attribute::new(attr_name, value, span(self.source_name)));
        }
    }
}

// ---------------------------------------------------------------------------
// Expressions

/// Literals, property paths, calls, `!`, `+`, `==`, `||`, `&&` and pipes.
pub fn parse_expression(source: &str) -> Ast {
    let source = source.trim();
    if let Some((exp, pipe)) = split_top_level(source, " | ") {
        let mut parts = pipe.split(':');
        let name = parts.next().unwrap_or_default().trim().to_string();
        let args = parts.map(parse_expression).collect();
        return Ast::pipe(parse_expression(exp), name, args);
    }
    for (token, operation) in [
        (" || ", BinaryOperator::Or),
        (" && ", BinaryOperator::And),
        (" == ", BinaryOperator::Equals),
        (" != ", BinaryOperator::NotEquals),
        (" + ", BinaryOperator::Plus),
        (" - ", BinaryOperator::Minus),
    ] {
        if let Some((left, right)) = split_top_level(source, token) {
            return Ast::binary(operation, parse_expression(left), parse_expression(right));
        }
    }
    if let Some(rest) = source.strip_prefix('!') {
        return Ast::PrefixNot(Box::new(parse_expression(rest)));
    }
    if source.len() >= 2 && source.starts_with('\'') && source.ends_with('\'') {
        return Ast::literal(&source[1..source.len() - 1]);
    }
    if let Ok(number) = source.parse::<i64>() {
        return Ast::literal(number);
    }
    match source {
        "true" => return Ast::literal(true),
        "false" => return Ast::literal(false),
        "null" => return Ast::Literal(Value::Null),
        _ => {}
    }

    let mut receiver = Ast::ImplicitReceiver;
    for segment in split_path(source) {
        receiver = match segment.find('(') {
            Some(open) => {
                let args_source = segment[open + 1..segment.len() - 1].trim();
                let args = if args_source.is_empty() {
                    vec![]
                } else {
                    args_source.split(',').map(parse_expression).collect()
                };
                Ast::MethodCall {
                    receiver: Box::new(receiver),
                    name: segment[..open].to_string(),
                    args,
                }
            }
            None => Ast::property_of(receiver, segment),
        };
    }
    receiver
}

fn split_top_level<'a>(source: &'a str, token: &str) -> Option<(&'a str, &'a str)> {
    let mut depth = 0i32;
    let mut in_string = false;
    for (i, c) in source.char_indices() {
        match c {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => depth -= 1,
            _ => {}
        }
        if depth == 0 && !in_string && source[i..].starts_with(token) {
            return Some((&source[..i], &source[i + token.len()..]));
        }
    }
    None
}

fn split_path(source: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in source.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            '.' if depth == 0 => {
                segments.push(&source[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&source[start..]);
    segments
}

fn expression(source: &str, location: &str) -> AstWithSource {
    AstWithSource::new(parse_expression(source), source, location)
}

/// `a {{b}} c` into an interpolation, or `None` for plain text.
fn parse_interpolation(text: &str, location: &str) -> Option<AstWithSource> {
    if !text.contains("{{") {
        return None;
    }
    let mut strings = Vec::new();
    let mut expressions = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let end = rest[start..].find("}}")? + start;
        strings.push(rest[..start].to_string());
        expressions.push(parse_expression(&rest[start + 2..end]));
        rest = &rest[end + 2..];
    }
    strings.push(rest.to_string());
    Some(AstWithSource::new(
        Ast::interpolation(strings, expressions),
        text,
        location,
    ))
}

// ---------------------------------------------------------------------------
// Templates

/// Parses markup with [`TestHtmlParser`] and the binding syntax
/// `[prop]`, `[attr.x]`, `[class.x]`, `[style.x.unit]`, `(event)`,
/// `(window:event)`, `#var`, `#var="exportAs"`, `var-x="y"` and `{{ }}`.
/// Directives match on element name, attributes and classes.
#[derive(Debug, Default, Clone, Copy)]
pub struct TestTemplateParser;

impl TemplateParser for TestTemplateParser {
    fn parse(
        &self,
        template: &str,
        directives: &[Rc<CompileDirectiveMetadata>],
        template_name: &str,
    ) -> Result<Vec<TemplateAst>, ParseError> {
        let nodes = TestHtmlParser.parse(template, template_name)?;
        let mut converter = AstConverter {
            directives: directives
                .iter()
                .map(|d| {
                    let selectors = CssSelector::parse(d.selector.as_deref().unwrap_or_default())
                        .map_err(|e| ParseError::new(span(template_name), e.to_string()))?;
                    Ok((d.clone(), selectors))
                })
                .collect::<Result<Vec<_>, ParseError>>()?,
            template_name: template_name.to_string(),
            ng_content_count: 0,
        };
        Ok(converter.convert_all(&nodes, None))
    }
}

struct AstConverter {
    directives: Vec<(Rc<CompileDirectiveMetadata>, Vec<CssSelector>)>,
    template_name: String,
    ng_content_count: usize,
}

fn selector_matches(selector: &CssSelector, name: &str, attrs: &[Attribute]) -> bool {
    let classes: Vec<String> = attrs
        .iter()
        .filter(|a| a.name == "class")
        .flat_map(|a| a.value.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>())
        .collect();
    let element_ok = selector
        .element
        .as_deref()
        .map_or(true, |e| e == "*" || e == name);
    let classes_ok = selector.class_names.iter().all(|c| classes.contains(c));
    let attrs_ok = selector.attrs.chunks(2).all(|pair| {
        attrs.iter().any(|a| {
            a.name == pair[0] && (pair[1].is_empty() || a.value.to_lowercase() == pair[1])
        })
    });
    let nots_ok = selector
        .not_selectors
        .iter()
        .all(|not| !selector_matches(not, name, attrs));
    element_ok && classes_ok && attrs_ok && nots_ok
}

impl AstConverter {
    fn span(&self) -> ParseSourceSpan {
        span(&self.template_name)
    }

    /// Matching uses plain attribute names, so `[ng-if]` matches both
    /// `ng-if` and a `[ng-if]` binding.
    fn matching_directives(&self, element: &Element) -> Vec<Rc<CompileDirectiveMetadata>> {
        let attrs: Vec<Attribute> = element
            .attrs
            .iter()
            .map(|a| Attribute::new(binding_name(&a.name), a.value.clone(), self.span()))
            .collect();
        self.directives
            .iter()
            .filter(|(_, selectors)| selectors.iter().any(|s| selector_matches(s, &element.name, &attrs)))
            .map(|(d, _)| d.clone())
            .collect()
    }

    fn ng_content_index(&self, parent: Option<&Rc<CompileDirectiveMetadata>>, node: &Node) -> Option<usize> {
        let selectors = &parent?.template.as_ref()?.ng_content_selectors;
        selectors.iter().position(|selector| {
            if selector.is_empty() || selector == "*" {
                return true;
            }
            match node {
                Node::Element(element) => CssSelector::parse(selector)
                    .map(|parsed| parsed.iter().any(|s| selector_matches(s, &element.name, &element.attrs)))
                    .unwrap_or(false),
                _ => false,
            }
        })
    }

    fn convert_all(
        &mut self,
        nodes: &[Node],
        parent_component: Option<&Rc<CompileDirectiveMetadata>>,
    ) -> Vec<TemplateAst> {
        nodes
            .iter()
            .filter_map(|node| {
                let ng_content_index = self.ng_content_index(parent_component, node);
                self.convert(node, ng_content_index)
            })
            .collect()
    }

    fn convert(&mut self, node: &Node, ng_content_index: Option<usize>) -> Option<TemplateAst> {
        match node {
            Node::Comment(_) => None,
            Node::Text(text) => Some(match parse_interpolation(&text.value, &self.template_name) {
                Some(value) => TemplateAst::BoundText(BoundTextAst {
                    value,
                    ng_content_index,
                    source_span: self.span(),
                }),
                None => TemplateAst::Text(TextAst {
                    value: text.value.clone(),
                    ng_content_index,
                    source_span: self.span(),
                }),
            }),
            Node::Element(element) if element.name == "ng-content" => {
                let index = self.ng_content_count;
                self.ng_content_count += 1;
                Some(TemplateAst::NgContent(NgContentAst {
                    index,
                    ng_content_index,
                    source_span: self.span(),
                }))
            }
            Node::Element(element) => Some(self.convert_element(element, ng_content_index)),
        }
    }

    fn convert_element(&mut self, element: &Element, ng_content_index: Option<usize>) -> TemplateAst {
        let matched = self.matching_directives(element);
        let mut directive_asts: Vec<DirectiveAst> = matched
            .iter()
            .map(|d| self.directive_ast(d))
            .collect();

        let mut attrs = Vec::new();
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        let mut vars = Vec::new();
        for attr in &element.attrs {
            let name = attr.name.as_str();
            if let Some(prop) = name.strip_prefix('[').and_then(|n| n.strip_suffix(']')) {
                let value = expression(&attr.value, &self.template_name);
                let bound_to_directive = directive_asts.iter_mut().any(|dir_ast| {
                    let directive_prop = dir_ast
                        .directive
                        .properties
                        .iter()
                        .find(|(_, el_prop)| el_prop.as_str() == prop)
                        .map(|(dir_prop, _)| dir_prop.clone());
                    match directive_prop {
                        Some(directive_name) => {
                            dir_ast.inputs.push(BoundDirectivePropertyAst {
                                directive_name,
                                template_name: prop.to_string(),
                                value: value.clone(),
                                source_span: span(&self.template_name),
                            });
                            true
                        }
                        None => false,
                    }
                });
                if !bound_to_directive {
                    inputs.push(element_property(prop, value, self.span()));
                }
            } else if let Some(event) = name.strip_prefix('(').and_then(|n| n.strip_suffix(')')) {
                outputs.push(bound_event(event, &attr.value, &self.template_name));
            } else if let Some(var) = name.strip_prefix('#') {
                vars.push(VariableAst {
                    name: var.to_string(),
                    value: attr.value.clone(),
                    source_span: self.span(),
                });
            } else if let Some(var) = name.strip_prefix("var-") {
                vars.push(VariableAst {
                    name: var.to_string(),
                    value: if attr.value.is_empty() {
                        "$implicit".to_string()
                    } else {
                        attr.value.clone()
                    },
                    source_span: self.span(),
                });
            } else {
                attrs.push(AttrAst {
                    name: attr.name.clone(),
                    value: attr.value.clone(),
                    source_span: self.span(),
                });
            }
        }

        let component = matched.iter().find(|d| d.is_component).cloned();
        let children = self.convert_all(&element.children, component.as_ref());

        if element.name == "template" {
            TemplateAst::EmbeddedTemplate(EmbeddedTemplateAst {
                attrs,
                outputs,
                vars,
                directives: directive_asts,
                children,
                ng_content_index,
                source_span: self.span(),
            })
        } else {
            TemplateAst::Element(ElementAst {
                name: element.name.clone(),
                attrs,
                inputs,
                outputs,
                export_as_vars: vars,
                directives: directive_asts,
                children,
                ng_content_index,
                source_span: self.span(),
            })
        }
    }

    fn directive_ast(&self, directive: &Rc<CompileDirectiveMetadata>) -> DirectiveAst {
        let mut ast = DirectiveAst::new(directive.clone(), self.span());
        for (prop, source) in &directive.host_properties {
            ast.host_properties.push(element_property(
                prop,
                expression(source, &self.template_name),
                self.span(),
            ));
        }
        for (event, source) in &directive.host_listeners {
            ast.host_events
                .push(bound_event(event, source, &self.template_name));
        }
        ast
    }
}

fn binding_name(attr_name: &str) -> String {
    attr_name
        .trim_start_matches(['[', '('])
        .trim_end_matches([']', ')'])
        .to_string()
}

fn element_property(name: &str, value: AstWithSource, source_span: ParseSourceSpan) -> BoundElementPropertyAst {
    let parts: Vec<&str> = name.split('.').collect();
    let (binding_type, name, unit) = match parts.as_slice() {
        ["attr", attr] => (PropertyBindingType::Attribute, attr.to_string(), None),
        ["class", class] => (PropertyBindingType::Class, class.to_string(), None),
        ["style", style] => (PropertyBindingType::Style, style.to_string(), None),
        ["style", style, unit] => (
            PropertyBindingType::Style,
            style.to_string(),
            Some(unit.to_string()),
        ),
        _ => (PropertyBindingType::Property, dash_case_to_camel_case(name), None),
    };
    BoundElementPropertyAst {
        name,
        binding_type,
        value,
        unit,
        source_span,
    }
}

fn bound_event(name: &str, handler: &str, location: &str) -> BoundEventAst {
    let (target, name) = match name.split_once(':') {
        Some((target, name)) => (Some(target.to_string()), name.to_string()),
        None => (None, name.to_string()),
    };
    BoundEventAst {
        name,
        target,
        handler: expression(handler, location),
        source_span: span(location),
    }
}

// ---------------------------------------------------------------------------
// Resources

struct PendingRequest {
    url: String,
    sender: oneshot::Sender<Result<String, ResourceError>>,
}

/// Requests stay pending until [`flush`](DeferredResourceLoader::flush).
/// Unexpected URLs are rejected on flush.
#[derive(Default)]
pub struct DeferredResourceLoader {
    expectations: RefCell<HashMap<String, String>>,
    pending: RefCell<Vec<PendingRequest>>,
    requests: RefCell<Vec<String>>,
}

impl DeferredResourceLoader {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn expect(&self, url: &str, content: &str) {
        self.expectations
            .borrow_mut()
            .insert(url.to_string(), content.to_string());
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests.borrow().iter().filter(|u| *u == url).count()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Answers every request made so far.
    pub fn flush(&self) {
        let pending: Vec<PendingRequest> = self.pending.borrow_mut().drain(..).collect();
        self.respond(pending);
    }

    /// Answers the pending requests for `url` only.
    pub fn flush_url(&self, url: &str) {
        let (matching, rest): (Vec<PendingRequest>, Vec<PendingRequest>) = self
            .pending
            .borrow_mut()
            .drain(..)
            .partition(|request| request.url == url);
        *self.pending.borrow_mut() = rest;
        self.respond(matching);
    }

    fn respond(&self, pending: Vec<PendingRequest>) {
        for request in pending {
            let response = self
                .expectations
                .borrow()
                .get(&request.url)
                .cloned()
                .ok_or_else(|| ResourceError::not_found(&request.url));
            let _ = request.sender.send(response);
        }
    }
}

impl ResourceLoader for DeferredResourceLoader {
    fn get(&self, url: &str) -> LocalBoxFuture<'static, Result<String, ResourceError>> {
        self.requests.borrow_mut().push(url.to_string());
        let (sender, receiver) = oneshot::channel();
        self.pending.borrow_mut().push(PendingRequest {
            url: url.to_string(),
            sender,
        });
        let url = url.to_string();
        receiver
            .map(move |result| {
                result.unwrap_or_else(|_| Err(ResourceError::load_failed(&url, "request dropped")))
            })
            .boxed_local()
    }
}

// ---------------------------------------------------------------------------
// Commands

/// One line per command, e.g. `begin div [a=b] events=[click] vars=[x=%implicit] dirs=[SomeDir]`.
pub fn humanize_commands<C, F>(commands: &[TemplateCmd<C, F>]) -> Vec<String> {
    let mut humanizer = CommandHumanizer {
        depth: 0,
        lines: Vec::new(),
    };
    visit_all_commands::<C, F>(&mut humanizer, commands);
    humanizer.lines
}

struct CommandHumanizer {
    depth: usize,
    lines: Vec<String>,
}

impl CommandHumanizer {
    fn push(&mut self, line: String) {
        self.lines.push(format!("{}{}", "  ".repeat(self.depth), line));
    }
}

fn describe_element(
    kind: &str,
    name: &str,
    attrs: &[(String, String)],
    events: &[(Option<String>, String)],
    variables: &[(String, String)],
    directives: &[CompileTypeMetadata],
    ng_content_index: Option<usize>,
) -> String {
    let mut line = format!("{} {}", kind, name);
    if !attrs.is_empty() {
        let attrs: Vec<String> = attrs.iter().map(|(n, v)| format!("{}={}", n, v)).collect();
        line.push_str(&format!(" [{}]", attrs.join(" ")));
    }
    if !events.is_empty() {
        let events: Vec<String> = events
            .iter()
            .map(|(target, name)| match target {
                Some(target) => format!("{}:{}", target, name),
                None => name.clone(),
            })
            .collect();
        line.push_str(&format!(" events=[{}]", events.join(" ")));
    }
    if !variables.is_empty() {
        let vars: Vec<String> = variables.iter().map(|(n, v)| format!("{}={}", n, v)).collect();
        line.push_str(&format!(" vars=[{}]", vars.join(" ")));
    }
    if !directives.is_empty() {
        let dirs: Vec<&str> = directives.iter().map(|d| d.name.as_str()).collect();
        line.push_str(&format!(" dirs=[{}]", dirs.join(" ")));
    }
    if let Some(index) = ng_content_index {
        line.push_str(&format!(" ngContentIndex={}", index));
    }
    line
}

impl<C, F> CommandVisitor<C, F> for CommandHumanizer {
    fn visit_text(&mut self, cmd: &TextCmd) {
        let line = match &cmd.value {
            Some(value) => format!("text {}", value),
            None => "text <bound>".to_string(),
        };
        self.push(line);
    }

    fn visit_ng_content(&mut self, cmd: &NgContentCmd) {
        let line = match cmd.ng_content_index {
            Some(index) => format!("ngContent ngContentIndex={}", index),
            None => "ngContent".to_string(),
        };
        self.push(line);
    }

    fn visit_begin_element(&mut self, cmd: &BeginElementCmd) {
        let variables: Vec<(String, String)> = cmd
            .variables
            .iter()
            .map(|(n, v)| (n.clone(), v.to_string()))
            .collect();
        let mut line = describe_element(
            "begin",
            &cmd.name,
            &cmd.attrs,
            &cmd.events,
            &variables,
            &cmd.directives,
            cmd.ng_content_index,
        );
        if cmd.is_bound {
            line.push_str(" bound");
        }
        self.push(line);
        self.depth += 1;
    }

    fn visit_end_element(&mut self) {
        self.depth -= 1;
        self.push("end".to_string());
    }

    fn visit_begin_component(&mut self, cmd: &BeginComponentCmd<C>) {
        let variables: Vec<(String, String)> = cmd
            .variables
            .iter()
            .map(|(n, v)| (n.clone(), v.to_string()))
            .collect();
        let mut line = describe_element(
            "component",
            &cmd.name,
            &cmd.attrs,
            &cmd.events,
            &variables,
            &cmd.directives,
            cmd.ng_content_index,
        );
        if cmd.native_shadow {
            line.push_str(" native");
        }
        self.push(line);
        self.depth += 1;
    }

    fn visit_end_component(&mut self) {
        self.depth -= 1;
        self.push("endComponent".to_string());
    }

    fn visit_embedded_template(&mut self, cmd: &EmbeddedTemplateCmd<C, F>) {
        let mut line = describe_element(
            "template",
            "",
            &cmd.attrs,
            &[],
            &cmd.variables,
            &cmd.directives,
            cmd.ng_content_index,
        );
        if cmd.is_merged {
            line.push_str(" merged");
        }
        self.push(line.replacen("template ", "template", 1));
        self.depth += 1;
        visit_all_commands::<C, F>(self, &cmd.children);
        self.depth -= 1;
    }
}

// ---------------------------------------------------------------------------
// Change detection

/// Records every dispatcher call as a line of text.
#[derive(Clone, Default)]
pub struct LoggingDispatcher {
    pub log: Rc<RefCell<Vec<String>>>,
    pub directive_values: Rc<RefCell<HashMap<(DirectiveIndex, String), Value>>>,
}

impl LoggingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl ChangeDispatcher for LoggingDispatcher {
    fn notify_on_binding(&mut self, target: &BindingTarget, value: &Value) {
        self.log
            .borrow_mut()
            .push(format!("{}={}", target, value_text(value)));
    }

    fn set_directive_property(&mut self, directive: DirectiveIndex, name: &str, value: &Value) {
        self.log
            .borrow_mut()
            .push(format!("{}.{}={}", directive.name(), name, value_text(value)));
        self.directive_values
            .borrow_mut()
            .insert((directive, name.to_string()), value.clone());
    }

    fn read_directive_property(&self, directive: DirectiveIndex, name: &str) -> Value {
        self.directive_values
            .borrow()
            .get(&(directive, name.to_string()))
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn call_lifecycle_hook(
        &mut self,
        directive: DirectiveIndex,
        event: LifecycleEvent,
        changes: Option<&SimpleChanges>,
    ) {
        let mut line = format!("{}.{}", directive.name(), event.method_name());
        if let Some(changes) = changes {
            let names: Vec<&str> = changes.keys().map(String::as_str).collect();
            line.push_str(&format!("({})", names.join(",")));
        }
        self.log.borrow_mut().push(line);
    }
}
