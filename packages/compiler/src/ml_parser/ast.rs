//! Markup AST
//!
//! The tree produced by an [`HtmlParser`](super::HtmlParser). Only the
//! shape the compiler inspects is modelled: elements, their attributes,
//! text and comments.

use crate::parse_util::ParseSourceSpan;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(Text),
    Comment(Comment),
}

impl Node {
    pub fn source_span(&self) -> &ParseSourceSpan {
        match self {
            Node::Element(e) => &e.source_span,
            Node::Text(t) => &t.source_span,
            Node::Comment(c) => &c.source_span,
        }
    }

    pub fn visit(&self, visitor: &mut dyn Visitor) {
        match self {
            Node::Element(e) => visitor.visit_element(e),
            Node::Text(t) => visitor.visit_text(t),
            Node::Comment(c) => visitor.visit_comment(c),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub value: String,
    pub source_span: ParseSourceSpan,
}

impl Text {
    pub fn new(value: impl Into<String>, source_span: ParseSourceSpan) -> Self {
        Text {
            value: value.into(),
            source_span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
    pub source_span: ParseSourceSpan,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>, source_span: ParseSourceSpan) -> Self {
        Attribute {
            name: name.into(),
            value: value.into(),
            source_span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<Attribute>,
    pub children: Vec<Node>,
    pub source_span: ParseSourceSpan,
}

impl Element {
    pub fn new(
        name: impl Into<String>,
        attrs: Vec<Attribute>,
        children: Vec<Node>,
        source_span: ParseSourceSpan,
    ) -> Self {
        Element {
            name: name.into(),
            attrs,
            children,
            source_span,
        }
    }

    /// Value of the first attribute named `name`, compared case-insensitively.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub value: Option<String>,
    pub source_span: ParseSourceSpan,
}

pub trait Visitor {
    fn visit_element(&mut self, element: &Element);
    fn visit_text(&mut self, _text: &Text) {}
    fn visit_comment(&mut self, _comment: &Comment) {}
}

/// Visit all nodes in order.
pub fn visit_all(visitor: &mut dyn Visitor, nodes: &[Node]) {
    for node in nodes {
        node.visit(visitor);
    }
}
