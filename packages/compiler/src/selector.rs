//! CSS Selectors
//!
//! Parsing of directive selectors. The compiler only needs selectors to
//! synthesize host elements and to read `ng-content` `select` values;
//! matching directives against elements happens in the template parser.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CompileError, Result};

lazy_static! {
    /// One selector token per match: `:not(`, tag, `.class`, `[attr=value]`,
    /// `)` or a `,` separator.
    static ref SELECTOR_REGEXP: Regex = Regex::new(
        r#"(:not\()|([-\w]+)|(?:\.([-\w]+))|(?:\[([-\w*]+)(?:=(?:"([^"]*)"|'([^']*)'|([^\]]*)))?\])|(\))|(\s*,\s*)"#
    )
    .unwrap();
}

const NOT: usize = 1;
const TAG: usize = 2;
const CLASS: usize = 3;
const ATTR_NAME: usize = 4;
const ATTR_VALUE_DOUBLE: usize = 5;
const ATTR_VALUE_SINGLE: usize = 6;
const ATTR_VALUE_UNQUOTED: usize = 7;
const NOT_END: usize = 8;
const SEPARATOR: usize = 9;

/// A single compound selector: `tag.class[attr=value]:not(...)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CssSelector {
    pub element: Option<String>,
    pub class_names: Vec<String>,
    /// Attribute names and values in pairs.
    pub attrs: Vec<String>,
    pub not_selectors: Vec<CssSelector>,
}

impl CssSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma separated selector list.
    pub fn parse(selector: &str) -> Result<Vec<CssSelector>> {
        let mut results = Vec::new();
        let mut current = CssSelector::new();
        let mut in_not = false;

        for caps in SELECTOR_REGEXP.captures_iter(selector) {
            if caps.get(NOT).is_some() {
                if in_not {
                    return Err(CompileError::Internal(
                        "Nesting :not is not allowed in a selector".to_string(),
                    ));
                }
                in_not = true;
                current.not_selectors.push(CssSelector::new());
                continue;
            }

            let target = if in_not {
                let last = current.not_selectors.len() - 1;
                &mut current.not_selectors[last]
            } else {
                &mut current
            };

            if let Some(tag) = caps.get(TAG) {
                target.set_element(tag.as_str());
            }
            if let Some(class_name) = caps.get(CLASS) {
                target.add_class_name(class_name.as_str());
            }
            if let Some(name) = caps.get(ATTR_NAME) {
                let value = caps
                    .get(ATTR_VALUE_DOUBLE)
                    .or_else(|| caps.get(ATTR_VALUE_SINGLE))
                    .or_else(|| caps.get(ATTR_VALUE_UNQUOTED))
                    .map_or("", |m| m.as_str());
                target.add_attribute(name.as_str(), value);
            }
            if caps.get(NOT_END).is_some() {
                in_not = false;
            }
            if caps.get(SEPARATOR).is_some() {
                if in_not {
                    return Err(CompileError::Internal(
                        "Multiple selectors in :not are not supported".to_string(),
                    ));
                }
                results.push(std::mem::take(&mut current).with_default_element());
            }
        }
        results.push(current.with_default_element());
        Ok(results)
    }

    fn with_default_element(mut self) -> Self {
        if !self.not_selectors.is_empty()
            && self.element.is_none()
            && self.class_names.is_empty()
            && self.attrs.is_empty()
        {
            self.element = Some("*".to_string());
        }
        self
    }

    pub fn is_element_selector(&self) -> bool {
        self.element.as_deref().is_some_and(|e| e != "*")
            && self.class_names.is_empty()
            && self.attrs.is_empty()
            && self.not_selectors.is_empty()
    }

    pub fn set_element(&mut self, element: &str) {
        self.element = Some(element.to_string());
    }

    pub fn add_attribute(&mut self, name: &str, value: &str) {
        self.attrs.push(name.to_string());
        self.attrs.push(value.to_lowercase());
    }

    pub fn add_class_name(&mut self, name: &str) {
        self.class_names.push(name.to_lowercase());
    }

    /// Markup for an element this selector matches, e.g.
    /// `<comp-a class="x" role="button"></comp-a>`. Defaults to `div`.
    pub fn get_matching_element_template(&self) -> String {
        let tag_name = self.element.as_deref().filter(|e| *e != "*").unwrap_or("div");
        let class_attr = if self.class_names.is_empty() {
            String::new()
        } else {
            format!(" class=\"{}\"", self.class_names.join(" "))
        };
        let attrs: String = self
            .attrs
            .chunks(2)
            .map(|pair| match pair {
                [name, value] if !value.is_empty() => format!(" {}=\"{}\"", name, value),
                [name, ..] => format!(" {}", name),
                [] => String::new(),
            })
            .collect();
        format!("<{0}{1}{2}></{0}>", tag_name, class_attr, attrs)
    }
}

impl fmt::Display for CssSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(element) = &self.element {
            write!(f, "{}", element)?;
        }
        for class_name in &self.class_names {
            write!(f, ".{}", class_name)?;
        }
        for pair in self.attrs.chunks(2) {
            if let [name, value] = pair {
                if value.is_empty() {
                    write!(f, "[{}]", name)?;
                } else {
                    write!(f, "[{}={}]", name, value)?;
                }
            }
        }
        for not_selector in &self.not_selectors {
            write!(f, ":not({})", not_selector)?;
        }
        Ok(())
    }
}
