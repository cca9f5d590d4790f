//! Template Preparser
//!
//! Classifies markup elements that matter before binding parsing:
//! content projection points, inline styles, style sheet links and
//! subtrees excluded from binding.

use crate::ml_parser::ast::Element;

const NG_CONTENT_SELECT_ATTR: &str = "select";
const NG_CONTENT_ELEMENT: &str = "ng-content";
const LINK_ELEMENT: &str = "link";
const LINK_STYLE_REL_ATTR: &str = "rel";
const LINK_STYLE_HREF_ATTR: &str = "href";
const LINK_STYLE_REL_VALUE: &str = "stylesheet";
const STYLE_ELEMENT: &str = "style";
const SCRIPT_ELEMENT: &str = "script";
const NG_NON_BINDABLE_ATTR: &str = "ng-non-bindable";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreparsedElementType {
    NgContent,
    Style,
    Stylesheet,
    Script,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparsedElement {
    pub element_type: PreparsedElementType,
    /// `select` of an `ng-content`, `*` when absent or empty.
    pub select_attr: String,
    pub href_attr: Option<String>,
    pub non_bindable: bool,
}

pub fn preparse_element(ast: &Element) -> PreparsedElement {
    let mut select_attr = None;
    let mut href_attr = None;
    let mut rel_attr = None;
    let mut non_bindable = false;

    for attr in &ast.attrs {
        let lc_attr_name = attr.name.to_lowercase();
        match lc_attr_name.as_str() {
            NG_CONTENT_SELECT_ATTR => select_attr = Some(attr.value.clone()),
            LINK_STYLE_HREF_ATTR => href_attr = Some(attr.value.clone()),
            LINK_STYLE_REL_ATTR => rel_attr = Some(attr.value.clone()),
            NG_NON_BINDABLE_ATTR | "ngnonbindable" => non_bindable = true,
            _ => {}
        }
    }

    let node_name = ast.name.to_lowercase();
    let element_type = match node_name.as_str() {
        NG_CONTENT_ELEMENT => PreparsedElementType::NgContent,
        STYLE_ELEMENT => PreparsedElementType::Style,
        SCRIPT_ELEMENT => PreparsedElementType::Script,
        LINK_ELEMENT if rel_attr.as_deref() == Some(LINK_STYLE_REL_VALUE) => {
            PreparsedElementType::Stylesheet
        }
        _ => PreparsedElementType::Other,
    };

    PreparsedElement {
        element_type,
        select_attr: normalize_ng_content_select(select_attr),
        href_attr,
        non_bindable,
    }
}

fn normalize_ng_content_select(select_attr: Option<String>) -> String {
    match select_attr {
        Some(s) if !s.is_empty() => s,
        _ => "*".to_string(),
    }
}
