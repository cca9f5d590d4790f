//! Utility Functions
//!
//! String helpers and the small codegen snippets shared by the style,
//! command and change detection compilers.

use once_cell::sync::Lazy;
use regex::Regex;

static CAMEL_CASE_REGEXP: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Z])").unwrap());
static DASH_CASE_REGEXP: Lazy<Regex> = Lazy::new(|| Regex::new(r"-([a-z])").unwrap());
static COLON_SPLIT_REGEXP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*:\s*").unwrap());

/// Convert camelCase to dash-case
pub fn camel_case_to_dash_case(input: &str) -> String {
    CAMEL_CASE_REGEXP
        .replace_all(input, |caps: &regex::Captures| {
            format!("-{}", caps[1].to_lowercase())
        })
        .into_owned()
}

/// Convert dash-case to camelCase
pub fn dash_case_to_camel_case(input: &str) -> String {
    DASH_CASE_REGEXP
        .replace_all(input, |caps: &regex::Captures| caps[1].to_uppercase())
        .into_owned()
}

/// Split `input` at colons, falling back to `default_values` when there is
/// no colon.
pub fn split_at_colon(input: &str, default_values: &[&str]) -> Vec<String> {
    let parts: Vec<String> = COLON_SPLIT_REGEXP
        .split(input.trim())
        .map(str::to_string)
        .collect();
    if parts.len() > 1 {
        parts
    } else {
        default_values.iter().map(|v| v.to_string()).collect()
    }
}

pub fn escape_single_quote_string(input: &str) -> String {
    format!("'{}'", escape_string(input, '\''))
}

pub fn escape_double_quote_string(input: &str) -> String {
    format!("\"{}\"", escape_string(input, '"'))
}

fn escape_string(input: &str, quote: char) -> String {
    let mut result = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\n' => result.push_str("\\n"),
            '\\' => result.push_str("\\\\"),
            c if c == quote => {
                result.push('\\');
                result.push(c);
            }
            c => result.push(c),
        }
    }
    result
}

pub fn codegen_export_variable(name: &str) -> String {
    format!("var {} = exports['{}'] = ", name, name)
}

pub fn codegen_concat_array(expression: &str) -> String {
    format!(".concat({})", expression)
}

pub fn codegen_map_array(arg_names: &[&str], callback: &str) -> String {
    format!(
        ".map(function({}) {{ return {}; }})",
        arg_names.join(","),
        callback
    )
}

pub fn codegen_replace_all(pattern: &str, value: &str) -> String {
    format!(".replace(/{}/g, '{}')", pattern, value)
}

pub fn codegen_value_fn(params: &[&str], value: &str) -> String {
    format!("function({}) {{ return {}; }}", params.join(","), value)
}

/// Render a list of optional string values as an array literal; `None`
/// becomes `null`.
pub fn codegen_string_array<'a, I>(values: I) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let items: Vec<String> = values
        .into_iter()
        .map(|v| match v {
            Some(s) => escape_single_quote_string(s),
            None => "null".to_string(),
        })
        .collect();
    format!("[{}]", items.join(","))
}

/// Turn an arbitrary name into a valid identifier.
pub fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
        .collect()
}
