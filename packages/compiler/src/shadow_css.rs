//! Shadow CSS
//!
//! CSS scoping for emulated view encapsulation.
//!
//! This is a limited shim for ShadowDOM css styling.
//! https://dvcs.w3.org/hg/webcomponents/raw-file/tip/spec/shadow/index.html#styles
//!
//! Every selector of every rule gets the content attribute appended to each
//! of its compound selectors:
//!
//! ```text
//! one two { }              => one[ca] two[ca] { }
//! a:hover { }              => a[ca]:hover { }
//! :host { }                => [ha] { }
//! :host(.x) .y { }         => .x[ha] .y[ca] { }
//! .a ::ng-deep .b { }      => .a[ca] .b { }
//! ```
//!
//! Rules nested in `@media`, `@supports`, `@document`, `@layer` and
//! `@container` are scoped recursively; other at-rules (`@keyframes`,
//! `@font-face`, `@page`, ...) are left untouched.

use once_cell::sync::Lazy;
use regex::Regex;

const POLYFILL_HOST_NO_COMBINATOR: &str = "-shadowcsshost-no-combinator";
const BLOCK_PLACEHOLDER: &str = "%BLOCK%";
const COMMA_IN_PLACEHOLDER: &str = "%COMMA_IN_PLACEHOLDER%";
const SEMI_IN_PLACEHOLDER: &str = "%SEMI_IN_PLACEHOLDER%";
const COLON_IN_PLACEHOLDER: &str = "%COLON_IN_PLACEHOLDER%";
const OPEN_BRACE_IN_PLACEHOLDER: &str = "%OPEN_BRACE_IN_PLACEHOLDER%";
const CLOSE_BRACE_IN_PLACEHOLDER: &str = "%CLOSE_BRACE_IN_PLACEHOLDER%";

const SCOPED_AT_RULE_IDENTIFIERS: &[&str] = &[
    "@media",
    "@supports",
    "@document",
    "@layer",
    "@container",
];

static COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\*[\s\S]*?\*/").unwrap());

static COMMENT_WITH_HASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\*\s*#\s*source(Mapping)?URL=").unwrap());

static COLON_HOST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":host(?:\(((?:\([^)(]*\)|[^)(]*)+?)\))?([^,{]*)").unwrap());

static RULE_RE: Lazy<Regex> = Lazy::new(|| {
    let block_ph = regex::escape(BLOCK_PLACEHOLDER);
    let pattern = format!(r"(\s*)([^;{{}}]+?)(\s*)((?:\{{{}\}}\s*;?)|(?:\s*;))", block_ph);
    Regex::new(&pattern).unwrap()
});

/// A single CSS rule: its selector (or at-rule prelude) and block content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CssRule {
    pub selector: String,
    pub content: String,
}

impl CssRule {
    pub fn new(selector: String, content: String) -> Self {
        CssRule { selector, content }
    }
}

struct StringWithEscapedBlocks {
    escaped_string: String,
    blocks: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ShadowCss;

impl ShadowCss {
    pub fn new() -> Self {
        ShadowCss
    }

    /// Shim some cssText with the given selector. Returns cssText that can be
    /// included in the document.
    ///
    /// `selector` is the attribute added to all elements inside the host,
    /// `host_selector` is the attribute added to the host itself.
    pub fn shim_css_text(&self, css_text: &str, selector: &str, host_selector: &str) -> String {
        let mut source_map_comments = Vec::new();
        let without_comments = COMMENT_RE.replace_all(css_text, |caps: &regex::Captures| {
            if COMMENT_WITH_HASH_RE.is_match(&caps[0]) {
                source_map_comments.push(caps[0].to_string());
            }
            String::new()
        });

        let css_text = self.convert_colon_host(&without_comments);
        let mut scoped = if selector.is_empty() {
            css_text
        } else {
            self.scope_selectors(&css_text, selector, host_selector)
        };

        for comment in source_map_comments {
            scoped.push('\n');
            scoped.push_str(&comment);
        }
        scoped.trim().to_string()
    }

    /// Replace `:host` and `:host(sel)` with the host marker so that the
    /// selector scoper can recognise the host compound.
    fn convert_colon_host(&self, css_text: &str) -> String {
        COLON_HOST_RE
            .replace_all(css_text, |caps: &regex::Captures| {
                let other_selectors = caps.get(2).map_or("", |m| m.as_str());
                match caps.get(1) {
                    Some(host_selectors) => split_on_top_level_commas(host_selectors.as_str())
                        .iter()
                        .map(|host| {
                            format!(
                                "{}{}{}",
                                POLYFILL_HOST_NO_COMBINATOR,
                                host.trim(),
                                other_selectors
                            )
                        })
                        .collect::<Vec<_>>()
                        .join(","),
                    None => format!("{}{}", POLYFILL_HOST_NO_COMBINATOR, other_selectors),
                }
            })
            .into_owned()
    }

    fn scope_selectors(&self, css_text: &str, scope_selector: &str, host_selector: &str) -> String {
        process_rules(css_text, |rule| {
            let selector = rule.selector.trim();
            if !selector.starts_with('@') {
                let scoped = self.scope_selector(&rule.selector, scope_selector, host_selector);
                return CssRule::new(scoped, rule.content);
            }
            if SCOPED_AT_RULE_IDENTIFIERS
                .iter()
                .any(|at_rule| selector.starts_with(at_rule))
            {
                let content = self.scope_selectors(&rule.content, scope_selector, host_selector);
                return CssRule::new(rule.selector, content);
            }
            rule
        })
    }

    /// Scope every comma separated selector of a rule.
    fn scope_selector(&self, selector: &str, scope_selector: &str, host_selector: &str) -> String {
        let content_attr = format!("[{}]", scope_selector);
        let host_attr = format!("[{}]", host_selector);
        split_on_top_level_commas(selector)
            .iter()
            .map(|part| self.scope_compound_selectors(part.trim(), &content_attr, &host_attr))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn scope_compound_selectors(&self, selector: &str, content_attr: &str, host_attr: &str) -> String {
        let mut result = String::new();
        let mut should_scope = true;

        for (compound, combinator) in split_compound_selectors(selector) {
            if is_deep_token(&compound) {
                // Everything after a deep combinator stays unscoped.
                should_scope = false;
                if !result.is_empty() && !result.ends_with(char::is_whitespace) {
                    result.push(' ');
                }
                continue;
            }

            if compound.contains(POLYFILL_HOST_NO_COMBINATOR) {
                let host = compound.replace(POLYFILL_HOST_NO_COMBINATOR, "");
                result.push_str(&insert_attribute(&host, host_attr));
            } else if should_scope && !compound.is_empty() {
                result.push_str(&insert_attribute(&compound, content_attr));
            } else {
                result.push_str(&compound);
            }
            result.push_str(&combinator);
        }
        result
    }
}

fn is_deep_token(compound: &str) -> bool {
    matches!(compound.trim(), ">>>" | "/deep/" | "::ng-deep")
}

/// Insert `attr` before the first top-level pseudo selector of a compound.
fn insert_attribute(compound: &str, attr: &str) -> String {
    let mut bracket_depth = 0;
    let mut paren_depth = 0;
    for (index, ch) in compound.char_indices() {
        match ch {
            '[' => bracket_depth += 1,
            ']' => bracket_depth -= 1,
            '(' => paren_depth += 1,
            ')' => paren_depth -= 1,
            ':' if bracket_depth == 0 && paren_depth == 0 => {
                return format!("{}{}{}", &compound[..index], attr, &compound[index..]);
            }
            _ => {}
        }
    }
    format!("{}{}", compound, attr)
}

/// Split a selector into compound selectors, each paired with the
/// combinator text that follows it (possibly empty for the last one).
fn split_compound_selectors(selector: &str) -> Vec<(String, String)> {
    let mut parts = Vec::new();
    let mut compound = String::new();
    let mut combinator = String::new();
    let mut bracket_depth = 0;
    let mut paren_depth = 0;

    for ch in selector.chars() {
        let top_level = bracket_depth == 0 && paren_depth == 0;
        let is_combinator = top_level && (ch.is_whitespace() || ch == '>' || ch == '+' || ch == '~');
        if is_combinator {
            combinator.push(ch);
            continue;
        }
        if !combinator.is_empty() {
            if compound.is_empty() && parts.is_empty() {
                // leading whitespace
                combinator.clear();
            } else {
                parts.push((std::mem::take(&mut compound), std::mem::take(&mut combinator)));
            }
        }
        match ch {
            '[' => bracket_depth += 1,
            ']' => bracket_depth -= 1,
            '(' => paren_depth += 1,
            ')' => paren_depth -= 1,
            _ => {}
        }
        compound.push(ch);
    }
    if !compound.is_empty() || !combinator.is_empty() {
        parts.push((compound, combinator));
    }
    merge_deep_tokens(parts)
}

/// `>>>` arrives as combinator characters; turn it back into a token.
fn merge_deep_tokens(parts: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut merged = Vec::with_capacity(parts.len());
    for (compound, combinator) in parts {
        match combinator.find(">>>") {
            Some(index) => {
                let after = combinator[index + 3..].to_string();
                merged.push((compound, combinator[..index].to_string()));
                merged.push((">>>".to_string(), after));
            }
            None => merged.push((compound, combinator)),
        }
    }
    merged
}

/// Split on commas that are not nested in parentheses or brackets.
fn split_on_top_level_commas(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (index, ch) in text.char_indices() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(text[start..index].to_string());
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(text[start..].to_string());
    parts
}

fn escape_in_strings(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut current_quote_char: Option<char> = None;
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            result.push(ch);
            if let Some(escaped) = chars.next() {
                result.push(escaped);
            }
            continue;
        }
        match current_quote_char {
            Some(quote) if ch == quote => {
                current_quote_char = None;
                result.push(ch);
            }
            Some(_) => match ch {
                ';' => result.push_str(SEMI_IN_PLACEHOLDER),
                ',' => result.push_str(COMMA_IN_PLACEHOLDER),
                ':' => result.push_str(COLON_IN_PLACEHOLDER),
                '{' => result.push_str(OPEN_BRACE_IN_PLACEHOLDER),
                '}' => result.push_str(CLOSE_BRACE_IN_PLACEHOLDER),
                _ => result.push(ch),
            },
            None => {
                if ch == '\'' || ch == '"' {
                    current_quote_char = Some(ch);
                }
                result.push(ch);
            }
        }
    }
    result
}

fn unescape_in_strings(input: &str) -> String {
    input
        .replace(COMMA_IN_PLACEHOLDER, ",")
        .replace(SEMI_IN_PLACEHOLDER, ";")
        .replace(COLON_IN_PLACEHOLDER, ":")
        .replace(OPEN_BRACE_IN_PLACEHOLDER, "{")
        .replace(CLOSE_BRACE_IN_PLACEHOLDER, "}")
}

/// Replace every top-level `{...}` block with a placeholder, keeping the
/// block contents aside.
fn escape_blocks(input: &str) -> StringWithEscapedBlocks {
    let mut escaped_string = String::with_capacity(input.len());
    let mut blocks = Vec::new();
    let mut depth = 0;
    let mut block = String::new();
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            let target = if depth > 0 { &mut block } else { &mut escaped_string };
            target.push(ch);
            if let Some(escaped) = chars.next() {
                target.push(escaped);
            }
            continue;
        }
        match ch {
            '{' if depth == 0 => {
                depth = 1;
                escaped_string.push('{');
            }
            '{' => {
                depth += 1;
                block.push(ch);
            }
            '}' if depth == 1 => {
                depth = 0;
                blocks.push(std::mem::take(&mut block));
                escaped_string.push_str(BLOCK_PLACEHOLDER);
                escaped_string.push('}');
            }
            '}' if depth > 1 => {
                depth -= 1;
                block.push(ch);
            }
            _ if depth > 0 => block.push(ch),
            _ => escaped_string.push(ch),
        }
    }
    if depth > 0 {
        blocks.push(block);
        escaped_string.push_str(BLOCK_PLACEHOLDER);
    }

    StringWithEscapedBlocks {
        escaped_string,
        blocks,
    }
}

/// Process CSS rules by applying a callback to each rule
pub fn process_rules<F>(input: &str, mut rule_callback: F) -> String
where
    F: FnMut(CssRule) -> CssRule,
{
    let escaped = escape_in_strings(input);
    let input_with_escaped_blocks = escape_blocks(&escaped);
    let block_marker = format!("{{{}}}", BLOCK_PLACEHOLDER);

    let mut next_block_index = 0;
    let escaped_result = RULE_RE.replace_all(
        &input_with_escaped_blocks.escaped_string,
        |caps: &regex::Captures| {
            let prefix = caps.get(1).map_or("", |m| m.as_str());
            let selector = caps.get(2).map_or("", |m| m.as_str());
            let middle = caps.get(3).map_or("", |m| m.as_str());
            let suffix = caps.get(4).map_or("", |m| m.as_str());

            let mut content = String::new();
            let mut content_prefix = "";
            let mut final_suffix = suffix;

            if suffix.starts_with(&block_marker) {
                if let Some(block) = input_with_escaped_blocks.blocks.get(next_block_index) {
                    content = block.clone();
                }
                next_block_index += 1;
                final_suffix = &suffix[BLOCK_PLACEHOLDER.len() + 1..];
                content_prefix = "{";
            }

            let rule = rule_callback(CssRule::new(selector.to_string(), content));
            format!(
                "{}{}{}{}{}{}",
                prefix, rule.selector, middle, content_prefix, rule.content, final_suffix
            )
        },
    );

    unescape_in_strings(&escaped_result)
}
