//! Style URL Resolver
//!
//! Extracts `@import` URLs out of a style sheet and resolves `url(...)`
//! references against the sheet's own URL.
//! Some code comes from WebComponents.JS
//! https://github.com/webcomponents/webcomponentsjs/blob/master/src/HTMLImports/path.js

use once_cell::sync::Lazy;
use regex::Regex;

use crate::url_resolver::UrlResolver;

/// Regex to match URL schema
static URL_WITH_SCHEMA_REGEXP: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^:/?#]+):").unwrap());

static CSS_IMPORT_REGEXP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"@import\s+(?:url\()?\s*(?:(?:['"]([^'"]*))|([^;\)\s]*))[^;]*;?"#).unwrap()
});

static CSS_URL_REGEXP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(url\()([^)]*)(\))").unwrap());

static QUOTE_REGEXP: Lazy<Regex> = Lazy::new(|| Regex::new(r#"['"]"#).unwrap());

/// A style sheet with its `@import` statements removed, plus the resolved
/// URLs of those imports in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleWithImports {
    pub style: String,
    pub style_urls: Vec<String>,
}

/// Check if style URL is resolvable
///
/// Returns true if:
/// - URL has no schema (relative URL)
/// - URL has schema 'package' or 'asset'
///
/// Returns false if:
/// - URL is null or empty
/// - URL starts with '/' (absolute path)
/// - URL has other schema (e.g., 'http', 'https')
pub fn is_style_url_resolvable(url: Option<&str>) -> bool {
    match url {
        None => false,
        Some(u) if u.is_empty() => false,
        Some(u) if u.starts_with('/') => false,
        Some(u) => match URL_WITH_SCHEMA_REGEXP.captures(u) {
            Some(caps) => {
                let schema = caps.get(1).map_or("", |m| m.as_str());
                schema == "package" || schema == "asset"
            }
            None => true,
        },
    }
}

/// Remove resolvable `@import`s from `css_text`, returning them resolved
/// against `base_url`. Imports that are not resolvable are kept in the
/// text for the platform to load.
pub fn resolve_style_urls(
    resolver: &dyn UrlResolver,
    base_url: &str,
    css_text: &str,
) -> StyleWithImports {
    let mut style_urls = Vec::new();
    let without_imports = CSS_IMPORT_REGEXP.replace_all(css_text, |caps: &regex::Captures| {
        let url = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map_or("", |m| m.as_str());
        if !is_style_url_resolvable(Some(url)) {
            return caps[0].to_string();
        }
        style_urls.push(resolver.resolve(base_url, url));
        String::new()
    });
    let style = replace_urls(resolver, base_url, &without_imports);
    StyleWithImports { style, style_urls }
}

fn replace_urls(resolver: &dyn UrlResolver, base_url: &str, css_text: &str) -> String {
    CSS_URL_REGEXP
        .replace_all(css_text, |caps: &regex::Captures| {
            let url = QUOTE_REGEXP.replace_all(caps[2].trim(), "");
            if !is_style_url_resolvable(Some(&url)) {
                return caps[0].to_string();
            }
            let resolved = resolver.resolve(base_url, &url);
            format!("{}'{}'{}", &caps[1], resolved, &caps[3])
        })
        .into_owned()
}
