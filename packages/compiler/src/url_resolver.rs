//! URL Resolver
//!
//! Resolves a possibly relative URL against a base URL. Pure and
//! deterministic; never performs I/O.

use once_cell::sync::Lazy;
use regex::Regex;

static URL_PARTS_REGEXP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:([a-zA-Z][a-zA-Z0-9+.\-]*):)?(//[^/?#]*)?([^?#]*)(\?[^#]*)?(#.*)?$").unwrap()
});

pub trait UrlResolver {
    fn resolve(&self, base_url: &str, url: &str) -> String;
}

/// RFC 3986 reference resolution. `package:` URLs are rewritten with the
/// configured package prefix when one is set.
#[derive(Debug, Clone, Default)]
pub struct DefaultUrlResolver {
    package_prefix: Option<String>,
}

impl DefaultUrlResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package_prefix(prefix: impl Into<String>) -> Self {
        DefaultUrlResolver {
            package_prefix: Some(prefix.into()),
        }
    }
}

impl UrlResolver for DefaultUrlResolver {
    fn resolve(&self, base_url: &str, url: &str) -> String {
        let mut resolved = if base_url.is_empty() {
            url.to_string()
        } else {
            resolve_reference(base_url, url)
        };
        if let Some(prefix) = &self.package_prefix {
            if let Some(rest) = resolved.strip_prefix("package:") {
                resolved = format!(
                    "{}/{}",
                    prefix.trim_end_matches('/'),
                    rest.trim_start_matches('/')
                );
            }
        }
        resolved
    }
}

struct UrlParts<'a> {
    scheme: Option<&'a str>,
    authority: Option<&'a str>,
    path: &'a str,
    query: Option<&'a str>,
    fragment: Option<&'a str>,
}

fn split_url(url: &str) -> UrlParts<'_> {
    match URL_PARTS_REGEXP.captures(url) {
        Some(caps) => UrlParts {
            scheme: caps.get(1).map(|m| m.as_str()),
            authority: caps.get(2).map(|m| m.as_str()),
            path: caps.get(3).map_or("", |m| m.as_str()),
            query: caps.get(4).map(|m| m.as_str()),
            fragment: caps.get(5).map(|m| m.as_str()),
        },
        None => UrlParts {
            scheme: None,
            authority: None,
            path: url,
            query: None,
            fragment: None,
        },
    }
}

fn join_url(parts: &UrlParts<'_>, path: &str) -> String {
    let mut out = String::new();
    if let Some(scheme) = parts.scheme {
        out.push_str(scheme);
        out.push(':');
    }
    if let Some(authority) = parts.authority {
        out.push_str(authority);
    }
    out.push_str(path);
    if let Some(query) = parts.query {
        out.push_str(query);
    }
    if let Some(fragment) = parts.fragment {
        out.push_str(fragment);
    }
    out
}

fn resolve_reference(base_url: &str, url: &str) -> String {
    let reference = split_url(url);
    if reference.scheme.is_some() {
        return join_url(&reference, &remove_dot_segments(reference.path));
    }

    let base = split_url(base_url);
    if reference.authority.is_some() {
        let parts = UrlParts {
            scheme: base.scheme,
            ..reference
        };
        return join_url(&parts, &remove_dot_segments(parts.path));
    }

    if reference.path.is_empty() {
        let parts = UrlParts {
            scheme: base.scheme,
            authority: base.authority,
            path: base.path,
            query: reference.query.or(base.query),
            fragment: reference.fragment,
        };
        return join_url(&parts, base.path);
    }

    let path = if reference.path.starts_with('/') {
        remove_dot_segments(reference.path)
    } else {
        let merged = match base.path.rfind('/') {
            Some(index) => format!("{}{}", &base.path[..=index], reference.path),
            None if base.authority.is_some() => format!("/{}", reference.path),
            None => reference.path.to_string(),
        };
        remove_dot_segments(&merged)
    };

    let parts = UrlParts {
        scheme: base.scheme,
        authority: base.authority,
        path: "",
        query: reference.query,
        fragment: reference.fragment,
    };
    join_url(&parts, &path)
}

fn remove_dot_segments(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    let leading_slash = path.starts_with('/');
    let trailing_slash = path.ends_with('/') || path.ends_with("/.") || path.ends_with("/..");

    let mut output: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if output.last().is_some_and(|last| *last != "..") {
                    output.pop();
                } else if !leading_slash {
                    output.push("..");
                }
            }
            other => output.push(other),
        }
    }

    let mut result = output.join("/");
    if leading_slash {
        result.insert(0, '/');
    }
    if trailing_slash && !result.ends_with('/') {
        result.push('/');
    }
    result
}
