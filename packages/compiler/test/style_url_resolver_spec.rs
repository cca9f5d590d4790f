//! Style URL Resolver Tests

use angular_template_compiler::style_url_resolver::{is_style_url_resolvable, resolve_style_urls};
use angular_template_compiler::url_resolver::DefaultUrlResolver;

fn resolve(base_url: &str, css: &str) -> (String, Vec<String>) {
    let result = resolve_style_urls(&DefaultUrlResolver::new(), base_url, css);
    (result.style, result.style_urls)
}

#[test]
fn should_resolve_relative_urls() {
    assert!(is_style_url_resolvable(Some("someUrl.css")));
}

#[test]
fn should_resolve_package_urls() {
    assert!(is_style_url_resolvable(Some("package:someUrl.css")));
}

#[test]
fn should_resolve_asset_urls() {
    assert!(is_style_url_resolvable(Some("asset:someUrl.css")));
}

#[test]
fn should_not_resolve_empty_urls() {
    assert!(!is_style_url_resolvable(None));
    assert!(!is_style_url_resolvable(Some("")));
}

#[test]
fn should_not_resolve_urls_with_other_schema() {
    assert!(!is_style_url_resolvable(Some("http://otherurl")));
}

#[test]
fn should_not_resolve_urls_with_absolute_paths() {
    assert!(!is_style_url_resolvable(Some("/otherurl")));
    assert!(!is_style_url_resolvable(Some("//otherurl")));
}

#[test]
fn should_resolve_url_references_with_any_quoting() {
    let css = ".foo {\n  background-image: url(\"double.jpg\");\n  background-image: url('simple.jpg');\n  background-image: url(noquote.jpg);\n}";
    let (style, style_urls) = resolve("http://ng.io", css);
    assert_eq!(
        style,
        ".foo {\n  background-image: url('http://ng.io/double.jpg');\n  background-image: url('http://ng.io/simple.jpg');\n  background-image: url('http://ng.io/noquote.jpg');\n}"
    );
    assert!(style_urls.is_empty());
}

#[test]
fn should_extract_imports_and_remove_them() {
    let css = "@import '1.css';\n@import \"2.css\";\n@import url('3.css');\ndiv {color: red}";
    let (style, style_urls) = resolve("http://ng.io/a/b.css", css);
    assert_eq!(style.trim(), "div {color: red}");
    assert_eq!(
        style_urls,
        vec![
            "http://ng.io/a/1.css",
            "http://ng.io/a/2.css",
            "http://ng.io/a/3.css"
        ]
    );
}

#[test]
fn should_resolve_imports_against_package_urls() {
    let (_, style_urls) = resolve("package:some/dir/a.css", "@import '../b.css';");
    assert_eq!(style_urls, vec!["package:some/b.css"]);
}

#[test]
fn should_leave_unresolvable_imports_in_place() {
    let css = "@import 'http://other.com/x.css';\n@import '/abs.css';";
    let (style, style_urls) = resolve("http://ng.io/a.css", css);
    assert_eq!(style, css);
    assert!(style_urls.is_empty());
}
