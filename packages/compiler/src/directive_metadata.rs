//! Directive Metadata
//!
//! Compile-time description of directives and components. Values are
//! created once (see [`CompileDirectiveMetadata::create`]), normalized by
//! the template normalizer and then shared read-only.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::{ChangeDetectionStrategy, LifecycleHooks, ViewEncapsulation};
use crate::error::{CompileError, Result};
use crate::selector::CssSelector;
use crate::util::split_at_colon;

/// `[prop]` or `(event)` keys of a directive's host map.
static HOST_REG_EXP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:(?:\[([^\]]+)\])|(?:\(([^\)]+)\)))$").unwrap());

/// Identity of a directive type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileTypeMetadata {
    pub id: i32,
    pub name: String,
    pub module_id: String,
}

impl CompileTypeMetadata {
    pub fn new(id: i32, name: impl Into<String>, module_id: impl Into<String>) -> Self {
        CompileTypeMetadata {
            id,
            name: name.into(),
            module_id: module_id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileTemplateMetadata {
    pub encapsulation: ViewEncapsulation,
    pub template: Option<String>,
    pub template_url: Option<String>,
    pub styles: Vec<String>,
    pub style_urls: Vec<String>,
    pub ng_content_selectors: Vec<String>,
}

impl CompileTemplateMetadata {
    pub fn inline(template: impl Into<String>) -> Self {
        CompileTemplateMetadata {
            template: Some(template.into()),
            ..Default::default()
        }
    }

    pub fn from_url(template_url: impl Into<String>) -> Self {
        CompileTemplateMetadata {
            template_url: Some(template_url.into()),
            ..Default::default()
        }
    }

    pub fn with_encapsulation(mut self, encapsulation: ViewEncapsulation) -> Self {
        self.encapsulation = encapsulation;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileDirectiveMetadata {
    #[serde(rename = "type")]
    pub type_: CompileTypeMetadata,
    pub is_component: bool,
    pub dynamic_loadable: bool,
    pub selector: Option<String>,
    pub export_as: Option<String>,
    pub change_detection: ChangeDetectionStrategy,
    /// Directive property name to element property name.
    pub properties: IndexMap<String, String>,
    /// Directive event name to element event name.
    pub events: IndexMap<String, String>,
    pub host_listeners: IndexMap<String, String>,
    pub host_properties: IndexMap<String, String>,
    pub host_attributes: IndexMap<String, String>,
    pub lifecycle_hooks: LifecycleHooks,
    pub template: Option<CompileTemplateMetadata>,
}

/// Raw, user-facing form of a directive declaration.
#[derive(Debug, Clone, Default)]
pub struct DirectiveDeclaration {
    pub is_component: bool,
    pub dynamic_loadable: bool,
    pub selector: Option<String>,
    pub export_as: Option<String>,
    pub change_detection: ChangeDetectionStrategy,
    /// `"dirProp: elProp"` or just `"prop"`.
    pub properties: Vec<String>,
    pub events: Vec<String>,
    /// `"(event)"`, `"[prop]"` or a plain attribute name, to its value.
    pub host: IndexMap<String, String>,
    pub lifecycle_hooks: LifecycleHooks,
    pub template: Option<CompileTemplateMetadata>,
}

impl CompileDirectiveMetadata {
    pub fn create(type_: CompileTypeMetadata, declaration: DirectiveDeclaration) -> Self {
        let mut host_listeners = IndexMap::new();
        let mut host_properties = IndexMap::new();
        let mut host_attributes = IndexMap::new();
        for (key, value) in declaration.host {
            match HOST_REG_EXP.captures(&key) {
                Some(caps) => {
                    if let Some(prop) = caps.get(1) {
                        host_properties.insert(prop.as_str().to_string(), value);
                    } else if let Some(event) = caps.get(2) {
                        host_listeners.insert(event.as_str().to_string(), value);
                    }
                }
                None => {
                    host_attributes.insert(key, value);
                }
            }
        }

        CompileDirectiveMetadata {
            type_,
            is_component: declaration.is_component,
            dynamic_loadable: declaration.dynamic_loadable,
            selector: declaration.selector,
            export_as: declaration.export_as,
            change_detection: declaration.change_detection,
            properties: binding_config_map(&declaration.properties),
            events: binding_config_map(&declaration.events),
            host_listeners,
            host_properties,
            host_attributes,
            lifecycle_hooks: declaration.lifecycle_hooks,
            template: declaration.template,
        }
    }

    /// The template metadata of a component.
    ///
    /// Every component carries one; its absence is a broken invariant of
    /// whoever built the metadata.
    pub fn component_template(&self) -> Result<&CompileTemplateMetadata> {
        self.template.as_ref().ok_or_else(|| {
            CompileError::Internal(format!("Component {} has no template", self.type_.name))
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| CompileError::Internal(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CompileError::Internal(e.to_string()))
    }
}

fn binding_config_map(configs: &[String]) -> IndexMap<String, String> {
    configs
        .iter()
        .map(|config| {
            let parts = split_at_colon(config, &[config.as_str(), config.as_str()]);
            (parts[0].clone(), parts[1].clone())
        })
        .collect()
}

/// Metadata of the synthetic component that hosts `component_type` in a
/// dynamically created view: its template is a single element matching
/// `component_selector`.
pub fn create_host_component_meta(
    component_type: &CompileTypeMetadata,
    component_selector: &str,
) -> Result<CompileDirectiveMetadata> {
    let selectors = CssSelector::parse(component_selector)?;
    let template = selectors
        .first()
        .map(CssSelector::get_matching_element_template)
        .unwrap_or_default();

    Ok(CompileDirectiveMetadata::create(
        CompileTypeMetadata::new(
            -component_type.id - 1,
            format!("Host{}", component_type.name),
            component_type.module_id.clone(),
        ),
        DirectiveDeclaration {
            is_component: true,
            selector: Some("*".to_string()),
            template: Some(CompileTemplateMetadata {
                // No styles to scope.
                encapsulation: ViewEncapsulation::None,
                template: Some(template),
                template_url: Some(String::new()),
                ..Default::default()
            }),
            ..Default::default()
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir_meta(declaration: DirectiveDeclaration) -> CompileDirectiveMetadata {
        CompileDirectiveMetadata::create(
            CompileTypeMetadata::new(1, "SomeDir", "some/module"),
            declaration,
        )
    }

    #[test]
    fn test_create_splits_host_map() {
        let mut host = IndexMap::new();
        host.insert("(click)".to_string(), "onClick()".to_string());
        host.insert("[title]".to_string(), "someTitle".to_string());
        host.insert("role".to_string(), "button".to_string());
        let meta = dir_meta(DirectiveDeclaration {
            host,
            ..Default::default()
        });
        assert_eq!(meta.host_listeners.get("click").map(String::as_str), Some("onClick()"));
        assert_eq!(meta.host_properties.get("title").map(String::as_str), Some("someTitle"));
        assert_eq!(meta.host_attributes.get("role").map(String::as_str), Some("button"));
    }

    #[test]
    fn test_create_parses_property_configs() {
        let meta = dir_meta(DirectiveDeclaration {
            properties: vec!["dirProp: elProp".to_string(), "same".to_string()],
            events: vec!["done".to_string()],
            ..Default::default()
        });
        let props: Vec<_> = meta.properties.iter().collect();
        assert_eq!(
            props,
            vec![
                (&"dirProp".to_string(), &"elProp".to_string()),
                (&"same".to_string(), &"same".to_string())
            ]
        );
        assert_eq!(meta.events.get("done").map(String::as_str), Some("done"));
    }

    #[test]
    fn test_json_round_trip_keeps_order() {
        let mut host = IndexMap::new();
        host.insert("z".to_string(), "1".to_string());
        host.insert("a".to_string(), "2".to_string());
        let meta = dir_meta(DirectiveDeclaration {
            is_component: true,
            export_as: Some("someDir".to_string()),
            host,
            lifecycle_hooks: LifecycleHooks::ON_CHANGES | LifecycleHooks::AFTER_VIEW_INIT,
            template: Some(CompileTemplateMetadata::inline("<a></a>")),
            ..Default::default()
        });
        let json = meta.to_json().unwrap();
        assert!(json.contains("\"isComponent\":true"));
        let restored = CompileDirectiveMetadata::from_json(&json).unwrap();
        assert_eq!(restored, meta);
        assert_eq!(
            restored.host_attributes.keys().collect::<Vec<_>>(),
            vec!["z", "a"]
        );
    }

    #[test]
    fn test_host_component_meta() {
        let comp_type = CompileTypeMetadata::new(3, "SomeComp", "some/module");
        let host = create_host_component_meta(&comp_type, "some-comp").unwrap();
        assert_eq!(host.type_.id, -4);
        assert_eq!(host.type_.name, "HostSomeComp");
        assert!(host.is_component);
        assert_eq!(
            host.template.unwrap().template.as_deref(),
            Some("<some-comp></some-comp>")
        );
    }
}
