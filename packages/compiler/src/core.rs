//! Core Types
//!
//! Types shared with the render engine and the change detection runtime.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ViewEncapsulation {
    /// Styles are rewritten to carry synthetic host/content attributes.
    #[default]
    Emulated,
    /// The platform's own shadow boundary scopes the styles.
    Native,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ChangeDetectionStrategy {
    /// Checked on every cycle.
    #[default]
    Default,
    /// Checked only after it has been explicitly marked.
    OnPush,
}

impl ChangeDetectionStrategy {
    pub fn is_default(self) -> bool {
        self == ChangeDetectionStrategy::Default
    }
}

bitflags! {
    /// Lifecycle hooks a directive implements.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct LifecycleHooks: u8 {
        const ON_INIT = 1 << 0;
        const ON_DESTROY = 1 << 1;
        const DO_CHECK = 1 << 2;
        const ON_CHANGES = 1 << 3;
        const AFTER_CONTENT_INIT = 1 << 4;
        const AFTER_CONTENT_CHECKED = 1 << 5;
        const AFTER_VIEW_INIT = 1 << 6;
        const AFTER_VIEW_CHECKED = 1 << 7;
    }
}

/// How a bound element property is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyBindingType {
    Property,
    Attribute,
    Class,
    Style,
}
