//! Compiler configuration.

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerConfig {
    /// Emit debug information (binding locations) into generated detectors.
    pub gen_debug_info: bool,
    /// Report every binding update to the dispatcher as a debug value.
    pub log_binding_update: bool,
    /// Rewrite component styles for emulated encapsulation.
    pub style_shim: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            gen_debug_info: false,
            log_binding_update: false,
            style_shim: true,
        }
    }
}

impl CompilerConfig {
    pub fn new(gen_debug_info: bool, log_binding_update: bool) -> Self {
        CompilerConfig {
            gen_debug_info,
            log_binding_update,
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| CompileError::Internal(format!("Invalid compiler config: {}", e)))
    }

    pub fn change_detector_gen_config(&self) -> ChangeDetectorGenConfig {
        ChangeDetectorGenConfig {
            gen_debug_info: self.gen_debug_info,
            log_binding_update: self.log_binding_update,
        }
    }
}

/// The part of the configuration that affects generated change detectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDetectorGenConfig {
    pub gen_debug_info: bool,
    pub log_binding_update: bool,
}
