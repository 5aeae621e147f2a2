//! Runtime settings read at startup

use serde::{Deserialize, Serialize};

use tagbind_common::Platform;

/// Process-level switches for the binding runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Overrides the detected platform when evaluating exclusions
    #[serde(default)]
    pub platform: Option<Platform>,
    /// Default for contexts that do not choose: build every binding up front
    #[serde(default)]
    pub early_binding: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RuntimeSettings {
    /// Platform to evaluate exclusions against
    pub fn effective_platform(&self) -> Platform {
        self.platform.unwrap_or_else(Platform::current)
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            platform: None,
            early_binding: false,
            log_level: default_log_level(),
        }
    }
}
