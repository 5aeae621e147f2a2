//! Serialized shapes of the binding configuration asset

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use tagbind_common::{Platform, Tag};

use crate::error::{ConfigError, Result};

/// One declared binding, with type references still by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingRecord {
    /// Capability name (catalog alias or full type name)
    pub capability: String,
    /// Concrete implementation name
    pub implementation: String,
    /// Raw tag identifier, `0` for untagged
    #[serde(default)]
    pub tag: Tag,
    #[serde(default)]
    pub excluded_platforms: Vec<Platform>,
}

impl BindingRecord {
    pub fn new(capability: impl Into<String>, implementation: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            implementation: implementation.into(),
            tag: Tag::NONE,
            excluded_platforms: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<Tag>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn excluding(mut self, platforms: impl IntoIterator<Item = Platform>) -> Self {
        self.excluded_platforms.extend(platforms);
        self
    }
}

/// Ordered list of bindings as stored on disk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinderAsset {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bindings: Vec<BindingRecord>,
}

impl BinderAsset {
    pub fn new(bindings: Vec<BindingRecord>) -> Self {
        Self {
            name: None,
            bindings,
        }
    }

    /// Structural checks only; names are resolved later against a catalog
    pub fn validate(&self) -> Result<()> {
        for (index, record) in self.bindings.iter().enumerate() {
            if record.capability.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "binding #{} has an empty capability",
                    index
                )));
            }
            if record.implementation.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "binding #{} has an empty implementation",
                    index
                )));
            }
        }
        Ok(())
    }

    /// Bindings declared more than once for the same (capability, tag)
    ///
    /// Only the first applicable one is ever used, so these are reported
    /// as configuration smells.
    pub fn shadowed(&self) -> Vec<&BindingRecord> {
        let mut seen = HashSet::new();
        self.bindings
            .iter()
            .filter(|record| {
                let fresh = seen.insert((record.capability.as_str(), record.tag.id()));
                !fresh && record.excluded_platforms.is_empty()
            })
            .collect()
    }
}
