//! Execution platforms a binding can be excluded from

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown platform: {0}")]
pub struct UnknownPlatform(pub String);

/// Target platform of the running process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "windows")]
    Windows,
    #[serde(rename = "macos")]
    MacOS,
    #[serde(rename = "linux")]
    Linux,
    #[serde(rename = "android")]
    Android,
    #[serde(rename = "ios")]
    Ios,
    #[serde(rename = "ps4")]
    Ps4,
    #[serde(rename = "ps5")]
    Ps5,
    #[serde(rename = "xbox_one")]
    XboxOne,
    #[serde(rename = "xbox_series")]
    XboxSeries,
    #[serde(rename = "switch")]
    Switch,
}

impl Platform {
    pub const ALL: [Platform; 10] = [
        Platform::Windows,
        Platform::MacOS,
        Platform::Linux,
        Platform::Android,
        Platform::Ios,
        Platform::Ps4,
        Platform::Ps5,
        Platform::XboxOne,
        Platform::XboxSeries,
        Platform::Switch,
    ];

    /// Platform of the compile target
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOS
        } else if cfg!(target_os = "android") {
            Platform::Android
        } else if cfg!(target_os = "ios") {
            Platform::Ios
        } else {
            Platform::Linux
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::MacOS => "macos",
            Platform::Linux => "linux",
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::Ps4 => "ps4",
            Platform::Ps5 => "ps5",
            Platform::XboxOne => "xbox_one",
            Platform::XboxSeries => "xbox_series",
            Platform::Switch => "switch",
        }
    }

    /// Whether this platform appears in an exclusion list
    pub fn is_excluded(&self, excluded: &[Platform]) -> bool {
        excluded.contains(self)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Platform::ALL
            .iter()
            .copied()
            .find(|platform| platform.as_str() == normalized)
            .ok_or_else(|| UnknownPlatform(s.to_string()))
    }
}
